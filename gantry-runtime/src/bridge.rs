//! Top-level bridge context.

use tracing::info;

use crate::config::BridgeConfig;
use crate::contract::ContractManifest;
use crate::error::BridgeError;
use crate::library::NativeLibrary;
use crate::registry::CallbackRegistry;

/// The bridge's top-level context: the loaded native library plus the
/// callback registry native code dispatches into.
///
/// Both live exactly as long as this value. Generated bindings construct
/// one `Bridge` at initialization and route every call through it; there
/// is deliberately no process-wide instance.
#[derive(Debug)]
pub struct Bridge {
    library: NativeLibrary,
    callbacks: CallbackRegistry,
}

impl Bridge {
    /// Open the native library and perform the startup contract exchange.
    ///
    /// A version or checksum mismatch is fatal here: it means the two
    /// sides were built from incompatible interface definitions, and no
    /// later call could be trusted.
    pub fn open(config: &BridgeConfig, manifest: &ContractManifest) -> Result<Self, BridgeError> {
        config.validate()?;
        let library = NativeLibrary::open(&config.library_path, &config.symbol_prefix)?;
        let report = library.contract_report(manifest)?;
        manifest.verify(&report)?;
        info!(
            version = manifest.version,
            functions = manifest.functions.len(),
            "bridge contract verified"
        );
        Ok(Self {
            library,
            callbacks: CallbackRegistry::new(),
        })
    }

    /// The loaded native library.
    pub fn library(&self) -> &NativeLibrary {
        &self.library
    }

    /// The callback registry owned by this bridge.
    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> ContractManifest {
        ContractManifest {
            version: 1,
            functions: vec![],
        }
    }

    #[test]
    fn open_rejects_invalid_config_before_loading() {
        let config = BridgeConfig::new("/tmp/lib.so", "bad prefix");
        let err = Bridge::open(&config, &manifest()).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
    }

    #[test]
    fn open_fails_on_missing_library() {
        let config = BridgeConfig::new("/nonexistent/libmesh_core.so", "mesh_core");
        let err = Bridge::open(&config, &manifest()).unwrap_err();
        assert!(matches!(err, BridgeError::LibraryLoad { .. }));
    }
}
