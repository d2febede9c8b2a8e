//! Dynamic loading and symbol resolution for the native library.

use std::collections::HashMap;
use std::path::Path;

use libloading::{Library, Symbol};
use tracing::info;

use gantry_wire::WireBuffer;

use crate::abi::{
    BufferFreeFn, ChecksumFn, ContractVersionFn, SYM_BUFFER_FREE, SYM_CHECKSUM,
    SYM_CONTRACT_VERSION,
};
use crate::contract::{ContractManifest, ContractReport};
use crate::error::{BridgeError, ProtocolError};
use crate::status::ForeignBufferFree;

/// A loaded native library speaking the gantry ABI.
///
/// All exported symbols are `<prefix>_<name>`; the prefix isolates multiple
/// gantry libraries loaded into one process. The library stays loaded for
/// the lifetime of this value, which is what keeps every resolved function
/// pointer valid.
pub struct NativeLibrary {
    library: Library,
    prefix: String,
    buffer_free: BufferFreeFn,
}

impl NativeLibrary {
    /// Load the library and resolve the symbols the runtime itself needs.
    pub fn open(path: &Path, prefix: &str) -> Result<Self, BridgeError> {
        let library =
            unsafe { Library::new(path) }.map_err(|source| BridgeError::LibraryLoad {
                path: path.to_path_buf(),
                source,
            })?;
        let free_name = format!("{prefix}_{SYM_BUFFER_FREE}");
        let buffer_free = unsafe {
            let sym: Symbol<'_, BufferFreeFn> =
                library
                    .get(free_name.as_bytes())
                    .map_err(|source| BridgeError::MissingSymbol {
                        name: free_name.clone(),
                        source,
                    })?;
            *sym
        };
        info!(path = %path.display(), prefix, "loaded native library");
        Ok(Self {
            library,
            prefix: prefix.to_string(),
            buffer_free,
        })
    }

    /// The symbol prefix this library was opened with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn prefixed(&self, suffix: &str) -> String {
        format!("{}_{}", self.prefix, suffix)
    }

    /// Resolve an exported function by its unprefixed name.
    ///
    /// # Safety
    ///
    /// `T` must match the actual signature of the exported symbol; a wrong
    /// type here is undefined behavior at the first call.
    pub unsafe fn get<T>(&self, name: &str) -> Result<Symbol<'_, T>, BridgeError> {
        let full = self.prefixed(name);
        self.library
            .get(full.as_bytes())
            .map_err(|source| BridgeError::MissingSymbol { name: full, source })
    }

    /// Query the library's contract version and per-function checksums.
    ///
    /// If the reported version differs from the manifest's, the checksum
    /// symbols cannot be trusted to exist; the report carries the version
    /// alone and verification fails on it.
    pub fn contract_report(
        &self,
        manifest: &ContractManifest,
    ) -> Result<ContractReport, BridgeError> {
        let version = unsafe {
            let sym: Symbol<'_, ContractVersionFn> = self.get(SYM_CONTRACT_VERSION)?;
            sym()
        };
        let mut report = ContractReport {
            version,
            checksums: HashMap::new(),
        };
        if version != manifest.version {
            return Ok(report);
        }
        for function in &manifest.functions {
            let suffix = format!("{SYM_CHECKSUM}_{}", function.name);
            let checksum = unsafe {
                let sym: Symbol<'_, ChecksumFn> = self.get(&suffix)?;
                sym()
            };
            report.checksums.insert(function.name.to_string(), checksum);
        }
        Ok(report)
    }
}

impl ForeignBufferFree for NativeLibrary {
    fn consume(&self, buf: WireBuffer) -> Result<Vec<u8>, ProtocolError> {
        if !buf.is_well_formed() {
            return Err(ProtocolError::MalformedBuffer);
        }
        let bytes = unsafe { buf.as_slice() }.to_vec();
        // The library allocated this buffer; only it may free it.
        unsafe { (self.buffer_free)(buf) };
        Ok(bytes)
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_a_missing_library_fails_with_load_error() {
        let err = NativeLibrary::open(Path::new("/nonexistent/libmesh_core.so"), "mesh_core")
            .unwrap_err();
        assert!(matches!(err, BridgeError::LibraryLoad { .. }));
    }
}
