//! Contract version and per-function checksums.
//!
//! Both sides are generated from the same interface definitions; the
//! manifest compiled into the bindings and the values the library reports
//! must agree exactly. The exchange happens once, when the bridge comes up;
//! any mismatch is a fatal startup error, because every call after it
//! would be interpreting bytes under the wrong schema.

use std::collections::HashMap;

use crate::error::ProtocolError;

/// Checksum of one exported function's signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionChecksum {
    /// Unprefixed function name as it appears in the interface definitions.
    pub name: &'static str,
    /// Signature checksum compiled into the bindings.
    pub checksum: u16,
}

/// The contract compiled into the generated bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractManifest {
    /// Contract version the bindings were generated against.
    pub version: u32,
    /// Checksums for every function the bindings call.
    pub functions: Vec<FunctionChecksum>,
}

/// What the native library actually reports at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractReport {
    /// Version reported by the library's version symbol.
    pub version: u32,
    /// Checksums reported by the library's per-function symbols.
    pub checksums: HashMap<String, u16>,
}

impl ContractManifest {
    /// Compare this manifest against the library's report.
    ///
    /// Version is checked first: with mismatched versions the checksum
    /// symbols themselves cannot be trusted. Then every function in the
    /// manifest must be present and agree.
    pub fn verify(&self, report: &ContractReport) -> Result<(), ProtocolError> {
        if report.version != self.version {
            return Err(ProtocolError::ContractVersionMismatch {
                expected: self.version,
                actual: report.version,
            });
        }
        for function in &self.functions {
            match report.checksums.get(function.name) {
                None => {
                    return Err(ProtocolError::ChecksumMissing {
                        name: function.name.to_string(),
                    })
                }
                Some(&actual) if actual != function.checksum => {
                    return Err(ProtocolError::ChecksumMismatch {
                        name: function.name.to_string(),
                        expected: function.checksum,
                        actual,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}
