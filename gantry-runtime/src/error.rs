//! Error taxonomy for the bridge runtime.
//!
//! Three kinds of failure cross the boundary, and they are never conflated:
//! - a domain error, decoded into a typed value the caller can branch on;
//! - a [`ProtocolError`], a contract violation between the two sides;
//! - a [`PanicError`], an unrecoverable fault inside the native library.
//!
//! Domain errors are ordinary operating conditions. The other two are fatal
//! for the current operation and usually mean the two sides were built from
//! incompatible interface definitions; nothing in this layer retries them.

use std::path::PathBuf;

use thiserror::Error;

use gantry_wire::CodecError;

/// A contract violation between the two sides of the boundary.
///
/// These indicate a bug or a build mismatch, never a user-facing condition.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The native side reported a call status code outside the known set.
    #[error("unknown call status code: {0}")]
    UnknownStatusCode(i8),

    /// A status payload buffer violated the buffer invariants.
    #[error("malformed status payload buffer")]
    MalformedBuffer,

    /// A status payload failed to decode as its declared type.
    #[error("malformed status payload")]
    MalformedPayload(#[source] CodecError),

    /// An object was acquired after it was destroyed.
    #[error("object used after destroy")]
    UseAfterDestroy,

    /// An object's in-flight call counter hit its defensive bound.
    #[error("object call counter overflow")]
    CallCounterOverflow,

    /// Native code invoked a callback handle that is not registered.
    #[error("unknown callback handle: {0}")]
    UnknownCallbackHandle(u64),

    /// Native code passed a negative argument length to a callback.
    #[error("negative callback argument length: {0}")]
    NegativeArgLength(i32),

    /// The bindings and the library disagree on the contract version.
    #[error("contract version mismatch: bindings have {expected}, library has {actual}")]
    ContractVersionMismatch {
        /// Version compiled into the bindings.
        expected: u32,
        /// Version reported by the library.
        actual: u32,
    },

    /// The library did not report a checksum for a required function.
    #[error("library reports no checksum for function {name}")]
    ChecksumMissing {
        /// The function missing from the library's report.
        name: String,
    },

    /// The bindings and the library disagree on a function's checksum.
    #[error(
        "checksum mismatch for function {name}: bindings have {expected:#06x}, library has {actual:#06x}"
    )]
    ChecksumMismatch {
        /// The function whose signature changed.
        name: String,
        /// Checksum compiled into the bindings.
        expected: u16,
        /// Checksum reported by the library.
        actual: u16,
    },
}

/// An unrecoverable fault inside the native library.
///
/// Panics are never retried and never decoded as domain errors; they mean
/// the library (or the bridge itself) has a bug.
#[derive(Debug, Error)]
pub enum PanicError {
    /// The native side serialized a panic message before crashing.
    #[error("native panic: {0}")]
    Message(String),

    /// The native side failed while trying to report an earlier panic.
    #[error("native panic with no message (fault while reporting the panic)")]
    DoubleFault,
}

/// The outcome channel of a single native call.
///
/// `E` is the call's typed domain error, decoded from the status payload
/// with the same codec as any other value.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// A typed, recoverable condition the library intentionally reported.
    #[error("domain error: {0}")]
    Domain(E),

    /// The native side panicked.
    #[error(transparent)]
    Panic(PanicError),

    /// The two sides violated the bridge contract.
    #[error(transparent)]
    Protocol(ProtocolError),
}

impl<E> From<ProtocolError> for CallError<E> {
    fn from(err: ProtocolError) -> Self {
        CallError::Protocol(err)
    }
}

impl<E> From<PanicError> for CallError<E> {
    fn from(err: PanicError) -> Self {
        CallError::Panic(err)
    }
}

/// Errors raised while bringing the bridge up.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The configuration failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("failed to read config file {path}")]
    ConfigRead {
        /// The file that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file was not valid TOML.
    #[error("invalid config file {path}")]
    ConfigParse {
        /// The file that failed to parse.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The native library could not be opened.
    #[error("failed to load native library {path}")]
    LibraryLoad {
        /// The library path given in the config.
        path: PathBuf,
        /// Underlying loader error.
        #[source]
        source: libloading::Error,
    },

    /// A required symbol is absent from the library.
    #[error("missing required symbol {name}")]
    MissingSymbol {
        /// The mangled symbol name that failed to resolve.
        name: String,
        /// Underlying loader error.
        #[source]
        source: libloading::Error,
    },

    /// The startup contract handshake failed.
    ///
    /// This is fatal: the two sides were built from incompatible interface
    /// definitions and no call can be trusted.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
