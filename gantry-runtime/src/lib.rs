//! # gantry-runtime
//!
//! Runtime bridge for calling gantry-ABI native libraries from Rust.
//!
//! Generated bindings are mechanical; this crate is the machinery they
//! drive:
//! - [`Bridge`] / [`NativeLibrary`] - loading, symbol resolution, and the
//!   startup contract handshake
//! - [`NativeObject`] - concurrency-safe lifecycle for opaque native
//!   pointers
//! - [`CallbackRegistry`] - dispatch of native invocations into
//!   Rust-implemented callback interfaces
//! - [`NativeCallStatus`] / [`call_native`] - the per-call status channel
//!   (success, typed domain error, or native panic)
//!
//! Every cross-boundary call is synchronous: the calling thread blocks
//! until the native side returns a status. Callers that need non-blocking
//! behavior offload bridge calls to their own worker threads; the bridge
//! does not embed an async runtime.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod abi;
mod bridge;
mod config;
mod contract;
mod error;
mod handle;
mod library;
pub mod registry;
mod status;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use contract::{ContractManifest, ContractReport, FunctionChecksum};
pub use error::{BridgeError, CallError, PanicError, ProtocolError};
pub use handle::{NativeObject, ObjectRef};
pub use library::NativeLibrary;
pub use registry::{CallbackHandler, CallbackOutcome, CallbackRegistry};
pub use status::{
    call_native, check_call_status, ForeignBufferFree, NativeCallStatus, CALL_DOMAIN_ERROR,
    CALL_PANIC, CALL_SUCCESS,
};
