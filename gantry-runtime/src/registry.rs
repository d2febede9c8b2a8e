//! Callback registry and dispatcher.
//!
//! Native code holds callbacks as numeric handles. The registry maps each
//! handle to a Rust-implemented [`CallbackHandler`] and dispatches method
//! invocations arriving from native threads, serializing arguments one
//! direction and results or errors the other.
//!
//! The registry is shared mutable state: registration can race invocation,
//! and native code may invoke from several threads at once. A single mutex
//! guards the maps (map mutation is not naturally lock-free); the body of a
//! dispatched callback runs outside the lock.
//!
//! Registries are owned by the bridge's top-level context and torn down
//! with it; nothing here is a process-wide global.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::{debug, error};

use gantry_wire::{encode_value, WireBuffer};

use crate::error::ProtocolError;

/// Callback return code: the out buffer holds the encoded return value.
pub const CALLBACK_SUCCESS: i32 = 0;
/// Callback return code: the out buffer holds an encoded domain error.
pub const CALLBACK_DOMAIN_ERROR: i32 = 1;
/// Callback return code: the callback failed in a way that has no domain
/// representation; the out buffer holds an encoded message string.
pub const CALLBACK_UNEXPECTED_ERROR: i32 = 2;

/// Reserved method index: native code is done with the handle.
pub const CALLBACK_METHOD_FREE: i32 = 0;

/// Outcome of one dispatched callback method.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// The method returned normally; bytes are its encoded return value.
    Success(Vec<u8>),
    /// The method failed with a typed error; bytes are its encoding.
    DomainError(Vec<u8>),
    /// The method failed without a domain representation (an escaped panic,
    /// or a bridge-level fault); carries a human-readable message.
    Unexpected(String),
}

/// A Rust implementation of a callback interface.
///
/// Generated per-interface glue implements this once: it matches the method
/// index, decodes the arguments with the wire codec, calls the user's
/// implementation, and encodes the result or error. Method index 0 never
/// reaches the handler; the registry consumes it as "release".
pub trait CallbackHandler: Send + Sync {
    /// Interface name, for logs and fault messages.
    fn interface_name(&self) -> &'static str;

    /// Invoke the method with the given index on encoded arguments.
    fn invoke(&self, method: i32, args: &[u8]) -> CallbackOutcome;
}

#[derive(Default)]
struct RegistryInner {
    by_handle: HashMap<u64, Arc<dyn CallbackHandler>>,
    // Keyed by the Arc's data address: the same implementation instance
    // registered twice must yield the same handle.
    by_identity: HashMap<usize, u64>,
    next_handle: u64,
}

/// Bijection between numeric handles and callback implementations.
#[derive(Default)]
pub struct CallbackRegistry {
    inner: Mutex<RegistryInner>,
}

fn identity(handler: &Arc<dyn CallbackHandler>) -> usize {
    Arc::as_ptr(handler) as *const () as usize
}

impl CallbackRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation and return its handle.
    ///
    /// Idempotent on identity: registering the same instance again returns
    /// the handle it already has. Distinct instances get distinct handles.
    pub fn register(&self, handler: Arc<dyn CallbackHandler>) -> u64 {
        let key = identity(&handler);
        let mut inner = self.inner.lock().expect("callback registry poisoned");
        if let Some(&handle) = inner.by_identity.get(&key) {
            return handle;
        }
        inner.next_handle += 1;
        let handle = inner.next_handle;
        debug!(
            handle,
            interface = handler.interface_name(),
            "registered callback"
        );
        inner.by_identity.insert(key, handle);
        inner.by_handle.insert(handle, handler);
        handle
    }

    /// Remove a handle. Removing an unknown handle is a no-op, not an
    /// error: the native side may release a handle the bridge already
    /// dropped during teardown.
    pub fn remove(&self, handle: u64) {
        let mut inner = self.inner.lock().expect("callback registry poisoned");
        if let Some(handler) = inner.by_handle.remove(&handle) {
            inner.by_identity.remove(&identity(&handler));
            debug!(
                handle,
                interface = handler.interface_name(),
                "removed callback"
            );
        }
    }

    /// Look up a handle, cloning the implementation out of the lock.
    pub fn get(&self, handle: u64) -> Option<Arc<dyn CallbackHandler>> {
        let inner = self.inner.lock().expect("callback registry poisoned");
        inner.by_handle.get(&handle).cloned()
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("callback registry poisoned")
            .by_handle
            .len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispatch one invocation arriving from native code.
    ///
    /// Method index 0 removes the mapping and reports success. Any other
    /// index runs the handler's body outside the registry lock. A panic
    /// escaping the handler is caught here (it must never unwind into
    /// native code) and reported as an unexpected error.
    ///
    /// An unknown handle is a contract violation between the two sides,
    /// never a recoverable user-facing condition.
    pub fn dispatch(
        &self,
        handle: u64,
        method: i32,
        args: &[u8],
    ) -> Result<CallbackOutcome, ProtocolError> {
        if method == CALLBACK_METHOD_FREE {
            self.remove(handle);
            return Ok(CallbackOutcome::Success(Vec::new()));
        }
        let handler = self.get(handle).ok_or_else(|| {
            error!(handle, method, "native code invoked an unknown callback handle");
            ProtocolError::UnknownCallbackHandle(handle)
        })?;
        match catch_unwind(AssertUnwindSafe(|| handler.invoke(method, args))) {
            Ok(outcome) => Ok(outcome),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    handle,
                    method,
                    interface = handler.interface_name(),
                    message = %message,
                    "callback panicked"
                );
                Ok(CallbackOutcome::Unexpected(message))
            }
        }
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("len", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "callback panicked".to_string()
    }
}

/// The invocation entry point in its raw ABI shape.
///
/// Generated bindings wrap this in the `extern "C"` function whose address
/// is handed to the native library at registration time (see
/// [`CallbackEntryFn`](crate::abi::CallbackEntryFn)). It never panics and
/// never unwinds: every failure, including a contract violation, is
/// reported through the return code and the out buffer.
///
/// # Safety
///
/// `args` must point to `args_len` readable bytes (or be null with a zero
/// length), and `out` must point to a writable, unowned `WireBuffer`.
pub unsafe fn dispatch_raw(
    registry: &CallbackRegistry,
    handle: u64,
    method: i32,
    args: *const u8,
    args_len: i32,
    out: *mut WireBuffer,
) -> i32 {
    let args = if args.is_null() || args_len <= 0 {
        if args_len < 0 {
            error!(handle, method, args_len, "negative callback argument length");
            return write_unexpected(
                out,
                &ProtocolError::NegativeArgLength(args_len).to_string(),
            );
        }
        &[][..]
    } else {
        std::slice::from_raw_parts(args, args_len as usize)
    };

    match registry.dispatch(handle, method, args) {
        Ok(CallbackOutcome::Success(bytes)) => match WireBuffer::from_vec(bytes) {
            Ok(buf) => {
                out.write(buf);
                CALLBACK_SUCCESS
            }
            Err(_) => write_unexpected(out, "callback result too large for wire buffer"),
        },
        Ok(CallbackOutcome::DomainError(bytes)) => match WireBuffer::from_vec(bytes) {
            Ok(buf) => {
                out.write(buf);
                CALLBACK_DOMAIN_ERROR
            }
            Err(_) => write_unexpected(out, "callback error too large for wire buffer"),
        },
        Ok(CallbackOutcome::Unexpected(message)) => write_unexpected(out, &message),
        Err(err) => write_unexpected(out, &err.to_string()),
    }
}

unsafe fn write_unexpected(out: *mut WireBuffer, message: &str) -> i32 {
    let buf = encode_value(message)
        .ok()
        .and_then(|bytes| WireBuffer::from_vec(bytes).ok())
        .unwrap_or_else(WireBuffer::empty);
    out.write(buf);
    CALLBACK_UNEXPECTED_ERROR
}
