//! Per-call status channel.
//!
//! Every fallible native function takes a [`NativeCallStatus`] out-parameter
//! and overwrites it before returning. The calling wrapper inspects it
//! immediately: success, a typed domain error (decoded with the same codec
//! as any other value), or a native panic. The status is produced anew for
//! every call and never persisted.

use tracing::error;

use gantry_wire::{decode_value, Decode, WireBuffer};

use crate::error::{CallError, PanicError, ProtocolError};

/// The call completed and its return value (if any) is valid.
pub const CALL_SUCCESS: i8 = 0;
/// The call failed with a typed domain error in the payload.
pub const CALL_DOMAIN_ERROR: i8 = 1;
/// The native side panicked; the payload may carry a message string.
pub const CALL_PANIC: i8 = 2;

/// Status record attached to every fallible native call.
///
/// Layout is part of the wire contract: an `i8` code followed by the
/// payload buffer, C field ordering.
#[repr(C)]
#[derive(Debug)]
pub struct NativeCallStatus {
    code: i8,
    error_buf: WireBuffer,
}

impl NativeCallStatus {
    /// A fresh status, handed to the native side to overwrite.
    pub fn pending() -> Self {
        Self {
            code: CALL_SUCCESS,
            error_buf: WireBuffer::empty(),
        }
    }

    /// Raw pointer for the native call's out-parameter.
    pub fn as_mut_ptr(&mut self) -> *mut NativeCallStatus {
        self as *mut NativeCallStatus
    }

    /// The status code as written by the native side.
    pub fn code(&self) -> i8 {
        self.code
    }

    /// Overwrite the status, as the native side does before returning.
    ///
    /// In-process test doubles standing in for a native library use this to
    /// produce the statuses a real library would write through the pointer.
    pub fn set(&mut self, code: i8, error_buf: WireBuffer) {
        self.code = code;
        self.error_buf = error_buf;
    }
}

impl Default for NativeCallStatus {
    fn default() -> Self {
        Self::pending()
    }
}

/// Reclaims buffers whose backing memory the native side allocated.
///
/// Reading a native-returned buffer copies the bytes out and then releases
/// the allocation through its owner, so `malloc`/`free` never cross the
/// boundary mismatched. [`NativeLibrary`](crate::NativeLibrary) implements
/// this with the library's exported free function.
pub trait ForeignBufferFree {
    /// Copy out the contents, then release the allocation to its owner.
    fn consume(&self, buf: WireBuffer) -> Result<Vec<u8>, ProtocolError>;
}

/// Inspect a consumed call status.
///
/// - `CALL_SUCCESS`: `Ok(())`.
/// - `CALL_DOMAIN_ERROR`: the payload decodes as `E`.
/// - `CALL_PANIC`: a non-empty payload decodes as the panic message; an
///   empty payload means the native side failed while reporting the panic
///   and surfaces as the distinct [`PanicError::DoubleFault`].
/// - Any other code is a fatal protocol violation: the two sides disagree
///   on the status contract, so the bridge refuses to guess.
pub fn check_call_status<E: Decode>(
    status: NativeCallStatus,
    free: &dyn ForeignBufferFree,
) -> Result<(), CallError<E>> {
    match status.code {
        CALL_SUCCESS => Ok(()),
        CALL_DOMAIN_ERROR => {
            let bytes = free.consume(status.error_buf)?;
            let domain =
                decode_value::<E>(&bytes).map_err(ProtocolError::MalformedPayload)?;
            Err(CallError::Domain(domain))
        }
        CALL_PANIC => {
            if status.error_buf.is_empty() {
                error!("native side double-faulted while reporting a panic");
                return Err(PanicError::DoubleFault.into());
            }
            let bytes = free.consume(status.error_buf)?;
            let message =
                decode_value::<String>(&bytes).map_err(ProtocolError::MalformedPayload)?;
            error!(message = %message, "native side panicked");
            Err(PanicError::Message(message).into())
        }
        other => {
            error!(code = other, "unknown native call status code");
            Err(ProtocolError::UnknownStatusCode(other).into())
        }
    }
}

/// Bracket a native invocation with status construction and checking.
///
/// The closure receives the fresh status to pass as the call's
/// out-parameter; its return value is handed back once the status checks
/// out. The call blocks the current thread until the native side returns.
pub fn call_native<T, E, F>(free: &dyn ForeignBufferFree, call: F) -> Result<T, CallError<E>>
where
    E: Decode,
    F: FnOnce(&mut NativeCallStatus) -> T,
{
    let mut status = NativeCallStatus::pending();
    let value = call(&mut status);
    check_call_status(status, free)?;
    Ok(value)
}
