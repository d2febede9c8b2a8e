//! Raw ABI surface shared with the native library.
//!
//! Function-pointer shapes and symbol-name conventions are part of the wire
//! contract; the generated bindings and the native library must agree on
//! them exactly. Symbol names are `<prefix>_<suffix>`, where the prefix
//! comes from [`BridgeConfig`](crate::BridgeConfig).

use std::ffi::c_void;

use gantry_wire::WireBuffer;

use crate::status::NativeCallStatus;

/// Frees a native object once its last holder releases it.
pub type ObjectFreeFn = unsafe extern "C" fn(ptr: *mut c_void);

/// Releases a buffer whose backing memory the native side allocated.
pub type BufferFreeFn = unsafe extern "C" fn(buf: WireBuffer);

/// Reports the library's contract version.
pub type ContractVersionFn = unsafe extern "C" fn() -> u32;

/// Reports the checksum of one exported function's signature.
pub type ChecksumFn = unsafe extern "C" fn() -> u16;

/// The callback-invocation entry point handed to the native library.
///
/// `method` 0 is always "release this handle". The return code is one of
/// the `CALLBACK_*` codes in [`registry`](crate::registry).
pub type CallbackEntryFn = unsafe extern "C" fn(
    handle: u64,
    method: i32,
    args: *const u8,
    args_len: i32,
    out: *mut WireBuffer,
) -> i32;

/// Shape of every fallible native function: last parameter is the
/// out-parameter status record the native side overwrites before returning.
pub type CallStatusPtr = *mut NativeCallStatus;

/// Symbol suffix for the contract-version exchange.
pub const SYM_CONTRACT_VERSION: &str = "contract_version";

/// Symbol suffix prefix for per-function checksums
/// (full suffix is `checksum_<function>`).
pub const SYM_CHECKSUM: &str = "checksum";

/// Symbol suffix for the native side's buffer-free entry point.
pub const SYM_BUFFER_FREE: &str = "buffer_free";

/// Free a [`WireBuffer`] whose backing memory this side allocated.
///
/// The native library calls this (it receives the address at startup)
/// after consuming an argument buffer, so the allocation is returned to
/// the allocator that created it. Ill-formed buffers are ignored rather
/// than fed to the allocator.
///
/// # Safety
///
/// `buf` must have been produced by this crate (via
/// [`WireBuffer::from_vec`] or a [`WireWriter`](gantry_wire::WireWriter))
/// and not freed before.
#[no_mangle]
pub unsafe extern "C" fn gantry_buffer_free(buf: WireBuffer) {
    if buf.is_well_formed() {
        buf.destroy();
    }
}
