//! Opaque native object lifecycle.
//!
//! A [`NativeObject`] wraps a pointer that physically lives on the other
//! side of the boundary. Any number of threads may call methods on it
//! concurrently; the lifecycle guarantees the native free function runs
//! exactly once, after the last in-flight call releases, even when an
//! explicit destroy races those calls.
//!
//! The mechanism is a single atomic counter rather than a mutex around
//! every method call, so concurrent calls never serialize against each
//! other. Counter states:
//! - `n >= 0`: alive, with `n` in-flight calls each holding +1;
//! - the explicit destroy (or the owner dropping the object) contributes
//!   the final -1; whichever decrement lands the counter on -1 frees the
//!   pointer and the handle is terminal.
//!
//! Get this arithmetic wrong and the failure mode is a native double-free
//! or a permanent leak, which is why every transition below is a CAS or a
//! single atomic RMW.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use tracing::{debug, error};

use crate::abi::ObjectFreeFn;
use crate::error::ProtocolError;

/// Counter value that marks the handle as freed.
const FREED: i64 = -1;

/// A concurrency-safe handle to an object owned by the native library.
///
/// Created when a constructor call returns a native pointer. Every method
/// call brackets its access with [`acquire`](Self::acquire); the returned
/// guard releases on drop, so a call site cannot forget the matching
/// release. Dropping the object itself requests destruction, making Rust
/// ownership the primary cleanup path rather than a finalizer of last
/// resort.
#[derive(Debug)]
pub struct NativeObject {
    ptr: *mut c_void,
    call_counter: AtomicI64,
    destroyed: AtomicBool,
    free_fn: ObjectFreeFn,
}

// The pointer is an opaque token for the native side; all mutation of the
// handle's own state goes through the atomics.
unsafe impl Send for NativeObject {}
unsafe impl Sync for NativeObject {}

/// A live reference to a [`NativeObject`], held for the duration of one
/// native call. Releases its +1 on drop.
#[derive(Debug)]
pub struct ObjectRef<'a> {
    object: &'a NativeObject,
}

impl ObjectRef<'_> {
    /// The native pointer, valid until this guard drops.
    pub fn as_ptr(&self) -> *mut c_void {
        self.object.ptr
    }
}

impl Drop for ObjectRef<'_> {
    fn drop(&mut self) {
        self.object.release();
    }
}

impl NativeObject {
    /// Wrap a pointer returned by a native constructor.
    ///
    /// `free_fn` is the library's deallocator for this object type; it runs
    /// exactly once, when the last holder lets go.
    pub fn new(ptr: *mut c_void, free_fn: ObjectFreeFn) -> Self {
        Self {
            ptr,
            call_counter: AtomicI64::new(0),
            destroyed: AtomicBool::new(false),
            free_fn,
        }
    }

    /// Take a temporary reference for the duration of one native call.
    ///
    /// Fails if the object has been destroyed (using a stale handle is a
    /// programming error, and returning the pointer anyway would hand out
    /// freed memory), or if the in-flight counter would overflow.
    pub fn acquire(&self) -> Result<ObjectRef<'_>, ProtocolError> {
        loop {
            if self.destroyed.load(Ordering::Acquire) {
                error!("attempted to use a native object after destroy");
                return Err(ProtocolError::UseAfterDestroy);
            }
            let counter = self.call_counter.load(Ordering::Acquire);
            if counter < 0 {
                error!("attempted to use a native object after free");
                return Err(ProtocolError::UseAfterDestroy);
            }
            if counter == i64::MAX {
                return Err(ProtocolError::CallCounterOverflow);
            }
            if self
                .call_counter
                .compare_exchange_weak(counter, counter + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(ObjectRef { object: self });
            }
        }
    }

    /// Drop one holder's +1; the decrement that lands on the sentinel frees
    /// the pointer. Only one thread can observe that transition, so the
    /// free function runs exactly once.
    fn release(&self) {
        if self.call_counter.fetch_sub(1, Ordering::AcqRel) == 0 {
            debug!(ptr = ?self.ptr, "freeing native object");
            unsafe { (self.free_fn)(self.ptr) };
        }
    }

    /// Request destruction. Idempotent: only the first call contributes the
    /// final -1; later calls (including the drop-driven one) are no-ops.
    ///
    /// In-flight calls on other threads finish normally; the free function
    /// runs after the last of them releases.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(ptr = ?self.ptr, "native object destroy requested");
        self.release();
    }
}

impl Drop for NativeObject {
    fn drop(&mut self) {
        self.destroy();
    }
}
