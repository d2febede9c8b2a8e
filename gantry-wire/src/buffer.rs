//! The cross-boundary byte buffer.
//!
//! [`WireBuffer`] is the only way bulk data crosses the language boundary.
//! Its layout is part of the wire contract: three fields, in this order,
//! identical on 32- and 64-bit builds of either side.
//!
//! Ownership rule: exactly one side frees a given buffer, exactly once.
//! Buffers built here (from a `Vec<u8>`) must be reclaimed here; buffers
//! allocated by the native library must be released through the library's
//! exported free function, never through this module.

use std::ptr;

use crate::error::CodecError;

/// A byte buffer with C-compatible layout, passed across the FFI boundary.
///
/// Invariants:
/// - `len <= capacity`
/// - `data` is null iff `capacity == 0 && len == 0`
///
/// `WireBuffer` is deliberately not `Clone`: a clone would create two owners
/// of one allocation. Single-free is enforced by move semantics, so consuming
/// methods ([`into_vec`](Self::into_vec), [`destroy`](Self::destroy)) cannot
/// be called twice on the same buffer.
#[repr(C)]
#[derive(Debug)]
pub struct WireBuffer {
    capacity: i32,
    len: i32,
    data: *mut u8,
}

// The data pointer is uniquely owned; sending the buffer to another thread
// moves that ownership with it.
unsafe impl Send for WireBuffer {}

impl WireBuffer {
    /// Create an empty buffer (null data, zero capacity).
    pub fn empty() -> Self {
        Self {
            capacity: 0,
            len: 0,
            data: ptr::null_mut(),
        }
    }

    /// Take ownership of a `Vec<u8>` and expose it as a wire buffer.
    ///
    /// Fails if the vector's length or capacity does not fit the 32-bit
    /// wire fields. An empty vector becomes the canonical null buffer.
    pub fn from_vec(mut v: Vec<u8>) -> Result<Self, CodecError> {
        if v.capacity() == 0 {
            return Ok(Self::empty());
        }
        let capacity =
            i32::try_from(v.capacity()).map_err(|_| CodecError::Oversize { len: v.capacity() })?;
        let len = i32::try_from(v.len()).map_err(|_| CodecError::Oversize { len: v.len() })?;
        let data = v.as_mut_ptr();
        std::mem::forget(v);
        Ok(Self {
            capacity,
            len,
            data,
        })
    }

    /// Copy a complete byte sequence into a new cross-boundary buffer.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        Self::from_vec(bytes.to_vec())
    }

    /// Number of valid bytes in the buffer.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Check the struct-level invariants.
    ///
    /// A buffer handed over by the native side must pass this before any
    /// field is trusted. Returns false on a negative length, `len` beyond
    /// `capacity`, or a null/non-null pointer that disagrees with the
    /// capacity.
    pub fn is_well_formed(&self) -> bool {
        if self.capacity < 0 || self.len < 0 || self.len > self.capacity {
            return false;
        }
        if self.data.is_null() {
            self.capacity == 0 && self.len == 0
        } else {
            self.capacity > 0
        }
    }

    /// Borrow the valid bytes as a slice.
    ///
    /// A reader view only: the buffer still owns its allocation and must
    /// still be freed exactly once after the read completes.
    ///
    /// # Safety
    ///
    /// `self` must be well-formed and its data pointer must still be valid
    /// (not yet freed by either side).
    pub unsafe fn as_slice(&self) -> &[u8] {
        if self.data.is_null() {
            &[]
        } else {
            std::slice::from_raw_parts(self.data, self.len as usize)
        }
    }

    /// Reclaim the buffer as the `Vec<u8>` it was built from.
    ///
    /// # Safety
    ///
    /// The buffer must have been created by [`from_vec`](Self::from_vec) on
    /// this side of the boundary. Reclaiming a native-allocated buffer here
    /// would hand foreign memory to Rust's allocator.
    pub unsafe fn into_vec(self) -> Vec<u8> {
        if self.data.is_null() {
            return Vec::new();
        }
        Vec::from_raw_parts(self.data, self.len as usize, self.capacity as usize)
    }

    /// Free the buffer's allocation.
    ///
    /// # Safety
    ///
    /// Same contract as [`into_vec`](Self::into_vec): the allocation must
    /// originate from this side.
    pub unsafe fn destroy(self) {
        drop(self.into_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_has_null_data() {
        let buf = WireBuffer::empty();
        assert!(buf.is_empty());
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.capacity(), 0);
        assert!(buf.data.is_null());
        assert!(buf.is_well_formed());
    }

    #[test]
    fn from_vec_roundtrips() {
        let buf = WireBuffer::from_vec(vec![1, 2, 3]).unwrap();
        assert_eq!(buf.len(), 3);
        assert!(buf.capacity() >= 3);
        assert!(buf.is_well_formed());
        let back = unsafe { buf.into_vec() };
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn from_empty_vec_is_canonical_null() {
        let buf = WireBuffer::from_vec(Vec::new()).unwrap();
        assert!(buf.data.is_null());
        assert!(buf.is_well_formed());
        let back = unsafe { buf.into_vec() };
        assert!(back.is_empty());
    }

    #[test]
    fn from_slice_copies_the_bytes() {
        let original = vec![9, 8, 7];
        let buf = WireBuffer::from_slice(&original).unwrap();
        drop(original);
        let back = unsafe { buf.into_vec() };
        assert_eq!(back, vec![9, 8, 7]);
    }

    #[test]
    fn reader_view_leaves_ownership_intact() {
        let buf = WireBuffer::from_vec(b"hello".to_vec()).unwrap();
        let view = unsafe { buf.as_slice() };
        assert_eq!(view, b"hello");
        // The buffer is still live and still ours to free.
        unsafe { buf.destroy() };
    }

    #[test]
    fn well_formed_rejects_bad_invariants() {
        let mut bad = WireBuffer::from_vec(vec![1, 2, 3, 4]).unwrap();
        bad.len = bad.capacity + 1;
        assert!(!bad.is_well_formed());
        bad.len = -1;
        assert!(!bad.is_well_formed());
        // Restore before freeing so into_vec sees sane numbers.
        bad.len = 4;
        unsafe { bad.destroy() };

        let mut null_with_cap = WireBuffer::empty();
        null_with_cap.capacity = 8;
        assert!(!null_with_cap.is_well_formed());
    }

    #[test]
    fn layout_matches_wire_contract() {
        // {capacity: i32, len: i32, data: pointer} with C field ordering.
        assert_eq!(std::mem::offset_of!(WireBuffer, capacity), 0);
        assert_eq!(std::mem::offset_of!(WireBuffer, len), 4);
        assert_eq!(std::mem::offset_of!(WireBuffer, data), 8);
    }
}
