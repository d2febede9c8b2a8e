//! Low-level wire codec: big-endian writer and strict reader.
//!
//! The byte layout is a cross-language contract, fixed at both ends:
//! - Integers and floats: fixed width, big-endian.
//! - Strings and byte arrays: 4-byte big-endian length prefix, then raw bytes.
//! - Optionals: 1-byte discriminant (0 absent, 1 present), then the value.
//! - Tagged variants: 4-byte big-endian 1-based index, then the fields.
//! - Sequences and mappings: 4-byte big-endian count, then the elements.
//! - Durations: u64 seconds + u32 nanoseconds. Timestamps: i64 seconds +
//!   u32 nanoseconds, nanoseconds always non-negative (borrowed from the
//!   seconds field for pre-epoch instants).
//!
//! [`WireReader::finish`] enforces strict consumption: a top-level value
//! must account for every byte in its buffer.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::buffer::WireBuffer;
use crate::error::CodecError;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Grow-as-you-write encoder over an owned byte vector.
///
/// The writer never needs the final size up front; the backing vector grows
/// as values are appended and is handed off as a [`WireBuffer`] or `Vec<u8>`
/// when encoding completes.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with a capacity hint.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write a boolean as a single byte (0 or 1).
    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    /// Write an unsigned 8-bit integer.
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Write a signed 8-bit integer.
    pub fn write_i8(&mut self, v: i8) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write an unsigned 16-bit integer, big-endian.
    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write a signed 16-bit integer, big-endian.
    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write an unsigned 32-bit integer, big-endian.
    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write a signed 32-bit integer, big-endian.
    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write an unsigned 64-bit integer, big-endian.
    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write a signed 64-bit integer, big-endian.
    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write a 32-bit float, big-endian.
    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write a 64-bit float, big-endian.
    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write a sequence/mapping count or length prefix.
    pub fn write_len(&mut self, n: usize) -> Result<(), CodecError> {
        let n = i32::try_from(n).map_err(|_| CodecError::Oversize { len: n })?;
        self.write_i32(n);
        Ok(())
    }

    /// Write a byte array: length prefix, then the raw bytes.
    pub fn write_bytes(&mut self, v: &[u8]) -> Result<(), CodecError> {
        self.write_len(v.len())?;
        self.buf.extend_from_slice(v);
        Ok(())
    }

    /// Write a UTF-8 string: length prefix, then the raw bytes.
    pub fn write_string(&mut self, v: &str) -> Result<(), CodecError> {
        self.write_bytes(v.as_bytes())
    }

    /// Write a tagged-variant index (1-based).
    pub fn write_variant(&mut self, tag: i32) {
        self.write_i32(tag);
    }

    /// Write a duration from signed seconds/nanoseconds parts.
    ///
    /// A negative nanosecond remainder is normalized by borrowing from the
    /// seconds field, so the on-wire pair always has a non-negative
    /// nanosecond component. A duration that is negative after normalization
    /// is rejected: the native side's duration type is unsigned.
    pub fn write_duration_parts(&mut self, seconds: i64, nanos: i64) -> Result<(), CodecError> {
        let carry = nanos.div_euclid(i64::from(NANOS_PER_SEC));
        let norm_nanos = nanos.rem_euclid(i64::from(NANOS_PER_SEC)) as u32;
        let norm_seconds = seconds
            .checked_add(carry)
            .ok_or(CodecError::NegativeDuration { seconds, nanos })?;
        if norm_seconds < 0 {
            return Err(CodecError::NegativeDuration { seconds, nanos });
        }
        self.write_u64(norm_seconds as u64);
        self.write_u32(norm_nanos);
        Ok(())
    }

    /// Write a `Duration` as u64 seconds + u32 nanoseconds.
    pub fn write_duration(&mut self, d: Duration) {
        self.write_u64(d.as_secs());
        self.write_u32(d.subsec_nanos());
    }

    /// Write a timestamp as a signed offset from the Unix epoch.
    ///
    /// On-wire form is i64 seconds + u32 nanoseconds with the nanosecond
    /// component always non-negative; instants before the epoch borrow from
    /// the seconds field (epoch minus half a second is `(-1, 500_000_000)`).
    pub fn write_timestamp(&mut self, t: SystemTime) -> Result<(), CodecError> {
        let (seconds, nanos) = match t.duration_since(UNIX_EPOCH) {
            Ok(d) => {
                let secs =
                    i64::try_from(d.as_secs()).map_err(|_| CodecError::TimestampOutOfRange)?;
                (secs, d.subsec_nanos())
            }
            Err(e) => {
                let d = e.duration();
                let mag =
                    i64::try_from(d.as_secs()).map_err(|_| CodecError::TimestampOutOfRange)?;
                if d.subsec_nanos() == 0 {
                    (-mag, 0)
                } else {
                    // Borrow one second so the nanosecond field stays positive.
                    (
                        mag.checked_neg()
                            .and_then(|s| s.checked_sub(1))
                            .ok_or(CodecError::TimestampOutOfRange)?,
                        NANOS_PER_SEC - d.subsec_nanos(),
                    )
                }
            }
        };
        self.write_i64(seconds);
        self.write_u32(nanos);
        Ok(())
    }

    /// Finish encoding and take the raw bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Finish encoding into a cross-boundary buffer.
    pub fn into_buffer(self) -> Result<WireBuffer, CodecError> {
        WireBuffer::from_vec(self.buf)
    }
}

/// Strict decoder over a borrowed byte slice.
///
/// Every read is bounds-checked; running out of bytes mid-value is a
/// [`CodecError::UnexpectedEnd`]. After decoding a top-level value, call
/// [`finish`](Self::finish): leftover bytes are a schema mismatch and fail
/// loudly rather than being ignored.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Create a reader over a byte slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEnd {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let slice = self.take(N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(slice);
        Ok(arr)
    }

    /// Read a boolean byte; anything other than 0 or 1 is an error.
    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::InvalidBool(other)),
        }
    }

    /// Read an unsigned 8-bit integer.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    /// Read a signed 8-bit integer.
    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(i8::from_be_bytes(self.take_array()?))
    }

    /// Read an unsigned 16-bit integer, big-endian.
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    /// Read a signed 16-bit integer, big-endian.
    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_be_bytes(self.take_array()?))
    }

    /// Read an unsigned 32-bit integer, big-endian.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    /// Read a signed 32-bit integer, big-endian.
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    /// Read an unsigned 64-bit integer, big-endian.
    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    /// Read a signed 64-bit integer, big-endian.
    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    /// Read a 32-bit float, big-endian.
    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_be_bytes(self.take_array()?))
    }

    /// Read a 64-bit float, big-endian.
    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_be_bytes(self.take_array()?))
    }

    /// Read a count or length prefix; negative values are an error.
    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        let n = self.read_i32()?;
        if n < 0 {
            return Err(CodecError::NegativeLength(n));
        }
        Ok(n as usize)
    }

    /// Read a length-prefixed byte array.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(CodecError::InvalidUtf8)
    }

    /// Read a tagged-variant index (1-based).
    ///
    /// The caller matches the tag against its closed set of variants and
    /// reports [`CodecError::UnknownVariantTag`] for anything else; decoding
    /// never falls through to a silent default.
    pub fn read_variant(&mut self) -> Result<i32, CodecError> {
        self.read_i32()
    }

    /// Read a duration written as u64 seconds + u32 nanoseconds.
    pub fn read_duration(&mut self) -> Result<Duration, CodecError> {
        let seconds = self.read_u64()?;
        let nanos = self.read_u32()?;
        if nanos >= NANOS_PER_SEC {
            return Err(CodecError::InvalidNanos(nanos));
        }
        Ok(Duration::new(seconds, nanos))
    }

    /// Read a timestamp written as i64 seconds + u32 nanoseconds.
    pub fn read_timestamp(&mut self) -> Result<SystemTime, CodecError> {
        let seconds = self.read_i64()?;
        let nanos = self.read_u32()?;
        if nanos >= NANOS_PER_SEC {
            return Err(CodecError::InvalidNanos(nanos));
        }
        if seconds >= 0 {
            UNIX_EPOCH
                .checked_add(Duration::new(seconds as u64, nanos))
                .ok_or(CodecError::TimestampOutOfRange)
        } else if nanos == 0 {
            UNIX_EPOCH
                .checked_sub(Duration::new(seconds.unsigned_abs(), 0))
                .ok_or(CodecError::TimestampOutOfRange)
        } else {
            // Undo the encoder's borrow: seconds is the floor of the offset.
            UNIX_EPOCH
                .checked_sub(Duration::new(
                    seconds.unsigned_abs() - 1,
                    NANOS_PER_SEC - nanos,
                ))
                .ok_or(CodecError::TimestampOutOfRange)
        }
    }

    /// Assert that the buffer is fully consumed.
    ///
    /// Leftover bytes after a top-level value mean the two sides disagree
    /// about the schema; that must surface as an error, never a truncation.
    pub fn finish(self) -> Result<(), CodecError> {
        let count = self.remaining();
        if count == 0 {
            return Ok(());
        }
        let excerpt = hex::encode(&self.buf[self.pos..self.buf.len().min(self.pos + 8)]);
        Err(CodecError::TrailingBytes { count, excerpt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Worked byte-level examples from the wire contract ---

    #[test]
    fn i32_million_encodes_big_endian() {
        let mut w = WireWriter::new();
        w.write_i32(1_000_000);
        assert_eq!(w.finish(), vec![0x00, 0x0F, 0x42, 0x40]);

        let mut r = WireReader::new(&[0x00, 0x0F, 0x42, 0x40]);
        assert_eq!(r.read_i32().unwrap(), 1_000_000);
        r.finish().unwrap();
    }

    #[test]
    fn string_hi_encodes_with_length_prefix() {
        let mut w = WireWriter::new();
        w.write_string("hi").unwrap();
        assert_eq!(w.finish(), vec![0x00, 0x00, 0x00, 0x02, b'h', b'i']);

        let mut r = WireReader::new(&[0x00, 0x00, 0x00, 0x02, b'h', b'i']);
        assert_eq!(r.read_string().unwrap(), "hi");
        r.finish().unwrap();
    }

    // --- Primitive widths and byte order ---

    #[test]
    fn integers_are_fixed_width_big_endian() {
        let mut w = WireWriter::new();
        w.write_u16(0x0102);
        w.write_i16(-2);
        w.write_u64(0x0102030405060708);
        w.write_i64(i64::MIN);
        let bytes = w.finish();
        assert_eq!(&bytes[0..2], &[0x01, 0x02]);
        assert_eq!(&bytes[2..4], &[0xFF, 0xFE]);
        assert_eq!(
            &bytes[4..12],
            &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]
        );

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_u16().unwrap(), 0x0102);
        assert_eq!(r.read_i16().unwrap(), -2);
        assert_eq!(r.read_u64().unwrap(), 0x0102030405060708);
        assert_eq!(r.read_i64().unwrap(), i64::MIN);
        r.finish().unwrap();
    }

    #[test]
    fn floats_roundtrip_through_be_bits() {
        let mut w = WireWriter::new();
        w.write_f32(1.5);
        w.write_f64(-0.25);
        let bytes = w.finish();
        assert_eq!(&bytes[0..4], &[0x3F, 0xC0, 0x00, 0x00]);

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.read_f64().unwrap(), -0.25);
        r.finish().unwrap();
    }

    #[test]
    fn bool_rejects_junk_bytes() {
        let mut r = WireReader::new(&[2]);
        assert!(matches!(r.read_bool(), Err(CodecError::InvalidBool(2))));
    }

    // --- Strict consumption ---

    #[test]
    fn truncated_value_fails_with_unexpected_end() {
        let mut r = WireReader::new(&[0x00, 0x0F]);
        let err = r.read_i32().unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnexpectedEnd {
                needed: 4,
                remaining: 2
            }
        ));
    }

    #[test]
    fn trailing_bytes_fail_loudly() {
        let mut r = WireReader::new(&[0x00, 0x00, 0x00, 0x01, 0xAB, 0xCD]);
        let _ = r.read_i32().unwrap();
        let err = r.finish().unwrap_err();
        match err {
            CodecError::TrailingBytes { count, excerpt } => {
                assert_eq!(count, 2);
                assert_eq!(excerpt, "abcd");
            }
            other => panic!("expected TrailingBytes, got {other:?}"),
        }
    }

    #[test]
    fn string_length_prefix_cannot_be_negative() {
        let mut r = WireReader::new(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            r.read_len(),
            Err(CodecError::NegativeLength(-1))
        ));
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        let mut w = WireWriter::new();
        w.write_bytes(&[0xFF, 0xFE]).unwrap();
        let bytes = w.finish();
        let mut r = WireReader::new(&bytes);
        assert!(matches!(r.read_string(), Err(CodecError::InvalidUtf8(_))));
    }

    // --- Durations ---

    #[test]
    fn duration_roundtrip() {
        let mut w = WireWriter::new();
        w.write_duration(Duration::new(5, 250_000_000));
        let bytes = w.finish();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_duration().unwrap(), Duration::new(5, 250_000_000));
        r.finish().unwrap();
    }

    #[test]
    fn duration_parts_borrow_negative_nanos() {
        // 2s - 500ms normalizes to 1.5s on the wire.
        let mut w = WireWriter::new();
        w.write_duration_parts(2, -500_000_000).unwrap();
        let bytes = w.finish();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_duration().unwrap(), Duration::new(1, 500_000_000));
    }

    #[test]
    fn duration_parts_carry_excess_nanos() {
        let mut w = WireWriter::new();
        w.write_duration_parts(0, 2_500_000_000).unwrap();
        let bytes = w.finish();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_duration().unwrap(), Duration::new(2, 500_000_000));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut w = WireWriter::new();
        let err = w.write_duration_parts(-1, 0).unwrap_err();
        assert!(matches!(err, CodecError::NegativeDuration { .. }));

        // Negative after normalization too.
        let err = w.write_duration_parts(0, -1).unwrap_err();
        assert!(matches!(err, CodecError::NegativeDuration { .. }));
    }

    #[test]
    fn duration_nanos_field_is_validated() {
        let mut w = WireWriter::new();
        w.write_u64(1);
        w.write_u32(1_000_000_000);
        let bytes = w.finish();
        let mut r = WireReader::new(&bytes);
        assert!(matches!(
            r.read_duration(),
            Err(CodecError::InvalidNanos(1_000_000_000))
        ));
    }

    // --- Timestamps ---

    #[test]
    fn timestamp_roundtrip_after_epoch() {
        let t = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
        let mut w = WireWriter::new();
        w.write_timestamp(t).unwrap();
        let bytes = w.finish();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_timestamp().unwrap(), t);
        r.finish().unwrap();
    }

    #[test]
    fn timestamp_before_epoch_borrows_seconds() {
        let t = UNIX_EPOCH - Duration::from_millis(500);
        let mut w = WireWriter::new();
        w.write_timestamp(t).unwrap();
        let bytes = w.finish();

        // On the wire: seconds = -1, nanos = 500_000_000.
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_i64().unwrap(), -1);
        assert_eq!(r.read_u32().unwrap(), 500_000_000);

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_timestamp().unwrap(), t);
    }

    #[test]
    fn timestamp_whole_seconds_before_epoch() {
        let t = UNIX_EPOCH - Duration::new(3, 0);
        let mut w = WireWriter::new();
        w.write_timestamp(t).unwrap();
        let bytes = w.finish();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_timestamp().unwrap(), t);
    }

    // --- Writer plumbing ---

    #[test]
    fn writer_grows_without_upfront_size() {
        let mut w = WireWriter::new();
        for i in 0..1000u32 {
            w.write_u32(i);
        }
        assert_eq!(w.len(), 4000);
    }

    #[test]
    fn writer_into_buffer_hands_off_ownership() {
        let mut w = WireWriter::new();
        w.write_string("payload").unwrap();
        let buf = w.into_buffer().unwrap();
        assert_eq!(buf.len(), 11);
        let bytes = unsafe { buf.into_vec() };
        assert_eq!(&bytes[4..], b"payload");
    }
}
