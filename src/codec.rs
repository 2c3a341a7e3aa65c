//! Low-level binary codec primitives
//!
//! All persisted records are built from the same handful of primitives:
//! unsigned/zigzag varints, fixed-width big-endian integers, length-prefixed
//! byte strings and a self-describing timestamp blob. Decoding is strictly
//! sequential and never panics on short input.

use crate::error::{CodecError, CodecResult};
use chrono::{DateTime, TimeZone, Utc};

/// Maximum encoded length of a 64-bit varint
const MAX_VARINT_LEN: usize = 10;

/// Version byte leading every timestamp blob
const TIME_BLOB_VERSION: u8 = 1;

/// version + seconds + nanos + offset minutes
const TIME_BLOB_LEN: usize = 1 + 8 + 4 + 2;

/// Append-only byte encoder
#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_uvarint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    /// Signed varint using zigzag encoding
    pub fn put_varint(&mut self, value: i64) {
        self.put_uvarint(zigzag_encode(value));
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_uvarint(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_str(&mut self, value: &str) {
        self.put_bytes(value.as_bytes());
    }

    /// Length-prefixed timestamp blob, always written in UTC
    pub fn put_time(&mut self, time: &DateTime<Utc>) {
        self.put_uvarint(TIME_BLOB_LEN as u64);
        self.buf.push(TIME_BLOB_VERSION);
        self.buf.extend_from_slice(&time.timestamp().to_be_bytes());
        self.buf
            .extend_from_slice(&time.timestamp_subsec_nanos().to_be_bytes());
        self.buf.extend_from_slice(&0i16.to_be_bytes());
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Sequential decoder over a borrowed buffer
#[derive(Debug)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, n: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(CodecError::InsufficientData {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u32(&mut self) -> CodecResult<u32> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn uvarint(&mut self) -> CodecResult<u64> {
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.u8()?;
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(CodecError::InvalidData("varint overflows u64".into()));
            }
            value |= u64::from(byte & 0x7f) << (7 * i);
            if byte < 0x80 {
                return Ok(value);
            }
        }
        Err(CodecError::InvalidData("varint too long".into()))
    }

    pub fn varint(&mut self) -> CodecResult<i64> {
        Ok(zigzag_decode(self.uvarint()?))
    }

    /// Varint that must fit in a u32 (owner ids)
    pub fn uvarint_u32(&mut self) -> CodecResult<u32> {
        let value = self.uvarint()?;
        u32::try_from(value)
            .map_err(|_| CodecError::InvalidData(format!("id {} exceeds u32", value)))
    }

    /// Collection length, bounded by the bytes left so a corrupt count
    /// cannot trigger a huge allocation
    pub fn len_prefix(&mut self) -> CodecResult<usize> {
        let len = self.uvarint()?;
        if len > self.remaining() as u64 {
            return Err(CodecError::InsufficientData {
                needed: usize::try_from(len).unwrap_or(usize::MAX),
                remaining: self.remaining(),
            });
        }
        Ok(len as usize)
    }

    pub fn bytes(&mut self) -> CodecResult<&'a [u8]> {
        let len = self.len_prefix()?;
        self.take(len)
    }

    pub fn string(&mut self) -> CodecResult<String> {
        let bytes = self.bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| CodecError::InvalidData(format!("invalid UTF-8: {}", e)))
    }

    pub fn time(&mut self) -> CodecResult<DateTime<Utc>> {
        let blob = self.bytes()?;
        if blob.len() != TIME_BLOB_LEN {
            return Err(CodecError::InvalidData(format!(
                "timestamp blob has {} bytes",
                blob.len()
            )));
        }
        let mut inner = Decoder::new(blob);
        let version = inner.u8()?;
        if version != TIME_BLOB_VERSION {
            return Err(CodecError::InvalidData(format!(
                "unknown timestamp blob version {}",
                version
            )));
        }
        let secs = i64::from_be_bytes(inner.take_array()?);
        let nanos = inner.u32()?;
        // Offset only affects presentation; the instant is already absolute.
        let _offset_minutes = i16::from_be_bytes(inner.take_array()?);

        Utc.timestamp_opt(secs, nanos)
            .single()
            .ok_or_else(|| CodecError::InvalidData(format!("timestamp {}s+{}ns out of range", secs, nanos)))
    }

    /// Fail if anything is left over
    pub fn finish(self) -> CodecResult<()> {
        if self.remaining() != 0 {
            return Err(CodecError::InvalidData(format!(
                "{} trailing bytes",
                self.remaining()
            )));
        }
        Ok(())
    }
}

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Order-preserving key for a timestamp: nanoseconds with the sign bit
/// flipped, big-endian
pub fn time_key(time: &DateTime<Utc>) -> [u8; 8] {
    let nanos = time
        .timestamp_nanos_opt()
        .unwrap_or(if time.timestamp() < 0 { i64::MIN } else { i64::MAX });
    ((nanos as u64) ^ (1 << 63)).to_be_bytes()
}
