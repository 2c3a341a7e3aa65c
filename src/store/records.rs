//! Log, error and stats records
//!
//! Every non-prefix record shares one envelope: a version byte, a count of
//! timestamp blobs, the blobs, then a length-prefixed payload.

use crate::codec::{time_key, Decoder, Encoder};
use crate::error::{CodecResult, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

const ENVELOPE_VERSION: u8 = 1;

/// Separates the path from the timestamp in error keys
const ERROR_KEY_SEPARATOR: u8 = 0;

/// One completed (or interrupted) run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub summary: String,
}

/// A per-path failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub path: String,
    pub time: DateTime<Utc>,
    pub detail: String,
}

/// Serialized aggregate statistics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub time: DateTime<Utc>,
    pub payload: Vec<u8>,
}

impl StatsSnapshot {
    pub fn new<T: Serialize>(time: DateTime<Utc>, value: &T) -> StoreResult<Self> {
        let payload = bincode::serialize(value).map_err(|e| StoreError::Bincode(e.to_string()))?;
        Ok(Self { time, payload })
    }

    pub fn decode_payload<T: DeserializeOwned>(&self) -> StoreResult<T> {
        bincode::deserialize(&self.payload).map_err(|e| StoreError::Bincode(e.to_string()))
    }
}

fn encode_envelope(times: &[&DateTime<Utc>], payload: &[u8]) -> Vec<u8> {
    let mut enc = Encoder::with_capacity(2 + times.len() * 16 + payload.len() + 4);
    enc.put_u8(ENVELOPE_VERSION);
    enc.put_uvarint(times.len() as u64);
    for time in times {
        enc.put_time(time);
    }
    enc.put_bytes(payload);
    enc.finish()
}

fn decode_envelope(bytes: &[u8]) -> CodecResult<(Vec<DateTime<Utc>>, Vec<u8>)> {
    let mut dec = Decoder::new(bytes);
    let version = dec.u8()?;
    if version != ENVELOPE_VERSION {
        return Err(crate::error::CodecError::UnsupportedVersion {
            found: version,
            expected: ENVELOPE_VERSION,
        });
    }
    let count = dec.len_prefix()?;
    let mut times = Vec::with_capacity(count);
    for _ in 0..count {
        times.push(dec.time()?);
    }
    let payload = dec.bytes()?.to_vec();
    dec.finish()?;
    Ok((times, payload))
}

fn corrupt(bucket: &'static str, reason: impl ToString) -> StoreError {
    StoreError::Corrupt {
        bucket,
        reason: reason.to_string(),
    }
}

fn expect_times(
    bucket: &'static str,
    times: Vec<DateTime<Utc>>,
    n: usize,
) -> StoreResult<Vec<DateTime<Utc>>> {
    if times.len() != n {
        return Err(corrupt(
            bucket,
            format!("expected {} timestamps, found {}", n, times.len()),
        ));
    }
    Ok(times)
}

impl LogRecord {
    pub fn key(&self) -> Vec<u8> {
        time_key(&self.start).to_vec()
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_envelope(&[&self.start, &self.stop], self.summary.as_bytes())
    }

    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        let (times, payload) = decode_envelope(bytes).map_err(|e| corrupt("logs", e))?;
        let times = expect_times("logs", times, 2)?;
        Ok(Self {
            start: times[0],
            stop: times[1],
            summary: String::from_utf8(payload).map_err(|e| corrupt("logs", e))?,
        })
    }

    pub fn duration(&self) -> chrono::Duration {
        self.stop - self.start
    }
}

impl ErrorRecord {
    pub fn new(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            time: Utc::now(),
            detail: detail.into(),
        }
    }

    pub fn key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.path.len() + 9);
        key.extend_from_slice(self.path.as_bytes());
        key.push(ERROR_KEY_SEPARATOR);
        key.extend_from_slice(&time_key(&self.time));
        key
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_envelope(&[&self.time], self.detail.as_bytes())
    }

    /// Decode using the path carried in the key
    pub fn decode(key: &[u8], bytes: &[u8]) -> StoreResult<Self> {
        // path, separator, 8-byte time key
        let split = key.len().checked_sub(9).filter(|&i| key[i] == ERROR_KEY_SEPARATOR);
        let split = split.ok_or_else(|| corrupt("errors", "malformed key"))?;
        let path = std::str::from_utf8(&key[..split])
            .map_err(|e| corrupt("errors", e))?
            .to_string();

        let (times, payload) = decode_envelope(bytes).map_err(|e| corrupt("errors", e))?;
        let times = expect_times("errors", times, 1)?;
        Ok(Self {
            path,
            time: times[0],
            detail: String::from_utf8(payload).map_err(|e| corrupt("errors", e))?,
        })
    }
}

impl StatsSnapshot {
    pub fn key(&self) -> Vec<u8> {
        time_key(&self.time).to_vec()
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_envelope(&[&self.time], &self.payload)
    }

    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        let (times, payload) = decode_envelope(bytes).map_err(|e| corrupt("stats", e))?;
        let times = expect_times("stats", times, 1)?;
        Ok(Self {
            time: times[0],
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_log_record_envelope() {
        let log = LogRecord {
            start: Utc.timestamp_opt(1_000, 1).unwrap(),
            stop: Utc.timestamp_opt(1_060, 2).unwrap(),
            summary: "scanned=3 reused=10".into(),
        };
        let decoded = LogRecord::decode(&log.encode()).unwrap();
        assert_eq!(decoded, log);
        assert_eq!(decoded.duration().num_seconds(), 60);
    }

    #[test]
    fn test_error_key_carries_path() {
        let err = ErrorRecord {
            path: "/data/a b".into(),
            time: Utc.timestamp_opt(5, 0).unwrap(),
            detail: "Permission denied".into(),
        };
        let key = err.key();
        assert!(key.starts_with(b"/data/a b\0"));
        assert_eq!(ErrorRecord::decode(&key, &err.encode()).unwrap(), err);
    }

    #[test]
    fn test_wrong_timestamp_count_is_corrupt() {
        let err = ErrorRecord::new("/x", "boom");
        assert!(matches!(
            LogRecord::decode(&err.encode()),
            Err(StoreError::Corrupt { bucket: "logs", .. })
        ));
    }

    #[test]
    fn test_stats_payload() {
        let snap = StatsSnapshot::new(Utc::now(), &vec![1u64, 2, 3]).unwrap();
        let decoded = StatsSnapshot::decode(&snap.encode()).unwrap();
        assert_eq!(decoded.decode_payload::<Vec<u64>>().unwrap(), vec![1, 2, 3]);
    }
}
