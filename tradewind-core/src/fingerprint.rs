//! Deterministic content fingerprints for configs, datasets, and runs.
//!
//! All hashing goes through BLAKE3 so the same inputs produce the same
//! identifiers across builds, platforms, and thread counts. Run IDs derived
//! here are what make sweep results sortable and resumable: two runs with
//! equal IDs were produced by byte-identical config and data.

use serde::Serialize;

use crate::domain::candle::Candle;
use crate::error::EngineError;

/// Hex length for shortened identifiers. Long enough that collisions
/// within one sweep are not a practical concern.
const SHORT_HEX: usize = 16;

/// Fingerprint any serializable config section.
///
/// Canonical form is the serde_json encoding; field order is fixed by the
/// struct definition, so equal values always hash equal.
pub fn config_fingerprint<T: Serialize>(value: &T) -> Result<String, EngineError> {
    let canonical = serde_json::to_string(value)
        .map_err(|e| EngineError::Configuration(format!("config not hashable: {e}")))?;
    Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}

/// Content hash of one candle series.
///
/// Hashes every field of every candle in order, with the pair name mixed
/// in, so reordering, editing, truncating, or relabeling the data all
/// change the fingerprint.
pub fn dataset_fingerprint(pair: &str, candles: &[Candle]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(pair.as_bytes());
    for candle in candles {
        hasher.update(&candle.timestamp.timestamp_millis().to_le_bytes());
        hasher.update(&candle.open.to_le_bytes());
        hasher.update(&candle.high.to_le_bytes());
        hasher.update(&candle.low.to_le_bytes());
        hasher.update(&candle.close.to_le_bytes());
        hasher.update(&candle.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Deterministic run identifier from a config fingerprint and a dataset
/// fingerprint, shortened to 16 hex characters for file names and logs.
pub fn run_id(config_hash: &str, dataset_hash: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(config_hash.as_bytes());
    hasher.update(dataset_hash.as_bytes());
    let hex = hasher.finalize().to_hex().to_string();
    hex[..SHORT_HEX].to_string()
}

/// Expand a string tag into a full 32-byte RNG seed.
pub fn seed_from_tag(tag: &str) -> [u8; 32] {
    *blake3::hash(tag.as_bytes()).as_bytes()
}
