//! Embedding record and binary vector codec.
//!
//! # Invariants
//! - Vectors are stored as consecutive 8-byte little-endian IEEE-754 f64.
//! - At most one embedding exists per entry; a re-save replaces it.
//! - Stored vectors may differ in length across model versions.

use crate::model::entry::EntryId;
use serde::{Deserialize, Serialize};

const COMPONENT_BYTES: usize = std::mem::size_of::<f64>();

/// A dense vector describing one entry's semantic content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub entry_id: EntryId,
    pub vector: Vec<f64>,
    /// Name of the model that produced `vector`.
    pub model: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Embedding {
    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// Encodes a vector into its persisted blob form.
pub fn encode_vector(vector: &[f64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * COMPONENT_BYTES);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decodes a persisted blob.
///
/// Returns `None` when the blob length is not a multiple of 8 bytes.
pub fn decode_vector(blob: &[u8]) -> Option<Vec<f64>> {
    if blob.len() % COMPONENT_BYTES != 0 {
        return None;
    }
    let vector = blob
        .chunks_exact(COMPONENT_BYTES)
        .map(|chunk| {
            let mut raw = [0u8; COMPONENT_BYTES];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    Some(vector)
}

#[cfg(test)]
mod tests {
    use super::{decode_vector, encode_vector};

    #[test]
    fn encoding_is_little_endian_eight_bytes_per_component() {
        let blob = encode_vector(&[1.0, -2.5]);
        assert_eq!(blob.len(), 16);
        assert_eq!(&blob[..8], &1.0f64.to_le_bytes());
        assert_eq!(decode_vector(&blob), Some(vec![1.0, -2.5]));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert_eq!(decode_vector(&[0u8; 12]), None);
        assert_eq!(decode_vector(&[]), Some(Vec::new()));
    }
}
