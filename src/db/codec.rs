// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Opaque blob encoding for `extra` attribute maps.
//!
//! Podcasts and episodes carry an open-ended attribute map which is stored
//! in a single `extra` column. The storage layer does not interpret those
//! bytes; it only requires that a codec round-trips a map byte-for-byte.
//! The codec is injected into the persistence backend, so the wire format
//! can be swapped without touching any query code.

use thiserror::Error;

use crate::model::ExtraMap;

/// Error raised by an [`ExtraCodec`]. A codec failure aborts the enclosing
/// storage operation the same way a failed statement does.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode extra attributes: {reason}")]
    Encode { reason: String },

    #[error("failed to decode extra attributes: {reason}")]
    Decode { reason: String },
}

/// Encodes and decodes an attribute map to the opaque `extra` blob.
pub trait ExtraCodec: Send + Sync {
    fn encode(&self, extra: &ExtraMap) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, blob: &[u8]) -> Result<ExtraMap, CodecError>;
}

/// Default codec: JSON over the ordered attribute map.
///
/// The map is ordered, so encoding the same map always produces the same
/// bytes.
#[derive(Debug, Default)]
pub struct JsonCodec;

impl ExtraCodec for JsonCodec {
    fn encode(&self, extra: &ExtraMap) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(extra).map_err(|e| CodecError::Encode {
            reason: e.to_string(),
        })
    }

    fn decode(&self, blob: &[u8]) -> Result<ExtraMap, CodecError> {
        // Rows written before any extra attributes existed hold an empty
        // blob rather than an encoded empty map.
        if blob.is_empty() {
            return Ok(ExtraMap::new());
        }

        serde_json::from_slice(blob).map_err(|e| CodecError::Decode {
            reason: e.to_string(),
        })
    }
}
