//! Opaque, versioned resume cursor across a covering.
//!
//! Wire format: `version:u8 ∥ fingerprint:32B ∥ cell_idx:u32 ∥
//! store_cursor_len:u16 ∥ store_cursor:bytes ∥ scanned:u64`, big-endian,
//! base64url-encoded for transport. The fingerprint binds a token to the
//! exact query shape it was produced against; the covering itself is not
//! serialized. It's recomputed deterministically from the same inputs
//! on resume, and `cell_idx` indexes into that recomputed list.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::codec::CellScheme;
use crate::error::{GeoQueryError, Result};
use crate::primitives::{BoundingBox, Point};

const CURRENT_VERSION: u8 = 1;

/// The search region shape a query was issued against, used only to
/// derive the binding fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryShape {
    /// Spherical cap: center + radius.
    Cap {
        /// Cap center.
        center: Point,
        /// Cap radius in kilometers.
        radius_km: f64,
    },
    /// Longitude-wrapping bounding box.
    BBox(BoundingBox),
}

/// Decoded continuation token state.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuationToken {
    /// Index of the cell currently being drained (or about to be).
    pub cell_idx: u32,
    /// Store-native resume cursor for that cell, opaque to this crate.
    pub store_cursor: Vec<u8>,
    /// Accumulated count of items scanned so far across the whole query.
    pub scanned: u64,
}

/// Compute the 32-byte fingerprint binding a token to
/// `(shape, precision, scheme, page_size)`.
pub fn fingerprint(
    shape: &QueryShape,
    precision: u8,
    scheme: CellScheme,
    page_size: Option<usize>,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    match shape {
        QueryShape::Cap { center, radius_km } => {
            hasher.update([0u8]);
            hasher.update(center.lat.to_bits().to_be_bytes());
            hasher.update(center.lon.to_bits().to_be_bytes());
            hasher.update(radius_km.to_bits().to_be_bytes());
        }
        QueryShape::BBox(bbox) => {
            hasher.update([1u8]);
            hasher.update(bbox.southwest.lat.to_bits().to_be_bytes());
            hasher.update(bbox.southwest.lon.to_bits().to_be_bytes());
            hasher.update(bbox.northeast.lat.to_bits().to_be_bytes());
            hasher.update(bbox.northeast.lon.to_bits().to_be_bytes());
        }
    }
    hasher.update([precision]);
    hasher.update([match scheme {
        CellScheme::H3 => 0u8,
        CellScheme::S2 => 1u8,
        CellScheme::GeoHash => 2u8,
    }]);
    match page_size {
        Some(n) => {
            hasher.update([1u8]);
            hasher.update((n as u64).to_be_bytes());
        }
        None => hasher.update([0u8]),
    }
    hasher.finalize().into()
}

/// Encode a token for transport, binding it to `fingerprint`.
pub fn encode(token: &ContinuationToken, fingerprint: [u8; 32]) -> Result<String> {
    if token.store_cursor.len() > u16::MAX as usize {
        return Err(GeoQueryError::invalid_input(
            "store cursor exceeds 64KiB and cannot be encoded",
        ));
    }
    let mut buf = Vec::with_capacity(1 + 32 + 4 + 2 + token.store_cursor.len() + 8);
    buf.push(CURRENT_VERSION);
    buf.extend_from_slice(&fingerprint);
    buf.extend_from_slice(&token.cell_idx.to_be_bytes());
    buf.extend_from_slice(&(token.store_cursor.len() as u16).to_be_bytes());
    buf.extend_from_slice(&token.store_cursor);
    buf.extend_from_slice(&token.scanned.to_be_bytes());
    Ok(URL_SAFE_NO_PAD.encode(buf))
}

/// Decode a token, verifying its version, binding fingerprint, and
/// `cell_idx` bounds against `covering_len`.
pub fn decode(encoded: &str, expected_fingerprint: [u8; 32], covering_len: usize) -> Result<ContinuationToken> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| GeoQueryError::InvalidToken(format!("malformed base64: {e}")))?;

    let mut cursor = 0usize;
    let take = |cursor: &mut usize, n: usize, bytes: &[u8]| -> Result<Vec<u8>> {
        let end = cursor
            .checked_add(n)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| GeoQueryError::InvalidToken("truncated token".into()))?;
        let slice = bytes[*cursor..end].to_vec();
        *cursor = end;
        Ok(slice)
    };

    let version = *bytes
        .first()
        .ok_or_else(|| GeoQueryError::InvalidToken("empty token".into()))?;
    if version != CURRENT_VERSION {
        return Err(GeoQueryError::InvalidToken(format!(
            "unknown token version {version}"
        )));
    }
    cursor += 1;

    let fp_bytes = take(&mut cursor, 32, &bytes)?;
    if fp_bytes != expected_fingerprint {
        return Err(GeoQueryError::InvalidToken(
            "fingerprint mismatch: token was not issued for this query".into(),
        ));
    }

    let cell_idx_bytes = take(&mut cursor, 4, &bytes)?;
    let cell_idx = u32::from_be_bytes(cell_idx_bytes.try_into().unwrap());
    if covering_len == 0 || cell_idx as usize >= covering_len {
        return Err(GeoQueryError::InvalidToken(format!(
            "cell_idx {cell_idx} out of bounds for covering of length {covering_len}"
        )));
    }

    let cursor_len_bytes = take(&mut cursor, 2, &bytes)?;
    let cursor_len = u16::from_be_bytes(cursor_len_bytes.try_into().unwrap()) as usize;
    let store_cursor = take(&mut cursor, cursor_len, &bytes)?;

    let scanned_bytes = take(&mut cursor, 8, &bytes)?;
    let scanned = u64::from_be_bytes(scanned_bytes.try_into().unwrap());

    if cursor != bytes.len() {
        return Err(GeoQueryError::InvalidToken("trailing bytes after token".into()));
    }

    Ok(ContinuationToken {
        cell_idx,
        store_cursor,
        scanned,
    })
}
