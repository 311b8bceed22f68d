//! zlib inflate for compressed cels.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::AseError;

/// Upper bound on how much deflate can expand its input.
const MAX_DEFLATE_RATIO: usize = 1032;

/// Inflates `data`, which must expand to exactly `expected` bytes.
///
/// Output is capped one byte past `expected` so a stream that keeps going is
/// caught without buffering all of it.
pub fn inflate_exact(data: &[u8], expected: usize) -> Result<Vec<u8>, AseError> {
    let ceiling = data
        .len()
        .saturating_mul(MAX_DEFLATE_RATIO)
        .saturating_add(64);
    if expected > ceiling {
        return Err(AseError::Decompression(format!(
            "{} compressed bytes cannot expand to {expected}",
            data.len()
        )));
    }

    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(data)
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| AseError::Decompression(format!("zlib: {e}")))?;

    if out.len() != expected {
        return Err(AseError::Decompression(format!(
            "inflated to {} bytes, expected {expected}",
            out.len()
        )));
    }
    Ok(out)
}
