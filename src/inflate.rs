//! Raw DEFLATE decompression of verified card payloads.

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{Result, ScanError};

/// Upper bound on the inflated payload size.
pub const MAX_INFLATED_LEN: usize = 1024 * 1024;

const MIN_OUTPUT_CHUNK: usize = 1024;

/// Inflate raw DEFLATE data (no zlib or gzip framing) into UTF-8 text.
///
/// The stream must be complete: input that ends before the final block is an
/// error, not a short read. Bytes after the end of the stream are ignored.
pub fn decompress(bytes: &[u8]) -> Result<String> {
    // One byte of headroom past the limit tells an exact fit from an overflow.
    let limit = MAX_INFLATED_LEN + 1;
    let mut inflater = Decompress::new(false);
    let mut out = Vec::with_capacity((bytes.len() * 4).clamp(MIN_OUTPUT_CHUNK, limit));

    loop {
        let before_in = inflater.total_in();
        let before_out = inflater.total_out();
        let consumed = before_in as usize;
        let status = inflater
            .decompress_vec(&bytes[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| ScanError::Decompression(e.to_string()))?;

        if out.len() > MAX_INFLATED_LEN {
            return Err(ScanError::Decompression(format!(
                "Inflated payload exceeds {} bytes",
                MAX_INFLATED_LEN
            )));
        }

        if status == Status::StreamEnd {
            break;
        }

        if out.len() == out.capacity() {
            let grow = out.capacity().min(limit - out.len());
            out.reserve_exact(grow);
            continue;
        }

        let progressed =
            inflater.total_in() != before_in || inflater.total_out() != before_out;
        if !progressed {
            let reason = if inflater.total_in() as usize >= bytes.len() {
                "Unexpected end of compressed stream"
            } else {
                "Compressed stream stopped making progress"
            };
            return Err(ScanError::Decompression(reason.to_string()));
        }
    }

    String::from_utf8(out)
        .map_err(|e| ScanError::Decompression(format!("Payload is not valid UTF-8: {}", e)))
}
