//! Content-Encoding handling for pool responses.
//!
//! Some pools compress their stats whatever the request asked for, so the
//! response headers are the only thing we trust.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use reqwest::header::{HeaderMap, CONTENT_ENCODING};

use crate::error::PoolError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Encodings claimed by a response's `Content-Encoding` headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Encoding {
    pub gzip: bool,
    pub deflate: bool,
}

/// Reads every `Content-Encoding` header value, including comma-separated
/// lists.
pub fn detect(headers: &HeaderMap) -> Encoding {
    let mut encoding = Encoding::default();
    for value in headers.get_all(CONTENT_ENCODING) {
        let Ok(value) = value.to_str() else { continue };
        for token in value.split(',') {
            match token.trim().to_ascii_lowercase().as_str() {
                "gzip" | "x-gzip" => encoding.gzip = true,
                "deflate" => encoding.deflate = true,
                _ => {}
            }
        }
    }
    encoding
}

/// Decompresses `body` according to the claimed encodings.
///
/// Gzip wins when both are claimed, unless the body lacks the gzip magic.
/// Deflate is raw first, then zlib-wrapped.
pub fn decode(encoding: Encoding, body: &[u8]) -> Result<Vec<u8>, PoolError> {
    let gzip_magic = body.starts_with(&GZIP_MAGIC);
    match encoding {
        Encoding { gzip: false, deflate: false } => Ok(body.to_vec()),
        Encoding { gzip: true, deflate: true } if !gzip_magic => inflate(body),
        Encoding { gzip: true, .. } => gunzip(body),
        Encoding { deflate: true, .. } if gzip_magic => gunzip(body),
        Encoding { deflate: true, .. } => inflate(body),
    }
}

/// Detects and decodes in one step.
pub fn decode_body(headers: &HeaderMap, body: &[u8]) -> Result<Vec<u8>, PoolError> {
    decode(detect(headers), body)
}

fn gunzip(body: &[u8]) -> Result<Vec<u8>, PoolError> {
    let mut out = Vec::new();
    GzDecoder::new(body).read_to_end(&mut out)?;
    Ok(out)
}

fn inflate(body: &[u8]) -> Result<Vec<u8>, PoolError> {
    let mut out = Vec::new();
    match DeflateDecoder::new(body).read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(raw_err) => {
            out.clear();
            ZlibDecoder::new(body)
                .read_to_end(&mut out)
                .map(|_| out)
                .map_err(|_| PoolError::Decode(raw_err))
        }
    }
}
