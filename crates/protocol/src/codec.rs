//! Document encoding and decoding for the control connection.
//!
//! # Wire Format
//!
//! A document is an ordered sequence of opaque byte strings. On the wire it
//! is JSON (each element hex-encoded) then LZ4-compressed, and framed with a
//! little-endian length prefix:
//!
//! ```text
//! [u32 LE: body length][LZ4 compressed JSON array of hex strings]
//! ```
//!
//! The length prefix lets the reader consume exactly one document without
//! any knowledge of its contents.

use thiserror::Error;

/// Upper bound on a single document body.
pub const MAX_DOCUMENT_LEN: usize = 1 << 30;

/// Upper bound on the decompressed JSON of a single document.
pub const MAX_DECODED_LEN: usize = 1 << 30;

/// Errors that can occur during document encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Document too short")]
    DocumentTooShort,

    #[error("Document of {0} bytes exceeds the frame limit")]
    DocumentTooLarge(usize),

    #[error("Document declares {0} decompressed bytes, above the limit")]
    DecodedTooLarge(usize),

    #[error("JSON decode error: {0}")]
    JsonDecode(String),

    #[error("JSON encode error: {0}")]
    JsonEncode(String),

    #[error("Hex decode error: {0}")]
    HexDecode(String),

    #[error("Decompression error: {0}")]
    Decompress(String),

    #[error("Document has {actual} elements, expected at least {expected}")]
    MissingElements { expected: usize, actual: usize },

    #[error("Invalid element {index}: {reason}")]
    InvalidElement { index: usize, reason: String },
}

/// An ordered sequence of opaque byte strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document(pub Vec<Vec<u8>>);

impl Document {
    pub fn new(elements: Vec<Vec<u8>>) -> Self {
        Self(elements)
    }

    pub fn elements(&self) -> &[Vec<u8>] {
        &self.0
    }

    pub fn into_elements(self) -> Vec<Vec<u8>> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fail unless the document has at least `expected` elements.
    pub fn require(&self, expected: usize) -> Result<(), CodecError> {
        if self.0.len() < expected {
            return Err(CodecError::MissingElements {
                expected,
                actual: self.0.len(),
            });
        }
        Ok(())
    }

    /// Encode the document body (without the length prefix).
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let hex_elements: Vec<String> = self.0.iter().map(hex::encode).collect();
        let json =
            serde_json::to_vec(&hex_elements).map_err(|e| CodecError::JsonEncode(e.to_string()))?;
        if json.len() > MAX_DECODED_LEN {
            return Err(CodecError::DocumentTooLarge(json.len()));
        }
        let body = lz4_flex::compress_prepend_size(&json);
        if body.len() > MAX_DOCUMENT_LEN {
            return Err(CodecError::DocumentTooLarge(body.len()));
        }
        Ok(body)
    }

    /// Decode a document body (without the length prefix).
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        // The LZ4 body starts with the decompressed size, u32 LE.
        let declared = match data {
            [a, b, c, d, ..] => u32::from_le_bytes([*a, *b, *c, *d]) as usize,
            _ => return Err(CodecError::DocumentTooShort),
        };
        if declared > MAX_DECODED_LEN {
            return Err(CodecError::DecodedTooLarge(declared));
        }

        let json = lz4_flex::decompress_size_prepended(data)
            .map_err(|e| CodecError::Decompress(e.to_string()))?;
        let hex_elements: Vec<String> =
            serde_json::from_slice(&json).map_err(|e| CodecError::JsonDecode(e.to_string()))?;

        hex_elements
            .iter()
            .map(|element| hex::decode(element).map_err(|e| CodecError::HexDecode(e.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// A one-element document holding a UTF-8 string.
    pub fn from_text(text: &str) -> Self {
        Self(vec![text.as_bytes().to_vec()])
    }

    /// Read element `index` as UTF-8.
    pub fn text(&self, index: usize) -> Result<&str, CodecError> {
        self.require(index + 1)?;
        std::str::from_utf8(&self.0[index]).map_err(|e| CodecError::InvalidElement {
            index,
            reason: e.to_string(),
        })
    }
}
