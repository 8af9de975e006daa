//! Decoding of captured process output.
//!
//! Version-control tools write whatever bytes are stored in the repository,
//! so file contents in particular may not be UTF-8. A [`TextEncoding`] says
//! how to turn those bytes into a `String`.

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextError {
    #[error("Unknown text encoding label: {0}")]
    UnknownEncoding(String),
}

/// How process output bytes are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Always decode with this encoding (a BOM still wins).
    Fixed(&'static Encoding),
    /// Use UTF-8 when the bytes are valid UTF-8, otherwise fall back.
    AutoDetect { fallback: &'static Encoding },
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::Fixed(UTF_8)
    }
}

impl TextEncoding {
    pub fn utf8() -> Self {
        Self::Fixed(UTF_8)
    }

    /// Look up an encoding by its WHATWG label, e.g. `"utf-8"` or `"windows-1251"`.
    pub fn from_label(label: &str) -> Result<Self, TextError> {
        Encoding::for_label(label.trim().as_bytes())
            .map(Self::Fixed)
            .ok_or_else(|| TextError::UnknownEncoding(label.to_string()))
    }

    /// Same encoding, but allow UTF-8 content to override it.
    pub fn auto_detect(self) -> Self {
        match self {
            Self::Fixed(fallback) => Self::AutoDetect { fallback },
            auto @ Self::AutoDetect { .. } => auto,
        }
    }

    /// Name of the encoding used when nothing is detected.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fixed(encoding) => encoding.name(),
            Self::AutoDetect { fallback } => fallback.name(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> String {
        let encoding = match self {
            Self::Fixed(encoding) => *encoding,
            Self::AutoDetect { fallback } => {
                if std::str::from_utf8(bytes).is_ok() {
                    UTF_8
                } else {
                    *fallback
                }
            }
        };

        let (text, actual, had_errors) = encoding.decode(bytes);
        if had_errors {
            tracing::debug!("Malformed {} sequences replaced while decoding output", actual.name());
        }
        text.into_owned()
    }
}

/// Remove exactly one trailing line terminator (`\r\n`, `\n` or `\r`).
pub fn trim_last_newline(s: &str) -> &str {
    s.strip_suffix("\r\n")
        .or_else(|| s.strip_suffix('\n'))
        .or_else(|| s.strip_suffix('\r'))
        .unwrap_or(s)
}
