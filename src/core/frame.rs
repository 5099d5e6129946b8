//! Line-oriented frame grammar carried inside response chunks.
//!
//! ```text
//! frame   := tag ":" payload
//! tag     := 1*( ALPHA / DIGIT )
//! payload := JSON value
//! ```
//!
//! Tag `0` carries a JSON string literal holding a plain-text delta. Every
//! other tag is reserved for future frame kinds; such frames parse
//! successfully as [`Frame::Reserved`] so callers can skip them without
//! treating them as errors.

use memchr::memchr;

pub const TEXT_TAG: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Reserved { tag: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame has no tag separator")]
    MissingSeparator,
    #[error("frame tag is empty or malformed")]
    InvalidTag,
    #[error("text payload is not a JSON string literal (truncated: {truncated})")]
    Payload { truncated: bool },
}

impl FrameError {
    /// True when the line could still become a valid frame if more bytes
    /// arrived after it.
    pub fn is_truncated(&self) -> bool {
        matches!(
            self,
            FrameError::MissingSeparator | FrameError::Payload { truncated: true }
        )
    }
}

/// Parse a single line. Returns `None` for blank lines.
pub fn parse_frame(line: &str) -> Option<Result<Frame, FrameError>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return None;
    }
    Some(parse_nonblank(line))
}

fn parse_nonblank(line: &str) -> Result<Frame, FrameError> {
    let separator = memchr(b':', line.as_bytes()).ok_or_else(|| {
        if is_valid_tag(line) {
            FrameError::MissingSeparator
        } else {
            FrameError::InvalidTag
        }
    })?;
    let (tag, payload) = (&line[..separator], &line[separator + 1..]);
    if !is_valid_tag(tag) {
        return Err(FrameError::InvalidTag);
    }
    if tag != TEXT_TAG {
        return Ok(Frame::Reserved {
            tag: tag.to_string(),
        });
    }

    serde_json::from_str::<String>(payload)
        .map(Frame::Text)
        .map_err(|err| FrameError::Payload {
            truncated: err.is_eof(),
        })
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty() && tag.bytes().all(|b| b.is_ascii_alphanumeric())
}
