//! Percent-encoding helpers for URL path segments.

use std::borrow::Cow;

/// Why a single raw segment was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SegmentError {
    Empty,
    MalformedEncoding,
    TrailingDot,
    IllegalCharacter,
}

/// Decode and validate one percent-encoded path segment.
pub(crate) fn decode_segment(raw: &str) -> Result<String, SegmentError> {
    if raw.is_empty() {
        return Err(SegmentError::Empty);
    }
    if !has_valid_escapes(raw) {
        return Err(SegmentError::MalformedEncoding);
    }
    let decoded = urlencoding::decode(raw).map_err(|_| SegmentError::MalformedEncoding)?;
    validate_segment(&decoded)?;
    Ok(decoded.into_owned())
}

/// Validate an already decoded segment.
pub(crate) fn validate_segment(segment: &str) -> Result<(), SegmentError> {
    if segment.is_empty() {
        return Err(SegmentError::Empty);
    }
    if segment.ends_with('.') {
        return Err(SegmentError::TrailingDot);
    }
    if segment.contains('/') || segment.chars().any(char::is_control) {
        return Err(SegmentError::IllegalCharacter);
    }
    Ok(())
}

/// Every `%` must introduce exactly two hex digits.
fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Percent-encode one decoded segment for use in a URL.
pub fn encode_segment(segment: &str) -> Cow<'_, str> {
    urlencoding::encode(segment)
}

/// Decode every segment of a URL path, leaving undecodable segments as-is.
///
/// Used on URLs found inside stored documents, which are not validated.
pub fn decode_path(url: &str) -> String {
    url.split('/')
        .map(|segment| {
            if has_valid_escapes(segment) {
                urlencoding::decode(segment)
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| segment.to_string())
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
