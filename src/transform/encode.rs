//! Image body encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Image subtypes returned inline.
pub const SUPPORTED_SUBTYPES: [&str; 4] = ["jpeg", "png", "gif", "jpg"];

/// Subtype of a content type, e.g. `png` for `image/png; q=1`.
pub fn image_subtype(content_type: &str) -> Option<&str> {
    let essence = content_type.split(';').next()?.trim();
    let (_, subtype) = essence.split_once('/')?;
    let subtype = subtype.trim();
    (!subtype.is_empty()).then_some(subtype)
}

/// Base64 body for a supported content type, `None` otherwise.
pub fn encode_image(content_type: &str, body: &[u8]) -> Option<String> {
    let subtype = image_subtype(content_type)?;
    if !SUPPORTED_SUBTYPES.iter().any(|s| s.eq_ignore_ascii_case(subtype)) {
        return None;
    }
    Some(STANDARD.encode(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtype_strips_parameters() {
        assert_eq!(image_subtype("image/png"), Some("png"));
        assert_eq!(image_subtype("image/jpeg; charset=binary"), Some("jpeg"));
        assert_eq!(image_subtype("png"), None);
        assert_eq!(image_subtype("image/"), None);
        assert_eq!(image_subtype(""), None);
    }

    #[test]
    fn encodes_supported_formats() {
        assert_eq!(encode_image("image/gif", b"GIF89a").as_deref(), Some("R0lGODlh"));
        assert!(encode_image("image/jpg", b"x").is_some());
        assert!(encode_image("image/JPEG", b"x").is_some());
    }

    #[test]
    fn rejects_unsupported_formats() {
        assert_eq!(encode_image("image/webp", b"RIFF"), None);
        assert_eq!(encode_image("text/html", b"<html>"), None);
        assert_eq!(encode_image("", b""), None);
    }
}
