use crate::domain::error::DomainError;

const COVER_FIELD: &str = "cover";

pub const DEFAULT_MAX_COVER_BYTES: usize = 2 * 1024 * 1024;

/// An uploaded cover image, already decoded from the transport encoding.
#[derive(Debug, Clone)]
pub struct CoverUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    /// Sniffs the image type from its leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<ImageKind> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageKind::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }

    pub fn from_extension(extension: &str) -> Option<ImageKind> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "gif" => Some(ImageKind::Gif),
            "webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
        }
    }
}

/// Checks size and content of an upload before anything touches storage.
pub fn validate_cover(upload: &CoverUpload, max_bytes: usize) -> Result<ImageKind, DomainError> {
    if upload.bytes.is_empty() {
        return Err(DomainError::validation(COVER_FIELD, "Cover file is empty"));
    }
    if upload.bytes.len() > max_bytes {
        return Err(DomainError::validation(
            COVER_FIELD,
            format!("Cover file exceeds the {} byte limit", max_bytes),
        ));
    }
    ImageKind::detect(&upload.bytes).ok_or_else(|| {
        DomainError::validation(
            COVER_FIELD,
            format!("'{}' is not a JPEG, PNG, GIF or WebP image", upload.file_name),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    fn upload(bytes: &[u8]) -> CoverUpload {
        CoverUpload {
            file_name: "test.jpg".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_detect_known_formats() {
        assert_eq!(ImageKind::detect(JPEG), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::detect(b"\x89PNG\r\n\x1a\n...."), Some(ImageKind::Png));
        assert_eq!(ImageKind::detect(b"GIF89a...."), Some(ImageKind::Gif));
        assert_eq!(ImageKind::detect(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageKind::Webp));
        assert_eq!(ImageKind::detect(b"%PDF-1.7"), None);
    }

    #[test]
    fn test_extension_round_trip() {
        for kind in [ImageKind::Jpeg, ImageKind::Png, ImageKind::Gif, ImageKind::Webp] {
            assert_eq!(ImageKind::from_extension(kind.extension()), Some(kind));
        }
        assert_eq!(ImageKind::from_extension("JPEG"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_extension("txt"), None);
    }

    #[test]
    fn test_validate_cover_accepts_image() {
        assert_eq!(validate_cover(&upload(JPEG), 1024).unwrap(), ImageKind::Jpeg);
    }

    #[test]
    fn test_validate_cover_rejects_empty_oversized_and_non_images() {
        assert!(validate_cover(&upload(&[]), 1024).is_err());
        assert!(validate_cover(&upload(JPEG), 4).is_err());
        let err = validate_cover(&upload(b"plain text"), 1024).unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "cover"));
    }
}
