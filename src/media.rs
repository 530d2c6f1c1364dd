//! Upload validation and image encodings
//!
//! MIME/size policy for uploads, data URL encoding/decoding and PNG output.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbaImage};

/// File extensions treated as images in listings
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Extension used when the original file name has none
pub const FALLBACK_EXTENSION: &str = "jpg";

/// Upload acceptance rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
}

impl UploadPolicy {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Only `image/*` MIME types are accepted
    pub fn check_mime(&self, mime: &str) -> Result<(), UploadError> {
        if mime.trim().to_ascii_lowercase().starts_with("image/") {
            Ok(())
        } else {
            Err(UploadError::InvalidMime(mime.to_string()))
        }
    }

    pub fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if size > self.max_bytes {
            Err(UploadError::TooLarge { size, limit: self.max_bytes })
        } else {
            Ok(())
        }
    }

    pub fn validate(&self, mime: &str, size: u64) -> Result<(), UploadError> {
        self.check_mime(mime)?;
        self.check_size(size)
    }
}

/// Reasons an upload is rejected or fails
#[derive(Debug)]
pub enum UploadError {
    /// No `image` field in the multipart body
    MissingFile,
    /// MIME type does not start with `image/`
    InvalidMime(String),
    /// Body exceeds the configured limit
    TooLarge { size: u64, limit: u64 },
    /// Multipart stream could not be read
    Malformed(String),
    /// Writing the file failed
    Write(std::io::Error),
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::MissingFile => write!(f, "No file in upload"),
            UploadError::InvalidMime(mime) => write!(f, "Not an image MIME type: {}", mime),
            UploadError::TooLarge { size, limit } => write!(f, "Upload of {} bytes exceeds {} bytes", size, limit),
            UploadError::Malformed(msg) => write!(f, "Malformed upload: {}", msg),
            UploadError::Write(e) => write!(f, "Failed to store upload: {}", e),
        }
    }
}

impl std::error::Error for UploadError {}

/// Lowercased extension of `name` (without the dot), if any
pub fn extension_of(name: &str) -> Option<String> {
    let base = name.rsplit(&['/', '\\'][..]).next().unwrap_or(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether a listing entry counts as an image: not a dotfile, allowed extension
pub fn is_listable_image(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    extension_of(name).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Content type served for an upload, by extension
pub fn content_type_for(name: &str) -> &'static str {
    match extension_of(name).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// `data:<mime>;base64,<payload>`
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a base64 data URL into its MIME type and decoded bytes
pub fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

/// Encode an RGBA buffer as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// Decode any supported image format from memory
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
    image::load_from_memory(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_policy() {
        let policy = UploadPolicy::new(10 * 1024 * 1024);
        assert!(policy.check_mime("image/png").is_ok());
        assert!(policy.check_mime("IMAGE/JPEG").is_ok());
        assert!(matches!(policy.check_mime("text/plain"), Err(UploadError::InvalidMime(_))));
        assert!(matches!(policy.check_mime("application/image"), Err(UploadError::InvalidMime(_))));
    }

    #[test]
    fn test_size_policy() {
        let policy = UploadPolicy::new(10 * 1024 * 1024);
        assert!(policy.check_size(10 * 1024 * 1024).is_ok());
        assert!(matches!(
            policy.check_size(10 * 1024 * 1024 + 1),
            Err(UploadError::TooLarge { limit: 10485760, .. })
        ));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of(".hidden"), None);
        assert_eq!(extension_of("dir.d/file"), None);
    }

    #[test]
    fn test_listable_images() {
        assert!(is_listable_image("1700000000000-12345.png"));
        assert!(is_listable_image("a.WEBP"));
        assert!(!is_listable_image(".secret.png"));
        assert!(!is_listable_image("notes.txt"));
        assert!(!is_listable_image("README"));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("a.gif"), "image/gif");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }

    #[test]
    fn test_data_url() {
        let url = to_data_url("image/png", b"hello");
        assert_eq!(url, "data:image/png;base64,aGVsbG8=");
        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hello");
        assert!(decode_data_url("/uploads/a.png").is_none());
        assert!(decode_data_url("data:image/png,raw").is_none());
    }

    #[test]
    fn test_png_encode_decodes_back() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        let png = encode_png(&img).unwrap();
        let decoded = decode_image(&png).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }
}
