//! MIME type detection for image references.
//!
//! Uploads normally arrive with a declared type; this is for references typed
//! in by hand (CLI) where only a path or URL is known.

/// Detect an image MIME type from the reference's extension.
pub fn detect_image_mime(reference: &str) -> &'static str {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.contains('/'))
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png"          => "image/png",
        "gif"          => "image/gif",
        "webp"         => "image/webp",
        "heic"         => "image/heic",
        "heif"         => "image/heif",
        "avif"         => "image/avif",
        "bmp"          => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        _              => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_jpeg() {
        assert_eq!(detect_image_mime("uploads/leaf.JPG"), "image/jpeg");
    }

    #[test]
    fn ignores_query_string() {
        assert_eq!(
            detect_image_mime("https://cdn.example.com/arolink/leaf.png?v=3"),
            "image/png"
        );
    }

    #[test]
    fn unknown_extension_fallback() {
        assert_eq!(detect_image_mime("img-123"), "application/octet-stream");
        assert_eq!(detect_image_mime("https://cdn.example.com/v1.2/leaf"), "application/octet-stream");
        assert_eq!(detect_image_mime("notes.txt"), "application/octet-stream");
    }
}
