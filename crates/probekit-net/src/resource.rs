//! Response payloads.

use std::fmt;
use std::sync::Arc;

/// An immutable response payload: body bytes plus media type.
///
/// An empty body is still a payload. "Not found" is modelled as the absence
/// of a `Resource`, never as an empty one.
#[derive(Clone, PartialEq, Eq)]
pub struct Resource {
    bytes: Arc<[u8]>,
    media_type: String,
}

impl Resource {
    pub fn new(bytes: impl Into<Vec<u8>>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
            media_type: media_type.into(),
        }
    }

    pub fn html(markup: impl Into<String>) -> Self {
        Self::new(markup.into().into_bytes(), "text/html")
    }

    pub fn json(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), "application/json")
    }

    pub fn javascript(source: impl Into<String>) -> Self {
        Self::new(source.into().into_bytes(), "application/javascript")
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), "text/plain")
    }

    /// Media type guessed from the extension of `path`, falling back to
    /// `application/octet-stream`.
    pub fn guessed(path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        let media_type = mime_guess::from_path(path).first_or_octet_stream();
        Self::new(bytes, media_type.essence_str())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Media type without parameters, lowercased.
    pub fn essence(&self) -> String {
        self.media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    pub fn is_html(&self) -> bool {
        self.essence() == "text/html"
    }

    pub fn is_javascript(&self) -> bool {
        matches!(
            self.essence().as_str(),
            "application/javascript" | "text/javascript" | "application/ecmascript" | "text/ecmascript"
        )
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_media_type() {
        assert_eq!(Resource::html("<p>").media_type(), "text/html");
        assert_eq!(Resource::json("{}").media_type(), "application/json");
        assert_eq!(Resource::javascript("").media_type(), "application/javascript");
    }

    #[test]
    fn test_bytes_are_exact() {
        let bitmap = [66u8, 77, 0, 255];
        let resource = Resource::new(bitmap.to_vec(), "image/bmp");
        assert_eq!(resource.bytes(), &bitmap);
        assert_eq!(resource.len(), 4);
    }

    #[test]
    fn test_empty_payload_is_still_a_payload() {
        let resource = Resource::text("");
        assert!(resource.is_empty());
        assert_eq!(resource.media_type(), "text/plain");
    }

    #[test]
    fn test_guessed_media_type() {
        assert_eq!(Resource::guessed("/red.bmp", vec![0]).media_type(), "image/bmp");
        assert!(Resource::guessed("/test.js", vec![]).is_javascript());
        assert_eq!(
            Resource::guessed("/blob", vec![]).media_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_essence_ignores_parameters() {
        let resource = Resource::new(Vec::new(), "Text/HTML; charset=utf-8");
        assert!(resource.is_html());
    }
}
