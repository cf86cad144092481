//! The virtual origin renderers load synthetic pages from.

use url::Url;

use crate::ResourceError;

/// Base URL of the virtual origin, e.g. `probe://localhost/`.
///
/// Renderers hand the interceptor the path component of a request URL;
/// this type converts between the two and resolves relative specifiers the
/// way a page would (`./test` from `/` is `/test`). Request paths are
/// relative to the base, so with a base of `http://h/app/` the URL
/// `http://h/app/x` is the request path `/x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualOrigin {
    base: Url,
}

impl VirtualOrigin {
    pub const DEFAULT: &'static str = "probe://localhost/";

    pub fn new(base: &str) -> Result<Self, ResourceError> {
        let mut base = Url::parse(base)?;
        base.set_query(None);
        base.set_fragment(None);
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Absolute URL for a path on this origin.
    pub fn url_for(&self, path: &str) -> Result<Url, ResourceError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// The request path for `url`, if it lies under this origin's base.
    pub fn path_of(&self, url: &Url) -> Result<String, ResourceError> {
        let same_origin = url.scheme() == self.base.scheme()
            && url.host_str() == self.base.host_str()
            && url.port() == self.base.port();
        let relative = url.path().strip_prefix(self.base.path());
        match relative {
            Some(rest) if same_origin => Ok(format!("/{rest}")),
            _ => Err(ResourceError::ForeignOrigin(url.to_string())),
        }
    }

    /// Resolve `specifier` against the document at `document_path`.
    pub fn resolve(&self, document_path: &str, specifier: &str) -> Result<String, ResourceError> {
        let document = self.url_for(document_path)?;
        let target = document.join(specifier)?;
        self.path_of(&target)
    }
}

impl Default for VirtualOrigin {
    fn default() -> Self {
        Self {
            base: Url::parse(Self::DEFAULT).expect("default origin is a valid URL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_path() {
        let origin = VirtualOrigin::default();
        let root = origin.url_for("/").unwrap();
        assert_eq!(root.as_str(), "probe://localhost/");
        assert_eq!(origin.path_of(&root).unwrap(), "/");
    }

    #[test]
    fn test_relative_fetch_from_root() {
        let origin = VirtualOrigin::default();
        assert_eq!(origin.resolve("/", "./test").unwrap(), "/test");
        assert_eq!(origin.resolve("/", "./test.js").unwrap(), "/test.js");
        assert_eq!(origin.resolve("/", "red.bmp").unwrap(), "/red.bmp");
    }

    #[test]
    fn test_relative_fetch_from_nested_document() {
        let origin = VirtualOrigin::default();
        assert_eq!(origin.resolve("/app/index.html", "./data.json").unwrap(), "/app/data.json");
        assert_eq!(origin.resolve("/app/index.html", "../top.js").unwrap(), "/top.js");
        assert_eq!(origin.resolve("/app/index.html", "/abs").unwrap(), "/abs");
    }

    #[test]
    fn test_foreign_origin_is_rejected() {
        let origin = VirtualOrigin::default();
        assert!(matches!(
            origin.resolve("/", "https://example.com/x"),
            Err(ResourceError::ForeignOrigin(_))
        ));
    }

    #[test]
    fn test_nested_base_round_trips() {
        let origin = VirtualOrigin::new("http://probe.localhost/app").unwrap();
        let url = origin.url_for("/test").unwrap();
        assert_eq!(url.as_str(), "http://probe.localhost/app/test");
        assert_eq!(origin.path_of(&url).unwrap(), "/test");
        assert_eq!(origin.path_of(origin.base()).unwrap(), "/");
        assert_eq!(origin.resolve("/", "./data.json").unwrap(), "/data.json");

        let outside = Url::parse("http://probe.localhost/other/test").unwrap();
        assert!(matches!(
            origin.path_of(&outside),
            Err(ResourceError::ForeignOrigin(_))
        ));
    }

    #[test]
    fn test_custom_base_gets_trailing_slash() {
        let origin = VirtualOrigin::new("http://probe.localhost").unwrap();
        assert_eq!(origin.url_for("/test").unwrap().as_str(), "http://probe.localhost/test");
    }
}
