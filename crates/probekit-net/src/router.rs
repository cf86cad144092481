//! Resource handlers and the exact-match router.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::{Resource, ResourceError};

/// Answers resource requests synchronously on the calling thread.
///
/// `Ok(None)` is the "not found" outcome; `Err` is a handler failure.
pub trait ResourceHandler {
    fn fetch(&self, path: &str) -> Result<Option<Resource>, ResourceError>;
}

impl<T: ResourceHandler + ?Sized> ResourceHandler for Rc<T> {
    fn fetch(&self, path: &str) -> Result<Option<Resource>, ResourceError> {
        (**self).fetch(path)
    }
}

impl<T: ResourceHandler + ?Sized> ResourceHandler for Box<T> {
    fn fetch(&self, path: &str) -> Result<Option<Resource>, ResourceError> {
        (**self).fetch(path)
    }
}

/// Handler backed by an infallible closure. See [`from_fn`].
pub struct FnHandler<F>(F);

/// Handler backed by a fallible closure. See [`from_fallible_fn`].
pub struct FallibleFnHandler<F>(F);

/// Wrap a closure returning `Option<Resource>`.
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&str) -> Option<Resource>,
{
    FnHandler(f)
}

/// Wrap a closure that may fail.
pub fn from_fallible_fn<F>(f: F) -> FallibleFnHandler<F>
where
    F: Fn(&str) -> Result<Option<Resource>, ResourceError>,
{
    FallibleFnHandler(f)
}

impl<F> ResourceHandler for FnHandler<F>
where
    F: Fn(&str) -> Option<Resource>,
{
    fn fetch(&self, path: &str) -> Result<Option<Resource>, ResourceError> {
        Ok((self.0)(path))
    }
}

impl<F> ResourceHandler for FallibleFnHandler<F>
where
    F: Fn(&str) -> Result<Option<Resource>, ResourceError>,
{
    fn fetch(&self, path: &str) -> Result<Option<Resource>, ResourceError> {
        (self.0)(path)
    }
}

/// Exact-match table from path to payload.
///
/// No prefix matching, no normalization: `/test` and `/test/` are different
/// routes, and anything unregistered resolves to `None`.
#[derive(Debug, Clone, Default)]
pub struct ResourceRouter {
    routes: HashMap<String, Resource>,
}

impl ResourceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resource` under `path` (builder style).
    pub fn route(mut self, path: impl Into<String>, resource: Resource) -> Self {
        self.insert(path, resource);
        self
    }

    /// Register `resource` under `path`, returning the payload it replaced.
    pub fn insert(&mut self, path: impl Into<String>, resource: Resource) -> Option<Resource> {
        let path = path.into();
        debug!(%path, media_type = resource.media_type(), len = resource.len(), "Route registered");
        self.routes.insert(path, resource)
    }

    /// Resolve `path` to its payload.
    pub fn resolve(&self, path: &str) -> Option<Resource> {
        self.routes.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl ResourceHandler for ResourceRouter {
    fn fetch(&self, path: &str) -> Result<Option<Resource>, ResourceError> {
        Ok(self.resolve(path))
    }
}
