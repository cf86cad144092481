//! Request interception and the outcome model renderers consume.

use std::cell::RefCell;
use std::rc::Rc;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Resource, ResourceError, ResourceHandler};

/// How a renderer reports a resource handler that failed instead of answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The fetch itself fails; script observes a network error.
    #[default]
    NetworkError,
    /// The fetch succeeds with this HTTP-like status and an empty body.
    Status(u16),
}

/// Outcome of one intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    Served(Resource),
    NotFound,
    Failed(ResourceError),
}

/// What the renderer should surface to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseStatus {
    /// A response with a status line.
    Http { code: u16, text: &'static str },
    /// No response at all.
    NetworkError,
}

impl ResponseStatus {
    pub fn http(code: u16) -> Self {
        let text = StatusCode::from_u16(code)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("");
        ResponseStatus::Http { code, text }
    }

    /// `true` for 2xx statuses, mirroring `Response.ok`.
    pub fn ok(&self) -> bool {
        matches!(self, ResponseStatus::Http { code, .. } if (200..300).contains(code))
    }
}

impl Interception {
    pub fn resource(&self) -> Option<&Resource> {
        match self {
            Interception::Served(resource) => Some(resource),
            _ => None,
        }
    }

    /// Map the outcome to what the page sees.
    pub fn status(&self, policy: FailurePolicy) -> ResponseStatus {
        match (self, policy) {
            (Interception::Served(_), _) => ResponseStatus::http(200),
            (Interception::NotFound, _) => ResponseStatus::http(404),
            (Interception::Failed(_), FailurePolicy::NetworkError) => ResponseStatus::NetworkError,
            (Interception::Failed(_), FailurePolicy::Status(code)) => ResponseStatus::http(code),
        }
    }
}

/// Wraps a [`ResourceHandler`], classifying and recording every request.
///
/// Handlers run synchronously inside the renderer's own callback. Anything
/// they do that tears down the window or renderer must be posted to the
/// loop, never done in place.
#[derive(Clone)]
pub struct Interceptor {
    handler: Rc<dyn ResourceHandler>,
    policy: FailurePolicy,
    requests: Rc<RefCell<Vec<String>>>,
}

impl Interceptor {
    pub fn new(handler: impl ResourceHandler + 'static) -> Self {
        Self::from_rc(Rc::new(handler))
    }

    pub fn from_rc(handler: Rc<dyn ResourceHandler>) -> Self {
        Self {
            handler,
            policy: FailurePolicy::default(),
            requests: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Answer a request for `path`. Always returns an outcome.
    pub fn intercept(&self, path: &str) -> Interception {
        self.requests.borrow_mut().push(path.to_owned());

        match self.handler.fetch(path) {
            Ok(Some(resource)) => {
                debug!(%path, media_type = resource.media_type(), len = resource.len(), "Resource served");
                Interception::Served(resource)
            }
            Ok(None) => {
                debug!(%path, "Resource not found");
                Interception::NotFound
            }
            Err(error) => {
                warn!(%path, %error, "Resource handler failed");
                Interception::Failed(error)
            }
        }
    }

    /// Paths requested so far, in request order.
    pub fn requested_paths(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}
