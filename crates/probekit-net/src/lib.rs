//! # ProbeKit Net
//!
//! Synthetic resources for an embedded renderer: no sockets, no HTTP on the
//! wire. A request is a path on a virtual origin; the answer is a whole
//! payload, an explicit "not found", or a handler failure that the renderer
//! reports according to a [`FailurePolicy`].

mod interceptor;
mod origin;
mod resource;
mod router;

pub use interceptor::{FailurePolicy, Interception, Interceptor, ResponseStatus};
pub use origin::VirtualOrigin;
pub use resource::Resource;
pub use router::{from_fallible_fn, from_fn, FallibleFnHandler, FnHandler, ResourceHandler, ResourceRouter};

use thiserror::Error;

/// Errors raised while resolving resources.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("Resource handler failed: {0}")]
    Handler(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("URL {0} is outside the virtual origin")]
    ForeignOrigin(String),
}
