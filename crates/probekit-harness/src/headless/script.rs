//! What page script can do inside the headless renderer.

use probekit_bridge::BridgeError;
use probekit_net::{Interception, ResponseStatus};
use probekit_value::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::bmp::{decode_bmp, ImageData};
use super::Engine;

/// An exception thrown (or a promise rejected) in page script.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("TypeError: {0}")]
    Type(String),

    #[error("SyntaxError: {0}")]
    Syntax(String),

    #[error("ReferenceError: {0}")]
    Reference(String),

    #[error("Error: {0}")]
    Error(String),
}

impl ScriptError {
    /// The script-visible constructor name.
    pub fn name(&self) -> &'static str {
        match self {
            ScriptError::Type(_) => "TypeError",
            ScriptError::Syntax(_) => "SyntaxError",
            ScriptError::Reference(_) => "ReferenceError",
            ScriptError::Error(_) => "Error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ScriptError::Type(message)
            | ScriptError::Syntax(message)
            | ScriptError::Reference(message)
            | ScriptError::Error(message) => message,
        }
    }
}

/// A settled `fetch()`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    /// Request path on the virtual origin.
    pub url: String,
    pub ok: bool,
    pub status: u16,
    pub status_text: String,
    pub media_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// `response.json()`.
    pub fn json(&self) -> Result<Value, ScriptError> {
        Value::from_json_slice(&self.body).map_err(|e| ScriptError::Syntax(e.to_string()))
    }

    /// `response.text()`.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Execution context handed to a registered page or module script.
pub struct ScriptContext<'a> {
    engine: &'a Engine,
    location: String,
}

impl<'a> ScriptContext<'a> {
    pub(super) fn new(engine: &'a Engine, location: &str) -> Self {
        Self {
            engine,
            location: location.to_owned(),
        }
    }

    /// Path of the document or module this script belongs to.
    pub fn location(&self) -> &str {
        &self.location
    }

    fn request(&self, specifier: &str) -> Result<(String, Interception), ScriptError> {
        let path = self
            .engine
            .origin
            .resolve(&self.location, specifier)
            .map_err(|e| ScriptError::Type(format!("Failed to fetch: {e}")))?;
        let interception = self.engine.interceptor.intercept(&path);
        Ok((path, interception))
    }

    /// `fetch(specifier)`, resolved relative to [`location`](Self::location).
    ///
    /// A 404 resolves with `ok == false`; a failed resource handler under the
    /// network-error policy rejects with `TypeError: Failed to fetch`.
    pub fn fetch(&self, specifier: &str) -> Result<FetchResponse, ScriptError> {
        let (url, interception) = self.request(specifier)?;
        match interception.status(self.engine.interceptor.policy()) {
            ResponseStatus::NetworkError => Err(ScriptError::Type("Failed to fetch".into())),
            status @ ResponseStatus::Http { code, text } => {
                let resource = interception.resource();
                Ok(FetchResponse {
                    url,
                    ok: status.ok(),
                    status: code,
                    status_text: text.to_owned(),
                    media_type: resource.map(|r| r.essence()),
                    body: resource.map(|r| r.bytes().to_vec()).unwrap_or_default(),
                })
            }
        }
    }

    /// `await import(specifier)`.
    ///
    /// The module must be served with a JavaScript media type. Its registered
    /// script, if any, is evaluated once per document.
    pub fn import_module(&self, specifier: &str) -> Result<(), ScriptError> {
        let (path, interception) = self.request(specifier)?;
        let resource = match interception {
            Interception::Served(resource) => resource,
            _ => {
                return Err(ScriptError::Type(format!(
                    "Failed to fetch dynamically imported module: {path}"
                )))
            }
        };
        if !resource.is_javascript() {
            return Err(ScriptError::Type(format!(
                "Failed to load module script: expected a JavaScript MIME type but the server responded with \"{}\"",
                resource.media_type()
            )));
        }
        self.engine.evaluate_module(&path)
    }

    /// Load `src` as an `<img>` and read back its pixels.
    pub fn load_image(&self, src: &str) -> Result<ImageData, ScriptError> {
        let failed = |detail: String| ScriptError::Error(format!("Failed to load image {src}: {detail}"));

        let (path, interception) = self.request(src)?;
        match interception {
            Interception::Served(resource) => {
                let image = decode_bmp(resource.bytes()).map_err(|e| failed(e.to_string()))?;
                debug!(%path, width = image.width, height = image.height, "Image decoded");
                Ok(image)
            }
            Interception::NotFound => Err(failed("404 Not Found".into())),
            Interception::Failed(error) => Err(failed(error.to_string())),
        }
    }

    /// Call a native function bound on the surface.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
        self.engine
            .bindings
            .invoke(name, args)
            .map_err(|error| match error {
                BridgeError::UnknownFunction(name) => {
                    ScriptError::Reference(format!("{name} is not defined"))
                }
                BridgeError::Handler(message) => ScriptError::Error(message),
                BridgeError::Decode(message) => ScriptError::Syntax(message),
            })
    }

    /// `console.log(message)`.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        if self.engine.debug {
            info!(location = %self.location, "console: {message}");
        } else {
            debug!(location = %self.location, "console: {message}");
        }
        self.engine.console.borrow_mut().push(message);
    }
}
