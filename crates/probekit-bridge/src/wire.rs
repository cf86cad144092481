//! JSON wire format and page shim for message-channel engines.
//!
//! Page side: every bound name becomes a function returning a promise. A
//! call posts `{"id", "name", "args"}` over `window.ipc.postMessage`; the
//! native side answers by evaluating `window.__probekit.reply({...})`.

use probekit_value::Value;
use serde::{Deserialize, Serialize};

use crate::BridgeError;

/// One call from script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeCall {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// Native answer to a [`BridgeCall`]. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeReply {
    pub id: u64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A present `null` result is `Some(Value::Null)`, not `None`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl BridgeCall {
    pub fn from_json(text: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(text).map_err(|e| BridgeError::Decode(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl BridgeReply {
    pub fn success(id: u64, value: Value) -> Self {
        Self {
            id,
            result: Some(value),
            error: None,
        }
    }

    pub fn failure(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(message.into()),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(text).map_err(|e| BridgeError::Decode(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

const RUNTIME: &str = r#"(function () {
  if (window.__probekit) return;
  const pending = new Map();
  let nextId = 1;
  window.__probekit = {
    invoke(name, args) {
      const id = nextId++;
      return new Promise((resolve, reject) => {
        pending.set(id, { resolve, reject });
        window.ipc.postMessage(JSON.stringify({ id, name, args }));
      });
    },
    reply(message) {
      const entry = pending.get(message.id);
      if (!entry) return;
      pending.delete(message.id);
      if ("error" in message) entry.reject(new Error(message.error));
      else entry.resolve(message.result === undefined ? null : message.result);
    },
    define(name) {
      window[name] = (...args) => window.__probekit.invoke(name, args);
    },
  };
})();
"#;

/// Script defining one bound function on the page.
pub fn define_script(name: &str) -> String {
    let quoted = serde_json::to_string(name).unwrap_or_else(|_| "\"\"".to_owned());
    format!("window.__probekit.define({quoted});")
}

/// Script to inject at document start: the runtime plus one definition per
/// bound name.
pub fn shim_script<S: AsRef<str>>(names: &[S]) -> String {
    let mut script = String::from(RUNTIME);
    for name in names {
        script.push_str(&define_script(name.as_ref()));
        script.push('\n');
    }
    script
}

/// Script delivering `reply` to the page.
pub fn reply_script(reply: &BridgeReply) -> String {
    format!("window.__probekit.reply({});", reply.to_json())
}
