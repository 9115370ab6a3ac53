//! How commands reach a simulated endpoint.

use serde::{Deserialize, Serialize};

pub const HOST_PLACEHOLDER: &str = "{host}";

/// Command prefix that makes the rest of an argument vector run "on" a host, e.g.
/// `ip netns exec {host}`. Every `{host}` is replaced by the host name. An empty prefix runs
/// commands locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecPrefix(Vec<String>);

impl Default for ExecPrefix {
    fn default() -> Self {
        Self::new(["ip", "netns", "exec", HOST_PLACEHOLDER])
    }
}

impl ExecPrefix {
    pub fn new<S: Into<String>>(parts: impl IntoIterator<Item = S>) -> Self {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn local() -> Self {
        Self(Vec::new())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn argv<S: AsRef<str>>(&self, host: &str, command: &[S]) -> Vec<String> {
        self.0
            .iter()
            .map(|part| part.replace(HOST_PLACEHOLDER, host))
            .chain(command.iter().map(|arg| arg.as_ref().to_string()))
            .collect()
    }
}
