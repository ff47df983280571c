//! Blocking HTTP access on behalf of a sandboxed module.

use std::io::Read;
use std::time::Duration;

use super::config::HostCapabilities;

/// Network capability of one instance.
///
/// `None` agent means the capability was not granted; every request then
/// fails with a message the module can forward to the host.
#[derive(Clone)]
pub struct NetworkAccess {
    agent: Option<ureq::Agent>,
    max_response_bytes: u64,
}

impl NetworkAccess {
    /// Build the capability from the runtime's host capabilities.
    pub fn new(caps: &HostCapabilities) -> Self {
        let agent = caps.network.then(|| {
            let mut builder = ureq::AgentBuilder::new();
            if caps.http_timeout_ms > 0 {
                builder = builder.timeout(Duration::from_millis(caps.http_timeout_ms));
            }
            builder.build()
        });

        Self {
            agent,
            max_response_bytes: caps.max_response_bytes,
        }
    }

    /// Whether requests are allowed at all.
    pub fn is_enabled(&self) -> bool {
        self.agent.is_some()
    }

    /// GET `url` and return the response body.
    ///
    /// Transport failures, non-2xx statuses and oversized bodies all come
    /// back as a descriptive message.
    pub fn get(&self, url: &str) -> Result<Vec<u8>, String> {
        let agent = self
            .agent
            .as_ref()
            .ok_or_else(|| format!("GET {url}: network access denied"))?;

        let response = agent.get(url).call().map_err(|e| describe(url, e))?;

        let mut body = Vec::new();
        response
            .into_reader()
            .take(self.max_response_bytes.saturating_add(1))
            .read_to_end(&mut body)
            .map_err(|e| format!("GET {url}: reading body: {e}"))?;

        if body.len() as u64 > self.max_response_bytes {
            return Err(format!(
                "GET {url}: response exceeds {} bytes",
                self.max_response_bytes
            ));
        }

        Ok(body)
    }
}

/// Error text with the URL exactly once; ureq's Display already carries it.
fn describe(url: &str, error: ureq::Error) -> String {
    match error {
        ureq::Error::Status(code, _) => format!("GET {url}: status code {code}"),
        ureq::Error::Transport(transport) => match transport.message() {
            Some(message) => format!("GET {url}: {}: {message}", transport.kind()),
            None => format!("GET {url}: {}", transport.kind()),
        },
    }
}

impl std::fmt::Debug for NetworkAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkAccess")
            .field("enabled", &self.is_enabled())
            .field("max_response_bytes", &self.max_response_bytes)
            .finish()
    }
}
