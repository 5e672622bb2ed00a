//! Blocking HTTP client bridged onto the Tokio blocking pool

use crate::error::{RunTaskError, RunTaskResult};
use serde::de::DeserializeOwned;
use tracing::debug;
use ureq::Agent;

/// User-Agent sent with every request
pub const USER_AGENT: &str = concat!("runtask/", env!("CARGO_PKG_VERSION"));

/// Extra request headers as (name, value) pairs
pub type Headers = Vec<(String, String)>;

/// Shared HTTP client.
///
/// Error statuses come back as responses so callers can react to `304`
/// and friends themselves.
#[derive(Clone)]
pub struct HttpClient {
    agent: Agent,
}

impl HttpClient {
    pub fn new() -> Self {
        let config = Agent::config_builder().http_status_as_error(false).build();
        Self {
            agent: Agent::new_with_config(config),
        }
    }

    pub(crate) fn agent(&self) -> Agent {
        self.agent.clone()
    }

    /// GET a text body, failing on any non-2xx status
    pub async fn get_text(&self, url: &str, headers: &Headers) -> RunTaskResult<String> {
        let agent = self.agent();
        let url = url.to_string();
        let headers = headers.clone();

        tokio::task::spawn_blocking(move || fetch_text(&agent, &url, &headers))
            .await
            .map_err(|e| RunTaskError::Internal(format!("HTTP task failed: {}", e)))?
    }

    /// GET and decode a JSON document
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &Headers,
    ) -> RunTaskResult<T> {
        let body = self.get_text(url, headers).await?;
        parse_json(url, &body)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

/// Decode a JSON body, reporting the URL on failure
pub fn parse_json<T: DeserializeOwned>(url: &str, body: &str) -> RunTaskResult<T> {
    serde_json::from_str(body).map_err(|e| RunTaskError::metadata(url, e.to_string()))
}

/// Start a GET request with the standard headers applied
pub(crate) fn get(
    agent: &Agent,
    url: &str,
    headers: &Headers,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let mut request = agent.get(url).header("User-Agent", USER_AGENT);
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request.call()
}

fn fetch_text(agent: &Agent, url: &str, headers: &Headers) -> RunTaskResult<String> {
    debug!("GET {}", url);
    let mut response = get(agent, url, headers).map_err(|e| RunTaskError::network(url, e))?;

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(RunTaskError::HttpStatus {
            url: url.to_string(),
            status,
        });
    }

    response
        .body_mut()
        .read_to_string()
        .map_err(|e| RunTaskError::network(url, e))
}
