use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;

use plandiff_core::error::{SessionError, SessionResult};

const PROFILE_PATH: &str = "/query_profile?query_id=";
const SUMMARY_MARKER: &str = "  Summary:";
const END_MARKER: &str = "</pre></div></body></html>";

/// Fetches query profiles over HTTP with basic auth.
pub struct ProfileClient {
    base_url: String,
    auth: String,
    agent: ureq::Agent,
}

impl ProfileClient {
    pub fn new(host: &str, http_port: u16, user: &str, password: &str) -> Self {
        Self {
            base_url: format!("http://{}:{}{}", host, http_port, PROFILE_PATH),
            auth: format!("Basic {}", B64.encode(format!("{}:{}", user, password))),
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn url_for(&self, query_id: &str) -> String {
        format!("{}{}", self.base_url, query_id)
    }

    pub fn auth_header(&self) -> &str {
        &self.auth
    }

    pub fn fetch(&self, query_id: &str) -> SessionResult<String> {
        let url = self.url_for(query_id);
        tracing::trace!(%url, "fetching profile");
        let response = match self.agent.get(&url).set("Authorization", &self.auth).call() {
            Ok(r) => r,
            Err(ureq::Error::Status(code, r)) => {
                return Err(SessionError::Transport(format!(
                    "profile request for {} returned {} {}",
                    query_id,
                    code,
                    r.status_text()
                )))
            }
            Err(e) => return Err(SessionError::Transport(e.to_string())),
        };
        let body = response.into_string()?;
        if body.trim().is_empty() {
            return Err(SessionError::Transport(format!(
                "profile request for {} returned an empty body",
                query_id
            )));
        }
        Ok(extract_profile(&body).to_string())
    }
}

/// Cut the profile text out of the endpoint's HTML page. Pages without the
/// expected markers are returned whole.
pub fn extract_profile(page: &str) -> &str {
    match (page.find(SUMMARY_MARKER), page.find(END_MARKER)) {
        (Some(start), Some(end)) if start <= end => &page[start..end],
        _ => page,
    }
}
