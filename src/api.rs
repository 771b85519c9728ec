//! HTTP/JSON client for the vibe backend.
//!
//! The backend owns all durable state; this client is a thin RPC surface.
//! Coordinates travel as decimal strings on the wire and are parsed by the
//! pin adapter, not here.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Substring the backend embeds in the error body when a session signature
/// no longer verifies. Treated as a forced-logout condition, never retried.
pub const SESSION_SENTINEL: &str = "invalid session signature";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vibe {
    pub id: u64,
    pub latitude: String,
    pub longitude: String,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub is_private: bool,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub music_link: String,
}

/// Body for create/update calls. Coordinates are formatted as decimal
/// strings to match the wire convention.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VibePayload {
    pub name: String,
    pub description: String,
    pub music_link: String,
    pub latitude: String,
    pub longitude: String,
    pub is_private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub principal: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub principal: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub pin_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminStatus {
    is_admin: bool,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone)]
pub enum ApiError {
    /// Transport-level failure (DNS, refused connection, timeout).
    Network(String),
    /// Non-success HTTP status that is not a session problem.
    Http(u16, String),
    /// Response body did not decode as expected.
    Parse(String),
    /// Expired or invalid session signature; caller must force logout.
    SessionExpired,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(e) => write!(f, "network error: {}", e),
            ApiError::Http(code, body) => {
                if body.is_empty() {
                    write!(f, "backend returned HTTP {}", code)
                } else {
                    write!(f, "backend returned HTTP {}: {}", code, body)
                }
            }
            ApiError::Parse(e) => write!(f, "bad response from backend: {}", e),
            ApiError::SessionExpired => write!(f, "session expired, please sign in again"),
        }
    }
}

impl ApiError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}

fn classify_status(code: u16, body: String) -> ApiError {
    if code == 401 || body.to_ascii_lowercase().contains(SESSION_SENTINEL) {
        ApiError::SessionExpired
    } else {
        let mut body = body;
        body.truncate(200);
        ApiError::Http(code, body)
    }
}

// ============================================================================
// Client
// ============================================================================

#[derive(Clone)]
pub struct ApiClient {
    agent: ureq::Agent,
    base: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(REQUEST_TIMEOUT)
                .build(),
            base: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Same client minus the bearer token; public reads keep working after
    /// a forced logout.
    pub fn without_token(&self) -> Self {
        Self {
            agent: self.agent.clone(),
            base: self.base.clone(),
            token: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn authorize(&self, req: ureq::Request) -> ureq::Request {
        match &self.token {
            Some(token) => req.set("Authorization", &format!("Bearer {}", token)),
            None => req,
        }
    }

    fn read_json<T: DeserializeOwned>(
        result: Result<ureq::Response, ureq::Error>,
    ) -> Result<T, ApiError> {
        match result {
            Ok(resp) => resp
                .into_json::<T>()
                .map_err(|e| ApiError::Parse(e.to_string())),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(classify_status(code, body))
            }
            Err(e) => Err(ApiError::Network(e.to_string())),
        }
    }

    fn read_empty(result: Result<ureq::Response, ureq::Error>) -> Result<(), ApiError> {
        match result {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(classify_status(code, body))
            }
            Err(e) => Err(ApiError::Network(e.to_string())),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let req = self.authorize(self.agent.get(&self.url(path)));
        Self::read_json(req.call())
    }

    // ------------------------------------------------------------------
    // Vibes
    // ------------------------------------------------------------------

    /// Full pin set; the backend filters private pins by caller identity.
    pub fn get_all_vibes(&self) -> Result<Vec<Vibe>, ApiError> {
        self.get_json("vibes")
    }

    pub fn get_vibes_by_owner(&self, principal: &str) -> Result<Vec<Vibe>, ApiError> {
        self.get_json(&format!("vibes?owner={}", urlencoding::encode(principal)))
    }

    pub fn create_vibe(&self, payload: &VibePayload) -> Result<(), ApiError> {
        let req = self.authorize(self.agent.post(&self.url("vibes")));
        Self::read_empty(req.send_json(payload))
    }

    pub fn update_vibe(&self, id: u64, payload: &VibePayload) -> Result<(), ApiError> {
        let req = self.authorize(self.agent.put(&self.url(&format!("vibes/{}", id))));
        Self::read_empty(req.send_json(payload))
    }

    pub fn delete_vibe(&self, id: u64) -> Result<(), ApiError> {
        let req = self.authorize(self.agent.delete(&self.url(&format!("vibes/{}", id))));
        Self::read_empty(req.call())
    }

    // ------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------

    pub fn get_user_profile(&self) -> Result<Option<UserProfile>, ApiError> {
        self.get_json("profile/me")
    }

    pub fn get_profile_by_principal(
        &self,
        principal: &str,
    ) -> Result<Option<UserProfile>, ApiError> {
        self.get_json(&format!("profiles/{}", urlencoding::encode(principal)))
    }

    // ------------------------------------------------------------------
    // Admin
    // ------------------------------------------------------------------

    pub fn is_current_user_admin(&self) -> Result<bool, ApiError> {
        let status: AdminStatus = self.get_json("admin/me")?;
        Ok(status.is_admin)
    }

    pub fn list_users(&self) -> Result<Vec<UserInfo>, ApiError> {
        self.get_json("admin/users")
    }
}
