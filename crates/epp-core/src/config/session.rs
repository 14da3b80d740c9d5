//! Session and credential configuration

use epp_protocol::{LoginOptions, ResultPolicy, MAX_PAYLOAD_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::serde_utils::option_duration_secs;

/// Environment variable consulted for the login password
pub const PASSWORD_ENV: &str = "EPP_PASSWORD";

/// Login credentials
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Registrar client identifier (`<clID>`)
    pub client_id: String,

    /// Password (`<pw>`); usually left out of the file and taken from
    /// `EPP_PASSWORD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            password: Some(password.into()),
        }
    }

    /// Fill a missing password from the environment
    pub fn with_env_password(mut self) -> Self {
        if self.password.is_none() {
            self.password = std::env::var(PASSWORD_ENV).ok();
        }
        self
    }
}

// Keeps the password out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Behaviour of a session once the channel is open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Prefix of generated client transaction ids
    pub transaction_prefix: String,

    /// How result codes are classified
    pub result_policy: ResultPolicy,

    /// Bound on waiting for the greeting; defaults to the connect timeout
    #[serde(
        default,
        with = "option_duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub greeting_timeout: Option<Duration>,

    /// Refuse servers whose greeting announces a different `<svID>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_server_id: Option<String>,

    /// Largest response payload accepted
    pub max_payload: usize,

    /// Values sent in `<login>` besides the credentials
    pub login: LoginOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            transaction_prefix: "CLI".to_string(),
            result_policy: ResultPolicy::default(),
            greeting_timeout: None,
            expected_server_id: None,
            max_payload: MAX_PAYLOAD_SIZE,
            login: LoginOptions::default(),
        }
    }
}
