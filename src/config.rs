//! Logseq HTTP API settings resolved from the environment.
//!
//! The API variables are read at call time for API-backed tools and once at
//! startup for the availability probe. Presence and defaulting are kept
//! separate: only variables that are actually set get forwarded to the
//! script subprocesses, while the probe and remediation hints display the
//! defaulted host/port.

use std::env;

pub const API_HOST_ENV: &str = "LOGSEQ_API_HOST";
pub const API_PORT_ENV: &str = "LOGSEQ_API_PORT";
pub const API_TOKEN_ENV: &str = "LOGSEQ_API_AUTHORIZATION_TOKEN";

pub const DEFAULT_API_HOST: &str = "host.docker.internal";
pub const DEFAULT_API_PORT: &str = "12315";

/// Raw API settings as present in the environment.
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    pub host: Option<String>,
    pub port: Option<String>,
    pub token: Option<String>,
}

impl ApiConfig {
    /// Read the three API variables, treating empty values as unset.
    pub fn from_env() -> Self {
        Self {
            host: non_empty_var(API_HOST_ENV),
            port: non_empty_var(API_PORT_ENV),
            token: non_empty_var(API_TOKEN_ENV),
        }
    }

    pub fn host_or_default(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_API_HOST)
    }

    pub fn port_or_default(&self) -> &str {
        self.port.as_deref().unwrap_or(DEFAULT_API_PORT)
    }

    /// Root URL probed at startup.
    pub fn api_url(&self) -> String {
        format!(
            "http://{}:{}/api",
            self.host_or_default(),
            self.port_or_default()
        )
    }

    /// Environment entries forwarded to API scripts.
    ///
    /// The token is never invented; host and port default inside the
    /// scripts themselves, not here.
    pub fn subprocess_env(&self) -> Vec<(String, String)> {
        let mut forwarded = Vec::new();
        if let Some(host) = &self.host {
            forwarded.push((API_HOST_ENV.to_string(), host.clone()));
        }
        if let Some(port) = &self.port {
            forwarded.push((API_PORT_ENV.to_string(), port.clone()));
        }
        if let Some(token) = &self.token {
            forwarded.push((API_TOKEN_ENV.to_string(), token.clone()));
        }
        forwarded
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}
