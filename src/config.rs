use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::Error;
use crate::error::Result;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "BBPUB_CONFIG";

/// Config file used when neither `--config` nor `BBPUB_CONFIG` is given.
pub const DEFAULT_CONFIG_FILE: &str = "bbpub.yaml";

pub const DEFAULT_AUTHOR_NAME: &str = "Scaffolder";
pub const DEFAULT_AUTHOR_EMAIL: &str = "scaffolder@backstage.io";
pub const DEFAULT_COMMIT_MESSAGE: &str = "commit by backstage";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub integrations: Vec<IntegrationConfig>,
    #[serde(default)]
    pub defaults: Defaults,
    /// Per-request HTTP timeout. Unset means the transport default.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// Connection settings for one Bitbucket Server host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IntegrationConfig {
    pub host: String,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Fallbacks for commit metadata the caller did not supply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Defaults {
    #[serde(default = "default_author_name")]
    pub author_name: String,
    #[serde(default = "default_author_email")]
    pub author_email: String,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            author_name: default_author_name(),
            author_email: default_author_email(),
            commit_message: default_commit_message(),
        }
    }
}

fn default_author_name() -> String {
    DEFAULT_AUTHOR_NAME.to_string()
}

fn default_author_email() -> String {
    DEFAULT_AUTHOR_EMAIL.to_string()
}

fn default_commit_message() -> String {
    DEFAULT_COMMIT_MESSAGE.to_string()
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self = serde_yml::from_str(contents)
            .map_err(|e| Error::Config(format!("cannot parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Create a new config with explicit values (useful for tests)
    pub fn new(integrations: Vec<IntegrationConfig>) -> Self {
        Self {
            integrations,
            ..Self::default()
        }
    }

    /// Resolve the config path from an explicit flag, `BBPUB_CONFIG`, or the default file.
    pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Find the integration configured for a host.
    pub fn integration(&self, host: &str) -> Option<&IntegrationConfig> {
        self.integrations
            .iter()
            .find(|integration| integration.host.eq_ignore_ascii_case(host))
    }

    fn validate(&self) -> Result<()> {
        for integration in &self.integrations {
            if integration.host.trim().is_empty() {
                return Err(Error::Config(
                    "integration entry with an empty host".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl IntegrationConfig {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_basic_auth(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn with_api_base_url(mut self, api_base_url: &str) -> Self {
        self.api_base_url = Some(api_base_url.to_string());
        self
    }

    /// Base URL of the core REST API, e.g. `https://host/rest/api/1.0`.
    pub fn api_base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}/rest/api/1.0", self.host),
        }
    }

    /// Root of the REST plugins (`git-lfs`, `default-reviewers`), e.g. `https://host/rest`.
    pub fn rest_base_url(&self) -> String {
        let api = self.api_base_url();
        match api.strip_suffix("/api/1.0") {
            Some(root) => root.to_string(),
            None => format!("https://{}/rest", self.host),
        }
    }
}
