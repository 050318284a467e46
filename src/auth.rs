use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::config::IntegrationConfig;
use crate::error::Error;
use crate::error::Result;

/// Credential used for both the REST API and git transport.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Token { token: String },
    Basic { username: String, password: String },
}

// Keep secrets out of logs and panics.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token { .. } => f.write_str("Token { .. }"),
            Self::Basic { username, .. } => write!(f, "Basic {{ username: {:?}, .. }}", username),
        }
    }
}

/// Resolved authorization for one invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub credential: Credential,
    authorization: String,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl AuthContext {
    pub fn new(credential: Credential) -> Self {
        let authorization = match &credential {
            Credential::Token { token } => format!("Bearer {}", token),
            Credential::Basic { username, password } => {
                format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
            }
        };
        Self {
            credential,
            authorization,
        }
    }

    /// Value of the `Authorization` header.
    pub fn authorization_header_value(&self) -> &str {
        &self.authorization
    }
}

/// Derive the auth context for a host.
///
/// A non-empty `token_override` wins over the configured token, which wins over
/// the configured username and password.
pub fn resolve(integration: &IntegrationConfig, token_override: Option<&str>) -> Result<AuthContext> {
    if let Some(token) = non_empty(token_override).or(non_empty(integration.token.as_deref())) {
        return Ok(AuthContext::new(Credential::Token {
            token: token.to_string(),
        }));
    }

    match (
        non_empty(integration.username.as_deref()),
        non_empty(integration.password.as_deref()),
    ) {
        (Some(username), Some(password)) => Ok(AuthContext::new(Credential::Basic {
            username: username.to_string(),
            password: password.to_string(),
        })),
        _ => Err(Error::MissingCredentials {
            host: integration.host.clone(),
        }),
    }
}

/// The trimmed value, if anything is left after trimming.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const HOST: &str = "bitbucket.example.com";

    #[test]
    fn test_override_token_wins() {
        let integration = IntegrationConfig::new(HOST)
            .with_token("configured")
            .with_basic_auth("robot", "hunter2");
        let auth = resolve(&integration, Some("override")).unwrap();
        assert_eq!(
            auth.credential,
            Credential::Token {
                token: "override".to_string()
            }
        );
        assert_eq!(auth.authorization_header_value(), "Bearer override");
    }

    #[test]
    fn test_configured_token_wins_over_basic() {
        let integration = IntegrationConfig::new(HOST)
            .with_token("configured")
            .with_basic_auth("robot", "hunter2");
        let auth = resolve(&integration, None).unwrap();
        assert_eq!(auth.authorization_header_value(), "Bearer configured");
    }

    #[test]
    fn test_blank_override_falls_back() {
        let integration = IntegrationConfig::new(HOST).with_basic_auth("robot", "hunter2");
        let auth = resolve(&integration, Some("  ")).unwrap();
        assert_eq!(
            auth.credential,
            Credential::Basic {
                username: "robot".to_string(),
                password: "hunter2".to_string(),
            }
        );
        // base64("robot:hunter2")
        assert_eq!(auth.authorization_header_value(), "Basic cm9ib3Q6aHVudGVyMg==");
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        let integration = IntegrationConfig::new(HOST).with_basic_auth(" robot\n", "hunter2\n");
        let auth = resolve(&integration, None).unwrap();
        assert_eq!(auth.authorization_header_value(), "Basic cm9ib3Q6aHVudGVyMg==");

        let auth = resolve(&integration, Some("override\n")).unwrap();
        assert_eq!(auth.authorization_header_value(), "Bearer override");
    }

    #[rstest]
    #[case::nothing(IntegrationConfig::new(HOST))]
    #[case::username_only(IntegrationConfig { username: Some("robot".into()), ..IntegrationConfig::new(HOST) })]
    #[case::password_only(IntegrationConfig { password: Some("hunter2".into()), ..IntegrationConfig::new(HOST) })]
    #[case::empty_token(IntegrationConfig::new(HOST).with_token(""))]
    #[case::empty_basic(IntegrationConfig::new(HOST).with_basic_auth("", ""))]
    fn test_missing_credentials(#[case] integration: IntegrationConfig) {
        let err = resolve(&integration, None).unwrap_err();
        assert!(matches!(err, Error::MissingCredentials { host } if host == HOST));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let auth = AuthContext::new(Credential::Basic {
            username: "robot".to_string(),
            password: "hunter2".to_string(),
        });
        let debug = format!("{:?}", auth.credential);
        assert!(debug.contains("robot"));
        assert!(!debug.contains("hunter2"));
    }
}
