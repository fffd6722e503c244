use thiserror::Error;

/// Prefix every OpenRouter API key starts with
pub const CREDENTIAL_PREFIX: &str = "sk-or-v1-";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Please enter your OpenRouter API key")]
    Missing,

    #[error("Invalid API key format. OpenRouter API keys should start with \"{}\"", CREDENTIAL_PREFIX)]
    Malformed,
}

/// Bearer token for the completion endpoint.
///
/// `Debug` and `Display` are redacted so the secret never ends up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Validate a user-supplied key before it is used for any request.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CredentialError::Missing);
        }
        if !trimmed.starts_with(CREDENTIAL_PREFIX) {
            return Err(CredentialError::Malformed);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Wrap a token without format checks (custom endpoints, tests).
    pub fn new_unchecked(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "***{}", tail)
    }
}
