//! Provider credentials.
//!
//! Keys are resolved on every call so a rotated environment variable takes
//! effect without rebuilding the client. The resolved key is only ever placed
//! in request headers.

use std::fmt;

use crate::{HuginnError, Result};

/// Where a provider's API key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum ApiKey {
    /// Literal key supplied programmatically.
    Static(String),
    /// Name of an environment variable read at call time.
    Env(String),
}

impl ApiKey {
    pub fn from_env(var: impl Into<String>) -> Self {
        Self::Env(var.into())
    }

    /// Resolve the key. `provider` names the owner in the error.
    pub fn resolve(&self, provider: &str) -> Result<String> {
        let key = match self {
            Self::Static(key) => key.clone(),
            Self::Env(var) => std::env::var(var).unwrap_or_default(),
        };
        if key.trim().is_empty() {
            return Err(HuginnError::MissingCredential(provider.to_string()));
        }
        Ok(key)
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self::Static(key.to_string())
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self::Static(key)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("ApiKey::Static(***)"),
            Self::Env(var) => write!(f, "ApiKey::Env({var})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_key_resolves() {
        assert_eq!(ApiKey::from("sk-test").resolve("openai").unwrap(), "sk-test");
    }

    #[test]
    fn blank_key_is_missing() {
        let err = ApiKey::from("  ").resolve("anthropic").unwrap_err();
        assert!(matches!(err, HuginnError::MissingCredential(p) if p == "anthropic"));
    }

    #[test]
    fn unset_env_is_missing() {
        let key = ApiKey::from_env("HUGINN_TEST_SURELY_UNSET_KEY");
        assert!(matches!(
            key.resolve("google"),
            Err(HuginnError::MissingCredential(_))
        ));
    }

    #[test]
    fn debug_redacts_static_key() {
        let rendered = format!("{:?}", ApiKey::from("sk-secret"));
        assert!(!rendered.contains("secret"));
    }
}
