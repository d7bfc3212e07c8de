//! Trusted-login filter configuration.
//!
//! The only setting a deployment must supply is the shared secret. It is
//! normally an init parameter of the filter, with a fallback to a
//! process-wide configuration service (see [`TrustedLoginConfig::from_sources`]).

use std::{collections::HashMap, fmt, time::Duration};

use serde::Deserialize;
use zeroize::Zeroizing;

use crate::{
    error::{ConfigError, TokenError},
    validation::{DigestAlgorithm, validate_algorithm},
};

/// Default header carrying the token.
pub const DEFAULT_HEADER_NAME: &str = "X-SAKAI-TOKEN";

/// Default query parameter carrying the token.
pub const DEFAULT_PARAM_NAME: &str = "t";

/// Default number of hashes the replay window tracks.
pub const DEFAULT_REPLAY_CAPACITY: u64 = 10_000;

/// Init parameter holding the shared secret.
pub const SECRET_INIT_PARAM: &str = "sharedSecret";

/// Configuration-service key consulted when the init parameter is absent.
pub const SECRET_SERVICE_KEY: &str = "org.sakaiproject.util.TrustedLoginFilter.sharedSecret";

/// A key/value lookup the filter reads its settings from.
pub trait ConfigSource {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Settings for [`TrustedLoginGate`](crate::gate::TrustedLoginGate).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use trusted_login_authn::config::TrustedLoginConfig;
///
/// let config = TrustedLoginConfig::builder()
///     .shared_secret("s3cret")
///     .replay_window(Duration::from_secs(300))
///     .build();
/// assert!(config.validate().is_ok());
/// assert_eq!(config.header_name, "X-SAKAI-TOKEN");
/// ```
#[derive(Clone, Deserialize, bon::Builder)]
#[serde(deny_unknown_fields)]
pub struct TrustedLoginConfig {
    /// Secret shared with the token issuer. Without it no token verifies.
    #[serde(default)]
    #[builder(with = |secret: impl Into<String>| Zeroizing::new(secret.into()))]
    pub shared_secret: Option<Zeroizing<String>>,

    /// Digest algorithm name (default: `SHA1`).
    #[serde(default = "default_algorithm")]
    #[builder(into, default = default_algorithm())]
    pub algorithm: String,

    /// Header checked first for a token (default: `X-SAKAI-TOKEN`).
    #[serde(default = "default_header_name")]
    #[builder(into, default = default_header_name())]
    pub header_name: String,

    /// Query parameter checked when the header is absent (default: `t`).
    #[serde(default = "default_param_name")]
    #[builder(into, default = default_param_name())]
    pub param_name: String,

    /// How long a verified token stays single-use. Unset means tokens may be
    /// replayed.
    #[serde(default, with = "humantime_serde")]
    pub replay_window: Option<Duration>,

    /// Maximum number of hashes the replay window tracks.
    #[serde(default = "default_replay_capacity")]
    #[builder(default = DEFAULT_REPLAY_CAPACITY)]
    pub replay_capacity: u64,
}

fn default_algorithm() -> String {
    DigestAlgorithm::default().name().to_owned()
}

fn default_header_name() -> String {
    DEFAULT_HEADER_NAME.to_owned()
}

fn default_param_name() -> String {
    DEFAULT_PARAM_NAME.to_owned()
}

fn default_replay_capacity() -> u64 {
    DEFAULT_REPLAY_CAPACITY
}

impl Default for TrustedLoginConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl TrustedLoginConfig {
    /// Builds a configuration from an init-parameter source and a
    /// process-wide configuration service.
    ///
    /// The secret is read from `init` under [`SECRET_INIT_PARAM`]; if that is
    /// absent or empty, from `service` under [`SECRET_SERVICE_KEY`]. Every
    /// other setting takes its default.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use trusted_login_authn::config::{SECRET_SERVICE_KEY, TrustedLoginConfig};
    ///
    /// let init = HashMap::new();
    /// let service = HashMap::from([(SECRET_SERVICE_KEY.to_owned(), "s3cret".to_owned())]);
    ///
    /// let config = TrustedLoginConfig::from_sources(&init, &service);
    /// assert_eq!(config.shared_secret.as_deref().map(String::as_str), Some("s3cret"));
    /// ```
    #[must_use]
    pub fn from_sources(init: &dyn ConfigSource, service: &dyn ConfigSource) -> Self {
        let shared_secret = non_empty(init.get(SECRET_INIT_PARAM))
            .or_else(|| non_empty(service.get(SECRET_SERVICE_KEY)))
            .map(Zeroizing::new);
        if shared_secret.is_none() {
            tracing::warn!("No trusted-login shared secret configured; every token will be rejected");
        }
        Self { shared_secret, ..Self::default() }
    }

    /// Parses the configured algorithm name.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::UnsupportedAlgorithm`] if the name is forbidden
    /// or unknown.
    pub fn digest_algorithm(&self) -> Result<DigestAlgorithm, TokenError> {
        validate_algorithm(&self.algorithm)
    }

    /// Checks the configuration for values the gate cannot work with.
    ///
    /// A missing secret is not an error here; the gate tolerates it and
    /// rejects every token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty header or parameter name, an
    /// unsupported algorithm, a zero replay capacity, or a zero replay window.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.header_name.trim().is_empty() {
            return Err(ConfigError::Empty { field: "header_name" });
        }
        if self.param_name.trim().is_empty() {
            return Err(ConfigError::Empty { field: "param_name" });
        }
        self.digest_algorithm().map_err(ConfigError::Algorithm)?;
        if self.replay_capacity == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "replay_capacity",
                min: "1".into(),
                value: "0".into(),
            });
        }
        if let Some(window) = self.replay_window
            && window.is_zero()
        {
            return Err(ConfigError::BelowMinimum {
                field: "replay_window",
                min: "1ms".into(),
                value: format!("{window:?}"),
            });
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl fmt::Debug for TrustedLoginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedLoginConfig")
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "<redacted>"))
            .field("algorithm", &self.algorithm)
            .field("header_name", &self.header_name)
            .field("param_name", &self.param_name)
            .field("replay_window", &self.replay_window)
            .field("replay_capacity", &self.replay_capacity)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
    }

    fn secret(config: &TrustedLoginConfig) -> Option<&str> {
        config.shared_secret.as_deref().map(String::as_str)
    }

    #[test]
    fn test_defaults() {
        let config = TrustedLoginConfig::default();
        assert!(config.shared_secret.is_none());
        assert_eq!(config.algorithm, "SHA1");
        assert_eq!(config.header_name, DEFAULT_HEADER_NAME);
        assert_eq!(config.param_name, DEFAULT_PARAM_NAME);
        assert!(config.replay_window.is_none());
        assert_eq!(config.replay_capacity, DEFAULT_REPLAY_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_init_param_wins_over_service() {
        let init = source(&[(SECRET_INIT_PARAM, "from-init")]);
        let service = source(&[(SECRET_SERVICE_KEY, "from-service")]);
        let config = TrustedLoginConfig::from_sources(&init, &service);
        assert_eq!(secret(&config), Some("from-init"));
    }

    #[rstest]
    #[case::absent(&[])]
    #[case::empty(&[(SECRET_INIT_PARAM, "")])]
    fn test_service_fallback(#[case] init: &[(&str, &str)]) {
        let service = source(&[(SECRET_SERVICE_KEY, "from-service")]);
        let config = TrustedLoginConfig::from_sources(&source(init), &service);
        assert_eq!(secret(&config), Some("from-service"));
    }

    #[test]
    fn test_empty_everywhere_means_no_secret() {
        let init = source(&[(SECRET_INIT_PARAM, "")]);
        let service = source(&[(SECRET_SERVICE_KEY, "")]);
        assert!(TrustedLoginConfig::from_sources(&init, &service).shared_secret.is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = TrustedLoginConfig::builder().shared_secret("hunter2").build();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_deserialize_with_humantime_window() {
        let config: TrustedLoginConfig = serde_json::from_str(
            r#"{"shared_secret": "s3cret", "algorithm": "SHA-256", "replay_window": "5m"}"#,
        )
        .unwrap();
        assert_eq!(secret(&config), Some("s3cret"));
        assert_eq!(config.replay_window, Some(Duration::from_secs(300)));
        assert_eq!(config.digest_algorithm().unwrap(), DigestAlgorithm::Sha256);
        assert_eq!(config.param_name, DEFAULT_PARAM_NAME);
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let result = serde_json::from_str::<TrustedLoginConfig>(r#"{"sharedSecret": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        let config = TrustedLoginConfig::builder().header_name(" ").build();
        assert_eq!(config.validate(), Err(ConfigError::Empty { field: "header_name" }));

        let config = TrustedLoginConfig::builder().param_name("").build();
        assert_eq!(config.validate(), Err(ConfigError::Empty { field: "param_name" }));
    }

    #[test]
    fn test_validate_rejects_forbidden_algorithm() {
        let config = TrustedLoginConfig::builder().algorithm("MD5").build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Algorithm(TokenError::UnsupportedAlgorithm { .. }))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_replay_settings() {
        let config = TrustedLoginConfig::builder().replay_capacity(0).build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BelowMinimum { field: "replay_capacity", .. })
        ));

        let config = TrustedLoginConfig::builder().replay_window(Duration::ZERO).build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BelowMinimum { field: "replay_window", .. })
        ));
    }
}
