//! Service options.
//!
//! Durations are written as whole seconds (`signed_url_validity`) or
//! milliseconds (retry backoffs) so the options embed cleanly in TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default lifetime of signed upload and download URLs.
pub const DEFAULT_SIGNED_URL_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AstoreOptions {
    /// Blob store bucket holding the uploaded artifacts.
    pub bucket: String,
    /// Backing document store project.
    pub project_id: String,
    #[serde(with = "secs")]
    pub signed_url_validity: Duration,
    /// Prefix of the URLs handed out by publish. Empty disables publishing.
    pub publish_base_url: String,
    pub retry: RetryConfig,
}

impl Default for AstoreOptions {
    fn default() -> Self {
        Self {
            bucket: "astore".to_string(),
            project_id: String::new(),
            signed_url_validity: DEFAULT_SIGNED_URL_VALIDITY,
            publish_base_url: String::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl AstoreOptions {
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.signed_url_validity = validity;
        self
    }

    pub fn with_publish_base_url(mut self, url: impl Into<String>) -> Self {
        self.publish_base_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Backoff policy for contended transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub attempts: usize,
    #[serde(with = "millis")]
    pub initial_backoff: Duration,
    #[serde(with = "millis")]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_secs(2),
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
