//! Hashing secret retrieval.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use esp_fixtures::SecretVersion;
use parking_lot::Mutex;
use tracing::{error, warn};

use crate::error::SecretError;

/// Secret version stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecretStage {
    Current,
    Previous,
}

impl SecretStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Current => "AWSCURRENT",
            Self::Previous => "AWSPREVIOUS",
        }
    }
}

impl std::fmt::Display for SecretStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of versioned secret values.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Value of `name` at `stage`, or `None` when that stage does not exist.
    async fn get_secret(&self, name: &str, stage: SecretStage) -> Result<Option<Bytes>, SecretError>;
}

/// The two live versions of a rotating secret.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretVersions {
    pub current: Option<Bytes>,
    pub previous: Option<Bytes>,
}

impl std::fmt::Debug for SecretVersions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = |v: &Option<Bytes>| if v.is_some() { "[redacted]" } else { "absent" };
        f.debug_struct("SecretVersions")
            .field("current", &state(&self.current))
            .field("previous", &state(&self.previous))
            .finish()
    }
}

impl SecretVersions {
    /// Secret for a scenario's version tag. `Plaintext` has no secret.
    #[must_use]
    pub fn for_version(&self, version: SecretVersion) -> Option<&Bytes> {
        match version {
            SecretVersion::Current => self.current.as_ref(),
            SecretVersion::Previous => self.previous.as_ref(),
            SecretVersion::Plaintext => None,
        }
    }
}

/// Fetch both stages of `name`.
///
/// A stage that errors is logged and treated as absent. Both absent is
/// [`SecretError::NoVersions`].
pub async fn get_current_and_previous_secret(
    source: &dyn SecretSource,
    name: &str,
) -> Result<SecretVersions, SecretError> {
    let mut versions = SecretVersions::default();
    for stage in [SecretStage::Current, SecretStage::Previous] {
        let value = match source.get_secret(name, stage).await {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(Some(_)) => {
                warn!(secret = name, %stage, "secret has no usable value");
                None
            }
            Ok(None) => {
                warn!(secret = name, %stage, "secret stage not found");
                None
            }
            Err(err) => {
                error!(secret = name, %stage, error = %err, "error retrieving secret");
                None
            }
        };
        match stage {
            SecretStage::Current => versions.current = value,
            SecretStage::Previous => versions.previous = value,
        }
    }

    if versions.current.is_none() && versions.previous.is_none() {
        error!(secret = name, "neither AWSCURRENT nor AWSPREVIOUS exists");
        return Err(SecretError::NoVersions {
            name: name.to_string(),
        });
    }
    Ok(versions)
}

/// Secrets held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySecretSource {
    secrets: Arc<Mutex<BTreeMap<(String, SecretStage), Bytes>>>,
}

impl InMemorySecretSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one stage of a secret.
    pub fn set(&self, name: &str, stage: SecretStage, value: impl Into<Bytes>) {
        self.secrets
            .lock()
            .insert((name.to_string(), stage), value.into());
    }

    /// Rotate: the current value becomes previous and `value` becomes current.
    pub fn rotate(&self, name: &str, value: impl Into<Bytes>) {
        let mut secrets = self.secrets.lock();
        if let Some(current) = secrets.remove(&(name.to_string(), SecretStage::Current)) {
            secrets.insert((name.to_string(), SecretStage::Previous), current);
        }
        secrets.insert((name.to_string(), SecretStage::Current), value.into());
    }
}

#[async_trait]
impl SecretSource for InMemorySecretSource {
    async fn get_secret(&self, name: &str, stage: SecretStage) -> Result<Option<Bytes>, SecretError> {
        Ok(self
            .secrets
            .lock()
            .get(&(name.to_string(), stage))
            .cloned())
    }
}

/// Secrets read from `<PREFIX>_AWSCURRENT` / `<PREFIX>_AWSPREVIOUS`
/// environment variables. The secret name is not used.
#[derive(Debug, Clone)]
pub struct EnvSecretSource {
    prefix: String,
}

impl EnvSecretSource {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn variable_for(&self, stage: SecretStage) -> String {
        format!("{}_{}", self.prefix, stage.as_str())
    }
}

#[async_trait]
impl SecretSource for EnvSecretSource {
    async fn get_secret(&self, _name: &str, stage: SecretStage) -> Result<Option<Bytes>, SecretError> {
        Ok(std::env::var(self.variable_for(stage))
            .ok()
            .map(Bytes::from))
    }
}
