#![forbid(unsafe_code)]

//! Store configuration.
//!
//! The only tunables are the two reserved accessor names that
//! [`ReactiveStore::access`](crate::ReactiveStore::access) resolves to the
//! bound subscribe/unsubscribe handles. Values come from code, from the
//! process environment, or (feature `serde`) from JSON.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `PROPWATCH_SUBSCRIBE_ACCESSOR` | `subscribe_accessor` | `"on"` |
//! | `PROPWATCH_UNSUBSCRIBE_ACCESSOR` | `unsubscribe_accessor` | `"off"` |

/// Environment variable overriding [`StoreConfig::subscribe_accessor`].
pub const ENV_SUBSCRIBE_ACCESSOR: &str = "PROPWATCH_SUBSCRIBE_ACCESSOR";

/// Environment variable overriding [`StoreConfig::unsubscribe_accessor`].
pub const ENV_UNSUBSCRIBE_ACCESSOR: &str = "PROPWATCH_UNSUBSCRIBE_ACCESSOR";

/// Errors from configuration loading and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An accessor name was empty.
    EmptyAccessorName {
        /// Which accessor (`"subscribe"` or `"unsubscribe"`).
        which: &'static str,
    },
    /// Subscribe and unsubscribe accessors share a name.
    AccessorCollision(String),
    /// A config document could not be parsed.
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyAccessorName { which } => write!(f, "empty {which} accessor name"),
            Self::AccessorCollision(name) => {
                write!(f, "subscribe and unsubscribe accessors both named '{name}'")
            }
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for a [`Bindings`](crate::Bindings) table and the stores it
/// hands out.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StoreConfig {
    /// Read name that resolves to the bound subscribe handle. Default: `"on"`.
    pub subscribe_accessor: String,
    /// Read name that resolves to the bound unsubscribe handle. Default: `"off"`.
    pub unsubscribe_accessor: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            subscribe_accessor: "on".to_string(),
            unsubscribe_accessor: "off".to_string(),
        }
    }
}

impl StoreConfig {
    /// Set the subscribe accessor name.
    #[must_use]
    pub fn with_subscribe_accessor(mut self, name: impl Into<String>) -> Self {
        self.subscribe_accessor = name.into();
        self
    }

    /// Set the unsubscribe accessor name.
    #[must_use]
    pub fn with_unsubscribe_accessor(mut self, name: impl Into<String>) -> Self {
        self.unsubscribe_accessor = name.into();
        self
    }

    /// Defaults overridden by the `PROPWATCH_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable lookup.
    ///
    /// Blank values are ignored.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            get_env(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();
        if let Some(name) = lookup(ENV_SUBSCRIBE_ACCESSOR) {
            config.subscribe_accessor = name;
        }
        if let Some(name) = lookup(ENV_UNSUBSCRIBE_ACCESSOR) {
            config.unsubscribe_accessor = name;
        }
        config
    }

    /// Parse a JSON document. Missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(input).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that both accessor names are non-empty and distinct.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscribe_accessor.is_empty() {
            return Err(ConfigError::EmptyAccessorName { which: "subscribe" });
        }
        if self.unsubscribe_accessor.is_empty() {
            return Err(ConfigError::EmptyAccessorName {
                which: "unsubscribe",
            });
        }
        if self.subscribe_accessor == self.unsubscribe_accessor {
            return Err(ConfigError::AccessorCollision(self.subscribe_accessor.clone()));
        }
        Ok(())
    }
}
