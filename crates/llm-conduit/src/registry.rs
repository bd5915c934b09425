//! Configuration-driven provider construction.
//!
//! Provider crates register a [`ProviderFactory`] under their name.
//! Applications then build a provider (and with it, the stream decoder
//! for its dialect) from a [`ProviderConfig`] without naming the
//! concrete type.
//!
//! ```rust,no_run
//! use llm_conduit::registry::{ProviderConfig, ProviderRegistry};
//!
//! let config = ProviderConfig::new("openai", "gpt-4o-mini").api_key("sk-...");
//! let provider = ProviderRegistry::global().build(&config).expect("provider registered");
//! ```
//!
//! Provider crates expose a `register_global()` helper:
//!
//! ```rust,ignore
//! llm_conduit_openai::register_global();
//! llm_conduit_ollama::register_global();
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde_json::Value;

use crate::error::LlmError;
use crate::json::{JsonBackend, default_backend};
use crate::provider::DynProvider;

/// Provider-agnostic construction settings.
///
/// Dialect-specific options go in `extra`; each provider crate documents
/// the keys it reads.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// Registered provider name (`"openai"`, `"anthropic"`, `"gemini"`, `"ollama"`).
    pub provider: String,
    /// API key for authenticated providers.
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Custom base URL.
    pub base_url: Option<String>,
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// JSON backend for stream payloads. `serde_json` when unset.
    pub json: Option<Arc<dyn JsonBackend>>,
    /// Provider-specific options.
    pub extra: HashMap<String, Value>,
}

impl ProviderConfig {
    /// Creates a config for `provider` and `model`.
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the JSON backend.
    #[must_use]
    pub fn json_backend(mut self, json: Arc<dyn JsonBackend>) -> Self {
        self.json = Some(json);
        self
    }

    /// Adds a provider-specific option.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The configured JSON backend, or the default one.
    pub fn json_or_default(&self) -> Arc<dyn JsonBackend> {
        self.json.clone().unwrap_or_else(default_backend)
    }

    /// A string option from `extra`.
    pub fn get_extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// A boolean option from `extra`.
    pub fn get_extra_bool(&self, key: &str) -> Option<bool> {
        self.extra.get(key).and_then(Value::as_bool)
    }

    /// An unsigned integer option from `extra`.
    pub fn get_extra_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(Value::as_u64)
    }
}

/// Builds providers of one kind from configuration.
pub trait ProviderFactory: Send + Sync {
    /// Lowercase name the factory is registered under.
    fn name(&self) -> &str;

    /// Creates a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is missing something this
    /// provider requires.
    fn build(&self, config: &ProviderConfig) -> Result<Box<dyn DynProvider>, LlmError>;
}

/// A name-to-factory map, safe to share across threads.
///
/// Use [`ProviderRegistry::global()`] for the process-wide instance or
/// [`ProviderRegistry::new()`] for an isolated one.
pub struct ProviderRegistry {
    factories: RwLock<HashMap<String, Arc<dyn ProviderFactory>>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factories = self.read();
        let names: Vec<_> = factories.keys().collect();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<ProviderRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ProviderRegistry::new)
    }

    // A panic while holding the lock cannot leave the map half-written,
    // so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn ProviderFactory>>> {
        self.factories.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<dyn ProviderFactory>>> {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a factory, replacing any with the same name.
    pub fn register(&self, factory: Box<dyn ProviderFactory>) -> &Self {
        self.register_shared(Arc::from(factory))
    }

    /// Registers a shared factory, replacing any with the same name.
    pub fn register_shared(&self, factory: Arc<dyn ProviderFactory>) -> &Self {
        let name = factory.name().to_lowercase();
        tracing::debug!(provider = %name, "registering provider factory");
        self.write().insert(name, factory);
        self
    }

    /// Removes a factory. Returns `true` if one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.write().remove(&name.to_lowercase()).is_some()
    }

    /// Whether a factory is registered under `name` (case-insensitive).
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(&name.to_lowercase())
    }

    /// Names of all registered factories.
    pub fn providers(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Builds a provider from `config.provider`'s factory.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidRequest`] for an unregistered name, or
    /// whatever the factory returns.
    pub fn build(&self, config: &ProviderConfig) -> Result<Box<dyn DynProvider>, LlmError> {
        let name = config.provider.to_lowercase();
        let factory = {
            let factories = self.read();
            factories.get(&name).cloned().ok_or_else(|| {
                let mut available: Vec<_> = factories.keys().cloned().collect();
                available.sort();
                LlmError::InvalidRequest(format!(
                    "unknown provider '{}'. Available: {available:?}",
                    config.provider
                ))
            })?
        };
        factory.build(config)
    }
}
