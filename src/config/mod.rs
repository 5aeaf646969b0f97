//! Application configuration.
//!
//! Aggregates configuration for the topic, queues, routing rules and the
//! rescue consumer into a single Config struct that can be loaded from YAML
//! files or environment variables.
//!
//! Subscriptions are fixed at startup; nothing here is reloaded at runtime.

mod queues;
mod routing;

use std::time::Duration;

use serde::Deserialize;

pub use queues::{ConsumerConfig, QueueBackend, QueueConfig, RescueConfig};
pub use routing::{DestinationConfig, RoutingConfig, RuleConfig, SubscriptionConfig, Target};

use crate::consumers::RESCUE_CONSUMER_NAME;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "sluice.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "SLUICE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "SLUICE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "SLUICE_LOG";
/// Environment variable for the rescue queue address, used when the config
/// file leaves it unset.
pub const RESCUE_QUEUE_URL_ENV_VAR: &str = "RESCUE_QUEUE_URL";

/// Configuration errors. All are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(String),

    #[error("Rescue queue address is required (rescue.queue_url or RESCUE_QUEUE_URL)")]
    MissingRescueQueue,

    #[error("Rescue queue '{0}' does not match any configured queue")]
    UnknownRescueQueue(String),

    #[error("Subscription '{subscription}': rule has no values")]
    EmptyRuleValues { subscription: String },

    #[error("Subscription '{subscription}': rule needs exactly one of allow or deny")]
    AmbiguousRule { subscription: String },

    #[error("Subscription '{subscription}': destination needs exactly one of queue or consumer")]
    AmbiguousDestination { subscription: String },

    #[error("Subscription '{subscription}': unknown destination '{destination}'")]
    UnknownDestination {
        subscription: String,
        destination: String,
    },

    #[error("Queue '{0}' is defined more than once")]
    DuplicateQueue(String),

    #[error("Queue '{queue}': {reason}")]
    InvalidQueue { queue: String, reason: String },
}

/// Topic configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Topic name, for logging.
    pub name: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            name: "events".to_string(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Topic events are published to.
    pub topic: TopicConfig,
    /// Durable queues.
    pub queues: Vec<QueueConfig>,
    /// Subscriptions binding rules to destinations.
    pub routing: RoutingConfig,
    /// Rescue consumer.
    pub rescue: RescueConfig,
    /// Active consumer invocation settings.
    pub consumer: ConsumerConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `DEFAULT_CONFIG_FILE` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. `RESCUE_QUEUE_URL_ENV_VAR` if the rescue queue is still unset
    ///
    /// The result is validated before it is returned.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        let mut config: Config = config
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.rescue.queue_url.is_none() {
            if let Ok(url) = std::env::var(RESCUE_QUEUE_URL_ENV_VAR) {
                self.rescue.queue_url = Some(url);
            }
        }
    }

    /// Check everything that can be checked without connecting anywhere.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = std::collections::HashSet::new();
        for queue in &self.queues {
            if !names.insert(queue.name.as_str()) {
                return Err(ConfigError::DuplicateQueue(queue.name.clone()));
            }
            queue.validate()?;
        }

        let rescue_queue = self.rescue_queue_url()?;
        if self.find_queue(rescue_queue).is_none() && !QueueConfig::is_remote_address(rescue_queue)
        {
            return Err(ConfigError::UnknownRescueQueue(rescue_queue.to_string()));
        }

        for sub in &self.routing.subscriptions {
            sub.rule.to_rule(&sub.name)?;
            match sub.destination.target(&sub.name)? {
                Target::Queue(queue) => {
                    if self.find_queue(queue).is_none() {
                        return Err(ConfigError::UnknownDestination {
                            subscription: sub.name.clone(),
                            destination: queue.to_string(),
                        });
                    }
                }
                Target::Consumer(consumer) => {
                    if !is_known_consumer(consumer) {
                        return Err(ConfigError::UnknownDestination {
                            subscription: sub.name.clone(),
                            destination: consumer.to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// The required rescue queue address.
    pub fn rescue_queue_url(&self) -> Result<&str, ConfigError> {
        match self.rescue.queue_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => Err(ConfigError::MissingRescueQueue),
        }
    }

    /// Find a queue by name or URL.
    pub fn find_queue(&self, reference: &str) -> Option<&QueueConfig> {
        self.queues
            .iter()
            .find(|q| q.name == reference || q.url.as_deref() == Some(reference))
    }

    pub fn consumer_timeout(&self) -> Duration {
        Duration::from_secs(self.consumer.timeout_secs)
    }
}

/// Consumers the pipeline knows how to build.
pub const KNOWN_CONSUMERS: &[&str] = &[RESCUE_CONSUMER_NAME];

fn is_known_consumer(name: &str) -> bool {
    KNOWN_CONSUMERS.contains(&name)
}
