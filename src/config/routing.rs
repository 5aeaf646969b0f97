//! Routing configuration types.

use serde::Deserialize;

use super::ConfigError;
use crate::routing::{Rule, RuleError};

/// Subscriptions, evaluated independently for every event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub subscriptions: Vec<SubscriptionConfig>,
}

/// One subscription: a rule and where matching events go.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    /// Name, for logging.
    pub name: String,
    /// Filter rule.
    pub rule: RuleConfig,
    /// Delivery target.
    pub destination: DestinationConfig,
}

/// Filter rule as written in config.
///
/// ```yaml
/// rule:
///   attribute: country
///   allow: [Ireland, China]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    /// Attribute key the rule inspects.
    pub attribute: String,
    /// Allow-list values.
    #[serde(default)]
    pub allow: Option<Vec<String>>,
    /// Deny-list values.
    #[serde(default)]
    pub deny: Option<Vec<String>>,
}

impl RuleConfig {
    /// Build the rule, attributing errors to `subscription`.
    pub fn to_rule(&self, subscription: &str) -> Result<Rule, ConfigError> {
        let result = match (&self.allow, &self.deny) {
            (Some(values), None) => Rule::allow(&self.attribute, values.iter().cloned()),
            (None, Some(values)) => Rule::deny(&self.attribute, values.iter().cloned()),
            _ => {
                return Err(ConfigError::AmbiguousRule {
                    subscription: subscription.to_string(),
                })
            }
        };

        result.map_err(|e| match e {
            RuleError::EmptyValues { .. } => ConfigError::EmptyRuleValues {
                subscription: subscription.to_string(),
            },
        })
    }
}

/// Delivery target as written in config: exactly one of `queue` or `consumer`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Name or URL of a configured queue.
    pub queue: Option<String>,
    /// Name of an active consumer.
    pub consumer: Option<String>,
}

/// Resolved delivery target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    Queue(&'a str),
    Consumer(&'a str),
}

impl DestinationConfig {
    pub fn target(&self, subscription: &str) -> Result<Target<'_>, ConfigError> {
        match (self.queue.as_deref(), self.consumer.as_deref()) {
            (Some(queue), None) => Ok(Target::Queue(queue)),
            (None, Some(consumer)) => Ok(Target::Consumer(consumer)),
            _ => Err(ConfigError::AmbiguousDestination {
                subscription: subscription.to_string(),
            }),
        }
    }
}
