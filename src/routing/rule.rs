//! Declarative filter rules.
//!
//! A [`Rule`] is data, not a closure: one attribute key plus a
//! [`ValueFilter`] that is either an allow-list or a deny-list. Rules are
//! validated when constructed and evaluated without side effects.
//!
//! Matching is byte-exact and case-sensitive. An event that does not carry
//! the rule's attribute matches neither an allow-list nor a deny-list.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::RuleError;

/// Allow-list or deny-list over attribute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueFilter {
    /// Match when the value is one of these.
    Allow(BTreeSet<String>),
    /// Match when the value is present but none of these.
    Deny(BTreeSet<String>),
}

impl ValueFilter {
    fn values(&self) -> &BTreeSet<String> {
        match self {
            Self::Allow(values) | Self::Deny(values) => values,
        }
    }

    /// Filter kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Allow(_) => "allow",
            Self::Deny(_) => "deny",
        }
    }
}

/// A predicate over a single event attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    attribute: String,
    filter: ValueFilter,
}

impl Rule {
    /// Build a rule, rejecting an empty value set.
    pub fn new(attribute: impl Into<String>, filter: ValueFilter) -> Result<Self, RuleError> {
        let attribute = attribute.into();
        if filter.values().is_empty() {
            return Err(RuleError::EmptyValues { attribute });
        }
        Ok(Self { attribute, filter })
    }

    /// Allow-list rule: matches when `attribute` is one of `values`.
    pub fn allow<I, S>(attribute: impl Into<String>, values: I) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            attribute,
            ValueFilter::Allow(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Deny-list rule: matches when `attribute` is present and not one of `values`.
    pub fn deny<I, S>(attribute: impl Into<String>, values: I) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            attribute,
            ValueFilter::Deny(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn filter(&self) -> &ValueFilter {
        &self.filter
    }

    /// Evaluate against an event's attribute map.
    pub fn matches(&self, attributes: &HashMap<String, String>) -> bool {
        self.matches_value(attributes.get(&self.attribute).map(String::as_str))
    }

    /// Evaluate against a single (possibly missing) attribute value.
    pub fn matches_value(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match &self.filter {
            ValueFilter::Allow(values) => values.contains(value),
            ValueFilter::Deny(values) => !values.contains(value),
        }
    }

    /// The complementary rule over the same attribute and values.
    pub fn complement(&self) -> Self {
        let filter = match &self.filter {
            ValueFilter::Allow(values) => ValueFilter::Deny(values.clone()),
            ValueFilter::Deny(values) => ValueFilter::Allow(values.clone()),
        };
        Self {
            attribute: self.attribute.clone(),
            filter,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<&str> = self.filter.values().iter().map(String::as_str).collect();
        write!(
            f,
            "{} {} [{}]",
            self.attribute,
            self.filter.kind(),
            values.join(", ")
        )
    }
}
