//! Attribute-based routing.
//!
//! A [`Router`] owns a fixed list of [`Subscription`]s, each binding a
//! declarative [`Rule`] to a destination. Routing an event evaluates every
//! rule independently and delivers to every destination whose rule matches.
//! Rules built as an allow-list and its complementary deny-list partition the
//! attribute domain, so each event carrying the attribute reaches exactly one
//! of the two destinations.

mod router;
mod rule;
mod subscription;

pub use router::{DeliveryFailure, RouteReport, Router};
pub use rule::{Rule, ValueFilter};
pub use subscription::Subscription;

/// Errors constructing rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("Rule on attribute '{attribute}' has no values")]
    EmptyValues { attribute: String },
}
