use crate::bus::DestinationRef;
use crate::event::Event;

use super::Rule;

/// Binds a rule to a destination.
#[derive(Clone)]
pub struct Subscription {
    name: String,
    rule: Rule,
    destination: DestinationRef,
}

impl Subscription {
    pub fn new(name: impl Into<String>, rule: Rule, destination: DestinationRef) -> Self {
        Self {
            name: name.into(),
            rule,
            destination,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn destination(&self) -> &DestinationRef {
        &self.destination
    }

    pub fn accepts(&self, event: &Event) -> bool {
        self.rule.matches(event.attributes())
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("rule", &self.rule)
            .field("destination", &self.destination.name())
            .finish()
    }
}
