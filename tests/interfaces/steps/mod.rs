//! Cucumber step definitions for interface tests.

pub mod rescue;
pub mod routing;
