//! Process helpers shared by sluice binaries.

pub mod bootstrap;
