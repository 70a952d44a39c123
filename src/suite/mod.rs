//! Behavioral spec model and execution
//!
//! Specs are async closures registered under a container path. The runner
//! executes the specs this process owns, each with a fresh [`SpecContext`]
//! carrying the cluster client and a stack of deferred cleanups.

pub mod context;
pub mod hooks;
pub mod report;
pub mod runner;
pub mod spec;

pub use context::SpecContext;
pub use hooks::{NamespaceSetup, SuiteHooks};
pub use report::{SpecReport, SpecState, SuiteCounts, SuiteReport};
pub use runner::Runner;
pub use spec::{Spec, SpecFilter, Suite};

/// Name the functional test suite reports under
pub const SUITE_NAME: &str = "Tests Suite";

/// Every spec shipped with netcheck, in declaration order
pub fn functional_suite() -> Suite {
    let mut suite = Suite::new(SUITE_NAME);
    suite.extend(crate::network::services::specs());
    suite
}
