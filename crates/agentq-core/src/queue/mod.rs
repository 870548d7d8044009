//! Queue mechanics: lease protocol, retry policy, dependency graph.

pub mod dependency;
pub mod lease;
pub mod retry;

pub use dependency::DependencyGraph;
pub use lease::LeaseManager;
pub use retry::{RetryDecision, RetryPolicy};
