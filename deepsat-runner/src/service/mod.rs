//! Service layer
//!
//! Services wrap the external collaborators of a launch: the runtime
//! environment and usage reporting. Schedulers live in `crate::scheduler`.
//!
//! All services are trait-based to enable testing and dependency injection.

mod environment;
mod report;

// Re-export traits
pub use environment::EnvironmentProvider;
pub use report::UsageReporter;

// Re-export implementations
pub use environment::{InheritedEnvironment, ModuleEnvironment, ResolvedEnvironment};
pub use report::{NoopReporter, SeffReporter, SummaryReporter};
