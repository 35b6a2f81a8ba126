//! # reelforge-task
//!
//! Tasks and the task holder execution tree.
//!
//! - [`Task`] -- ordered `(crawler, target)` pairs, options and dotted
//!   metadata; [`TaskKind`] implementations do the actual work.
//! - [`TaskWrapper`] -- where a task runs (in process or in a subprocess).
//! - [`CrawlerMatcher`] / [`CrawlerQuery`] -- which crawlers a holder takes
//!   and where they go.
//! - [`TaskHolder`] -- matches, runs, then feeds the output to nested
//!   holders.
//! - [`Context`] -- the registries everything above resolves names in.

pub mod context;
pub mod holder;
pub mod matcher;
pub mod query;
pub mod registry;
pub mod task;
pub mod tasks;
pub mod wrapper;

pub use context::{Context, PluginCatalog, PluginFn};
pub use holder::{TaskHolder, TaskHolderEnvelope};
pub use matcher::CrawlerMatcher;
pub use query::CrawlerQuery;
pub use registry::TaskRegistry;
pub use task::{EmptyFilterResult, Task, TaskEnvelope, TaskKind};
pub use wrapper::{TaskWrapper, WrapperRegistry};
