//! Reelforge - media pipeline runner
//!
//! This library crate exposes the application layer (configuration,
//! pipeline loading, compiled-in plugins) for the binary and integration
//! tests. The engine lives in the `reelforge-*` member crates.

pub mod config;
pub mod loader;
pub mod plugins;

pub use reelforge_common::{Error, Result};
pub use reelforge_crawler::{Crawler, CrawlerRegistry};
pub use reelforge_dispatch::{Dispatcher, DispatcherRegistry};
pub use reelforge_task::{Context, Task, TaskHolder};
pub use reelforge_template::Template;
