//! # reelforge-crawler
//!
//! Typed, self-describing filesystem nodes.
//!
//! - [`Crawler`] -- a node with insertion-ordered variables, context-var
//!   flags, tags and lazily computed children.
//! - [`CrawlerRegistry`] -- ordered type registry; [`CrawlerRegistry::create`]
//!   tests types from the most recently registered one down and builds the
//!   first match.
//! - [`types`] -- built-in types (`file`, `directory`, `image`, `exr`,
//!   `exrPlate`, `video`, `json`, `hashmap`, ...).

pub mod crawler;
pub mod registry;
pub mod types;

pub use crawler::{Crawler, CrawlerEnvelope, TypeFilter, TYPE_VAR};
pub use registry::{CrawlerRegistry, CrawlerSource, CrawlerType};
pub use types::register_builtin_types;
