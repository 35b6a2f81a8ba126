//! Reelforge-Common: shared types and utilities.
//!
//! - **Error handling**: the unified [`Error`] taxonomy and [`Result`] alias
//! - **Values**: [`Value`], the heterogeneous type stored in variables and tags
//! - **Paths**: [`PathHolder`] plus file-name helpers in [`paths`]
//! - **Metadata**: dotted-path helpers for nested JSON in [`metadata`]

pub mod error;
pub mod metadata;
pub mod path_holder;
pub mod paths;
pub mod value;

pub use error::{Error, Result};
pub use path_holder::PathHolder;
pub use value::Value;
