//! # reelforge-template
//!
//! The path template language used for task targets and filters.
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `{name}` | variable value |
//! | `(fn arg ...)` | function call, arguments split on whitespace, nested calls resolved first |
//! | `/!` | emits `/` and requires the path up to the next `/` to exist |
//! | `<parent>` | output resolved so far, without a trailing `/` |
//!
//! Variable values are inserted as text and never re-parsed, so a value
//! containing `(` or `/!` is taken literally.

pub mod ast;
pub mod functions;
pub mod lexer;
pub mod registry;
pub mod template;

pub use functions::{format_version, parse_version};
pub use registry::{FunctionRegistry, TemplateFn};
pub use template::{is_truthy, Template};
