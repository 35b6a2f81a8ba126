//! Built-in template functions.
//!
//! Every function receives its arguments already split on whitespace, so
//! arguments never contain spaces.

mod date;
mod logic;
mod math;
mod path;
mod text;
mod version;

use reelforge_common::{Error, Result};

use crate::registry::FunctionRegistry;

pub use version::{format_version, parse_version};

/// Register the built-in functions on `registry`.
pub fn register_builtin_functions(registry: &FunctionRegistry) {
    text::register(registry);
    math::register(registry);
    path::register(registry);
    version::register(registry);
    date::register(registry);
    logic::register(registry);
}

/// Argument `index`, or an arity error naming `function`.
pub(crate) fn arg<'a>(function: &str, args: &[&'a str], index: usize) -> Result<&'a str> {
    args.get(index).copied().ok_or_else(|| {
        Error::template_function(
            function,
            format!("expected at least {} argument(s), got {}", index + 1, args.len()),
        )
    })
}

pub(crate) fn int_arg(function: &str, args: &[&str], index: usize) -> Result<i64> {
    let raw = arg(function, args, index)?;
    raw.parse()
        .map_err(|_| Error::template_function(function, format!("not an integer: {raw:?}")))
}
