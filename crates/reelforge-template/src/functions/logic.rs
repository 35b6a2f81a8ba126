use reelforge_common::{Error, Result};

use super::arg;
use crate::registry::FunctionRegistry;
use crate::template::is_truthy;

pub(super) fn register(registry: &FunctionRegistry) {
    registry.register("env", env);
    registry.register("eq", |args| {
        Ok((arg("eq", args, 0)? == arg("eq", args, 1)?).to_string())
    });
    registry.register("ne", |args| {
        Ok((arg("ne", args, 0)? != arg("ne", args, 1)?).to_string())
    });
    registry.register("contains", |args| {
        Ok(arg("contains", args, 0)?
            .contains(arg("contains", args, 1)?)
            .to_string())
    });
    registry.register("not", |args| {
        Ok((!is_truthy(args.first().copied().unwrap_or_default())).to_string())
    });
}

/// `env <NAME> [default]`
fn env(args: &[&str]) -> Result<String> {
    let name = arg("env", args, 0)?;
    match std::env::var(name) {
        Ok(value) => Ok(value),
        Err(_) => args.get(1).map(|d| d.to_string()).ok_or_else(|| {
            Error::template_function("env", format!("environment variable {name} is not set"))
        }),
    }
}
