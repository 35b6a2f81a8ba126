use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use reelforge_common::{Error, Result};

use super::arg;
use crate::registry::FunctionRegistry;

static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v(\d+)$").expect("valid version regex"));

pub(super) fn register(registry: &FunctionRegistry) {
    registry.register("newver", |args| {
        let latest = latest_version(Path::new(arg("newver", args, 0)?));
        Ok(format_version(latest + 1))
    });
    registry.register("latestver", |args| {
        Ok(format_version(latest_version(Path::new(arg("latestver", args, 0)?))))
    });
    registry.register("labelver", |args| {
        let raw = arg("labelver", args, 0)?;
        parse_version(raw)
            .or_else(|| raw.parse().ok())
            .map(format_version)
            .ok_or_else(|| Error::template_function("labelver", format!("not a version: {raw:?}")))
    });
}

/// Format a version number as `v###`.
pub fn format_version(version: u32) -> String {
    format!("v{version:03}")
}

/// Parse a `v<digits>` label.
pub fn parse_version(label: &str) -> Option<u32> {
    VERSION
        .captures(label)
        .and_then(|caps| caps[1].parse().ok())
}

/// Highest `v<digits>` entry of `dir`, 0 when there is none.
fn latest_version(dir: &Path) -> u32 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| parse_version(&entry.file_name().to_string_lossy()))
        .max()
        .unwrap_or(0)
}
