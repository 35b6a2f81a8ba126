use std::path::Path;

use reelforge_common::{Error, PathHolder, Result};
use walkdir::WalkDir;

use super::arg;
use crate::registry::FunctionRegistry;

pub(super) fn register(registry: &FunctionRegistry) {
    registry.register("dirname", |args| {
        Ok(PathHolder::new(arg("dirname", args, 0)?).dir_name())
    });
    registry.register("parentdirname", |args| {
        let dir = PathHolder::new(arg("parentdirname", args, 0)?).dir_name();
        Ok(PathHolder::new(dir).dir_name())
    });
    registry.register("basename", |args| {
        Ok(PathHolder::new(arg("basename", args, 0)?).base_name())
    });
    registry.register("rfindpath", rfindpath);
    registry.register("findpath", findpath);
}

/// `rfindpath <name> <start>`: the closest `<dir>/<name>` walking up from
/// `start` (inclusive) to the root.
fn rfindpath(args: &[&str]) -> Result<String> {
    let name = arg("rfindpath", args, 0)?;
    let start = arg("rfindpath", args, 1)?;

    let mut current = Some(Path::new(start));
    while let Some(dir) = current {
        let candidate = dir.join(name);
        if candidate.exists() {
            return Ok(candidate.to_string_lossy().to_string());
        }
        current = dir.parent();
    }
    Err(Error::template_function(
        "rfindpath",
        format!("{name:?} not found above {start}"),
    ))
}

/// `findpath <name> <start>`: the first entry called `name` below `start`,
/// searched in sorted depth-first order.
fn findpath(args: &[&str]) -> Result<String> {
    let name = arg("findpath", args, 0)?;
    let start = arg("findpath", args, 1)?;

    WalkDir::new(start)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_name().to_string_lossy() == name)
        .map(|entry| entry.path().to_string_lossy().to_string())
        .ok_or_else(|| {
            Error::template_function("findpath", format!("{name:?} not found below {start}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn name_functions() {
        let registry = FunctionRegistry::with_builtins();
        let path = "/jobs/show/sh010/plate.exr";
        assert_eq!(registry.call("dirname", &[path]).unwrap(), "/jobs/show/sh010");
        assert_eq!(registry.call("parentdirname", &[path]).unwrap(), "/jobs/show");
        assert_eq!(registry.call("basename", &[path]).unwrap(), "plate.exr");
    }

    #[test]
    fn find_up_and_down() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("show/sh010/comp")).unwrap();
        fs::write(root.join("show/.config"), b"").unwrap();
        fs::write(root.join("show/sh010/comp/notes.txt"), b"").unwrap();

        let start = root.join("show/sh010/comp").to_string_lossy().to_string();
        let found = rfindpath(&[".config", start.as_str()]).unwrap();
        assert_eq!(found, root.join("show/.config").to_string_lossy());

        let root_str = root.to_string_lossy().to_string();
        let found = findpath(&["notes.txt", root_str.as_str()]).unwrap();
        assert_eq!(found, root.join("show/sh010/comp/notes.txt").to_string_lossy());

        assert!(findpath(&["missing.txt", root_str.as_str()]).is_err());
    }
}
