use std::fs;
use std::path::Path;

use reelforge_common::Result;
use reelforge_crawler::Crawler;

use crate::context::Context;
use crate::task::{Task, TaskKind};

fn ensure_parent(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Copies every source file to its target, creating parent directories.
pub struct CopyTask;

impl TaskKind for CopyTask {
    fn perform(&self, task: &Task, ctx: &Context) -> Result<Vec<Crawler>> {
        for (crawler, target) in task.crawlers() {
            let target = Path::new(target);
            ensure_parent(target)?;
            tracing::debug!("copy {} -> {}", crawler.file_path(), target.display());
            fs::copy(crawler.file_path(), target)?;
        }
        task.default_output(ctx)
    }
}

/// Hardlinks every source file to its target, replacing an existing target.
///
/// Requires source and target on the same filesystem with hardlink support
/// (POSIX semantics); there is no copy fallback.
pub struct LinkTask;

impl TaskKind for LinkTask {
    fn perform(&self, task: &Task, ctx: &Context) -> Result<Vec<Crawler>> {
        for (crawler, target) in task.crawlers() {
            let target = Path::new(target);
            ensure_parent(target)?;
            if target.exists() {
                fs::remove_file(target)?;
            }
            tracing::debug!("link {} -> {}", crawler.file_path(), target.display());
            fs::hard_link(crawler.file_path(), target)?;
        }
        task.default_output(ctx)
    }
}

/// Deletes every source path (directories recursively).
pub struct RemoveTask;

impl TaskKind for RemoveTask {
    fn perform(&self, task: &Task, ctx: &Context) -> Result<Vec<Crawler>> {
        for (crawler, _) in task.crawlers() {
            let path = crawler.path();
            if path.is_dir() {
                fs::remove_dir_all(path.as_path())?;
            } else if path.exists() {
                fs::remove_file(path.as_path())?;
            }
            tracing::debug!("removed {path}");
        }
        task.default_output(ctx)
    }
}

#[cfg(test)]
mod tests {
    use crate::context::Context;
    use reelforge_common::PathHolder;
    use std::fs;

    #[test]
    fn copy_link_remove() {
        let ctx = Context::with_builtins().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in/a.txt");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"hello").unwrap();
        let crawler = ctx
            .crawlers
            .create(PathHolder::from(source.as_path()), None)
            .unwrap();

        let copied = dir.path().join("out/deep/a.txt");
        let mut copy = ctx.tasks.create("copy").unwrap();
        copy.add(crawler.clone(), copied.to_string_lossy());
        let outputs = copy.output(&ctx).unwrap();
        assert_eq!(fs::read(&copied).unwrap(), b"hello");
        assert_eq!(outputs[0].file_path(), copied.to_string_lossy());

        let linked = dir.path().join("out/link.txt");
        fs::write(&linked, b"stale").unwrap();
        let mut link = ctx.tasks.create("link").unwrap();
        link.add(crawler.clone(), linked.to_string_lossy());
        link.output(&ctx).unwrap();
        assert_eq!(fs::read(&linked).unwrap(), b"hello");

        let mut remove = ctx.tasks.create("remove").unwrap();
        remove.add(crawler, source.to_string_lossy());
        remove.output(&ctx).unwrap();
        assert!(!source.exists());
    }
}
