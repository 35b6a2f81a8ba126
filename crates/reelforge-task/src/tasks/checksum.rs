use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use reelforge_common::{Error, Result};
use reelforge_crawler::Crawler;
use sha2::{Digest, Sha256};

use crate::context::Context;
use crate::task::{Task, TaskKind};

/// Verifies that every target has the same SHA-256 digest as its source.
pub struct ChecksumTask;

impl TaskKind for ChecksumTask {
    fn perform(&self, task: &Task, ctx: &Context) -> Result<Vec<Crawler>> {
        for (crawler, target) in task.crawlers() {
            let source = crawler.path().as_path();
            let target = Path::new(target);
            if file_digest(source)? != file_digest(target)? {
                return Err(Error::ChecksumMatch {
                    source_path: source.to_path_buf(),
                    target: PathBuf::from(target),
                });
            }
            tracing::debug!("checksum ok: {}", target.display());
        }
        task.default_output(ctx)
    }
}

/// Hex SHA-256 digest of a file.
pub fn file_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
