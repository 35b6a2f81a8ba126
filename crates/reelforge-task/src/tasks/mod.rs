//! Built-in leaf tasks.
//!
//! | Name | Work |
//! |------|------|
//! | `copy` | copy each source to its target |
//! | `link` | hardlink each source to its target |
//! | `remove` | delete each source |
//! | `checksum` | compare SHA-256 of source and target |
//! | `exec` | run an external command per crawler |
//! | `dummy` | nothing; reports the targets |

mod checksum;
mod exec;
mod fs;

use std::sync::Arc;

pub use checksum::{file_digest, ChecksumTask};
pub use exec::ExecTask;
pub use fs::{CopyTask, LinkTask, RemoveTask};

use crate::registry::TaskRegistry;
use crate::task::TaskKind;

/// Does no work; outputs one crawler per distinct target.
pub struct DummyTask;

impl TaskKind for DummyTask {}

/// Register the built-in tasks on `registry`.
pub fn register_builtin_tasks(registry: &TaskRegistry) {
    registry.register("copy", Arc::new(CopyTask));
    registry.register("link", Arc::new(LinkTask));
    registry.register("remove", Arc::new(RemoveTask));
    registry.register("checksum", Arc::new(ChecksumTask));
    registry.register("exec", Arc::new(ExecTask));
    registry.register("dummy", Arc::new(DummyTask));
}
