//! Built-in crawler types.
//!
//! Registration order doubles as priority order: the registry tests types
//! from the last registered to the first, so the more specific types are
//! registered after the generic ones.

pub mod data;
pub mod fs;
pub mod image;

use std::sync::Arc;

use reelforge_common::Result;

use crate::registry::CrawlerRegistry;
use data::HashmapType;
use fs::{DirectoryType, ExtensionType, FileType, FsType, JsonType};
use image::{ExrPlateType, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

/// Register the built-in types on `registry`.
///
/// Family tree:
///
/// ```text
/// fs ─┬─ file ─┬─ image ─┬─ exr ── exrPlate
///     │        │         ├─ dpx, jpg, png, tif
///     │        ├─ video
///     │        ├─ json
///     │        └─ txt
///     └─ directory
/// hashmap
/// ```
pub fn register_builtin_types(registry: &CrawlerRegistry) -> Result<()> {
    registry.register("fs", None, Arc::new(FsType))?;
    registry.register("file", Some("fs"), Arc::new(FileType))?;
    registry.register("directory", Some("fs"), Arc::new(DirectoryType))?;
    registry.register("image", Some("file"), Arc::new(ExtensionType::new(IMAGE_EXTENSIONS)))?;
    registry.register("exr", Some("image"), Arc::new(ExtensionType::new(&["exr"])))?;
    registry.register("dpx", Some("image"), Arc::new(ExtensionType::new(&["dpx"])))?;
    registry.register("jpg", Some("image"), Arc::new(ExtensionType::new(&["jpg", "jpeg"])))?;
    registry.register("png", Some("image"), Arc::new(ExtensionType::new(&["png"])))?;
    registry.register("tif", Some("image"), Arc::new(ExtensionType::new(&["tif", "tiff"])))?;
    registry.register("video", Some("file"), Arc::new(ExtensionType::new(VIDEO_EXTENSIONS)))?;
    registry.register("json", Some("file"), Arc::new(JsonType))?;
    registry.register("txt", Some("file"), Arc::new(ExtensionType::new(&["txt"])))?;
    registry.register("exrPlate", Some("exr"), Arc::new(ExrPlateType))?;
    registry.register("hashmap", None, Arc::new(HashmapType))?;
    Ok(())
}
