//! Image, plate and video crawler types.

use reelforge_common::{PathHolder, Result, Value};

use crate::crawler::Crawler;
use crate::registry::{CrawlerSource, CrawlerType};
use crate::types::fs::{require_path, ExtensionType};

/// Extensions recognized as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["exr", "dpx", "jpg", "jpeg", "png", "tif", "tiff", "tx", "hdr"];

/// Extensions recognized as video.
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "mkv"];

/// An exr whose name contains `_plate`.
///
/// Sets the context variable `shot` to the part of the name before
/// `_plate`, and `seq` to the parent directory when it looks like a
/// sequence folder (upper-case alphanumerics, e.g. `SEQ0010`).
pub struct ExrPlateType;

const EXR: ExtensionType = ExtensionType::new(&["exr"]);

impl CrawlerType for ExrPlateType {
    fn test(&self, source: &CrawlerSource, _parent: Option<&Crawler>) -> Result<bool> {
        Ok(source
            .as_path()
            .is_some_and(|p| EXR.accepts(p) && p.base_name().contains("_plate")))
    }

    fn create(&self, source: &CrawlerSource, parent: Option<&Crawler>) -> Result<Crawler> {
        let path = require_path(source)?;
        let mut crawler = Crawler::from_path(path.clone(), parent);

        let name = crawler.name();
        if let Some((shot, _)) = name.split_once("_plate") {
            crawler.set_var("shot", Value::from(shot), true);
        }

        let folder = PathHolder::new(path.dir_name()).base_name();
        let is_seq_folder = !folder.is_empty()
            && folder
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if is_seq_folder {
            crawler.set_var("seq", Value::from(folder), true);
        }
        Ok(crawler)
    }
}
