//! Synthetic crawlers built from in-memory data.

use reelforge_common::{PathHolder, Result, Value};

use crate::crawler::{Crawler, TYPE_VAR};
use crate::registry::{CrawlerSource, CrawlerType};

/// A crawler over a JSON object.
///
/// Every top-level key becomes a variable. `filePath` gives the crawler its
/// path and defaults to `/` when absent.
pub struct HashmapType;

impl CrawlerType for HashmapType {
    fn test(&self, source: &CrawlerSource, _parent: Option<&Crawler>) -> Result<bool> {
        Ok(matches!(source, CrawlerSource::Data(serde_json::Value::Object(_))))
    }

    fn create(&self, source: &CrawlerSource, parent: Option<&Crawler>) -> Result<Crawler> {
        let map = match source {
            CrawlerSource::Data(serde_json::Value::Object(map)) => map.clone(),
            _ => serde_json::Map::new(),
        };

        let file_path = map
            .get("filePath")
            .and_then(|v| v.as_str())
            .unwrap_or("/")
            .to_string();

        let mut crawler = Crawler::empty(PathHolder::new(file_path.clone()), parent);
        crawler.set_var("filePath", Value::from(file_path), false);
        for (key, value) in &map {
            if key == TYPE_VAR || key == "filePath" {
                continue;
            }
            crawler.set_var(key, Value::from_json(value), false);
        }
        Ok(crawler)
    }
}
