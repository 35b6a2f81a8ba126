//! Matching plus target resolution in a deterministic order.

use indexmap::IndexMap;
use reelforge_common::{Result, Value};
use reelforge_crawler::{Crawler, CrawlerRegistry};
use reelforge_template::Template;

use crate::matcher::CrawlerMatcher;

/// Filters crawlers with a matcher and resolves their target paths.
pub struct CrawlerQuery<'a> {
    template: &'a Template,
    matcher: &'a CrawlerMatcher,
}

impl<'a> CrawlerQuery<'a> {
    pub fn new(template: &'a Template, matcher: &'a CrawlerMatcher) -> Self {
        Self { template, matcher }
    }

    /// Matching crawlers paired with their resolved target.
    ///
    /// `vars` take priority over crawler variables during resolution. The
    /// result is sorted by `target + "|" + filePath`, independent of the
    /// input order.
    pub fn query(
        &self,
        crawlers: &[Crawler],
        vars: &IndexMap<String, Value>,
        registry: &CrawlerRegistry,
    ) -> Result<Vec<(Crawler, String)>> {
        let mut matched = Vec::new();
        for crawler in crawlers {
            if !self.matcher.matches(crawler, registry) {
                continue;
            }
            let target = self.template.value_from_crawler(crawler, vars)?;
            matched.push((format!("{target}|{}", crawler.file_path()), crawler.clone(), target));
        }
        matched.sort_by(|a, b| a.0.cmp(&b.0));

        tracing::debug!(
            "Query {:?} matched {} of {} crawler(s)",
            self.template.input(),
            matched.len(),
            crawlers.len()
        );
        Ok(matched
            .into_iter()
            .map(|(_, crawler, target)| (crawler, target))
            .collect())
    }
}
