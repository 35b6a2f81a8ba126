//! Crawler matching by type family and variable patterns.

use glob::Pattern;
use indexmap::IndexMap;
use reelforge_common::Value;
use reelforge_crawler::{Crawler, CrawlerRegistry};
use serde::{Deserialize, Serialize};

/// Decides whether a crawler is handled by a task holder.
///
/// All conditions must pass:
/// - the crawler's type belongs to the family of one of `match_types`
///   (an empty list accepts any type);
/// - for every entry of `match_vars` the crawler has the variable and its
///   text matches at least one of the shell-style patterns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlerMatcher {
    #[serde(rename = "matchTypes", default)]
    match_types: Vec<String>,
    #[serde(rename = "matchVars", default)]
    match_vars: IndexMap<String, Vec<String>>,
}

impl CrawlerMatcher {
    /// Create a matcher.
    pub fn new(match_types: Vec<String>, match_vars: IndexMap<String, Vec<String>>) -> Self {
        Self {
            match_types,
            match_vars,
        }
    }

    /// Build the variable conditions from config values: a list gives
    /// several alternatives, anything else a single pattern.
    pub fn from_values(match_types: Vec<String>, match_vars: &IndexMap<String, Value>) -> Self {
        let match_vars = match_vars
            .iter()
            .map(|(name, value)| {
                let patterns = match value {
                    Value::List(items) => items.iter().map(Value::to_string).collect(),
                    other => vec![other.to_string()],
                };
                (name.clone(), patterns)
            })
            .collect();
        Self::new(match_types, match_vars)
    }

    /// Accepted type families.
    pub fn match_types(&self) -> &[String] {
        &self.match_types
    }

    /// Variable conditions.
    pub fn match_vars(&self) -> &IndexMap<String, Vec<String>> {
        &self.match_vars
    }

    /// Whether `crawler` passes every condition.
    pub fn matches(&self, crawler: &Crawler, registry: &CrawlerRegistry) -> bool {
        self.matches_type(crawler, registry) && self.matches_vars(crawler)
    }

    fn matches_type(&self, crawler: &Crawler, registry: &CrawlerRegistry) -> bool {
        if self.match_types.is_empty() {
            return true;
        }
        let type_name = crawler.type_name();
        self.match_types
            .iter()
            .any(|family| registry.registered_sub_types(family).contains(&type_name))
    }

    fn matches_vars(&self, crawler: &Crawler) -> bool {
        self.match_vars.iter().all(|(name, patterns)| {
            let Ok(value) = crawler.var(name) else {
                return false;
            };
            let text = value.to_string();
            patterns.iter().any(|pattern| fnmatch(pattern, &text))
        })
    }
}

/// Shell-style match; an invalid pattern only matches itself.
fn fnmatch(pattern: &str, text: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(compiled) => compiled.matches(text),
        Err(_) => pattern == text,
    }
}
