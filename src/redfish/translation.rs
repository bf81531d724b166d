//! URL translation
//!
//! The aggregation plane exposes resources under one URI prefix and the
//! upstream services under another. Bodies and URIs crossing the plugin
//! boundary get every configured substring replaced: northbound for data
//! flowing into the plugin, southbound for requests leaving it.

use crate::config::UrlTranslation;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct UrlTranslator {
    north_bound: BTreeMap<String, String>,
    south_bound: BTreeMap<String, String>,
}

impl UrlTranslator {
    pub fn new(config: &UrlTranslation) -> Self {
        Self {
            north_bound: config.north_bound.clone(),
            south_bound: config.south_bound.clone(),
        }
    }

    /// Rewrite upstream URIs into the plugin's namespace
    pub fn to_northbound(&self, raw: &str) -> String {
        translate(&self.north_bound, raw)
    }

    /// Rewrite plugin URIs into the upstream namespace
    pub fn to_southbound(&self, raw: &str) -> String {
        translate(&self.south_bound, raw)
    }
}

fn translate(table: &BTreeMap<String, String>, raw: &str) -> String {
    table
        .iter()
        .filter(|(from, _)| !from.is_empty())
        .fold(raw.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
}
