//! State-name canonicalization shared by both sources.
use crate::config::AliasConfig;

/// Trim and collapse internal whitespace runs to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Maps free-text state labels onto canonical names using the configured
/// alias tables. Unmapped names pass through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct NameNormalizer<'a> {
    aliases: &'a AliasConfig,
}

impl<'a> NameNormalizer<'a> {
    pub fn new(aliases: &'a AliasConfig) -> Self {
        Self { aliases }
    }

    /// Canonical name via the base alias table. Idempotent as long as every
    /// alias key and target is whitespace-collapsed and no target is itself an
    /// alias key; config validation enforces both.
    pub fn canonical(&self, raw: &str) -> String {
        let collapsed = collapse_whitespace(raw);
        match self.aliases.base.get(&collapsed) {
            Some(mapped) => mapped.clone(),
            None => collapsed,
        }
    }

    /// Aggregation target for the yearly source: the canonical name, then
    /// folded into its parent state when the aggregation table says so.
    pub fn aggregated(&self, raw: &str) -> String {
        let canonical = self.canonical(raw);
        match self.aliases.aggregation.get(&canonical) {
            Some(parent) => parent.clone(),
            None => canonical,
        }
    }
}
