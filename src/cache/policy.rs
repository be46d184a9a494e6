//! Per-category expiration policy

use chrono::Duration;
use std::collections::HashMap;

use super::key::DEFAULT_CATEGORY;

/// Maps cache categories to how long their entries stay fresh
///
/// Categories without an explicit entry use the default duration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpirationPolicy {
    ttls: HashMap<String, Duration>,
    default_ttl: Duration,
}

impl ExpirationPolicy {
    /// Creates a policy with only a default TTL
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            ttls: HashMap::new(),
            default_ttl,
        }
    }

    /// Sets the TTL for a category. Setting `"default"` replaces the default TTL.
    pub fn with_ttl(mut self, category: impl Into<String>, ttl: Duration) -> Self {
        self.set_ttl(category, ttl);
        self
    }

    /// Sets the TTL for a category in place
    pub fn set_ttl(&mut self, category: impl Into<String>, ttl: Duration) {
        let category = category.into();
        if category == DEFAULT_CATEGORY {
            self.default_ttl = ttl;
        } else {
            self.ttls.insert(category, ttl);
        }
    }

    /// Returns the TTL for a category
    pub fn ttl_for(&self, category: &str) -> Duration {
        self.ttls.get(category).copied().unwrap_or(self.default_ttl)
    }

    /// Returns the TTL used for categories without an explicit entry
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self::new(hours(6.0))
            .with_ttl("sessions", hours(24.0))
            .with_ttl("meetings", hours(24.0))
            .with_ttl("drivers", hours(12.0))
            .with_ttl("laps", hours(1.0))
            .with_ttl("stints", hours(1.0))
            .with_ttl("position", hours(0.5))
            .with_ttl("pit", hours(1.0))
            .with_ttl("results", hours(2.0))
    }
}

/// Converts fractional hours to a duration, rounded to the millisecond
///
/// Callers validate that `hours` is finite and non-negative.
pub fn hours(hours: f64) -> Duration {
    Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}
