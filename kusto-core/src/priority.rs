//! Priority tiers shared by the scheduler, executor facade, and monitoring surface.

use serde::{Deserialize, Serialize};

/// Exactly four priority tiers, `Critical > High > Normal > Low`.
///
/// Represented as a plain enum rather than a generic priority integer so that
/// per-priority caps and counters can be fixed-size arrays indexed by
/// [`Priority::rank`] instead of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

/// The four tiers in rank order, highest priority first.
pub const ALL_PRIORITIES: [Priority; 4] = [
    Priority::Critical,
    Priority::High,
    Priority::Normal,
    Priority::Low,
];

impl Priority {
    /// Index into a 4-element array ordered `[critical, high, normal, low]`.
    pub fn rank(self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }

    /// The next tier down, used for starvation-avoidance promotion.
    ///
    /// `Critical` has no tier above it and promotes to itself.
    pub fn promote(self) -> Priority {
        match self {
            Priority::Critical => Priority::Critical,
            Priority::High => Priority::Critical,
            Priority::Normal => Priority::High,
            Priority::Low => Priority::Normal,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// A value tracked once per priority tier, e.g. active/queued counts or caps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub critical: usize,
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

impl PriorityCounts {
    pub fn get(&self, p: Priority) -> usize {
        match p {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
        }
    }

    pub fn get_mut(&mut self, p: Priority) -> &mut usize {
        match p {
            Priority::Critical => &mut self.critical,
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
            Priority::Low => &mut self.low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_orders_critical_first() {
        assert!(Priority::Critical.rank() < Priority::High.rank());
        assert!(Priority::High.rank() < Priority::Normal.rank());
        assert!(Priority::Normal.rank() < Priority::Low.rank());
    }

    #[test]
    fn low_promotes_toward_critical() {
        assert_eq!(Priority::Low.promote(), Priority::Normal);
        assert_eq!(Priority::Normal.promote(), Priority::High);
        assert_eq!(Priority::High.promote(), Priority::Critical);
        assert_eq!(Priority::Critical.promote(), Priority::Critical);
    }

    #[test]
    fn priority_counts_get_and_get_mut_agree() {
        let mut counts = PriorityCounts::default();
        *counts.get_mut(Priority::High) += 3;
        assert_eq!(counts.get(Priority::High), 3);
    }
}
