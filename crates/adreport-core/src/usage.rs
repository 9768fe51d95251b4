//! Usage counters reported by the ad server.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Impressions, clicks, and spend for one entity over one interval.
///
/// `spent` is in dollars as reported upstream; persisted rows carry pennies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    pub impressions: i64,
    pub clicks: i64,
    pub spent: Decimal,
}

impl Usage {
    #[must_use]
    pub fn new(impressions: i64, clicks: i64, spent: Decimal) -> Self {
        Self {
            impressions,
            clicks,
            spent,
        }
    }

    /// Spend converted to whole pennies, rounded half away from zero.
    #[must_use]
    pub fn spent_pennies(&self) -> i64 {
        (self.spent * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// Add another usage sample to this one.
    pub fn accumulate(&mut self, other: Usage) {
        self.impressions = self.impressions.saturating_add(other.impressions);
        self.clicks = self.clicks.saturating_add(other.clicks);
        self.spent += other.spent;
    }
}

/// Discard samples where clicks outrun impressions.
///
/// The ad server processes clicks faster than impressions, so a fresh report
/// can briefly show more clicks than impressions. Those samples are zeroed
/// rather than persisted. Anything else passes through unchanged.
#[must_use]
pub fn normalize_usage(impressions: i64, clicks: i64, spent: Decimal) -> Usage {
    if clicks > impressions {
        return Usage::default();
    }

    Usage::new(impressions, clicks, spent)
}
