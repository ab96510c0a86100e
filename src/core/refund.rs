//! Cancellation refund policy.
//!
//! The refund owed for a cancellation depends only on how many whole days remain
//! before departure and on whether the booking was paid. The same [`calculate`]
//! function backs the side-effect-free preview and the authoritative cancellation,
//! so the two can never disagree.
//!
//! Thresholds are configuration ([`crate::config::settings`]); nothing here knows
//! the business figures.

use crate::{
    entities::booking::{self, PaymentStatus},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// One step of the refund policy: cancelling at least `min_days` before
/// departure refunds `percentage` percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundTier {
    /// Minimum whole days before departure for this tier to apply
    pub min_days: i64,
    /// Percentage of the paid amount refunded (0-100)
    pub percentage: u8,
    /// Customer-facing wording for this tier
    #[serde(default)]
    pub description: Option<String>,
}

/// Validated, ordered set of refund tiers.
///
/// Tiers are kept sorted by `min_days` descending, and percentages never increase
/// as the threshold decreases, so the refund is monotonic in days-before-departure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundPolicy {
    tiers: Vec<RefundTier>,
}

impl RefundPolicy {
    /// Builds a policy, rejecting tier sets that would make refunds non-monotonic.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if there are no tiers, a percentage exceeds 100,
    /// a threshold is negative or repeated, or a closer threshold pays more than a
    /// farther one.
    pub fn new(mut tiers: Vec<RefundTier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(Error::Config {
                message: "Refund policy needs at least one tier".to_string(),
            });
        }

        for tier in &tiers {
            if tier.percentage > 100 {
                return Err(Error::Config {
                    message: format!(
                        "Refund tier for {} days has percentage {} above 100",
                        tier.min_days, tier.percentage
                    ),
                });
            }
            if tier.min_days < 0 {
                return Err(Error::Config {
                    message: format!("Refund tier threshold {} is negative", tier.min_days),
                });
            }
        }

        tiers.sort_by(|a, b| b.min_days.cmp(&a.min_days));

        for pair in tiers.windows(2) {
            let (farther, closer) = (&pair[0], &pair[1]);
            if farther.min_days == closer.min_days {
                return Err(Error::Config {
                    message: format!("Duplicate refund tier for {} days", closer.min_days),
                });
            }
            if closer.percentage > farther.percentage {
                return Err(Error::Config {
                    message: format!(
                        "Refund tier for {} days ({}%) pays more than the tier for {} days ({}%)",
                        closer.min_days, closer.percentage, farther.min_days, farther.percentage
                    ),
                });
            }
        }

        Ok(Self { tiers })
    }

    /// Tiers ordered from the farthest threshold to the closest.
    #[must_use]
    pub fn tiers(&self) -> &[RefundTier] {
        &self.tiers
    }

    /// The tier that applies when cancelling `days_before` days ahead, if any.
    #[must_use]
    pub fn tier_for(&self, days_before: i64) -> Option<&RefundTier> {
        self.tiers.iter().find(|tier| days_before >= tier.min_days)
    }

    fn describe(&self, tier: Option<&RefundTier>) -> String {
        match tier {
            Some(RefundTier {
                description: Some(text),
                ..
            }) => text.clone(),
            Some(tier) => format!(
                "Cancellation {} or more days before departure: {}% refund",
                tier.min_days, tier.percentage
            ),
            None => {
                let closest = self.tiers.last().map_or(0, |tier| tier.min_days);
                format!("Cancellation less than {closest} days before departure: no refund")
            }
        }
    }
}

/// Computed, never-stored refund projection for one booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundDecision {
    /// Whole days left before departure, clamped at 0
    pub days_before_tour: i64,
    /// Percentage selected by the policy
    pub refund_percentage: u8,
    /// Booking total the refund is based on
    pub original_amount: i64,
    /// Amount to refund, in whole currency units
    pub refund_amount: i64,
    /// Whether anything is actually owed back
    pub can_refund: bool,
    /// Customer-facing wording of the applied tier
    pub policy_description: String,
}

/// Whole days between `now` and the start of the departure date (UTC), floored and
/// clamped at 0.
#[must_use]
pub fn days_before_departure(departure: NaiveDate, now: DateTime<Utc>) -> i64 {
    let departure_start = departure.and_time(NaiveTime::MIN).and_utc();
    (departure_start - now).num_days().max(0)
}

/// `amount × percentage / 100`, rounded half up to a whole currency unit.
#[must_use]
pub fn apply_percentage(amount: i64, percentage: u8) -> i64 {
    let scaled = (i128::from(amount) * i128::from(percentage) + 50) / 100;
    i64::try_from(scaled).unwrap_or(amount)
}

/// Computes the refund owed if `booking` were cancelled at `now`.
///
/// Pure: safe to call for previews as often as needed.
#[must_use]
pub fn calculate(
    policy: &RefundPolicy,
    booking: &booking::Model,
    departure: NaiveDate,
    now: DateTime<Utc>,
) -> RefundDecision {
    let days_before_tour = days_before_departure(departure, now);
    let tier = policy.tier_for(days_before_tour);
    let refund_percentage = tier.map_or(0, |tier| tier.percentage);
    let paid = booking.payment_status == PaymentStatus::Paid;
    let can_refund = paid && refund_percentage > 0;

    RefundDecision {
        days_before_tour,
        refund_percentage,
        original_amount: booking.total_amount,
        refund_amount: if can_refund {
            apply_percentage(booking.total_amount, refund_percentage)
        } else {
            0
        },
        can_refund,
        policy_description: policy.describe(tier),
    }
}
