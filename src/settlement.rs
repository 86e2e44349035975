//! Worker payout for an accepted response.

use crate::config::MAX_BPS;
use crate::invoice::CampaignDuration;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// Payout breakdown for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Seconds of attention paid for.
    pub verified_seconds: u32,
    /// `verified_seconds * bid_per_second`.
    pub gross: Decimal,
    /// Platform fee, rounded down to the token's base unit.
    pub fee: Decimal,
    /// `gross - fee`, paid to the worker.
    pub net: Decimal,
}

/// Settle one response.
///
/// A worker who exited early is paid for the seconds actually watched; nobody
/// is paid for more than the campaign duration.
#[must_use]
pub fn settle(
    duration: CampaignDuration,
    bid_per_second: Decimal,
    actual_duration: u32,
    exited_early: bool,
    fee_bps: u16,
    token_decimals: u32,
) -> Settlement {
    let watched = if exited_early {
        actual_duration
    } else {
        duration.seconds()
    };
    let verified_seconds = watched.min(duration.seconds());

    let gross = Decimal::from(verified_seconds) * bid_per_second;
    let fee = (gross * Decimal::from(fee_bps.min(MAX_BPS)) / Decimal::from(MAX_BPS))
        .round_dp_with_strategy(token_decimals, RoundingStrategy::ToZero);

    Settlement {
        verified_seconds,
        gross,
        fee,
        net: gross - fee,
    }
}
