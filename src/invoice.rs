//! Invoice negotiation.
//!
//! Turns a campaign request into the payment requirement a client must settle
//! on chain before the campaign can activate. Pure: nothing is persisted.

use crate::config::{PaymentConfig, MAX_BPS};
use crate::{Error, Result};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// Smallest accepted bid, per second.
pub const MIN_BID_PER_SECOND: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

/// Allowed campaign durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CampaignDuration {
    /// 10 seconds.
    Ten,
    /// 30 seconds.
    Thirty,
    /// 60 seconds.
    Sixty,
}

impl CampaignDuration {
    /// Length in seconds.
    #[must_use]
    pub const fn seconds(self) -> u32 {
        match self {
            Self::Ten => 10,
            Self::Thirty => 30,
            Self::Sixty => 60,
        }
    }
}

impl TryFrom<u32> for CampaignDuration {
    type Error = Error;

    fn try_from(seconds: u32) -> Result<Self> {
        match seconds {
            10 => Ok(Self::Ten),
            30 => Ok(Self::Thirty),
            60 => Ok(Self::Sixty),
            other => Err(Error::InvalidRequest(format!(
                "duration must be 10, 30 or 60 seconds, got {other}"
            ))),
        }
    }
}

impl From<CampaignDuration> for u32 {
    fn from(d: CampaignDuration) -> Self {
        d.seconds()
    }
}

/// Revenue share carried to the fee splitter when a referrer is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    /// Referrer wallet.
    pub referrer: String,
    /// Referrer share in basis points.
    pub referrer_bps: u16,
}

/// Amounts after splitting a payment with a referrer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralSplit {
    /// Paid to the referrer.
    pub referrer_amount: Decimal,
    /// Kept by the treasury.
    pub treasury_amount: Decimal,
}

impl Referral {
    /// Build a referral, validating the address and share.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty referrer or a share above 100%.
    pub fn new(referrer: &str, referrer_bps: u16) -> Result<Self> {
        let referrer = referrer.trim();
        if referrer.is_empty() {
            return Err(Error::InvalidRequest("referrer must not be empty".to_string()));
        }
        if referrer_bps > MAX_BPS {
            return Err(Error::InvalidRequest(format!(
                "referrer_bps {referrer_bps} exceeds {MAX_BPS}"
            )));
        }
        Ok(Self {
            referrer: referrer.to_string(),
            referrer_bps,
        })
    }

    /// Split `amount` the way the fee splitter does: the referrer share is
    /// rounded down to the token's base unit and the treasury keeps the rest.
    #[must_use]
    pub fn split(&self, amount: Decimal, token_decimals: u32) -> ReferralSplit {
        let share = amount * Decimal::from(self.referrer_bps) / Decimal::from(MAX_BPS);
        let referrer_amount = share.round_dp_with_strategy(token_decimals, RoundingStrategy::ToZero);
        ReferralSplit {
            referrer_amount,
            treasury_amount: amount - referrer_amount,
        }
    }
}

/// Optional data for the fee-splitter instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionData {
    /// Referrer wallet.
    pub referrer: String,
    /// Referrer share in basis points.
    pub referrer_bps: u16,
}

/// What a client must pay before a campaign activates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequirement {
    /// Chain name.
    pub chain: String,
    /// Token symbol.
    pub token: String,
    /// Token mint.
    pub token_mint: String,
    /// Token decimals.
    pub token_decimals: u32,
    /// Exact amount to transfer.
    pub amount: Decimal,
    /// Treasury receiving the transfer.
    pub recipient: String,
    /// Present when a referrer takes a share.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_data: Option<InstructionData>,
}

/// `duration * bid_per_second`, exact in fixed-point.
#[must_use]
pub fn total_escrow(duration: CampaignDuration, bid_per_second: Decimal) -> Decimal {
    Decimal::from(duration.seconds()) * bid_per_second
}

/// Validate a bid.
///
/// # Errors
///
/// Returns `InvalidRequest` when the bid is below [`MIN_BID_PER_SECOND`].
pub fn validate_bid(bid_per_second: Decimal) -> Result<()> {
    if bid_per_second < MIN_BID_PER_SECOND {
        return Err(Error::InvalidRequest(format!(
            "bid_per_second must be >= {MIN_BID_PER_SECOND}, got {bid_per_second}"
        )));
    }
    Ok(())
}

/// Produces payment requirements from the configured treasury and token.
#[derive(Debug, Clone)]
pub struct InvoiceNegotiator {
    chain: String,
    token: String,
    token_mint: String,
    token_decimals: u32,
    recipient: String,
    referrer_bps: u16,
}

impl InvoiceNegotiator {
    /// Create a negotiator for the given payment settings.
    #[must_use]
    pub fn new(payment: &PaymentConfig, referrer_bps: u16) -> Self {
        Self {
            chain: payment.chain.clone(),
            token: payment.token.clone(),
            token_mint: payment.token_mint.clone(),
            token_decimals: payment.token_decimals,
            recipient: payment.recipient.clone(),
            referrer_bps,
        }
    }

    /// Referral for `referrer` at the configured share.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty referrer.
    pub fn referral(&self, referrer: &str) -> Result<Referral> {
        Referral::new(referrer, self.referrer_bps)
    }

    /// Token decimals used for amounts.
    #[must_use]
    pub fn token_decimals(&self) -> u32 {
        self.token_decimals
    }

    /// Treasury the invoice is payable to.
    #[must_use]
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Build the payment requirement for a campaign request.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the duration is not 10, 30 or 60 seconds,
    /// the bid is below the minimum, or the referrer is empty.
    pub fn create_invoice(
        &self,
        duration: u32,
        bid_per_second: Decimal,
        referrer: Option<&str>,
    ) -> Result<PaymentRequirement> {
        let duration = CampaignDuration::try_from(duration)?;
        validate_bid(bid_per_second)?;

        let instruction_data = referrer
            .map(|r| self.referral(r))
            .transpose()?
            .map(|referral| InstructionData {
                referrer: referral.referrer,
                referrer_bps: referral.referrer_bps,
            });

        Ok(PaymentRequirement {
            chain: self.chain.clone(),
            token: self.token.clone(),
            token_mint: self.token_mint.clone(),
            token_decimals: self.token_decimals,
            amount: total_escrow(duration, bid_per_second).normalize(),
            recipient: self.recipient.clone(),
            instruction_data,
        })
    }
}
