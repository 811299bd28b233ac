//! Platform fee policy.
//!
//! The fee is computed once, at purchase initiation, and stored on the
//! payment. Settlement credits the stored `organizer_amount` and never
//! recomputes anything.

use crate::types::Money;
use serde::{Deserialize, Serialize};

/// Who bears the platform fee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePayer {
    /// Fee added on top of the ticket price
    Buyer,
    /// Fee deducted from the organizer's credit
    Organizer,
}

/// Fee formula: `round(price * bps / 10_000) + flat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Who pays
    pub payer: FeePayer,
    /// Percentage part in basis points (300 = 3%)
    pub basis_points: u32,
    /// Flat part in minor units
    pub flat: Money,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            payer: FeePayer::Buyer,
            basis_points: 300,
            flat: Money::from_minor(80),
        }
    }
}

/// Amounts fixed at initiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Listed ticket price
    pub price: Money,
    /// Platform fee
    pub platform_fee: Money,
    /// Charged to the buyer
    pub amount: Money,
    /// Credited to the organizer on success
    pub organizer_amount: Money,
}

impl FeePolicy {
    /// Platform fee for a ticket price. Free tickets carry no fee.
    ///
    /// Rounds half up, in integer arithmetic.
    #[must_use]
    pub fn platform_fee(&self, price: Money) -> Money {
        if price.is_zero() {
            return Money::ZERO;
        }
        let scaled = u128::from(price.minor()) * u128::from(self.basis_points);
        let percentage = (scaled + 5_000) / 10_000;
        let fee = u64::try_from(percentage)
            .unwrap_or(u64::MAX)
            .saturating_add(self.flat.minor());
        Money::from_minor(fee)
    }

    /// Split a ticket price into buyer charge, fee and organizer credit.
    #[must_use]
    pub fn breakdown(&self, price: Money) -> FeeBreakdown {
        let platform_fee = self.platform_fee(price);
        let (amount, organizer_amount) = match self.payer {
            FeePayer::Buyer => (
                price.checked_add(platform_fee).unwrap_or(Money::from_minor(u64::MAX)),
                price,
            ),
            FeePayer::Organizer => (price, price.saturating_sub(platform_fee)),
        };
        FeeBreakdown {
            price,
            platform_fee,
            amount,
            organizer_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_buyer_pays_fee() {
        let policy = FeePolicy::default();
        let breakdown = policy.breakdown(Money::from_minor(5000));
        assert_eq!(breakdown.platform_fee, Money::from_minor(230));
        assert_eq!(breakdown.amount, Money::from_minor(5230));
        assert_eq!(breakdown.organizer_amount, Money::from_minor(5000));
    }

    #[test]
    fn test_organizer_pays_fee() {
        let policy = FeePolicy {
            payer: FeePayer::Organizer,
            ..FeePolicy::default()
        };
        let breakdown = policy.breakdown(Money::from_minor(5000));
        assert_eq!(breakdown.amount, Money::from_minor(5000));
        assert_eq!(breakdown.organizer_amount, Money::from_minor(4770));

        // Fee larger than the price clamps the credit at zero
        let tiny = policy.breakdown(Money::from_minor(50));
        assert_eq!(tiny.organizer_amount, Money::ZERO);
    }

    #[test]
    fn test_free_ticket_has_no_fee() {
        let breakdown = FeePolicy::default().breakdown(Money::ZERO);
        assert_eq!(breakdown.platform_fee, Money::ZERO);
        assert_eq!(breakdown.amount, Money::ZERO);
        assert_eq!(breakdown.organizer_amount, Money::ZERO);
    }

    #[test]
    fn test_rounding_is_half_up() {
        let policy = FeePolicy {
            flat: Money::ZERO,
            ..FeePolicy::default()
        };
        // 3% of 50 = 1.5 -> 2
        assert_eq!(policy.platform_fee(Money::from_minor(50)), Money::from_minor(2));
        // 3% of 49 = 1.47 -> 1
        assert_eq!(policy.platform_fee(Money::from_minor(49)), Money::from_minor(1));
    }

    proptest! {
        #[test]
        fn prop_buyer_pays_keeps_price_whole(price in 1_u64..10_000_000) {
            let b = FeePolicy::default().breakdown(Money::from_minor(price));
            prop_assert_eq!(b.organizer_amount.minor(), price);
            prop_assert_eq!(b.amount.minor(), price + b.platform_fee.minor());
        }

        #[test]
        fn prop_organizer_pays_never_exceeds_price(price in 0_u64..10_000_000) {
            let policy = FeePolicy { payer: FeePayer::Organizer, ..FeePolicy::default() };
            let b = policy.breakdown(Money::from_minor(price));
            prop_assert_eq!(b.amount.minor(), price);
            prop_assert!(b.organizer_amount.minor() <= price);
        }
    }
}
