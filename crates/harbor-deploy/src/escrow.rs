// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Escrow burn rate and time-remaining estimates.

use crate::types::{EscrowAccount, EscrowState, Price};

/// Blocks produced per hour at the chain's ~6 second block time.
pub const BLOCKS_PER_HOUR: u64 = 600;

/// Lease prices are quoted per block.
pub fn burn_rate_per_hour(price: &Price) -> u64 {
	price.amount.saturating_mul(BLOCKS_PER_HOUR)
}

/// Render `balance / burn_rate_per_hour` as whole days when at least a day
/// remains, otherwise whole hours. `"N/A"` when nothing is being burned.
pub fn estimate_time_remaining(balance: f64, burn_rate_per_hour: f64) -> String {
	if burn_rate_per_hour <= 0.0 || !burn_rate_per_hour.is_finite() {
		return "N/A".to_string();
	}

	let hours = (balance / burn_rate_per_hour).max(0.0);
	if hours >= 24.0 {
		let days = (hours / 24.0).floor() as u64;
		plural(days, "day")
	} else {
		plural(hours.floor() as u64, "hour")
	}
}

fn plural(n: u64, unit: &str) -> String {
	if n == 1 {
		format!("{n} {unit}")
	} else {
		format!("{n} {unit}s")
	}
}

/// An overdrawn account cannot keep a lease alive.
pub fn is_exhausted(escrow: &EscrowAccount) -> bool {
	matches!(escrow.state, EscrowState::Overdrawn | EscrowState::Closed) || escrow.balance == 0
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn just_under_two_days_of_balance_is_one_day() {
		// 45.5 / 0.95 = 47.9 hours
		assert_eq!(estimate_time_remaining(45.5, 0.95), "1 day");
	}

	#[test]
	fn zero_burn_is_not_applicable() {
		assert_eq!(estimate_time_remaining(45.5, 0.0), "N/A");
		assert_eq!(estimate_time_remaining(0.0, 0.0), "N/A");
	}

	#[test]
	fn under_a_day_is_reported_in_hours() {
		assert_eq!(estimate_time_remaining(10.0, 1.0), "10 hours");
		assert_eq!(estimate_time_remaining(1.5, 1.0), "1 hour");
		assert_eq!(estimate_time_remaining(0.5, 1.0), "0 hours");
	}

	#[test]
	fn whole_days_are_floored() {
		assert_eq!(estimate_time_remaining(24.0, 1.0), "1 day");
		assert_eq!(estimate_time_remaining(72.0, 1.0), "3 days");
		assert_eq!(estimate_time_remaining(95.9, 1.0), "3 days");
	}

	#[test]
	fn burn_rate_scales_per_block_price() {
		let price = Price {
			denom: "uakt".to_string(),
			amount: 95,
		};
		assert_eq!(burn_rate_per_hour(&price), 57_000);
	}

	#[test]
	fn overdrawn_or_empty_escrow_is_exhausted() {
		let mut escrow = EscrowAccount {
			balance: 10,
			denom: "uakt".to_string(),
			state: EscrowState::Open,
		};
		assert!(!is_exhausted(&escrow));
		escrow.state = EscrowState::Overdrawn;
		assert!(is_exhausted(&escrow));
		escrow.state = EscrowState::Open;
		escrow.balance = 0;
		assert!(is_exhausted(&escrow));
	}

	proptest! {
		#[test]
		fn estimate_never_panics(balance in -1e12f64..1e12, rate in -1e6f64..1e6) {
			let text = estimate_time_remaining(balance, rate);
			prop_assert!(text == "N/A" || text.ends_with("day") || text.ends_with("days")
				|| text.ends_with("hour") || text.ends_with("hours"));
		}
	}
}
