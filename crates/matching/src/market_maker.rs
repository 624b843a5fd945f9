// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Market-maker fallback for residual orders
//!
//! Orders that sit on a thin book past an age threshold are closed out
//! against a synthetic counter-order owned by the house account. The
//! counter-order is priced inside a tolerance band around the fund's
//! NAV and crossed through the same pairing routine as the book pass.

use std::sync::atomic::{AtomicU64, Ordering};

use ccq_sdk::types::{MarketMakerSummary, OrderStatus, Side};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
	OrderBook,
	engine::{CancellationRegistry, MatchEngine, StagedPass},
	types::{FundInfo, MatchingError, Order},
};

/// Market-maker settings
#[derive(Debug, Clone)]
pub struct MarketMakerConfig {
	/// Minimum order age before the house steps in
	pub min_age_ms: u64,
	/// Half-width of the NAV band as a fraction (0.05 = ±5%)
	pub nav_tolerance: Decimal,
	/// Owner id of the synthetic counter-orders
	pub account: String,
}

impl Default for MarketMakerConfig {
	fn default() -> Self {
		Self {
			min_age_ms: 300_000,
			nav_tolerance: Decimal::new(5, 2),
			account: "market-maker".to_string(),
		}
	}
}

/// Price band the house is willing to trade inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavBand {
	pub low: Decimal,
	pub high: Decimal,
}

impl NavBand {
	/// Band around `nav`, or `None` when the NAV is not usable
	pub fn around(nav: Decimal, tolerance: Decimal) -> Option<Self> {
		if nav <= Decimal::ZERO || tolerance < Decimal::ZERO {
			return None;
		}
		Some(Self {
			low: nav * (Decimal::ONE - tolerance),
			high: nav * (Decimal::ONE + tolerance),
		})
	}

	/// Counter price offered against a residual priced at `price`
	pub fn counter_price(&self, price: Decimal) -> Decimal {
		price.clamp(self.low, self.high)
	}

	/// Whether a residual of `side` at `price` can trade with the house
	pub fn is_compatible(&self, side: Side, price: Decimal) -> bool {
		let counter = self.counter_price(price);
		match side {
			Side::Buy => price >= counter,
			Side::Sell => counter >= price,
		}
	}
}

/// A residual the house could not take this cycle
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedOrder {
	pub order_id: String,
	pub remaining_units: Decimal,
}

/// Result of one market-maker cycle over a fund, before commit
#[derive(Debug)]
pub struct MarketMakerCycle {
	pub staged: StagedPass,
	pub summary: MarketMakerSummary,
	pub unresolved: Vec<UnresolvedOrder>,
}

/// Resolves residual orders against the market-maker account
#[derive(Debug, Clone, Default)]
pub struct MarketMakerResolver {
	config: MarketMakerConfig,
}

impl MarketMakerResolver {
	pub fn new(config: MarketMakerConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &MarketMakerConfig {
		&self.config
	}

	/// Run one cycle over a fund's book
	///
	/// The book is first matched to exhaustion; whatever is still active
	/// afterwards and older than the age threshold is offered to the
	/// house in price-time priority order. `fund` is the NAV snapshot
	/// taken at cycle start.
	pub fn resolve(
		&self,
		book: &OrderBook,
		fund: Option<&FundInfo>,
		cancellations: &CancellationRegistry,
		sequence: &AtomicU64,
		now: u64,
	) -> Result<MarketMakerCycle, MatchingError> {
		let mut staged = MatchEngine::run_pass(book, cancellations, now, false)?;
		let band = fund.and_then(|f| NavBand::around(f.current_nav, self.config.nav_tolerance));

		let candidates: Vec<Order> = staged
			.book()
			.scoped_view()
			.into_iter()
			.filter(|order| self.is_candidate(order, now))
			.collect();

		let mut summary = MarketMakerSummary::default();
		let mut unresolved = Vec::new();

		for residual in candidates {
			let remaining = residual.remaining_units();
			let Some(band) = band.filter(|b| b.is_compatible(residual.side, residual.price)) else {
				warn!(
					target: "market_maker",
					fund_id = %residual.fund_id,
					order_id = %residual.order_id,
					price = %residual.price,
					error = %MatchingError::UnresolvedRemainder {
						order_id: residual.order_id.clone(),
					},
					"Residual left for the next cycle"
				);
				summary.unresolved_count += 1;
				unresolved.push(UnresolvedOrder {
					order_id: residual.order_id,
					remaining_units: remaining,
				});
				continue;
			};

			let counter = self.counter_order(&residual, band, sequence, now);
			let draft = staged.cross_external(&residual.order_id, counter, cancellations, now)?;

			debug!(
				target: "market_maker",
				fund_id = %draft.fund_id,
				order_id = %residual.order_id,
				units = %draft.matched_quantity,
				price = %draft.match_price,
				"Residual closed against house"
			);
			summary.resolved_count += 1;
			summary.units_resolved += draft.matched_quantity;
		}

		staged.verify_untouched(cancellations)?;
		Ok(MarketMakerCycle {
			staged,
			summary,
			unresolved,
		})
	}

	fn is_candidate(&self, order: &Order, now: u64) -> bool {
		order.is_active()
			&& order.owner_id != self.config.account
			&& now.saturating_sub(order.created_at) >= self.config.min_age_ms
	}

	fn counter_order(&self, residual: &Order, band: NavBand, sequence: &AtomicU64, now: u64) -> Order {
		Order {
			order_id: format!("ord_{}", Uuid::new_v4()),
			fund_id: residual.fund_id.clone(),
			side: residual.side.opposite(),
			price: band.counter_price(residual.price),
			units: residual.remaining_units(),
			matched_units: Decimal::ZERO,
			status: OrderStatus::Pending,
			owner_id: self.config.account.clone(),
			created_at: now,
			sequence: sequence.fetch_add(1, Ordering::SeqCst),
		}
	}
}

#[cfg(test)]
mod tests {
	use ccq_sdk::types::PairSource;

	use super::*;

	fn create_test_order(order_id: &str, side: Side, price: i64, units: i64, ts: u64) -> Order {
		Order {
			order_id: order_id.to_string(),
			fund_id: "VFMVF1".to_string(),
			side,
			price: Decimal::from(price),
			units: Decimal::from(units),
			matched_units: Decimal::ZERO,
			status: OrderStatus::Pending,
			owner_id: "investor".to_string(),
			created_at: ts,
			sequence: ts,
		}
	}

	fn fund(nav: i64) -> FundInfo {
		FundInfo {
			fund_id: "VFMVF1".to_string(),
			ticker: "vfmvf1".to_string(),
			current_nav: Decimal::from(nav),
		}
	}

	fn resolver(min_age_ms: u64) -> MarketMakerResolver {
		MarketMakerResolver::new(MarketMakerConfig {
			min_age_ms,
			..MarketMakerConfig::default()
		})
	}

	#[test]
	fn test_band_clamps_counter_price() {
		let band = NavBand::around(Decimal::from(10_000), Decimal::new(5, 2)).unwrap();
		assert_eq!(band.low, Decimal::from(9_500));
		assert_eq!(band.high, Decimal::from(10_500));

		assert_eq!(band.counter_price(Decimal::from(9_000)), Decimal::from(9_500));
		assert_eq!(band.counter_price(Decimal::from(9_800)), Decimal::from(9_800));
		assert_eq!(band.counter_price(Decimal::from(11_000)), Decimal::from(10_500));
	}

	#[test]
	fn test_band_compatibility() {
		let band = NavBand::around(Decimal::from(10_000), Decimal::new(5, 2)).unwrap();

		// A bid below the band cannot reach the lowest house ask
		assert!(!band.is_compatible(Side::Buy, Decimal::from(9_000)));
		assert!(band.is_compatible(Side::Buy, Decimal::from(9_500)));
		assert!(band.is_compatible(Side::Buy, Decimal::from(12_000)));

		assert!(!band.is_compatible(Side::Sell, Decimal::from(11_000)));
		assert!(band.is_compatible(Side::Sell, Decimal::from(10_500)));
		assert!(band.is_compatible(Side::Sell, Decimal::from(8_000)));
	}

	#[test]
	fn test_unusable_nav_has_no_band() {
		assert!(NavBand::around(Decimal::ZERO, Decimal::new(5, 2)).is_none());
		assert!(NavBand::around(Decimal::from(-1), Decimal::new(5, 2)).is_none());
	}

	#[test]
	fn test_resolves_both_sides_of_uncrossed_book() {
		let mut book = OrderBook::new("VFMVF1");
		book.insert(create_test_order("buy_1", Side::Buy, 9_000, 50, 1)).unwrap();
		book.insert(create_test_order("sell_1", Side::Sell, 9_500, 50, 2)).unwrap();
		let sequence = AtomicU64::new(100);

		let cycle = resolver(1_000)
			.resolve(&book, Some(&fund(9_250)), &CancellationRegistry::new(), &sequence, 5_000)
			.unwrap();

		assert_eq!(cycle.summary.resolved_count, 2);
		assert_eq!(cycle.summary.unresolved_count, 0);
		assert_eq!(cycle.summary.units_resolved, Decimal::from(100));
		assert!(cycle.staged.book().is_empty());
		assert_eq!(sequence.load(Ordering::SeqCst), 102);
	}

	#[test]
	fn test_young_orders_are_skipped() {
		let mut book = OrderBook::new("VFMVF1");
		book.insert(create_test_order("buy_1", Side::Buy, 9_000, 50, 4_500)).unwrap();

		let cycle = resolver(1_000)
			.resolve(&book, Some(&fund(9_000)), &CancellationRegistry::new(), &AtomicU64::new(1), 5_000)
			.unwrap();

		assert_eq!(cycle.summary, MarketMakerSummary::default());
		assert!(cycle.staged.book().contains("buy_1"));
	}

	#[test]
	fn test_out_of_band_residual_is_unresolved() {
		let mut book = OrderBook::new("VFMVF1");
		book.insert(create_test_order("buy_1", Side::Buy, 8_000, 50, 1)).unwrap();

		let cycle = resolver(0)
			.resolve(&book, Some(&fund(10_000)), &CancellationRegistry::new(), &AtomicU64::new(1), 10)
			.unwrap();

		assert_eq!(cycle.summary.unresolved_count, 1);
		assert_eq!(
			cycle.unresolved,
			vec![UnresolvedOrder {
				order_id: "buy_1".to_string(),
				remaining_units: Decimal::from(50),
			}]
		);
		assert_eq!(cycle.staged.pair_count(), 0);
		assert_eq!(
			cycle.staged.book().get("buy_1").unwrap().status,
			OrderStatus::Pending
		);
	}

	#[test]
	fn test_missing_nav_leaves_everything_unresolved() {
		let mut book = OrderBook::new("VFMVF1");
		book.insert(create_test_order("buy_1", Side::Buy, 10_000, 50, 1)).unwrap();
		book.insert(create_test_order("sell_1", Side::Sell, 10_500, 50, 2)).unwrap();

		let cycle = resolver(0)
			.resolve(&book, None, &CancellationRegistry::new(), &AtomicU64::new(1), 10)
			.unwrap();

		assert_eq!(cycle.summary.unresolved_count, 2);
		assert_eq!(cycle.summary.resolved_count, 0);
	}

	#[test]
	fn test_house_orders_are_not_resolved() {
		let mut house = create_test_order("house_1", Side::Sell, 10_000, 10, 1);
		house.owner_id = "market-maker".to_string();
		let mut book = OrderBook::new("VFMVF1");
		book.insert(house).unwrap();

		let cycle = resolver(0)
			.resolve(&book, Some(&fund(10_000)), &CancellationRegistry::new(), &AtomicU64::new(1), 10)
			.unwrap();

		assert_eq!(cycle.summary, MarketMakerSummary::default());
	}

	#[test]
	fn test_partial_residual_is_closed_for_its_remainder() {
		let mut partial = create_test_order("buy_1", Side::Buy, 10_200, 100, 1);
		partial.matched_units = Decimal::from(30);
		partial.status = OrderStatus::PartiallyMatched;
		let mut book = OrderBook::new("VFMVF1");
		book.insert(partial).unwrap();

		let cycle = resolver(0)
			.resolve(&book, Some(&fund(10_000)), &CancellationRegistry::new(), &AtomicU64::new(1), 10)
			.unwrap();

		assert_eq!(cycle.summary.units_resolved, Decimal::from(70));
		let mut ledger = crate::ledger::MemoryMatchedOrderLedger::new();
		let mut target = book.clone();
		let committed = cycle.staged.commit(&mut target, &mut ledger, 10).unwrap();
		assert_eq!(committed.pairs.len(), 1);
		assert_eq!(committed.pairs[0].match_price, Decimal::from(10_200));
		assert_eq!(committed.pairs[0].source, PairSource::MarketMaker);
		assert_eq!(committed.pairs[0].buy_order_id, "buy_1");
	}

	#[test]
	fn test_house_pair_prints_inside_band() {
		let mut book = OrderBook::new("VFMVF1");
		book.insert(create_test_order("buy_1", Side::Buy, 12_000, 40, 1)).unwrap();
		book.insert(create_test_order("sell_1", Side::Sell, 8_000, 25, 2)).unwrap();
		let book = MatchEngine::run_pass(&book, &CancellationRegistry::new(), 3, false)
			.unwrap()
			.book()
			.clone();
		// The book pass leaves 15 units of the buy at 12_000
		assert_eq!(book.order_count(), 1);

		let cycle = resolver(0)
			.resolve(&book, Some(&fund(10_000)), &CancellationRegistry::new(), &AtomicU64::new(1), 10)
			.unwrap();
		let mut ledger = crate::ledger::MemoryMatchedOrderLedger::new();
		let mut target = book.clone();
		let committed = cycle.staged.commit(&mut target, &mut ledger, 10).unwrap();

		let band = NavBand::around(Decimal::from(10_000), Decimal::new(5, 2)).unwrap();
		assert_eq!(committed.pairs.len(), 1);
		let pair = &committed.pairs[0];
		assert_eq!(pair.source, PairSource::MarketMaker);
		assert_eq!(pair.matched_quantity, Decimal::from(15));
		assert_eq!(pair.match_price, Decimal::from(10_500));
		assert!(pair.match_price >= band.low && pair.match_price <= band.high);
		assert!(target.is_empty());
	}

	#[test]
	fn test_pending_cancellation_aborts_cycle() {
		let mut book = OrderBook::new("VFMVF1");
		book.insert(create_test_order("buy_1", Side::Buy, 10_000, 50, 1)).unwrap();
		let cancellations = CancellationRegistry::new();
		cancellations.request("buy_1", "VFMVF1");

		let err = resolver(0)
			.resolve(&book, Some(&fund(10_000)), &cancellations, &AtomicU64::new(1), 10)
			.unwrap_err();
		assert_eq!(err, MatchingError::ConcurrentModification("buy_1".to_string()));
	}
}
