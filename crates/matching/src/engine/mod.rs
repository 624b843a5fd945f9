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

mod cancel;
mod staged;
mod state;

pub use cancel::CancellationRegistry;
pub use staged::{CommittedPass, StagedPass};
pub use state::{FundBookState, FundPassStats};

use ccq_sdk::types::{PairSource, Side};
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
	OrderBook,
	fill::PartialFillTracker,
	ledger::PairDraft,
	types::{MatchingError, Order},
};

/// Matching engine applying price-time priority to one fund's book
///
/// The engine is stateless: a pass reads a fund's book, stages every
/// fill on a private copy and hands back a [`StagedPass`] for the
/// caller to commit under the fund's lock.
///
/// Matching rules:
/// - Best bid crosses best ask while `bid.price >= ask.price`
/// - Quantity is the smaller of the two remaining quantities
/// - The earlier-submitted order of the pair sets the match price
/// - Several pairs may be produced in a single pass
///
/// For fixed input books and timestamps the sequence of pairs is fully
/// deterministic, so re-running a pass over an uncrossed book is a no-op.
pub struct MatchEngine;

impl MatchEngine {
	/// Run one matching pass over a fund's book
	///
	/// Fails with `ConcurrentModification` when an order selected for
	/// matching has a pending cancellation, and with `InvalidState` when
	/// an order's status disagrees with its quantities. On failure the
	/// staged state is discarded and the book is untouched.
	pub fn run_pass(
		book: &OrderBook,
		cancellations: &CancellationRegistry,
		now: u64,
		verbose: bool,
	) -> Result<StagedPass, MatchingError> {
		let mut staged = StagedPass::begin(book);

		while staged.cross_top(cancellations, now)? {
			if verbose {
				debug!(
					target: "engine",
					fund_id = book.fund_id(),
					pairs = staged.pair_count(),
					"Staged pair"
				);
			}
		}

		staged.verify_untouched(cancellations)?;
		Ok(staged)
	}

	/// Cross one buy order with one sell order
	///
	/// Both orders are fully validated before either is filled, so an
	/// error leaves both untouched.
	pub fn cross(buy: &mut Order, sell: &mut Order, now: u64) -> Result<PairDraft, MatchingError> {
		if buy.side != Side::Buy || sell.side != Side::Sell {
			return Err(MatchingError::InvalidState {
				order_id: buy.order_id.clone(),
				reason: format!("cannot cross {:?} with {:?}", buy.side, sell.side),
			});
		}
		if buy.fund_id != sell.fund_id {
			return Err(MatchingError::InvalidState {
				order_id: buy.order_id.clone(),
				reason: format!("cannot cross fund {} with fund {}", buy.fund_id, sell.fund_id),
			});
		}
		if buy.price < sell.price {
			return Err(MatchingError::InvalidState {
				order_id: buy.order_id.clone(),
				reason: format!("bid {} below ask {}", buy.price, sell.price),
			});
		}
		PartialFillTracker::check_consistency(buy)?;
		PartialFillTracker::check_consistency(sell)?;

		let quantity = buy.remaining_units().min(sell.remaining_units());
		if quantity <= Decimal::ZERO {
			return Err(MatchingError::InvalidState {
				order_id: buy.order_id.clone(),
				reason: "nothing left to match".to_string(),
			});
		}
		let match_price = Self::match_price(buy, sell);

		PartialFillTracker::apply_fill(buy, quantity)?;
		PartialFillTracker::apply_fill(sell, quantity)?;

		Ok(PairDraft {
			fund_id: buy.fund_id.clone(),
			buy_order_id: buy.order_id.clone(),
			sell_order_id: sell.order_id.clone(),
			matched_quantity: quantity,
			match_price,
			source: PairSource::Book,
			created_at: now,
		})
	}

	/// Price of the resting (earlier-submitted) order of the pair
	///
	/// `(created_at, sequence)` keys are unique in practice; if two keys
	/// ever compare equal the sell price is used.
	pub fn match_price(buy: &Order, sell: &Order) -> Decimal {
		if buy.time_key() < sell.time_key() {
			buy.price
		} else {
			sell.price
		}
	}
}

#[cfg(test)]
mod tests {
	use ccq_sdk::types::OrderStatus;

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
			owner_id: format!("owner_{}", order_id),
			created_at: ts,
			sequence: ts,
		}
	}

	fn book_with(orders: Vec<Order>) -> OrderBook {
		let mut book = OrderBook::new("VFMVF1");
		for order in orders {
			book.insert(order).unwrap();
		}
		book
	}

	#[test]
	fn test_resting_buy_sets_price() {
		let book = book_with(vec![
			create_test_order("buy_1", Side::Buy, 10_000, 100, 1),
			create_test_order("sell_1", Side::Sell, 9_900, 60, 2),
		]);

		let staged = MatchEngine::run_pass(&book, &CancellationRegistry::new(), 10, false).unwrap();

		assert_eq!(staged.pair_count(), 1);
		assert_eq!(staged.units_matched(), Decimal::from(60));
		let buy = staged.book().get("buy_1").unwrap();
		assert_eq!(buy.status, OrderStatus::PartiallyMatched);
		assert_eq!(buy.remaining_units(), Decimal::from(40));
		assert!(!staged.book().contains("sell_1"));
		// The input book is untouched until commit
		assert_eq!(book.order_count(), 2);
	}

	#[test]
	fn test_match_price_follows_earlier_order() {
		let buy = create_test_order("b", Side::Buy, 10_000, 1, 5);
		let sell = create_test_order("s", Side::Sell, 9_900, 1, 3);
		assert_eq!(MatchEngine::match_price(&buy, &sell), Decimal::from(9_900));

		let mut tied = buy.clone();
		tied.created_at = 3;
		tied.sequence = 3;
		assert_eq!(MatchEngine::match_price(&tied, &sell), Decimal::from(9_900));
	}

	#[test]
	fn test_multiple_pairs_in_one_pass() {
		let book = book_with(vec![
			create_test_order("sell_1", Side::Sell, 9_800, 30, 1),
			create_test_order("sell_2", Side::Sell, 9_900, 30, 2),
			create_test_order("sell_3", Side::Sell, 10_100, 30, 3),
			create_test_order("buy_1", Side::Buy, 10_000, 50, 4),
		]);

		let staged = MatchEngine::run_pass(&book, &CancellationRegistry::new(), 10, false).unwrap();

		assert_eq!(staged.pair_count(), 2);
		assert_eq!(staged.units_matched(), Decimal::from(50));
		assert!(!staged.book().contains("buy_1"));
		assert_eq!(
			staged.book().get("sell_2").unwrap().remaining_units(),
			Decimal::from(10)
		);
		assert_eq!(staged.book().best_ask(), Some(Decimal::from(9_900)));
	}

	#[test]
	fn test_uncrossed_spread_produces_nothing() {
		let book = book_with(vec![
			create_test_order("buy_1", Side::Buy, 9_000, 50, 1),
			create_test_order("sell_1", Side::Sell, 9_500, 50, 2),
		]);

		let staged = MatchEngine::run_pass(&book, &CancellationRegistry::new(), 10, false).unwrap();
		assert_eq!(staged.pair_count(), 0);
	}

	#[test]
	fn test_pending_cancellation_aborts_pass() {
		let book = book_with(vec![
			create_test_order("buy_1", Side::Buy, 10_000, 50, 1),
			create_test_order("sell_1", Side::Sell, 9_500, 50, 2),
		]);
		let cancellations = CancellationRegistry::new();
		cancellations.request("sell_1", "VFMVF1");

		let err = MatchEngine::run_pass(&book, &cancellations, 10, false).unwrap_err();
		assert_eq!(err, MatchingError::ConcurrentModification("sell_1".to_string()));
	}

	#[test]
	fn test_inconsistent_order_is_invalid_state() {
		let mut broken = create_test_order("buy_1", Side::Buy, 10_000, 50, 1);
		broken.matched_units = Decimal::from(10);
		let book = book_with(vec![
			broken,
			create_test_order("sell_1", Side::Sell, 9_500, 50, 2),
		]);

		let err = MatchEngine::run_pass(&book, &CancellationRegistry::new(), 10, false).unwrap_err();
		assert!(matches!(err, MatchingError::InvalidState { .. }));
	}

	#[test]
	fn test_cross_validates_before_filling() {
		let mut buy = create_test_order("b", Side::Buy, 9_000, 10, 1);
		let mut sell = create_test_order("s", Side::Sell, 9_500, 10, 2);

		assert!(MatchEngine::cross(&mut buy, &mut sell, 10).is_err());
		assert_eq!(buy.matched_units, Decimal::ZERO);
		assert_eq!(sell.matched_units, Decimal::ZERO);
	}
}
