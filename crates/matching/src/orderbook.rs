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

use std::{
	cmp::Reverse,
	collections::{BTreeMap, HashMap},
};

use ccq_sdk::types::Side;
use rust_decimal::Decimal;

use crate::types::{MatchingError, Order};

/// Price level in the order book
///
/// A price level contains all orders at a specific price, maintained
/// in time priority order: earliest `(created_at, sequence)` first.
#[derive(Debug, Clone)]
pub struct PriceLevel {
	price: Decimal,
	orders: Vec<Order>,
}

impl PriceLevel {
	fn new(price: Decimal) -> Self {
		Self {
			price,
			orders: Vec::new(),
		}
	}

	/// Insert keeping time priority, even if orders arrive out of order
	fn insert(&mut self, order: Order) {
		let key = order.time_key();
		let pos = self.orders.partition_point(|o| o.time_key() <= key);
		self.orders.insert(pos, order);
	}

	fn remove(&mut self, order_id: &str) -> Option<Order> {
		let pos = self.orders.iter().position(|o| o.order_id == order_id)?;
		Some(self.orders.remove(pos))
	}

	pub fn price(&self) -> Decimal {
		self.price
	}

	pub fn first(&self) -> Option<&Order> {
		self.orders.first()
	}

	pub fn is_empty(&self) -> bool {
		self.orders.is_empty()
	}

	/// Total remaining units resting at this level
	pub fn depth(&self) -> Decimal {
		self.orders.iter().map(Order::remaining_units).sum()
	}

	pub fn order_count(&self) -> usize {
		self.orders.len()
	}

	pub fn orders(&self) -> &[Order] {
		&self.orders
	}
}

/// Per-fund book of active buy and sell orders
///
/// Price-time priority:
/// - Buy side: highest price first (descending order via Reverse wrapper)
/// - Sell side: lowest price first (ascending order, natural BTreeMap order)
/// - Within a price level: earliest submission first
///
/// The book holds only non-terminal orders. It does not match anything
/// itself; the matching engine is its single writer during a pass.
#[derive(Debug, Clone)]
pub struct OrderBook {
	fund_id: String,
	bids: BTreeMap<Reverse<Decimal>, PriceLevel>,
	asks: BTreeMap<Decimal, PriceLevel>,
	/// order_id -> (side, price) for direct lookup
	index: HashMap<String, (Side, Decimal)>,
}

impl OrderBook {
	pub fn new(fund_id: impl Into<String>) -> Self {
		Self {
			fund_id: fund_id.into(),
			bids: BTreeMap::new(),
			asks: BTreeMap::new(),
			index: HashMap::new(),
		}
	}

	pub fn fund_id(&self) -> &str {
		&self.fund_id
	}

	/// Add an active order to its side of the book
	pub fn insert(&mut self, order: Order) -> Result<(), MatchingError> {
		if !order.is_active() {
			return Err(MatchingError::InvalidState {
				order_id: order.order_id,
				reason: format!("{:?} orders cannot rest on the book", order.status),
			});
		}
		if order.fund_id != self.fund_id {
			return Err(MatchingError::Validation(format!(
				"order {} belongs to fund {}, not {}",
				order.order_id, order.fund_id, self.fund_id
			)));
		}
		if self.index.contains_key(&order.order_id) {
			return Err(MatchingError::InvalidState {
				order_id: order.order_id,
				reason: "order is already on the book".to_string(),
			});
		}

		self.index
			.insert(order.order_id.clone(), (order.side, order.price));
		match order.side {
			Side::Buy => self
				.bids
				.entry(Reverse(order.price))
				.or_insert_with(|| PriceLevel::new(order.price))
				.insert(order),
			Side::Sell => self
				.asks
				.entry(order.price)
				.or_insert_with(|| PriceLevel::new(order.price))
				.insert(order),
		}
		Ok(())
	}

	/// Highest-priority order on a side
	pub fn peek_top(&self, side: Side) -> Option<&Order> {
		match side {
			Side::Buy => self.bids.first_key_value().and_then(|(_, l)| l.first()),
			Side::Sell => self.asks.first_key_value().and_then(|(_, l)| l.first()),
		}
	}

	/// Remove an order, dropping its price level once empty
	pub fn remove(&mut self, order_id: &str) -> Option<Order> {
		let (side, price) = self.index.remove(order_id)?;
		match side {
			Side::Buy => {
				let level = self.bids.get_mut(&Reverse(price))?;
				let order = level.remove(order_id);
				if level.is_empty() {
					self.bids.remove(&Reverse(price));
				}
				order
			}
			Side::Sell => {
				let level = self.asks.get_mut(&price)?;
				let order = level.remove(order_id);
				if level.is_empty() {
					self.asks.remove(&price);
				}
				order
			}
		}
	}

	pub fn get(&self, order_id: &str) -> Option<&Order> {
		let (side, price) = self.index.get(order_id)?;
		let level = match side {
			Side::Buy => self.bids.get(&Reverse(*price))?,
			Side::Sell => self.asks.get(price)?,
		};
		level.orders.iter().find(|o| o.order_id == order_id)
	}

	/// Mutable access for fill bookkeeping
	///
	/// Callers must not change `side`, `price`, `created_at` or
	/// `sequence`; those fields place the order in the book.
	pub fn get_mut(&mut self, order_id: &str) -> Option<&mut Order> {
		let (side, price) = self.index.get(order_id)?;
		let level = match side {
			Side::Buy => self.bids.get_mut(&Reverse(*price))?,
			Side::Sell => self.asks.get_mut(price)?,
		};
		level.orders.iter_mut().find(|o| o.order_id == order_id)
	}

	pub fn contains(&self, order_id: &str) -> bool {
		self.index.contains_key(order_id)
	}

	pub fn best_bid(&self) -> Option<Decimal> {
		self.bids.first_key_value().map(|(key, _)| key.0)
	}

	pub fn best_ask(&self) -> Option<Decimal> {
		self.asks.first_key_value().map(|(key, _)| *key)
	}

	/// True when the best bid reaches the best ask
	pub fn is_crossed(&self) -> bool {
		match (self.best_bid(), self.best_ask()) {
			(Some(bid), Some(ask)) => bid >= ask,
			_ => false,
		}
	}

	/// Remaining units resting at one price
	pub fn level_depth(&self, side: Side, price: Decimal) -> Option<Decimal> {
		match side {
			Side::Buy => self.bids.get(&Reverse(price)).map(PriceLevel::depth),
			Side::Sell => self.asks.get(&price).map(PriceLevel::depth),
		}
	}

	/// Orders of one side in priority order
	pub fn side_orders(&self, side: Side) -> Vec<&Order> {
		match side {
			Side::Buy => self.bids.values().flat_map(|l| l.orders.iter()).collect(),
			Side::Sell => self.asks.values().flat_map(|l| l.orders.iter()).collect(),
		}
	}

	/// All active orders of the fund, buys then sells, each in priority order
	pub fn scoped_view(&self) -> Vec<Order> {
		self.side_orders(Side::Buy)
			.into_iter()
			.chain(self.side_orders(Side::Sell))
			.cloned()
			.collect()
	}

	pub fn order_count(&self) -> usize {
		self.index.len()
	}

	pub fn is_empty(&self) -> bool {
		self.index.is_empty()
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
			owner_id: "test_owner".to_string(),
			created_at: ts,
			sequence: ts,
		}
	}

	#[test]
	fn test_insert_and_remove_order() {
		let mut book = OrderBook::new("VFMVF1");

		book.insert(create_test_order("order_1", Side::Buy, 10_000, 100, 1))
			.unwrap();

		assert_eq!(book.best_bid(), Some(Decimal::from(10_000)));
		assert_eq!(book.order_count(), 1);

		let removed = book.remove("order_1");
		assert!(removed.is_some());
		assert_eq!(book.order_count(), 0);
		assert_eq!(book.best_bid(), None);
		assert!(book.remove("order_1").is_none());
	}

	#[test]
	fn test_price_priority() {
		let mut book = OrderBook::new("VFMVF1");

		book.insert(create_test_order("b1", Side::Buy, 10_000, 1, 1)).unwrap();
		book.insert(create_test_order("b2", Side::Buy, 10_100, 1, 2)).unwrap();
		book.insert(create_test_order("b3", Side::Buy, 9_900, 1, 3)).unwrap();
		book.insert(create_test_order("s1", Side::Sell, 10_300, 1, 4)).unwrap();
		book.insert(create_test_order("s2", Side::Sell, 10_200, 1, 5)).unwrap();

		assert_eq!(book.peek_top(Side::Buy).unwrap().order_id, "b2");
		assert_eq!(book.peek_top(Side::Sell).unwrap().order_id, "s2");
		assert!(!book.is_crossed());

		book.remove("b2");
		assert_eq!(book.best_bid(), Some(Decimal::from(10_000)));
	}

	#[test]
	fn test_time_priority_at_same_price() {
		let mut book = OrderBook::new("VFMVF1");

		// Inserted out of time order on purpose
		book.insert(create_test_order("late", Side::Sell, 10_000, 1, 30)).unwrap();
		book.insert(create_test_order("early", Side::Sell, 10_000, 1, 10)).unwrap();
		book.insert(create_test_order("middle", Side::Sell, 10_000, 1, 20)).unwrap();

		let ids: Vec<_> = book
			.side_orders(Side::Sell)
			.iter()
			.map(|o| o.order_id.clone())
			.collect();
		assert_eq!(ids, vec!["early", "middle", "late"]);
	}

	#[test]
	fn test_equal_prices_with_different_scale_share_a_level() {
		let mut book = OrderBook::new("VFMVF1");

		let mut a = create_test_order("a", Side::Buy, 0, 1, 1);
		a.price = "10000.00".parse().unwrap();
		let b = create_test_order("b", Side::Buy, 10_000, 1, 2);
		book.insert(a).unwrap();
		book.insert(b).unwrap();

		assert_eq!(book.level_depth(Side::Buy, Decimal::from(10_000)), Some(Decimal::from(2)));
		assert_eq!(book.peek_top(Side::Buy).unwrap().order_id, "a");
	}

	#[test]
	fn test_rejects_terminal_duplicate_and_foreign_orders() {
		let mut book = OrderBook::new("VFMVF1");
		book.insert(create_test_order("o1", Side::Buy, 10_000, 1, 1)).unwrap();

		let dup = create_test_order("o1", Side::Buy, 10_000, 1, 2);
		assert!(matches!(book.insert(dup), Err(MatchingError::InvalidState { .. })));

		let mut done = create_test_order("o2", Side::Buy, 10_000, 1, 3);
		done.status = OrderStatus::Completed;
		assert!(book.insert(done).is_err());

		let mut foreign = create_test_order("o3", Side::Buy, 10_000, 1, 4);
		foreign.fund_id = "OTHER".to_string();
		assert!(matches!(book.insert(foreign), Err(MatchingError::Validation(_))));

		assert_eq!(book.order_count(), 1);
	}

	#[test]
	fn test_level_depth_tracks_fills() {
		let mut book = OrderBook::new("VFMVF1");

		book.insert(create_test_order("o1", Side::Buy, 10_000, 10, 1)).unwrap();
		book.insert(create_test_order("o2", Side::Buy, 10_000, 20, 2)).unwrap();
		book.get_mut("o1").unwrap().matched_units = Decimal::from(4);

		assert_eq!(book.level_depth(Side::Buy, Decimal::from(10_000)), Some(Decimal::from(26)));
	}

	#[test]
	fn test_scoped_view_orders_buys_then_sells() {
		let mut book = OrderBook::new("VFMVF1");
		book.insert(create_test_order("s1", Side::Sell, 10_500, 1, 1)).unwrap();
		book.insert(create_test_order("b1", Side::Buy, 9_000, 1, 2)).unwrap();
		book.insert(create_test_order("b2", Side::Buy, 9_500, 1, 3)).unwrap();

		let ids: Vec<_> = book.scoped_view().into_iter().map(|o| o.order_id).collect();
		assert_eq!(ids, vec!["b2", "b1", "s1"]);
	}
}
