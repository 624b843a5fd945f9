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

use std::collections::BTreeSet;

use ccq_sdk::types::{MatchSummary, OrderStatus, PairSource, Side};
use rust_decimal::Decimal;

use super::{CancellationRegistry, MatchEngine};
use crate::{
	OrderBook,
	event::MatchingEvent,
	ledger::{MatchedOrderLedger, PairDraft},
	types::{MatchedOrderPair, MatchingError, Order},
};

#[derive(Debug, Clone)]
enum StagedChange {
	Pair(PairDraft),
	Filled(Order),
}

/// Work-in-progress copy of a fund's book
///
/// A pass (or a market-maker cycle) mutates only the staged copy.
/// Nothing becomes visible until [`StagedPass::commit`] swaps the
/// staged book in, records the pairs and builds the events; dropping
/// the staged pass discards every fill it applied.
#[derive(Debug, Clone)]
pub struct StagedPass {
	book: OrderBook,
	changes: Vec<StagedChange>,
	/// Orders that reached a terminal state during the pass
	finished: Vec<Order>,
	/// Every order id the pass filled
	touched: BTreeSet<String>,
	units_matched: Decimal,
	pairs: usize,
}

/// Result of committing a staged pass
#[derive(Debug, Clone, Default)]
pub struct CommittedPass {
	pub pairs: Vec<MatchedOrderPair>,
	/// Orders that reached a terminal state and left the book
	pub completed: Vec<String>,
	pub events: Vec<MatchingEvent>,
	pub summary: MatchSummary,
}

impl StagedPass {
	pub fn begin(book: &OrderBook) -> Self {
		Self {
			book: book.clone(),
			changes: Vec::new(),
			finished: Vec::new(),
			touched: BTreeSet::new(),
			units_matched: Decimal::ZERO,
			pairs: 0,
		}
	}

	pub fn book(&self) -> &OrderBook {
		&self.book
	}

	pub fn pair_count(&self) -> usize {
		self.pairs
	}

	pub fn units_matched(&self) -> Decimal {
		self.units_matched
	}

	/// Cross the current top of both sides
	///
	/// Returns `Ok(false)` once either side is empty or the spread has
	/// not crossed.
	pub(crate) fn cross_top(
		&mut self,
		cancellations: &CancellationRegistry,
		now: u64,
	) -> Result<bool, MatchingError> {
		let (buy_id, sell_id) = {
			let (Some(buy), Some(sell)) = (
				self.book.peek_top(Side::Buy),
				self.book.peek_top(Side::Sell),
			) else {
				return Ok(false);
			};
			if buy.price < sell.price {
				return Ok(false);
			}
			(buy.order_id.clone(), sell.order_id.clone())
		};

		for order_id in [&buy_id, &sell_id] {
			if cancellations.is_requested(order_id) {
				return Err(MatchingError::ConcurrentModification(order_id.clone()));
			}
		}

		let mut buy = self.take(&buy_id)?;
		let mut sell = self.take(&sell_id)?;
		let draft = MatchEngine::cross(&mut buy, &mut sell, now)?;

		self.settle_order(buy)?;
		self.settle_order(sell)?;
		self.push_pair(draft);
		Ok(true)
	}

	/// Cross a resting order against an order that never rests on the book
	///
	/// Used for the market maker's synthetic counter-orders. The pair
	/// prints at the counter-order's price, which the caller has placed
	/// inside the NAV band, never at a resting price outside it.
	pub(crate) fn cross_external(
		&mut self,
		resting_id: &str,
		mut external: Order,
		cancellations: &CancellationRegistry,
		now: u64,
	) -> Result<PairDraft, MatchingError> {
		if cancellations.is_requested(resting_id) {
			return Err(MatchingError::ConcurrentModification(resting_id.to_string()));
		}

		let mut resting = self.take(resting_id)?;
		let original = resting.clone();
		let counter_price = external.price;
		let crossed = match resting.side {
			Side::Buy => MatchEngine::cross(&mut resting, &mut external, now),
			Side::Sell => MatchEngine::cross(&mut external, &mut resting, now),
		};
		let draft = match crossed {
			Ok(draft) => PairDraft {
				match_price: counter_price,
				source: PairSource::MarketMaker,
				..draft
			},
			Err(e) => {
				self.book.insert(original)?;
				return Err(e);
			}
		};

		self.settle_order(resting)?;
		self.settle_order(external)?;
		self.push_pair(draft.clone());
		Ok(draft)
	}

	/// Abort if any order this pass filled has been cancelled since
	pub(crate) fn verify_untouched(
		&self,
		cancellations: &CancellationRegistry,
	) -> Result<(), MatchingError> {
		match self
			.touched
			.iter()
			.find(|order_id| cancellations.is_requested(order_id))
		{
			Some(order_id) => Err(MatchingError::ConcurrentModification(order_id.clone())),
			None => Ok(()),
		}
	}

	fn take(&mut self, order_id: &str) -> Result<Order, MatchingError> {
		let order = self
			.book
			.remove(order_id)
			.ok_or_else(|| MatchingError::ConcurrentModification(order_id.to_string()))?;
		if !order.is_active() {
			return Err(MatchingError::InvalidState {
				order_id: order.order_id,
				reason: format!("{:?} order found on the book", order.status),
			});
		}
		Ok(order)
	}

	fn settle_order(&mut self, order: Order) -> Result<(), MatchingError> {
		self.touched.insert(order.order_id.clone());
		self.changes.push(StagedChange::Filled(order.clone()));
		if order.status == OrderStatus::Completed {
			self.finished.push(order);
			Ok(())
		} else {
			self.book.insert(order)
		}
	}

	fn push_pair(&mut self, draft: PairDraft) {
		self.units_matched += draft.matched_quantity;
		self.pairs += 1;
		self.changes.push(StagedChange::Pair(draft));
	}

	/// Publish the staged state: record pairs, archive finished orders,
	/// swap the book and build the event batch
	///
	/// The pairs go to the ledger as one batch before anything else is
	/// touched, so a refused batch leaves the book, the ledger and the
	/// archive exactly as they were.
	pub fn commit(
		self,
		target: &mut OrderBook,
		ledger: &mut dyn MatchedOrderLedger,
		now: u64,
	) -> Result<CommittedPass, MatchingError> {
		let drafts: Vec<PairDraft> = self
			.changes
			.iter()
			.filter_map(|change| match change {
				StagedChange::Pair(draft) => Some(draft.clone()),
				StagedChange::Filled(_) => None,
			})
			.collect();
		let recorded = ledger
			.record_batch(drafts)
			.map_err(|e| MatchingError::InvalidState {
				order_id: String::new(),
				reason: e.to_string(),
			})?;
		if recorded.len() != self.pairs {
			return Err(MatchingError::InvalidState {
				order_id: String::new(),
				reason: format!("ledger stored {} of {} pairs", recorded.len(), self.pairs),
			});
		}

		let mut committed = CommittedPass::default();
		let mut recorded = recorded.into_iter();
		for change in self.changes {
			match change {
				StagedChange::Pair(_) => {
					if let Some(pair) = recorded.next() {
						committed.events.push(MatchingEvent::PairMatched {
							seq: 0,
							pair: pair.clone(),
							timestamp: now,
						});
						committed.pairs.push(pair);
					}
				}
				StagedChange::Filled(order) => {
					committed.events.push(fill_event(&order, now));
				}
			}
		}

		for order in self.finished {
			committed.completed.push(order.order_id.clone());
			ledger.archive(order);
		}

		*target = self.book;
		committed.summary = MatchSummary {
			pairs_created: self.pairs,
			units_matched: self.units_matched,
			funds_matched: 1,
			funds_failed: Vec::new(),
		};
		Ok(committed)
	}
}

fn fill_event(order: &Order, now: u64) -> MatchingEvent {
	if order.status == OrderStatus::Completed {
		MatchingEvent::OrderCompleted {
			seq: 0,
			order_id: order.order_id.clone(),
			fund_id: order.fund_id.clone(),
			matched_units: order.matched_units,
			timestamp: now,
		}
	} else {
		MatchingEvent::OrderPartiallyMatched {
			seq: 0,
			order_id: order.order_id.clone(),
			fund_id: order.fund_id.clone(),
			matched_units: order.matched_units,
			remaining_units: order.remaining_units(),
			timestamp: now,
		}
	}
}
