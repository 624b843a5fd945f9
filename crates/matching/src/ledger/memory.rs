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

use std::collections::{HashMap, HashSet};

use ccq_sdk::types::PairStatus;
use rust_decimal::Decimal;

use super::{LedgerError, MatchedOrderLedger, PairDraft};
use crate::types::{MatchedOrderPair, Order};

/// In-memory implementation of the matched order ledger
///
/// Characteristics:
/// - No durability; history is lost on restart
/// - Pairs stored in a Vec in recording order
/// - Per-order and per-fund indexes for history lookups
/// - Settled pair ids kept in a separate set
pub struct MemoryMatchedOrderLedger {
	pairs: Vec<MatchedOrderPair>,
	/// order_id -> positions in `pairs`
	by_order: HashMap<String, Vec<usize>>,
	/// fund_id -> positions in `pairs`
	by_fund: HashMap<String, Vec<usize>>,
	archived: HashMap<String, Order>,
	settled: HashSet<u64>,
	next_id: u64,
}

impl MemoryMatchedOrderLedger {
	pub fn new() -> Self {
		Self {
			pairs: Vec::new(),
			by_order: HashMap::new(),
			by_fund: HashMap::new(),
			archived: HashMap::new(),
			settled: HashSet::new(),
			next_id: 1,
		}
	}

	fn with_status(&self, pair: &MatchedOrderPair) -> MatchedOrderPair {
		let mut pair = pair.clone();
		if self.settled.contains(&pair.id) {
			pair.status = PairStatus::Done;
		}
		pair
	}

	fn collect(&self, positions: Option<&Vec<usize>>) -> Vec<MatchedOrderPair> {
		positions
			.map(|positions| {
				positions
					.iter()
					.map(|&pos| self.with_status(&self.pairs[pos]))
					.collect()
			})
			.unwrap_or_default()
	}

	fn append(&mut self, draft: PairDraft) -> MatchedOrderPair {
		let pair = MatchedOrderPair {
			id: self.next_id,
			fund_id: draft.fund_id,
			buy_order_id: draft.buy_order_id,
			sell_order_id: draft.sell_order_id,
			matched_quantity: draft.matched_quantity,
			match_price: draft.match_price,
			status: PairStatus::Confirmed,
			source: draft.source,
			created_at: draft.created_at,
		};
		self.next_id += 1;

		let pos = self.pairs.len();
		for order_id in [&pair.buy_order_id, &pair.sell_order_id] {
			self.by_order.entry(order_id.clone()).or_default().push(pos);
		}
		self.by_fund
			.entry(pair.fund_id.clone())
			.or_default()
			.push(pos);
		self.pairs.push(pair.clone());
		pair
	}
}

fn check_draft(draft: &PairDraft) -> Result<(), LedgerError> {
	if draft.matched_quantity <= Decimal::ZERO {
		return Err(LedgerError::RecordFailed(format!(
			"matched quantity must be positive, got {}",
			draft.matched_quantity
		)));
	}
	if draft.buy_order_id == draft.sell_order_id {
		return Err(LedgerError::RecordFailed(format!(
			"order {} cannot trade with itself",
			draft.buy_order_id
		)));
	}
	Ok(())
}

impl Default for MemoryMatchedOrderLedger {
	fn default() -> Self {
		Self::new()
	}
}

impl MatchedOrderLedger for MemoryMatchedOrderLedger {
	fn record_batch(
		&mut self,
		drafts: Vec<PairDraft>,
	) -> Result<Vec<MatchedOrderPair>, LedgerError> {
		drafts.iter().try_for_each(check_draft)?;
		Ok(drafts.into_iter().map(|draft| self.append(draft)).collect())
	}

	fn pairs_for_order(&self, order_id: &str) -> Vec<MatchedOrderPair> {
		self.collect(self.by_order.get(order_id))
	}

	fn pairs_for_fund(&self, fund_id: &str) -> Vec<MatchedOrderPair> {
		self.collect(self.by_fund.get(fund_id))
	}

	fn archive(&mut self, order: Order) {
		self.archived.insert(order.order_id.clone(), order);
	}

	fn archived(&self, order_id: &str) -> Option<Order> {
		self.archived.get(order_id).cloned()
	}

	fn mark_done(&mut self, pair_id: u64) -> Result<(), LedgerError> {
		if pair_id == 0 || pair_id >= self.next_id {
			return Err(LedgerError::UnknownPair(pair_id));
		}
		self.settled.insert(pair_id);
		Ok(())
	}

	fn pair_status(&self, pair_id: u64) -> Option<PairStatus> {
		if pair_id == 0 || pair_id >= self.next_id {
			return None;
		}
		if self.settled.contains(&pair_id) {
			Some(PairStatus::Done)
		} else {
			Some(PairStatus::Confirmed)
		}
	}

	fn len(&self) -> usize {
		self.pairs.len()
	}
}
