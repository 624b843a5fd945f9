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

use dashmap::DashMap;

/// Cancellation requests that have not been applied to a book yet
///
/// Cancelling never waits for a fund's matching lock. The request is
/// recorded here first; a pass holding the lock sees it and aborts,
/// and whoever next holds the lock drains the fund's requests.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
	/// order_id -> fund_id
	pending: DashMap<String, String>,
}

impl CancellationRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn request(&self, order_id: &str, fund_id: &str) {
		self.pending
			.insert(order_id.to_string(), fund_id.to_string());
	}

	pub fn is_requested(&self, order_id: &str) -> bool {
		self.pending.contains_key(order_id)
	}

	/// Remove and return every pending request for one fund
	pub fn take_for_fund(&self, fund_id: &str) -> Vec<String> {
		let mut order_ids: Vec<String> = self
			.pending
			.iter()
			.filter(|entry| entry.value() == fund_id)
			.map(|entry| entry.key().clone())
			.collect();
		order_ids.sort();

		for order_id in &order_ids {
			self.pending.remove(order_id);
		}
		order_ids
	}

	pub fn len(&self) -> usize {
		self.pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pending.is_empty()
	}
}
