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

//! Fund matching service
//!
//! Owns every fund's book and the shared ledger, and exposes the
//! engine's external operations:
//! - `submit_order` / `cancel_order`
//! - `run_matching_pass` for one fund or all funds
//! - `resolve_market_maker`
//! - `get_order_book_snapshot`
//!
//! Each fund's book sits behind its own mutex, so passes over one fund
//! are serialized while distinct funds match in parallel.
//!
//! Lock order is fund state, then the fund's commit gate, then the
//! ledger. The commit gate is held only for the final cancellation
//! check plus the commit itself; `cancel_order` takes it (and nothing
//! else blocking), so a cancellation either lands before a pass commits
//! and aborts it, or finds the order already terminal.

use std::sync::{
	Arc, Mutex, MutexGuard, PoisonError, TryLockError,
	atomic::{AtomicBool, AtomicU64, Ordering},
};

use ccq_sdk::types::{MarketMakerSummary, MatchSummary, OrderStatus, Side};
use dashmap::DashMap;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
	clock::Clock,
	config::MatchingConfig,
	engine::{
		CancellationRegistry, CommittedPass, FundBookState, FundPassStats, MatchEngine, StagedPass,
	},
	event::{EventBus, EventSubscriber, MatchingEvent},
	fund::FundDirectory,
	ledger::{MatchedOrderLedger, MemoryMatchedOrderLedger},
	market_maker::{MarketMakerCycle, MarketMakerResolver},
	types::{
		FundPhase, FundScope, MatchedOrderPair, MatchingError, Order, OrderBookSnapshot,
		OrderCommand,
	},
};

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-fund book plus its matching phase
struct FundSlot {
	state: Mutex<FundBookState>,
	/// Serializes cancellation requests with pass commits
	commit_gate: Mutex<()>,
	matching: AtomicBool,
}

impl FundSlot {
	fn new(fund_id: &str) -> Self {
		Self {
			state: Mutex::new(FundBookState::new(fund_id)),
			commit_gate: Mutex::new(()),
			matching: AtomicBool::new(false),
		}
	}

	fn phase(&self) -> FundPhase {
		if self.matching.load(Ordering::Acquire) {
			FundPhase::Matching
		} else {
			FundPhase::Idle
		}
	}
}

/// Marks a fund as matching until dropped
struct PhaseGuard<'a>(&'a AtomicBool);

impl<'a> PhaseGuard<'a> {
	fn enter(flag: &'a AtomicBool) -> Self {
		flag.store(true, Ordering::Release);
		Self(flag)
	}
}

impl Drop for PhaseGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

/// Matching service for all fund books
pub struct FundMatchingService {
	slots: DashMap<String, Arc<FundSlot>>,
	/// order_id -> fund_id for every active order
	active_orders: DashMap<String, String>,
	ledger: Mutex<Box<dyn MatchedOrderLedger>>,
	cancellations: CancellationRegistry,
	directory: Arc<dyn FundDirectory>,
	resolver: MarketMakerResolver,
	bus: EventBus,
	clock: Arc<dyn Clock>,
	sequence: AtomicU64,
	max_pass_retries: u32,
	verbose: bool,
}

impl FundMatchingService {
	/// Create a service backed by an in-memory ledger
	pub fn new(
		config: &MatchingConfig,
		directory: Arc<dyn FundDirectory>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self::with_ledger(
			config,
			directory,
			clock,
			Box::new(MemoryMatchedOrderLedger::new()),
		)
	}

	pub fn with_ledger(
		config: &MatchingConfig,
		directory: Arc<dyn FundDirectory>,
		clock: Arc<dyn Clock>,
		ledger: Box<dyn MatchedOrderLedger>,
	) -> Self {
		let slots = DashMap::new();
		for fund_id in directory.fund_ids() {
			let slot = Arc::new(FundSlot::new(&fund_id));
			slots.insert(fund_id, slot);
		}

		Self {
			slots,
			active_orders: DashMap::new(),
			ledger: Mutex::new(ledger),
			cancellations: CancellationRegistry::new(),
			directory,
			resolver: MarketMakerResolver::new(config.market_maker()),
			bus: EventBus::new(),
			clock,
			sequence: AtomicU64::new(1),
			max_pass_retries: config.max_pass_retries,
			verbose: config.verbose_logging,
		}
	}

	/// Validate an order and add it to its fund's book
	pub fn submit_order(&self, cmd: OrderCommand) -> Result<Order, MatchingError> {
		cmd.validate()?;
		if self.directory.fund(&cmd.fund_id).is_none() {
			return Err(MatchingError::Validation(format!(
				"unknown fund {}",
				cmd.fund_id
			)));
		}

		let slot = self.slot_or_create(&cmd.fund_id);
		let mut state = lock(&slot.state);
		self.apply_cancellations(&slot, &mut state);

		let order_id = format!("ord_{}", Uuid::new_v4());
		let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
		let now = self.clock.now_millis();
		let order = Order::from_command(order_id, cmd, now, sequence);

		state.orderbook.insert(order.clone())?;
		self.active_orders
			.insert(order.order_id.clone(), order.fund_id.clone());

		debug!(
			target: "service",
			order_id = %order.order_id,
			fund_id = %order.fund_id,
			side = ?order.side,
			price = %order.price,
			units = %order.units,
			"Order accepted"
		);
		self.bus.publish(vec![MatchingEvent::OrderAccepted {
			seq: 0,
			order_id: order.order_id.clone(),
			fund_id: order.fund_id.clone(),
			side: order.side,
			price: order.price,
			units: order.units,
			timestamp: now,
		}]);

		Ok(order)
	}

	/// Cancel an active order
	///
	/// Never waits for a running pass, only for a commit in progress:
	/// when the fund is busy the request stays registered, the pass
	/// aborts on it and the retry applies it. An order a pass has just
	/// completed is reported as `OrderNotFound`.
	pub fn cancel_order(&self, order_id: &str) -> Result<(), MatchingError> {
		let not_found = || MatchingError::OrderNotFound(order_id.to_string());
		let fund_id = self
			.active_orders
			.get(order_id)
			.map(|entry| entry.value().clone())
			.ok_or_else(not_found)?;
		let slot = self.slot(&fund_id)?;

		{
			let _gate = lock(&slot.commit_gate);
			if !self.active_orders.contains_key(order_id) {
				return Err(not_found());
			}
			self.cancellations.request(order_id, &fund_id);
		}

		let mut state = match slot.state.try_lock() {
			Ok(state) => state,
			Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
			Err(TryLockError::WouldBlock) => {
				debug!(
					target: "service",
					order_id,
					fund_id = %fund_id,
					"Fund busy, cancellation deferred to the running pass"
				);
				return Ok(());
			}
		};
		self.apply_cancellations(&slot, &mut state);
		Ok(())
	}

	/// Run a matching pass over one fund or every fund
	///
	/// [`FundScope::All`] only visits funds whose book has crossed. A
	/// failing fund is logged and listed in `funds_failed` without
	/// stopping the sweep. For a single fund the error is returned once
	/// retries are exhausted.
	pub fn run_matching_pass(&self, scope: FundScope) -> Result<MatchSummary, MatchingError> {
		match scope {
			FundScope::Fund(fund_id) => {
				let Some(slot) = self.slot_if_known(&fund_id)? else {
					return Ok(MatchSummary::default());
				};
				self.match_fund(&fund_id, &slot)
			}
			FundScope::All => {
				let mut summary = MatchSummary::default();
				for (fund_id, slot) in self.all_slots() {
					if !lock(&slot.state).orderbook.is_crossed() {
						continue;
					}
					match self.match_fund(&fund_id, &slot) {
						Ok(fund_summary) => summary.merge(fund_summary),
						Err(e) => {
							error!(
								target: "service",
								fund_id = %fund_id,
								error = %e,
								"Matching pass failed"
							);
							summary.funds_failed.push(fund_id);
						}
					}
				}
				if summary.pairs_created > 0 {
					info!(
						target: "service",
						pairs = summary.pairs_created,
						units = %summary.units_matched,
						funds = summary.funds_matched,
						"Matching sweep complete"
					);
				}
				Ok(summary)
			}
		}
	}

	/// Offer a fund's aged residual orders to the market maker
	pub fn resolve_market_maker(&self, fund_id: &str) -> Result<MarketMakerSummary, MatchingError> {
		let Some(slot) = self.slot_if_known(fund_id)? else {
			return Ok(MarketMakerSummary::default());
		};

		self.with_retries(fund_id, &slot, |state, now| {
			// Each attempt prices against the NAV current at that attempt
			let fund = self.directory.fund(fund_id);
			let cycle = self.resolver.resolve(
				&state.orderbook,
				fund.as_ref(),
				&self.cancellations,
				&self.sequence,
				now,
			)?;
			let MarketMakerCycle {
				staged,
				summary,
				unresolved,
			} = cycle;

			let mut committed = self.commit_staged(&slot, state, staged, now)?;
			committed
				.events
				.extend(unresolved.into_iter().map(|u| MatchingEvent::RemainderUnresolved {
					seq: 0,
					order_id: u.order_id,
					fund_id: fund_id.to_string(),
					remaining_units: u.remaining_units,
					timestamp: now,
				}));
			self.publish_committed(committed);

			if summary.resolved_count > 0 || summary.unresolved_count > 0 {
				info!(
					target: "market_maker",
					fund_id,
					resolved = summary.resolved_count,
					unresolved = summary.unresolved_count,
					units = %summary.units_resolved,
					"Market-maker cycle committed"
				);
			}
			Ok(summary)
		})
	}

	/// Run the market maker over every fund
	pub fn resolve_market_maker_all(&self) -> MarketMakerSummary {
		let mut summary = MarketMakerSummary::default();
		for (fund_id, _) in self.all_slots() {
			match self.resolve_market_maker(&fund_id) {
				Ok(fund_summary) => summary.merge(fund_summary),
				Err(e) => error!(
					target: "market_maker",
					fund_id = %fund_id,
					error = %e,
					"Market-maker cycle failed"
				),
			}
		}
		summary
	}

	/// Read-only view of one fund's book
	pub fn get_order_book_snapshot(&self, fund_id: &str) -> Result<OrderBookSnapshot, MatchingError> {
		let Some(slot) = self.slot_if_known(fund_id)? else {
			return Ok(OrderBookSnapshot {
				fund_id: fund_id.to_string(),
				..OrderBookSnapshot::default()
			});
		};
		let mut state = lock(&slot.state);
		self.apply_cancellations(&slot, &mut state);
		let book = &state.orderbook;

		let cloned = |side| -> Vec<Order> { book.side_orders(side).into_iter().cloned().collect() };
		Ok(OrderBookSnapshot {
			fund_id: fund_id.to_string(),
			buy_orders: cloned(Side::Buy),
			sell_orders: cloned(Side::Sell),
			partially_matched_orders: book
				.scoped_view()
				.into_iter()
				.filter(|order| order.status == OrderStatus::PartiallyMatched)
				.collect(),
		})
	}

	/// Current state of an active or archived order
	pub fn order(&self, order_id: &str) -> Option<Order> {
		let fund_id = self
			.active_orders
			.get(order_id)
			.map(|entry| entry.value().clone());

		if let Some(fund_id) = fund_id
			&& let Ok(slot) = self.slot(&fund_id)
			&& let Some(order) = lock(&slot.state).orderbook.get(order_id).cloned()
		{
			return Some(order);
		}
		lock(&self.ledger).archived(order_id)
	}

	pub fn fund_phase(&self, fund_id: &str) -> Option<FundPhase> {
		self.slots.get(fund_id).map(|slot| slot.phase())
	}

	pub fn pass_stats(&self, fund_id: &str) -> Option<FundPassStats> {
		let slot = self.slots.get(fund_id).map(|slot| Arc::clone(slot.value()))?;
		let stats = lock(&slot.state).stats();
		Some(stats)
	}

	/// Subscribe to committed engine events
	pub fn subscribe(&self) -> EventSubscriber {
		self.bus.subscribe()
	}

	pub fn pairs_for_order(&self, order_id: &str) -> Vec<MatchedOrderPair> {
		lock(&self.ledger).pairs_for_order(order_id)
	}

	pub fn pairs_for_fund(&self, fund_id: &str) -> Vec<MatchedOrderPair> {
		lock(&self.ledger).pairs_for_fund(fund_id)
	}

	/// Settlement hook: escalate a pair from confirmed to done
	pub fn mark_pair_done(&self, pair_id: u64) -> Result<(), MatchingError> {
		lock(&self.ledger)
			.mark_done(pair_id)
			.map_err(|e| MatchingError::InvalidState {
				order_id: String::new(),
				reason: e.to_string(),
			})
	}

	fn match_fund(&self, fund_id: &str, slot: &FundSlot) -> Result<MatchSummary, MatchingError> {
		self.with_retries(fund_id, slot, |state, now| {
			let staged =
				MatchEngine::run_pass(&state.orderbook, &self.cancellations, now, self.verbose)?;
			let committed = self.commit_staged(slot, state, staged, now)?;
			let summary = committed.summary.clone();
			self.publish_committed(committed);

			if summary.pairs_created > 0 {
				debug!(
					target: "engine",
					fund_id,
					pairs = summary.pairs_created,
					units = %summary.units_matched,
					"Pass committed"
				);
			}
			Ok(summary)
		})
	}

	/// Run `attempt` under the fund lock, retrying after concurrent cancellations
	fn with_retries<R>(
		&self,
		fund_id: &str,
		slot: &FundSlot,
		mut attempt: impl FnMut(&mut FundBookState, u64) -> Result<R, MatchingError>,
	) -> Result<R, MatchingError> {
		let mut retries = 0;
		loop {
			let mut state = lock(&slot.state);
			let _phase = PhaseGuard::enter(&slot.matching);
			self.apply_cancellations(slot, &mut state);

			let now = self.clock.now_millis();
			match attempt(&mut state, now) {
				Ok(result) => {
					state.record_commit(now);
					// Requests that arrived mid-pass for orders it never touched
					self.apply_cancellations(slot, &mut state);
					return Ok(result);
				}
				Err(MatchingError::ConcurrentModification(order_id))
					if retries < self.max_pass_retries =>
				{
					state.record_abort();
					retries += 1;
					warn!(
						target: "service",
						fund_id,
						order_id = %order_id,
						retry = retries,
						"Pass aborted by concurrent cancellation, retrying"
					);
				}
				Err(e) => {
					state.record_abort();
					return Err(e);
				}
			}
		}
	}

	/// Make a staged pass visible, unless a cancellation reached one of
	/// its orders first
	fn commit_staged(
		&self,
		slot: &FundSlot,
		state: &mut FundBookState,
		staged: StagedPass,
		now: u64,
	) -> Result<CommittedPass, MatchingError> {
		let _gate = lock(&slot.commit_gate);
		staged.verify_untouched(&self.cancellations)?;

		let committed = {
			let mut ledger = lock(&self.ledger);
			staged.commit(&mut state.orderbook, &mut **ledger, now)?
		};
		for order_id in &committed.completed {
			self.active_orders.remove(order_id);
		}
		Ok(committed)
	}

	/// Apply every pending cancellation for the fund held by `state`
	fn apply_cancellations(&self, slot: &FundSlot, state: &mut FundBookState) {
		let fund_id = state.orderbook.fund_id().to_string();
		let _gate = lock(&slot.commit_gate);
		let pending = self.cancellations.take_for_fund(&fund_id);
		if pending.is_empty() {
			return;
		}

		let now = self.clock.now_millis();
		let mut events = Vec::with_capacity(pending.len());
		let mut ledger = lock(&self.ledger);
		for order_id in pending {
			let Some(mut order) = state.orderbook.remove(&order_id) else {
				continue;
			};
			order.status = OrderStatus::Cancelled;
			self.active_orders.remove(&order_id);

			events.push(MatchingEvent::OrderCancelled {
				seq: 0,
				order_id: order.order_id.clone(),
				fund_id: fund_id.clone(),
				remaining_units: order.remaining_units(),
				timestamp: now,
			});
			info!(
				target: "service",
				order_id = %order.order_id,
				fund_id = %fund_id,
				"Order cancelled"
			);
			ledger.archive(order);
		}
		drop(ledger);

		self.bus.publish(events);
	}

	fn publish_committed(&self, committed: CommittedPass) {
		self.bus.publish(committed.events);
	}

	fn slot(&self, fund_id: &str) -> Result<Arc<FundSlot>, MatchingError> {
		self.slots
			.get(fund_id)
			.map(|slot| Arc::clone(slot.value()))
			.ok_or_else(|| MatchingError::FundNotFound(fund_id.to_string()))
	}

	/// Slot of a fund with a book, `None` for a known fund without one
	fn slot_if_known(&self, fund_id: &str) -> Result<Option<Arc<FundSlot>>, MatchingError> {
		match self.slot(fund_id) {
			Ok(slot) => Ok(Some(slot)),
			Err(_) if self.directory.fund(fund_id).is_some() => Ok(None),
			Err(e) => Err(e),
		}
	}

	fn slot_or_create(&self, fund_id: &str) -> Arc<FundSlot> {
		let entry = self
			.slots
			.entry(fund_id.to_string())
			.or_insert_with(|| Arc::new(FundSlot::new(fund_id)));
		Arc::clone(entry.value())
	}

	/// Snapshot of every fund slot, sorted by fund id
	fn all_slots(&self) -> Vec<(String, Arc<FundSlot>)> {
		let mut slots: Vec<(String, Arc<FundSlot>)> = self
			.slots
			.iter()
			.map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
			.collect();
		slots.sort_by(|a, b| a.0.cmp(&b.0));
		slots
	}
}
