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
	io,
	sync::Arc,
	thread::{self, JoinHandle},
	time::Instant,
};

use ccq_sdk::types::{MarketMakerSummary, MatchSummary};
use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::{
	config::MatchingConfig,
	service::FundMatchingService,
	types::{FundScope, MatchingError},
};

/// Drives matching passes and market-maker sweeps
///
/// Two worker threads run independently:
/// - `match-tick`: a matching pass over every crossed book per tick
/// - `market-maker-sweep`: a market-maker cycle over every fund per tick
///
/// Ticks come from any `Receiver<Instant>`, normally
/// `crossbeam::channel::tick`. Operator triggers run on the caller's
/// thread and are serialized with the workers by the per-fund locks.
pub struct MatchScheduler {
	service: Arc<FundMatchingService>,
	shutdown_tx: Option<Sender<()>>,
	handles: Vec<JoinHandle<()>>,
}

impl MatchScheduler {
	/// Start both workers on the configured intervals
	pub fn start(service: Arc<FundMatchingService>, config: &MatchingConfig) -> io::Result<Self> {
		Self::start_with_tickers(
			service,
			channel::tick(config.match_interval()),
			channel::tick(config.market_maker_interval()),
		)
	}

	/// Start both workers on caller-supplied tick sources
	///
	/// A worker stops when its tick source disconnects or the scheduler
	/// shuts down.
	pub fn start_with_tickers(
		service: Arc<FundMatchingService>,
		match_ticks: Receiver<Instant>,
		market_maker_ticks: Receiver<Instant>,
	) -> io::Result<Self> {
		let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

		let match_service = Arc::clone(&service);
		let match_shutdown = shutdown_rx.clone();
		let match_handle = thread::Builder::new()
			.name("match-tick".to_string())
			.spawn(move || {
				info!(target: "scheduler", "Matching ticker started");
				run_loop(&match_ticks, &match_shutdown, || {
					match match_service.run_matching_pass(FundScope::All) {
						Ok(summary) if !summary.funds_failed.is_empty() => warn!(
							target: "scheduler",
							failed = ?summary.funds_failed,
							"Some funds failed this tick"
						),
						Ok(summary) => debug!(
							target: "scheduler",
							pairs = summary.pairs_created,
							"Matching tick done"
						),
						Err(e) => error!(target: "scheduler", error = %e, "Matching tick failed"),
					}
				});
				info!(target: "scheduler", "Matching ticker stopped");
			})?;

		let sweep_service = Arc::clone(&service);
		let sweep_handle = thread::Builder::new()
			.name("market-maker-sweep".to_string())
			.spawn(move || {
				info!(target: "scheduler", "Market-maker sweep started");
				run_loop(&market_maker_ticks, &shutdown_rx, || {
					let summary = sweep_service.resolve_market_maker_all();
					debug!(
						target: "scheduler",
						resolved = summary.resolved_count,
						unresolved = summary.unresolved_count,
						"Market-maker sweep done"
					);
				});
				info!(target: "scheduler", "Market-maker sweep stopped");
			})?;

		Ok(Self {
			service,
			shutdown_tx: Some(shutdown_tx),
			handles: vec![match_handle, sweep_handle],
		})
	}

	/// Run a matching pass now
	pub fn trigger(&self, scope: FundScope) -> Result<MatchSummary, MatchingError> {
		info!(target: "scheduler", scope = ?scope, "Manual matching trigger");
		self.service.run_matching_pass(scope)
	}

	/// Run a market-maker cycle now, for one fund or all of them
	pub fn trigger_market_maker(
		&self,
		fund_id: Option<&str>,
	) -> Result<MarketMakerSummary, MatchingError> {
		info!(target: "scheduler", fund_id = ?fund_id, "Manual market-maker trigger");
		match fund_id {
			Some(fund_id) => self.service.resolve_market_maker(fund_id),
			None => Ok(self.service.resolve_market_maker_all()),
		}
	}

	pub fn service(&self) -> &Arc<FundMatchingService> {
		&self.service
	}

	/// Stop both workers and wait for them to exit
	pub fn shutdown(mut self) {
		info!(target: "scheduler", "Shutting down scheduler");
		self.stop();
	}

	fn stop(&mut self) {
		// Dropping the sender disconnects every worker's shutdown receiver
		self.shutdown_tx.take();

		for handle in self.handles.drain(..) {
			if let Err(e) = handle.join() {
				warn!(target: "scheduler", error = ?e, "Scheduler thread panicked");
			}
		}
	}
}

impl Drop for MatchScheduler {
	fn drop(&mut self) {
		self.stop();
	}
}

fn run_loop(ticks: &Receiver<Instant>, shutdown: &Receiver<()>, mut on_tick: impl FnMut()) {
	loop {
		channel::select! {
			recv(ticks) -> tick => match tick {
				Ok(_) => on_tick(),
				Err(_) => break,
			},
			recv(shutdown) -> _ => break,
		}
	}
}
