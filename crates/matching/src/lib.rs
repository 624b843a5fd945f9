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

//! CCQ Matching Engine
//!
//! This crate matches buy and sell orders for fund certificate units.
//! It keeps one in-memory order book per fund, applies price-time
//! priority, tracks partial fills and closes out aged residual orders
//! against a market-maker account inside a NAV tolerance band.
//!
//! Architecture:
//! - One book per fund behind its own lock (single writer per fund)
//! - Staged passes: fills become visible only when a pass commits
//! - Append-only ledger of matched pairs
//! - Event bus feeding committed events to presentation layers
//! - Scheduler threads for periodic matching and market-maker sweeps

pub mod clock;
pub mod config;
pub mod engine;
pub mod event;
pub mod fill;
pub mod fund;
pub mod ledger;
pub mod logging;
pub mod market_maker;
pub mod orderbook;
pub mod scheduler;
pub mod service;
pub mod types;

pub use ccq_sdk::types::{
	MarketMakerSummary, MatchSummary, OrderStatus, PairSource, PairStatus, Side,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{CancellationRegistry, CommittedPass, FundPassStats, MatchEngine, StagedPass};
pub use event::{EventBus, EventSubscriber, MatchingEvent};
pub use fill::{FillOutcome, PartialFillTracker};
pub use fund::{FundDirectory, MemoryFundDirectory};
pub use ledger::{MatchedOrderLedger, MemoryMatchedOrderLedger, PairDraft};
pub use market_maker::{MarketMakerConfig, MarketMakerResolver, NavBand};
pub use orderbook::OrderBook;
pub use scheduler::MatchScheduler;
pub use service::FundMatchingService;
pub use types::*;
