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
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

/// Source of wall-clock time for order timestamps and order ageing
pub trait Clock: Send + Sync {
	/// Milliseconds since the Unix epoch
	fn now_millis(&self) -> u64;
}

/// Clock backed by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now_millis(&self) -> u64 {
		SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_millis() as u64)
			.unwrap_or_default()
	}
}

/// Manually advanced clock for deterministic tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
	now: AtomicU64,
}

impl ManualClock {
	pub fn new(start_millis: u64) -> Self {
		Self {
			now: AtomicU64::new(start_millis),
		}
	}

	pub fn advance(&self, millis: u64) {
		self.now.fetch_add(millis, Ordering::SeqCst);
	}

	pub fn set(&self, millis: u64) {
		self.now.store(millis, Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now_millis(&self) -> u64 {
		self.now.load(Ordering::SeqCst)
	}
}
