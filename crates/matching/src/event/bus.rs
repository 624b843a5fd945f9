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

use std::sync::{Mutex, PoisonError};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use tracing::debug;

use super::{MatchingEvent, SequenceNumber};

struct BusState {
	subscribers: Vec<Sender<MatchingEvent>>,
	next_sequence: SequenceNumber,
}

/// Fan-out bus carrying committed engine events to subscribers
///
/// Properties:
/// - Multiple producers (fund passes on any thread)
/// - Multiple subscribers, each with its own unbounded channel
/// - Sequence numbers are stamped under the bus lock, so each
///   subscriber receives events in sequence order
/// - Subscribers that dropped their receiver are pruned on publish
pub struct EventBus {
	state: Mutex<BusState>,
}

impl EventBus {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(BusState {
				subscribers: Vec::new(),
				next_sequence: 1,
			}),
		}
	}

	/// Register a new subscriber; it receives events published from now on
	pub fn subscribe(&self) -> EventSubscriber {
		let (sender, receiver) = unbounded();
		self.state
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.subscribers
			.push(sender);
		EventSubscriber { receiver }
	}

	/// Stamp and deliver a batch of events
	///
	/// The `seq` carried by incoming events is ignored and replaced.
	/// Returns the sequence number of the last event, if any.
	pub fn publish(&self, events: Vec<MatchingEvent>) -> Option<SequenceNumber> {
		if events.is_empty() {
			return None;
		}

		let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		let mut last = None;

		for mut event in events {
			*event.sequence_mut() = state.next_sequence;
			last = Some(state.next_sequence);
			state.next_sequence += 1;

			state
				.subscribers
				.retain(|subscriber| subscriber.send(event.clone()).is_ok());
		}

		debug!(
			target: "events",
			last_seq = ?last,
			subscribers = state.subscribers.len(),
			"Published event batch"
		);

		last
	}

	pub fn subscriber_count(&self) -> usize {
		self.state
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.subscribers
			.len()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}

/// Receiving end of an event subscription
pub struct EventSubscriber {
	receiver: Receiver<MatchingEvent>,
}

impl EventSubscriber {
	/// Try to receive an event (non-blocking)
	pub fn try_recv(&self) -> Option<MatchingEvent> {
		match self.receiver.try_recv() {
			Ok(event) => Some(event),
			Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
		}
	}

	/// Wait up to `timeout` for the next event
	pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<MatchingEvent> {
		match self.receiver.recv_timeout(timeout) {
			Ok(event) => Some(event),
			Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
		}
	}

	/// Drain everything currently queued (non-blocking)
	pub fn drain(&self) -> Vec<MatchingEvent> {
		self.receiver.try_iter().collect()
	}
}
