use std::collections::HashMap;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::event::BusEvent;

/// Matches the ingress-egress tracker's broadcast buffer sizing: old events
/// are dropped for slow subscribers rather than growing the channel
/// unbounded.
const EVENT_BUFFER_SIZE: usize = 1024;

/// Single-node, topic-based fan-out. Not persistent - it is an optimization
/// over polling the Store, so a missed broadcast just means a subscriber
/// falls back to the latest-value cache or a direct Store read.
pub struct Bus {
	channels: RwLock<HashMap<String, broadcast::Sender<BusEvent>>>,
	latest: DashMap<String, BusEvent>,
}

impl Default for Bus {
	fn default() -> Self {
		Self::new()
	}
}

impl Bus {
	pub fn new() -> Self {
		Self { channels: RwLock::new(HashMap::new()), latest: DashMap::new() }
	}

	fn sender_for(&self, topic: &str) -> broadcast::Sender<BusEvent> {
		if let Some(sender) = self.channels.read().get(topic) {
			return sender.clone();
		}
		let mut channels = self.channels.write();
		channels.entry(topic.to_string()).or_insert_with(|| broadcast::channel(EVENT_BUFFER_SIZE).0).clone()
	}

	/// Publishes `event` to `topic`, updating the latest-value cache before
	/// the broadcast send so a subscriber that primes immediately after
	/// never observes a stale cache entry.
	pub fn publish(&self, topic: &str, event: BusEvent) {
		self.latest.insert(topic.to_string(), event.clone());
		// No receivers is not an error - publishing to an unwatched topic is normal.
		let _ = self.sender_for(topic).send(event);
	}

	pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusEvent> {
		self.sender_for(topic).subscribe()
	}

	/// Subscribes and returns the last published event on `topic` (if any)
	/// in the same call, so a late subscriber can be primed with current
	/// state before live events arrive.
	pub fn subscribe_primed(&self, topic: &str) -> (Option<BusEvent>, broadcast::Receiver<BusEvent>) {
		let receiver = self.subscribe(topic);
		let current = self.latest.get(topic).map(|e| e.value().clone());
		(current, receiver)
	}

	pub fn latest(&self, topic: &str) -> Option<BusEvent> {
		self.latest.get(topic).map(|e| e.value().clone())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::{EntityRef, ProgressData};

	fn sample_event() -> BusEvent {
		BusEvent::progress(
			"scan:progress",
			EntityRef::Scan("scan-1"),
			ProgressData { current_step: "COMPILE".into(), state: "RUNNING".into(), progress: 40, message: "compiling".into() },
		)
	}

	#[test]
	fn late_subscriber_is_primed_with_latest_value() {
		let bus = Bus::new();
		bus.publish("scan:scan-1:progress", sample_event());

		let (current, _rx) = bus.subscribe_primed("scan:scan-1:progress");
		assert!(current.is_some());
		assert_eq!(current.unwrap().event_type, "scan:progress");
	}

	#[tokio::test]
	async fn subscribers_receive_live_events() {
		let bus = Bus::new();
		let mut rx = bus.subscribe("scan:scan-2:progress");
		bus.publish("scan:scan-2:progress", sample_event());
		let received = rx.recv().await.unwrap();
		assert_eq!(received.scan_id.as_deref(), Some("scan-1"));
	}

	#[test]
	fn publishing_to_an_unwatched_topic_does_not_panic() {
		let bus = Bus::new();
		bus.publish("scan:orphan:progress", sample_event());
		assert!(bus.latest("scan:orphan:progress").is_some());
	}
}
