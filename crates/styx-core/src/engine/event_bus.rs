//! Broadcast channel for engine events.

use styx_types::SwapEvent;
use tokio::sync::broadcast;

/// Fan-out of [`SwapEvent`]s to any number of subscribers.
///
/// Publishing never blocks; slow subscribers lag and miss events rather than
/// stalling the engine.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<SwapEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
		self.sender.subscribe()
	}

	/// Publishes `event`. Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: SwapEvent,
	) -> Result<(), broadcast::error::SendError<SwapEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::Address;

	#[tokio::test]
	async fn test_subscribers_receive_events() {
		let bus = EventBus::new(4);
		let mut first = bus.subscribe();
		let mut second = bus.subscribe();

		bus.publish(SwapEvent::Aborted {
			caller: Address::ZERO,
			code: "zero_amount".into(),
			reason: "Zero amount".into(),
		})
		.unwrap();

		for rx in [&mut first, &mut second] {
			match rx.recv().await.unwrap() {
				SwapEvent::Aborted { code, .. } => assert_eq!(code, "zero_amount"),
				other => panic!("unexpected event {:?}", other),
			}
		}
	}

	#[test]
	fn test_publish_without_subscribers_fails() {
		let bus = EventBus::new(1);
		assert!(bus
			.publish(SwapEvent::Aborted {
				caller: Address::ZERO,
				code: "reentrancy".into(),
				reason: String::new(),
			})
			.is_err());
	}
}
