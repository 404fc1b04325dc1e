//! Scoped state of one running invocation.
//!
//! An [`Invocation`] owns the sequencer turn and the ledger checkpoint. If the
//! future driving it is dropped before it is closed, the checkpoint is
//! reverted on a spawned task that keeps the turn until the ledger is restored,
//! so the next invocation never observes a half-applied one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use styx_ledger::{Checkpoint, Ledger};
use tokio::runtime::Handle;
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;

pub(super) struct Invocation {
	ledger: Arc<Ledger>,
	checkpoint: Option<Checkpoint>,
	turn: Option<OwnedMutexGuard<()>>,
}

impl Invocation {
	pub async fn open(ledger: Arc<Ledger>, turn: OwnedMutexGuard<()>) -> Self {
		let checkpoint = ledger.checkpoint().await;
		Self {
			ledger,
			checkpoint: Some(checkpoint),
			turn: Some(turn),
		}
	}

	/// Keeps every write made during the invocation.
	pub async fn commit(mut self) {
		self.close(true).await;
	}

	/// Undoes every write made during the invocation.
	pub async fn revert(mut self) {
		self.close(false).await;
	}

	async fn close(&mut self, keep: bool) {
		if let Some(task) = self.spawn_close(keep) {
			if let Err(e) = task.await {
				tracing::error!(error = %e, keep, "Closing checkpoint task failed");
			}
			return;
		}
		// No runtime to hand the work to; close inline.
		if let Some(checkpoint) = self.checkpoint.take() {
			if keep {
				self.ledger.commit(checkpoint).await;
			} else {
				self.ledger.revert_to(checkpoint).await;
			}
		}
		self.turn.take();
	}

	/// Closes the checkpoint on its own task so that dropping the caller
	/// midway cannot leave it open.
	fn spawn_close(&mut self, keep: bool) -> Option<JoinHandle<()>> {
		let handle = Handle::try_current().ok()?;
		let checkpoint = self.checkpoint.take()?;
		let ledger = self.ledger.clone();
		let turn = self.turn.take();
		Some(handle.spawn(async move {
			if keep {
				ledger.commit(checkpoint).await;
			} else {
				ledger.revert_to(checkpoint).await;
			}
			drop(turn);
		}))
	}
}

impl Drop for Invocation {
	fn drop(&mut self) {
		if self.checkpoint.is_none() {
			return;
		}
		tracing::warn!("Invocation cancelled, reverting");
		if self.spawn_close(false).is_none() {
			tracing::error!("No runtime to revert the cancelled invocation on");
		}
	}
}

/// Marks the engine as running venue code until dropped.
pub(super) struct VenueWindow<'a>(&'a AtomicBool);

impl<'a> VenueWindow<'a> {
	pub fn open(flag: &'a AtomicBool) -> Self {
		flag.store(true, Ordering::Release);
		Self(flag)
	}
}

impl Drop for VenueWindow<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}
