//! Journaled chain state for the Styx settlement system.
//!
//! The ledger holds token balances, native balances, allowances and the
//! unordered nonce bitmaps used by signature transfers. Every write is a
//! slot update; while a checkpoint is open each update records the previous
//! value so the whole invocation can be rolled back.

use alloy_primitives::{Address, U256};
use std::collections::{BTreeMap, HashMap};
use styx_types::NATIVE_ASSET;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
	#[error("Insufficient balance of {token} for {holder}: have {available}, need {required}")]
	InsufficientBalance {
		token: Address,
		holder: Address,
		available: U256,
		required: U256,
	},
	#[error("Insufficient allowance of {token} from {owner} to {spender}: have {available}, need {required}")]
	InsufficientAllowance {
		token: Address,
		owner: Address,
		spender: Address,
		available: U256,
		required: U256,
	},
	#[error("Balance overflow")]
	Overflow,
	#[error("Nonce {nonce} already used by {owner}")]
	NonceUsed { owner: Address, nonce: u64 },
}

/// A single storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
	Balance { token: Address, holder: Address },
	Native(Address),
	Allowance {
		token: Address,
		owner: Address,
		spender: Address,
	},
	NonceWord { owner: Address, word: u64 },
}

/// Every non-zero slot, ordered. Two snapshots are equal iff the ledgers
/// hold the same state.
pub type LedgerSnapshot = BTreeMap<Slot, U256>;

/// Handle for an open checkpoint. Consumed by [`Ledger::revert_to`] or
/// [`Ledger::commit`].
#[derive(Debug)]
#[must_use = "an open checkpoint keeps journaling until committed or reverted"]
pub struct Checkpoint {
	journal_len: usize,
	depth: usize,
}

#[derive(Default)]
struct State {
	slots: HashMap<Slot, U256>,
	journal: Vec<(Slot, Option<U256>)>,
	depth: usize,
}

impl State {
	fn get(&self, slot: &Slot) -> U256 {
		self.slots.get(slot).copied().unwrap_or(U256::ZERO)
	}

	fn set(&mut self, slot: Slot, value: U256) {
		let previous = if value.is_zero() {
			self.slots.remove(&slot)
		} else {
			self.slots.insert(slot, value)
		};
		if self.depth > 0 {
			self.journal.push((slot, previous));
		}
	}

	fn move_value(
		&mut self,
		from: Slot,
		to: Slot,
		amount: U256,
		token: Address,
		holder: Address,
	) -> Result<(), LedgerError> {
		let available = self.get(&from);
		let debited = available
			.checked_sub(amount)
			.ok_or(LedgerError::InsufficientBalance {
				token,
				holder,
				available,
				required: amount,
			})?;
		if from == to {
			return Ok(());
		}
		let credited = self
			.get(&to)
			.checked_add(amount)
			.ok_or(LedgerError::Overflow)?;
		self.set(from, debited);
		self.set(to, credited);
		Ok(())
	}

	fn credit(&mut self, slot: Slot, amount: U256) -> Result<(), LedgerError> {
		let value = self
			.get(&slot)
			.checked_add(amount)
			.ok_or(LedgerError::Overflow)?;
		self.set(slot, value);
		Ok(())
	}
}

/// Shared, journaled chain state.
pub struct Ledger {
	wrapped_native: Address,
	state: RwLock<State>,
}

impl Ledger {
	/// Creates an empty ledger. `wrapped_native` is the ERC-20 token that
	/// [`deposit`](Self::deposit) and [`withdraw`](Self::withdraw) convert to.
	pub fn new(wrapped_native: Address) -> Self {
		Self {
			wrapped_native,
			state: RwLock::new(State::default()),
		}
	}

	pub fn wrapped_native(&self) -> Address {
		self.wrapped_native
	}

	pub async fn balance_of(&self, token: Address, holder: Address) -> U256 {
		self.state
			.read()
			.await
			.get(&Slot::Balance { token, holder })
	}

	pub async fn native_balance(&self, holder: Address) -> U256 {
		self.state.read().await.get(&Slot::Native(holder))
	}

	pub async fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
		self.state.read().await.get(&Slot::Allowance {
			token,
			owner,
			spender,
		})
	}

	pub async fn mint(&self, token: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
		tracing::debug!(%token, %to, %amount, "Minting tokens");
		self.state
			.write()
			.await
			.credit(Slot::Balance { token, holder: to }, amount)
	}

	pub async fn mint_native(&self, to: Address, amount: U256) -> Result<(), LedgerError> {
		tracing::debug!(%to, %amount, "Minting native");
		self.state.write().await.credit(Slot::Native(to), amount)
	}

	pub async fn transfer(
		&self,
		token: Address,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<(), LedgerError> {
		tracing::trace!(%token, %from, %to, %amount, "Transfer");
		self.state.write().await.move_value(
			Slot::Balance {
				token,
				holder: from,
			},
			Slot::Balance { token, holder: to },
			amount,
			token,
			from,
		)
	}

	pub async fn transfer_native(
		&self,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<(), LedgerError> {
		tracing::trace!(%from, %to, %amount, "Native transfer");
		self.state.write().await.move_value(
			Slot::Native(from),
			Slot::Native(to),
			amount,
			NATIVE_ASSET,
			from,
		)
	}

	/// Sets the allowance; zero clears it.
	pub async fn approve(&self, token: Address, owner: Address, spender: Address, amount: U256) {
		self.state.write().await.set(
			Slot::Allowance {
				token,
				owner,
				spender,
			},
			amount,
		);
	}

	/// Moves `amount` from `from` to `to` on behalf of `spender`. An allowance
	/// of `U256::MAX` is never decreased.
	pub async fn transfer_from(
		&self,
		token: Address,
		spender: Address,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<(), LedgerError> {
		let mut state = self.state.write().await;
		let slot = Slot::Allowance {
			token,
			owner: from,
			spender,
		};
		let available = state.get(&slot);
		if available < amount {
			return Err(LedgerError::InsufficientAllowance {
				token,
				owner: from,
				spender,
				available,
				required: amount,
			});
		}
		state.move_value(
			Slot::Balance {
				token,
				holder: from,
			},
			Slot::Balance { token, holder: to },
			amount,
			token,
			from,
		)?;
		if available != U256::MAX {
			state.set(slot, available - amount);
		}
		Ok(())
	}

	/// Converts `amount` of `holder`'s native balance into wrapped native.
	pub async fn deposit(&self, holder: Address, amount: U256) -> Result<(), LedgerError> {
		let token = self.wrapped_native;
		self.state.write().await.move_value(
			Slot::Native(holder),
			Slot::Balance { token, holder },
			amount,
			NATIVE_ASSET,
			holder,
		)
	}

	/// Converts `amount` of `holder`'s wrapped native back into native.
	pub async fn withdraw(&self, holder: Address, amount: U256) -> Result<(), LedgerError> {
		let token = self.wrapped_native;
		self.state.write().await.move_value(
			Slot::Balance { token, holder },
			Slot::Native(holder),
			amount,
			token,
			holder,
		)
	}

	/// Returns word `word` of `owner`'s unordered nonce bitmap.
	pub async fn nonce_bitmap(&self, owner: Address, word: u64) -> U256 {
		self.state.read().await.get(&Slot::NonceWord { owner, word })
	}

	/// Marks `nonce` used: bit `nonce & 0xff` of word `nonce >> 8`.
	pub async fn use_nonce(&self, owner: Address, nonce: u64) -> Result<(), LedgerError> {
		let slot = Slot::NonceWord {
			owner,
			word: nonce >> 8,
		};
		let bit = U256::from(1u8) << (nonce & 0xff) as usize;
		let mut state = self.state.write().await;
		let bitmap = state.get(&slot);
		if bitmap & bit != U256::ZERO {
			return Err(LedgerError::NonceUsed { owner, nonce });
		}
		state.set(slot, bitmap | bit);
		Ok(())
	}

	/// Opens a checkpoint. Checkpoints nest.
	pub async fn checkpoint(&self) -> Checkpoint {
		let mut state = self.state.write().await;
		state.depth += 1;
		Checkpoint {
			journal_len: state.journal.len(),
			depth: state.depth,
		}
	}

	/// Undoes every write made since `checkpoint` was opened.
	pub async fn revert_to(&self, checkpoint: Checkpoint) {
		let mut state = self.state.write().await;
		let mut undone = 0usize;
		while state.journal.len() > checkpoint.journal_len {
			let Some((slot, previous)) = state.journal.pop() else {
				break;
			};
			match previous {
				Some(value) => state.slots.insert(slot, value),
				None => state.slots.remove(&slot),
			};
			undone += 1;
		}
		state.depth = checkpoint.depth - 1;
		if state.depth == 0 {
			state.journal.clear();
		}
		tracing::debug!(undone, "Reverted ledger to checkpoint");
	}

	/// Keeps the writes made since `checkpoint`. They are still undone if an
	/// enclosing checkpoint is reverted.
	pub async fn commit(&self, checkpoint: Checkpoint) {
		let mut state = self.state.write().await;
		state.depth = checkpoint.depth - 1;
		if state.depth == 0 {
			state.journal.clear();
		}
	}

	pub async fn snapshot(&self) -> LedgerSnapshot {
		self.state
			.read()
			.await
			.slots
			.iter()
			.map(|(slot, value)| (*slot, *value))
			.collect()
	}
}
