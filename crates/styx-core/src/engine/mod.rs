//! Swap execution engine.
//!
//! One invocation runs decode, authorize, pull, fee, dispatch, slippage check
//! and settle in a single pass under the sequencer lock. A ledger checkpoint
//! is opened on entry; it is committed when the output reaches the
//! beneficiary and reverted on any rejection or cancellation.

mod context;
pub mod event_bus;
mod invocation;
pub mod math;

use crate::SwapError;
use alloy_primitives::{Address, Bytes, U256};
use context::SwapContext;
use event_bus::EventBus;
use invocation::{Invocation, VenueWindow};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use styx_adapters::{SwapRequest, VenueService};
use styx_codec::{compress, decode, uncompress, CompressedAmount, Instruction, InstructionKind};
use styx_ledger::Ledger;
use styx_permit::{PullRequest, SignedTransferOrder, TokenPermissions, TransferAuthority};
use styx_registry::{AddressTable, PermissionRegistry};
use styx_storage::StorageService;
use styx_types::{AddressIndex, SettlementRecord, SwapEvent, Venue, NATIVE_ASSET};
use tokio::sync::{broadcast, Mutex};
use tracing::instrument;

tokio::task_local! {
	/// Set while an invocation is running on the current task.
	static EXECUTING: ();
}

/// One invocation of the engine.
#[derive(Debug, Clone)]
pub struct Call {
	pub caller: Address,
	/// Native value attached to the call.
	pub value: U256,
	/// Unix time in seconds the call executes at.
	pub timestamp: u64,
	pub data: Bytes,
}

/// Adapter output for an input amount a signer can actually express.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
	/// Requested input rounded down to the nearest compressible value.
	pub amount_in: U256,
	pub compressed_amount_in: CompressedAmount,
	pub amount_out: U256,
}

pub struct SwapEngine {
	/// Account holding funds in flight and retained fees.
	address: Address,
	ledger: Arc<Ledger>,
	tokens: Arc<dyn AddressTable>,
	permissions: Arc<dyn PermissionRegistry>,
	authority: Arc<dyn TransferAuthority>,
	venues: Arc<VenueService>,
	storage: Arc<StorageService>,
	event_bus: EventBus,
	sequencer: Arc<Mutex<()>>,
	/// Set while venue code runs.
	in_venue: AtomicBool,
}

impl SwapEngine {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		address: Address,
		ledger: Arc<Ledger>,
		tokens: Arc<dyn AddressTable>,
		permissions: Arc<dyn PermissionRegistry>,
		authority: Arc<dyn TransferAuthority>,
		venues: Arc<VenueService>,
		storage: Arc<StorageService>,
		event_bus: EventBus,
	) -> Self {
		Self {
			address,
			ledger,
			tokens,
			permissions,
			authority,
			venues,
			storage,
			event_bus,
			sequencer: Arc::new(Mutex::new(())),
			in_venue: AtomicBool::new(false),
		}
	}

	pub fn address(&self) -> Address {
		self.address
	}

	pub fn ledger(&self) -> &Arc<Ledger> {
		&self.ledger
	}

	pub fn tokens(&self) -> &Arc<dyn AddressTable> {
		&self.tokens
	}

	pub fn authority(&self) -> &Arc<dyn TransferAuthority> {
		&self.authority
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
		self.event_bus.subscribe()
	}

	/// Executes one instruction.
	///
	/// Calls made while a venue is running, whether from the invocation's own
	/// task or from any other, fail with [`SwapError::Reentrancy`] without
	/// touching any state. Other concurrent calls wait their turn.
	///
	/// Dropping the returned future before it completes reverts everything
	/// the invocation wrote.
	#[instrument(skip_all, fields(caller = %call.caller, len = call.data.len()))]
	pub async fn execute(&self, call: Call) -> Result<SettlementRecord, SwapError> {
		if EXECUTING.try_with(|_| ()).is_ok() || self.in_venue.load(Ordering::Acquire) {
			tracing::warn!("Rejected re-entrant call");
			return Err(SwapError::Reentrancy);
		}
		EXECUTING.scope((), self.execute_sequenced(call)).await
	}

	async fn execute_sequenced(&self, call: Call) -> Result<SettlementRecord, SwapError> {
		let turn = self.sequencer.clone().lock_owned().await;
		let invocation = Invocation::open(self.ledger.clone(), turn).await;

		match self.run(&call).await {
			Ok(record) => {
				invocation.commit().await;
				tracing::info!(
					token_in = %record.token_in,
					token_out = %record.token_out,
					amount_in = %record.amount_in,
					amount_out = %record.actual_amount_out,
					beneficiary = %record.beneficiary,
					"Settled"
				);
				self.event_bus.publish(SwapEvent::Settled(record.clone())).ok();
				Ok(record)
			},
			Err(error) => {
				invocation.revert().await;
				tracing::warn!(code = error.code(), error = %error, "Aborted");
				self.event_bus
					.publish(SwapEvent::Aborted {
						caller: call.caller,
						code: error.code().to_string(),
						reason: error.to_string(),
					})
					.ok();
				Err(error)
			},
		}
	}

	async fn run(&self, call: &Call) -> Result<SettlementRecord, SwapError> {
		let instruction = decode(&call.data)?;
		self.authorize(call, &instruction).await?;
		let context = self.resolve(instruction).await?;

		let amount_in = self.pull_funds(call, &context).await?;
		let (fee, swap_amount) = math::split_fee(amount_in, context.instruction.fee_bps);
		tracing::debug!(%amount_in, %fee, %swap_amount, "Charged fee");

		let actual = self.dispatch(&context, swap_amount).await?;
		let minimum = math::min_amount_out(context.requested_out, context.instruction.slippage_tier);
		if actual < minimum {
			return Err(SwapError::SlippageExceeded { actual, minimum });
		}

		self.settle(&context, actual).await?;
		Ok(SettlementRecord {
			amount_in,
			requested_amount_out: context.requested_out,
			actual_amount_out: actual,
			token_in: context.token_in,
			token_out: context.token_out,
			beneficiary: context.beneficiary(),
		})
	}

	async fn authorize(&self, call: &Call, instruction: &Instruction) -> Result<(), SwapError> {
		if instruction.mode().is_relayed() {
			if !self.permissions.is_keeper(call.caller).await {
				return Err(SwapError::UnauthorizedKeeper(call.caller));
			}
			if !call.value.is_zero() {
				return Err(SwapError::UnexpectedValue(call.value));
			}
		} else if call.value.is_zero() {
			return Err(SwapError::ZeroAmount);
		}
		Ok(())
	}

	async fn resolve(&self, instruction: Instruction) -> Result<SwapContext, SwapError> {
		let token_in = self.address_of(instruction.token_in).await?;
		let token_out = self.address_of(instruction.token_out).await?;
		if matches!(instruction.kind, InstructionKind::NativeIn)
			&& token_in != NATIVE_ASSET
			&& token_in != self.ledger.wrapped_native()
		{
			return Err(SwapError::NativeTokenMismatch(token_in));
		}
		Ok(SwapContext::new(
			instruction,
			token_in,
			token_out,
			self.ledger.wrapped_native(),
		))
	}

	async fn address_of(&self, index: AddressIndex) -> Result<Address, SwapError> {
		self.tokens
			.address_of(index)
			.await
			.map_err(|_| SwapError::UnknownIndex(index))
	}

	/// Moves the input onto the engine account and returns the gross amount.
	async fn pull_funds(&self, call: &Call, context: &SwapContext) -> Result<U256, SwapError> {
		match context.instruction.kind {
			InstructionKind::Explicit {
				amount_in,
				nonce,
				deadline,
				signature,
			} => {
				let amount = uncompress(amount_in);
				if amount.is_zero() {
					return Err(SwapError::ZeroAmount);
				}
				self.pull_signed(call, context, amount, nonce, deadline, signature)
					.await
			},
			InstructionKind::BalanceOf {
				nonce,
				deadline,
				signature,
			} => {
				let balance = self
					.ledger
					.balance_of(context.token_in, context.beneficiary())
					.await;
				if balance.is_zero() {
					return Err(SwapError::BalanceMismatch {
						balance,
						pulled: U256::ZERO,
					});
				}
				let before = self.ledger.balance_of(context.token_in, self.address).await;
				self.pull_signed(call, context, balance, nonce, deadline, signature)
					.await?;
				let after = self.ledger.balance_of(context.token_in, self.address).await;
				let pulled = after.saturating_sub(before);
				if pulled != balance {
					return Err(SwapError::BalanceMismatch { balance, pulled });
				}
				Ok(balance)
			},
			InstructionKind::NativeIn => {
				self.ledger
					.transfer_native(call.caller, self.address, call.value)
					.await?;
				self.ledger.deposit(self.address, call.value).await?;
				Ok(call.value)
			},
		}
	}

	async fn pull_signed(
		&self,
		call: &Call,
		context: &SwapContext,
		amount: U256,
		nonce: u64,
		deadline: u32,
		signature: styx_codec::CompactSignature,
	) -> Result<U256, SwapError> {
		let request = PullRequest {
			order: SignedTransferOrder {
				permitted: TokenPermissions {
					token: context.token_in,
					amount,
				},
				spender: self.address,
				nonce,
				deadline: deadline.into(),
			},
			witness: context.witness()?,
			owner: context.beneficiary(),
			signature,
			recipient: self.address,
			now: call.timestamp,
		};
		let pulled = self.authority.pull(&request).await?;
		Ok(pulled.amount)
	}

	/// Runs the venue and returns the engine's gain in the output token.
	async fn dispatch(&self, context: &SwapContext, amount: U256) -> Result<U256, SwapError> {
		let token_in = context.venue_token_in();
		let token_out = context.venue_token_out();
		let venue = context.instruction.venue;

		let before = match venue {
			Venue::Adapter(id) => {
				let registration = self
					.permissions
					.adapter_for(id)
					.await
					.ok_or_else(|| SwapError::UnknownAdapter(venue.to_string()))?;
				let adapter = self
					.venues
					.adapter_at(registration.target, &registration.kind)
					.ok_or_else(|| {
						SwapError::UnknownAdapter(format!(
							"no {} adapter at {}",
							registration.kind, registration.target
						))
					})?;

				self.ledger
					.transfer(token_in, self.address, registration.target, amount)
					.await?;
				let before = self.ledger.balance_of(token_out, self.address).await;
				let _window = VenueWindow::open(&self.in_venue);
				let sent = adapter
					.swap(&SwapRequest {
						token_in,
						token_out,
						amount_in: amount,
						recipient: self.address,
						payload: context.instruction.payload.clone(),
					})
					.await?;
				tracing::debug!(%venue, target = %registration.target, %sent, "Adapter swapped");
				before
			},
			Venue::Aggregator(id) => {
				let target = self
					.permissions
					.aggregator_for(id)
					.await
					.ok_or_else(|| SwapError::UnknownAdapter(venue.to_string()))?;
				let aggregator = self.venues.aggregator_at(target).ok_or_else(|| {
					SwapError::UnknownAdapter(format!("no aggregator at {}", target))
				})?;

				// Output balance as it stands once the input has left.
				let mut before = self.ledger.balance_of(token_out, self.address).await;
				if token_out == token_in {
					before = before.saturating_sub(amount);
				}
				self.ledger
					.approve(token_in, self.address, target, amount)
					.await;
				let forwarded = {
					let _window = VenueWindow::open(&self.in_venue);
					aggregator
						.forward(self.address, &context.instruction.payload)
						.await
				};
				let unspent = self.ledger.allowance(token_in, self.address, target).await;
				self.ledger
					.approve(token_in, self.address, target, U256::ZERO)
					.await;
				forwarded?;
				// The unsigned payload must spend exactly the approved input.
				if !unspent.is_zero() {
					return Err(SwapError::VenueFailed(format!(
						"aggregator spent {} of {}",
						amount.saturating_sub(unspent),
						amount
					)));
				}
				tracing::debug!(%venue, %target, "Aggregator forwarded");
				before
			},
		};

		let after = self.ledger.balance_of(token_out, self.address).await;
		Ok(after.saturating_sub(before))
	}

	async fn settle(&self, context: &SwapContext, amount: U256) -> Result<(), SwapError> {
		let beneficiary = context.beneficiary();
		if context.pays_native() {
			self.ledger.withdraw(self.address, amount).await?;
			self.ledger
				.transfer_native(self.address, beneficiary, amount)
				.await?;
		} else {
			self.ledger
				.transfer(context.token_out, self.address, beneficiary, amount)
				.await?;
		}
		Ok(())
	}

	/// Quotes adapter `venue_id` for `amount_in` rounded to what the wire can
	/// carry.
	pub async fn quote(
		&self,
		venue_id: u8,
		token_in: Address,
		token_out: Address,
		amount_in: U256,
	) -> Result<Quote, SwapError> {
		let compressed_amount_in = compress(amount_in)?;
		let amount_in = uncompress(compressed_amount_in);

		let venue = Venue::from_byte(venue_id);
		let Venue::Adapter(id) = venue else {
			return Err(SwapError::UnknownAdapter(format!("{} cannot quote", venue)));
		};
		let registration = self
			.permissions
			.adapter_for(id)
			.await
			.ok_or_else(|| SwapError::UnknownAdapter(venue.to_string()))?;
		let adapter = self
			.venues
			.adapter_at(registration.target, &registration.kind)
			.ok_or_else(|| SwapError::UnknownAdapter(venue.to_string()))?;

		let wrapped = |token: Address| {
			if token == NATIVE_ASSET {
				self.ledger.wrapped_native()
			} else {
				token
			}
		};
		let amount_out = adapter
			.quote(wrapped(token_in), wrapped(token_out), amount_in)
			.await?;

		Ok(Quote {
			amount_in,
			compressed_amount_in,
			amount_out,
		})
	}
}
