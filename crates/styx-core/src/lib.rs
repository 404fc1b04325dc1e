//! Core swap engine for the Styx settlement system.
//!
//! The engine takes one compact instruction per invocation and either
//! settles it completely or rejects it with every effect rolled back. It
//! coordinates the codec, the address table, the permission registry, the
//! signature-transfer authority and the venues, and publishes one
//! [`SwapEvent`](styx_types::SwapEvent) per invocation on its event bus.

pub mod builder;
pub mod engine;

pub use builder::{BuilderError, StyxFactories, SwapEngineBuilder};
pub use engine::event_bus::EventBus;
pub use engine::{Call, Quote, SwapEngine};

use alloy_primitives::{Address, U256};
use styx_adapters::AdapterError;
use styx_codec::{CodecError, CompressError};
use styx_ledger::LedgerError;
use styx_permit::PermitError;
use styx_types::AddressIndex;
use thiserror::Error;

/// Reasons an invocation is rejected.
///
/// Every variant is a total abort: the ledger is back at its state before
/// the invocation when the error is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SwapError {
	#[error("Decode error: {0}")]
	Decode(#[from] CodecError),
	#[error("Amount too large to compress: {0}")]
	AmountTooLarge(U256),
	#[error("Unknown address: {0}")]
	UnknownAddress(Address),
	#[error("Unknown token index: {0}")]
	UnknownIndex(AddressIndex),
	#[error("Deadline {deadline} expired at {now}")]
	DeadlineExpired { deadline: u64, now: u64 },
	#[error("Nonce {nonce} already used by {owner}")]
	NonceReused { owner: Address, nonce: u64 },
	#[error("Invalid signature: {0}")]
	SignatureInvalid(String),
	#[error("Caller {0} is not a keeper")]
	UnauthorizedKeeper(Address),
	#[error("Unknown adapter: {0}")]
	UnknownAdapter(String),
	#[error("Balance mismatch: balance {balance}, pulled {pulled}")]
	BalanceMismatch { balance: U256, pulled: U256 },
	#[error("Slippage exceeded: got {actual}, minimum {minimum}")]
	SlippageExceeded { actual: U256, minimum: U256 },
	#[error("Transfer failed: {0}")]
	TransferFailed(String),
	#[error("Venue failed: {0}")]
	VenueFailed(String),
	#[error("Re-entrant call rejected")]
	Reentrancy,
	#[error("Unexpected value {0} attached to a relayed instruction")]
	UnexpectedValue(U256),
	#[error("Zero amount")]
	ZeroAmount,
	#[error("Input token {0} is not native")]
	NativeTokenMismatch(Address),
}

impl SwapError {
	/// Stable identifier reported to API clients and in abort events.
	pub fn code(&self) -> &'static str {
		match self {
			SwapError::Decode(_) => "decode_error",
			SwapError::AmountTooLarge(_) => "amount_too_large",
			SwapError::UnknownAddress(_) => "unknown_address",
			SwapError::UnknownIndex(_) => "unknown_index",
			SwapError::DeadlineExpired { .. } => "deadline_expired",
			SwapError::NonceReused { .. } => "nonce_reused",
			SwapError::SignatureInvalid(_) => "signature_invalid",
			SwapError::UnauthorizedKeeper(_) => "unauthorized_keeper",
			SwapError::UnknownAdapter(_) => "unknown_adapter",
			SwapError::BalanceMismatch { .. } => "balance_mismatch",
			SwapError::SlippageExceeded { .. } => "slippage_exceeded",
			SwapError::TransferFailed(_) => "transfer_failed",
			SwapError::VenueFailed(_) => "venue_failed",
			SwapError::Reentrancy => "reentrancy",
			SwapError::UnexpectedValue(_) => "unexpected_value",
			SwapError::ZeroAmount => "zero_amount",
			SwapError::NativeTokenMismatch(_) => "native_token_mismatch",
		}
	}

	/// True for rejections caused by the instruction bytes themselves rather
	/// than by state.
	pub fn is_malformed(&self) -> bool {
		matches!(self, SwapError::Decode(_) | SwapError::AmountTooLarge(_))
	}
}

impl From<CompressError> for SwapError {
	fn from(err: CompressError) -> Self {
		match err {
			CompressError::AmountTooLarge(amount) => SwapError::AmountTooLarge(amount),
		}
	}
}

impl From<PermitError> for SwapError {
	fn from(err: PermitError) -> Self {
		match err {
			PermitError::DeadlineExpired { deadline, now } => {
				SwapError::DeadlineExpired { deadline, now }
			},
			PermitError::NonceReused { owner, nonce } => SwapError::NonceReused { owner, nonce },
			PermitError::SignatureInvalid(reason) => SwapError::SignatureInvalid(reason),
			PermitError::TransferFailed(e) => SwapError::TransferFailed(e.to_string()),
		}
	}
}

impl From<LedgerError> for SwapError {
	fn from(err: LedgerError) -> Self {
		SwapError::TransferFailed(err.to_string())
	}
}

impl From<AdapterError> for SwapError {
	fn from(err: AdapterError) -> Self {
		match err {
			AdapterError::InsufficientLiquidity { .. } | AdapterError::Ledger(_) => {
				SwapError::TransferFailed(err.to_string())
			},
			other => SwapError::VenueFailed(other.to_string()),
		}
	}
}
