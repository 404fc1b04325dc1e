//! Signature-authorized transfers.
//!
//! An owner signs a Permit2 `PermitWitnessTransferFrom` typed-data message
//! off-line. The witness binds the swap parameters, so the signature
//! authorizes exactly one pull of one amount of one token into one swap.
//! Nonces are spent from a per-owner unordered bitmap held in the ledger.

use alloy_primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use styx_codec::CompactSignature;
use styx_ledger::{Ledger, LedgerError};
use styx_types::utils::eip712::{
	compute_domain_hash, compute_final_digest, Eip712AbiEncoder, NAME_PERMIT2,
	PERMIT_WITNESS_TRANSFER_TYPE, SWAP_WITNESS_TYPE, TOKEN_PERMISSIONS_TYPE,
};
use thiserror::Error;

/// Half the secp256k1 group order; canonical signatures have `s` at or
/// below it.
const SECP256K1_HALF_ORDER: U256 = U256::from_limbs([
	0xdfe92f46681b20a0,
	0x5d576e7357a4501d,
	0xffffffffffffffff,
	0x7fffffffffffffff,
]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermitError {
	#[error("Deadline {deadline} expired at {now}")]
	DeadlineExpired { deadline: u64, now: u64 },
	#[error("Nonce {nonce} already used by {owner}")]
	NonceReused { owner: Address, nonce: u64 },
	#[error("Invalid signature: {0}")]
	SignatureInvalid(String),
	#[error("Transfer failed: {0}")]
	TransferFailed(LedgerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPermissions {
	pub token: Address,
	pub amount: U256,
}

impl TokenPermissions {
	pub fn struct_hash(&self) -> B256 {
		let mut enc = Eip712AbiEncoder::new();
		enc.push_b256(&keccak256(TOKEN_PERMISSIONS_TYPE.as_bytes()));
		enc.push_address(&self.token);
		enc.push_u256(self.amount);
		keccak256(enc.finish())
	}
}

/// Swap parameters committed to by the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapWitness {
	pub beneficiary: Address,
	pub token_out: Address,
	pub amount_out: U256,
	pub fee_bps: u16,
	pub slippage_tier: u8,
	/// The full venue byte, aggregator flag included.
	pub adapter_id: u8,
}

impl SwapWitness {
	pub fn struct_hash(&self) -> B256 {
		let mut enc = Eip712AbiEncoder::new();
		enc.push_b256(&keccak256(SWAP_WITNESS_TYPE.as_bytes()));
		enc.push_address(&self.beneficiary);
		enc.push_address(&self.token_out);
		enc.push_u256(self.amount_out);
		enc.push_uint(self.fee_bps as u64);
		enc.push_uint(self.slippage_tier as u64);
		enc.push_uint(self.adapter_id as u64);
		keccak256(enc.finish())
	}
}

/// A single-use transfer authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransferOrder {
	pub permitted: TokenPermissions,
	pub spender: Address,
	pub nonce: u64,
	pub deadline: u64,
}

impl SignedTransferOrder {
	/// Struct hash of `PermitWitnessTransferFrom` with `witness` embedded.
	pub fn struct_hash(&self, witness: &SwapWitness) -> B256 {
		let type_hash = keccak256(
			format!(
				"{}{}{}",
				PERMIT_WITNESS_TRANSFER_TYPE, SWAP_WITNESS_TYPE, TOKEN_PERMISSIONS_TYPE
			)
			.as_bytes(),
		);
		let mut enc = Eip712AbiEncoder::new();
		enc.push_b256(&type_hash);
		enc.push_b256(&self.permitted.struct_hash());
		enc.push_address(&self.spender);
		enc.push_uint(self.nonce);
		enc.push_uint(self.deadline);
		enc.push_b256(&witness.struct_hash());
		keccak256(enc.finish())
	}
}

/// Everything needed to pull funds on behalf of `owner`.
#[derive(Debug, Clone)]
pub struct PullRequest {
	pub order: SignedTransferOrder,
	pub witness: SwapWitness,
	pub owner: Address,
	pub signature: CompactSignature,
	pub recipient: Address,
	/// Current time in unix seconds.
	pub now: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulledFunds {
	pub amount: U256,
	pub signer: Address,
}

#[async_trait]
pub trait TransferAuthority: Send + Sync {
	/// Verifies the request and moves the permitted amount from the owner to
	/// the recipient, spending the nonce.
	async fn pull(&self, request: &PullRequest) -> Result<PulledFunds, PermitError>;

	async fn nonce_bitmap(&self, owner: Address, word: u64) -> U256;

	/// EIP-712 digest an owner signs for `order` and `witness`.
	fn digest(&self, order: &SignedTransferOrder, witness: &SwapWitness) -> B256;

	/// Address owners approve so the authority can move their tokens.
	fn address(&self) -> Address;
}

/// Permit2-style signature transfer backed by the ledger.
pub struct SignatureTransfer {
	ledger: Arc<Ledger>,
	address: Address,
	domain_separator: B256,
}

impl SignatureTransfer {
	pub fn new(ledger: Arc<Ledger>, chain_id: u64, address: Address) -> Self {
		Self {
			ledger,
			address,
			domain_separator: compute_domain_hash(NAME_PERMIT2, chain_id, &address),
		}
	}

	pub fn domain_separator(&self) -> B256 {
		self.domain_separator
	}

	fn recover(&self, request: &PullRequest) -> Result<Address, PermitError> {
		let signature = request.signature.to_signature();
		if signature.s() > SECP256K1_HALF_ORDER {
			return Err(PermitError::SignatureInvalid("high s".into()));
		}
		let digest = self.digest(&request.order, &request.witness);
		let signer = signature
			.recover_address_from_prehash(&digest)
			.map_err(|e| PermitError::SignatureInvalid(e.to_string()))?;
		if signer != request.owner {
			return Err(PermitError::SignatureInvalid(format!(
				"signer {} is not owner {}",
				signer, request.owner
			)));
		}
		Ok(signer)
	}
}

#[async_trait]
impl TransferAuthority for SignatureTransfer {
	async fn pull(&self, request: &PullRequest) -> Result<PulledFunds, PermitError> {
		let order = &request.order;
		if request.now > order.deadline {
			return Err(PermitError::DeadlineExpired {
				deadline: order.deadline,
				now: request.now,
			});
		}

		let bit = U256::from(1u8) << (order.nonce & 0xff) as usize;
		if self.ledger.nonce_bitmap(request.owner, order.nonce >> 8).await & bit != U256::ZERO {
			return Err(PermitError::NonceReused {
				owner: request.owner,
				nonce: order.nonce,
			});
		}

		let signer = self.recover(request)?;

		self.ledger
			.use_nonce(signer, order.nonce)
			.await
			.map_err(|e| match e {
				LedgerError::NonceUsed { owner, nonce } => PermitError::NonceReused { owner, nonce },
				other => PermitError::TransferFailed(other),
			})?;
		self.ledger
			.transfer_from(
				order.permitted.token,
				self.address,
				signer,
				request.recipient,
				order.permitted.amount,
			)
			.await
			.map_err(PermitError::TransferFailed)?;

		tracing::debug!(
			owner = %signer,
			token = %order.permitted.token,
			amount = %order.permitted.amount,
			nonce = order.nonce,
			"Pulled funds with signature transfer"
		);
		Ok(PulledFunds {
			amount: order.permitted.amount,
			signer,
		})
	}

	async fn nonce_bitmap(&self, owner: Address, word: u64) -> U256 {
		self.ledger.nonce_bitmap(owner, word).await
	}

	fn digest(&self, order: &SignedTransferOrder, witness: &SwapWitness) -> B256 {
		compute_final_digest(&self.domain_separator, &order.struct_hash(witness))
	}

	fn address(&self) -> Address {
		self.address
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;
	use alloy_sol_types::{eip712_domain, SolStruct};

	mod typed {
		alloy_sol_types::sol! {
			struct TokenPermissions {
				address token;
				uint256 amount;
			}

			struct SwapWitness {
				address beneficiary;
				address tokenOut;
				uint256 amountOut;
				uint16 feeBps;
				uint8 slippageTier;
				uint8 adapterId;
			}

			struct PermitWitnessTransferFrom {
				TokenPermissions permitted;
				address spender;
				uint256 nonce;
				uint256 deadline;
				SwapWitness witness;
			}
		}
	}

	const PERMIT2: Address = address!("000000000022d473030f116ddee9f6b43ac78ba3");
	const TOKEN: Address = address!("1000000000000000000000000000000000000001");
	const TOKEN_OUT: Address = address!("2000000000000000000000000000000000000002");
	const ENGINE: Address = address!("e000000000000000000000000000000000000000");
	const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");

	struct Fixture {
		ledger: Arc<Ledger>,
		authority: SignatureTransfer,
		signer: PrivateKeySigner,
	}

	async fn fixture() -> Fixture {
		let ledger = Arc::new(Ledger::new(WETH));
		let signer = PrivateKeySigner::random();
		ledger
			.mint(TOKEN, signer.address(), U256::from(1_000u64))
			.await
			.unwrap();
		ledger.approve(TOKEN, signer.address(), PERMIT2, U256::MAX).await;
		Fixture {
			authority: SignatureTransfer::new(ledger.clone(), 1, PERMIT2),
			ledger,
			signer,
		}
	}

	fn order(nonce: u64, amount: u64) -> SignedTransferOrder {
		SignedTransferOrder {
			permitted: TokenPermissions {
				token: TOKEN,
				amount: U256::from(amount),
			},
			spender: ENGINE,
			nonce,
			deadline: 1_000,
		}
	}

	fn witness(beneficiary: Address) -> SwapWitness {
		SwapWitness {
			beneficiary,
			token_out: TOKEN_OUT,
			amount_out: U256::from(200u64),
			fee_bps: 1000,
			slippage_tier: 3,
			adapter_id: 0x81,
		}
	}

	fn request(f: &Fixture, order: SignedTransferOrder, now: u64) -> PullRequest {
		let witness = witness(f.signer.address());
		let digest = f.authority.digest(&order, &witness);
		let signature = f.signer.sign_hash_sync(&digest).unwrap();
		PullRequest {
			order,
			witness,
			owner: f.signer.address(),
			signature: CompactSignature::from_signature(&signature),
			recipient: ENGINE,
			now,
		}
	}

	#[tokio::test]
	async fn test_digest_matches_sol_types() {
		let f = fixture().await;
		let ord = order(42, 100);
		let wit = witness(f.signer.address());

		let message = typed::PermitWitnessTransferFrom {
			permitted: typed::TokenPermissions {
				token: TOKEN,
				amount: U256::from(100u64),
			},
			spender: ENGINE,
			nonce: U256::from(42u64),
			deadline: U256::from(1_000u64),
			witness: typed::SwapWitness {
				beneficiary: wit.beneficiary,
				tokenOut: wit.token_out,
				amountOut: wit.amount_out,
				feeBps: wit.fee_bps,
				slippageTier: wit.slippage_tier,
				adapterId: wit.adapter_id,
			},
		};
		let domain = eip712_domain! {
			name: "Permit2",
			chain_id: 1,
			verifying_contract: PERMIT2,
		};
		assert_eq!(
			f.authority.digest(&ord, &wit),
			message.eip712_signing_hash(&domain)
		);
	}

	#[tokio::test]
	async fn test_pull_moves_funds_and_spends_nonce() {
		let f = fixture().await;
		let req = request(&f, order(300, 100), 999);

		let pulled = f.authority.pull(&req).await.unwrap();
		assert_eq!(pulled.amount, U256::from(100u64));
		assert_eq!(pulled.signer, f.signer.address());
		assert_eq!(f.ledger.balance_of(TOKEN, ENGINE).await, U256::from(100u64));
		assert_eq!(
			f.authority.nonce_bitmap(f.signer.address(), 1).await,
			U256::from(1u64) << 44
		);

		assert_eq!(
			f.authority.pull(&req).await,
			Err(PermitError::NonceReused {
				owner: f.signer.address(),
				nonce: 300
			})
		);
	}

	#[tokio::test]
	async fn test_deadline_checked_first() {
		let f = fixture().await;
		let mut req = request(&f, order(1, 100), 1_001);
		req.signature = CompactSignature::default();
		assert_eq!(
			f.authority.pull(&req).await,
			Err(PermitError::DeadlineExpired {
				deadline: 1_000,
				now: 1_001
			})
		);
		// the deadline itself is still valid
		let req = request(&f, order(1, 100), 1_000);
		assert!(f.authority.pull(&req).await.is_ok());
	}

	#[tokio::test]
	async fn test_tampered_witness_is_rejected() {
		let f = fixture().await;
		let mut req = request(&f, order(2, 100), 0);
		req.witness.adapter_id = 0x01;
		assert!(matches!(
			f.authority.pull(&req).await,
			Err(PermitError::SignatureInvalid(_))
		));

		let mut req = request(&f, order(3, 100), 0);
		req.order.permitted.amount = U256::from(101u64);
		assert!(matches!(
			f.authority.pull(&req).await,
			Err(PermitError::SignatureInvalid(_))
		));
		assert_eq!(f.ledger.balance_of(TOKEN, ENGINE).await, U256::ZERO);
	}

	#[tokio::test]
	async fn test_wrong_owner_and_high_s() {
		let f = fixture().await;
		let mut req = request(&f, order(4, 100), 0);
		req.owner = Address::repeat_byte(0x99);
		assert!(matches!(
			f.authority.pull(&req).await,
			Err(PermitError::SignatureInvalid(_))
		));

		let mut req = request(&f, order(5, 100), 0);
		let sig = req.signature.to_signature();
		let n = SECP256K1_HALF_ORDER * U256::from(2u8) + U256::from(1u8);
		let flipped = alloy_primitives::Signature::new(sig.r(), n - sig.s(), !sig.v());
		req.signature = CompactSignature::from_signature(&flipped);
		assert_eq!(
			f.authority.pull(&req).await,
			Err(PermitError::SignatureInvalid("high s".into()))
		);
	}

	#[tokio::test]
	async fn test_insufficient_balance_is_transfer_failure() {
		let f = fixture().await;
		let req = request(&f, order(6, 5_000), 0);
		assert!(matches!(
			f.authority.pull(&req).await,
			Err(PermitError::TransferFailed(LedgerError::InsufficientBalance { .. }))
		));
	}
}
