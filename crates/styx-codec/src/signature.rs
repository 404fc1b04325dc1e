//! 64-byte compact signatures (`r || yParity << 255 | s`).

use alloy_primitives::{Signature, B256, U256};
use serde::{Deserialize, Serialize};

pub const COMPACT_SIGNATURE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CompactSignature {
	pub r: B256,
	pub vs: B256,
}

impl CompactSignature {
	pub fn from_signature(sig: &Signature) -> Self {
		let mut vs = sig.s();
		if sig.v() {
			vs |= U256::from(1u8) << 255;
		}
		Self {
			r: B256::from(sig.r().to_be_bytes::<32>()),
			vs: B256::from(vs.to_be_bytes::<32>()),
		}
	}

	/// Splits `vs` back into `s` and the recovery parity.
	pub fn to_signature(&self) -> Signature {
		let vs = U256::from_be_bytes(self.vs.0);
		let y_parity = vs.bit(255);
		let s = vs & (U256::MAX >> 1);
		Signature::new(U256::from_be_bytes(self.r.0), s, y_parity)
	}

	pub fn from_slice(bytes: &[u8]) -> Option<Self> {
		if bytes.len() != COMPACT_SIGNATURE_LEN {
			return None;
		}
		Some(Self {
			r: B256::from_slice(&bytes[..32]),
			vs: B256::from_slice(&bytes[32..]),
		})
	}

	pub fn to_bytes(&self) -> [u8; COMPACT_SIGNATURE_LEN] {
		let mut out = [0u8; COMPACT_SIGNATURE_LEN];
		out[..32].copy_from_slice(self.r.as_slice());
		out[32..].copy_from_slice(self.vs.as_slice());
		out
	}
}

impl From<Signature> for CompactSignature {
	fn from(sig: Signature) -> Self {
		Self::from_signature(&sig)
	}
}
