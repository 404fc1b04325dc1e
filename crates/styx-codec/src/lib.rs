//! Compact instruction codec for the Styx settlement system.
//!
//! An instruction is a fixed-width, bit-packed header per mode, an optional
//! 64-byte compact signature and an opaque trailing payload. Wide values are
//! shrunk on the wire: amounts through the decimal float in [`compress`],
//! token addresses through 24-bit indices of the address table.

pub mod bits;
pub mod compress;
pub mod instruction;
pub mod signature;

pub use compress::{compress, representable, uncompress, CompressError, CompressedAmount};
pub use instruction::{decode, encode, header_len, CodecError, Instruction, InstructionKind};
pub use signature::CompactSignature;
