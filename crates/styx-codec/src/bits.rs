//! MSB-first bit packing used by the instruction header.

/// Appends fields most-significant bit first.
#[derive(Debug, Default)]
pub struct BitWriter {
	buf: Vec<u8>,
	len: usize,
}

impl BitWriter {
	pub fn with_capacity(bytes: usize) -> Self {
		Self {
			buf: Vec::with_capacity(bytes),
			len: 0,
		}
	}

	/// Writes the low `bits` bits of `value`.
	pub fn write(&mut self, value: u64, bits: u32) {
		debug_assert!(bits <= 64);
		debug_assert!(bits == 64 || value >> bits == 0, "value wider than field");
		for i in (0..bits).rev() {
			self.push_bit((value >> i) & 1 == 1);
		}
	}

	pub fn write_bytes(&mut self, bytes: &[u8]) {
		for byte in bytes {
			self.write(*byte as u64, 8);
		}
	}

	/// Number of bits written so far.
	pub fn bit_len(&self) -> usize {
		self.len
	}

	/// Returns the packed bytes; a trailing partial byte is zero-filled.
	pub fn finish(self) -> Vec<u8> {
		self.buf
	}

	fn push_bit(&mut self, bit: bool) {
		if self.len % 8 == 0 {
			self.buf.push(0);
		}
		if bit {
			self.buf[self.len / 8] |= 0x80 >> (self.len % 8);
		}
		self.len += 1;
	}
}

/// Reads fields most-significant bit first.
#[derive(Debug)]
pub struct BitReader<'a> {
	data: &'a [u8],
	pos: usize,
}

impl<'a> BitReader<'a> {
	pub fn new(data: &'a [u8]) -> Self {
		Self { data, pos: 0 }
	}

	/// Reads `bits` bits, or `None` when the input is exhausted.
	pub fn read(&mut self, bits: u32) -> Option<u64> {
		debug_assert!(bits <= 64);
		if self.remaining() < bits as usize {
			return None;
		}
		let mut value = 0u64;
		for _ in 0..bits {
			let bit = self.data[self.pos / 8] >> (7 - self.pos % 8) & 1;
			value = value << 1 | bit as u64;
			self.pos += 1;
		}
		Some(value)
	}

	pub fn read_bytes<const N: usize>(&mut self) -> Option<[u8; N]> {
		let mut out = [0u8; N];
		for byte in out.iter_mut() {
			*byte = self.read(8)? as u8;
		}
		Some(out)
	}

	pub fn remaining(&self) -> usize {
		self.data.len() * 8 - self.pos
	}
}
