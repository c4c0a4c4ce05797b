//! Per-second bit tables shared by the time signal encoders.
//!
//! Every encoder builds a fixed-size table indexed by second-of-minute (or second-of-frame) and
//! then maps the entry for the target second to amplitude windows. The helpers here cover the
//! three ways protocols fill that table: fixed markers, weighted (BCD-like) fields, and parity.

use core::ops::RangeInclusive;

/// A single entry of a bit table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Bit {
	/// Binary value 0 (`false`) or 1 (`true`).
	Value(bool),
	/// Special marker bit.
	#[default]
	Marker
}

impl Bit {
	/// Whether this bit carries binary value 1. Markers count as 0.
	#[inline(always)]
	pub(crate) fn is_one(self) -> bool {
		matches!(self, Bit::Value(true))
	}
}

/// A fixed-size table of `N` bits, one per transmitted second.
///
/// Newly constructed tables hold binary zeros everywhere. Writes outside of `0..N` are ignored,
/// and reads outside of `0..N` return a binary zero.
///
/// # Examples
///
/// ```ignore
/// let mut t = BitTable::<60>::with_markers(&[0, 59]);
/// // Minute 59 in BCD, most significant weight first
/// t.write_weighted(59, &[(1, 40), (2, 20), (3, 10), (5, 8), (6, 4), (7, 2), (8, 1)]);
/// assert_eq!(t.get(1), Bit::Value(true));
/// assert_eq!(t.get(2), Bit::Value(false));
/// assert!(!t.parity(1..=8)); // 4 bits set
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BitTable<const N: usize>([Bit; N]);

impl<const N: usize> BitTable<N> {
	/// Create a table of binary zeros.
	pub(crate) fn new() -> Self {
		BitTable([Bit::Value(false); N])
	}

	/// Create a table of binary zeros with markers at `positions`.
	pub(crate) fn with_markers(positions: &[usize]) -> Self {
		let mut table = Self::new();
		for &p in positions {
			if let Some(b) = table.0.get_mut(p) {
				*b = Bit::Marker;
			}
		}
		table
	}

	/// Get the bit at `pos`.
	#[inline]
	pub(crate) fn get(&self, pos: usize) -> Bit {
		self.0.get(pos).copied().unwrap_or(Bit::Value(false))
	}

	/// Set a binary value at `pos`.
	#[inline]
	pub(crate) fn set(&mut self, pos: usize, value: bool) {
		if let Some(b) = self.0.get_mut(pos) {
			*b = Bit::Value(value);
		}
	}

	/// Set a sequence of binary values starting at `start`.
	pub(crate) fn set_all(&mut self, start: usize, values: &[bool]) {
		for (i, &v) in values.iter().enumerate() {
			self.set(start + i, v);
		}
	}

	/// Write a decimal `value` across weighted bit positions.
	///
	/// `fields` lists `(position, weight)` pairs in descending weight order. Each weight is
	/// greedily subtracted from the remaining value, setting the bit to 1 iff the remainder is at
	/// least the weight. This covers plain binary (weights 8, 4, 2, 1) as well as BCD (weights 40,
	/// 20, 10, 8, 4, 2, 1) fields.
	pub(crate) fn write_weighted(&mut self, value: u32, fields: &[(usize, u32)]) {
		let mut remaining = value;
		for &(pos, weight) in fields {
			let bit = remaining >= weight;
			if bit {
				remaining -= weight;
			}
			self.set(pos, bit);
		}
	}

	/// Even parity bit over `range`: `true` iff an odd number of bits in the range are set.
	pub(crate) fn parity(&self, range: RangeInclusive<usize>) -> bool {
		range.fold(false, |acc, i| acc ^ self.get(i).is_one())
	}
}
