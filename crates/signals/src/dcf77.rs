//! Support for transmitting the DCF77 time signal.
//!
//! See [DCF77 documentation](https://www.ptb.de/cms/en/ptb/fachabteilungen/abt4/fb-44/ag-442/dissemination-of-legal-time/dcf77/dcf77-time-code.html)
//! for details. This module implements the amplitude modulated time code. Civil warning bits
//! (1-14), the call bit (15), and the leap second announcement (19) are transmitted as zero, and
//! the phase modulated chip sequence is not transmitted.
//!
//! DCF77 transmits the **next** minute throughout the current one, so that the message is
//! complete at the instant it describes. Each second begins with a reduction of 0.1 s (binary
//! zero) or 0.2 s (binary one). The 59th second has no reduction, which marks the start of the
//! next minute. The DST change announcement (bit 16) is set when the offset changes within the
//! hour following the encoded minute, the same rule [`msf`](crate::msf) uses for bit 53B.
//!
//! # Examples
//! ```
//! # use chrono::{TimeZone, Utc};
//! # use signals::{dcf77, Window};
//! // Bit 20 marks the start of encoded time and is always one
//! let instant = Utc.with_ymd_and_hms(2024, 5, 26, 16, 57, 20).unwrap();
//! let s = dcf77::signal_for_second(instant);
//! assert_eq!(s.symbol, "1");
//! assert_eq!(s.windows.as_slice(), &[Window::new(0., 0.2)]);
//! ```

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use tzclock::{get_time_parts, will_offset_change_within_hour, TimeParts};

use crate::frame::{Bit, BitTable};
use crate::{SecondSignal, Window};

/// Timezone of the encoded calendar fields.
pub const TIME_ZONE: &str = "Europe/Berlin";

// Weights are transmitted least significant first
const MINUTE: [(usize, u32); 7] = [(27, 40), (26, 20), (25, 10), (24, 8), (23, 4), (22, 2), (21, 1)];
const HOUR: [(usize, u32); 6] = [(34, 20), (33, 10), (32, 8), (31, 4), (30, 2), (29, 1)];
const DAY: [(usize, u32); 6] = [(41, 20), (40, 10), (39, 8), (38, 4), (37, 2), (36, 1)];
const WEEKDAY: [(usize, u32); 3] = [(44, 4), (43, 2), (42, 1)];
const MONTH: [(usize, u32); 5] = [(49, 10), (48, 8), (47, 4), (46, 2), (45, 1)];
const YEAR: [(usize, u32); 8] = [(57, 80), (56, 40), (55, 20), (54, 10), (53, 8), (52, 4), (51, 2), (50, 1)];

/// An unpacked / uncompressed DCF77 message.
///
/// This type contains all of the components of the encoded DCF77 message, but in an unpacked
/// format that is easier to inspect. See [`MessageUncompressed::pack`] for the per-second bit
/// table that is transmitted.
///
/// # Examples
///
/// ```ignore
/// // Sunday, May 26, 2024. 18:58:25 UTC+2 / 16:58:25 UTC.
/// let instant = Utc.with_ymd_and_hms(2024, 5, 26, 16, 58, 25).unwrap();
/// let m = MessageUncompressed::new(&get_time_parts(instant, TIME_ZONE), false);
/// assert_eq!(m.minute, 58);
/// assert_eq!(m.hour, 18);
/// assert_eq!(m.day, 26);
/// assert_eq!(m.weekday, 7); // Sunday
/// assert_eq!(m.month, 5);
/// assert_eq!(m.year, 24);
/// assert_eq!(m.is_dst, true);
/// ```
#[derive(Debug, PartialEq)]
struct MessageUncompressed {
	/// DST change happening within the next hour.
	dst_change: bool,
	/// DST (CEST) in effect. Standard time (CET) otherwise.
	is_dst: bool,
	/// Minutes, ranged [0, 59].
	minute: u8,
	/// Hours, ranged [0, 23].
	hour: u8,
	/// Day of month, ranged [1, 31].
	day: u8,
	/// Day of week, ranged [1, 7], where 1=Monday, 7=Sunday.
	weekday: u8,
	/// Month, ranged [1, 12].
	month: u8,
	/// Year of the century, ranged [0, 99].
	year: u8
}

impl MessageUncompressed {
	/// Create a new DCF77 message.
	///
	/// `parts` are the local calendar fields of the encoded minute, and `dst_change` tells whether
	/// the offset changes within the hour following that minute.
	fn new(parts: &TimeParts, dst_change: bool) -> MessageUncompressed {
		MessageUncompressed {
			dst_change,
			is_dst: parts.is_dst,
			minute: parts.minute,
			hour: parts.hour,
			day: parts.day,
			weekday: if parts.weekday > 0 { parts.weekday } else { 7 },
			month: parts.month,
			year: parts.year.rem_euclid(100) as u8
		}
	}

	/// Pack the message into one bit per second of the minute.
	fn pack(&self) -> BitTable<60> {
		let mut t = BitTable::with_markers(&[59]);
		t.set(16, self.dst_change);
		t.set(17, self.is_dst);
		t.set(18, !self.is_dst);

		// Bit 20 always set to 1, indicates the start of encoded time
		t.set(20, true);

		// DCF77 uses even parity bits over the minute, hour, and date
		t.write_weighted(self.minute.into(), &MINUTE);
		t.set(28, t.parity(21..=27));
		t.write_weighted(self.hour.into(), &HOUR);
		t.set(35, t.parity(29..=34));
		t.write_weighted(self.day.into(), &DAY);
		t.write_weighted(self.weekday.into(), &WEEKDAY);
		t.write_weighted(self.month.into(), &MONTH);
		t.write_weighted(self.year.into(), &YEAR);
		t.set(58, t.parity(36..=57));
		t
	}
}

/// Map a bit to its symbol and low window.
fn encode_bit(bit: Bit) -> SecondSignal {
	match bit {
		Bit::Marker => SecondSignal::new("M", &[]),
		Bit::Value(true) => SecondSignal::new("1", &[Window::new(0., 0.2)]),
		Bit::Value(false) => SecondSignal::new("0", &[Window::new(0., 0.1)])
	}
}

/// Encode the second containing `instant`.
pub fn signal_for_second(instant: DateTime<Utc>) -> SecondSignal {
	// Transmit the upcoming minute
	let Some(next) = instant.checked_add_signed(TimeDelta::seconds(60)) else {
		return SecondSignal::placeholder();
	};
	let parts = get_time_parts(next, TIME_ZONE);
	let change = will_offset_change_within_hour(next, TIME_ZONE);
	let table = MessageUncompressed::new(&parts, change).pack();
	encode_bit(table.get(instant.second() as usize))
}
