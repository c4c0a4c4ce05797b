//! Support for transmitting the WWVB time signal.
//!
//! See [WWVB documentation](https://en.wikipedia.org/wiki/WWVB) for details. This module
//! implements WWVB's amplitude modulated time code. The phase modulated time code is not
//! transmitted, and DUT1 and leap second bits are always zero.
//!
//! WWVB encodes the current minute of UTC. Its DST bits describe US daylight saving time over the
//! current UTC day, taken from [`DST_REFERENCE_ZONE`]:
//!
//! | Bit 57 (end of day) | Bit 58 (start of day) | Meaning              |
//! | ------------------- | --------------------- | -------------------- |
//! | 0                   | 0                     | Standard time        |
//! | 1                   | 0                     | DST begins today     |
//! | 1                   | 1                     | DST in effect        |
//! | 0                   | 1                     | DST ends today       |
//!
//! A second starts at reduced power and returns to full power after 0.2 s for a binary zero, 0.5 s
//! for a binary one, and 0.8 s for a marker.
//!
//! # Examples
//! ```
//! # use chrono::{TimeZone, Utc};
//! # use signals::{wwvb, Window};
//! // Sun, Mar 10, 2024: US DST begins today
//! let instant = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 57).unwrap();
//! let s = wwvb::signal_for_second(instant);
//! assert_eq!(s.symbol, "1");
//! assert_eq!(s.windows.as_slice(), &[Window::new(0., 0.5)]);
//! ```

use chrono::{DateTime, Timelike, Utc};
use tzclock::{get_dst_status_for_utc_day, get_time_parts, is_leap_year, TimeParts};

use crate::frame::{Bit, BitTable};
use crate::jjy::{DAY_OF_YEAR, HOUR, MARKERS, MINUTE};
use crate::{SecondSignal, Window};

/// Timezone of the encoded calendar fields.
pub const TIME_ZONE: &str = "UTC";

/// Zone whose DST rules are announced in bits 57 and 58.
pub const DST_REFERENCE_ZONE: &str = "America/New_York";

const YEAR: [(usize, u32); 8] = [(45, 80), (46, 40), (47, 20), (48, 10), (50, 8), (51, 4), (52, 2), (53, 1)];

/// An unpacked / uncompressed WWVB message.
///
/// This type contains all of the components of the encoded WWVB message, but in an unpacked
/// format that is easier to inspect. See [`MessageUncompressed::pack`] for the per-second bit
/// table that is transmitted.
#[derive(Debug, PartialEq)]
struct MessageUncompressed {
	/// Minutes, ranged [0, 59].
	minute: u8,
	/// Hours, ranged [0, 23].
	hour: u8,
	/// Day of year, ranged [1, 366].
	day_of_year: u16,
	/// Year of the century, ranged [0, 99].
	year: u8,
	/// Whether the current year is a leap year.
	leap_year: bool,
	/// DST in effect at the start of the UTC day.
	dst_start: bool,
	/// DST in effect at the end of the UTC day.
	dst_end: bool
}

impl MessageUncompressed {
	/// Create a new WWVB message.
	///
	/// `parts` are the UTC calendar fields of `instant`.
	fn new(instant: DateTime<Utc>, parts: &TimeParts) -> MessageUncompressed {
		let dst = get_dst_status_for_utc_day(instant, DST_REFERENCE_ZONE);

		MessageUncompressed {
			minute: parts.minute,
			hour: parts.hour,
			day_of_year: parts.day_of_year,
			year: parts.year.rem_euclid(100) as u8,
			leap_year: is_leap_year(parts.year),
			dst_start: dst.start,
			dst_end: dst.end
		}
	}

	/// Pack the message into one bit per second of the minute.
	fn pack(&self) -> BitTable<60> {
		let mut t = BitTable::with_markers(&MARKERS);
		t.write_weighted(self.minute.into(), &MINUTE);
		t.write_weighted(self.hour.into(), &HOUR);
		t.write_weighted(self.day_of_year.into(), &DAY_OF_YEAR);
		t.write_weighted(self.year.into(), &YEAR);
		t.set(55, self.leap_year);
		t.set(57, self.dst_end);
		t.set(58, self.dst_start);
		t
	}
}

/// Map a bit to its symbol and low window.
fn encode_bit(bit: Bit) -> SecondSignal {
	match bit {
		Bit::Marker => SecondSignal::new("M", &[Window::new(0., 0.8)]),
		Bit::Value(true) => SecondSignal::new("1", &[Window::new(0., 0.5)]),
		Bit::Value(false) => SecondSignal::new("0", &[Window::new(0., 0.2)])
	}
}

/// Encode the second containing `instant`.
pub fn signal_for_second(instant: DateTime<Utc>) -> SecondSignal {
	let parts = get_time_parts(instant, TIME_ZONE);
	let table = MessageUncompressed::new(instant, &parts).pack();
	encode_bit(table.get(instant.second() as usize))
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeDelta, TimeZone};

	fn minute(instant: DateTime<Utc>) -> String {
		(0..60).map(|i| signal_for_second(instant + TimeDelta::seconds(i)).symbol).collect()
	}

	#[test]
	fn message_test() {
		// Sun, Mar 10, 2024. 12:00:00 UTC
		let instant = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
		let m = MessageUncompressed::new(instant, &get_time_parts(instant, TIME_ZONE));
		assert_eq!(m, MessageUncompressed {
			minute: 0,
			hour: 12,
			day_of_year: 70,
			year: 24,
			leap_year: true,
			dst_start: false,
			dst_end: true
		});
	}

	#[test]
	fn minute_test() {
		assert_eq!(
			minute(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
			"M00000000M000000000M000000000M000100000M000000010M010001000M"
		);
		assert_eq!(
			minute(Utc.with_ymd_and_hms(2024, 5, 26, 16, 57, 0).unwrap()),
			"M10100111M000100110M000100100M011100000M000000010M010001011M"
		);
		// DST begins today
		assert_eq!(
			minute(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()),
			"M00000000M000100010M000000111M000000000M000000010M010001010M"
		);
		// DST ends today
		assert_eq!(
			minute(Utc.with_ymd_and_hms(2024, 11, 3, 0, 0, 0).unwrap()),
			"M00000000M000000000M001100000M100000000M000000010M010001001M"
		);
		// Last minute of a non-leap year
		assert_eq!(
			minute(Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 0).unwrap()),
			"M10101001M001000011M001100110M010100000M000000010M001100000M"
		);
	}

	#[test]
	fn windows_test() {
		let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
		assert_eq!(signal_for_second(base), SecondSignal::new("M", &[Window::new(0., 0.8)]));
		let s = signal_for_second(base + TimeDelta::seconds(1));
		assert_eq!(s, SecondSignal::new("0", &[Window::new(0., 0.2)]));
		let s = signal_for_second(base + TimeDelta::seconds(55));
		assert_eq!(s, SecondSignal::new("1", &[Window::new(0., 0.5)]));
	}
}
