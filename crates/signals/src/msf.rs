//! Support for transmitting the MSF time signal.
//!
//! See [MSF documentation](https://en.wikipedia.org/wiki/Time_from_NPL_(MSF)) for details. This
//! module implements the slow code format of the MSF time signal, since the fast code was
//! discontinued in 1998. DUT1 bits (1-16) are transmitted as zero.
//!
//! MSF transmits two bits per second. Every second begins with 0.1 s of carrier off, followed by
//! 0.1 s off if bit A is set, followed by 0.1 s off if bit B is set. Second 0 is a minute marker
//! with 0.5 s of carrier off. The symbol of a second is its two bits in order, e.g. `"10"` for
//! A=1, B=0.
//!
//! Like DCF77, MSF transmits the **next** minute throughout the current one.
//!
//! # Examples
//! ```
//! # use chrono::{TimeZone, Utc};
//! # use signals::{msf, Window};
//! // Seconds 53-58 always carry A=1
//! let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 58).unwrap();
//! let s = msf::signal_for_second(instant);
//! assert_eq!(s.symbol, "10");
//! assert_eq!(s.windows.as_slice(), &[Window::new(0., 0.1), Window::new(0.1, 0.2)]);
//! ```

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use tzclock::{get_time_parts, will_offset_change_within_hour, TimeParts};

use crate::frame::{Bit, BitTable};
use crate::{SecondSignal, Window};

/// Timezone of the encoded calendar fields.
pub const TIME_ZONE: &str = "Europe/London";

const YEAR: [(usize, u32); 8] = [(17, 80), (18, 40), (19, 20), (20, 10), (21, 8), (22, 4), (23, 2), (24, 1)];
const MONTH: [(usize, u32); 5] = [(25, 10), (26, 8), (27, 4), (28, 2), (29, 1)];
const DAY: [(usize, u32); 6] = [(30, 20), (31, 10), (32, 8), (33, 4), (34, 2), (35, 1)];
const WEEKDAY: [(usize, u32); 3] = [(36, 4), (37, 2), (38, 1)];
const HOUR: [(usize, u32); 6] = [(39, 20), (40, 10), (41, 8), (42, 4), (43, 2), (44, 1)];
const MINUTE: [(usize, u32); 7] = [(45, 40), (46, 20), (47, 10), (48, 8), (49, 4), (50, 2), (51, 1)];

/// Fixed track A pattern for seconds 52-59.
const TAIL: [bool; 8] = [false, true, true, true, true, true, true, false];

/// An unpacked / uncompressed MSF message.
///
/// This type contains all of the components of the encoded MSF message, but in an unpacked
/// format that is easier to inspect. See [`MessageUncompressed::pack`] for the two per-second bit
/// tables that are transmitted.
///
/// # Examples
/// ```ignore
/// // Saturday, July 4, 2020. 11:56:58 UTC+1 / 10:56:58 UTC.
/// let instant = Utc.with_ymd_and_hms(2020, 7, 4, 10, 56, 58).unwrap();
/// let m = MessageUncompressed::new(&get_time_parts(instant, TIME_ZONE), false);
/// assert_eq!(m.minute, 56);
/// assert_eq!(m.hour, 11);
/// assert_eq!(m.day, 4);
/// assert_eq!(m.month, 7);
/// assert_eq!(m.year, 20);
/// assert_eq!(m.weekday, 6);   // Saturday (0=Sunday, 6=Saturday)
/// assert_eq!(m.summer_time, true);
/// ```
#[derive(Debug, PartialEq)]
struct MessageUncompressed {
	/// Year of the century, ranged [0, 99]
	year: u8,
	/// Month, ranged [1, 12]
	month: u8,
	/// Day of month, ranged [1, 31]
	day: u8,
	/// Day of week, ranged [0, 6], where 0=Sunday, 6=Saturday
	weekday: u8,
	/// Hours, ranged [0, 23]
	hour: u8,
	/// Minutes, ranged [0, 59]
	minute: u8,
	/// British Summer Time in effect
	summer_time: bool,
	/// Change between GMT and BST within the hour following the encoded minute
	summer_time_change: bool
}

impl MessageUncompressed {
	/// Create a new MSF message from the local calendar fields of the encoded minute.
	fn new(parts: &TimeParts, summer_time_change: bool) -> MessageUncompressed {
		MessageUncompressed {
			year: parts.year.rem_euclid(100) as u8,
			month: parts.month,
			day: parts.day,
			weekday: parts.weekday,
			hour: parts.hour,
			minute: parts.minute,
			summer_time: parts.is_dst,
			summer_time_change
		}
	}

	/// Pack the message into tracks A and B, one bit per second of the minute.
	fn pack(&self) -> (BitTable<60>, BitTable<60>) {
		let mut a = BitTable::with_markers(&[0]);
		a.write_weighted(self.year.into(), &YEAR);
		a.write_weighted(self.month.into(), &MONTH);
		a.write_weighted(self.day.into(), &DAY);
		a.write_weighted(self.weekday.into(), &WEEKDAY);
		a.write_weighted(self.hour.into(), &HOUR);
		a.write_weighted(self.minute.into(), &MINUTE);
		a.set_all(52, &TAIL);

		// MSF uses odd parity bits
		let mut b = BitTable::with_markers(&[0]);
		b.set(53, self.summer_time_change);
		b.set(54, !a.parity(17..=24));
		b.set(55, !a.parity(25..=35));
		b.set(56, !a.parity(36..=38));
		b.set(57, !a.parity(39..=51));
		b.set(58, self.summer_time);
		(a, b)
	}
}

/// Map a pair of bits to its symbol and low windows.
fn encode_bits(a: Bit, b: Bit) -> SecondSignal {
	const FIRST: Window = Window::new(0., 0.1);
	const A: Window = Window::new(0.1, 0.2);
	const B: Window = Window::new(0.2, 0.3);

	match (a.is_one(), b.is_one()) {
		_ if a == Bit::Marker => SecondSignal::new("M", &[Window::new(0., 0.5)]),
		(false, false) => SecondSignal::new("00", &[FIRST]),
		(true, false) => SecondSignal::new("10", &[FIRST, A]),
		(false, true) => SecondSignal::new("01", &[FIRST, B]),
		(true, true) => SecondSignal::new("11", &[FIRST, A, B])
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
	let (a, b) = MessageUncompressed::new(&parts, change).pack();
	let second = instant.second() as usize;
	encode_bits(a.get(second), b.get(second))
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn minute(instant: DateTime<Utc>) -> String {
		(0..60)
			.map(|i| signal_for_second(instant + TimeDelta::seconds(i)).symbol)
			.collect::<Vec<_>>()
			.join(" ")
	}

	#[test]
	fn message_test() {
		// Saturday, July 4, 2020. 11:56:00 BST (10:56:00 UTC)
		let instant = Utc.with_ymd_and_hms(2020, 7, 4, 10, 56, 0).unwrap();
		let m = MessageUncompressed::new(&get_time_parts(instant, TIME_ZONE), false);
		assert_eq!(m, MessageUncompressed {
			year: 20,
			month: 7,
			day: 4,
			weekday: 6,
			hour: 11,
			minute: 56,
			summer_time: true,
			summer_time_change: false
		});

		let (a, b) = m.pack();
		let pack = |t: &BitTable<60>| (1..60).fold(0_u64, |acc, i| acc | (u64::from(t.get(i).is_one()) << (63 - i)));
		assert_eq!(pack(&a), 0x0000101C4C8D67E0);
		assert_eq!(pack(&b), 0x00000000000001E0);
	}

	#[test]
	fn minute_test() {
		// Sun, May 26, 2024. 16:57 UTC transmits 17:58 BST
		assert_eq!(
			minute(Utc.with_ymd_and_hms(2024, 5, 26, 16, 57, 0).unwrap()),
			"M 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 10 00 00 10 00 00 00 00 10 00 \
			 10 10 00 00 10 10 00 00 00 00 00 10 00 10 10 10 10 00 10 10 00 00 00 00 10 11 10 11 10 11 00"
		);
		// Sun, Oct 27, 2024. 00:31 UTC transmits 01:31 BST, return to GMT announced
		assert_eq!(
			minute(Utc.with_ymd_and_hms(2024, 10, 27, 0, 30, 0).unwrap()),
			"M 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 10 00 00 10 00 00 10 00 00 00 \
			 00 10 00 00 10 10 10 00 00 00 00 00 00 00 00 10 00 10 10 00 00 00 10 00 11 11 10 11 11 11 00"
		);
	}

	#[test]
	fn summer_time_announcement_test() {
		// London switches to BST at 01:00 UTC on Mar 31, 2024. Second 53 carries A=1 and the
		// announcement in track B for the 60 encoded minutes before the switch.
		let at = |d, h, m| signal_for_second(Utc.with_ymd_and_hms(2024, 3, d, h, m, 53).unwrap()).symbol;
		assert_eq!(at(30, 23, 58), "10");
		assert_eq!(at(30, 23, 59), "11");
		assert_eq!(at(31, 0, 58), "11");
		assert_eq!(at(31, 0, 59), "10");
	}

	#[test]
	fn windows_test() {
		let base = Utc.with_ymd_and_hms(2024, 5, 26, 16, 57, 0).unwrap();
		assert_eq!(signal_for_second(base), SecondSignal::new("M", &[Window::new(0., 0.5)]));
		assert_eq!(
			signal_for_second(base + TimeDelta::seconds(1)),
			SecondSignal::new("00", &[Window::new(0., 0.1)])
		);
		assert_eq!(
			signal_for_second(base + TimeDelta::seconds(54)),
			SecondSignal::new("11", &[Window::new(0., 0.1), Window::new(0.1, 0.2), Window::new(0.2, 0.3)])
		);
		assert_eq!(
			signal_for_second(base + TimeDelta::seconds(55)),
			SecondSignal::new("10", &[Window::new(0., 0.1), Window::new(0.1, 0.2)])
		);
	}
}
