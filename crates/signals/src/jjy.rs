//! Support for transmitting the JJY time signal.
//!
//! See [JJY documentation](https://www.nict.go.jp/en/sts/jjy_signal.html) for details. This module
//! implements the time-related features of JJY's time code, but notably excludes the alternate
//! transmission mode during minutes 15 and 45, including call sign announcement and service
//! interruption bits. Leap second bits are always transmitted as zero.
//!
//! JJY broadcasts on 40 kHz and 60 kHz with an identical time code, so both stations in
//! [`crate::STATIONS`] share this encoder. Each minute encodes the current minute of Japan
//! Standard Time. A second starts at reduced power and returns to full power after 0.2 s for a
//! marker, 0.5 s for a binary one, and 0.8 s for a binary zero.
//!
//! # Examples
//! ```
//! # use chrono::{TimeZone, Utc};
//! # use signals::{jjy, Window};
//! // Mon, Jan 1, 2024. 09:00:15 JST. Second 15 carries the 8 of the hour.
//! let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 15).unwrap();
//! let s = jjy::signal_for_second(instant);
//! assert_eq!(s.symbol, "1");
//! assert_eq!(s.windows.as_slice(), &[Window::new(0.5, 1.)]);
//! ```

use chrono::{DateTime, Timelike, Utc};
use tzclock::{get_time_parts, TimeParts};

use crate::frame::{Bit, BitTable};
use crate::{SecondSignal, Window};

/// Timezone of the encoded calendar fields.
pub const TIME_ZONE: &str = "Asia/Tokyo";

/// Position markers, shared with WWVB.
pub(crate) const MARKERS: [usize; 7] = [0, 9, 19, 29, 39, 49, 59];
/// Minute BCD positions and weights, shared with WWVB.
pub(crate) const MINUTE: [(usize, u32); 7] = [(1, 40), (2, 20), (3, 10), (5, 8), (6, 4), (7, 2), (8, 1)];
/// Hour BCD positions and weights, shared with WWVB.
pub(crate) const HOUR: [(usize, u32); 6] = [(12, 20), (13, 10), (15, 8), (16, 4), (17, 2), (18, 1)];
/// Day of year BCD positions and weights, shared with WWVB.
pub(crate) const DAY_OF_YEAR: [(usize, u32); 10] = [
	(22, 200), (23, 100),
	(25, 80), (26, 40), (27, 20), (28, 10),
	(30, 8), (31, 4), (32, 2), (33, 1)
];
const YEAR: [(usize, u32); 8] = [(41, 80), (42, 40), (43, 20), (44, 10), (45, 8), (46, 4), (47, 2), (48, 1)];
const WEEKDAY: [(usize, u32); 3] = [(50, 4), (51, 2), (52, 1)];

/// An unpacked / uncompressed JJY message.
///
/// This type contains all of the components of the encoded JJY message, but in an unpacked
/// format that is easier to inspect. See [`MessageUncompressed::pack`] for the per-second bit
/// table that is transmitted.
///
/// # Examples
/// ```ignore
/// // Saturday, July 4, 2020. 11:36:58 JST
/// let parts = tzclock::get_time_parts(Utc.timestamp_opt(1593830218, 0).unwrap(), TIME_ZONE);
/// let m = MessageUncompressed::new(&parts);
/// assert_eq!(m.minute, 36);
/// assert_eq!(m.hour, 11);
/// assert_eq!(m.day_of_year, 186);
/// assert_eq!(m.year, 20);
/// assert_eq!(m.weekday, 6);
/// ```
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
	/// Day of week, ranged [0, 6], where 0=Sunday, 6=Saturday.
	weekday: u8
}

impl MessageUncompressed {
	/// Create a new JJY message from local calendar fields.
	fn new(parts: &TimeParts) -> MessageUncompressed {
		MessageUncompressed {
			minute: parts.minute,
			hour: parts.hour,
			day_of_year: parts.day_of_year,
			year: parts.year.rem_euclid(100) as u8,
			weekday: parts.weekday
		}
	}

	/// Pack the message into one bit per second of the minute.
	fn pack(&self) -> BitTable<60> {
		let mut t = BitTable::with_markers(&MARKERS);
		t.write_weighted(self.minute.into(), &MINUTE);
		t.write_weighted(self.hour.into(), &HOUR);
		t.write_weighted(self.day_of_year.into(), &DAY_OF_YEAR);

		// JJY uses even parity bits over the hour and minute
		t.set(36, t.parity(12..=18));
		t.set(37, t.parity(1..=8));

		t.write_weighted(self.year.into(), &YEAR);
		t.write_weighted(self.weekday.into(), &WEEKDAY);
		t
	}
}

/// Map a bit to its symbol and low window.
fn encode_bit(bit: Bit) -> SecondSignal {
	match bit {
		Bit::Marker => SecondSignal::new("M", &[Window::new(0.2, 1.)]),
		Bit::Value(true) => SecondSignal::new("1", &[Window::new(0.5, 1.)]),
		Bit::Value(false) => SecondSignal::new("0", &[Window::new(0.8, 1.)])
	}
}

/// Encode the second containing `instant`.
pub fn signal_for_second(instant: DateTime<Utc>) -> SecondSignal {
	let parts = get_time_parts(instant, TIME_ZONE);
	let table = MessageUncompressed::new(&parts).pack();
	encode_bit(table.get(instant.second() as usize))
}
