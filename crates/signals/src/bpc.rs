//! Support for transmitting the BPC time signal.
//!
//! BPC is broadcast from Shangqiu, China, on 68.5 kHz. It encodes China Standard Time with
//! quaternary symbols: every second carries one of four digits, transmitted as a carrier
//! reduction of 0.1 s (digit 0) up to 0.4 s (digit 3). A full message takes 20 seconds and is
//! repeated three times per minute, each repetition carrying its own frame index.
//!
//! | Symbol  | Content                                                      |
//! | ------- | ------------------------------------------------------------ |
//! | 0       | Frame start, transmitted without reduction                   |
//! | 1       | Frame index (0, 1, 2)                                        |
//! | 2       | Reserved                                                     |
//! | 3-4     | Hour on a 12-hour clock                                      |
//! | 5-7     | Minute                                                       |
//! | 8-9     | Day of week, ranged [1, 7], where 7=Sunday                   |
//! | 10      | P3: afternoon bit, parity over symbols 1-9                   |
//! | 11-13   | Day of month                                                 |
//! | 14-15   | Month                                                        |
//! | 16-18   | Year of the century, low 6 bits                              |
//! | 19      | P4: year bit 6, parity over symbols 11-18                    |
//!
//! Each symbol holds two bits, most significant first.
//!
//! # Examples
//! ```
//! # use chrono::{TimeZone, Utc};
//! # use signals::{bpc, Window};
//! // Mon, Jan 1, 2024. 08:00:21 CST. Second 21 is frame 1, symbol 1.
//! let instant = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 21).unwrap();
//! let s = bpc::signal_for_second(instant);
//! assert_eq!(s.symbol, "1");
//! assert_eq!(s.windows.as_slice(), &[Window::new(0., 0.2)]);
//! ```

use chrono::{DateTime, Timelike, Utc};
use tzclock::{get_time_parts, TimeParts};

use crate::frame::BitTable;
use crate::{SecondSignal, Window};

/// Timezone of the encoded calendar fields.
pub const TIME_ZONE: &str = "Asia/Shanghai";

/// Length of one frame, in seconds.
pub const FRAME_SECONDS: u32 = 20;

const FRAME_INDEX: [(usize, u32); 2] = [(2, 2), (3, 1)];
const HOUR: [(usize, u32); 4] = [(6, 8), (7, 4), (8, 2), (9, 1)];
const MINUTE: [(usize, u32); 6] = [(10, 32), (11, 16), (12, 8), (13, 4), (14, 2), (15, 1)];
const WEEKDAY: [(usize, u32); 4] = [(16, 8), (17, 4), (18, 2), (19, 1)];
const DAY: [(usize, u32); 6] = [(22, 32), (23, 16), (24, 8), (25, 4), (26, 2), (27, 1)];
const MONTH: [(usize, u32); 4] = [(28, 8), (29, 4), (30, 2), (31, 1)];
// Bit 6 of the year lives in P4
const YEAR: [(usize, u32); 7] = [(38, 64), (32, 32), (33, 16), (34, 8), (35, 4), (36, 2), (37, 1)];

const DIGITS: [&str; 4] = ["0", "1", "2", "3"];

/// An unpacked / uncompressed BPC message.
///
/// This type contains all of the components of one encoded 20 second BPC frame, but in an
/// unpacked format that is easier to inspect. See [`MessageUncompressed::pack`] for the bit table
/// that is transmitted.
#[derive(Debug, PartialEq)]
struct MessageUncompressed {
	/// Frame within the minute, ranged [0, 2].
	frame: u8,
	/// Hours, ranged [0, 23].
	hour: u8,
	/// Minutes, ranged [0, 59].
	minute: u8,
	/// Day of week, ranged [1, 7], where 1=Monday, 7=Sunday.
	weekday: u8,
	/// Day of month, ranged [1, 31].
	day: u8,
	/// Month, ranged [1, 12].
	month: u8,
	/// Year of the century, ranged [0, 99].
	year: u8
}

impl MessageUncompressed {
	/// Create a new BPC message for the given frame of the minute.
	fn new(parts: &TimeParts, frame: u8) -> MessageUncompressed {
		MessageUncompressed {
			frame,
			hour: parts.hour,
			minute: parts.minute,
			weekday: if parts.weekday > 0 { parts.weekday } else { 7 },
			day: parts.day,
			month: parts.month,
			year: parts.year.rem_euclid(100) as u8
		}
	}

	/// Pack the message into two bits per symbol.
	///
	/// Symbol `p` occupies bits `2p` (high) and `2p + 1` (low).
	fn pack(&self) -> BitTable<40> {
		let mut t = BitTable::new();
		t.write_weighted(self.frame.into(), &FRAME_INDEX);
		t.write_weighted(u32::from(self.hour % 12), &HOUR);
		t.write_weighted(self.minute.into(), &MINUTE);
		t.write_weighted(self.weekday.into(), &WEEKDAY);
		t.set(20, self.hour >= 12);
		t.set(21, t.parity(2..=19));
		t.write_weighted(self.day.into(), &DAY);
		t.write_weighted(self.month.into(), &MONTH);
		t.write_weighted(self.year.into(), &YEAR);
		t.set(39, t.parity(22..=37));
		t
	}
}

/// Get the digit transmitted for symbol `pos` of a frame.
#[inline]
fn digit(table: &BitTable<40>, pos: usize) -> usize {
	(usize::from(table.get(2 * pos).is_one()) << 1) | usize::from(table.get(2 * pos + 1).is_one())
}

/// Encode the second containing `instant`.
pub fn signal_for_second(instant: DateTime<Utc>) -> SecondSignal {
	let second = instant.second();
	let pos = (second % FRAME_SECONDS) as usize;
	if pos == 0 {
		return SecondSignal::new("M", &[]);
	}

	let parts = get_time_parts(instant, TIME_ZONE);
	let table = MessageUncompressed::new(&parts, (second / FRAME_SECONDS) as u8).pack();
	let value = digit(&table, pos);
	SecondSignal::new(DIGITS[value], &[Window::new(0., (value + 1) as f64 / 10.)])
}
