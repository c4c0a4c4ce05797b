//! Support for command line argument parsing.
//!
//! See [crate] documentation for details on command line arguments and examples.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use clap::Parser;
use signals::StationId;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "longwave", version)]
#[command(about = "Generate longwave time signals for setting radio-controlled clocks with no extra hardware")]
pub struct Args {
	/// Station to transmit: jjy-40, jjy-60, bpc, dcf77, msf or wwvb
	#[arg(required_unless_present = "list")]
	pub station: Option<StationId>,

	/// Full amplitude, from 0 to 1
	#[arg(short, long, default_value_t = 1.0)]
	pub volume: f64,

	/// Milliseconds added to the current time before encoding
	#[arg(short, long, default_value_t = 0, allow_negative_numbers = true, conflicts_with = "time")]
	pub offset_ms: i64,

	/// Stop after this many minutes instead of waiting for Ctrl-C
	#[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..))]
	pub minutes: Option<u64>,

	/// Transmit this RFC 3339 time instead of the current time
	#[arg(short, long)]
	pub time: Option<DateTime<FixedOffset>>,

	/// List the supported stations and exit
	#[arg(short, long)]
	pub list: bool,

	/// Print the symbols of the current minute and exit without playing audio
	#[arg(short, long)]
	pub dump: bool
}

impl Args {
	/// Clock offset to apply at `now`, in milliseconds.
	///
	/// With `--time`, this is the distance from `now` to the requested time.
	pub fn offset_ms(&self, now: DateTime<Utc>) -> i64 {
		match self.time {
			Some(t) => (t.with_timezone(&Utc) - now).num_milliseconds(),
			None => self.offset_ms
		}
	}

	/// How long to transmit, or `None` to run until interrupted.
	pub fn play_time(&self) -> Option<Duration> {
		self.minutes.map(|m| Duration::from_secs(m.saturating_mul(60)))
	}
}
