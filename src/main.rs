//! Generate longwave time signals using simple audio output.
//!
//! This crate can generate the public time signals [JJY] (40 and 60 kHz), [BPC], [DCF77], [MSF]
//! and [WWVB], outputting them to the device's default audio output. This works by taking
//! advantage of stray RF signals created by audio hardware as a side effect of their operation.
//! The audio itself is a square wave at an integer fraction of the station's carrier, so one of
//! its odd harmonics lands on the carrier frequency.
//!
//! [JJY]: https://en.wikipedia.org/wiki/JJY
//! [BPC]: https://en.wikipedia.org/wiki/BPC_(time_signal)
//! [DCF77]: https://en.wikipedia.org/wiki/DCF77
//! [MSF]: https://en.wikipedia.org/wiki/Time_from_NPL_(MSF)
//! [WWVB]: https://en.wikipedia.org/wiki/WWVB
//!
//! # Command Line Arguments
//!
//! General form: `longwave [options...] station`
//!
//! | Short form | Long form     | Argument           | Default      | Description                          |
//! | ---------- | ------------- | ------------------ | ------------ | ------------------------------------ |
//! | `-v`       | `--volume`    | Number in [0, 1]   | 1            | Full amplitude of the output         |
//! | `-o`       | `--offset-ms` | Integer            | 0            | Milliseconds added to the clock      |
//! | `-n`       | `--minutes`   | Integer > 0        | Until Ctrl-C | How long to transmit                 |
//! | `-t`       | `--time`      | [RFC 3339] time    | Current time | The time to transmit                 |
//! | `-l`       | `--list`      |                    |              | List the stations and exit           |
//! | `-d`       | `--dump`      |                    |              | Print the current minute and exit    |
//!
//! The station is one of `jjy-40`, `jjy-60`, `bpc`, `dcf77`, `msf` or `wwvb`. Log output is
//! controlled with `RUST_LOG` and defaults to `info`.
//!
//! [RFC 3339]: https://www.rfc-editor.org/rfc/rfc3339
//!
//! # Examples
//!
//! Transmit DCF77 until interrupted
//! ```sh
//! longwave dcf77
//! ```
//!
//! Transmit WWVB for 8 minutes at half volume
//! ```sh
//! longwave -n 8 -v 0.5 wwvb
//! ```
//!
//! Show what JJY transmits at a given time
//! ```sh
//! longwave --dump -t 2024-04-12T10:27:00+09:00 jjy-60
//! ```

use anyhow::{bail, Context};
use chrono::{DateTime, TimeDelta, Timelike, Utc};
use clap::Parser;
use engine::audio::cpal::CpalFactory;
use engine::{SignalEngine, StartRequest};
use signals::{Station, STATIONS};
use tokio::signal;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

use args::Args;

mod args;

/// Print the station catalog.
fn list() {
	println!("{:<8} {:<24} {:>10} {:>10}  {}", "ID", "STATION", "CARRIER", "AUDIO", "TIME ZONE");
	for s in STATIONS {
		println!(
			"{:<8} {:<24} {:>6.1} kHz {:>7.0} Hz  {}",
			s.id,
			s.label,
			s.carrier_hz / 1000.,
			s.base_hz,
			s.time_zone
		);
	}
}

/// Print the symbols transmitted during the minute containing `instant`, ten seconds per line.
fn dump(station: &Station, instant: DateTime<Utc>) {
	let start = instant.with_nanosecond(0).unwrap_or(instant);
	let start = start.checked_sub_signed(TimeDelta::seconds(i64::from(start.second()))).unwrap_or(start);
	println!("{} {}", station.id, start.format("%Y-%m-%d %H:%M UTC"));
	for (i, row) in station.minute_symbols(start).chunks(10).enumerate() {
		println!("{:02}  {}", i * 10, row.join(" "));
	}
}

/// Main program entry point.
///
/// Parses input arguments and plays time signal audio output. See [`crate`] documentation for
/// details.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let args = Args::parse();
	if args.list {
		list();
		return Ok(());
	}
	let Some(id) = args.station else {
		bail!("no station given");
	};

	let offset_ms = args.offset_ms(Utc::now());
	if args.dump {
		let instant = TimeDelta::try_milliseconds(offset_ms).and_then(|d| Utc::now().checked_add_signed(d));
		let Some(instant) = instant else {
			bail!("clock offset out of range: {} ms", offset_ms);
		};
		dump(id.station(), instant);
		return Ok(());
	}

	let engine = SignalEngine::new(CpalFactory::default());
	engine
		.start(StartRequest::new(id.as_str(), args.volume).with_offset_ms(offset_ms))
		.await
		.with_context(|| format!("failed to start {}", id))?;
	info!(station = %id, label = id.station().label, "transmitting, press Ctrl-C to stop");

	match args.play_time() {
		Some(duration) => {
			tokio::select! {
				_ = sleep(duration) => (),
				r = signal::ctrl_c() => r.context("failed to listen for Ctrl-C")?
			}
		},
		None => signal::ctrl_c().await.context("failed to listen for Ctrl-C")?
	}

	engine.stop();
	Ok(())
}
