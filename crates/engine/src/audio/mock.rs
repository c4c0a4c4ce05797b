//! Recording audio backend for tests.
//!
//! The audio clock is the paused Tokio clock, so tests control time with
//! `tokio::time::advance` and `tokio::time::sleep`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::{AudioContext, ContextFactory, Gain, Oscillator, ResumeFuture};
use crate::{AudioError, WallClock};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Event {
	Create,
	Resume,
	Gain { value: f64, time: f64 },
	Start(f64),
	Stop,
	DisconnectOscillator,
	DisconnectGain,
	Close
}

#[derive(Default)]
pub(crate) struct Recorder(Mutex<Vec<Event>>);

impl Recorder {
	fn push(&self, event: Event) {
		self.0.lock().unwrap().push(event);
	}

	pub fn events(&self) -> Vec<Event> {
		self.0.lock().unwrap().clone()
	}

	pub fn count(&self, event: &Event) -> usize {
		self.0.lock().unwrap().iter().filter(|&e| e == event).count()
	}

	/// All gain changes as `(value, time)`.
	pub fn gains(&self) -> Vec<(f64, f64)> {
		self.0
			.lock()
			.unwrap()
			.iter()
			.filter_map(|e| match *e {
				Event::Gain { value, time } => Some((value, time)),
				_ => None
			})
			.collect()
	}
}

pub(crate) struct MockFactory {
	pub recorder: Arc<Recorder>,
	/// Contexts start suspended.
	pub suspended: bool,
	/// Resuming waits for this gate, if set.
	pub gate: Mutex<Option<oneshot::Receiver<()>>>,
	/// Creating a context fails.
	pub fail: bool
}

impl MockFactory {
	pub fn new() -> (MockFactory, Arc<Recorder>) {
		let recorder = Arc::new(Recorder::default());
		let factory = MockFactory {
			recorder: recorder.clone(),
			suspended: false,
			gate: Mutex::new(None),
			fail: false
		};
		(factory, recorder)
	}
}

impl ContextFactory for MockFactory {
	type Context = MockContext;

	fn create(&self) -> Result<MockContext, AudioError> {
		if self.fail {
			return Err(AudioError::NoDevice);
		}
		self.recorder.push(Event::Create);
		Ok(MockContext {
			recorder: self.recorder.clone(),
			origin: Instant::now(),
			suspended: Arc::new(AtomicBool::new(self.suspended)),
			gate: Mutex::new(self.gate.lock().unwrap().take()),
			closed: false
		})
	}
}

pub(crate) struct MockContext {
	recorder: Arc<Recorder>,
	origin: Instant,
	suspended: Arc<AtomicBool>,
	gate: Mutex<Option<oneshot::Receiver<()>>>,
	closed: bool
}

impl AudioContext for MockContext {
	type Oscillator = MockOscillator;
	type Gain = MockGain;

	fn current_time(&self) -> f64 {
		self.origin.elapsed().as_secs_f64()
	}

	fn is_suspended(&self) -> bool {
		self.suspended.load(Ordering::SeqCst)
	}

	fn resume(&self) -> ResumeFuture {
		let gate = self.gate.lock().unwrap().take();
		let suspended = self.suspended.clone();
		let recorder = self.recorder.clone();
		Box::pin(async move {
			if let Some(gate) = gate {
				let _ = gate.await;
			}
			suspended.store(false, Ordering::SeqCst);
			recorder.push(Event::Resume);
			Ok(())
		})
	}

	fn create_gain(&mut self) -> Result<MockGain, AudioError> {
		Ok(MockGain { recorder: self.recorder.clone() })
	}

	fn create_oscillator(&mut self, _frequency: f64, _output: &MockGain) -> Result<MockOscillator, AudioError> {
		Ok(MockOscillator {
			recorder: self.recorder.clone(),
			stopped: false
		})
	}

	fn close(&mut self) -> Result<(), AudioError> {
		if self.closed {
			return Err(AudioError::Closed);
		}
		self.closed = true;
		self.recorder.push(Event::Close);
		Ok(())
	}
}

pub(crate) struct MockOscillator {
	recorder: Arc<Recorder>,
	stopped: bool
}

impl Oscillator for MockOscillator {
	fn start(&mut self, time: f64) -> Result<(), AudioError> {
		self.recorder.push(Event::Start(time));
		Ok(())
	}

	fn stop(&mut self) -> Result<(), AudioError> {
		if self.stopped {
			return Err(AudioError::AlreadyStopped);
		}
		self.stopped = true;
		self.recorder.push(Event::Stop);
		Ok(())
	}

	fn disconnect(&mut self) {
		self.recorder.push(Event::DisconnectOscillator);
	}
}

pub(crate) struct MockGain {
	recorder: Arc<Recorder>
}

impl Gain for MockGain {
	fn set_value_at_time(&mut self, value: f64, time: f64) {
		self.recorder.push(Event::Gain { value, time });
	}

	fn disconnect(&mut self) {
		self.recorder.push(Event::DisconnectGain);
	}
}

/// Wall clock that starts at `base` and follows the Tokio clock.
pub(crate) struct TestClock {
	base: DateTime<Utc>,
	origin: Instant
}

impl TestClock {
	pub fn new(base: DateTime<Utc>) -> TestClock {
		TestClock { base, origin: Instant::now() }
	}
}

impl WallClock for TestClock {
	fn now(&self) -> DateTime<Utc> {
		let elapsed = TimeDelta::from_std(self.origin.elapsed()).unwrap_or(TimeDelta::zero());
		self.base + elapsed
	}
}

/// Compare floats produced by adding fractional offsets.
pub(crate) fn approx(a: f64, b: f64) -> bool {
	(a - b).abs() < 1e-9
}
