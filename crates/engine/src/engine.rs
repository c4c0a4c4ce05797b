use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use signals::get_station_by_id;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::audio::{AudioContext, ContextFactory};
use crate::session::{offset_target, EngineSession};
use crate::{clamp_volume, EngineError, StartRequest, SystemClock, WallClock, TICK_PERIOD};

/// Lifecycle of a [`SignalEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
	/// Never started.
	Idle,
	/// Waiting for the audio context to resume.
	Starting,
	/// Playing a station.
	Running,
	/// Stopped. Starting again behaves exactly as from [`Phase::Idle`].
	Stopped
}

struct EngineState<C: AudioContext> {
	/// Incremented by every `start` and `stop`. Continuations holding an older value are stale.
	generation: u64,
	phase: Phase,
	session: Option<EngineSession<C>>
}

impl<C: AudioContext> EngineState<C> {
	/// Invalidate in-flight work and destroy the active session, if any.
	fn supersede(&mut self) -> u64 {
		self.generation += 1;
		if let Some(session) = self.session.take() {
			debug!(old = session.generation, new = self.generation, "superseding session");
			session.destroy();
		}
		self.generation
	}
}

/// Plays time signals through an audio backend.
///
/// The engine is cheap to clone; clones control the same playback. At most one station plays at a
/// time, and starting a new station tears down the previous one first.
///
/// All methods are safe to call in any order and from any state. `start` must be called from
/// within a Tokio runtime, which hosts the scheduling task.
pub struct SignalEngine<F: ContextFactory, W: WallClock = SystemClock> {
	factory: Arc<F>,
	clock: Arc<W>,
	state: Arc<Mutex<EngineState<F::Context>>>
}

impl<F: ContextFactory, W: WallClock> Clone for SignalEngine<F, W> {
	fn clone(&self) -> Self {
		SignalEngine {
			factory: self.factory.clone(),
			clock: self.clock.clone(),
			state: self.state.clone()
		}
	}
}

impl<F: ContextFactory> SignalEngine<F> {
	/// Create an idle engine using the system clock.
	pub fn new(factory: F) -> SignalEngine<F> {
		SignalEngine::with_clock(factory, SystemClock)
	}
}

impl<F: ContextFactory, W: WallClock> SignalEngine<F, W> {
	/// Create an idle engine using `clock` for wall clock time.
	pub fn with_clock(factory: F, clock: W) -> SignalEngine<F, W> {
		SignalEngine {
			factory: Arc::new(factory),
			clock: Arc::new(clock),
			state: Arc::new(Mutex::new(EngineState {
				generation: 0,
				phase: Phase::Idle,
				session: None
			}))
		}
	}

	fn lock(&self) -> MutexGuard<'_, EngineState<F::Context>> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Current lifecycle phase.
	pub fn phase(&self) -> Phase {
		self.lock().phase
	}

	/// Whether a station is playing.
	pub fn is_running(&self) -> bool {
		self.phase() == Phase::Running
	}

	/// Start playing `request.station`.
	///
	/// Any active session is torn down first. The new session starts transmitting at the next whole
	/// second of the wall clock plus `request.offset_ms`. If the audio context starts suspended,
	/// this waits for it to resume; a `stop` or another `start` during that wait cancels this call,
	/// which then returns `Ok(())` without arming the scheduler.
	///
	/// # Errors
	///
	/// Returns [`EngineError::UnknownStation`] for ids not in the catalog and
	/// [`EngineError::InvalidOffset`] if the offset moves the clock out of range, leaving any active
	/// session untouched in both cases. Returns [`EngineError::Audio`] if the audio graph cannot be created or
	/// resumed, leaving the engine stopped.
	pub async fn start(&self, request: StartRequest) -> Result<(), EngineError> {
		let Some(station) = get_station_by_id(&request.station) else {
			return Err(EngineError::UnknownStation(request.station));
		};

		let (generation, resume) = {
			let mut state = self.lock();
			let Some(target) = offset_target(self.clock.now(), request.offset_ms) else {
				return Err(EngineError::InvalidOffset(request.offset_ms));
			};
			let generation = state.supersede();
			state.phase = Phase::Starting;
			let session = self.factory.create().and_then(|context| {
				EngineSession::open(context, station, clamp_volume(request.volume), target, generation)
			});
			let session = match session {
				Ok(s) => s,
				Err(e) => {
					state.phase = Phase::Stopped;
					return Err(e.into());
				}
			};

			let resume = session.context().is_suspended().then(|| session.context().resume());
			state.session = Some(session);
			info!(station = station.id, offset_ms = request.offset_ms, "starting");
			(generation, resume)
		};

		// Dropping this future before it finishes tears the new session down
		let mut guard = StartGuard {
			state: &self.state,
			generation,
			armed: true
		};

		if let Some(resume) = resume {
			let resumed = resume.await;
			let mut state = self.lock();
			if state.generation != generation {
				debug!(generation, "start superseded while resuming");
				return Ok(());
			}
			if let Err(e) = resumed {
				state.supersede();
				state.phase = Phase::Stopped;
				return Err(e.into());
			}
		}

		let mut state = self.lock();
		if state.generation != generation {
			debug!(generation, "start superseded");
			return Ok(());
		}
		let ticker = spawn_ticker(Arc::downgrade(&self.state), generation);
		if let Some(session) = state.session.as_mut() {
			session.schedule();
			session.ticker = Some(ticker);
		}
		state.phase = Phase::Running;
		guard.armed = false;
		Ok(())
	}

	/// Stop playback and release the audio context.
	///
	/// Safe to call repeatedly and before any `start`.
	pub fn stop(&self) {
		let mut state = self.lock();
		let had_session = state.session.is_some();
		state.supersede();
		if state.phase != Phase::Idle {
			state.phase = Phase::Stopped;
		}
		if had_session {
			info!("stopped");
		}
	}

	/// Change the full amplitude, clamped to [0, 1].
	///
	/// Takes effect immediately. Gain changes already scheduled keep the previous level; later
	/// seconds use the new one. Does nothing when no station is playing.
	pub fn set_volume(&self, volume: f64) {
		if let Some(session) = self.lock().session.as_mut() {
			session.set_volume(clamp_volume(volume));
		}
	}
}

/// Supersedes the session of an unfinished `start` when dropped while armed.
struct StartGuard<'a, C: AudioContext> {
	state: &'a Mutex<EngineState<C>>,
	generation: u64,
	armed: bool
}

impl<C: AudioContext> Drop for StartGuard<'_, C> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		if state.generation == self.generation {
			debug!(generation = self.generation, "start cancelled");
			state.supersede();
			state.phase = Phase::Stopped;
		}
	}
}

/// Periodically run the scheduler of the session created by `generation`.
///
/// The task ends once the engine is dropped or the session is superseded.
fn spawn_ticker<C: AudioContext>(state: Weak<Mutex<EngineState<C>>>, generation: u64) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
		loop {
			interval.tick().await;
			let Some(shared) = state.upgrade() else {
				break;
			};
			let mut guard = shared.lock().unwrap_or_else(PoisonError::into_inner);
			if guard.generation != generation {
				break;
			}
			if let Some(session) = guard.session.as_mut() {
				session.schedule();
			}
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::audio::mock::{approx, Event, MockFactory, Recorder, TestClock};
	use crate::LOOKAHEAD;
	use chrono::{DateTime, TimeDelta, TimeZone, Utc};
	use signals::get_station_signal;
	use std::time::Duration;
	use tokio::sync::oneshot;
	use tokio::time::sleep;

	type TestEngine = SignalEngine<MockFactory, TestClock>;

	/// Mon, Jan 1, 2024. 00:00:00.250 UTC
	fn base() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::milliseconds(250)
	}

	fn engine_with(factory: MockFactory) -> TestEngine {
		SignalEngine::with_clock(factory, TestClock::new(base()))
	}

	fn engine() -> (TestEngine, Arc<Recorder>) {
		let (factory, recorder) = MockFactory::new();
		(engine_with(factory), recorder)
	}

	/// Expected gain changes for seconds `0..n` of a session starting at audio time 0.75.
	fn expected_gains(station: &str, volume: f64, low_ratio: f64, n: i64) -> Vec<(f64, f64)> {
		let wall_base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();
		let mut gains = vec![(volume, 0.75)];
		for k in 0..n {
			let s = get_station_signal(station, wall_base + TimeDelta::seconds(k));
			for w in crate::session::coalesce(&s.windows) {
				gains.push((volume * low_ratio, 0.75 + k as f64 + w.start));
				gains.push((volume, 0.75 + k as f64 + w.end));
			}
		}
		gains
	}

	fn assert_gains(actual: &[(f64, f64)], expected: &[(f64, f64)]) {
		assert_eq!(actual.len(), expected.len(), "{:?}\n{:?}", actual, expected);
		for (a, e) in actual.iter().zip(expected) {
			assert!(approx(a.0, e.0) && approx(a.1, e.1), "{:?}\n{:?}", actual, expected);
		}
	}

	#[tokio::test(start_paused = true)]
	async fn lifecycle_test() {
		let (engine, recorder) = engine();
		assert_eq!(engine.phase(), Phase::Idle);

		engine.start(StartRequest::new("jjy-60", 0.5)).await.unwrap();
		assert_eq!(engine.phase(), Phase::Running);
		assert!(engine.is_running());
		assert_eq!(recorder.count(&Event::Create), 1);
		assert_eq!(recorder.count(&Event::Start(0.75)), 1);
		assert_eq!(recorder.count(&Event::Resume), 0);

		engine.stop();
		assert_eq!(engine.phase(), Phase::Stopped);
		for e in [Event::Stop, Event::DisconnectOscillator, Event::DisconnectGain, Event::Close] {
			assert_eq!(recorder.count(&e), 1, "{:?}", e);
		}

		// Stopping again changes nothing
		let events = recorder.events();
		engine.stop();
		engine.set_volume(1.);
		assert_eq!(recorder.events(), events);
		assert_eq!(engine.phase(), Phase::Stopped);

		// No ticks after stop
		sleep(Duration::from_secs(3)).await;
		assert_eq!(recorder.events(), events);

		// Stopped behaves like idle
		engine.start(StartRequest::new("jjy-60", 0.5)).await.unwrap();
		assert_eq!(engine.phase(), Phase::Running);
		assert_eq!(recorder.count(&Event::Create), 2);
		engine.stop();
		assert_eq!(recorder.count(&Event::Close), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn stop_before_start_test() {
		let (engine, recorder) = engine();
		engine.stop();
		engine.stop();
		engine.set_volume(0.3);
		assert_eq!(engine.phase(), Phase::Idle);
		assert!(recorder.events().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn schedule_test() {
		let (engine, recorder) = engine();
		engine.start(StartRequest::new("jjy-60", 0.5)).await.unwrap();

		// The first pass covers only the second starting within the look-ahead
		assert_gains(&recorder.gains(), &[(0.5, 0.75), (0.05, 1.55), (0.5, 1.75)]);

		// Ticks extend the schedule
		sleep(Duration::from_millis(650)).await;
		assert_gains(&recorder.gains(), &expected_gains("jjy-60", 0.5, 0.1, 2));

		// Last tick at 9.96 s schedules every second starting before 11.16 s
		sleep(Duration::from_millis(9400)).await;
		assert_gains(&recorder.gains(), &expected_gains("jjy-60", 0.5, 0.1, 11));

		// Nothing is scheduled beyond the horizon
		let last = recorder.gains().last().map(|g| g.1).unwrap();
		assert!(last < 10.05 + LOOKAHEAD.as_secs_f64() + 1.);
		engine.stop();
	}

	#[tokio::test(start_paused = true)]
	async fn offset_test() {
		let (engine, recorder) = engine();
		// 00:00:00.250 + 1.5 s => next whole second is 00:00:02, 0.25 s from now
		engine.start(StartRequest::new("dcf77", 1.).with_offset_ms(1500)).await.unwrap();
		assert_eq!(recorder.count(&Event::Start(0.25)), 1);

		// A negative offset can move the target into the previous second
		engine.start(StartRequest::new("dcf77", 1.).with_offset_ms(-500)).await.unwrap();
		assert_eq!(recorder.count(&Event::Start(0.25)), 2);

		engine.start(StartRequest::new("dcf77", 1.).with_offset_ms(750)).await.unwrap();
		assert_eq!(recorder.count(&Event::Start(0.)), 1);
		engine.stop();
	}

	#[tokio::test(start_paused = true)]
	async fn coalesce_test() {
		let (factory, recorder) = MockFactory::new();
		// Seconds 54 and 55 of this MSF minute carry "11" and "10"
		let wall = Utc.with_ymd_and_hms(2024, 5, 26, 16, 57, 54).unwrap();
		let engine: TestEngine = SignalEngine::with_clock(factory, TestClock::new(wall));
		engine.start(StartRequest::new("msf", 1.)).await.unwrap();

		// Touching windows become a single carrier-off interval
		assert_gains(&recorder.gains(), &[(1., 0.), (0., 0.), (1., 0.3), (0., 1.), (1., 1.2)]);
		engine.stop();
	}

	#[tokio::test(start_paused = true)]
	async fn volume_test() {
		let (engine, recorder) = engine();
		engine.start(StartRequest::new("jjy-60", 2.)).await.unwrap();
		assert_eq!(recorder.gains()[0], (1., 0.75));

		sleep(Duration::from_millis(200)).await;
		engine.set_volume(0.25);
		let gains = recorder.gains();
		let last = gains.last().unwrap();
		assert!(approx(last.0, 0.25) && approx(last.1, 0.2), "{:?}", gains);

		// Later seconds use the new level
		let n = gains.len();
		sleep(Duration::from_millis(600)).await;
		let gains = recorder.gains();
		assert_eq!(gains.len(), n + 2);
		assert!(approx(gains[n].0, 0.025));
		assert!(approx(gains[n + 1].0, 0.25));

		engine.set_volume(f64::NAN);
		assert_eq!(recorder.gains().last().unwrap().0, 0.);
		engine.stop();
	}

	#[tokio::test(start_paused = true)]
	async fn restart_test() {
		let (engine, recorder) = engine();
		engine.start(StartRequest::new("jjy-60", 0.5)).await.unwrap();
		engine.start(StartRequest::new("wwvb", 0.5)).await.unwrap();
		assert_eq!(engine.phase(), Phase::Running);

		// The first session is torn down before the second is created
		let events = recorder.events();
		let close = events.iter().position(|e| *e == Event::Close).unwrap();
		let creates: Vec<usize> = events
			.iter()
			.enumerate()
			.filter(|(_, e)| **e == Event::Create)
			.map(|(i, _)| i)
			.collect();
		assert_eq!(creates.len(), 2);
		assert!(creates[0] < close && close < creates[1]);
		assert_eq!(recorder.count(&Event::Stop), 1);

		// Only one ticker remains
		let n = recorder.gains().len();
		sleep(Duration::from_millis(1000)).await;
		assert_eq!(recorder.gains().len(), n + 2);
		engine.stop();
		assert_eq!(recorder.count(&Event::Close), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn resume_test() {
		let (mut factory, recorder) = MockFactory::new();
		factory.suspended = true;
		let engine = engine_with(factory);
		engine.start(StartRequest::new("bpc", 0.5)).await.unwrap();
		assert_eq!(engine.phase(), Phase::Running);
		assert_eq!(recorder.count(&Event::Resume), 1);
		engine.stop();
	}

	#[tokio::test(start_paused = true)]
	async fn stop_during_resume_test() {
		let (mut factory, recorder) = MockFactory::new();
		let (tx, rx) = oneshot::channel();
		factory.suspended = true;
		factory.gate = std::sync::Mutex::new(Some(rx));
		let engine = engine_with(factory);

		let start = engine.start(StartRequest::new("dcf77", 0.5));
		let cancel = async {
			tokio::task::yield_now().await;
			assert_eq!(engine.phase(), Phase::Starting);
			engine.stop();
			let _ = tx.send(());
		};
		let (result, _) = tokio::join!(start, cancel);
		assert!(result.is_ok());
		assert_eq!(engine.phase(), Phase::Stopped);
		assert_eq!(recorder.count(&Event::Resume), 1);
		assert_eq!(recorder.count(&Event::Stop), 1);
		assert_eq!(recorder.count(&Event::Close), 1);

		// No ticker was armed
		let events = recorder.events();
		sleep(Duration::from_secs(5)).await;
		assert_eq!(recorder.events(), events);
	}

	#[tokio::test(start_paused = true)]
	async fn error_test() {
		let (engine, recorder) = engine();
		let e = engine.start(StartRequest::new("nope", 0.5)).await;
		assert!(matches!(e, Err(EngineError::UnknownStation(ref s)) if s == "nope"));
		assert_eq!(engine.phase(), Phase::Idle);
		assert!(recorder.events().is_empty());

		let (mut factory, _) = MockFactory::new();
		factory.fail = true;
		let engine = engine_with(factory);
		let e = engine.start(StartRequest::new("msf", 0.5)).await;
		assert!(matches!(e, Err(EngineError::Audio(_))));
		assert_eq!(engine.phase(), Phase::Stopped);
		engine.stop();
	}

	#[tokio::test(start_paused = true)]
	async fn offset_range_test() {
		let (engine, recorder) = engine();
		engine.start(StartRequest::new("dcf77", 0.5)).await.unwrap();
		let events = recorder.events();

		for offset_ms in [i64::MAX, i64::MIN] {
			let e = engine.start(StartRequest::new("dcf77", 0.5).with_offset_ms(offset_ms)).await;
			assert!(matches!(e, Err(EngineError::InvalidOffset(o)) if o == offset_ms));
			// The running session is untouched
			assert_eq!(engine.phase(), Phase::Running);
			assert_eq!(recorder.events(), events);
		}
		engine.stop();
		assert_eq!(recorder.count(&Event::Close), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn dropped_start_test() {
		let (mut factory, recorder) = MockFactory::new();
		let (_tx, rx) = oneshot::channel::<()>();
		factory.suspended = true;
		factory.gate = std::sync::Mutex::new(Some(rx));
		let engine = engine_with(factory);

		// Resume never completes, so the start future is dropped mid-flight
		let start = engine.start(StartRequest::new("wwvb", 0.5));
		assert!(tokio::time::timeout(Duration::from_millis(100), start).await.is_err());
		assert_eq!(engine.phase(), Phase::Stopped);
		assert_eq!(recorder.count(&Event::Stop), 1);
		assert_eq!(recorder.count(&Event::Close), 1);

		let events = recorder.events();
		sleep(Duration::from_secs(3)).await;
		assert_eq!(recorder.events(), events);

		engine.start(StartRequest::new("wwvb", 0.5)).await.unwrap();
		assert_eq!(engine.phase(), Phase::Running);
		engine.stop();
	}
}
