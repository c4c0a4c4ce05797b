//! Audio backend using the default output device through [`cpal`](::cpal).
//!
//! Each [`CpalContext`] owns one mono output stream at a fixed sample rate. The stream lives on a
//! dedicated thread since streams cannot move between threads on every platform. Oscillators and
//! gain nodes are handles that send commands to a renderer running inside the stream callback.
//! The renderer synthesizes a band-limited square wave and applies each gain change on the exact
//! sample it was scheduled for.
//!
//! The audio clock counts rendered frames. It stays at zero while the context is suspended, and a
//! context starts suspended until [`AudioContext::resume`] is called.

use std::collections::VecDeque;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{channel, sync_channel, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ::cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ::cpal::{BufferSize, OutputCallbackInfo, Sample, SampleRate, Stream, StreamConfig, StreamError};
use tokio::sync::oneshot;
use tracing::{debug, error};

use super::{AudioContext, ContextFactory, Gain, Oscillator, ResumeFuture};
use crate::AudioError;

/// Opens [`CpalContext`]s on the default output device.
///
/// Defaults to 48 kHz with 1024 frame buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpalFactory {
	pub sample_rate: u32,
	pub buffer_size: u32
}

impl Default for CpalFactory {
	fn default() -> CpalFactory {
		CpalFactory {
			sample_rate: 48000,
			buffer_size: 1024
		}
	}
}

impl ContextFactory for CpalFactory {
	type Context = CpalContext;

	fn create(&self) -> Result<CpalContext, AudioError> {
		let config = StreamConfig {
			channels: 1,
			sample_rate: SampleRate(self.sample_rate),
			buffer_size: BufferSize::Fixed(self.buffer_size)
		};
		let shared = Arc::new(Shared {
			frames: AtomicU64::new(0),
			suspended: AtomicBool::new(true)
		});
		let (ready_tx, ready_rx) = sync_channel(1);
		let (control_tx, control_rx) = channel();
		let (command_tx, command_rx) = channel();

		let thread = thread::Builder::new()
			.name("audio-output".into())
			.spawn({
				let shared = shared.clone();
				move || run_stream(config, command_rx, control_rx, shared, ready_tx)
			})
			.map_err(|e| AudioError::Unavailable(e.to_string()))?;

		match ready_rx.recv() {
			Ok(Ok(())) => (),
			Ok(Err(e)) => {
				let _ = thread.join();
				return Err(e);
			},
			Err(_) => return Err(AudioError::Unavailable("audio thread exited".into()))
		}

		debug!(sample_rate = self.sample_rate, buffer_size = self.buffer_size, "audio context created");
		Ok(CpalContext {
			shared,
			sample_rate: f64::from(self.sample_rate),
			commands: command_tx,
			control: Some(control_tx),
			thread: Some(thread),
			next_gain: 0,
			next_voice: 0
		})
	}
}

/// State shared between a context and its stream callback.
struct Shared {
	/// Frames rendered since the context was resumed.
	frames: AtomicU64,
	suspended: AtomicBool
}

/// Messages to the thread owning the stream.
enum Control {
	Play(oneshot::Sender<Result<(), AudioError>>),
	Close
}

/// Messages to the renderer. Times are in seconds on the audio clock.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Command {
	AddGain,
	AddVoice { frequency: f64, gain: usize },
	Start { voice: usize, time: f64 },
	Stop { voice: usize },
	SetGain { gain: usize, value: f64, time: f64 },
	DisconnectVoice { voice: usize },
	DisconnectGain { gain: usize }
}

/// Body of the stream thread: build the stream, then serve control messages until closed.
fn run_stream(
	config: StreamConfig,
	commands: Receiver<Command>,
	control: Receiver<Control>,
	shared: Arc<Shared>,
	ready: SyncSender<Result<(), AudioError>>
) {
	let stream = match build_stream(&config, commands, shared.clone()) {
		Ok(s) => s,
		Err(e) => {
			let _ = ready.send(Err(e));
			return;
		}
	};
	// Some hosts start streams on creation
	if let Err(e) = stream.pause() {
		debug!("ignoring error pausing new stream: {}", e);
	}
	if ready.send(Ok(())).is_err() {
		return;
	}

	while let Ok(message) = control.recv() {
		match message {
			Control::Play(reply) => {
				let result = stream.play().map_err(AudioError::from);
				if result.is_ok() {
					shared.suspended.store(false, Ordering::SeqCst);
				}
				let _ = reply.send(result);
			},
			Control::Close => break
		}
	}
	debug!("audio stream closed");
}

fn build_stream(config: &StreamConfig, commands: Receiver<Command>, shared: Arc<Shared>) -> Result<Stream, AudioError> {
	let host = ::cpal::default_host();
	let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
	let mut renderer = Renderer::new(f64::from(config.sample_rate.0), commands);

	let stream = device.build_output_stream(
		config,
		move |data: &mut [f32], _info: &OutputCallbackInfo| {
			renderer.drain();
			if shared.suspended.load(Ordering::SeqCst) {
				data.iter_mut().for_each(|v| *v = f32::EQUILIBRIUM);
				return;
			}
			let start = shared.frames.load(Ordering::SeqCst);
			renderer.render(data, start);
			shared.frames.fetch_add(data.len() as u64, Ordering::SeqCst);
		},
		stream_error,
		None
	)?;
	Ok(stream)
}

/// Error handler for audio streaming.
fn stream_error(error: StreamError) {
	error!("error occurred on the audio stream: {}", error);
}

/// An output stream on the default device.
pub struct CpalContext {
	shared: Arc<Shared>,
	sample_rate: f64,
	commands: Sender<Command>,
	/// `None` once closed.
	control: Option<Sender<Control>>,
	thread: Option<JoinHandle<()>>,
	next_gain: usize,
	next_voice: usize
}

impl AudioContext for CpalContext {
	type Oscillator = CpalOscillator;
	type Gain = CpalGain;

	fn current_time(&self) -> f64 {
		self.shared.frames.load(Ordering::SeqCst) as f64 / self.sample_rate
	}

	fn is_suspended(&self) -> bool {
		self.shared.suspended.load(Ordering::SeqCst)
	}

	fn resume(&self) -> ResumeFuture {
		let (reply_tx, reply_rx) = oneshot::channel();
		let sent = self
			.control
			.as_ref()
			.is_some_and(|control| control.send(Control::Play(reply_tx)).is_ok());
		Box::pin(async move {
			if !sent {
				return Err(AudioError::Closed);
			}
			reply_rx.await.unwrap_or(Err(AudioError::Closed))
		})
	}

	fn create_gain(&mut self) -> Result<CpalGain, AudioError> {
		self.send(Command::AddGain)?;
		let id = self.next_gain;
		self.next_gain += 1;
		Ok(CpalGain {
			id,
			commands: self.commands.clone()
		})
	}

	fn create_oscillator(&mut self, frequency: f64, output: &CpalGain) -> Result<CpalOscillator, AudioError> {
		self.send(Command::AddVoice {
			frequency,
			gain: output.id
		})?;
		let id = self.next_voice;
		self.next_voice += 1;
		Ok(CpalOscillator {
			id,
			commands: self.commands.clone(),
			stopped: false
		})
	}

	fn close(&mut self) -> Result<(), AudioError> {
		let control = self.control.take().ok_or(AudioError::Closed)?;
		let _ = control.send(Control::Close);
		if let Some(thread) = self.thread.take() {
			if thread.join().is_err() {
				error!("audio thread panicked");
			}
		}
		Ok(())
	}
}

impl CpalContext {
	fn send(&self, command: Command) -> Result<(), AudioError> {
		if self.control.is_none() {
			return Err(AudioError::Closed);
		}
		self.commands.send(command).map_err(|_| AudioError::Closed)
	}
}

impl Drop for CpalContext {
	fn drop(&mut self) {
		if self.control.is_some() {
			let _ = self.close();
		}
	}
}

/// Handle to a square wave voice in a [`CpalContext`].
pub struct CpalOscillator {
	id: usize,
	commands: Sender<Command>,
	stopped: bool
}

impl Oscillator for CpalOscillator {
	fn start(&mut self, time: f64) -> Result<(), AudioError> {
		self.commands
			.send(Command::Start { voice: self.id, time })
			.map_err(|_| AudioError::Closed)
	}

	fn stop(&mut self) -> Result<(), AudioError> {
		if self.stopped {
			return Err(AudioError::AlreadyStopped);
		}
		self.stopped = true;
		self.commands
			.send(Command::Stop { voice: self.id })
			.map_err(|_| AudioError::Closed)
	}

	fn disconnect(&mut self) {
		let _ = self.commands.send(Command::DisconnectVoice { voice: self.id });
	}
}

/// Handle to a gain node in a [`CpalContext`].
pub struct CpalGain {
	id: usize,
	commands: Sender<Command>
}

impl Gain for CpalGain {
	fn set_value_at_time(&mut self, value: f64, time: f64) {
		let _ = self.commands.send(Command::SetGain {
			gain: self.id,
			value,
			time
		});
	}

	fn disconnect(&mut self) {
		let _ = self.commands.send(Command::DisconnectGain { gain: self.id });
	}
}

/// Scheduled gain values of one node.
#[derive(Debug)]
struct GainTimeline {
	value: f64,
	/// Pending changes as `(frame, value)`, sorted by frame. Equal frames keep insertion order.
	events: VecDeque<(u64, f64)>,
	connected: bool
}

impl GainTimeline {
	fn new() -> GainTimeline {
		GainTimeline {
			value: 1.,
			events: VecDeque::new(),
			connected: true
		}
	}

	fn set(&mut self, frame: u64, value: f64) {
		let i = self.events.partition_point(|e| e.0 <= frame);
		self.events.insert(i, (frame, value));
	}

	/// Gain at `frame`. Frames must not decrease between calls.
	fn value_at(&mut self, frame: u64) -> f64 {
		while let Some(&(f, v)) = self.events.front() {
			if f > frame {
				break;
			}
			self.value = v;
			self.events.pop_front();
		}
		self.value
	}
}

/// A band-limited square wave.
#[derive(Debug)]
struct Voice {
	gain: usize,
	/// Phase increment per frame, in cycles.
	step: f64,
	/// Current phase in [0, 1).
	phase: f64,
	/// Odd harmonics below the Nyquist frequency.
	harmonics: Vec<u32>,
	start: Option<u64>,
	stopped: bool,
	connected: bool
}

impl Voice {
	fn new(frequency: f64, gain: usize, sample_rate: f64) -> Voice {
		let nyquist = sample_rate / 2.;
		let harmonics = (1..)
			.step_by(2)
			.take_while(|&n| f64::from(n) * frequency < nyquist)
			.collect();
		Voice {
			gain,
			step: frequency / sample_rate,
			phase: 0.,
			harmonics,
			start: None,
			stopped: false,
			connected: true
		}
	}

	fn is_playing(&self, frame: u64) -> bool {
		self.connected && !self.stopped && self.start.is_some_and(|s| frame >= s)
	}

	/// Produce the next sample and advance the phase.
	fn sample(&mut self) -> f64 {
		let x = 2. * PI * self.phase;
		let sum: f64 = self.harmonics.iter().map(|&n| (f64::from(n) * x).sin() / f64::from(n)).sum();
		self.phase = (self.phase + self.step).fract();
		4. / PI * sum
	}
}

/// Synthesizes the audio graph of a context, one buffer at a time.
struct Renderer {
	sample_rate: f64,
	commands: Receiver<Command>,
	gains: Vec<GainTimeline>,
	voices: Vec<Voice>
}

impl Renderer {
	fn new(sample_rate: f64, commands: Receiver<Command>) -> Renderer {
		Renderer {
			sample_rate,
			commands,
			gains: Vec::new(),
			voices: Vec::new()
		}
	}

	fn to_frame(&self, time: f64) -> u64 {
		(time * self.sample_rate).round().max(0.) as u64
	}

	/// Apply all pending commands.
	fn drain(&mut self) {
		while let Ok(command) = self.commands.try_recv() {
			match command {
				Command::AddGain => self.gains.push(GainTimeline::new()),
				Command::AddVoice { frequency, gain } => {
					self.voices.push(Voice::new(frequency, gain, self.sample_rate))
				},
				Command::Start { voice, time } => {
					let frame = self.to_frame(time);
					if let Some(v) = self.voices.get_mut(voice) {
						v.start = Some(frame);
					}
				},
				Command::Stop { voice } => {
					if let Some(v) = self.voices.get_mut(voice) {
						v.stopped = true;
					}
				},
				Command::SetGain { gain, value, time } => {
					let frame = self.to_frame(time);
					if let Some(g) = self.gains.get_mut(gain) {
						g.set(frame, value);
					}
				},
				Command::DisconnectVoice { voice } => {
					if let Some(v) = self.voices.get_mut(voice) {
						v.connected = false;
					}
				},
				Command::DisconnectGain { gain } => {
					if let Some(g) = self.gains.get_mut(gain) {
						g.connected = false;
					}
				}
			}
		}
	}

	/// Fill `data` with mono samples, the first at `start_frame`.
	fn render(&mut self, data: &mut [f32], start_frame: u64) {
		let Renderer { gains, voices, .. } = self;
		for (i, sample) in data.iter_mut().enumerate() {
			let frame = start_frame + i as u64;
			let mut value = 0.;
			for voice in voices.iter_mut() {
				if !voice.is_playing(frame) {
					continue;
				}
				let Some(gain) = gains.get_mut(voice.gain) else {
					continue;
				};
				let level = gain.value_at(frame);
				let x = voice.sample();
				if gain.connected {
					value += level * x;
				}
			}
			*sample = (value as f32).clamp(-1., 1.);
		}
	}
}
