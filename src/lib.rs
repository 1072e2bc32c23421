//! # wavescope
//!
//! Real-time waveform generation and visualization pipeline for an
//! oscilloscope display.
//!
//! A [`WaveformGenerator`] runs a phase-accumulator oscillator on its own
//! thread and pushes blocks of samples into a [`SampleQueue`]. On every
//! animation tick a [`RenderLoop`] drains the queue into a fixed-size
//! [`RingBuffer`] and turns the most recent window into line segments in
//! normalized coordinates.
//!
//! ```no_run
//! use std::sync::Arc;
//! use wavescope::{GeneratorConfig, RenderLoop, SampleQueue, Waveform, WaveformGenerator};
//!
//! let queue = Arc::new(SampleQueue::unbounded());
//! let generator = WaveformGenerator::new(GeneratorConfig::default(), Arc::clone(&queue))?;
//! generator.set_waveform(Waveform::Triangle);
//! generator.set_amplitude(0.8)?;
//! generator.start()?;
//!
//! let mut scope = RenderLoop::new(queue, 2048);
//! let frame = scope.tick();
//! println!("{} segments", frame.segments.len());
//!
//! generator.shutdown()?;
//! # Ok::<(), wavescope::ScopeError>(())
//! ```

pub mod error;
pub mod generator;
pub mod queue;
pub mod render;
pub mod ring_buffer;
pub mod settings;

/// A single amplitude value, nominally in `[-1, 1]`.
pub type Sample = f32;

pub use error::{Result, ScopeError};
pub use generator::{GeneratorConfig, Oscillator, SharedParams, Waveform, WaveformGenerator};
pub use queue::{OverflowPolicy, PushOutcome, SampleQueue};
pub use render::{Frame, Point, RenderLoop, Segment};
pub use ring_buffer::{ReadSession, RingBuffer};
pub use settings::ScopeSettings;
