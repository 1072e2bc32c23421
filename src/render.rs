use std::sync::Arc;

use crate::queue::SampleQueue;
use crate::ring_buffer::RingBuffer;

/// Point in normalized `[0, 1] x [0, 1]` space. The caller scales it to its
/// drawing surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

/// Output of one animation tick.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    /// Trace of the ring buffer, oldest sample on the left.
    pub segments: Vec<Segment>,
    /// Samples moved from the queue into the ring this tick.
    pub drained: usize,
    /// Queue length after draining; only filled in with diagnostics enabled.
    pub backlog: Option<usize>,
}

/// Consumer side of the pipeline, driven by the UI's animation timer.
///
/// Owns the ring buffer outright; the queue is the only thing shared with
/// the generator thread.
pub struct RenderLoop {
    queue: Arc<SampleQueue>,
    ring: RingBuffer,
    diagnostics: bool,
}

impl RenderLoop {
    pub fn new(queue: Arc<SampleQueue>, capacity: usize) -> Self {
        Self {
            queue,
            ring: RingBuffer::new(capacity),
            diagnostics: false,
        }
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    pub fn set_diagnostics(&mut self, enabled: bool) {
        self.diagnostics = enabled;
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    pub fn queue(&self) -> &Arc<SampleQueue> {
        &self.queue
    }

    /// Moves everything currently queued into the ring buffer.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while let Some(sample) = self.queue.try_pop() {
            self.ring.push(sample);
            drained += 1;
        }
        drained
    }

    /// Builds the trace from a read session over the ring buffer.
    ///
    /// Produces `capacity - 1` segments. A buffer that was never written
    /// renders as a flat line through the vertical centre.
    pub fn render(&self) -> Vec<Segment> {
        let session = self.ring.begin_read();
        let n = session.len();
        let width = n as f32;
        let mut segments = Vec::with_capacity(n.saturating_sub(1));
        let mut previous = session.value_at(0);
        for i in 0..n.saturating_sub(1) {
            let next = session.value_at(i + 1);
            segments.push(Segment {
                from: Point {
                    x: i as f32 / width,
                    y: (previous + 1.0) / 2.0,
                },
                to: Point {
                    x: (i + 1) as f32 / width,
                    y: (next + 1.0) / 2.0,
                },
            });
            previous = next;
        }
        segments
    }

    pub fn tick(&mut self) -> Frame {
        let drained = self.drain();
        let backlog = if self.diagnostics {
            let backlog = self.queue.len();
            log::trace!("drained {drained} samples, backlog {backlog}");
            Some(backlog)
        } else {
            None
        };
        Frame {
            segments: self.render(),
            drained,
            backlog,
        }
    }
}
