use crate::Sample;
use crate::error::{Result, ScopeError};

/// Fixed-capacity circular store holding the most recent samples for display.
///
/// Writes overwrite the oldest slot once the buffer is full. Reads go through
/// a [`ReadSession`], which pins the write cursor so one frame always sees a
/// consistent, chronologically ordered window. The session borrows the buffer,
/// so nothing can be pushed while a frame is being read.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<Sample>,
    pos: usize,
}

impl RingBuffer {
    /// Creates a zero-filled buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            pos: 0,
        }
    }

    pub fn try_new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ScopeError::InvalidConfig(
                "ring buffer capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self::new(capacity))
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Slot the next push will overwrite.
    pub fn write_position(&self) -> usize {
        self.pos
    }

    pub fn push(&mut self, sample: Sample) {
        self.data[self.pos] = sample;
        self.pos += 1;
        if self.pos >= self.data.len() {
            self.pos = 0;
        }
    }

    pub fn extend_from_slice(&mut self, samples: &[Sample]) {
        for &sample in samples {
            self.push(sample);
        }
    }

    /// Overwrites every slot with `value`. The write cursor is left alone.
    pub fn fill(&mut self, value: Sample) {
        self.data.fill(value);
    }

    /// Raw slot access for diagnostics; the index wraps around the capacity.
    pub fn get_absolute(&self, index: usize) -> Sample {
        self.data[index % self.data.len()]
    }

    /// Starts a read session anchored at the current write cursor.
    ///
    /// Relative index 0 is the oldest sample still held, `capacity() - 1` the
    /// newest one.
    pub fn begin_read(&self) -> ReadSession<'_> {
        ReadSession {
            data: &self.data,
            mark: self.pos,
        }
    }
}

/// A frozen view of a [`RingBuffer`] for the duration of one frame.
#[derive(Debug, Clone, Copy)]
pub struct ReadSession<'a> {
    data: &'a [Sample],
    mark: usize,
}

impl<'a> ReadSession<'a> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write cursor captured when the session began.
    pub fn mark(&self) -> usize {
        self.mark
    }

    pub fn value_at(&self, relative: usize) -> Sample {
        let len = self.data.len();
        self.data[(relative % len + self.mark) % len]
    }

    pub fn iter(&self) -> Samples<'a> {
        Samples {
            data: self.data,
            mark: self.mark,
            cursor: 0,
        }
    }

    pub fn to_vec(&self) -> Vec<Sample> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for ReadSession<'a> {
    type Item = Sample;
    type IntoIter = Samples<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Oldest-to-newest walk over a read session.
#[derive(Debug, Clone)]
pub struct Samples<'a> {
    data: &'a [Sample],
    mark: usize,
    cursor: usize,
}

impl Iterator for Samples<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.cursor >= self.data.len() {
            return None;
        }
        let value = self.data[(self.cursor + self.mark) % self.data.len()];
        self.cursor += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.data.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Samples<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_reads_as_zero() {
        let ring = RingBuffer::new(16);
        let session = ring.begin_read();
        assert_eq!(session.len(), 16);
        assert!(session.iter().all(|v| v == 0.0));
    }

    #[test]
    fn partial_fill_lands_at_the_end_of_the_window() {
        let mut ring = RingBuffer::new(8);
        ring.extend_from_slice(&[1.0, 2.0, 3.0]);

        let session = ring.begin_read();
        assert_eq!(
            session.to_vec(),
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0]
        );
        assert_eq!(session.value_at(5), 1.0);
        assert_eq!(session.value_at(7), 3.0);
    }

    #[test]
    fn fill_law_holds_for_every_partial_length() {
        let capacity = 32;
        for n in 0..=capacity {
            let mut ring = RingBuffer::new(capacity);
            for v in 0..n {
                ring.push(v as f32 + 1.0);
            }
            let session = ring.begin_read();
            for r in 0..capacity - n {
                assert_eq!(session.value_at(r), 0.0, "n={n} r={r}");
            }
            for (k, r) in (capacity - n..capacity).enumerate() {
                assert_eq!(session.value_at(r), k as f32 + 1.0, "n={n} r={r}");
            }
        }
    }

    #[test]
    fn overwrite_keeps_the_last_capacity_values() {
        let mut ring = RingBuffer::new(2048);
        for v in 0..3000 {
            ring.push(v as f32);
        }
        let session = ring.begin_read();
        assert_eq!(session.value_at(0), 952.0);
        assert_eq!(session.value_at(2047), 2999.0);

        let window = session.to_vec();
        let expected: Vec<f32> = (952..3000).map(|v| v as f32).collect();
        assert_eq!(window, expected);
    }

    #[test]
    fn relative_index_wraps() {
        let mut ring = RingBuffer::new(4);
        ring.extend_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let session = ring.begin_read();
        assert_eq!(session.mark(), 1);
        assert_eq!(session.value_at(0), 2.0);
        assert_eq!(session.value_at(4), 2.0);
        assert_eq!(session.value_at(7), 5.0);
    }

    #[test]
    fn largest_relative_index_wraps_without_overflow() {
        let mut ring = RingBuffer::new(4);
        ring.extend_from_slice(&[1.0, 2.0, 3.0]);
        let session = ring.begin_read();
        // usize::MAX % 4 == 3, the newest slot
        assert_eq!(session.value_at(usize::MAX), 3.0);
        assert_eq!(session.value_at(usize::MAX - 3), 0.0);
    }

    #[test]
    fn absolute_access_ignores_the_session() {
        let mut ring = RingBuffer::new(4);
        ring.extend_from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(ring.get_absolute(0), 5.0);
        assert_eq!(ring.get_absolute(1), 2.0);
        assert_eq!(ring.get_absolute(5), 2.0);
        assert_eq!(ring.write_position(), 1);
    }

    #[test]
    fn fill_resets_values_but_not_the_cursor() {
        let mut ring = RingBuffer::new(4);
        ring.extend_from_slice(&[1.0, 2.0, 3.0]);
        ring.fill(0.0);
        assert_eq!(ring.write_position(), 3);
        assert!(ring.begin_read().iter().all(|v| v == 0.0));
    }

    #[test]
    fn zero_capacity_is_rejected_or_raised() {
        assert!(RingBuffer::try_new(0).is_err());
        assert_eq!(RingBuffer::new(0).capacity(), 1);
    }

    #[test]
    fn iterator_reports_exact_length() {
        let ring = RingBuffer::new(10);
        let mut iter = ring.begin_read().iter();
        assert_eq!(iter.len(), 10);
        iter.next();
        assert_eq!(iter.len(), 9);
    }
}
