//! Disk-spilling hand-off buffer between the downloader and an iterator.
//!
//! Records are framed (length-prefixed compact JSON) into an in-memory
//! buffer; once the buffer exceeds its threshold the contents move to a
//! uniquely named temp file, so memory stays bounded regardless of
//! result-set size. Segments are written once, read once, then deleted.
//! One mutex serializes the producer's append and the consumer's drain;
//! it is never held across a network wait.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::TempPath;

use geofetch_core::{DownloadError, DownloadResult, FeatureRecord};

/// Names successive spill segments across all buffers in the process.
static SPILL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Where the buffered bytes currently live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SpillState {
    /// Everything is in memory.
    Filling,
    /// Segments are on disk, not yet touched by the reader.
    Spilled,
    /// The reader is consuming spilled segments.
    Draining,
}

/// One spilled segment. The temp file is deleted when the segment drops.
struct Segment {
    file: File,
    len: u64,
    read_pos: u64,
    _path: TempPath,
}

struct SpillInner {
    state: SpillState,
    segments: VecDeque<Segment>,
    tail: VecDeque<u8>,
    pending: u64,
    closed: bool,
}

/// Single-producer/single-consumer record buffer with transparent disk
/// spilling.
///
/// The reader sees one logical FIFO stream: spilled segments in creation
/// order, then the in-memory tail. Threshold crossings are invisible to
/// the reader.
pub struct SpillBuffer {
    inner: Mutex<SpillInner>,
    threshold: usize,
}

impl SpillBuffer {
    /// Create a buffer that spills to disk past `threshold` buffered bytes.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            inner: Mutex::new(SpillInner {
                state: SpillState::Filling,
                segments: VecDeque::new(),
                tail: VecDeque::new(),
                pending: 0,
                closed: false,
            }),
            threshold,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SpillInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one record to the write side.
    pub fn push_record(&self, record: &FeatureRecord) -> DownloadResult<()> {
        let frame = serde_json::to_vec(record)
            .map_err(|e| DownloadError::other(format!("unencodable record: {e}")))?;
        let frame_len = u32::try_from(frame.len())
            .map_err(|_| DownloadError::other("record exceeds frame size"))?;

        let mut guard = self.lock();
        if guard.closed {
            return Err(DownloadError::Closed);
        }
        guard.tail.extend(frame_len.to_le_bytes());
        guard.tail.extend(frame);
        guard.pending += 1;
        if guard.tail.len() >= self.threshold {
            Self::flush_tail(&mut guard)?;
        }
        Ok(())
    }

    /// Take the next record from the read side, or `None` if nothing is
    /// buffered right now.
    pub fn pop_record(&self) -> DownloadResult<Option<FeatureRecord>> {
        let mut guard = self.lock();
        if guard.closed {
            return Ok(None);
        }
        let inner = &mut *guard;

        loop {
            let exhausted = match inner.segments.front() {
                Some(segment) => segment.read_pos >= segment.len,
                None => break,
            };
            if exhausted {
                inner.segments.pop_front();
                if inner.segments.is_empty() {
                    inner.state = SpillState::Filling;
                }
                continue;
            }
            inner.state = SpillState::Draining;
            if let Some(segment) = inner.segments.front_mut() {
                let record = Self::read_segment_frame(segment)?;
                inner.pending -= 1;
                return Ok(Some(record));
            }
        }

        if inner.tail.is_empty() {
            return Ok(None);
        }
        let record = Self::read_tail_frame(&mut inner.tail)?;
        inner.pending -= 1;
        Ok(Some(record))
    }

    /// Number of records written but not yet read.
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.lock().pending
    }

    /// Whether no unread records remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Drop all buffered data and delete spill segments. Idempotent;
    /// subsequent pushes fail and pops report an empty stream.
    pub fn close(&self) {
        let mut guard = self.lock();
        guard.closed = true;
        guard.segments.clear();
        guard.tail.clear();
        guard.pending = 0;
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Move the in-memory tail into a fresh uniquely named temp file.
    fn flush_tail(inner: &mut SpillInner) -> DownloadResult<()> {
        if inner.tail.is_empty() {
            return Ok(());
        }
        let seq = SPILL_SEQ.fetch_add(1, Ordering::Relaxed);
        let named = tempfile::Builder::new()
            .prefix(&format!("geofetch-spill-{seq:06}-"))
            .suffix(".bin")
            .tempfile()?;
        let (mut file, path) = named.into_parts();

        let (front, back) = inner.tail.as_slices();
        file.write_all(front)?;
        file.write_all(back)?;
        file.flush()?;
        file.seek(SeekFrom::Start(0))?;

        inner.segments.push_back(Segment {
            file,
            len: inner.tail.len() as u64,
            read_pos: 0,
            _path: path,
        });
        inner.tail.clear();
        if inner.state == SpillState::Filling {
            inner.state = SpillState::Spilled;
        }
        Ok(())
    }

    fn read_segment_frame(segment: &mut Segment) -> DownloadResult<FeatureRecord> {
        let mut len_buf = [0u8; 4];
        segment.file.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut frame = vec![0u8; len];
        segment.file.read_exact(&mut frame)?;
        segment.read_pos += 4 + len as u64;

        serde_json::from_slice(&frame)
            .map_err(|e| DownloadError::other(format!("spill segment corrupted: {e}")))
    }

    fn read_tail_frame(tail: &mut VecDeque<u8>) -> DownloadResult<FeatureRecord> {
        let mut len_buf = [0u8; 4];
        for byte in &mut len_buf {
            *byte = tail
                .pop_front()
                .ok_or_else(|| DownloadError::other("spill buffer truncated"))?;
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        if tail.len() < len {
            return Err(DownloadError::other("spill buffer truncated"));
        }
        let frame: Vec<u8> = tail.drain(..len).collect();

        serde_json::from_slice(&frame)
            .map_err(|e| DownloadError::other(format!("spill buffer corrupted: {e}")))
    }

    #[cfg(test)]
    fn segment_count(&self) -> usize {
        self.lock().segments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geofetch_core::{Feature, FieldValue};

    fn record(i: u64) -> FeatureRecord {
        FeatureRecord::new(
            Feature::new(vec![FieldValue::String(format!("payload for feature {i}"))]),
            format!("feat.{i}"),
        )
    }

    #[test]
    fn fifo_order_without_spill() {
        let buffer = SpillBuffer::new(1024 * 1024);
        for i in 0..5 {
            buffer.push_record(&record(i)).unwrap();
        }
        assert_eq!(buffer.segment_count(), 0);

        for i in 0..5 {
            assert_eq!(buffer.pop_record().unwrap().unwrap(), record(i));
        }
        assert!(buffer.pop_record().unwrap().is_none());
    }

    #[test]
    fn fifo_order_across_spill_crossings() {
        // A threshold small enough that every few records force a segment.
        let buffer = SpillBuffer::new(200);
        for i in 0..50 {
            buffer.push_record(&record(i)).unwrap();
        }
        assert!(buffer.segment_count() > 1);
        assert_eq!(buffer.pending(), 50);

        for i in 0..50 {
            assert_eq!(buffer.pop_record().unwrap().unwrap(), record(i));
        }
        assert!(buffer.pop_record().unwrap().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn interleaved_writes_and_reads_preserve_order() {
        let buffer = SpillBuffer::new(150);
        let mut next_read = 0;
        for i in 0..30 {
            buffer.push_record(&record(i)).unwrap();
            if i % 3 == 2 {
                assert_eq!(buffer.pop_record().unwrap().unwrap(), record(next_read));
                next_read += 1;
            }
        }
        while let Some(popped) = buffer.pop_record().unwrap() {
            assert_eq!(popped, record(next_read));
            next_read += 1;
        }
        assert_eq!(next_read, 30);
    }

    #[test]
    fn close_is_idempotent_and_rejects_writes() {
        let buffer = SpillBuffer::new(100);
        buffer.push_record(&record(0)).unwrap();
        buffer.close();
        buffer.close();

        assert!(buffer.is_closed());
        assert!(buffer.pop_record().unwrap().is_none());
        assert!(matches!(
            buffer.push_record(&record(1)),
            Err(DownloadError::Closed)
        ));
    }

    #[test]
    fn segments_are_deleted_as_the_reader_crosses_them() {
        let buffer = SpillBuffer::new(1);
        for i in 0..4 {
            buffer.push_record(&record(i)).unwrap();
        }
        assert_eq!(buffer.segment_count(), 4);

        for _ in 0..4 {
            buffer.pop_record().unwrap().unwrap();
        }
        assert!(buffer.pop_record().unwrap().is_none());
        assert_eq!(buffer.segment_count(), 0);
    }
}
