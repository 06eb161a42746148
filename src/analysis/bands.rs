use std::sync::Arc;

use parking_lot::RwLock;

struct Published {
    sequence: u64,
    values: Vec<f32>,
}

/// A consistent copy of the band values as of one publish.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSnapshot {
    /// Number of publishes so far; 0 before the first analyzed chunk.
    pub sequence: u64,
    pub values: Vec<f32>,
}

/// Writer side of the band buffer, owned by the analysis worker.
///
/// Values are copied in under the write lock and copied out under the read
/// lock, so a reader never sees a half-written array. Both copies reuse the
/// existing allocations.
pub struct BandBuffer {
    shared: Arc<RwLock<Published>>,
}

/// Read-only handle for the presentation side.
#[derive(Clone)]
pub struct BandReader {
    shared: Arc<RwLock<Published>>,
}

impl BandBuffer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(RwLock::new(Published {
                sequence: 0,
                values: Vec::new(),
            })),
        }
    }

    pub fn reader(&self) -> BandReader {
        BandReader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Sizes the buffer for a stream and zeroes it.
    pub fn allocate(&self, bands: usize) {
        let mut published = self.shared.write();
        published.values.clear();
        published.values.resize(bands, 0.0);
    }

    pub fn publish(&self, values: &[f32]) -> u64 {
        let mut published = self.shared.write();
        published.values.copy_from_slice(values);
        published.sequence += 1;
        published.sequence
    }
}

impl Default for BandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl BandReader {
    /// Copies the latest values into `out`, returning their sequence number.
    pub fn read_into(&self, out: &mut Vec<f32>) -> u64 {
        let published = self.shared.read();
        out.clear();
        out.extend_from_slice(&published.values);
        published.sequence
    }

    #[allow(dead_code)]
    pub fn snapshot(&self) -> BandSnapshot {
        let published = self.shared.read();
        BandSnapshot {
            sequence: published.sequence,
            values: published.values.clone(),
        }
    }

    #[allow(dead_code)]
    pub fn sequence(&self) -> u64 {
        self.shared.read().sequence
    }

    pub fn len(&self) -> usize {
        self.shared.read().values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn reader_sees_published_values() {
        let buffer = BandBuffer::new();
        let reader = buffer.reader();
        buffer.allocate(4);
        assert_eq!(reader.snapshot(), BandSnapshot { sequence: 0, values: vec![0.0; 4] });

        assert_eq!(buffer.publish(&[1.0, 2.0, 3.0, 4.0]), 1);
        let mut out = Vec::new();
        assert_eq!(reader.read_into(&mut out), 1);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn allocate_resets_values_but_not_sequence() {
        let buffer = BandBuffer::new();
        buffer.allocate(2);
        buffer.publish(&[5.0, 5.0]);
        buffer.allocate(3);
        let snapshot = buffer.reader().snapshot();
        assert_eq!(snapshot.values, vec![0.0; 3]);
        assert_eq!(snapshot.sequence, 1);
    }

    #[test]
    fn concurrent_reads_are_never_torn() {
        const BANDS: usize = 2048;
        let buffer = BandBuffer::new();
        buffer.allocate(BANDS);
        let reader = buffer.reader();

        let writer = thread::spawn(move || {
            let mut values = vec![0.0f32; BANDS];
            for round in 1..=500 {
                values.iter_mut().for_each(|v| *v = round as f32);
                buffer.publish(&values);
            }
        });

        let mut out = Vec::new();
        while !writer.is_finished() {
            let sequence = reader.read_into(&mut out);
            let first = out[0];
            assert!(out.iter().all(|&v| v == first));
            assert_eq!(first, sequence as f32);
        }
        writer.join().unwrap();
        assert_eq!(reader.sequence(), 500);
    }
}
