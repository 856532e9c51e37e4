use parking_lot::Mutex;

use crate::datum::Datum;
use crate::error::CorruptSketch;
use crate::hll::Sketch;

struct Inner {
    sketch: Sketch,
    dirty: bool,
    /// Bumped on every mutation. Lets a committer snapshot-then-flush-then-
    /// clear without re-taking the lock for the whole I/O: it records the
    /// generation at snapshot time and only clears `dirty` if nothing
    /// mutated the sketch in between (see [`SketchEngine::begin_flush`]).
    generation: u64,
}

/// Owns the sketch value and its dirty flag behind a single mutex. No other
/// component may read or write either field directly; every mutation of
/// the sketch in the whole process goes through one of these methods.
pub struct SketchEngine {
    inner: Mutex<Inner>,
}

/// A point-in-time view taken under the lock, to be written to storage
/// outside the lock. See [`SketchEngine::begin_flush`] /
/// [`SketchEngine::complete_flush`].
pub struct FlushSnapshot {
    pub bytes: Vec<u8>,
    generation: u64,
}

impl SketchEngine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sketch: Sketch::new(),
                dirty: false,
                generation: 0,
            }),
        }
    }

    /// Fold one item into the sketch and mark it dirty.
    pub fn update(&self, datum: &Datum) {
        let mut inner = self.inner.lock();
        inner.sketch.update(datum);
        inner.dirty = true;
        inner.generation += 1;
    }

    /// Union `other` into the local sketch. Returns `true` if the compact
    /// serialization of the sketch actually changed (this may be `false`
    /// even though the in-memory representations of `other` and the prior
    /// local sketch were never equal — only the compact forms are
    /// compared).
    pub fn merge_in(&self, other: &Sketch) -> bool {
        let mut inner = self.inner.lock();
        let merged = inner.sketch.union(other);
        let changed = merged.serialize_compact() != inner.sketch.serialize_compact();
        inner.sketch = merged;
        if changed {
            inner.dirty = true;
            inner.generation += 1;
        }
        changed
    }

    /// Compact serialization of the current sketch, for outbound RPC or a
    /// committer flush.
    pub fn snapshot_bytes(&self) -> Vec<u8> {
        self.inner.lock().sketch.serialize_compact()
    }

    /// Replace the sketch with the deserialization of `bytes`. Used only by
    /// the durability committer's start-up load: does not mark the sketch
    /// dirty, since it is recovering state that (by construction) is
    /// already durable.
    pub fn load_bytes(&self, bytes: &[u8]) -> Result<(), CorruptSketch> {
        let sketch = Sketch::deserialize_compact(bytes)?;
        let mut inner = self.inner.lock();
        inner.sketch = sketch;
        Ok(())
    }

    pub fn estimate(&self) -> f64 {
        self.inner.lock().sketch.estimate()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    /// Snapshot the sketch under the lock for a committer flush; the I/O
    /// itself happens outside the lock by the caller.
    pub fn begin_flush(&self) -> Option<FlushSnapshot> {
        let inner = self.inner.lock();
        if !inner.dirty {
            return None;
        }
        Some(FlushSnapshot {
            bytes: inner.sketch.serialize_compact(),
            generation: inner.generation,
        })
    }

    /// Clear `dirty` now that `snapshot`'s bytes have been durably written,
    /// but only if no mutation happened between `begin_flush` and now. If a
    /// mutation did happen, the just-written bytes are stale (not corrupt)
    /// and `dirty` stays `true` so the next flush picks up the change.
    pub fn complete_flush(&self, snapshot: FlushSnapshot) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation == snapshot.generation {
            inner.dirty = false;
            true
        } else {
            false
        }
    }
}

impl Default for SketchEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_sets_dirty() {
        let engine = SketchEngine::new();
        assert!(!engine.is_dirty());
        engine.update(&Datum::from(1i64));
        assert!(engine.is_dirty());
    }

    #[test]
    fn flush_cycle_clears_dirty() {
        let engine = SketchEngine::new();
        engine.update(&Datum::from(1i64));
        let snap = engine.begin_flush().expect("dirty, should snapshot");
        assert!(engine.complete_flush(snap));
        assert!(!engine.is_dirty());
    }

    #[test]
    fn flush_with_no_mutation_is_noop() {
        let engine = SketchEngine::new();
        assert!(engine.begin_flush().is_none());
    }

    #[test]
    fn mutation_during_flush_keeps_dirty() {
        let engine = SketchEngine::new();
        engine.update(&Datum::from(1i64));
        let snap = engine.begin_flush().unwrap();
        // a concurrent update lands between snapshot and clear
        engine.update(&Datum::from(2i64));
        assert!(!engine.complete_flush(snap));
        assert!(engine.is_dirty());
    }

    #[test]
    fn merge_in_reports_whether_bytes_changed() {
        let engine = SketchEngine::new();
        let mut other = Sketch::new();
        other.update(&Datum::from("x"));
        assert!(engine.merge_in(&other));
        assert!(engine.is_dirty());

        // merging the same sketch again changes nothing (idempotence).
        let snap = engine.begin_flush().unwrap();
        assert!(engine.complete_flush(snap));
        assert!(!engine.merge_in(&other));
        assert!(!engine.is_dirty());
    }

    #[test]
    fn load_bytes_does_not_mark_dirty() {
        let engine = SketchEngine::new();
        let bytes = Sketch::new().serialize_compact();
        engine.load_bytes(&bytes).unwrap();
        assert!(!engine.is_dirty());
    }

    #[test]
    fn load_bytes_leaves_state_on_corruption() {
        let engine = SketchEngine::new();
        engine.update(&Datum::from(1i64));
        let before = engine.snapshot_bytes();
        assert!(engine.load_bytes(&[0xFF]).is_err());
        assert_eq!(engine.snapshot_bytes(), before);
    }
}
