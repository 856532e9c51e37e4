use std::path::PathBuf;
use std::sync::Arc;

use mesh_sketch::SketchEngine;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::atomic;
use crate::config::{DurabilityLevel, COMMITTER_INTERVAL};
use crate::error::DurabilityError;

/// Loads the sketch once at start-up and flushes it to disk, either
/// synchronously on demand (STRICT) or on a background timer (DELAYED).
pub struct Committer {
    engine: Arc<SketchEngine>,
    sketch_file: Option<PathBuf>,
    durability: DurabilityLevel,
    atomic: bool,
}

impl Committer {
    pub fn new(
        engine: Arc<SketchEngine>,
        sketch_file: Option<PathBuf>,
        durability: DurabilityLevel,
        atomic: bool,
    ) -> Self {
        Self {
            engine,
            sketch_file,
            durability,
            atomic,
        }
    }

    pub fn durability(&self) -> DurabilityLevel {
        self.durability
    }

    /// Called once during node start. A missing file is not an error: the
    /// sketch simply starts empty. Any other I/O or decode error is fatal.
    pub async fn load_once(&self) -> Result<(), DurabilityError> {
        if self.durability.is_volatile() {
            return Ok(());
        }
        let Some(path) = self.sketch_file.clone() else {
            return Ok(());
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                self.engine.load_bytes(&bytes)?;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DurabilityError::Io(e)),
        }
    }

    /// No-op when durability is VOLATILE or the sketch isn't dirty.
    /// Otherwise writes the current compact serialization to disk and
    /// clears dirty. Returns `true` iff a flush was actually performed.
    pub async fn flush_once(&self) -> Result<bool, DurabilityError> {
        if self.durability.is_volatile() {
            return Ok(false);
        }
        let Some(path) = self.sketch_file.clone() else {
            return Ok(false);
        };
        let Some(snapshot) = self.engine.begin_flush() else {
            return Ok(false);
        };

        let atomic = self.atomic;
        let bytes = snapshot.bytes.clone();
        let write_path = path.clone();
        tokio::task::spawn_blocking(move || {
            if atomic {
                atomic::write_atomic(&write_path, &bytes)
            } else {
                atomic::write_direct(&write_path, &bytes)
            }
        })
        .await
        .map_err(|_| DurabilityError::TaskPanicked)??;

        if !self.engine.complete_flush(snapshot) {
            debug!("sketch mutated during flush; leaving dirty for the next attempt");
        }
        Ok(true)
    }

    /// Background loop for DELAYED durability: sleep, flush, repeat, until
    /// `stop` is set to `true`. The sleep itself is not preemptible; worst
    /// case shutdown latency is one [`COMMITTER_INTERVAL`], after which the
    /// coordinator performs one more synchronous flush anyway.
    pub async fn run_periodic(&self, mut stop: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(COMMITTER_INTERVAL) => {
                    if let Err(err) = self.flush_once().await {
                        warn!(%err, "periodic flush failed, dirty flag remains set for the next attempt");
                    }
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_sketch::Datum;

    #[tokio::test]
    async fn load_once_on_missing_file_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(SketchEngine::new());
        let committer = Committer::new(
            engine.clone(),
            Some(dir.path().join("does-not-exist")),
            DurabilityLevel::Delayed,
            true,
        );
        committer.load_once().await.unwrap();
        assert_eq!(engine.estimate(), 0.0);
    }

    #[tokio::test]
    async fn volatile_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sketch.bin");
        let engine = Arc::new(SketchEngine::new());
        let committer = Committer::new(engine.clone(), None, DurabilityLevel::Volatile, false);
        engine.update(&Datum::from(1i64));
        assert!(!committer.flush_once().await.unwrap());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn strict_round_trip_through_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sketch.bin");

        let engine = Arc::new(SketchEngine::new());
        let committer = Committer::new(engine.clone(), Some(path.clone()), DurabilityLevel::Strict, true);
        engine.update(&Datum::from("a"));
        assert!(committer.flush_once().await.unwrap());
        assert!(!engine.is_dirty());

        let restarted_engine = Arc::new(SketchEngine::new());
        let restarted_committer =
            Committer::new(restarted_engine.clone(), Some(path.clone()), DurabilityLevel::Strict, true);
        restarted_committer.load_once().await.unwrap();
        assert!(restarted_engine.estimate() >= 1.0);
        assert_eq!(restarted_engine.snapshot_bytes(), engine.snapshot_bytes());
    }

    #[tokio::test]
    async fn flush_with_clean_sketch_performs_no_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sketch.bin");
        let engine = Arc::new(SketchEngine::new());
        let committer = Committer::new(engine.clone(), Some(path.clone()), DurabilityLevel::Delayed, true);
        assert!(!committer.flush_once().await.unwrap());
        assert!(!path.exists());
    }
}
