//! The two on-disk write protocols a flush may use: a same-directory
//! temp file plus rename for atomic replace, or a direct overwrite.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

/// Write `bytes` to `target` via temp-file + fsync + rename + directory
/// fsync, so that a crash at any point leaves `target` resolving to either
/// its pre-write or post-write contents, never a partial one.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    write_atomic_with_fault(target, bytes, || Ok(()))
}

/// Same protocol as [`write_atomic`], but runs `fault` after the temp file
/// has been written and fsynced and before the rename. `fault` returning
/// `Err` aborts before `persist` ever runs, so callers can exercise the
/// crash window between fsync and rename without an actual crash. Exposed
/// only for the fault-injection tests in this crate's `tests/` directory.
#[doc(hidden)]
pub fn write_atomic_with_fault(target: &Path, bytes: &[u8], fault: impl FnOnce() -> io::Result<()>) -> io::Result<()> {
    let dir = target.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let basename = target
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "sketch file path has no file name"))?
        .to_string_lossy()
        .into_owned();

    // `NamedTempFile`'s `Drop` best-effort-removes the file (silently
    // ignoring `NotFound`) if we return before `persist` below runs.
    let mut tmp = Builder::new().prefix(&format!("{basename}_")).suffix(".tmp").tempfile_in(dir)?;

    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    fault()?;

    let tmp = tmp.persist(target).map_err(|e| e.error)?;
    drop(tmp);

    let dir_handle = File::open(dir)?;
    dir_handle.sync_all()?;
    Ok(())
}

/// Write `bytes` to `target` by overwriting it directly: no crash-safety
/// guarantee, but one fewer syscall round trip per flush.
pub fn write_direct(target: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(target)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn atomic_write_creates_target_with_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sketch.bin");
        write_atomic(&target, b"hello").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"hello");
        // no leftover temp files
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn atomic_write_replaces_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sketch.bin");
        fs::write(&target, b"old-content-longer-than-new").unwrap();
        write_atomic(&target, b"new").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn direct_write_overwrites_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sketch.bin");
        fs::write(&target, b"old-content-longer-than-new").unwrap();
        write_direct(&target, b"new").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn atomic_write_leaves_target_untouched_if_fault_hits_before_rename() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sketch.bin");
        fs::write(&target, b"old").unwrap();

        let result = write_atomic_with_fault(&target, b"new", || Err(io::Error::other("fault")));
        assert!(result.is_err());
        // the rename never ran: the target still holds its pre-write bytes.
        assert_eq!(fs::read(&target).unwrap(), b"old");
        // `NamedTempFile`'s `Drop` removes the temp file on the aborted path.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn atomic_write_leaves_prior_contents_if_write_fails() {
        // Simulate the crash window by writing to a target whose parent
        // directory doesn't exist: the temp file creation itself fails
        // before any rename is attempted, so the (nonexistent) target is
        // untouched and no partial file is left behind anywhere.
        let dir = tempfile::tempdir().unwrap();
        let missing_parent = dir.path().join("missing").join("sketch.bin");
        assert!(write_atomic(&missing_parent, b"x").is_err());
        assert!(!missing_parent.exists());
    }
}
