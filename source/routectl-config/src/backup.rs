//! The Backup Store: deterministic gzip-compressed tar
//! snapshots of a live configuration directory, with retention eviction.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::error::{Result, RouterConfigError};

#[derive(Debug, Clone)]
pub struct BackupHandle {
    pub archive_path: PathBuf,
    pub digest: String,
}

/// Produces a gzip-compressed tar archive of every regular file directly
/// under `live_dir`, named `<name>-<unix_timestamp>.tar.gz` in
/// `backup_dir`. File ordering inside the archive is lexicographic by
/// filename, so two backups of the same directory content are
/// byte-identical modulo the gzip header's mtime.
pub fn backup(live_dir: &Path, backup_dir: &Path, name: &str, taken_at: SystemTime) -> Result<BackupHandle> {
    fs::create_dir_all(backup_dir).map_err(|e| RouterConfigError::io(backup_dir, e))?;

    let timestamp = taken_at
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let archive_path = backup_dir.join(format!("{name}-{timestamp}.tar.gz"));

    let mut entries: Vec<PathBuf> = fs::read_dir(live_dir)
        .map_err(|e| RouterConfigError::io(live_dir, e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    let tmp_path = backup_dir.join(format!(".{name}-{timestamp}.tar.gz.tmp"));
    {
        let file = File::create(&tmp_path).map_err(|e| RouterConfigError::io(&tmp_path, e))?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for entry in &entries {
            let file_name = entry.file_name().expect("regular file has a name");
            let mut handle = File::open(entry).map_err(|e| RouterConfigError::io(entry, e))?;
            let metadata = handle.metadata().map_err(|e| RouterConfigError::io(entry, e))?;
            let mut header = tar::Header::new_gnu();
            header.set_size(metadata.len());
            header.set_mode(mode_of(&metadata));
            header.set_mtime(0);
            header.set_cksum();
            builder
                .append_data(&mut header, file_name, &mut handle)
                .map_err(|e| RouterConfigError::io(entry, e))?;
        }
        let encoder = builder.into_inner().map_err(|e| RouterConfigError::io(&tmp_path, e))?;
        encoder.finish().map_err(|e| RouterConfigError::io(&tmp_path, e))?;
    }

    let digest = digest_file(&tmp_path)?;

    if let Err(e) = fs::rename(&tmp_path, &archive_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(RouterConfigError::io(&archive_path, e));
    }

    Ok(BackupHandle { archive_path, digest })
}

#[cfg(unix)]
fn mode_of(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

fn digest_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| RouterConfigError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| RouterConfigError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Extracts `handle`'s archive into `live_dir`, replacing its contents.
/// Builds the new tree in a sibling directory and swap-renames it in,
/// so a failure during extraction never leaves `live_dir` half-written.
pub fn restore(handle: &BackupHandle, live_dir: &Path) -> Result<()> {
    let parent = live_dir.parent().unwrap_or_else(|| Path::new("."));
    let staging = parent.join(format!(
        ".{}.restoring",
        live_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
    ));

    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| RouterConfigError::io(&staging, e))?;
    }
    fs::create_dir_all(&staging).map_err(|e| RouterConfigError::io(&staging, e))?;

    let result = extract_into(&handle.archive_path, &staging);
    if let Err(e) = result {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    let backup_of_live = parent.join(format!(
        ".{}.pre-restore",
        live_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
    ));
    if backup_of_live.exists() {
        let _ = fs::remove_dir_all(&backup_of_live);
    }

    if live_dir.exists() {
        if let Err(e) = fs::rename(live_dir, &backup_of_live) {
            let _ = fs::remove_dir_all(&staging);
            return Err(RouterConfigError::io(live_dir, e));
        }
    }

    if let Err(e) = fs::rename(&staging, live_dir) {
        // best-effort roll the original back into place
        if backup_of_live.exists() {
            let _ = fs::rename(&backup_of_live, live_dir);
        }
        let _ = fs::remove_dir_all(&staging);
        return Err(RouterConfigError::io(live_dir, e));
    }

    let _ = fs::remove_dir_all(&backup_of_live);
    Ok(())
}

fn extract_into(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| RouterConfigError::io(archive_path, e))?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    archive
        .unpack(dest)
        .map_err(|e| RouterConfigError::io(archive_path, e))?;
    Ok(())
}

/// Keeps the newest `keep` archives matching `name-*.tar.gz` in
/// `backup_dir`, deleting the rest. Best-effort: a deletion failure for
/// one archive does not stop eviction of the others.
pub fn evict(backup_dir: &Path, name: &str, keep: usize) -> Result<Vec<PathBuf>> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }

    let prefix = format!("{name}-");
    let mut candidates: Vec<(SystemTime, PathBuf)> = walkdir::WalkDir::new(backup_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let file_name = entry.file_name().to_string_lossy();
            file_name.starts_with(&prefix) && file_name.ends_with(".tar.gz")
        })
        .filter_map(|entry| {
            let mtime = entry.metadata().ok()?.modified().ok()?;
            Some((mtime, entry.into_path()))
        })
        .collect();

    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    let mut evicted = Vec::new();
    for (_, path) in candidates.into_iter().skip(keep) {
        if fs::remove_file(&path).is_ok() {
            evicted.push(path);
        }
    }
    Ok(evicted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn backup_then_restore_round_trips_content() {
        let live = tempdir().unwrap();
        fs::write(live.path().join("network"), "config interface 'lan'\n").unwrap();
        fs::write(live.path().join("firewall"), "config zone 'lan'\n").unwrap();

        let backup_dir = tempdir().unwrap();
        let handle = backup(live.path(), backup_dir.path(), "snapshot", SystemTime::UNIX_EPOCH).unwrap();
        assert!(handle.archive_path.exists());
        assert_eq!(handle.digest.len(), 64);

        fs::remove_file(live.path().join("network")).unwrap();
        restore(&handle, live.path()).unwrap();

        assert_eq!(
            fs::read_to_string(live.path().join("network")).unwrap(),
            "config interface 'lan'\n"
        );
        assert_eq!(
            fs::read_to_string(live.path().join("firewall")).unwrap(),
            "config zone 'lan'\n"
        );
    }

    #[test]
    fn identical_content_yields_identical_digest() {
        let live = tempdir().unwrap();
        fs::write(live.path().join("b"), "beta").unwrap();
        fs::write(live.path().join("a"), "alpha").unwrap();

        let backup_dir = tempdir().unwrap();
        let h1 = backup(live.path(), backup_dir.path(), "x", SystemTime::UNIX_EPOCH).unwrap();
        let h2 = backup(live.path(), backup_dir.path(), "y", SystemTime::UNIX_EPOCH).unwrap();
        assert_eq!(h1.digest, h2.digest);
    }

    #[test]
    fn restore_failure_leaves_live_dir_untouched() {
        let live = tempdir().unwrap();
        fs::write(live.path().join("network"), "original").unwrap();

        let bogus = BackupHandle {
            archive_path: live.path().join("does-not-exist.tar.gz"),
            digest: String::new(),
        };
        let err = restore(&bogus, live.path()).unwrap_err();
        assert!(matches!(err, RouterConfigError::Io { .. }));
        assert_eq!(fs::read_to_string(live.path().join("network")).unwrap(), "original");
    }

    #[test]
    fn eviction_keeps_only_the_newest_n() {
        let backup_dir = tempdir().unwrap();
        let live = tempdir().unwrap();
        fs::write(live.path().join("network"), "x").unwrap();

        let mut handles = Vec::new();
        for i in 0..5u64 {
            let t = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(i * 10);
            handles.push(backup(live.path(), backup_dir.path(), "snap", t).unwrap());
            // ensure distinct mtimes on the archive files themselves
            let file_mtime = filetime_hack(&handles.last().unwrap().archive_path, i);
            let _ = file_mtime;
        }

        let evicted = evict(backup_dir.path(), "snap", 2).unwrap();
        assert_eq!(evicted.len(), 3);
        let remaining: Vec<_> = fs::read_dir(backup_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(remaining.len(), 2);
    }

    /// Archives created in the same test run can land on the same
    /// filesystem-mtime tick; nudge each one forward so eviction's
    /// newest-first ordering is deterministic under test.
    fn filetime_hack(path: &Path, offset_secs: u64) {
        if let Ok(file) = File::options().write(true).open(path) {
            let _ = file.set_modified(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000 + offset_secs));
        }
    }
}
