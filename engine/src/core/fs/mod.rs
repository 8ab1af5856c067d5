//! Filesystem utilities.
//!
//! Safe primitives for writing plan dumps and render outputs:
//! - A partial write must never be mistaken for a finished artifact.
//! - Concurrent invocations sharing a directory must not collide on temp names.
//! - Windows semantics differ from Unix for rename-over-existing; we handle both.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::{CoreError, CoreResult};

// =============================================================================
// Path Validation Utilities
// =============================================================================

/// Validates a local input file path (image or audio source).
///
/// Rejects empty paths and URLs, and requires an existing regular file.
/// Relative paths are allowed; they resolve against the working directory.
pub fn validate_local_input_path(path: &Path, label: &str) -> Result<PathBuf, String> {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(format!("{label} is empty"));
    }

    if trimmed.to_ascii_lowercase().contains("://") {
        return Err(format!("{label} must be a local file path, not a URL"));
    }

    let pb = PathBuf::from(trimmed);
    let meta =
        std::fs::metadata(&pb).map_err(|_| format!("{label} file not found: {}", pb.display()))?;
    if !meta.is_file() {
        return Err(format!("{label} is not a file: {}", pb.display()));
    }

    Ok(pb)
}

/// Returns a sibling path of `path` tagged with `tag` and a random suffix.
///
/// `out/video.mp4` with tag `partial` becomes `out/video.partial.<uuid>.mp4`, keeping the
/// extension so muxers can still infer the container from it.
pub fn unique_sibling_path(path: &Path, tag: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}.{tag}.{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}.{tag}.{suffix}"),
    };
    path.with_file_name(file_name)
}

/// Returns `path` with `suffix` appended to the full file name (`a.mp4` -> `a.mp4.plan.json`).
pub fn with_appended_suffix(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!("{file_name}{suffix}"))
}

/// Removes a file, ignoring "not found".
pub fn remove_file_if_exists(path: &Path) -> CoreResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CoreError::IoError(e)),
    }
}

// =============================================================================
// Atomic Writes
// =============================================================================

/// Write bytes atomically (temp file + rename).
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = unique_sibling_path(path, "tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    atomic_replace(path, &tmp_path)?;
    Ok(())
}

/// Write a JSON file atomically with pretty formatting.
pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write_bytes(path, &bytes)
}

fn bak_path_for(path: &Path) -> PathBuf {
    with_appended_suffix(path, ".bak")
}

/// Moves `src_tmp` over `dest`, restoring the previous `dest` if the swap fails.
pub fn atomic_replace(dest: &Path, src_tmp: &Path) -> CoreResult<()> {
    if !dest.exists() {
        std::fs::rename(src_tmp, dest)?;
        return Ok(());
    }

    let bak = bak_path_for(dest);
    if bak.exists() {
        let _ = std::fs::remove_file(&bak);
    }

    std::fs::rename(dest, &bak)?;
    match std::fs::rename(src_tmp, dest) {
        Ok(()) => {
            let _ = std::fs::remove_file(&bak);
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::rename(&bak, dest);
            let _ = std::fs::remove_file(src_tmp);
            Err(CoreError::IoError(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_bytes_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.json");

        atomic_write_bytes(&path, b"one").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one");

        atomic_write_bytes(&path, b"two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");

        // No temp or backup files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "plan.json")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn atomic_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/plan.json");
        atomic_write_json_pretty(&path, &serde_json::json!({"a": 1})).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unique_sibling_paths_differ_and_keep_extension() {
        let base = Path::new("/out/video.mp4");
        let a = unique_sibling_path(base, "partial");
        let b = unique_sibling_path(base, "partial");
        assert_ne!(a, b);
        assert_eq!(a.parent(), Some(Path::new("/out")));
        assert_eq!(a.extension().unwrap(), "mp4");
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("video.partial."));
    }

    #[test]
    fn appended_suffix_keeps_full_name() {
        let p = with_appended_suffix(Path::new("/out/video.mp4"), ".plan.json");
        assert_eq!(p, PathBuf::from("/out/video.mp4.plan.json"));
    }

    #[test]
    fn validate_rejects_urls_and_missing_files() {
        assert!(validate_local_input_path(Path::new("https://x/y.png"), "image").is_err());
        assert!(validate_local_input_path(Path::new(""), "image").is_err());
        assert!(validate_local_input_path(Path::new("/definitely/missing.png"), "image").is_err());
    }

    #[test]
    fn validate_rejects_directories() {
        let dir = TempDir::new().unwrap();
        let err = validate_local_input_path(dir.path(), "image").unwrap_err();
        assert!(err.contains("not a file"));
    }

    #[test]
    fn remove_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(remove_file_if_exists(&dir.path().join("nope")).is_ok());
    }
}
