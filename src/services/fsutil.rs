use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use walkdir::WalkDir;

/// Platform metadata folder some archivers add next to real content.
pub const MACOS_JUNK_DIR: &str = "__MACOSX";

/// Whether a directory entry is archiver junk rather than mod content.
pub fn is_junk_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(MACOS_JUNK_DIR) || name.eq_ignore_ascii_case(".ds_store")
}

/// Best-effort pass clearing read-only flags under `path`.
///
/// Failures are logged, never returned.
pub fn make_writable(path: &Utf8Path) {
    for entry in WalkDir::new(path).follow_links(false) {
        let Ok(entry) = entry else {
            continue;
        };
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let mut permissions = metadata.permissions();
        if !permissions.readonly() {
            continue;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let owner_bits = if metadata.is_dir() { 0o700 } else { 0o600 };
            permissions.set_mode(permissions.mode() | owner_bits);
        }
        #[cfg(not(unix))]
        {
            permissions.set_readonly(false);
        }
        if let Err(err) = fs::set_permissions(entry.path(), permissions) {
            tracing::debug!("Could not make {} writable: {}", entry.path().display(), err);
        }
    }
}

/// Delete a file or directory tree if it exists.
pub fn remove_path(path: &Utf8Path) -> Result<()> {
    if path.is_dir() {
        make_writable(path);
        fs::remove_dir_all(path).with_context(|| format!("Failed to delete directory {}", path))?;
        tracing::debug!("Deleted existing directory {}", path);
    } else if path.exists() || path.is_symlink() {
        make_writable(path);
        fs::remove_file(path).with_context(|| format!("Failed to delete file {}", path))?;
        tracing::debug!("Deleted existing file {}", path);
    }
    Ok(())
}

/// Recursively copy `source` into `dest`, skipping archiver junk.
pub fn copy_dir(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    for entry in WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !entry.file_name().to_str().is_some_and(is_junk_name))
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", source))?;
        let rel = entry
            .path()
            .strip_prefix(source.as_std_path())
            .with_context(|| format!("Entry outside of {}", source))?;
        let target = dest.as_std_path().join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}

/// Delete `dest` if present, then copy `source` to it.
///
/// Not atomic: a crash mid-copy leaves a partial `dest`, which the next
/// call replaces wholesale.
pub fn replace_dir(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    tracing::info!("Copying {} to {}", source, dest);
    remove_path(dest)?;
    copy_dir(source, dest)?;
    make_writable(dest);
    Ok(())
}

/// Copy a single file over whatever is at `dest`.
pub fn replace_file(source: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    remove_path(dest)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent))?;
    }
    fs::copy(source, dest).with_context(|| format!("Failed to copy {} to {}", source, dest))?;
    Ok(())
}

/// Entries directly under `dir`, sorted by name.
pub fn sorted_entries(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let mut entries = Vec::new();
    for entry in dir
        .read_dir_utf8()
        .with_context(|| format!("Failed to list directory: {}", dir))?
    {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir))?;
        entries.push(entry.into_path());
    }
    entries.sort();
    Ok(entries)
}

/// Read a text file whatever its encoding.
///
/// Honors UTF-8/UTF-16 byte order marks, then tries UTF-8, then falls back
/// to Windows-1252, which many mod files are written in.
pub fn read_text(path: &Utf8Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path))?;
    Ok(decode_text(&bytes))
}

pub fn decode_text(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}

/// Mark a file executable (Unix only; a no-op elsewhere).
pub fn make_executable(path: &Utf8Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut permissions = fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path))?
            .permissions();
        permissions.set_mode(permissions.mode() | 0o755);
        fs::set_permissions(path, permissions)
            .with_context(|| format!("Failed to make {} executable", path))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_utf8_dir() -> (TempDir, Utf8PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (temp_dir, path)
    }

    #[test]
    fn test_replace_dir_overwrites_and_skips_junk() {
        let (_temp_dir, root) = temp_utf8_dir();
        let source = root.join("src");
        fs::create_dir_all(source.join("tra")).unwrap();
        fs::create_dir_all(source.join(MACOS_JUNK_DIR)).unwrap();
        fs::write(source.join("setup-foo.tp2"), "BACKUP ~foo/backup~").unwrap();
        fs::write(source.join("tra/english.tra"), "@1 = ~Hi~").unwrap();

        let dest = root.join("dest");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.txt"), "old").unwrap();

        replace_dir(&source, &dest).unwrap();

        assert!(dest.join("setup-foo.tp2").is_file());
        assert!(dest.join("tra/english.tra").is_file());
        assert!(!dest.join("stale.txt").exists());
        assert!(!dest.join(MACOS_JUNK_DIR).exists());
    }

    #[test]
    fn test_replace_file() {
        let (_temp_dir, root) = temp_utf8_dir();
        let source = root.join("a.tp2");
        let dest = root.join("nested/b.tp2");
        fs::write(&source, "new").unwrap();

        replace_file(&source, &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn test_decode_text_variants() {
        assert_eq!(decode_text(b"VERSION ~v1~"), "VERSION ~v1~");
        assert_eq!(decode_text(b"\xEF\xBB\xBFabc"), "abc");
        assert_eq!(decode_text(b"\xFF\xFEa\x00b\x00"), "ab");
        assert_eq!(decode_text(b"caf\xE9"), "caf\u{e9}");
    }

    #[test]
    fn test_sorted_entries() {
        let (_temp_dir, root) = temp_utf8_dir();
        fs::write(root.join("b"), "").unwrap();
        fs::write(root.join("a"), "").unwrap();
        let entries = sorted_entries(&root).unwrap();
        assert_eq!(entries, vec![root.join("a"), root.join("b")]);
    }
}
