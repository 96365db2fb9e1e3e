use crate::errors::JengaError;
use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io;
use std::process::{Command, Stdio};

/// Archive extensions jenga recognizes, longest first for suffix matching.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".tar.gz", ".tgz", ".zip", ".rar", ".7z"];

pub fn is_archive_name(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    ARCHIVE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}

/// Capability: unpack an archive into a directory.
pub trait Unpacker {
    fn unpack(&self, archive: &Utf8Path, dest: &Utf8Path) -> Result<()>;
}

/// Unpacks zip, 7z and tar.gz archives in-process; rar through a `7z` binary.
#[derive(Debug, Clone, Default)]
pub struct ArchiveUnpacker;

impl ArchiveUnpacker {
    pub fn new() -> Self {
        Self
    }
}

impl Unpacker for ArchiveUnpacker {
    fn unpack(&self, archive: &Utf8Path, dest: &Utf8Path) -> Result<()> {
        fs::create_dir_all(dest).with_context(|| format!("Failed to create {}", dest))?;
        let lowered = archive.as_str().to_ascii_lowercase();
        tracing::debug!("Unpacking {} into {}", archive, dest);

        if lowered.ends_with(".zip") {
            extract_zip(archive, dest)
        } else if lowered.ends_with(".7z") {
            sevenz_rust::decompress_file(archive, dest)
                .with_context(|| format!("Failed to extract 7z archive {}", archive))
        } else if lowered.ends_with(".tar.gz") || lowered.ends_with(".tgz") {
            extract_tar_gz(archive, dest)
        } else if lowered.ends_with(".rar") {
            match extract_with_7z(archive, dest)? {
                Some(()) => Ok(()),
                None => Err(JengaError::UnsupportedArchive(format!(
                    "{} (rar archives need a 7z executable on PATH)",
                    archive
                ))
                .into()),
            }
        } else {
            Err(JengaError::UnsupportedArchive(archive.to_string()).into())
        }
    }
}

fn extract_zip(archive: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    let file = fs::File::open(archive).with_context(|| format!("Failed to open {}", archive))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip archive {}", archive))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .with_context(|| format!("Failed to read entry {} of {}", i, archive))?;
        let Some(rel_path) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe zip entry '{}' in {}", entry.name(), archive);
            continue;
        };

        let out_path = dest.as_std_path().join(rel_path);
        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("Failed to create {}", out_path.display()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut out_file = fs::File::create(&out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;
        io::copy(&mut entry, &mut out_file)
            .with_context(|| format!("Failed to extract {}", out_path.display()))?;
    }
    Ok(())
}

fn extract_tar_gz(archive: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    let file = fs::File::open(archive).with_context(|| format!("Failed to open {}", archive))?;
    let decoder = flate2::read::GzDecoder::new(file);
    tar::Archive::new(decoder)
        .unpack(dest)
        .with_context(|| format!("Failed to extract tar archive {}", archive))
}

/// Shell out to `7z x`. `Ok(None)` when no `7z` binary is available.
fn extract_with_7z(archive: &Utf8Path, dest: &Utf8Path) -> Result<Option<()>> {
    let output = Command::new("7z")
        .arg("x")
        .arg("-y")
        .arg(format!("-o{}", dest))
        .arg(archive)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output();

    let output = match output {
        Ok(output) => output,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).context("Failed to launch 7z"),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("7z extraction of {} failed: {}", archive, stderr.trim());
    }
    Ok(Some(()))
}
