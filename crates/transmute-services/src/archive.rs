//! Archive building for batch downloads.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// Archive format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
}

impl ArchiveFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "application/zip",
            ArchiveFormat::Tar => "application/x-tar",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar" => Ok(ArchiveFormat::Tar),
            _ => Err(anyhow::anyhow!("Unsupported archive format: {}", s)),
        }
    }
}

/// One file going into an archive.
pub struct ArchiveEntry {
    pub id: Uuid,
    pub filename: String,
    pub data: Vec<u8>,
}

/// Sanitize a filename for an archive entry to prevent path traversal.
/// Extracts only the base name (strips path components like `../`).
fn sanitize_archive_filename(filename: &str, fallback: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or(fallback)
        .to_string()
}

/// Entry names must be unique within the archive; duplicates get an
/// id prefix.
fn unique_name(used: &mut HashSet<String>, id: Uuid, name: String) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    let prefixed = format!("{}_{}", id, name);
    used.insert(prefixed.clone());
    prefixed
}

fn build_zip(entries: Vec<ArchiveEntry>) -> Result<Vec<u8>> {
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let mut used = HashSet::new();
        for entry in entries {
            let safe = sanitize_archive_filename(&entry.filename, &format!("unnamed_{}", entry.id));
            let name = unique_name(&mut used, entry.id, safe);

            zip.start_file(&name, options)
                .with_context(|| format!("Failed to add file to ZIP: {}", name))?;
            zip.write_all(&entry.data)
                .with_context(|| format!("Failed to write file data to ZIP: {}", name))?;
        }

        zip.finish().context("Failed to finalize ZIP archive")?;
    }

    Ok(buffer)
}

fn build_tar(entries: Vec<ArchiveEntry>) -> Result<Vec<u8>> {
    use tar::Builder;

    let mut buffer = Vec::new();
    {
        let mut tar = Builder::new(&mut buffer);

        let mut used = HashSet::new();
        for entry in entries {
            let safe = sanitize_archive_filename(&entry.filename, &format!("unnamed_{}", entry.id));
            let name = unique_name(&mut used, entry.id, safe);

            let mut header = tar::Header::new_gnu();
            header.set_size(entry.data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();

            tar.append_data(&mut header, &name, entry.data.as_slice())
                .with_context(|| format!("Failed to add file to TAR: {}", name))?;
        }

        tar.finish().context("Failed to finalize TAR archive")?;
    }

    Ok(buffer)
}

/// Create an archive in the specified format.
pub fn build_archive(format: ArchiveFormat, entries: Vec<ArchiveEntry>) -> Result<Vec<u8>> {
    match format {
        ArchiveFormat::Zip => build_zip(entries),
        ArchiveFormat::Tar => build_tar(entries),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(filename: &str, data: &[u8]) -> ArchiveEntry {
        ArchiveEntry {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_archive_format_from_str() {
        assert_eq!("zip".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Zip);
        assert_eq!("ZIP".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Zip);
        assert_eq!("tar".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Tar);
        assert!("rar".parse::<ArchiveFormat>().is_err());
    }

    #[test]
    fn test_sanitize_archive_filename() {
        assert_eq!(
            sanitize_archive_filename("../../etc/passwd", "fallback"),
            "passwd"
        );
        assert_eq!(sanitize_archive_filename("photo.png", "fallback"), "photo.png");
        assert_eq!(sanitize_archive_filename("..", "fallback"), "fallback");
        assert_eq!(sanitize_archive_filename("", "fallback"), "fallback");
    }

    #[test]
    fn test_zip_roundtrip() {
        let data = build_archive(
            ArchiveFormat::Zip,
            vec![entry("a.txt", b"alpha"), entry("b.txt", b"beta")],
        )
        .unwrap();

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        let mut content = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("a.txt").unwrap(), &mut content)
            .unwrap();
        assert_eq!(content, "alpha");
    }

    #[test]
    fn test_duplicate_names_are_disambiguated() {
        let first = entry("same.txt", b"one");
        let second = entry("same.txt", b"two");
        let second_id = second.id;

        let data = build_archive(ArchiveFormat::Zip, vec![first, second]).unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(data)).unwrap();

        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"same.txt"));
        assert!(names
            .iter()
            .any(|n| n.starts_with(&second_id.to_string()) && n.ends_with("same.txt")));
    }

    #[test]
    fn test_tar_is_nonempty_and_parseable() {
        let data = build_archive(ArchiveFormat::Tar, vec![entry("a.txt", b"alpha")]).unwrap();
        let mut archive = tar::Archive::new(std::io::Cursor::new(data));
        let entries: Vec<_> = archive.entries().unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
