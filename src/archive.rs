//! Downloadable snapshots of a ref's tree.

use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

use crate::cache::{CacheKey, CacheStore};
use crate::git::{self, CommitHeader, EntryKind, FlatEntry};

const MARKER_NAMESPACE: &str = "archives";

/// Archive container and compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarXz,
    TarBz2,
    TarZst,
    Zip,
}

impl ArchiveFormat {
    /// Parses a format name as used in configuration (`tar.gz`, `zip`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim_start_matches('.') {
            "tar" => Some(Self::Tar),
            "tar.gz" | "tgz" => Some(Self::TarGz),
            "tar.xz" | "txz" => Some(Self::TarXz),
            "tar.bz2" | "tbz2" => Some(Self::TarBz2),
            "tar.zst" | "tar.zstd" => Some(Self::TarZst),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    /// File extension without leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarXz => "tar.xz",
            Self::TarBz2 => "tar.bz2",
            Self::TarZst => "tar.zst",
            Self::Zip => "zip",
        }
    }
}

/// A written archive as listed on the log page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub format: ArchiveFormat,
    pub file_name: String,
    pub size: u64,
}

struct ArchiveEntry {
    path: String,
    kind: EntryKind,
    data: Vec<u8>,
}

/// Writes one archive per format for a ref into `out_dir`.
///
/// Archives are named `<refname>.<ext>` and contain the tree under a
/// `<prefix>/` directory. Entry times are the tip's committer time, so an
/// unchanged tip yields identical bytes. When the stored marker shows the
/// same tip and formats, and every file is still present, nothing is
/// rebuilt.
///
/// # Arguments
///
/// * `repo`: Repository handle for this worker
/// * `cache`: Store holding the per-ref marker
/// * `formats`: Formats to produce
/// * `prefix`: Top-level directory inside the archive
/// * `refname`: Escaped ref name
/// * `tip`: Commit the ref points at
/// * `out_dir`: Ref output directory
///
/// # Returns
///
/// Archive listing and whether anything was written
///
/// # Errors
///
/// Returns error if the tree cannot be read or an archive cannot be written.
pub fn write_archives(
    repo: &gix::Repository,
    cache: &CacheStore,
    formats: &[ArchiveFormat],
    prefix: &str,
    refname: &str,
    tip: &CommitHeader,
    out_dir: &Path,
) -> Result<(Vec<ArchiveInfo>, bool)> {
    let marker_key = CacheKey::new(MARKER_NAMESPACE, refname)?;
    let marker = format!(
        "{}\n{}\n",
        tip.id,
        formats
            .iter()
            .map(|f| f.extension())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let file_name = |format: ArchiveFormat| format!("{}.{}", refname, format.extension());
    let up_to_date = cache.read_entry(&marker_key).as_deref() == Some(marker.as_bytes())
        && formats.iter().all(|f| out_dir.join(file_name(*f)).is_file());

    if up_to_date {
        debug!(refname, "archives up to date");
        let listing = formats
            .iter()
            .map(|&format| {
                let name = file_name(format);
                let size = fs::metadata(out_dir.join(&name)).map(|m| m.len()).unwrap_or(0);
                ArchiveInfo {
                    format,
                    file_name: name,
                    size,
                }
            })
            .collect();
        return Ok((listing, false));
    }

    let entries = git::flatten_tree(repo, tip.tree_id)?
        .into_iter()
        .filter(|entry| entry.kind != EntryKind::Submodule)
        .map(|FlatEntry { path, oid, kind }| {
            let data = git::read_blob(repo, oid)?;
            Ok(ArchiveEntry {
                path: format!("{}/{}", prefix, path),
                kind,
                data,
            })
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Failed to collect archive entries for {}", refname))?;

    let mtime = tip.committer.time;
    let mut listing = Vec::with_capacity(formats.len());
    for &format in formats {
        let name = file_name(format);
        let path = out_dir.join(&name);
        let size = write_archive(&entries, mtime, format, &path)
            .with_context(|| format!("Failed to write archive: {}", path.display()))?;
        listing.push(ArchiveInfo {
            format,
            file_name: name,
            size,
        });
    }

    cache.write_entry(&marker_key, marker.as_bytes())?;
    Ok((listing, true))
}

fn write_archive(entries: &[ArchiveEntry], mtime: i64, format: ArchiveFormat, path: &Path) -> Result<u64> {
    let dir = path
        .parent()
        .with_context(|| format!("Archive path has no parent: {}", path.display()))?;
    fs::create_dir_all(dir)?;
    let mut pending = tempfile::Builder::new()
        .prefix(".pending-")
        .tempfile_in(dir)?;

    {
        let file = pending.as_file_mut();
        match format {
            ArchiveFormat::Tar => {
                write_tar(file, entries, mtime)?;
            }
            ArchiveFormat::TarGz => {
                let gz = flate2::write::GzEncoder::new(file, flate2::Compression::default());
                write_tar(gz, entries, mtime)?.finish()?;
            }
            ArchiveFormat::TarXz => {
                let xz = xz2::write::XzEncoder::new(file, 6);
                write_tar(xz, entries, mtime)?.finish()?;
            }
            ArchiveFormat::TarBz2 => {
                let bz = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
                write_tar(bz, entries, mtime)?.finish()?;
            }
            ArchiveFormat::TarZst => {
                let zst = zstd::stream::write::Encoder::new(file, 0)?;
                write_tar(zst, entries, mtime)?.finish()?;
            }
            ArchiveFormat::Zip => write_zip(file, entries, mtime)?,
        }
    }

    pending.as_file_mut().flush()?;
    pending.persist(path).map_err(|e| e.error)?;
    Ok(fs::metadata(path)?.len())
}

fn write_tar<W: Write>(writer: W, entries: &[ArchiveEntry], mtime: i64) -> io::Result<W> {
    let mut archive = tar::Builder::new(writer);
    for entry in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mtime(mtime.max(0) as u64);
        header.set_mode(entry.kind.unix_mode());
        header.set_uid(0);
        header.set_gid(0);

        if entry.kind == EntryKind::Link {
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            header.set_link_name(&*String::from_utf8_lossy(&entry.data))?;
            archive.append_data(&mut header, &entry.path, io::empty())?;
        } else {
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(entry.data.len() as u64);
            archive.append_data(&mut header, &entry.path, entry.data.as_slice())?;
        }
    }
    archive.into_inner()
}

fn write_zip(file: &mut fs::File, entries: &[ArchiveEntry], mtime: i64) -> Result<()> {
    let mut archive = zip::ZipWriter::new(file);
    let modified = zip_time(mtime);

    for entry in entries {
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(entry.kind.unix_mode())
            .last_modified_time(modified);

        if entry.kind == EntryKind::Link {
            let target = String::from_utf8_lossy(&entry.data).to_string();
            archive.add_symlink(entry.path.as_str(), target, options)?;
        } else {
            archive.start_file(entry.path.as_str(), options)?;
            archive.write_all(&entry.data)?;
        }
    }
    archive.finish()?;
    Ok(())
}

fn zip_time(seconds: i64) -> zip::DateTime {
    let Ok(time) = time::OffsetDateTime::from_unix_timestamp(seconds) else {
        return zip::DateTime::default();
    };
    zip::DateTime::from_date_and_time(
        time.year().clamp(1980, 2107) as u16,
        u8::from(time.month()),
        time.day(),
        time.hour(),
        time.minute(),
        time.second(),
    )
    .unwrap_or_default()
}
