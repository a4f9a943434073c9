//! Content-addressed cache for rendering artifacts.
//!
//! Entries live at `<root>/<namespace>/<id>`. A namespace names the kind of
//! artifact (`files`, `highlight`, `diffs`, `preview-0`, ...) and the id is
//! a stable identity such as a blob or commit object id, so an entry never
//! goes stale: the same key always describes the same bytes.
//!
//! Writes are streamed through a tee into a temporary file next to the
//! final location and renamed into place only after the producer
//! succeeded, so an interrupted render leaves no entry behind.

use anyhow::{Context, Result, bail};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Address of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: String,
    id: String,
}

impl CacheKey {
    /// Builds a key from a namespace and an opaque identifier.
    ///
    /// # Errors
    ///
    /// Returns error if either part is empty, `.`/`..`, or contains a path
    /// separator, since both become single path components on disk.
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let id = id.into();
        validate_component(&namespace).context("Invalid cache namespace")?;
        validate_component(&id).context("Invalid cache id")?;
        Ok(Self { namespace, id })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

fn validate_component(part: &str) -> Result<()> {
    if part.is_empty() || part == "." || part == ".." || part.contains(['/', '\\']) {
        bail!("'{}' is not a single path component", part);
    }
    Ok(())
}

/// Counters over the lifetime of one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub produced: usize,
}

/// Filesystem-backed cache shared by all render tasks of a run.
#[derive(Debug)]
pub struct CacheStore {
    root: PathBuf,
    force: bool,
    hits: AtomicUsize,
    misses: AtomicUsize,
    produced: AtomicUsize,
}

impl CacheStore {
    /// Creates a store rooted at `root`.
    ///
    /// With `force` set every lookup is a miss and entries are rewritten.
    pub fn new(root: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            root: root.into(),
            force,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            produced: AtomicUsize::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn force(&self) -> bool {
        self.force
    }

    /// Location of an entry on disk.
    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(&key.namespace).join(&key.id)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            produced: self.produced.load(Ordering::Relaxed),
        }
    }

    /// Serves `key` from the cache, or runs `produce` and caches its output.
    ///
    /// On a hit the stored bytes are copied verbatim to `dest` and `produce`
    /// is never called. On a miss `produce` writes into a tee that forwards
    /// to `dest` and to a pending cache entry, which is committed only if
    /// `produce` returns `Ok` and wrote at least one byte.
    ///
    /// # Arguments
    ///
    /// * `dest`: Writer receiving the rendered bytes
    /// * `key`: Cache entry address
    /// * `produce`: Renderer invoked on a miss
    ///
    /// # Errors
    ///
    /// Returns error if `produce` fails, if writing to `dest` fails, or if
    /// the cache entry cannot be committed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gitin::cache::{CacheKey, CacheStore};
    ///
    /// let store = CacheStore::new("dist/.cache", false);
    /// let key = CacheKey::new("highlight", "3b18e512dba79e4c8300dd08aeb37f8e728b8dad")?;
    /// let mut page = Vec::new();
    /// store.cached_render(&mut page, &key, |w| {
    ///     w.write_all(b"<pre>hello</pre>")?;
    ///     Ok(())
    /// })?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn cached_render<W, F>(&self, dest: &mut W, key: &CacheKey, produce: F) -> Result<()>
    where
        W: Write + ?Sized,
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        if let Some(bytes) = self.lookup(key) {
            dest.write_all(&bytes)
                .with_context(|| format!("Failed to write cached {}", key.namespace))?;
            return Ok(());
        }

        let path = self.path(key);
        let dir = self.root.join(&key.namespace);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
        let mut pending = tempfile::Builder::new()
            .prefix(".pending-")
            .tempfile_in(&dir)
            .with_context(|| format!("Failed to create cache entry in {}", dir.display()))?;

        let written = {
            let mut tee = Tee {
                dest: &mut *dest,
                cache: pending.as_file_mut(),
                written: 0,
            };
            produce(&mut tee)?;
            tee.flush()
                .with_context(|| format!("Failed to flush cache entry: {}", path.display()))?;
            tee.written
        };
        self.produced.fetch_add(1, Ordering::Relaxed);

        if written == 0 {
            debug!(key = %path.display(), "empty output, not cached");
            return Ok(());
        }

        pending
            .persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to commit cache entry: {}", path.display()))?;
        Ok(())
    }

    /// Reads an entry as raw bytes, honouring force mode.
    ///
    /// Missing, empty and unreadable entries all read as `None`.
    pub fn read_entry(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.lookup(key)
    }

    /// Stores raw bytes under `key`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns error if the entry cannot be written.
    pub fn write_entry(&self, key: &CacheKey, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.path(key), bytes)
    }

    fn lookup(&self, key: &CacheKey) -> Option<Vec<u8>> {
        if self.force {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let path = self.path(key);
        match fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(bytes)
            }
            Ok(_) => {
                warn!(path = %path.display(), "ignoring empty cache entry");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable cache entry");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }
}

/// Writes `bytes` to `path` through a sibling temporary file and a rename.
///
/// # Errors
///
/// Returns error if the parent directory cannot be created or the file
/// cannot be written or renamed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("Path has no parent directory: {}", path.display()))?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut pending = tempfile::Builder::new()
        .prefix(".pending-")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    pending
        .write_all(bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pending
        .persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to rename into place: {}", path.display()))?;
    Ok(())
}

struct Tee<'a, W: Write + ?Sized> {
    dest: &'a mut W,
    cache: &'a mut fs::File,
    written: u64,
}

impl<W: Write + ?Sized> Write for Tee<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.dest.write(buf)?;
        self.cache.write_all(&buf[..n])?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.dest.flush()?;
        self.cache.flush()
    }
}
