//! Rendering orchestration.
//!
//! One rayon task per ref, and inside each ref one task per output stream:
//!
//! - history: commit listing, commit pages, `log.xml` and `log.json`
//! - archives
//! - shortlog and `log.svg`
//! - file tree
//!
//! The ref's summary and log pages are written after its streams joined.
//! Failures are collected rather than propagated, so one broken ref does
//! not stop the others; the top-level redirect, feed and JSON index are
//! written from the resolved ref set once every ref task finished.

use anyhow::{Context, Result, anyhow};
use maud::{Markup, html};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveInfo, write_archives};
use crate::assets::write_css_assets;
use crate::cache::{CacheStats, CacheStore, write_atomic};
use crate::commits::{CommitStore, History, get_commits};
use crate::config::RenderConfig;
use crate::error::RenderErrors;
use crate::feeds::{FeedEntry, atom_feed, log_json, refs_json};
use crate::filetree::{TreeEmitter, TreeOutcome};
use crate::git;
use crate::highlight::{HighlightOptions, Highlighter};
use crate::index::{RepoSummary, update_index};
use crate::pages::blob::BlobRenderer;
use crate::pages::{self, RepoContext};
use crate::preview::Previews;
use crate::progress::Progress;
use crate::refs::{ReferenceInfo, claim_directories, default_ref, get_refs};
use crate::shortlog::Shortlog;
use crate::util::unhide_path;

/// Counters and outputs of one repository render.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub name: String,
    pub refs: usize,
    pub diffs_computed: usize,
    pub diff_cache_hits: usize,
    pub commit_pages: usize,
    pub trees_emitted: usize,
    pub trees_skipped: usize,
    pub archives_written: usize,
    pub cache: CacheStats,
    /// Top-level files written.
    pub generated: Vec<PathBuf>,
    /// Row for the multi-repository index.
    pub summary: Option<RepoSummary>,
    /// Per-ref and per-stream failures.
    pub errors: RenderErrors,
}

/// Outcome of rendering all repositories of a site.
#[derive(Debug, Default)]
pub struct SiteReport {
    pub repos: Vec<RenderReport>,
    pub generated: Vec<PathBuf>,
    pub errors: RenderErrors,
}

impl SiteReport {
    /// Every failure of the run, repositories first.
    pub fn into_errors(self) -> RenderErrors {
        let mut errors = RenderErrors::new();
        for repo in self.repos {
            errors.extend(repo.errors);
        }
        errors.extend(self.errors);
        errors
    }
}

/// Renders every repository into the configured output directory
///
/// A single repository is written to the output root. Several are written
/// to `<output>/<name>/` and listed by `<output>/index.html`, merged with
/// repositories rendered by earlier runs.
///
/// # Arguments
///
/// * `config`: Merged configuration
/// * `repos`: Repository paths
///
/// # Errors
///
/// Returns error if the output directory or the stylesheets cannot be
/// written. Failures of individual repositories are collected in the
/// report instead.
pub fn render_site(config: &RenderConfig, repos: &[PathBuf]) -> Result<SiteReport> {
    fs::create_dir_all(&config.output)
        .with_context(|| format!("Failed to create output directory: {}", config.output.display()))?;
    write_css_assets(&config.output, &config.theme)?;

    let mut report = SiteReport::default();
    let multi = repos.len() > 1;
    let mut names = HashSet::new();

    for path in repos {
        let name = match git::repository_name(path) {
            Ok(name) => name,
            Err(e) => {
                report.errors.push(e);
                continue;
            }
        };
        if !names.insert(name.clone()) {
            report
                .errors
                .push(anyhow!("Duplicate repository name '{}' for {}", name, path.display()));
            continue;
        }

        let (out_dir, site_depth) = if multi {
            (config.output.join(&name), 1)
        } else {
            (config.output.clone(), 0)
        };
        match render_repository(config, path, &out_dir, site_depth) {
            Ok(repo_report) => report.repos.push(repo_report),
            Err(e) => report
                .errors
                .push(e.context(format!("Failed to render repository {}", path.display()))),
        }
    }

    if multi {
        let rendered = report.repos.iter().filter_map(|r| r.summary.clone()).collect();
        let listed = update_index(&config.cache_dir(), rendered)?;
        let index = config.output.join("index.html");
        let page = pages::repos::generate(&config.site_name, config.footer.as_deref(), &listed);
        pages::write_page(&index, &page)?;
        report.generated.push(index);
    }

    Ok(report)
}

/// Renders one repository into `out_dir`
///
/// # Arguments
///
/// * `config`: Merged configuration
/// * `repo_path`: Repository location
/// * `out_dir`: Output directory of this repository
/// * `site_depth`: Directory levels between `out_dir` and the site root
///
/// # Errors
///
/// Returns error if the repository cannot be opened or its references
/// cannot be listed. Failures inside refs end up in
/// [`RenderReport::errors`].
///
/// # Examples
///
/// ```no_run
/// use gitin::config::RenderConfig;
/// use gitin::render::render_repository;
/// use std::path::Path;
///
/// let config = RenderConfig::new("dist");
/// let report = render_repository(&config, Path::new("."), Path::new("dist"), 0)?;
/// println!("{} commit pages", report.commit_pages);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn render_repository(
    config: &RenderConfig,
    repo_path: &Path,
    out_dir: &Path,
    site_depth: usize,
) -> Result<RenderReport> {
    let shared = git::open_repository(repo_path)?;
    let repo = shared.to_thread_local();
    let name = git::repository_name(repo_path)?;

    let (refs, collisions) = claim_directories(get_refs(&repo)?);
    let head = git::head_branch(&repo);
    let default = default_ref(&refs, head.as_deref());

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create directory: {}", out_dir.display()))?;
    let cache = CacheStore::new(out_dir.join(".cache"), config.force);

    let head_files: HashSet<String> = match default {
        Some(reference) => git::flatten_tree(&repo, reference.commit().tree_id)?
            .into_iter()
            .map(|entry| entry.path)
            .collect(),
        None => HashSet::new(),
    };
    let ctx = RepoContext {
        site_name: config.site_name.clone(),
        name: name.clone(),
        description: git::description(&repo),
        clone_url: config
            .clone_prefix
            .as_ref()
            .map(|prefix| format!("{}/{}", prefix.trim_end_matches('/'), name)),
        footer: config.footer.clone(),
        default_ref: default.map(|r| r.refname().to_string()),
        pin_files: config
            .pin_files
            .iter()
            .filter(|pin| head_files.contains(pin.as_str()))
            .cloned()
            .collect(),
        head_files,
        site_depth,
    };

    let mut report = RenderReport {
        name: name.clone(),
        refs: refs.len(),
        summary: Some(RepoSummary {
            name: name.clone(),
            description: ctx.description.clone(),
            default_ref: ctx.default_ref.clone(),
            last_author: default.map(|r| r.commit().author.clone()),
        }),
        ..RenderReport::default()
    };
    for collision in collisions {
        report.errors.push(collision.into());
    }
    if refs.is_empty() {
        warn!(repository = %name, "no branches or tags, nothing to render");
        return Ok(report);
    }

    let highlighter = Highlighter::new();
    let previews = Previews::new(&cache, &highlighter, &config.previews, config.filter_timeout);
    let renderer = BlobRenderer {
        cache: &cache,
        highlighter: &highlighter,
        highlight: HighlightOptions {
            command: config.highlight_command.as_deref(),
            scheme: &config.theme,
            timeout: config.filter_timeout,
        },
        previews: &previews,
        max_file_size: config.max_file_size,
    };
    let store = CommitStore::new(&cache);
    let progress = Progress::new(config.quiet || config.verbose);

    let run = RepoRun {
        config,
        repo: &shared,
        out_dir,
        refs: &refs,
        ctx: &ctx,
        cache: &cache,
        store: &store,
        previews: &previews,
        renderer: &renderer,
        progress: &progress,
        written: Mutex::new(HashSet::new()),
        errors: Mutex::new(RenderErrors::new()),
        commit_pages: AtomicUsize::new(0),
        trees_emitted: AtomicUsize::new(0),
        trees_skipped: AtomicUsize::new(0),
        archives_written: AtomicUsize::new(0),
    };

    rayon::scope(|s| {
        for reference in &refs {
            let run = &run;
            s.spawn(move |_| run.render_ref(reference));
        }
    });

    if let Some(reference) = default {
        match run.write_global(reference) {
            Ok(mut files) => report.generated.append(&mut files),
            Err(e) => run.errors.lock().push(e),
        }
    }

    report.diffs_computed = store.computed();
    report.diff_cache_hits = store.disk_hits();
    report.commit_pages = run.commit_pages.load(Ordering::Relaxed);
    report.trees_emitted = run.trees_emitted.load(Ordering::Relaxed);
    report.trees_skipped = run.trees_skipped.load(Ordering::Relaxed);
    report.archives_written = run.archives_written.load(Ordering::Relaxed);
    report.errors.extend(run.errors.into_inner());
    report.cache = cache.stats();

    info!(
        repository = %name,
        refs = report.refs,
        diffs = report.diffs_computed,
        diff_hits = report.diff_cache_hits,
        commit_pages = report.commit_pages,
        trees = report.trees_emitted,
        trees_skipped = report.trees_skipped,
        cache_hits = report.cache.hits,
        cache_misses = report.cache.misses,
        errors = report.errors.len(),
        "repository rendered"
    );
    Ok(report)
}

/// State shared by the ref tasks of one repository.
struct RepoRun<'a> {
    config: &'a RenderConfig,
    repo: &'a gix::ThreadSafeRepository,
    out_dir: &'a Path,
    refs: &'a [ReferenceInfo],
    ctx: &'a RepoContext,
    cache: &'a CacheStore,
    store: &'a CommitStore<'a>,
    previews: &'a Previews<'a>,
    renderer: &'a BlobRenderer<'a>,
    progress: &'a Progress,
    /// Commit pages claimed by some ref in this run.
    written: Mutex<HashSet<String>>,
    errors: Mutex<RenderErrors>,
    commit_pages: AtomicUsize,
    trees_emitted: AtomicUsize,
    trees_skipped: AtomicUsize,
    archives_written: AtomicUsize,
}

impl RepoRun<'_> {
    fn render_ref(&self, reference: &ReferenceInfo) {
        let ref_dir = self.out_dir.join(reference.refname());
        if let Err(e) = fs::create_dir_all(&ref_dir) {
            self.fail(reference, anyhow!(e).context(format!("Failed to create {}", ref_dir.display())));
            return;
        }
        debug!(refname = reference.refname(), "rendering ref");

        let mut history = None;
        let mut archives = None;
        let mut shortlog = None;
        let mut tree = None;
        rayon::scope(|s| {
            s.spawn(|_| history = Some(self.render_history(reference, &ref_dir)));
            s.spawn(|_| archives = Some(self.render_archives(reference, &ref_dir)));
            s.spawn(|_| shortlog = Some(self.render_shortlog(reference, &ref_dir)));
            s.spawn(|_| tree = Some(self.render_tree(reference, &ref_dir)));
        });

        let history = self.settle(reference, history);
        let archives = self.settle(reference, archives);
        let shortlog = self.settle(reference, shortlog);
        let tree = self.settle(reference, tree);

        match tree {
            Some(TreeOutcome::Emitted { blobs }) => {
                debug!(refname = reference.refname(), blobs, "file tree emitted");
                self.trees_emitted.fetch_add(1, Ordering::Relaxed);
            }
            Some(TreeOutcome::Skipped) => {
                self.trees_skipped.fetch_add(1, Ordering::Relaxed);
            }
            None => {}
        }

        let (Some(history), Some(archives), Some(shortlog), Some(_)) = (history, archives, shortlog, tree) else {
            warn!(refname = reference.refname(), "skipping summary and log pages after failures");
            return;
        };
        if let Err(e) = self.write_ref_pages(reference, &ref_dir, &history, &archives, &shortlog) {
            self.fail(reference, e);
        }
    }

    /// Unwraps a stream result, recording its failure.
    fn settle<T>(&self, reference: &ReferenceInfo, result: Option<Result<T>>) -> Option<T> {
        match result? {
            Ok(value) => Some(value),
            Err(e) => {
                self.fail(reference, e);
                None
            }
        }
    }

    fn fail(&self, reference: &ReferenceInfo, e: anyhow::Error) {
        let e = e.context(format!("Failed to render ref {}", reference.name()));
        error!(error = %format!("{:#}", e), "ref failed");
        self.errors.lock().push(e);
    }

    /// Walks history, writes unclaimed commit pages and the ref's feeds.
    fn render_history(&self, reference: &ReferenceInfo, ref_dir: &Path) -> Result<History> {
        let repo = self.repo.to_thread_local();
        let history = get_commits(&repo, reference.tip(), self.store, self.config.max_commits)?;
        let commit_dir = self.out_dir.join("commit");
        let listed: HashSet<&str> = history.commits().iter().map(|c| c.id()).collect();

        for commit in history.commits() {
            if !self.written.lock().insert(commit.id().to_string()) {
                continue;
            }
            let target = commit_dir.join(format!("{}.html", commit.id()));
            if !self.config.force && target.is_file() {
                continue;
            }
            let parent_linked = commit.parent_id().is_some_and(|p| listed.contains(p));
            let page = pages::commit::generate(self.ctx, commit, parent_linked);
            pages::write_page(&target, &page)?;
            self.commit_pages.fetch_add(1, Ordering::Relaxed);
        }

        let entries: Vec<FeedEntry> = history
            .commits()
            .iter()
            .map(|commit| FeedEntry::from_commit(commit, "../"))
            .collect();
        let kind = if reference.is_tag() { "tag" } else { "branch" };
        let title = format!("{}, {} {}", self.ctx.name, kind, reference.name());
        let feed = atom_feed(&title, self.ctx.description.as_deref(), &entries);
        write_atomic(&ref_dir.join("log.xml"), feed.as_bytes())?;
        let json = log_json(history.commits().iter().map(|c| &**c))?;
        write_atomic(&ref_dir.join("log.json"), &json)?;

        Ok(history)
    }

    fn render_archives(&self, reference: &ReferenceInfo, ref_dir: &Path) -> Result<Vec<ArchiveInfo>> {
        if self.config.archives.is_empty() {
            return Ok(Vec::new());
        }
        let repo = self.repo.to_thread_local();
        let prefix = format!("{}-{}", self.ctx.name, reference.refname());
        let (listing, written) = write_archives(
            &repo,
            self.cache,
            &self.config.archives,
            &prefix,
            reference.refname(),
            reference.commit(),
            ref_dir,
        )?;
        if written {
            self.archives_written.fetch_add(listing.len(), Ordering::Relaxed);
        }
        Ok(listing)
    }

    fn render_shortlog(&self, reference: &ReferenceInfo, ref_dir: &Path) -> Result<Shortlog> {
        let repo = self.repo.to_thread_local();
        let shortlog = Shortlog::collect(&repo, reference.tip(), self.refs)?;
        write_atomic(&ref_dir.join("log.svg"), shortlog.render_svg().as_bytes())?;
        Ok(shortlog)
    }

    fn render_tree(&self, reference: &ReferenceInfo, ref_dir: &Path) -> Result<TreeOutcome> {
        let repo = self.repo.to_thread_local();
        let emitter = TreeEmitter {
            repo: &repo,
            cache: self.cache,
            ctx: self.ctx,
            renderer: self.renderer,
            previews: self.previews,
            split: self.config.split,
        };
        let bar = self
            .progress
            .start(&format!("write files: {}", reference.name()), 0);
        emitter.emit(reference, ref_dir, &bar)
    }

    fn write_ref_pages(
        &self,
        reference: &ReferenceInfo,
        ref_dir: &Path,
        history: &History,
        archives: &[ArchiveInfo],
        shortlog: &Shortlog,
    ) -> Result<()> {
        let log = pages::log::generate(self.ctx, reference, history, archives, shortlog);
        pages::write_page(&ref_dir.join("log.html"), &log)?;

        let about = self.about(reference)?;
        let summary = pages::summary::generate(self.ctx, self.refs, reference, about);
        pages::write_page(&ref_dir.join("index.html"), &summary)
    }

    /// Preview of the first about file present in the ref's tree.
    fn about(&self, reference: &ReferenceInfo) -> Result<Option<Markup>> {
        let repo = self.repo.to_thread_local();
        for file in &self.config.about_files {
            let Some((oid, data)) = git::find_blob_by_path(&repo, reference.commit().tree_id, file)? else {
                continue;
            };
            let raw_href = format!("blobs/{}", unhide_path(file));
            let about = self
                .previews
                .render(file, &oid, &data, &raw_href)
                .unwrap_or_else(|| html! { pre { (String::from_utf8_lossy(&data)) } });
            return Ok(Some(about));
        }
        Ok(None)
    }

    /// Writes the redirect, the Atom feed over ref tips and `index.json`.
    fn write_global(&self, default: &ReferenceInfo) -> Result<Vec<PathBuf>> {
        let index = self.out_dir.join("index.html");
        pages::write_page(&index, &pages::redirect::generate(&format!("{}/", default.refname())))?;

        let atom = self.out_dir.join("atom.xml");
        let entries: Vec<FeedEntry> = self.refs.iter().map(FeedEntry::from_ref).collect();
        let title = format!("{}, all refs", self.ctx.name);
        write_atomic(&atom, atom_feed(&title, self.ctx.description.as_deref(), &entries).as_bytes())?;

        let json = self.out_dir.join("index.json");
        write_atomic(&json, &refs_json(self.refs)?)?;

        Ok(vec![index, atom, json])
    }
}
