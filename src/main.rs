use anyhow::{Context, Result};
use gitin::index::find_repositories;
use gitin::{Cli, RenderConfig, render_site};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins over -q/-v
    let default_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    cli.validate().context("Invalid configuration")?;
    let file = cli.load_file_config().context("Failed to load site configuration")?;
    let config = RenderConfig::from_sources(&cli, file).context("Invalid configuration")?;

    let repos = collect_repositories(&cli)?;
    debug!(repos = repos.len(), output = %config.output.display(), "starting render");

    let mut pool = rayon::ThreadPoolBuilder::new();
    if let Some(jobs) = config.jobs {
        pool = pool.num_threads(jobs);
    }
    let pool = pool.build().context("Failed to start worker threads")?;
    let report = pool.install(|| render_site(&config, &repos))?;

    if !config.quiet {
        for repo in &report.repos {
            for path in &repo.generated {
                println!("Generated: {}", path.display());
            }
        }
        for path in &report.generated {
            println!("Generated: {}", path.display());
        }
    }
    for repo in &report.repos {
        info!(
            repository = %repo.name,
            refs = repo.refs,
            diffs = repo.diffs_computed,
            commit_pages = repo.commit_pages,
            "done"
        );
    }

    let errors = report.into_errors();
    if errors.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{} error(s):\n{}", errors.len(), errors);
        Ok(ExitCode::FAILURE)
    }
}

/// Positional repositories plus those found below `--find`.
///
/// The implicit `.` is dropped when `--find` is given.
fn collect_repositories(cli: &Cli) -> Result<Vec<PathBuf>> {
    let Some(root) = &cli.find else {
        return Ok(cli.repos.clone());
    };

    let mut repos: Vec<PathBuf> = if cli.repos == [PathBuf::from(".")] {
        Vec::new()
    } else {
        cli.repos.clone()
    };
    for found in find_repositories(root)? {
        if !repos.contains(&found) {
            repos.push(found);
        }
    }
    Ok(repos)
}
