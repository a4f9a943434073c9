//! Site-level workflow tests: several repositories sharing one output
//! directory, and the assets and index written around them.

mod common;

use anyhow::Result;
use common::{commit_file, init_repo, quiet_config};
use gitin::render_site;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_single_repository_renders_at_root() -> Result<()> {
    // Arrange
    let work = TempDir::new()?;
    let repo = work.path().join("solo");
    init_repo(&repo)?;
    commit_file(&repo, "a.txt", "a\n", "First")?;
    let out = TempDir::new()?;

    // Act
    let report = render_site(&quiet_config(out.path()), &[repo])?;

    // Assert
    assert_eq!(report.repos.len(), 1);
    assert!(out.path().join("style.css").is_file());
    assert!(out.path().join("highlight.css").is_file());
    assert!(out.path().join("main/index.html").is_file());
    assert!(!out.path().join("solo").exists());

    let summary = fs::read_to_string(out.path().join("main/index.html"))?;
    assert!(!summary.contains(">Repositories</a>"));
    assert!(report.into_errors().is_empty());
    Ok(())
}

#[test]
fn test_multiple_repositories_share_an_index() -> Result<()> {
    // Arrange
    let work = TempDir::new()?;
    let alpha = work.path().join("alpha");
    let beta = work.path().join("beta.git");
    init_repo(&alpha)?;
    init_repo(&beta)?;
    commit_file(&alpha, "a.txt", "a\n", "Alpha")?;
    commit_file(&beta, "b.txt", "b\n", "Beta")?;
    fs::write(beta.join(".git/description"), "The beta project\n")?;
    let out = TempDir::new()?;

    // Act
    let report = render_site(&quiet_config(out.path()), &[alpha, beta])?;

    // Assert
    assert_eq!(report.repos.len(), 2);
    assert!(out.path().join("alpha/main/index.html").is_file());
    assert!(out.path().join("beta/main/index.html").is_file());
    assert!(out.path().join("alpha/.cache").is_dir());
    assert!(out.path().join(".cache/index").is_file());

    let index = fs::read_to_string(out.path().join("index.html"))?;
    assert!(index.contains("<a href=\"alpha/\">alpha</a>"));
    assert!(index.contains("<a href=\"beta/\">beta</a>"));
    assert!(index.contains("The beta project"));

    let summary = fs::read_to_string(out.path().join("alpha/main/index.html"))?;
    assert!(summary.contains("href=\"../../style.css\""));
    assert!(report.into_errors().is_empty());
    Ok(())
}

#[test]
fn test_index_keeps_repositories_from_earlier_runs() -> Result<()> {
    // Arrange
    let work = TempDir::new()?;
    let alpha = work.path().join("alpha");
    let beta = work.path().join("beta");
    let gamma = work.path().join("gamma");
    for repo in [&alpha, &beta, &gamma] {
        init_repo(repo)?;
        commit_file(repo, "a.txt", "a\n", "First")?;
    }
    let out = TempDir::new()?;
    let config = quiet_config(out.path());
    render_site(&config, &[alpha.clone(), beta])?;

    // Act
    render_site(&config, &[alpha, gamma])?;

    // Assert
    let index = fs::read_to_string(out.path().join("index.html"))?;
    assert!(index.contains("alpha/"));
    assert!(index.contains("beta/"));
    assert!(index.contains("gamma/"));
    Ok(())
}

#[test]
fn test_duplicate_repository_names_are_reported() -> Result<()> {
    // Arrange
    let work = TempDir::new()?;
    let first = work.path().join("one/app");
    let second = work.path().join("two/app");
    init_repo(&first)?;
    init_repo(&second)?;
    commit_file(&first, "a.txt", "a\n", "First")?;
    commit_file(&second, "b.txt", "b\n", "Second")?;
    let out = TempDir::new()?;

    // Act
    let report = render_site(&quiet_config(out.path()), &[first, second])?;

    // Assert
    assert_eq!(report.repos.len(), 1);
    let errors = report.into_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors.to_string().contains("Duplicate repository name 'app'"));
    Ok(())
}

#[test]
fn test_broken_repository_does_not_stop_others() -> Result<()> {
    // Arrange
    let work = TempDir::new()?;
    let good = work.path().join("good");
    let bad = work.path().join("bad");
    init_repo(&good)?;
    commit_file(&good, "a.txt", "a\n", "First")?;
    fs::create_dir_all(&bad)?;
    let out = TempDir::new()?;

    // Act
    let report = render_site(&quiet_config(out.path()), &[good, bad])?;

    // Assert
    assert!(out.path().join("good/main/index.html").is_file());
    assert_eq!(report.into_errors().len(), 1);
    Ok(())
}
