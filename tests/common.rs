//! Shared test utilities for integration tests.
//!
//! Helpers for creating temporary git repositories and building render
//! configurations, shared by the integration test files.

#![allow(dead_code)]

use anyhow::Result;
use gitin::RenderConfig;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Creates temporary git repository with test configuration.
///
/// Sets up a clean git repository with user name and email configured and
/// `main` as the initial branch.
///
/// # Returns
///
/// Temporary directory containing initialized git repository
///
/// # Errors
///
/// Returns error if git commands fail or directory creation fails
pub fn create_test_repo() -> Result<TempDir> {
    let dir = TempDir::new()?;
    init_repo(dir.path())?;
    Ok(dir)
}

/// Initializes a git repository at `path`, creating the directory.
///
/// # Errors
///
/// Returns error if git commands fail or directory creation fails
pub fn init_repo(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    git(path, &["init"])?;
    git(path, &["config", "user.name", "Test User"])?;
    git(path, &["config", "user.email", "test@example.com"])?;
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
    Ok(())
}

/// Commits staged changes and returns commit hash.
///
/// # Arguments
///
/// * `repo_path`: Path to git repository
/// * `message`: Commit message
///
/// # Returns
///
/// Full commit hash as string
///
/// # Errors
///
/// Returns error if commit fails or hash cannot be retrieved
pub fn git_commit(repo_path: &Path, message: &str) -> Result<String> {
    let output = Command::new("git")
        .args(["commit", "-m", message])
        .current_dir(repo_path)
        .output()?;

    if !output.status.success() {
        anyhow::bail!(
            "Git commit failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_path)
        .output()?;

    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Stages files in repository.
///
/// # Arguments
///
/// * `repo_path`: Path to git repository
/// * `files`: File paths to stage
///
/// # Errors
///
/// Returns error if git add fails
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use std::path::Path;
/// # fn example(repo_path: &Path) -> Result<()> {
/// // Stage all changes
/// common::git_add(repo_path, &["."])?;
///
/// // Stage specific files
/// common::git_add(repo_path, &["file1.txt", "file2.rs"])?;
/// # Ok(())
/// # }
/// ```
pub fn git_add(repo_path: &Path, files: &[&str]) -> Result<()> {
    let mut args = vec!["add"];
    args.extend_from_slice(files);

    let output = Command::new("git")
        .args(&args)
        .current_dir(repo_path)
        .output()?;

    if !output.status.success() {
        anyhow::bail!(
            "Git add failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    Ok(())
}

/// Writes file to repository, creating parent directories as needed.
///
/// # Errors
///
/// Returns error if directory creation or file write fails
pub fn write_file(repo_path: &Path, path: &str, content: &str) -> Result<()> {
    let file_path = repo_path.join(path);
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(file_path, content)?;
    Ok(())
}

/// Runs a git command in `repo_path`, failing on a non-zero exit.
///
/// # Errors
///
/// Returns error if git cannot be spawned or exits unsuccessfully
pub fn git(repo_path: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()?;

    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    Ok(())
}

/// Writes, stages and commits one file.
///
/// # Errors
///
/// Returns error if any git step fails
pub fn commit_file(repo_path: &Path, path: &str, content: &str, message: &str) -> Result<String> {
    write_file(repo_path, path, content)?;
    git_add(repo_path, &[path])?;
    git_commit(repo_path, message)
}

/// Render configuration writing to `output` without progress bars.
pub fn quiet_config(output: &Path) -> RenderConfig {
    let mut config = RenderConfig::new(output);
    config.quiet = true;
    config
}
