//! Integration tests for rendering whole repositories.
//!
//! Each test builds a small repository with the git CLI, renders it and
//! inspects the output tree and the render report.

mod common;

use anyhow::Result;
use common::{commit_file, create_test_repo, git, git_add, git_commit, quiet_config, write_file};
use gitin::config::SplitPolicy;
use gitin::render_repository;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_single_commit_renders_every_page() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    let id = commit_file(repo.path(), "README", "hello", "Initial commit")?;
    let out = TempDir::new()?;

    // Act
    let report = render_repository(&quiet_config(out.path()), repo.path(), out.path(), 0)?;

    // Assert
    assert!(report.errors.is_empty(), "{}", report.errors);
    assert_eq!(report.refs, 1);
    assert_eq!(report.commit_pages, 1);
    assert_eq!(report.trees_emitted, 1);

    let redirect = fs::read_to_string(out.path().join("index.html"))?;
    assert!(redirect.contains("url=main/"));

    let summary = fs::read_to_string(out.path().join("main/index.html"))?;
    assert!(summary.contains("<h2>Branches</h2>"));
    assert!(summary.contains("<h2>About</h2>"));
    assert!(summary.contains("hello"));

    let commit = fs::read_to_string(out.path().join(format!("commit/{}.html", id)))?;
    assert!(commit.contains("Initial commit"));
    assert!(commit.contains("1 file changed, 1 insertion(+), 0 deletions(-)"));

    let blob = fs::read_to_string(out.path().join("main/files/README.html"))?;
    assert!(blob.contains("README (5B)"));
    assert_eq!(fs::read_to_string(out.path().join("main/blobs/README"))?, "hello");

    let log = fs::read_to_string(out.path().join("main/log.html"))?;
    assert!(log.contains("Commits of main"));
    assert!(!log.contains("left out"));

    for file in ["main/log.xml", "main/log.json", "main/log.svg", "main/main.tar.gz", "atom.xml"] {
        assert!(out.path().join(file).is_file(), "missing {}", file);
    }
    let index: serde_json::Value = serde_json::from_str(&fs::read_to_string(out.path().join("index.json"))?)?;
    assert_eq!(index["branches"][0]["name"], "main");
    assert_eq!(index["branches"][0]["commit"]["id"], id.as_str());
    Ok(())
}

#[test]
fn test_shared_commits_get_one_page() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    let first = commit_file(repo.path(), "a.txt", "a\n", "First")?;
    let second = commit_file(repo.path(), "b.txt", "b\n", "Second")?;
    git(repo.path(), &["checkout", "-q", "-b", "dev"])?;
    let third = commit_file(repo.path(), "c.txt", "c\n", "Third")?;
    let out = TempDir::new()?;

    // Act
    let report = render_repository(&quiet_config(out.path()), repo.path(), out.path(), 0)?;

    // Assert
    assert!(report.errors.is_empty(), "{}", report.errors);
    assert_eq!(report.refs, 2);
    assert_eq!(report.commit_pages, 3);
    for id in [&first, &second, &third] {
        assert!(out.path().join(format!("commit/{}.html", id)).is_file());
    }
    let dev_log = fs::read_to_string(out.path().join("dev/log.html"))?;
    let main_log = fs::read_to_string(out.path().join("main/log.html"))?;
    assert!(dev_log.contains(&third));
    assert!(!main_log.contains(&third));
    assert!(main_log.contains(&second));
    assert!(out.path().join("dev/files/c.txt.html").is_file());
    assert!(!out.path().join("main/files/c.txt.html").exists());
    Ok(())
}

#[test]
fn test_rerender_reuses_caches() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    commit_file(repo.path(), "a.txt", "a\n", "First")?;
    commit_file(repo.path(), "a.txt", "a\nb\n", "Second")?;
    let out = TempDir::new()?;
    let config = quiet_config(out.path());
    let first = render_repository(&config, repo.path(), out.path(), 0)?;
    let log_before = fs::read_to_string(out.path().join("main/log.html"))?;

    // Act
    let second = render_repository(&config, repo.path(), out.path(), 0)?;

    // Assert
    assert_eq!(first.diffs_computed, 2);
    assert_eq!(second.diffs_computed, 0);
    assert_eq!(second.diff_cache_hits, 2);
    assert_eq!(second.commit_pages, 0);
    assert_eq!(second.trees_skipped, 1);
    assert_eq!(second.trees_emitted, 0);
    assert_eq!(fs::read_to_string(out.path().join("main/log.html"))?, log_before);
    Ok(())
}

#[test]
fn test_new_commit_renders_only_new_work() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    commit_file(repo.path(), "a.txt", "a\n", "First")?;
    let out = TempDir::new()?;
    let config = quiet_config(out.path());
    render_repository(&config, repo.path(), out.path(), 0)?;
    let id = commit_file(repo.path(), "b.txt", "b\n", "Second")?;

    // Act
    let report = render_repository(&config, repo.path(), out.path(), 0)?;

    // Assert
    assert_eq!(report.diffs_computed, 1);
    assert_eq!(report.commit_pages, 1);
    assert_eq!(report.trees_emitted, 1);
    assert!(out.path().join(format!("commit/{}.html", id)).is_file());
    assert!(out.path().join("main/files/b.txt.html").is_file());
    Ok(())
}

#[test]
fn test_force_rebuilds_everything() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    commit_file(repo.path(), "a.txt", "a\n", "First")?;
    commit_file(repo.path(), "b.txt", "b\n", "Second")?;
    let out = TempDir::new()?;
    let mut config = quiet_config(out.path());
    render_repository(&config, repo.path(), out.path(), 0)?;
    config.force = true;

    // Act
    let report = render_repository(&config, repo.path(), out.path(), 0)?;

    // Assert
    assert_eq!(report.diffs_computed, 2);
    assert_eq!(report.diff_cache_hits, 0);
    assert_eq!(report.commit_pages, 2);
    assert_eq!(report.trees_emitted, 1);
    Ok(())
}

#[test]
fn test_truncated_history() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    let oldest = commit_file(repo.path(), "a.txt", "1\n", "One")?;
    let middle = commit_file(repo.path(), "a.txt", "2\n", "Two")?;
    let newest = commit_file(repo.path(), "a.txt", "3\n", "Three")?;
    let out = TempDir::new()?;
    let mut config = quiet_config(out.path());
    config.max_commits = 2;

    // Act
    let report = render_repository(&config, repo.path(), out.path(), 0)?;

    // Assert
    assert_eq!(report.commit_pages, 2);
    assert!(!out.path().join(format!("commit/{}.html", oldest)).exists());

    let log = fs::read_to_string(out.path().join("main/log.html"))?;
    assert!(log.contains("1 commit left out."));

    let last_listed = fs::read_to_string(out.path().join(format!("commit/{}.html", middle)))?;
    assert!(last_listed.contains(&format!("<code>{}</code>", oldest)));
    assert!(!last_listed.contains(&format!("href=\"{}.html\"", oldest)));

    let tip = fs::read_to_string(out.path().join(format!("commit/{}.html", newest)))?;
    assert!(tip.contains(&format!("href=\"{}.html\"", middle)));
    Ok(())
}

#[test]
fn test_tags_get_their_own_directory() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    commit_file(repo.path(), "a.txt", "a\n", "First")?;
    git(repo.path(), &["tag", "v1.0"])?;
    commit_file(repo.path(), "a.txt", "b\n", "Second")?;
    let out = TempDir::new()?;

    // Act
    let report = render_repository(&quiet_config(out.path()), repo.path(), out.path(), 0)?;

    // Assert
    assert!(report.errors.is_empty(), "{}", report.errors);
    assert_eq!(report.refs, 2);
    assert!(out.path().join("v1.0/index.html").is_file());
    let summary = fs::read_to_string(out.path().join("main/index.html"))?;
    assert!(summary.contains("<h2>Tags</h2>"));

    let index: serde_json::Value = serde_json::from_str(&fs::read_to_string(out.path().join("index.json"))?)?;
    assert_eq!(index["tags"][0]["name"], "v1.0");
    let atom = fs::read_to_string(out.path().join("atom.xml"))?;
    assert!(atom.contains("[v1.0] First"));
    Ok(())
}

#[test]
fn test_split_policy_controls_directory_pages() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    commit_file(repo.path(), "src/lib.rs", "pub fn f() {}\n", "Add lib")?;
    let split_out = TempDir::new()?;
    let inline_out = TempDir::new()?;
    let mut split = quiet_config(split_out.path());
    split.split = SplitPolicy::Always;
    let mut inline = quiet_config(inline_out.path());
    inline.split = SplitPolicy::Never;

    // Act
    render_repository(&split, repo.path(), split_out.path(), 0)?;
    render_repository(&inline, repo.path(), inline_out.path(), 0)?;

    // Assert
    let root = fs::read_to_string(split_out.path().join("main/files/index.html"))?;
    assert!(root.contains("href=\"src/index.html\""));
    assert!(split_out.path().join("main/files/src/index.html").is_file());

    let root = fs::read_to_string(inline_out.path().join("main/files/index.html"))?;
    assert!(root.contains("src/lib.rs"));
    assert!(!inline_out.path().join("main/files/src/index.html").exists());
    assert!(inline_out.path().join("main/files/src/lib.rs.html").is_file());
    Ok(())
}

#[test]
fn test_deleted_file_leaves_tree() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    commit_file(repo.path(), "old.txt", "old\n", "Add old")?;
    let out = TempDir::new()?;
    let config = quiet_config(out.path());
    render_repository(&config, repo.path(), out.path(), 0)?;
    git(repo.path(), &["rm", "-q", "old.txt"])?;
    commit_file(repo.path(), "new.txt", "new\n", "Replace old")?;

    // Act
    render_repository(&config, repo.path(), out.path(), 0)?;

    // Assert
    assert!(!out.path().join("main/files/old.txt.html").exists());
    assert!(!out.path().join("main/blobs/old.txt").exists());
    assert!(out.path().join("main/files/new.txt.html").is_file());
    Ok(())
}

#[test]
fn test_hidden_files_are_unhidden_on_disk() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    commit_file(repo.path(), ".gitignore", "target\n", "Ignore target")?;
    let out = TempDir::new()?;

    // Act
    let report = render_repository(&quiet_config(out.path()), repo.path(), out.path(), 0)?;

    // Assert
    assert!(report.errors.is_empty(), "{}", report.errors);
    let listing = fs::read_to_string(out.path().join("main/files/index.html"))?;
    assert!(listing.contains(".gitignore"));
    assert!(!out.path().join("main/files/.gitignore.html").exists());
    assert!(out.path().join("main/files/-gitignore.html").is_file());
    assert!(out.path().join("main/blobs/-gitignore").is_file());
    Ok(())
}

#[test]
fn test_repository_without_refs_renders_nothing() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    let out = TempDir::new()?;

    // Act
    let report = render_repository(&quiet_config(out.path()), repo.path(), out.path(), 0)?;

    // Assert
    assert_eq!(report.refs, 0);
    assert!(report.errors.is_empty());
    assert!(!out.path().join("index.html").exists());
    Ok(())
}

#[test]
fn test_missing_repository_fails() {
    let out = TempDir::new().expect("tempdir");
    let result = render_repository(
        &quiet_config(out.path()),
        &out.path().join("absent"),
        out.path(),
        0,
    );
    assert!(result.is_err());
}

#[test]
fn test_merged_side_branch_commits_are_listed() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    let base = commit_file(repo.path(), "base.txt", "base\n", "Base")?;
    git(repo.path(), &["checkout", "-q", "-b", "feature"])?;
    let side = commit_file(repo.path(), "side.txt", "side\n", "Side work")?;
    git(repo.path(), &["checkout", "-q", "main"])?;
    let mainline = commit_file(repo.path(), "main.txt", "main\n", "Main work")?;
    git(repo.path(), &["merge", "-q", "--no-ff", "feature", "-m", "Merge feature"])?;
    git(repo.path(), &["branch", "-q", "-D", "feature"])?;
    let out = TempDir::new()?;

    // Act
    let report = render_repository(&quiet_config(out.path()), repo.path(), out.path(), 0)?;

    // Assert
    assert!(report.errors.is_empty(), "{}", report.errors);
    assert_eq!(report.refs, 1);
    assert_eq!(report.commit_pages, 4);
    let log = fs::read_to_string(out.path().join("main/log.html"))?;
    for id in [&base, &side, &mainline] {
        assert!(log.contains(id.as_str()), "log misses {}", id);
        assert!(out.path().join(format!("commit/{}.html", id)).is_file());
    }
    assert!(!log.contains("left out"));
    let shortlog = fs::read_to_string(out.path().join("main/log.svg"))?;
    assert!(shortlog.contains(">4<"), "all four commits counted on one day");
    Ok(())
}

#[test]
fn test_unusual_file_names_render() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    let long_name = format!("{}.txt", "n".repeat(220));
    write_file(repo.path(), "back\\slash.txt", "one\n")?;
    write_file(repo.path(), &long_name, "two\n")?;
    git_add(repo.path(), &["."])?;
    git_commit(repo.path(), "Add unusual names")?;
    let out = TempDir::new()?;

    // Act
    let report = render_repository(&quiet_config(out.path()), repo.path(), out.path(), 0)?;

    // Assert
    assert!(report.errors.is_empty(), "{}", report.errors);
    assert_eq!(report.trees_emitted, 1);
    assert!(out.path().join("main/files/back\\slash.txt.html").is_file());
    assert!(out.path().join(format!("main/files/{}.html", long_name)).is_file());
    assert!(out.path().join(format!("main/blobs/{}", long_name)).is_file());
    Ok(())
}

#[test]
fn test_work_tree_named_like_bare_repository() -> Result<()> {
    // Arrange
    let parent = TempDir::new()?;
    let repo = parent.path().join("beta.git");
    common::init_repo(&repo)?;
    commit_file(&repo, "README", "beta\n", "Initial")?;
    let out = TempDir::new()?;

    // Act
    let report = render_repository(&quiet_config(out.path()), &repo, out.path(), 0)?;

    // Assert
    assert!(report.errors.is_empty(), "{}", report.errors);
    assert_eq!(report.name, "beta");
    assert_eq!(report.refs, 1);
    assert!(out.path().join("main/files/README.html").is_file());
    Ok(())
}

#[test]
fn test_tag_on_blob_is_dropped() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    commit_file(repo.path(), "README", "hello\n", "Initial commit")?;
    git(repo.path(), &["tag", "blob-tag", "HEAD:README"])?;
    git(repo.path(), &["tag", "v1.0"])?;
    let out = TempDir::new()?;

    // Act
    let report = render_repository(&quiet_config(out.path()), repo.path(), out.path(), 0)?;

    // Assert
    assert!(report.errors.is_empty(), "{}", report.errors);
    assert_eq!(report.refs, 2);
    assert!(!out.path().join("blob-tag").exists());
    assert!(out.path().join("v1.0/index.html").is_file());
    assert!(out.path().join("main/index.html").is_file());
    let index: serde_json::Value = serde_json::from_str(&fs::read_to_string(out.path().join("index.json"))?)?;
    assert_eq!(index["tags"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[test]
fn test_failed_stream_leaves_sibling_refs_and_site_files() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    commit_file(repo.path(), "a.txt", "a\n", "First")?;
    git(repo.path(), &["branch", "dev"])?;
    let out = TempDir::new()?;
    fs::create_dir_all(out.path().join("dev/log.svg/occupied"))?;

    // Act
    let report = render_repository(&quiet_config(out.path()), repo.path(), out.path(), 0)?;

    // Assert
    assert_eq!(report.errors.len(), 1, "{}", report.errors);
    assert!(report.errors.to_string().contains("Failed to render ref dev"));
    assert!(!out.path().join("dev/index.html").exists());
    assert!(out.path().join("dev/files/a.txt.html").is_file());
    for file in ["main/index.html", "main/log.html", "main/log.svg", "index.html", "atom.xml", "index.json"] {
        assert!(out.path().join(file).is_file(), "missing {}", file);
    }
    let index: serde_json::Value = serde_json::from_str(&fs::read_to_string(out.path().join("index.json"))?)?;
    assert_eq!(index["branches"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[test]
fn test_colliding_ref_directories_are_reported() -> Result<()> {
    // Arrange
    let repo = create_test_repo()?;
    commit_file(repo.path(), "a.txt", "a\n", "First")?;
    git(repo.path(), &["branch", "feature/x"])?;
    commit_file(repo.path(), "b.txt", "b\n", "Second")?;
    git(repo.path(), &["branch", "feature-x"])?;
    git(repo.path(), &["tag", "main"])?;
    let out = TempDir::new()?;

    // Act
    let report = render_repository(&quiet_config(out.path()), repo.path(), out.path(), 0)?;

    // Assert
    assert_eq!(report.refs, 2);
    assert_eq!(report.errors.len(), 2, "{}", report.errors);
    let message = report.errors.to_string();
    assert!(message.contains("branch 'feature/x' skipped: directory 'feature-x' already belongs to 'feature-x'"));
    assert!(message.contains("tag 'main' skipped"));
    assert!(out.path().join("feature-x/files/b.txt.html").is_file());
    assert!(out.path().join("main/files/b.txt.html").is_file());
    Ok(())
}
