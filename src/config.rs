//! Command line and site file configuration.
//!
//! Settings come from three layers: command line flags, an optional TOML
//! site file, and built-in defaults. They are merged once into an
//! immutable [`RenderConfig`] that every component borrows.

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive::ArchiveFormat;

/// Site file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "gitin.toml";

const DEFAULT_SITE_NAME: &str = "Repositories";
const DEFAULT_THEME: &str = "InspiredGitHub";
const DEFAULT_AUTO_FILE_LIMIT: usize = 100;
const DEFAULT_MAX_FILE_SIZE: u64 = 100_000;

const DEFAULT_PIN_FILES: &[&str] = &[
    "README",
    "README.md",
    "CONTRIBUTING",
    "CONTRIBUTING.md",
    "CHANGELOG",
    "CHANGELOG.md",
    "LICENSE",
    "LICENSE.md",
    "COPYING",
    "COPYING.md",
    "CODE_OF_CONDUCT",
    "CODE_OF_CONDUCT.md",
    "SECURITY",
    "SECURITY.md",
];

const DEFAULT_ABOUT_FILES: &[&str] = &["README.md", "README", "README.txt"];

/// Command line configuration for gitin.
#[derive(Debug, Clone, Parser)]
#[command(name = "gitin", version, about, long_about = None)]
pub struct Cli {
    /// Repository paths
    #[arg(default_value = ".")]
    pub repos: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "dist")]
    pub output: PathBuf,

    /// Site configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ignore caches and regenerate everything
    #[arg(short, long)]
    pub force: bool,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log every step, including filter commands
    #[arg(short, long)]
    pub verbose: bool,

    /// Commits listed per ref (0 for all)
    #[arg(long)]
    pub max_commits: Option<usize>,

    /// Directory page splitting
    #[arg(long, value_enum)]
    pub split: Option<SplitMode>,

    /// Archive format to build per ref (tar, tar.gz, tar.xz, tar.bz2, tar.zst, zip)
    #[arg(long = "archive")]
    pub archives: Vec<String>,

    /// Also render every repository found below this directory
    #[arg(long)]
    pub find: Option<PathBuf>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Site name shown in page titles
    #[arg(long)]
    pub name: Option<String>,
}

impl Cli {
    /// Parses configuration from command line arguments.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Validates command line configuration.
    ///
    /// # Errors
    ///
    /// Returns error if a repository path or the `--find` root does not exist.
    pub fn validate(&self) -> Result<()> {
        for repo in &self.repos {
            if !repo.exists() {
                bail!("Repository path does not exist: {}", repo.display());
            }
        }
        if let Some(root) = &self.find
            && !root.is_dir()
        {
            bail!("Search directory does not exist: {}", root.display());
        }
        Ok(())
    }

    /// Reads the site file named by `--config`, or `gitin.toml` if present.
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly named file is missing or any file
    /// fails to parse.
    pub fn load_file_config(&self) -> Result<FileConfig> {
        match &self.config {
            Some(path) => FileConfig::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    FileConfig::load(fallback)
                } else {
                    Ok(FileConfig::default())
                }
            }
        }
    }
}

/// Splitting mode as written on the command line or in the site file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    Always,
    Never,
    Auto,
}

/// Resolved directory splitting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPolicy {
    /// Every directory gets its own index page.
    Always,
    /// One flat listing per ref.
    Never,
    /// A directory gets its own page when it holds more than `limit` files.
    Auto { limit: usize },
}

impl SplitPolicy {
    /// Decides whether a directory holding `file_count` files is split.
    pub fn splits(self, file_count: usize) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto { limit } => file_count > limit,
        }
    }
}

/// External preview command bound to a file name pattern.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreviewRule {
    /// File name pattern with at most one `*` wildcard.
    pub pattern: String,
    /// Shell command; receives the file on stdin and `$filename`, `$type`.
    pub command: String,
    /// Value for `$type`, defaults to the file extension.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Contents of the optional TOML site file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub site_name: Option<String>,
    pub footer: Option<String>,
    pub clone_prefix: Option<String>,
    pub theme: Option<String>,
    pub split: Option<SplitMode>,
    pub auto_file_limit: Option<usize>,
    pub max_commits: Option<usize>,
    pub max_file_size: Option<u64>,
    pub archives: Option<Vec<String>>,
    pub pin_files: Option<Vec<String>>,
    pub about_files: Option<Vec<String>>,
    pub highlight_command: Option<String>,
    pub filter_timeout_secs: Option<u64>,
    pub preview: Vec<PreviewRule>,
}

impl FileConfig {
    /// Parses a site file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Settings for one generation run.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub output: PathBuf,
    pub site_name: String,
    pub footer: Option<String>,
    pub clone_prefix: Option<String>,
    pub theme: String,
    pub split: SplitPolicy,
    /// Commits listed per ref, 0 for unlimited.
    pub max_commits: usize,
    /// Blobs larger than this are not highlighted.
    pub max_file_size: u64,
    pub archives: Vec<ArchiveFormat>,
    pub pin_files: Vec<String>,
    pub about_files: Vec<String>,
    pub highlight_command: Option<String>,
    pub filter_timeout: Option<Duration>,
    pub previews: Vec<PreviewRule>,
    pub force: bool,
    pub quiet: bool,
    pub verbose: bool,
    pub jobs: Option<usize>,
}

impl RenderConfig {
    /// Defaults for a site written to `output`.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            site_name: DEFAULT_SITE_NAME.to_string(),
            footer: None,
            clone_prefix: None,
            theme: DEFAULT_THEME.to_string(),
            split: SplitPolicy::Auto {
                limit: DEFAULT_AUTO_FILE_LIMIT,
            },
            max_commits: 0,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            archives: vec![ArchiveFormat::TarGz],
            pin_files: DEFAULT_PIN_FILES.iter().map(|s| s.to_string()).collect(),
            about_files: DEFAULT_ABOUT_FILES.iter().map(|s| s.to_string()).collect(),
            highlight_command: None,
            filter_timeout: None,
            previews: Vec::new(),
            force: false,
            quiet: false,
            verbose: false,
            jobs: None,
        }
    }

    /// Merges command line, site file and defaults.
    ///
    /// # Errors
    ///
    /// Returns error if an archive format is unknown or the automatic split
    /// limit is zero.
    pub fn from_sources(cli: &Cli, file: FileConfig) -> Result<Self> {
        let mut config = Self::new(&cli.output);

        if let Some(name) = cli.name.clone().or(file.site_name) {
            config.site_name = name;
        }
        config.footer = file.footer;
        config.clone_prefix = file.clone_prefix;
        if let Some(theme) = file.theme {
            config.theme = theme;
        }

        let limit = file.auto_file_limit.unwrap_or(DEFAULT_AUTO_FILE_LIMIT);
        if limit == 0 {
            bail!("auto_file_limit must be greater than zero");
        }
        config.split = match cli.split.or(file.split).unwrap_or(SplitMode::Auto) {
            SplitMode::Always => SplitPolicy::Always,
            SplitMode::Never => SplitPolicy::Never,
            SplitMode::Auto => SplitPolicy::Auto { limit },
        };

        if let Some(max) = cli.max_commits.or(file.max_commits) {
            config.max_commits = max;
        }
        if let Some(size) = file.max_file_size {
            config.max_file_size = size;
        }

        let archives = if cli.archives.is_empty() {
            file.archives
        } else {
            Some(cli.archives.clone())
        };
        if let Some(names) = archives {
            config.archives = names
                .iter()
                .map(|name| {
                    ArchiveFormat::parse(name)
                        .with_context(|| format!("Unknown archive format: {}", name))
                })
                .collect::<Result<_>>()?;
        }

        if let Some(pins) = file.pin_files {
            config.pin_files = pins;
        }
        if let Some(about) = file.about_files {
            config.about_files = about;
        }
        config.highlight_command = file.highlight_command;
        config.filter_timeout = file.filter_timeout_secs.map(Duration::from_secs);
        config.previews = file.preview;

        config.force = cli.force;
        config.quiet = cli.quiet;
        config.verbose = cli.verbose;
        config.jobs = cli.jobs;
        Ok(config)
    }

    /// Directory holding the cache store.
    pub fn cache_dir(&self) -> PathBuf {
        self.output.join(".cache")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["gitin"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_cli_defaults() {
        // Act
        let cli = cli(&[]);

        // Assert
        assert_eq!(cli.repos, vec![PathBuf::from(".")]);
        assert_eq!(cli.output, PathBuf::from("dist"));
        assert!(!cli.force);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["gitin", "-q", "-v"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_render_config_defaults() {
        // Act
        let config = RenderConfig::from_sources(&cli(&[]), FileConfig::default()).unwrap();

        // Assert
        assert_eq!(config.site_name, "Repositories");
        assert_eq!(config.split, SplitPolicy::Auto { limit: 100 });
        assert_eq!(config.max_commits, 0);
        assert_eq!(config.max_file_size, 100_000);
        assert_eq!(config.archives, vec![ArchiveFormat::TarGz]);
        assert!(config.pin_files.contains(&"README.md".to_string()));
        assert!(config.filter_timeout.is_none());
    }

    #[test]
    fn test_cli_overrides_file() {
        // Arrange
        let file: FileConfig = toml::from_str(
            r#"
            site_name = "From file"
            max_commits = 10
            split = "never"
            archives = ["zip"]
            "#,
        )
        .unwrap();
        let cli = cli(&[
            "--name",
            "From cli",
            "--max-commits",
            "5",
            "--archive",
            "tar.zst",
        ]);

        // Act
        let config = RenderConfig::from_sources(&cli, file).unwrap();

        // Assert
        assert_eq!(config.site_name, "From cli");
        assert_eq!(config.max_commits, 5);
        assert_eq!(config.split, SplitPolicy::Never);
        assert_eq!(config.archives, vec![ArchiveFormat::TarZst]);
    }

    #[test]
    fn test_file_preview_rules() {
        // Arrange
        let file: FileConfig = toml::from_str(
            r#"
            filter_timeout_secs = 30
            auto_file_limit = 7

            [[preview]]
            pattern = "*.rst"
            command = "pandoc --from=rst --to=html"
            "#,
        )
        .unwrap();

        // Act
        let config = RenderConfig::from_sources(&cli(&[]), file).unwrap();

        // Assert
        assert_eq!(config.previews.len(), 1);
        assert_eq!(config.previews[0].pattern, "*.rst");
        assert_eq!(config.previews[0].kind, None);
        assert_eq!(config.filter_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.split, SplitPolicy::Auto { limit: 7 });
    }

    #[test]
    fn test_unknown_archive_format_rejected() {
        let result = RenderConfig::from_sources(&cli(&["--archive", "rar"]), FileConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        let result: Result<FileConfig, _> = toml::from_str("colour = \"red\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_auto_limit_rejected() {
        let file = FileConfig {
            auto_file_limit: Some(0),
            ..FileConfig::default()
        };
        assert!(RenderConfig::from_sources(&cli(&[]), file).is_err());
    }

    #[test]
    fn test_split_policy_threshold() {
        let auto = SplitPolicy::Auto { limit: 3 };
        assert!(!auto.splits(3));
        assert!(auto.splits(4));
        assert!(SplitPolicy::Always.splits(0));
        assert!(!SplitPolicy::Never.splits(1000));
    }

    #[test]
    fn test_validate_existing_path() {
        assert!(cli(&["."]).validate().is_ok());
        assert!(cli(&["/nonexistent/repo"]).validate().is_err());
    }
}
