//! User configuration: scan roots, ignore globs, traversal depth, polling
//! cadence and alias commands.
//!
//! Stored as TOML at `$XDG_CONFIG_HOME/gv/config.toml` (or
//! `~/.config/gv/config.toml`). A missing file means defaults.

use globset::{Glob, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

const CONFIG_DIR: &str = "gv";
const CONFIG_FILE: &str = "config.toml";

/// Directories that almost never hold repositories worth tracking.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "**/node_modules/**",
    "**/vendor/**",
    "**/.cache/**",
    "**/.npm/**",
    "**/.pnpm/**",
    "**/__pycache__/**",
    "**/.venv/**",
    "**/venv/**",
    "**/.tox/**",
    "**/target/**",
    "**/build/**",
    "**/dist/**",
];

/// Errors that can occur while loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write config {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Result type alias using ConfigError
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Roots the scanner walks
    pub scan_paths: Vec<PathBuf>,
    /// Globs matched against full directory paths; matches are not descended
    pub ignore_patterns: Vec<String>,
    /// Deepest directory level below a root that is still probed
    pub max_depth: usize,
    pub poll_interval_secs: u64,
    /// Whether the poller runs in the background
    pub auto_refresh: bool,
    /// Alias name to git arguments, e.g. `last = "log -1 --oneline"`
    pub aliases: IndexMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_paths: Vec::new(),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            max_depth: DEFAULT_MAX_DEPTH,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            auto_refresh: true,
            aliases: IndexMap::new(),
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/gv/config.toml`, else `~/.config/gv/config.toml`
    pub fn default_path() -> PathBuf {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from(".config"));
        base.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load from `path`. A missing file yields defaults; `~` in scan paths
    /// is expanded.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.scan_paths = config.scan_paths.iter().map(|p| expand_home(p)).collect();
        Ok(config)
    }

    /// Write pretty TOML to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Compile `ignore_patterns`
    pub fn ignore_set(&self) -> Result<IgnoreSet> {
        IgnoreSet::new(&self.ignore_patterns)
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Compiled ignore globs.
///
/// A pattern ending in `/**` also matches the directory itself, so the walker
/// prunes `node_modules` rather than visiting it and skipping its children.
/// The walker matches paths relative to the scan root.
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    set: GlobSet,
}

impl IgnoreSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            builder.add(compile(pattern)?);
            if let Some(dir) = pattern.strip_suffix("/**")
                && !dir.is_empty()
            {
                builder.add(compile(dir)?);
            }
        }
        let set = builder.build().map_err(|source| ConfigError::InvalidPattern {
            pattern: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            source,
        })?;
        Ok(Self { set })
    }

    /// Matches nothing
    pub fn empty() -> Self {
        Self {
            set: GlobSet::empty(),
        }
    }

    pub fn is_match(&self, path: &Path) -> bool {
        self.set.is_match(path)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

fn compile(pattern: &str) -> Result<Glob> {
    Glob::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}
