//! Configuration for the generator and the `buildinfo` command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use buildinfo_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::generator::{DEFAULT_FUNC_NAME, DEFAULT_PACKAGE, DEFAULT_TEMPLATE, DEFAULT_VERSION};
use crate::git::{Git, TagMode};
use crate::template::Template;

/// Environment variable naming a configuration file to load by default.
pub const CONFIG_ENV: &str = "BUILDINFO_CONFIG";

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source control settings.
    pub git: GitConfig,

    /// Code generation settings.
    pub generate: GenerateConfig,
}

/// Source control settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Repository directory; the current directory when unset.
    pub dir: Option<PathBuf>,

    /// Describe the highest tag instead of the one reachable from `HEAD`.
    pub latest: bool,

    /// Deadline for each git invocation, in seconds. `0` disables it.
    pub timeout_secs: u64,
}

/// Code generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    pub package: String,
    pub func_name: String,
    pub default_version: String,

    /// Template file used instead of the built-in template.
    pub template: Option<PathBuf>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            dir: None,
            latest: false,
            timeout_secs: 30,
        }
    }
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            package: DEFAULT_PACKAGE.to_string(),
            func_name: DEFAULT_FUNC_NAME.to_string(),
            default_version: DEFAULT_VERSION.to_string(),
            template: None,
        }
    }
}

impl GenerateConfig {
    /// The configured template file, or the built-in template.
    pub fn load_template(&self) -> Result<Template> {
        match &self.template {
            Some(path) => Template::parse(&std::fs::read_to_string(path)?),
            None => Template::parse(DEFAULT_TEMPLATE),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load the file named by `BUILDINFO_CONFIG`, or the defaults when unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn tag_mode(&self) -> TagMode {
        if self.git.latest {
            TagMode::Latest
        } else {
            TagMode::Current
        }
    }

    /// Cancellation token carrying the configured deadline.
    pub fn cancel_token(&self) -> CancelToken {
        match self.git.timeout_secs {
            0 => CancelToken::new(),
            secs => CancelToken::with_timeout(Duration::from_secs(secs)),
        }
    }

    /// Git client for the configured directory and deadline.
    pub fn git(&self) -> Git {
        let git = Git::new().with_cancel(self.cancel_token());
        match &self.git.dir {
            Some(dir) => git.in_dir(dir),
            None => git,
        }
    }
}
