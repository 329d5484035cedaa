//! Build script support: emits the `cargo:` instructions read back by
//! `buildinfo_core::build_info!` and `buildinfo_core::module_info!`.
//!
//! ```ignore
//! // build.rs
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     buildinfo_gen::Emitter::new().emit()?;
//!     Ok(())
//! }
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use buildinfo_core::{Error, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::git::Git;

/// Build environment variables overriding the injected values.
pub const OVERRIDES: [&str; 4] = [
    "BUILDINFO_VERSION",
    "BUILDINFO_REVISION",
    "BUILDINFO_BRANCH",
    "BUILDINFO_TIME",
];

const LOCKFILE: &str = "Cargo.lock";

type EnvLookup<'a> = Box<dyn Fn(&str) -> Option<String> + 'a>;

/// Collects and prints build script instructions.
pub struct Emitter<'a> {
    env: EnvLookup<'a>,
    git: Option<Git>,
}

impl Default for Emitter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Emitter<'a> {
    /// Emitter reading the build script's environment.
    pub fn new() -> Self {
        Self::with_env(|key| std::env::var(key).ok())
    }

    /// Emitter reading variables through `env`.
    pub fn with_env(env: impl Fn(&str) -> Option<String> + 'a) -> Self {
        Self {
            env: Box::new(env),
            git: None,
        }
    }

    /// Query `git` instead of git in `CARGO_MANIFEST_DIR`.
    pub fn with_git(mut self, git: Git) -> Self {
        self.git = Some(git);
        self
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|v| !v.is_empty())
    }

    /// All instructions, one `cargo:` line each.
    pub fn instructions(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();

        for key in OVERRIDES {
            out.push(format!("cargo:rerun-if-env-changed={key}"));
            if let Some(value) = self.var(key) {
                out.push(rustc_env(key, &value));
            }
        }
        out.push(rustc_env("BUILDINFO_EMITTED", "1"));

        let rustc = self.var("RUSTC").unwrap_or_else(|| "rustc".into());
        match rustc_version(&rustc) {
            Some(version) => out.push(rustc_env("BUILDINFO_RUSTC_VERSION", &version)),
            None => warn!(%rustc, "could not determine rustc version"),
        }
        if let Some(target) = self.var("TARGET") {
            out.push(rustc_env("BUILDINFO_TARGET", &target));
        }
        if let Some(profile) = self.var("PROFILE") {
            out.push(rustc_env("BUILDINFO_PROFILE", &profile));
        }

        let manifest_dir = self.var("CARGO_MANIFEST_DIR").map(PathBuf::from);
        self.vcs_instructions(manifest_dir.as_deref(), &mut out);

        if let Some(lockfile) = manifest_dir.as_deref().and_then(find_lockfile) {
            out.push(format!("cargo:rerun-if-changed={}", lockfile.display()));
            let package = self.var("CARGO_PKG_NAME").unwrap_or_default();
            let deps = read_deps(&lockfile, &package)?;
            out.push(rustc_env("BUILDINFO_DEPS", &deps));
        }

        Ok(out)
    }

    fn vcs_instructions(&self, manifest_dir: Option<&Path>, out: &mut Vec<String>) {
        let git = match (&self.git, manifest_dir) {
            (Some(git), _) => git.clone(),
            (None, Some(dir)) => Git::new().in_dir(dir),
            (None, None) => Git::new(),
        };

        let git_dir = match git.git_dir() {
            Ok(dir) => dir,
            Err(err) => {
                debug!(%err, "no git repository, skipping vcs metadata");
                return;
            }
        };
        for file in ["HEAD", "refs", "packed-refs"] {
            let path = git_dir.join(file);
            if path.exists() {
                out.push(format!("cargo:rerun-if-changed={}", path.display()));
            }
        }

        out.push(rustc_env("BUILDINFO_VCS", "git"));
        if let Ok(revision) = git.head_revision() {
            out.push(rustc_env("BUILDINFO_VCS_REVISION", &revision));
        }
        if let Ok(time) = git.head_time() {
            out.push(rustc_env("BUILDINFO_VCS_TIME", &time));
        }
        if let Ok(branch) = git.branch() {
            out.push(rustc_env("BUILDINFO_VCS_BRANCH", &branch));
        }
        if let Ok(modified) = git.is_modified() {
            out.push(rustc_env("BUILDINFO_VCS_MODIFIED", &modified.to_string()));
        }
    }

    /// Print the instructions to stdout, where cargo reads them.
    pub fn emit(&self) -> Result<()> {
        self.emit_to(&mut io::stdout().lock())
    }

    pub fn emit_to(&self, w: &mut impl Write) -> Result<()> {
        for line in self.instructions()? {
            writeln!(w, "{line}")?;
        }
        Ok(())
    }
}

fn rustc_env(key: &str, value: &str) -> String {
    let value = value.lines().next().unwrap_or_default().trim();
    format!("cargo:rustc-env={key}={value}")
}

/// Version from `rustc --version`, e.g. `1.80.0`.
fn rustc_version(rustc: &str) -> Option<String> {
    let out = Command::new(rustc).arg("--version").output().ok()?;
    if !out.status.success() {
        return None;
    }
    String::from_utf8(out.stdout)
        .ok()?
        .split_whitespace()
        .nth(1)
        .map(str::to_string)
}

/// Nearest `Cargo.lock` in `dir` or one of its ancestors.
fn find_lockfile(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .map(|d| d.join(LOCKFILE))
        .find(|p| p.is_file())
}

#[derive(Debug, Deserialize)]
struct Lockfile {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
}

/// Locked packages other than `package` as `name@version,...`.
fn read_deps(lockfile: &Path, package: &str) -> Result<String> {
    let content = std::fs::read_to_string(lockfile)?;
    let lock: Lockfile = toml::from_str(&content)
        .map_err(|e| Error::Malformed(format!("{}: {e}", lockfile.display())))?;

    Ok(lock
        .package
        .iter()
        .filter(|p| p.name != package)
        .map(|p| format!("{}@{}", p.name, p.version))
        .collect::<Vec<_>>()
        .join(","))
}
