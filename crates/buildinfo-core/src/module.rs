//! Package, dependency and toolchain metadata embedded at compile time.
//!
//! A crate's build script emits `BUILDINFO_*` variables (see the
//! `buildinfo-gen` emitter) and [`module_info!`](crate::module_info) reads them
//! back with `option_env!` inside the calling crate.

use crate::{Error, Result};

/// Version control system used for the build.
pub const SETTING_VCS: &str = "vcs";
/// Full commit hash the build was made from.
pub const SETTING_VCS_REVISION: &str = "vcs.revision";
/// Commit time in RFC 3339 format.
pub const SETTING_VCS_TIME: &str = "vcs.time";
/// Checked out branch.
pub const SETTING_VCS_BRANCH: &str = "vcs.branch";
/// `true` when the working tree had uncommitted changes.
pub const SETTING_VCS_MODIFIED: &str = "vcs.modified";
/// Target triple.
pub const SETTING_TARGET: &str = "target";
/// Cargo profile.
pub const SETTING_PROFILE: &str = "profile";

/// Name under which [`ModuleInfo::module`] returns the main module.
pub const MAIN_MODULE: &str = "main";

/// Returns the version of rustc that compiled this library, or `"unknown"`.
pub fn host_toolchain_version() -> &'static str {
    option_env!("BUILDINFO_HOST_RUSTC_VERSION").unwrap_or("unknown")
}

/// A package taking part in the build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub path: String,
    pub version: String,
}

/// A single key/value build setting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Build metadata of the main package, its dependencies and the toolchain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleInfo {
    /// rustc version used for the build, e.g. `1.80.0`.
    pub toolchain_version: String,
    /// Package path of the main module.
    pub path: String,
    pub main: Module,
    pub deps: Vec<Module>,
    pub settings: Vec<Setting>,
}

/// Compile-time environment as captured by [`module_info!`](crate::module_info).
#[doc(hidden)]
#[derive(Debug, Default)]
pub struct CompileEnv {
    pub emitted: Option<&'static str>,
    pub package: &'static str,
    pub version: &'static str,
    pub repository: &'static str,
    pub rustc_version: Option<&'static str>,
    pub vcs: Option<&'static str>,
    pub vcs_revision: Option<&'static str>,
    pub vcs_time: Option<&'static str>,
    pub vcs_branch: Option<&'static str>,
    pub vcs_modified: Option<&'static str>,
    pub target: Option<&'static str>,
    pub profile: Option<&'static str>,
    pub deps: Option<&'static str>,
}

impl ModuleInfo {
    /// Assemble module metadata from the captured compile-time environment.
    ///
    /// Fails with [`Error::NotAvailable`] when the build script emitter did
    /// not run for the calling crate.
    #[doc(hidden)]
    pub fn from_compile_env(env: &CompileEnv) -> Result<Self> {
        if env.emitted.is_none() {
            return Err(Error::NotAvailable(format!(
                "no build script metadata emitted for package {}",
                env.package
            )));
        }

        let path = package_path(env.repository, env.package);
        let settings = [
            (SETTING_VCS, env.vcs),
            (SETTING_VCS_REVISION, env.vcs_revision),
            (SETTING_VCS_TIME, env.vcs_time),
            (SETTING_VCS_BRANCH, env.vcs_branch),
            (SETTING_VCS_MODIFIED, env.vcs_modified),
            (SETTING_TARGET, env.target),
            (SETTING_PROFILE, env.profile),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value.filter(|v| !v.is_empty()).map(|v| Setting {
                key: key.to_string(),
                value: v.to_string(),
            })
        })
        .collect();

        Ok(Self {
            toolchain_version: env
                .rustc_version
                .filter(|v| !v.is_empty())
                .unwrap_or_else(host_toolchain_version)
                .to_string(),
            main: Module {
                path: path.clone(),
                version: env.version.to_string(),
            },
            path,
            deps: parse_deps(env.deps.unwrap_or_default())?,
            settings,
        })
    }

    /// Value of the build setting `key`, or `""` when it is not set.
    pub fn setting(&self, key: &str) -> &str {
        self.settings
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.value.as_str())
            .unwrap_or_default()
    }

    /// Module descriptor by path. [`MAIN_MODULE`] returns the main module.
    pub fn module(&self, name: &str) -> Option<&Module> {
        if name == MAIN_MODULE {
            return Some(&self.main);
        }
        self.deps.iter().find(|m| m.path == name)
    }

    /// Short application name: the last segment of the package path.
    pub fn app_name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

/// Package path from the repository URL without scheme and `.git` suffix,
/// falling back to the package name.
fn package_path(repository: &str, package: &str) -> String {
    let repo = repository.trim();
    let repo = repo.split_once("://").map_or(repo, |(_, rest)| rest);
    let repo = repo.trim_end_matches('/');
    let repo = repo.strip_suffix(".git").unwrap_or(repo);

    if repo.is_empty() {
        package.to_string()
    } else {
        repo.to_string()
    }
}

/// Parse `name@version,name@version`.
fn parse_deps(raw: &str) -> Result<Vec<Module>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (path, version) = entry
                .split_once('@')
                .ok_or_else(|| Error::Malformed(format!("dependency entry `{entry}`")))?;
            Ok(Module {
                path: path.to_string(),
                version: version.to_string(),
            })
        })
        .collect()
}

/// Read the [`ModuleInfo`] of the calling crate.
///
/// Evaluates to `Result<ModuleInfo>`; the error is
/// [`Error::NotAvailable`](crate::Error::NotAvailable) when the crate's build
/// script did not run the emitter.
#[macro_export]
macro_rules! module_info {
    () => {
        $crate::ModuleInfo::from_compile_env(&$crate::module::CompileEnv {
            emitted: option_env!("BUILDINFO_EMITTED"),
            package: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            rustc_version: option_env!("BUILDINFO_RUSTC_VERSION"),
            vcs: option_env!("BUILDINFO_VCS"),
            vcs_revision: option_env!("BUILDINFO_VCS_REVISION"),
            vcs_time: option_env!("BUILDINFO_VCS_TIME"),
            vcs_branch: option_env!("BUILDINFO_VCS_BRANCH"),
            vcs_modified: option_env!("BUILDINFO_VCS_MODIFIED"),
            target: option_env!("BUILDINFO_TARGET"),
            profile: option_env!("BUILDINFO_PROFILE"),
            deps: option_env!("BUILDINFO_DEPS"),
        })
    };
}
