//! Generates Rust source embedding a version read from source control.
//!
//! Meant to run from a build script, writing into `$OUT_DIR`:
//!
//! ```ignore
//! // build.rs
//! let git = buildinfo_gen::Git::new();
//! let mut gen = buildinfo_gen::Generator::from_source(&git, Default::default());
//! let out = std::path::Path::new(&std::env::var("OUT_DIR")?).join("version.rs");
//! gen.write_file(&buildinfo_gen::DEFAULT_TEMPLATE.parse()?, &out)?;
//!
//! // main.rs
//! include!(concat!(env!("OUT_DIR"), "/version.rs"));
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use buildinfo_core::{Error, Result};
use tracing::{debug, info};

use crate::config::GenerateConfig;
use crate::git::{SourceControl, TagMode};
use crate::template::Template;

pub const CALLER_VAR: &str = "Caller";
pub const CALLER_DIR_VAR: &str = "CallerDir";
pub const PACKAGE_VAR: &str = "Package";
pub const FUNC_NAME_VAR: &str = "FuncName";
/// Variable holding the resolved version.
pub const VERSION_VAR: &str = "String";

pub const DEFAULT_PACKAGE: &str = "main";
pub const DEFAULT_FUNC_NAME: &str = "build_info";
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Template producing a `VERSION` constant and a function returning the
/// crate's [`BuildInfo`](buildinfo_core::BuildInfo).
pub const DEFAULT_TEMPLATE: &str = r#"// Code generated by buildinfo for {{.Package}}; DO NOT EDIT.
// Source: {{.CallerDir}}/{{.Caller}}

/// Version read from source control at build time.
pub const VERSION: &str = "{{.String}}";

pub fn {{.FuncName}}() -> buildinfo_core::BuildInfo {
    buildinfo_core::build_info!(VERSION)
}
"#;

type Reader<'a> = Box<dyn Fn() -> Result<String> + 'a>;

/// Renders templates with a version obtained from a reader.
pub struct Generator<'a> {
    reader: Reader<'a>,
    vars: BTreeMap<String, String>,
    default_version: String,
}

impl<'a> Generator<'a> {
    pub fn new(reader: impl Fn() -> Result<String> + 'a) -> Self {
        let vars = [
            (CALLER_VAR, ""),
            (CALLER_DIR_VAR, ""),
            (PACKAGE_VAR, DEFAULT_PACKAGE),
            (FUNC_NAME_VAR, DEFAULT_FUNC_NAME),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            reader: Box::new(reader),
            vars,
            default_version: DEFAULT_VERSION.to_string(),
        }
    }

    /// Generator reading the tag selected by `mode`.
    pub fn from_source(scm: &'a dyn SourceControl, mode: TagMode) -> Self {
        Self::new(move || Ok(mode.resolve(scm)?.unwrap_or_default()))
    }

    /// Record the file requesting generation, usually `file!()` of a build
    /// script.
    pub fn caller(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = path
            .parent()
            .map(|d| d.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.vars.insert(CALLER_VAR.to_string(), name);
        self.vars.insert(CALLER_DIR_VAR.to_string(), dir);
        self
    }

    pub fn with_config(mut self, config: &GenerateConfig) -> Self {
        self.vars
            .insert(PACKAGE_VAR.to_string(), config.package.clone());
        self.vars
            .insert(FUNC_NAME_VAR.to_string(), config.func_name.clone());
        self.default_version = config.default_version.clone();
        self
    }

    /// Set a template variable.
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Read the version and store it as [`VERSION_VAR`]. An empty version is
    /// replaced by the default version.
    ///
    /// The version is pasted into string literals, so quotes, backslashes,
    /// whitespace and control characters are rejected.
    pub fn read(&mut self) -> Result<()> {
        let version = (self.reader)()?;
        let version = version.trim();
        let version = if version.is_empty() {
            self.default_version.clone()
        } else {
            version.to_string()
        };
        if let Some(c) = version
            .chars()
            .find(|&c| matches!(c, '"' | '\\') || c.is_whitespace() || c.is_control())
        {
            return Err(Error::InvalidArgument(format!(
                "version `{}` contains unsupported character {c:?}",
                version.escape_debug()
            )));
        }
        debug!(%version, "read version");
        self.vars.insert(VERSION_VAR.to_string(), version);
        Ok(())
    }

    /// Render `template` into `w`, reading the version first unless a
    /// non-default one is already known.
    pub fn execute(&mut self, template: &Template, w: &mut impl Write) -> Result<()> {
        let needs_read = self
            .vars
            .get(VERSION_VAR)
            .map_or(true, |v| v.is_empty() || *v == self.default_version);
        if needs_read {
            self.read()?;
        }

        let out = template.render_map(&self.vars)?;
        w.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Render `template` into the file at `path`. The file is left untouched
    /// when its content would not change, so cargo does not rebuild needlessly.
    ///
    /// Returns whether the file was written.
    pub fn write_file(&mut self, template: &Template, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        let mut out = Vec::new();
        self.execute(template, &mut out)?;

        if std::fs::read(path).is_ok_and(|existing| existing == out) {
            debug!(path = %path.display(), "generated file unchanged");
            return Ok(false);
        }
        std::fs::write(path, &out)?;
        info!(path = %path.display(), "generated version file");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_default_template() {
        let calls = Cell::new(0);
        let mut gen = Generator::new(|| {
            calls.set(calls.get() + 1);
            Ok("v1.4.2".to_string())
        })
        .caller("/src/app/build.rs");

        let tmpl = Template::parse(DEFAULT_TEMPLATE).unwrap();
        let mut out = Vec::new();
        gen.execute(&tmpl, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("// Code generated by buildinfo for main; DO NOT EDIT."));
        assert!(out.contains("// Source: /src/app/build.rs"));
        assert!(out.contains("pub const VERSION: &str = \"v1.4.2\";"));
        assert!(out.contains("pub fn build_info() -> buildinfo_core::BuildInfo {"));

        gen.execute(&tmpl, &mut Vec::new()).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_empty_version_uses_default() {
        let config = GenerateConfig {
            default_version: "0.1.0".into(),
            func_name: "version_info".into(),
            ..GenerateConfig::default()
        };
        let calls = Cell::new(0);
        let mut gen = Generator::new(|| {
            calls.set(calls.get() + 1);
            Ok(String::new())
        })
        .with_config(&config);

        let tmpl = Template::parse("{{.FuncName}}={{.String}}").unwrap();
        let mut out = Vec::new();
        gen.execute(&tmpl, &mut out).unwrap();
        assert_eq!(out, b"version_info=0.1.0");

        // a default version is read again on the next execution
        gen.execute(&tmpl, &mut Vec::new()).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_rejects_unquotable_version() {
        let tmpl = Template::parse(DEFAULT_TEMPLATE).unwrap();
        for version in [r#"v1"; panic!(); //"#, r"v1\u{0}", "v1 2"] {
            let mut gen = Generator::new(move || Ok(version.to_string()));
            let mut out = Vec::new();
            assert!(
                matches!(gen.execute(&tmpl, &mut out), Err(Error::InvalidArgument(_))),
                "{version} should be rejected"
            );
            assert!(out.is_empty());
        }
    }

    #[test]
    fn test_reader_error() {
        let mut gen = Generator::new(|| Err(Error::Cancelled));
        let tmpl = Template::parse("{{.String}}").unwrap();
        assert!(matches!(
            gen.execute(&tmpl, &mut Vec::new()),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_custom_var() {
        let mut gen = Generator::new(|| Ok("1.0.0".into())).var("Crate", "app");
        let tmpl = Template::parse("{{.Crate}}@{{.String}}").unwrap();
        let mut out = Vec::new();
        gen.execute(&tmpl, &mut out).unwrap();
        assert_eq!(out, b"app@1.0.0");
        assert_eq!(gen.vars()[VERSION_VAR], "1.0.0");
    }
}
