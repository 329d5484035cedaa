//! Source control queries used by the generator.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use buildinfo_core::{Error, Result};
use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::cancel::CancelToken;

/// Tag shown for a repository without tags.
pub const DEFAULT_TAG: &str = "0.0.0";

/// Diagnostics printed by `git describe` when no tag is reachable.
const NO_TAG_DIAGNOSTICS: [&str; 2] = ["No names found", "cannot describe"];

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Commit a tag points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagDetails {
    /// Abbreviated commit hash.
    pub revision: String,
    /// Commit time.
    pub time: DateTime<FixedOffset>,
}

/// Access to version control tag metadata.
pub trait SourceControl {
    /// Tag reachable from the current position; `None` without tags.
    fn current_tag(&self) -> Result<Option<String>>;

    /// Highest tag by version sort order; `None` without tags.
    fn latest_tag(&self) -> Result<Option<String>>;

    /// Revision and commit time of `tag`.
    fn tag_details(&self, tag: &str) -> Result<TagDetails>;
}

/// Which tag to describe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagMode {
    #[default]
    Current,
    Latest,
}

impl TagMode {
    pub fn resolve(self, scm: &dyn SourceControl) -> Result<Option<String>> {
        match self {
            TagMode::Current => scm.current_tag(),
            TagMode::Latest => scm.latest_tag(),
        }
    }
}

/// [`SourceControl`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct Git {
    program: OsString,
    dir: Option<PathBuf>,
    cancel: CancelToken,
}

impl Default for Git {
    fn default() -> Self {
        Self {
            program: OsString::from("git"),
            dir: None,
            cancel: CancelToken::default(),
        }
    }
}

impl Git {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git inside `dir` instead of the current directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Use a different git executable.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Abort running commands once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Full hash of `HEAD`.
    pub fn head_revision(&self) -> Result<String> {
        Ok(self.exec(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    /// Commit time of `HEAD` in RFC 3339 format.
    pub fn head_time(&self) -> Result<String> {
        Ok(self
            .exec(&["log", "-1", "--format=%cI", "HEAD"])?
            .trim()
            .to_string())
    }

    /// Checked out branch; `HEAD` when detached.
    pub fn branch(&self) -> Result<String> {
        Ok(self
            .exec(&["rev-parse", "--abbrev-ref", "HEAD"])?
            .trim()
            .to_string())
    }

    /// Reports whether the working tree has uncommitted changes.
    pub fn is_modified(&self) -> Result<bool> {
        Ok(!self
            .exec(&["status", "--porcelain", "--untracked-files=no"])?
            .trim()
            .is_empty())
    }

    /// Absolute path of the repository's `.git` directory.
    pub fn git_dir(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(
            self.exec(&["rev-parse", "--absolute-git-dir"])?.trim(),
        ))
    }

    /// Run git with `args` and return its stdout.
    ///
    /// Polls the child so a fired [`CancelToken`] kills it.
    fn exec(&self, args: &[&str]) -> Result<String> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut cmd = Command::new(&self.program);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(program = ?self.program, ?args, "running source control command");
        let mut child = cmd.spawn()?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if self.cancel.is_cancelled() {
                debug!(program = ?self.program, ?args, "cancelling source control command");
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::Cancelled);
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = collect(stdout);
        let stderr = collect(stderr);

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            return Err(Error::ExternalTool {
                program: self.program.to_string_lossy().into_owned(),
                code: status.code(),
                message: if stderr.is_empty() {
                    status.to_string()
                } else {
                    stderr
                },
            });
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

impl SourceControl for Git {
    fn current_tag(&self) -> Result<Option<String>> {
        match self.exec(&["describe", "--tags", "--abbrev=0"]) {
            Ok(out) => Ok(Some(cut_tag(&out))),
            Err(Error::ExternalTool { message, .. }) if is_missing_tags(&message) => {
                debug!("repository has no tags");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn latest_tag(&self) -> Result<Option<String>> {
        let out = self.exec(&["tag", "--sort=-v:refname"])?;
        Ok(out
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(cut_tag))
    }

    fn tag_details(&self, tag: &str) -> Result<TagDetails> {
        parse_details(&self.exec(&["log", "-1", "--pretty=%h,%ct", tag])?)
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}

/// Reports whether git's diagnostic output says no tag could be found.
pub(crate) fn is_missing_tags(stderr: &str) -> bool {
    NO_TAG_DIAGNOSTICS.iter().any(|d| stderr.contains(d))
}

/// Trim a tag and cut a `git describe` suffix (`-<commits>-g<hash>`).
pub(crate) fn cut_tag(raw: &str) -> String {
    let tag = raw.trim();
    let mut parts = tag.rsplitn(3, '-');
    if let (Some(hash), Some(count), Some(base)) = (parts.next(), parts.next(), parts.next()) {
        let is_hash = hash
            .strip_prefix('g')
            .is_some_and(|h| !h.is_empty() && h.chars().all(|c| c.is_ascii_hexdigit()));
        let is_count = !count.is_empty() && count.chars().all(|c| c.is_ascii_digit());
        if is_hash && is_count && !base.is_empty() {
            return base.to_string();
        }
    }
    tag.to_string()
}

/// Parse `<revision>,<unix seconds>` as printed by `git log --pretty=%h,%ct`.
pub(crate) fn parse_details(raw: &str) -> Result<TagDetails> {
    let raw = raw.trim();
    let (revision, secs) = raw
        .split_once(',')
        .ok_or_else(|| Error::Malformed(format!("tag details `{raw}`")))?;
    let secs: i64 = secs
        .trim()
        .parse()
        .map_err(|e| Error::Malformed(format!("commit timestamp `{secs}`: {e}")))?;
    let time = DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::Malformed(format!("commit timestamp `{secs}` out of range")))?;

    Ok(TagDetails {
        revision: revision.trim().to_string(),
        time: time.fixed_offset(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_tag() {
        assert_eq!(cut_tag("v1.2.3\n"), "v1.2.3");
        assert_eq!(cut_tag("v1.2.3-4-gdeadbee"), "v1.2.3");
        assert_eq!(cut_tag("v1.2.3-rc.1"), "v1.2.3-rc.1");
        assert_eq!(cut_tag("v1.2.3-rc.1-12-g0f3c9a1"), "v1.2.3-rc.1");
        assert_eq!(cut_tag("release-2-candidate"), "release-2-candidate");
    }

    #[test]
    fn test_is_missing_tags() {
        assert!(is_missing_tags(
            "fatal: No names found, cannot describe anything."
        ));
        assert!(is_missing_tags(
            "fatal: No tags can describe 'abc'.\nTry --always, or create some tags. cannot describe"
        ));
        assert!(!is_missing_tags(
            "fatal: not a git repository (or any of the parent directories): .git"
        ));
    }

    #[test]
    fn test_parse_details() {
        let details = parse_details("fedcba1,1592337180\n").unwrap();
        assert_eq!(details.revision, "fedcba1");
        assert_eq!(
            details.time.to_rfc3339(),
            "2020-06-16T19:53:00+00:00"
        );

        assert!(matches!(parse_details("fedcba1"), Err(Error::Malformed(_))));
        assert!(matches!(
            parse_details("fedcba1,yesterday"),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_exec_fails_fast_when_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let git = Git::new().with_cancel(token);
        assert!(matches!(git.current_tag(), Err(Error::Cancelled)));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_kills_on_timeout() {
        let git = Git::new()
            .with_program("sleep")
            .with_cancel(CancelToken::with_timeout(Duration::from_millis(50)));

        let started = std::time::Instant::now();
        let err = git.exec(&["5"]).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_reports_exit_code() {
        let err = Git::new().with_program("false").exec(&[]).unwrap_err();
        assert!(matches!(err, Error::ExternalTool { code: Some(1), .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exec_missing_program() {
        let err = Git::new()
            .with_program("buildinfo-test-no-such-binary")
            .exec(&["status"])
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
