//! Parsed version tags.

use std::sync::OnceLock;

use buildinfo_core::{Error, Result};
use chrono::{DateTime, FixedOffset};
use semver::{BuildMetadata, Prerelease, Version};

use crate::git::{SourceControl, TagDetails, DEFAULT_TAG};

/// A version tag together with the commit it points at.
///
/// Revision and time are fetched from the source control on first use and
/// reused afterwards. A repository without tags is described by
/// [`DEFAULT_TAG`] with an empty revision and no time.
pub struct TagDescriptor<'a> {
    original: String,
    version: Version,
    source: &'a dyn SourceControl,
    tagged: bool,
    details: OnceLock<TagDetails>,
}

impl<'a> TagDescriptor<'a> {
    pub fn parse(tag: &str, source: &'a dyn SourceControl) -> Result<Self> {
        Ok(Self {
            original: tag.to_string(),
            version: parse_version(tag)?,
            source,
            tagged: true,
            details: OnceLock::new(),
        })
    }

    /// Descriptor for a repository without tags.
    pub fn untagged(source: &'a dyn SourceControl) -> Self {
        Self {
            original: DEFAULT_TAG.to_string(),
            version: Version::new(0, 0, 0),
            source,
            tagged: false,
            details: OnceLock::new(),
        }
    }

    /// Descriptor for the result of [`TagMode::resolve`](crate::TagMode::resolve).
    pub fn from_resolved(tag: Option<&str>, source: &'a dyn SourceControl) -> Result<Self> {
        match tag {
            Some(tag) => Self::parse(tag, source),
            None => Ok(Self::untagged(source)),
        }
    }

    /// Reports whether the descriptor refers to an existing tag.
    pub fn is_tagged(&self) -> bool {
        self.tagged
    }

    /// Tag exactly as found.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Normalized version including prerelease and build metadata.
    pub fn full(&self) -> String {
        self.version.to_string()
    }

    /// `major.minor.patch` without prerelease or metadata.
    pub fn version(&self) -> String {
        core_version(&self.version)
    }

    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.version.major, self.version.minor)
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }

    pub fn minor(&self) -> u64 {
        self.version.minor
    }

    pub fn patch(&self) -> u64 {
        self.version.patch
    }

    pub fn prerelease(&self) -> &str {
        self.version.pre.as_str()
    }

    pub fn metadata(&self) -> &str {
        self.version.build.as_str()
    }

    /// Next major version: minor and patch reset.
    pub fn inc_major(&self) -> Result<String> {
        let major = bump(self.version.major, "major", &self.original)?;
        Ok(core_version(&Version::new(major, 0, 0)))
    }

    /// Next minor version: patch reset.
    pub fn inc_minor(&self) -> Result<String> {
        let minor = bump(self.version.minor, "minor", &self.original)?;
        Ok(core_version(&Version::new(self.version.major, minor, 0)))
    }

    /// Next patch version. A prerelease is released as its own patch version
    /// instead.
    pub fn inc_patch(&self) -> Result<String> {
        let mut next = self.version.clone();
        if next.pre.is_empty() {
            next.patch = bump(next.patch, "patch", &self.original)?;
        }
        next.pre = Prerelease::EMPTY;
        next.build = BuildMetadata::EMPTY;
        Ok(core_version(&next))
    }

    /// Abbreviated commit hash of the tag; empty without tags.
    pub fn revision(&self) -> Result<&str> {
        Ok(self.details()?.map_or("", |d| d.revision.as_str()))
    }

    /// Commit time of the tag; `None` without tags.
    pub fn time(&self) -> Result<Option<&DateTime<FixedOffset>>> {
        Ok(self.details()?.map(|d| &d.time))
    }

    fn details(&self) -> Result<Option<&TagDetails>> {
        if !self.tagged {
            return Ok(None);
        }
        if let Some(details) = self.details.get() {
            return Ok(Some(details));
        }
        let details = self.source.tag_details(&self.original)?;
        Ok(Some(self.details.get_or_init(|| details)))
    }
}

fn bump(part: u64, name: &str, tag: &str) -> Result<u64> {
    part.checked_add(1)
        .ok_or_else(|| Error::Malformed(format!("cannot increase {name} version of `{tag}`")))
}

fn core_version(v: &Version) -> String {
    format!("{}.{}.{}", v.major, v.minor, v.patch)
}

/// Parse a tag as a semantic version.
///
/// Accepts a `v` prefix and missing minor or patch numbers (`v1`, `1.2`).
pub fn parse_version(tag: &str) -> Result<Version> {
    let s = tag.trim();
    let s = s.strip_prefix(|c: char| c == 'v' || c == 'V').unwrap_or(s);
    let (core, suffix) = s.split_at(s.find(|c: char| c == '-' || c == '+').unwrap_or(s.len()));

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(Error::Malformed(format!("version `{tag}`")));
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    Version::parse(&format!("{}{suffix}", parts.join(".")))
        .map_err(|e| Error::Malformed(format!("version `{tag}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct CountingSource {
        calls: Cell<usize>,
    }

    impl SourceControl for CountingSource {
        fn current_tag(&self) -> Result<Option<String>> {
            Ok(Some("v1.2.3".into()))
        }

        fn latest_tag(&self) -> Result<Option<String>> {
            Ok(Some("v1.2.3".into()))
        }

        fn tag_details(&self, tag: &str) -> Result<TagDetails> {
            assert_eq!(tag, "v1.2.3-rc.1+build.5");
            self.calls.set(self.calls.get() + 1);
            Ok(TagDetails {
                revision: "fedcba1".into(),
                time: DateTime::parse_from_rfc3339("2020-06-16T19:53:00Z").unwrap(),
            })
        }
    }

    fn source() -> CountingSource {
        CountingSource {
            calls: Cell::new(0),
        }
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("v1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("1.2").unwrap(), Version::new(1, 2, 0));
        assert_eq!(parse_version("V4").unwrap(), Version::new(4, 0, 0));
        assert_eq!(
            parse_version("v2-beta.1").unwrap().to_string(),
            "2.0.0-beta.1"
        );
        assert_eq!(
            parse_version("0.0.0").unwrap(),
            Version::new(0, 0, 0)
        );

        for bad in ["", "v", "release", "1..2", "1.2.3.4", "1.x.3"] {
            assert!(
                matches!(parse_version(bad), Err(Error::Malformed(_))),
                "{bad} should not parse"
            );
        }
    }

    #[test]
    fn test_accessors() {
        let src = source();
        let tag = TagDescriptor::parse("v1.2.3-rc.1+build.5", &src).unwrap();

        assert_eq!(tag.original(), "v1.2.3-rc.1+build.5");
        assert_eq!(tag.full(), "1.2.3-rc.1+build.5");
        assert_eq!(tag.version(), "1.2.3");
        assert_eq!(tag.major_minor(), "1.2");
        assert_eq!((tag.major(), tag.minor(), tag.patch()), (1, 2, 3));
        assert_eq!(tag.prerelease(), "rc.1");
        assert_eq!(tag.metadata(), "build.5");
    }

    #[test]
    fn test_increments() {
        let src = source();
        let release = TagDescriptor::parse("v1.2.3", &src).unwrap();
        assert_eq!(release.inc_major().unwrap(), "2.0.0");
        assert_eq!(release.inc_minor().unwrap(), "1.3.0");
        assert_eq!(release.inc_patch().unwrap(), "1.2.4");

        let pre = TagDescriptor::parse("v1.2.3-rc.1", &src).unwrap();
        assert_eq!(pre.inc_patch().unwrap(), "1.2.3");
        assert_eq!(pre.inc_minor().unwrap(), "1.3.0");
    }

    #[test]
    fn test_increments_overflow() {
        let src = source();
        let max = u64::MAX;

        let tag = TagDescriptor::parse(&format!("v{max}.{max}.{max}"), &src).unwrap();
        assert!(matches!(tag.inc_major(), Err(Error::Malformed(_))));
        assert!(matches!(tag.inc_minor(), Err(Error::Malformed(_))));
        assert!(matches!(tag.inc_patch(), Err(Error::Malformed(_))));

        // a prerelease is released without bumping
        let pre = TagDescriptor::parse(&format!("v1.2.{max}-rc.1"), &src).unwrap();
        assert_eq!(pre.inc_patch().unwrap(), format!("1.2.{max}"));
    }

    #[test]
    fn test_untagged() {
        let src = source();
        let tag = TagDescriptor::from_resolved(None, &src).unwrap();

        assert!(!tag.is_tagged());
        assert_eq!(tag.original(), DEFAULT_TAG);
        assert_eq!(tag.version(), "0.0.0");
        assert_eq!(tag.revision().unwrap(), "");
        assert!(tag.time().unwrap().is_none());
        assert_eq!(tag.inc_minor().unwrap(), "0.1.0");
        assert_eq!(src.calls.get(), 0);
    }

    #[test]
    fn test_details_fetched_once() {
        let src = source();
        let tag = TagDescriptor::parse("v1.2.3-rc.1+build.5", &src).unwrap();
        assert_eq!(src.calls.get(), 0);

        assert_eq!(tag.time().unwrap().unwrap().timestamp(), 1592337180);
        assert_eq!(tag.revision().unwrap(), "fedcba1");
        assert_eq!(tag.revision().unwrap(), "fedcba1");
        assert_eq!(src.calls.get(), 1);
    }
}
