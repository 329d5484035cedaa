//! Recognizable placeholder values.
//!
//! Builds that forget to inject real values end up with these, which makes the
//! mistake detectable with [`BuildInfo::is_dummy`].

use chrono::DateTime;

use crate::build_info::format_time;
use crate::BuildInfo;

pub const DUMMY_VERSION: &str = "0.0.0";
pub const DUMMY_REVISION: &str = "abcdef";
pub const DUMMY_BRANCH: &str = "HEAD";
pub const DUMMY_TIME: &str = "1997-08-29T13:37:00Z";

impl BuildInfo {
    /// Build information where every tracked field holds its placeholder.
    pub fn dummy() -> Self {
        let mut bld = Self::default();
        bld.fill_dummy();
        bld
    }

    /// Fill every unset field with its placeholder value.
    pub fn fill_dummy(&mut self) {
        if self.version.is_empty() {
            self.version = DUMMY_VERSION.to_string();
        }
        if self.revision.is_empty() {
            self.revision = DUMMY_REVISION.to_string();
        }
        if self.branch.is_empty() {
            self.branch = DUMMY_BRANCH.to_string();
        }
        if self.time.is_none() {
            self.time = DateTime::parse_from_rfc3339(DUMMY_TIME).ok();
        }
    }

    /// Reports whether all tracked fields hold their placeholder values.
    ///
    /// An empty version counts as [`DUMMY_VERSION`] since that is what it
    /// renders as.
    pub fn is_dummy(&self) -> bool {
        self.version() == DUMMY_VERSION
            && self.revision == DUMMY_REVISION
            && self.branch == DUMMY_BRANCH
            && self.time.as_ref().map(format_time).as_deref() == Some(DUMMY_TIME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_dummy() {
        let bld = BuildInfo::dummy();
        assert_eq!(bld.version(), DUMMY_VERSION);
        assert_eq!(bld.revision(), DUMMY_REVISION);
        assert_eq!(bld.branch(), DUMMY_BRANCH);
        assert_eq!(
            bld.time().unwrap().with_timezone(&Utc),
            Utc.with_ymd_and_hms(1997, 8, 29, 13, 37, 0).unwrap()
        );
        assert!(bld.is_dummy());
    }

    #[test]
    fn test_fill_dummy_keeps_set_fields() {
        let mut bld = BuildInfo::new("v1.2.3").with_branch("main");
        bld.fill_dummy();

        assert_eq!(bld.version(), "v1.2.3");
        assert_eq!(bld.branch(), "main");
        assert_eq!(bld.revision(), DUMMY_REVISION);
        assert!(bld.time().is_some());
        assert!(!bld.is_dummy());
    }

    #[test]
    fn test_is_dummy_checks_every_field() {
        assert!(!BuildInfo::default().is_dummy());
        assert!(!BuildInfo::new(DUMMY_VERSION).is_dummy());

        let variants = [
            BuildInfo::dummy().with_version("v1.0.0"),
            BuildInfo::dummy().with_revision("fedcba"),
            BuildInfo::dummy().with_branch("main"),
            BuildInfo::dummy().with_time(Utc.with_ymd_and_hms(2020, 6, 16, 19, 53, 0).unwrap()),
        ];
        for bld in variants {
            assert!(!bld.is_dummy(), "{bld:?}");
        }
    }

    #[test]
    fn test_dummy_survives_json() {
        let bld = BuildInfo::dummy().with_extra("channel", "nightly");
        let decoded = BuildInfo::from_json(&bld.to_json().unwrap()).unwrap();
        // the placeholder version equals the empty-version sentinel
        assert_eq!(decoded.version(), DUMMY_VERSION);
        assert_eq!(decoded.revision(), DUMMY_REVISION);
        assert_eq!(decoded.branch(), DUMMY_BRANCH);
        assert!(decoded.is_dummy());
        assert_eq!(decoded, bld);
    }
}
