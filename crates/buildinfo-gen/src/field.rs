//! Named parts of a version tag that can be printed.

use std::fmt;
use std::str::FromStr;

use buildinfo_core::build_info::format_time;
use buildinfo_core::{Error, Result};

use crate::tag::TagDescriptor;

/// A printable part of a [`TagDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Original,
    Full,
    Version,
    MajorMinor,
    Major,
    Minor,
    Patch,
    Prerelease,
    Metadata,
    IncMajor,
    IncMinor,
    IncPatch,
    Revision,
    Time,
}

impl Field {
    /// Every field with its selector name, as listed in help output.
    pub const ALL: [(Field, &'static str, &'static str); 16] = [
        (Field::Original, "original", "original tag (default)"),
        (Field::Version, "version", "version without metadata"),
        (Field::Full, "full", "version including prerelease and metadata"),
        (Field::Version, "major.minor.patch", "alias of version"),
        (Field::MajorMinor, "major.minor", "major and minor version parts"),
        (Field::Major, "major", "major version part only"),
        (Field::Minor, "minor", "minor version part only"),
        (Field::Patch, "patch", "patch part only"),
        (Field::Prerelease, "prerelease", "prerelease part only"),
        (Field::Metadata, "metadata", "build metadata only"),
        (Field::IncMajor, "+major", "version with increased major part"),
        (Field::IncMinor, "+minor", "version with increased minor part"),
        (Field::IncPatch, "+patch", "version with increased patch part"),
        (Field::Revision, "revision", "commit revision"),
        (Field::Revision, "rev", "alias of revision"),
        (Field::Time, "time", "time of commit"),
    ];

    /// Field addressed by a template variable such as `{{.MajorMinor}}`.
    pub fn from_template_var(name: &str) -> Option<Field> {
        let field = match name {
            "Original" => Field::Original,
            "FullVersion" => Field::Full,
            "Version" => Field::Version,
            "MajorMinor" => Field::MajorMinor,
            "Major" => Field::Major,
            "Minor" => Field::Minor,
            "Patch" => Field::Patch,
            "Prerelease" => Field::Prerelease,
            "Metadata" => Field::Metadata,
            "IncMajor" => Field::IncMajor,
            "IncMinor" => Field::IncMinor,
            "IncPatch" => Field::IncPatch,
            "Revision" => Field::Revision,
            "Time" => Field::Time,
            _ => return None,
        };
        Some(field)
    }

    /// Reports whether resolving the field queries the source control.
    pub fn needs_details(self) -> bool {
        matches!(self, Field::Revision | Field::Time)
    }

    pub fn resolve(self, tag: &TagDescriptor<'_>) -> Result<String> {
        Ok(match self {
            Field::Original => tag.original().to_string(),
            Field::Full => tag.full(),
            Field::Version => tag.version(),
            Field::MajorMinor => tag.major_minor(),
            Field::Major => tag.major().to_string(),
            Field::Minor => tag.minor().to_string(),
            Field::Patch => tag.patch().to_string(),
            Field::Prerelease => tag.prerelease().to_string(),
            Field::Metadata => tag.metadata().to_string(),
            Field::IncMajor => tag.inc_major()?,
            Field::IncMinor => tag.inc_minor()?,
            Field::IncPatch => tag.inc_patch()?,
            Field::Revision => tag.revision()?.to_string(),
            Field::Time => tag.time()?.map(format_time).unwrap_or_default(),
        })
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let field = match s.to_ascii_lowercase().as_str() {
            "original" => Field::Original,
            "full" => Field::Full,
            "version" | "major.minor.patch" => Field::Version,
            "major.minor" => Field::MajorMinor,
            "major" => Field::Major,
            "minor" => Field::Minor,
            "patch" => Field::Patch,
            "prerelease" => Field::Prerelease,
            "metadata" => Field::Metadata,
            "+major" => Field::IncMajor,
            "+minor" => Field::IncMinor,
            "+patch" => Field::IncPatch,
            "revision" | "rev" => Field::Revision,
            "time" => Field::Time,
            _ => return Err(Error::InvalidArgument(format!("unknown field `{s}`"))),
        };
        Ok(field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Field::ALL
            .iter()
            .find(|(field, _, _)| field == self)
            .map_or("", |(_, name, _)| *name);
        f.write_str(name)
    }
}
