//! The [`BuildInfo`] value: release metadata of a build.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, SecondsFormat, TimeZone};
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::module::{
    host_toolchain_version, ModuleInfo, SETTING_VCS_BRANCH, SETTING_VCS_REVISION,
    SETTING_VCS_TIME,
};
use crate::{Error, Result};

/// Version surfaced in text, map and JSON output when none is set.
pub const EMPTY_VERSION: &str = "0.0.0";

/// Default name of a metric carrying [`BuildInfo::labels`] as constant labels.
pub const METRIC_NAME: &str = "build_info";
/// Help text for [`METRIC_NAME`].
pub const METRIC_HELP: &str = "Metric with build information labels and a constant value of '1'.";

/// Default short command-line flag to print build information.
pub const SHORT_FLAG: char = 'v';
/// Long variant of [`SHORT_FLAG`].
pub const LONG_FLAG: &str = "version";

pub const KEY_VERSION: &str = "version";
pub const KEY_REVISION: &str = "revision";
pub const KEY_BRANCH: &str = "branch";
pub const KEY_TIME: &str = "time";
pub const KEY_TOOLCHAIN: &str = "rustversion";
/// Accepted as an alias of [`KEY_TIME`] when decoding.
pub const KEY_DATE: &str = "date";
/// Accepted as an alias of [`KEY_TIME`] when decoding.
pub const KEY_CREATED: &str = "created";

const RESERVED_KEYS: [&str; 7] = [
    KEY_VERSION,
    KEY_REVISION,
    KEY_BRANCH,
    KEY_TIME,
    KEY_DATE,
    KEY_CREATED,
    KEY_TOOLCHAIN,
];

/// Reports whether `key` names a first-class field and cannot be used as an
/// extra.
pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Release metadata of the current build: version, revision, branch and time,
/// plus free-form extras.
///
/// The rustc version is derived on first use and cached; it is not part of
/// equality since it always reflects the running binary. Versions compare as
/// rendered, so an empty version equals [`EMPTY_VERSION`].
#[derive(Debug, Clone, Default)]
pub struct BuildInfo {
    pub(crate) version: String,
    pub(crate) revision: String,
    pub(crate) branch: String,
    pub(crate) time: Option<DateTime<FixedOffset>>,
    pub(crate) extra: BTreeMap<String, String>,
    toolchain_version: OnceLock<String>,
}

/// Values injected at compile time, as read by [`build_info!`](crate::build_info).
#[doc(hidden)]
#[derive(Debug)]
pub struct Injected {
    pub version: &'static str,
    pub revision: Option<&'static str>,
    pub branch: Option<&'static str>,
    pub time: Option<&'static str>,
    pub module: Result<ModuleInfo>,
}

impl BuildInfo {
    /// Create build information for `version`. Never fails; an empty version
    /// is kept as is and rendered as [`EMPTY_VERSION`].
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    /// Create build information from plain strings, any of which may be empty.
    ///
    /// A non-empty `time` must be in RFC 3339 format.
    pub fn from_parts(version: &str, revision: &str, branch: &str, time: &str) -> Result<Self> {
        let time = if time.is_empty() {
            None
        } else {
            Some(parse_time(time)?)
        };

        Ok(Self {
            version: version.to_string(),
            revision: revision.to_string(),
            branch: branch.to_string(),
            time,
            ..Default::default()
        })
    }

    /// Create build information from embedded module metadata.
    ///
    /// Revision, branch and time come from the `vcs.*` settings; an empty
    /// `version` falls back to the main module's version.
    pub fn from_module(version: &str, module: &ModuleInfo) -> Self {
        let version = if version.is_empty() {
            module.main.version.as_str()
        } else {
            version
        };

        let mut bld = Self::new(version);
        bld.revision = module.setting(SETTING_VCS_REVISION).to_string();
        bld.branch = module.setting(SETTING_VCS_BRANCH).to_string();

        let vcs_time = module.setting(SETTING_VCS_TIME);
        if !vcs_time.is_empty() {
            match parse_time(vcs_time) {
                Ok(t) => bld.time = Some(t),
                Err(err) => warn!(%err, "ignoring invalid vcs.time setting"),
            }
        }

        if !module.toolchain_version.is_empty() {
            let _ = bld.toolchain_version.set(module.toolchain_version.clone());
        }
        bld
    }

    /// Combine compile-time injected values with module metadata.
    ///
    /// Missing module metadata is treated as absent. Injected values take
    /// precedence over module settings.
    #[doc(hidden)]
    pub fn from_injected(injected: Injected) -> Self {
        let mut bld = match injected.module {
            Ok(module) => Self::from_module(injected.version, &module),
            Err(err) => {
                debug!(%err, "building without module metadata");
                Self::new(injected.version)
            }
        };

        if let Some(revision) = injected.revision.filter(|s| !s.is_empty()) {
            bld.revision = revision.to_string();
        }
        if let Some(branch) = injected.branch.filter(|s| !s.is_empty()) {
            bld.branch = branch.to_string();
        }
        if let Some(time) = injected.time.filter(|s| !s.is_empty()) {
            match parse_time(time) {
                Ok(t) => bld.time = Some(t),
                Err(err) => warn!(%err, "ignoring invalid injected build time"),
            }
        }
        bld
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_time<Tz: TimeZone>(mut self, time: DateTime<Tz>) -> Self {
        self.time = Some(time.fixed_offset());
        self
    }

    /// Add an extra key/value pair.
    ///
    /// # Panics
    ///
    /// Panics when `key` is reserved (see [`is_reserved`]); using a reserved
    /// key is a programming error. Use [`BuildInfo::insert_extra`] for a
    /// fallible variant.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if is_reserved(&key) {
            panic!("buildinfo: `{key}` is a reserved key and cannot be used as extra");
        }
        self.extra.insert(key, value.into());
        self
    }

    /// Add an extra key/value pair, rejecting reserved keys.
    pub fn insert_extra(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if is_reserved(&key) {
            return Err(Error::InvalidArgument(format!(
                "`{key}` is a reserved key and cannot be used as extra"
            )));
        }
        self.extra.insert(key, value.into());
        Ok(())
    }

    /// Release version, or [`EMPTY_VERSION`] when none is set.
    pub fn version(&self) -> &str {
        if self.version.is_empty() {
            EMPTY_VERSION
        } else {
            &self.version
        }
    }

    /// Version exactly as stored, possibly empty.
    pub fn raw_version(&self) -> &str {
        &self.version
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn time(&self) -> Option<&DateTime<FixedOffset>> {
        self.time.as_ref()
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    /// Version of rustc used for this build.
    pub fn toolchain_version(&self) -> &str {
        self.toolchain_version
            .get_or_init(|| host_toolchain_version().to_string())
    }

    /// Revision, branch and time, each only when set.
    fn optional_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::with_capacity(3);
        if !self.revision.is_empty() {
            fields.push((KEY_REVISION, self.revision.clone()));
        }
        if !self.branch.is_empty() {
            fields.push((KEY_BRANCH, self.branch.clone()));
        }
        if let Some(t) = &self.time {
            fields.push((KEY_TIME, format_time(t)));
        }
        fields
    }

    /// Ordered key/value projection, suitable as metric labels.
    ///
    /// `version` and `rustversion` are always present, followed by
    /// `revision`, `branch` and `time` when set, then all extras.
    pub fn labels(&self) -> Vec<(String, String)> {
        let mut labels = Vec::with_capacity(5 + self.extra.len());
        labels.push((KEY_VERSION.to_string(), self.version().to_string()));
        labels.push((
            KEY_TOOLCHAIN.to_string(),
            self.toolchain_version().to_string(),
        ));
        labels.extend(
            self.optional_fields()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v)),
        );
        labels.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        labels
    }

    /// Same pairs as [`BuildInfo::labels`], as a map.
    pub fn map(&self) -> BTreeMap<String, String> {
        self.labels().into_iter().collect()
    }

    /// Canonical JSON encoding.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode from JSON. Unknown keys become extras.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::Malformed(e.to_string()))
    }

    /// Decode JSON read from `reader`.
    pub fn read(reader: impl Read) -> Result<Self> {
        serde_json::from_reader(reader).map_err(|e| Error::Malformed(e.to_string()))
    }

    /// Open `path` and decode its JSON contents.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::read(std::io::BufReader::new(file))
    }

    /// Classify decoded key/value pairs. Empty values and nulls count as
    /// absent; unknown keys with non-string values are skipped.
    fn from_fields(fields: BTreeMap<String, Value>) -> Result<Self> {
        let mut bld = Self::default();
        for (key, value) in fields {
            let value = match value {
                Value::Null => continue,
                Value::String(s) if s.is_empty() => continue,
                Value::String(s) => s,
                // rustversion is re-derived from the running binary
                _ if key == KEY_TOOLCHAIN => continue,
                other if is_reserved(&key) => {
                    return Err(Error::Malformed(format!(
                        "`{key}` must be a string, found {other}"
                    )));
                }
                other => {
                    debug!(%key, value = %other, "skipping non-string extra");
                    continue;
                }
            };
            match key.as_str() {
                KEY_VERSION => {
                    if value != EMPTY_VERSION {
                        bld.version = value;
                    }
                }
                KEY_REVISION => bld.revision = value,
                KEY_BRANCH => bld.branch = value,
                KEY_TIME | KEY_DATE | KEY_CREATED => bld.time = Some(parse_time(&value)?),
                KEY_TOOLCHAIN => {}
                _ => {
                    bld.extra.insert(key, value);
                }
            }
        }
        Ok(bld)
    }
}

impl PartialEq for BuildInfo {
    fn eq(&self, other: &Self) -> bool {
        self.version() == other.version()
            && self.revision == other.revision
            && self.branch == other.branch
            && self.time == other.time
            && self.extra == other.extra
    }
}

impl Eq for BuildInfo {}

/// Single line summary: `<version>[ <revision>][ (<time>)]`.
impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.version())?;
        if !self.revision.is_empty() {
            write!(f, " {}", self.revision)?;
        }
        if let Some(t) = &self.time {
            write!(f, " ({})", format_time(t))?;
        }
        Ok(())
    }
}

impl Serialize for BuildInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(KEY_VERSION, self.version())?;
        for (key, value) in self.optional_fields() {
            map.serialize_entry(key, &value)?;
        }
        map.serialize_entry(KEY_TOOLCHAIN, self.toolchain_version())?;
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BuildInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let fields = BTreeMap::<String, Value>::deserialize(deserializer)?;
        Self::from_fields(fields).map_err(de::Error::custom)
    }
}

/// Parse an RFC 3339 timestamp.
pub fn parse_time(s: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map_err(|e| Error::Malformed(format!("time `{s}`: {e}")))
}

/// Format a timestamp as RFC 3339, using `Z` for UTC.
pub fn format_time(t: &DateTime<FixedOffset>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Build information of the calling crate.
///
/// Reads `BUILDINFO_VERSION`, `BUILDINFO_REVISION`, `BUILDINFO_BRANCH` and
/// `BUILDINFO_TIME` injected at compile time, falling back to the package
/// version and to [`module_info!`](crate::module_info). Never fails.
///
/// ```ignore
/// let bld = buildinfo_core::build_info!();
/// println!("{bld}");
/// ```
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::build_info!(match option_env!("BUILDINFO_VERSION") {
            Some(v) => v,
            None => env!("CARGO_PKG_VERSION"),
        })
    };
    ($version:expr) => {
        $crate::BuildInfo::from_injected($crate::build_info::Injected {
            version: $version,
            revision: option_env!("BUILDINFO_REVISION"),
            branch: option_env!("BUILDINFO_BRANCH"),
            time: option_env!("BUILDINFO_TIME"),
            module: $crate::module_info!(),
        })
    };
}
