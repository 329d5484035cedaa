use buildinfo_core::{Error, Result};
use tracing::debug;

use crate::field::Field;
use crate::git::{SourceControl, TagMode, DEFAULT_TAG};
use crate::tag::TagDescriptor;
use crate::template::{is_template, Template};

/// What to print for a tag.
enum Output {
    Raw,
    Template(Template),
    Fields(Vec<Field>),
}

impl Output {
    fn parse(args: &[&str]) -> Result<Self> {
        match args {
            [] => Ok(Output::Raw),
            [single] if is_template(single) => {
                let tmpl = Template::parse(single)?;
                if let Some(name) = tmpl
                    .variables()
                    .find(|name| Field::from_template_var(name).is_none())
                {
                    return Err(Error::InvalidArgument(format!(
                        "unknown template variable `{name}`"
                    )));
                }
                Ok(Output::Template(tmpl))
            }
            _ => args
                .iter()
                .map(|arg| arg.parse::<Field>())
                .collect::<Result<Vec<_>>>()
                .map(Output::Fields),
        }
    }
}

/// Describe the tag selected by `mode` according to `args`.
///
/// With no args the tag is returned as found. A single template argument is
/// rendered; otherwise each arg selects a [`Field`] and the results are joined
/// with a space. Arguments are checked before the source control is queried.
pub fn describe(scm: &dyn SourceControl, mode: TagMode, args: &[String]) -> Result<String> {
    let args: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| !a.is_empty())
        .collect();
    let output = Output::parse(&args)?;

    let resolved = mode.resolve(scm)?;
    debug!(tag = ?resolved, ?mode, "resolved tag");

    let fields = match output {
        Output::Raw => return Ok(resolved.unwrap_or_else(|| DEFAULT_TAG.to_string())),
        Output::Template(tmpl) => {
            let tag = TagDescriptor::from_resolved(resolved.as_deref(), scm)?;
            return tmpl.render(|name| match Field::from_template_var(name) {
                Some(field) => field.resolve(&tag),
                None => Err(Error::InvalidArgument(format!(
                    "unknown template variable `{name}`"
                ))),
            });
        }
        Output::Fields(fields) => fields,
    };

    let tag = TagDescriptor::from_resolved(resolved.as_deref(), scm)?;
    let parts = fields
        .into_iter()
        .map(|field| field.resolve(&tag))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::TagDetails;
    use chrono::DateTime;
    use std::cell::Cell;

    struct FakeScm {
        current: Option<&'static str>,
        latest: &'static str,
        tag_calls: Cell<usize>,
        detail_calls: Cell<usize>,
    }

    impl FakeScm {
        fn new(current: &'static str) -> Self {
            Self::with_current(Some(current))
        }

        fn untagged() -> Self {
            Self::with_current(None)
        }

        fn with_current(current: Option<&'static str>) -> Self {
            Self {
                current,
                latest: "v9.9.9",
                tag_calls: Cell::new(0),
                detail_calls: Cell::new(0),
            }
        }
    }

    impl SourceControl for FakeScm {
        fn current_tag(&self) -> Result<Option<String>> {
            self.tag_calls.set(self.tag_calls.get() + 1);
            Ok(self.current.map(str::to_string))
        }

        fn latest_tag(&self) -> Result<Option<String>> {
            self.tag_calls.set(self.tag_calls.get() + 1);
            Ok(Some(self.latest.to_string()))
        }

        fn tag_details(&self, _tag: &str) -> Result<TagDetails> {
            self.detail_calls.set(self.detail_calls.get() + 1);
            Ok(TagDetails {
                revision: "fedcba1".into(),
                time: DateTime::parse_from_rfc3339("2020-06-16T19:53:00Z").unwrap(),
            })
        }
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fields_joined() {
        let scm = FakeScm::new("v1.2.3");
        let out = describe(&scm, TagMode::Current, &args(&["major", "minor", "patch"])).unwrap();
        assert_eq!(out, "1 2 3");
    }

    #[test]
    fn test_raw_tag() {
        let scm = FakeScm::new("v1.2.3-4-gdeadbee");
        assert_eq!(
            describe(&scm, TagMode::Current, &[]).unwrap(),
            "v1.2.3-4-gdeadbee"
        );
        assert_eq!(
            describe(&scm, TagMode::Latest, &args(&["", ""])).unwrap(),
            "v9.9.9"
        );
    }

    #[test]
    fn test_default_tag() {
        let scm = FakeScm::untagged();
        assert_eq!(describe(&scm, TagMode::Current, &[]).unwrap(), "0.0.0");
        assert_eq!(
            describe(&scm, TagMode::Current, &args(&["+minor"])).unwrap(),
            "0.1.0"
        );
        assert_eq!(
            describe(&scm, TagMode::Current, &args(&["version", "rev", "time"])).unwrap(),
            "0.0.0  "
        );
        assert_eq!(
            describe(&scm, TagMode::Current, &args(&["[{{.Revision}}]"])).unwrap(),
            "[]"
        );
        assert_eq!(scm.detail_calls.get(), 0);
    }

    #[test]
    fn test_increment_overflow_is_an_error() {
        let scm = FakeScm::new("v18446744073709551615.0.0");
        assert!(matches!(
            describe(&scm, TagMode::Current, &args(&["+major"])),
            Err(Error::Malformed(_))
        ));
        assert_eq!(
            describe(&scm, TagMode::Current, &args(&["+minor"])).unwrap(),
            "18446744073709551615.1.0"
        );
    }

    #[test]
    fn test_template() {
        let scm = FakeScm::new("v1.2.3-rc.1");
        let out = describe(
            &scm,
            TagMode::Current,
            &args(&["v{{.MajorMinor}} next={{ IncPatch }} {{.Prerelease}}"]),
        )
        .unwrap();
        assert_eq!(out, "v1.2 next=1.2.3 rc.1");
        assert_eq!(scm.detail_calls.get(), 0);
    }

    #[test]
    fn test_invalid_args_checked_first() {
        let scm = FakeScm::new("v1.2.3");

        let err = describe(&scm, TagMode::Current, &args(&["major", "bogus"])).unwrap_err();
        assert!(matches!(&err, Error::InvalidArgument(msg) if msg.contains("bogus")));
        assert_eq!(err.exit_code(), 2);

        let err = describe(&scm, TagMode::Current, &args(&["{{.Bogus}}"])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        assert_eq!(scm.tag_calls.get(), 0);
    }

    #[test]
    fn test_details_fetched_once() {
        let scm = FakeScm::new("v1.2.3");
        let out = describe(
            &scm,
            TagMode::Current,
            &args(&["rev", "time", "revision"]),
        )
        .unwrap();
        assert_eq!(out, "fedcba1 2020-06-16T19:53:00Z fedcba1");
        assert_eq!(scm.detail_calls.get(), 1);
    }

    #[test]
    fn test_unparseable_tag() {
        let scm = FakeScm::new("nightly");
        assert_eq!(describe(&scm, TagMode::Current, &[]).unwrap(), "nightly");
        assert!(matches!(
            describe(&scm, TagMode::Current, &args(&["major"])),
            Err(Error::Malformed(_))
        ));
    }
}
