//! Minimal text templates with `{{.Name}}` placeholders.

use std::collections::BTreeMap;
use std::str::FromStr;

use buildinfo_core::{Error, Result};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Reports whether `s` contains template markers.
pub fn is_template(s: &str) -> bool {
    s.contains(OPEN) && s.contains(CLOSE)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Var(String),
}

/// A parsed template. Placeholders name a variable, with an optional leading
/// dot and surrounding whitespace: `{{.Version}}`, `{{ Version }}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(src: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = src;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let after = &rest[start + OPEN.len()..];
            let end = after
                .find(CLOSE)
                .ok_or_else(|| Error::Malformed(format!("unterminated `{OPEN}` in template")))?;

            let inner = after[..end].trim();
            let name = inner.strip_prefix('.').unwrap_or(inner);
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(Error::Malformed(format!(
                    "unsupported template action `{OPEN}{inner}{CLOSE}`"
                )));
            }
            segments.push(Segment::Var(name.to_string()));
            rest = &after[end + CLOSE.len()..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// Names of all variables referenced by the template, in order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Var(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Render the template, resolving each variable with `lookup`.
    pub fn render<F>(&self, mut lookup: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<String>,
    {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Var(name) => out.push_str(&lookup(name)?),
            }
        }
        Ok(out)
    }

    /// Render with variables from `vars`. Unknown variables are an error.
    pub fn render_map(&self, vars: &BTreeMap<String, String>) -> Result<String> {
        self.render(|name| {
            vars.get(name)
                .cloned()
                .ok_or_else(|| Error::InvalidArgument(format!("unknown template variable `{name}`")))
        })
    }
}

impl FromStr for Template {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Template::parse(s)
    }
}
