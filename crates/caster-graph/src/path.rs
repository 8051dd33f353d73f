//! Dotted field paths with `[]` slice indirection
//!
//! `Items[].ProductID` walks into the `Items` field, steps through its
//! elements, then selects `ProductID` on each element.

use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(\[\])?$").expect("segment pattern is valid")
});

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathSegment {
    /// Field name
    pub name: String,

    /// Segment steps through slice/array elements (`Name[]`)
    pub is_slice: bool,
}

impl PathSegment {
    /// Plain field segment
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_slice: false,
        }
    }

    /// Slice-indirection segment
    pub fn slice(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_slice: true,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_slice {
            write!(f, "{}[]", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Ordered list of segments. Equality is structural.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Parse dotted notation
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::invalid_path(text, "path is empty"));
        }

        let segments = text
            .split('.')
            .map(|raw| {
                let caps = SEGMENT_RE.captures(raw).ok_or_else(|| {
                    Error::invalid_path(text, format!("invalid segment '{raw}'"))
                })?;
                Ok(PathSegment {
                    name: caps[1].to_string(),
                    is_slice: caps.get(2).is_some(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { segments })
    }

    /// Build a path from segments
    #[must_use]
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Single plain field
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::field(name)],
        }
    }

    /// Segments in order
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the empty path
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// First segment
    #[must_use]
    pub fn first(&self) -> Option<&PathSegment> {
        self.segments.first()
    }

    /// Last segment
    #[must_use]
    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Number of `[]` segments
    #[must_use]
    pub fn slice_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_slice).count()
    }

    /// Split at the first `[]` segment.
    ///
    /// Returns the container path (slice marker dropped) and the remainder
    /// applied to each element. `None` when the path has no `[]` segment.
    #[must_use]
    pub fn split_at_slice(&self) -> Option<(FieldPath, FieldPath)> {
        let pos = self.segments.iter().position(|s| s.is_slice)?;
        let mut container = self.segments[..=pos].to_vec();
        if let Some(last) = container.last_mut() {
            last.is_slice = false;
        }
        let rest = self.segments[pos + 1..].to_vec();
        Some((Self::from_segments(container), Self::from_segments(rest)))
    }

    /// Path extended by one plain segment
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::field(name));
        Self { segments }
    }

    /// True when `self` starts with every segment of `prefix`
    #[must_use]
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Go selector chain rooted at `root`, e.g. `in.Items`
    ///
    /// Slice markers are dropped; callers index explicitly.
    #[must_use]
    pub fn selector(&self, root: &str) -> String {
        let mut out = root.to_string();
        for segment in &self.segments {
            out.push('.');
            out.push_str(&segment.name);
        }
        out
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
