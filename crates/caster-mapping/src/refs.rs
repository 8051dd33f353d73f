//! Field references as written in mapping documents
//!
//! A `source` or `target` entry is one of:
//!
//! ```yaml
//! source: Name                       # single path
//! source: [FirstName, LastName]      # several paths
//! source: { Address: dive }          # path with hint
//! source: [ID, { Customer: final }]  # mixed
//! ```

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Introspection hint attached to a field reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Hint {
    /// No preference; structural rules decide
    #[default]
    None,
    /// Force a nested caster even between identical struct types
    Dive,
    /// Never introspect; treat the value as opaque
    Final,
}

impl Hint {
    fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Some(Self::None),
            "dive" => Some(Self::Dive),
            "final" => Some(Self::Final),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Dive => "dive",
            Self::Final => "final",
        }
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Hint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Hint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text)
            .ok_or_else(|| de::Error::custom(format!("unknown hint '{text}', expected dive or final")))
    }
}

/// A declared field path plus its hint.
///
/// The path is kept as written; the planner parses and resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub path: String,
    pub hint: Hint,
}

impl FieldRef {
    /// Reference without a hint
    pub fn plain(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hint: Hint::None,
        }
    }

    /// Reference with a hint
    pub fn hinted(path: impl Into<String>, hint: Hint) -> Self {
        Self {
            path: path.into(),
            hint,
        }
    }
}

/// Ordered list of field references
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldRefArray(pub Vec<FieldRef>);

impl FieldRefArray {
    /// Single plain path
    pub fn single(path: impl Into<String>) -> Self {
        Self(vec![FieldRef::plain(path)])
    }

    /// References in declaration order
    #[must_use]
    pub fn refs(&self) -> &[FieldRef] {
        &self.0
    }

    /// Number of references
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is referenced
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Declared path texts in order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|r| r.path.as_str())
    }
}

impl From<Vec<FieldRef>> for FieldRefArray {
    fn from(refs: Vec<FieldRef>) -> Self {
        Self(refs)
    }
}

impl fmt::Display for FieldRefArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] if single.hint == Hint::None => f.write_str(&single.path),
            refs => {
                f.write_str("[")?;
                for (i, r) in refs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if r.hint == Hint::None {
                        f.write_str(&r.path)?;
                    } else {
                        write!(f, "{{{}: {}}}", r.path, r.hint)?;
                    }
                }
                f.write_str("]")
            }
        }
    }
}

struct HintedRef<'a>(&'a FieldRef);

impl Serialize for HintedRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.hint == Hint::None {
            return serializer.serialize_str(&self.0.path);
        }
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.0.path, &self.0.hint)?;
        map.end()
    }
}

impl Serialize for FieldRefArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let [single] = self.0.as_slice() {
            if single.hint == Hint::None {
                return serializer.serialize_str(&single.path);
            }
        }
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for r in &self.0 {
            seq.serialize_element(&HintedRef(r))?;
        }
        seq.end()
    }
}

/// One element of a reference list: a bare path or a `{path: hint}` map
struct RefItem(Vec<FieldRef>);

impl<'de> Deserialize<'de> for RefItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RefVisitor { allow_seq: false }).map(|a| Self(a.0))
    }
}

struct RefVisitor {
    allow_seq: bool,
}

impl<'de> Visitor<'de> for RefVisitor {
    type Value = FieldRefArray;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.allow_seq {
            f.write_str("a path, a list of paths, or a {path: hint} map")
        } else {
            f.write_str("a path or a {path: hint} map")
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(FieldRefArray::single(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(FieldRefArray::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut refs = Vec::new();
        while let Some((path, hint)) = map.next_entry::<String, Hint>()? {
            refs.push(FieldRef::hinted(path, hint));
        }
        Ok(FieldRefArray(refs))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        if !self.allow_seq {
            return Err(de::Error::custom("nested lists are not allowed in field references"));
        }
        let mut refs = Vec::new();
        while let Some(item) = seq.next_element::<RefItem>()? {
            refs.extend(item.0);
        }
        Ok(FieldRefArray(refs))
    }
}

impl<'de> Deserialize<'de> for FieldRefArray {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RefVisitor { allow_seq: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> FieldRefArray {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_single_path() {
        let refs = parse("Name");
        assert_eq!(refs, FieldRefArray::single("Name"));
        assert_eq!(refs.to_string(), "Name");
    }

    #[test]
    fn test_list_and_hints_mixed() {
        let refs = parse("[ID, {Customer: final}, {Address: dive}]");
        assert_eq!(
            refs.refs(),
            &[
                FieldRef::plain("ID"),
                FieldRef::hinted("Customer", Hint::Final),
                FieldRef::hinted("Address", Hint::Dive),
            ]
        );
        assert_eq!(refs.to_string(), "[ID, {Customer: final}, {Address: dive}]");
    }

    #[test]
    fn test_hint_map_keeps_order() {
        let refs = parse("{Zeta: dive, Alpha: final}");
        let paths: Vec<_> = refs.paths().collect();
        assert_eq!(paths, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_unknown_hint_rejected() {
        assert!(serde_yaml::from_str::<FieldRefArray>("{A: deep}").is_err());
    }

    #[test]
    fn test_render_rule() {
        let single = serde_yaml::to_string(&FieldRefArray::single("Name")).unwrap();
        assert_eq!(single.trim(), "Name");

        let hinted = FieldRefArray(vec![FieldRef::hinted("Address", Hint::Dive)]);
        let text = serde_yaml::to_string(&hinted).unwrap();
        assert_eq!(text.trim(), "- Address: dive");
    }
}
