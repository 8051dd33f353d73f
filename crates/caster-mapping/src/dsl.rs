//! Mapping DSL
//!
//! Declarative description of how one struct type is cast into another.
//!
//! ```yaml
//! version: "1"
//! mappings:
//!   - source: store.Order
//!     target: wire.Order
//!     121:
//!       ID: ID
//!     fields:
//!       - source: [FirstName, LastName]
//!         target: FullName
//!         transform: ConcatNames
//!     ignore: [Internal]
//!     requires:
//!       - { name: loc, type: "*time.Location" }
//! transforms:
//!   - name: ConcatNames
//!     package: example.com/app/convert
//! ```

use crate::refs::FieldRefArray;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::debug;

/// A complete mapping document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingFile {
    /// Document format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Type pair declarations in document order
    #[serde(default)]
    pub mappings: Vec<TypeMapping>,

    /// Known transform functions
    #[serde(default)]
    pub transforms: Vec<TransformDef>,
}

fn default_version() -> String {
    "1".to_string()
}

/// Declared mapping between a source and a target type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeMapping {
    /// Source type identifier (`pkg.Name`)
    pub source: String,

    /// Target type identifier (`pkg.Name`)
    pub target: String,

    /// One-to-one shorthand, `target: source`, in document order
    #[serde(rename = "121", default, skip_serializing_if = "OneToOne::is_empty")]
    pub one_to_one: OneToOne,

    /// Explicit field mappings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldMapping>,

    /// Target fields intentionally left unset
    #[serde(
        default,
        deserialize_with = "ignore_entries",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub ignore: Vec<FieldMapping>,

    /// Lowest-priority mappings, normally written back by tooling
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto: Vec<FieldMapping>,

    /// Extra parameters appended to the generated caster's signature
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<RequiredArg>,

    /// Synthesize the target type when it does not exist
    #[serde(default)]
    pub generate_target: bool,
}

impl TypeMapping {
    /// Create an empty declaration for a type pair
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            one_to_one: OneToOne::default(),
            fields: Vec::new(),
            ignore: Vec::new(),
            auto: Vec::new(),
            requires: Vec::new(),
            generate_target: false,
        }
    }

    /// `source -> target` label used in diagnostics and logs
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} -> {}", self.source, self.target)
    }
}

/// Ordered `target: source` pairs of the `121` shorthand
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OneToOne(pub Vec<(String, String)>);

impl OneToOne {
    /// True when no pairs are declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pairs as `(target, source)` in document order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(t, s)| (t.as_str(), s.as_str()))
    }

    /// Append a pair
    pub fn push(&mut self, target: impl Into<String>, source: impl Into<String>) {
        self.0.push((target.into(), source.into()));
    }
}

impl Serialize for OneToOne {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (target, source) in &self.0 {
            map.serialize_entry(target, source)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OneToOne {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PairsVisitor;

        impl<'de> Visitor<'de> for PairsVisitor {
            type Value = OneToOne;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of target field to source field")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(OneToOne::default())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut pairs = Vec::new();
                while let Some(pair) = map.next_entry::<String, String>()? {
                    pairs.push(pair);
                }
                Ok(OneToOne(pairs))
            }
        }

        deserializer.deserialize_any(PairsVisitor)
    }
}

/// Declared mapping of one or more source fields onto target fields
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldMapping {
    /// Target field references
    #[serde(default)]
    pub target: FieldRefArray,

    /// Source field references
    #[serde(default, skip_serializing_if = "FieldRefArray::is_empty")]
    pub source: FieldRefArray,

    /// Literal value used when there is no source
    #[serde(
        default,
        deserialize_with = "scalar_literal",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<String>,

    /// Transform function name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,

    /// Leave the target unset
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore: bool,

    /// Extra values passed to the transform or nested caster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<ExtraArg>,
}

impl FieldMapping {
    /// `target <- source` with no transform
    pub fn simple(target: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            target: FieldRefArray::single(target),
            source: FieldRefArray::single(source),
            ..Self::default()
        }
    }

    /// Ignore entry for a target path
    pub fn ignored(target: impl Into<String>) -> Self {
        Self {
            target: FieldRefArray::single(target),
            ignore: true,
            ..Self::default()
        }
    }
}

/// Auxiliary value threaded into a transform or nested caster call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtraArg {
    /// Argument name; matches a `requires` entry when no path is given
    pub name: String,

    /// Source field path providing the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Target field path, produced by another mapping, providing the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Where an extra value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraDef<'a> {
    Source(&'a str),
    Target(&'a str),
    Requires,
}

impl ExtraArg {
    /// Extra resolved by name against `requires`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            target: None,
        }
    }

    /// Declared origin; a source path wins over a target path
    #[must_use]
    pub fn def(&self) -> ExtraDef<'_> {
        match (&self.source, &self.target) {
            (Some(source), _) => ExtraDef::Source(source),
            (None, Some(target)) => ExtraDef::Target(target),
            (None, None) => ExtraDef::Requires,
        }
    }
}

/// Extra caster parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequiredArg {
    /// Parameter name
    pub name: String,

    /// Go type text
    #[serde(rename = "type")]
    pub ty: String,
}

/// Declared transform function
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransformDef {
    /// Name referenced by field mappings
    pub name: String,

    /// Informational source type text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,

    /// Result type text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,

    /// Import path of the package providing the function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Function name; defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub func: Option<String>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TransformDef {
    /// Declaration with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: None,
            target_type: None,
            package: None,
            func: None,
            description: None,
        }
    }

    /// Function identifier to call
    #[must_use]
    pub fn func_name(&self) -> &str {
        self.func.as_deref().unwrap_or(&self.name)
    }
}

/// Accept any YAML scalar and keep its literal text
fn scalar_literal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    struct ScalarVisitor;

    impl<'de> Visitor<'de> for ScalarVisitor {
        type Value = Option<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a scalar literal")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            let mut text = v.to_string();
            if !text.contains(['.', 'e', 'E']) {
                text.push_str(".0");
            }
            Ok(Some(text))
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(ScalarVisitor)
}

/// `ignore:` entries may be bare target paths or full field mappings
fn ignore_entries<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<FieldMapping>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Path(String),
        Mapping(FieldMapping),
    }

    let entries = Option::<Vec<Entry>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            Entry::Path(path) => FieldMapping::ignored(path),
            Entry::Mapping(mut mapping) => {
                mapping.ignore = true;
                mapping
            }
        })
        .collect())
}

/// DSL Parser
pub struct MappingDsl;

/// Parse error type
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let (Some(line), Some(col)) = (self.line, self.column) {
            write!(f, " at line {line}, column {col}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

impl MappingDsl {
    /// Parse a mapping document from YAML
    ///
    /// # Errors
    ///
    /// Returns an error when YAML parsing fails.
    pub fn parse(yaml: &str) -> Result<MappingFile, ParseError> {
        let file: MappingFile = serde_yaml::from_str(yaml).map_err(|e| ParseError {
            message: format!("Failed to parse mapping: {e}"),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
        })?;
        debug!(
            version = %file.version,
            mappings = file.mappings.len(),
            transforms = file.transforms.len(),
            "Parsed mapping document"
        );
        Ok(file)
    }

    /// Parse a mapping document from a file
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn parse_file(path: &std::path::Path) -> Result<MappingFile, ParseError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParseError {
            message: format!("Failed to read file {}: {e}", path.display()),
            line: None,
            column: None,
        })?;
        Self::parse(&content)
    }

    /// Serialize a mapping document to YAML
    ///
    /// # Errors
    ///
    /// Returns an error when serialization fails.
    pub fn to_yaml(file: &MappingFile) -> Result<String, ParseError> {
        serde_yaml::to_string(file).map_err(|e| ParseError {
            message: format!("Failed to serialize: {e}"),
            line: None,
            column: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::{FieldRef, Hint};

    #[test]
    fn test_parse_full_document() {
        let dsl = r#"
version: "2"
mappings:
  - source: store.Order
    target: wire.Order
    121:
      ID: ID
      Status: State
    fields:
      - source: [FirstName, LastName]
        target: FullName
        transform: ConcatNames
      - target: Currency
        default: '"EUR"'
      - source: { Address: dive }
        target: Shipping
        extra:
          - name: loc
          - name: region
            source: Region
    ignore:
      - Internal
      - target: Audit
    requires:
      - name: loc
        type: "*time.Location"
transforms:
  - name: ConcatNames
    package: example.com/app/convert
    func: Join
"#;

        let file = MappingDsl::parse(dsl).unwrap();
        assert_eq!(file.version, "2");
        assert_eq!(file.mappings.len(), 1);

        let mapping = &file.mappings[0];
        let pairs: Vec<_> = mapping.one_to_one.iter().collect();
        assert_eq!(pairs, vec![("ID", "ID"), ("Status", "State")]);

        assert_eq!(mapping.fields.len(), 3);
        assert_eq!(mapping.fields[0].source.len(), 2);
        assert_eq!(mapping.fields[0].transform.as_deref(), Some("ConcatNames"));
        assert_eq!(mapping.fields[1].default.as_deref(), Some("\"EUR\""));
        assert_eq!(
            mapping.fields[2].source.refs(),
            &[FieldRef::hinted("Address", Hint::Dive)]
        );
        assert_eq!(mapping.fields[2].extra[0].def(), ExtraDef::Requires);
        assert_eq!(mapping.fields[2].extra[1].def(), ExtraDef::Source("Region"));

        assert_eq!(mapping.ignore.len(), 2);
        assert!(mapping.ignore.iter().all(|m| m.ignore));
        assert_eq!(mapping.ignore[1].target, FieldRefArray::single("Audit"));

        assert_eq!(mapping.requires[0].ty, "*time.Location");
        assert_eq!(file.transforms[0].func_name(), "Join");
    }

    #[test]
    fn test_default_scalars_keep_literal_text() {
        let dsl = r"
mappings:
  - source: a.A
    target: b.B
    fields:
      - { target: Count, default: 0 }
      - { target: Ratio, default: 1.5 }
      - { target: Enabled, default: true }
";
        let file = MappingDsl::parse(dsl).unwrap();
        let defaults: Vec<_> = file.mappings[0]
            .fields
            .iter()
            .map(|f| f.default.clone().unwrap())
            .collect();
        assert_eq!(defaults, vec!["0", "1.5", "true"]);
        assert_eq!(file.version, "1");
    }

    #[test]
    fn test_parse_error_has_location() {
        let err = MappingDsl::parse("mappings:\n  - source: [unclosed\n").unwrap_err();
        assert!(err.message.contains("Failed to parse mapping"));
        assert!(err.line.is_some());
    }

    #[test]
    fn test_round_trip_keeps_shorthand_order() {
        let mut mapping = TypeMapping::new("a.A", "b.B");
        mapping.one_to_one.push("Zeta", "Z");
        mapping.one_to_one.push("Alpha", "A");
        let file = MappingFile {
            version: "1".to_string(),
            mappings: vec![mapping],
            transforms: Vec::new(),
        };

        let yaml = MappingDsl::to_yaml(&file).unwrap();
        assert!(yaml.find("Zeta").unwrap() < yaml.find("Alpha").unwrap());
        assert_eq!(MappingDsl::parse(&yaml).unwrap(), file);
    }
}
