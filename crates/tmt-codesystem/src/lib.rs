//! TMT CodeSystem document model
//!
//! The output of a conversion run is a single FHIR-shaped `CodeSystem`:
//!
//! ```text
//! {
//!   "resourceType": "CodeSystem", "url": ..., "version": ..., "name": ...,
//!   "title": ..., "status": ..., "date": ...,
//!   "filter": [...], "property": [...],
//!   "concept": [
//!     { "code": "GP001", "display": "...",
//!       "property": [ { "code": "class", "valueCode": "GP" },
//!                     { "code": "abstract", "valueBoolean": true },
//!                     { "code": "parent", "valueCode": "VTM001" } ] }
//!   ]
//! }
//! ```
//!
//! This crate owns the in-memory shape of that document plus the pure
//! post-processing stages run over the assembled concepts:
//! - [`dedupe`]: first-seen-wins collapse of duplicate codes
//! - [`validate`]: parent/child referential integrity (optionally pruning)
//! - [`finalize`]: header rewrite and seed-concept removal

use serde::ser::SerializeMap;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub mod dedupe;
pub mod finalize;
pub mod validate;

pub use dedupe::*;
pub use finalize::*;
pub use validate::*;

/// Property code carrying the entity kind of a concept.
pub const PROPERTY_CLASS: &str = "class";
pub const PROPERTY_STATUS: &str = "status";
pub const PROPERTY_ABSTRACT: &str = "abstract";
pub const PROPERTY_PARENT: &str = "parent";
pub const PROPERTY_CHILD: &str = "child";

/// Status written on every synthesized concept.
pub const STATUS_ACTIVE: &str = "active";

/// Code of the placeholder concept shipped in the template.
pub const TEMPLATE_SENTINEL_CODE: &str = "TEMPLATE";

#[derive(Debug, thiserror::Error)]
pub enum CodeSystemError {
    #[error("failed to read template {path}: {source}")]
    ReadTemplate {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("template {path} is not a valid CodeSystem document: {source}")]
    ParseTemplate {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown entity kind `{0}` (expected SUBS|VTM|GP|GPU|GPP|TP|TPU|TPP)")]
    UnknownEntityKind(String),
}

// ============================================================================
// Entity kinds
// ============================================================================

/// The eight abstraction levels of the TMT substance → pack hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityKind {
    Subs,
    Vtm,
    Gp,
    Gpu,
    Gpp,
    Tp,
    Tpu,
    Tpp,
}

impl EntityKind {
    /// Every kind, in the order concepts are emitted into the document.
    pub const PROCESSING_ORDER: [EntityKind; 8] = [
        EntityKind::Subs,
        EntityKind::Vtm,
        EntityKind::Gp,
        EntityKind::Gpu,
        EntityKind::Gpp,
        EntityKind::Tpu,
        EntityKind::Tp,
        EntityKind::Tpp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Subs => "SUBS",
            EntityKind::Vtm => "VTM",
            EntityKind::Gp => "GP",
            EntityKind::Gpu => "GPU",
            EntityKind::Gpp => "GPP",
            EntityKind::Tp => "TP",
            EntityKind::Tpu => "TPU",
            EntityKind::Tpp => "TPP",
        }
    }

    /// Generic product, generic product unit and trade product unit are not
    /// directly dispensable and are flagged abstract.
    pub fn is_abstract(self) -> bool {
        matches!(self, EntityKind::Gp | EntityKind::Gpu | EntityKind::Tpu)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CodeSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_uppercase();
        EntityKind::PROCESSING_ORDER
            .into_iter()
            .find(|k| k.as_str() == norm)
            .ok_or_else(|| CodeSystemError::UnknownEntityKind(s.to_string()))
    }
}

// ============================================================================
// Concepts
// ============================================================================

/// Value slot of a concept property. Serialized as the single FHIR
/// `value[x]` key next to `code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    #[serde(rename = "valueCode")]
    Code(String),
    #[serde(rename = "valueBoolean")]
    Boolean(bool),
    #[serde(rename = "valueString")]
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptProperty {
    pub code: String,
    #[serde(flatten)]
    pub value: PropertyValue,
}

impl ConceptProperty {
    pub fn code(code: &str, value: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            value: PropertyValue::Code(value.into()),
        }
    }

    pub fn boolean(code: &str, value: bool) -> Self {
        Self {
            code: code.to_string(),
            value: PropertyValue::Boolean(value),
        }
    }

    /// The referenced concept code, if this is a `parent`/`child` link.
    pub fn reference(&self) -> Option<(ReferenceKind, &str)> {
        let kind = match self.code.as_str() {
            PROPERTY_PARENT => ReferenceKind::Parent,
            PROPERTY_CHILD => ReferenceKind::Child,
            _ => return None,
        };
        match &self.value {
            PropertyValue::Code(target) => Some((kind, target.as_str())),
            _ => None,
        }
    }
}

/// Direction of a hierarchy link as seen from the concept carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    Parent,
    Child,
}

impl ReferenceKind {
    pub fn property_code(self) -> &'static str {
        match self {
            ReferenceKind::Parent => PROPERTY_PARENT,
            ReferenceKind::Child => PROPERTY_CHILD,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property_code())
    }
}

/// One terminology entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub code: String,
    #[serde(default)]
    pub display: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub property: Vec<ConceptProperty>,
}

impl Concept {
    /// Base concept of `kind`: `class`, `status` and `abstract` already set.
    pub fn new(code: impl Into<String>, display: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            code: code.into(),
            display: display.into(),
            property: vec![
                ConceptProperty::code(PROPERTY_CLASS, kind.as_str()),
                ConceptProperty::code(PROPERTY_STATUS, STATUS_ACTIVE),
                ConceptProperty::boolean(PROPERTY_ABSTRACT, kind.is_abstract()),
            ],
        }
    }

    /// Adds a parent/child link. Returns `false` (and adds nothing) when the
    /// target is the concept itself.
    pub fn add_reference(&mut self, kind: ReferenceKind, target: &str) -> bool {
        if target == self.code {
            return false;
        }
        self.property
            .push(ConceptProperty::code(kind.property_code(), target));
        true
    }

    pub fn entity_kind(&self) -> Option<EntityKind> {
        self.property.iter().find_map(|p| match (&p.value, p.code.as_str()) {
            (PropertyValue::Code(v), PROPERTY_CLASS) => v.parse().ok(),
            _ => None,
        })
    }

    pub fn is_abstract(&self) -> Option<bool> {
        self.property.iter().find_map(|p| match (&p.value, p.code.as_str()) {
            (PropertyValue::Boolean(v), PROPERTY_ABSTRACT) => Some(*v),
            _ => None,
        })
    }

    pub fn references(&self, kind: ReferenceKind) -> impl Iterator<Item = &str> + '_ {
        self.property
            .iter()
            .filter_map(move |p| match p.reference() {
                Some((k, target)) if k == kind => Some(target),
                _ => None,
            })
    }

    pub fn parents(&self) -> Vec<&str> {
        self.references(ReferenceKind::Parent).collect()
    }

    pub fn children(&self) -> Vec<&str> {
        self.references(ReferenceKind::Child).collect()
    }
}

// ============================================================================
// Document
// ============================================================================

/// The CodeSystem document, read from the template and written as output.
///
/// Header keys the converter does not touch (`id`, `publisher`, `content`,
/// ...) are kept in `extra` and written back unchanged. Keys are written in
/// the order the template had them; keys the template lacked come last.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeSystemDocument {
    pub resource_type: String,
    pub url: String,
    pub version: String,
    pub name: String,
    pub title: String,
    pub status: String,
    pub date: String,
    pub extra: Map<String, Value>,
    pub filter: Vec<Value>,
    pub property: Vec<Value>,
    pub concept: Vec<Concept>,
    key_order: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentFields {
    resource_type: String,
    url: String,
    version: String,
    name: String,
    title: String,
    status: String,
    date: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
    #[serde(default)]
    filter: Vec<Value>,
    #[serde(default)]
    property: Vec<Value>,
    #[serde(default)]
    concept: Vec<Concept>,
}

impl<'de> Deserialize<'de> for CodeSystemDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        let key_order: Vec<String> = object.keys().cloned().collect();
        let fields: DocumentFields =
            serde_json::from_value(Value::Object(object)).map_err(de::Error::custom)?;
        Ok(Self {
            resource_type: fields.resource_type,
            url: fields.url,
            version: fields.version,
            name: fields.name,
            title: fields.title,
            status: fields.status,
            date: fields.date,
            extra: fields.extra,
            filter: fields.filter,
            property: fields.property,
            concept: fields.concept,
            key_order,
        })
    }
}

impl Serialize for CodeSystemDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut fields = Map::new();
        fields.insert("resourceType".into(), Value::from(self.resource_type.as_str()));
        fields.insert("url".into(), Value::from(self.url.as_str()));
        fields.insert("version".into(), Value::from(self.version.as_str()));
        fields.insert("name".into(), Value::from(self.name.as_str()));
        fields.insert("title".into(), Value::from(self.title.as_str()));
        fields.insert("status".into(), Value::from(self.status.as_str()));
        fields.insert("date".into(), Value::from(self.date.as_str()));
        for (key, value) in &self.extra {
            fields.insert(key.clone(), value.clone());
        }
        fields.insert("filter".into(), Value::Array(self.filter.clone()));
        fields.insert("property".into(), Value::Array(self.property.clone()));
        let concept = serde_json::to_value(&self.concept).map_err(ser::Error::custom)?;
        fields.insert("concept".into(), concept);

        let mut map = serializer.serialize_map(Some(fields.len()))?;
        let mut written: HashSet<&str> = HashSet::with_capacity(fields.len());
        for key in &self.key_order {
            if let Some(value) = fields.get(key) {
                map.serialize_entry(key, value)?;
                written.insert(key.as_str());
            }
        }
        for (key, value) in &fields {
            if !written.contains(key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

impl CodeSystemDocument {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Loads a template/output document from disk.
    pub fn load(path: &Path) -> Result<Self, CodeSystemError> {
        let text = std::fs::read_to_string(path).map_err(|source| CodeSystemError::ReadTemplate {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|source| CodeSystemError::ParseTemplate {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
