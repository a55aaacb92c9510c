//! Schema wire format.
//!
//! ```text
//! {"title": "users",
//!  "properties": {"id": {"type": "integer", "format": "int64"}, ...},
//!  "primary_key": ["id"]}
//! ```
//!
//! Properties keep schema field order in both directions. Flags and
//! optional members are omitted when false or empty so equal schemas give
//! equal bytes.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::field_type::{FieldType, TypeKind};
use crate::merge::make_path;
use crate::schema::{Schema, SchemaField};

#[derive(Debug, Serialize, Deserialize)]
struct WireSchema {
    #[serde(default)]
    title: String,

    #[serde(default)]
    properties: Properties,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    primary_key: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WireField {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    nullable: bool,

    #[serde(rename = "autoGenerate", default, skip_serializing_if = "is_false")]
    auto_generate: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Box<WireField>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<Properties>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Ordered `name -> field` map.
#[derive(Debug, Default)]
struct Properties(Vec<(String, WireField)>);

impl Serialize for Properties {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, field) in &self.0 {
            map.serialize_entry(name, field)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PropertiesVisitor)
    }
}

struct PropertiesVisitor;

impl<'de> Visitor<'de> for PropertiesVisitor {
    type Value = Properties;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of field names to field schemas")
    }

    fn visit_map<A: MapAccess<'de>>(
        self,
        mut access: A,
    ) -> Result<Properties, A::Error> {
        let mut out: Vec<(String, WireField)> =
            Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, field)) =
            access.next_entry::<String, WireField>()?
        {
            if out.iter().any(|(n, _)| *n == name) {
                return Err(de::Error::custom(format!(
                    "duplicate property '{name}'"
                )));
            }
            out.push((name, field));
        }
        Ok(Properties(out))
    }
}

fn to_wire(t: &FieldType, auto_generate: bool) -> WireField {
    let (kind, format) = match &t.kind {
        TypeKind::Null => ("null", None),
        TypeKind::Bool => ("boolean", None),
        TypeKind::Int64 => ("integer", Some("int64")),
        TypeKind::Float64 => ("number", None),
        TypeKind::String => ("string", None),
        TypeKind::Uuid => ("string", Some("uuid")),
        TypeKind::DateTime => ("string", Some("date-time")),
        TypeKind::ByteArray => ("string", Some("byte")),
        TypeKind::Array(_) => ("array", None),
        TypeKind::Object(_) => ("object", None),
    };

    let items = match &t.kind {
        TypeKind::Array(element) if !element.is_unknown() => {
            Some(Box::new(to_wire(element, false)))
        }
        _ => None,
    };

    let properties = match &t.kind {
        TypeKind::Object(fields) if !fields.is_empty() => Some(Properties(
            fields
                .iter()
                .map(|(name, ft)| (name.clone(), to_wire(ft, false)))
                .collect(),
        )),
        _ => None,
    };

    WireField {
        kind: Some(kind.to_string()),
        format: format.map(str::to_string),
        nullable: t.nullable,
        auto_generate,
        items,
        properties,
    }
}

fn from_wire(w: WireField, path: &str) -> Result<FieldType, String> {
    let Some(kind) = w.kind.as_deref() else {
        return Err(format!("field '{path}' has no type"));
    };

    let kind = match (kind, w.format.as_deref()) {
        ("null", _) => TypeKind::Null,
        ("boolean", _) => TypeKind::Bool,
        ("integer", _) | ("int64", _) => TypeKind::Int64,
        ("number", _) => TypeKind::Float64,
        ("string", Some("uuid")) | ("uuid", _) => TypeKind::Uuid,
        ("string", Some("date-time")) | ("date-time", _) => {
            TypeKind::DateTime
        }
        ("string", Some("byte")) | ("byte", _) => TypeKind::ByteArray,
        ("string", _) => TypeKind::String,
        ("array", _) => {
            let element = match w.items {
                Some(items) => from_wire(*items, &format!("{path}[]"))?,
                None => FieldType::unknown(),
            };
            TypeKind::Array(Box::new(element))
        }
        ("object", _) => {
            let props = w.properties.unwrap_or_default();
            let mut fields = Vec::with_capacity(props.0.len());
            for (name, field) in props.0 {
                let ft = from_wire(field, &make_path(path, &name))?;
                fields.push((name, ft));
            }
            TypeKind::Object(fields)
        }
        (other, _) => {
            return Err(format!("field '{path}' has unknown type '{other}'"));
        }
    };

    Ok(FieldType {
        kind,
        nullable: w.nullable,
    })
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let wire = WireSchema {
            title: self.collection_name.clone(),
            properties: Properties(
                self.fields
                    .iter()
                    .map(|f| {
                        (
                            f.name.clone(),
                            to_wire(&f.field_type, f.is_auto_generated),
                        )
                    })
                    .collect(),
            ),
            primary_key: self.primary_key.clone(),
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let wire = WireSchema::deserialize(deserializer)?;

        let mut fields = Vec::with_capacity(wire.properties.0.len());
        for (name, field) in wire.properties.0 {
            let auto_generate = field.auto_generate;
            let field_type =
                from_wire(field, &name).map_err(de::Error::custom)?;
            fields.push(SchemaField {
                is_primary_key: wire.primary_key.contains(&name),
                is_auto_generated: auto_generate,
                name,
                field_type,
            });
        }

        Ok(Schema {
            collection_name: wire.title,
            fields,
            primary_key: wire.primary_key,
        })
    }
}
