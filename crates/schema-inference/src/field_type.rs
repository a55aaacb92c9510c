//! Structural field types.

use std::fmt;

/// The inferred type of one field, including whether it may be null.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldType {
    pub kind: TypeKind,
    pub nullable: bool,
}

/// Type variants the engine can infer.
///
/// `Null` with `nullable == false` stands for "nothing observed yet", which
/// is what an empty array reports for its elements. A JSON `null` is `Null`
/// with `nullable == true`.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Null,
    Bool,
    Int64,
    Float64,
    String,
    Uuid,
    DateTime,
    ByteArray,
    Array(Box<FieldType>),
    /// Fields in first-seen order. Names are unique.
    Object(Vec<(String, FieldType)>),
}

impl FieldType {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    /// Type of a JSON `null`.
    pub fn null() -> Self {
        Self {
            kind: TypeKind::Null,
            nullable: true,
        }
    }

    /// Placeholder for a slot with no observations.
    pub fn unknown() -> Self {
        Self::new(TypeKind::Null)
    }

    pub fn array(element: FieldType) -> Self {
        Self::new(TypeKind::Array(Box::new(element)))
    }

    pub fn object(fields: Vec<(String, FieldType)>) -> Self {
        Self::new(TypeKind::Object(fields))
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark as nullable, keeping the kind.
    pub fn into_nullable(self) -> Self {
        self.with_nullable(true)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, TypeKind::Null) && !self.nullable
    }

    /// Look up a direct child of an object type.
    pub fn field(&self, name: &str) -> Option<&FieldType> {
        match &self.kind {
            TypeKind::Object(fields) => {
                fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
            }
            _ => None,
        }
    }

    /// Compact human readable form, e.g. `array<int64?>`.
    pub fn describe(&self) -> String {
        let base = match &self.kind {
            TypeKind::Array(element) => {
                format!("array<{}>", element.describe())
            }
            TypeKind::Object(fields) => {
                let names: Vec<&str> =
                    fields.iter().map(|(n, _)| n.as_str()).collect();
                format!("object{{{}}}", names.join(","))
            }
            scalar => scalar.name().to_string(),
        };
        if self.nullable {
            format!("{base}?")
        } else {
            base
        }
    }
}

impl TypeKind {
    /// Short name of the variant.
    pub const fn name(&self) -> &'static str {
        match self {
            TypeKind::Null => "null",
            TypeKind::Bool => "bool",
            TypeKind::Int64 => "int64",
            TypeKind::Float64 => "float64",
            TypeKind::String => "string",
            TypeKind::Uuid => "uuid",
            TypeKind::DateTime => "date-time",
            TypeKind::ByteArray => "byte-array",
            TypeKind::Array(_) => "array",
            TypeKind::Object(_) => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
