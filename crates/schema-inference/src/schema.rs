//! Collection schema model.

use tracing::debug;

use docport_config::ConflictPolicy;

use crate::errors::{InferenceError, InferenceResult};
use crate::field_type::FieldType;
use crate::merge::merge_fields;

/// One top-level field of a collection schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub field_type: FieldType,
    pub is_primary_key: bool,
    pub is_auto_generated: bool,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_primary_key: false,
            is_auto_generated: false,
        }
    }
}

/// Schema of one collection, fields in first-seen order.
///
/// Serializes to the wire format expected by the store (see the `wire`
/// module); equal schemas always produce identical bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub collection_name: String,
    pub fields: Vec<SchemaField>,
    pub primary_key: Vec<String>,
}

impl Schema {
    pub fn new(collection_name: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
            ..Default::default()
        }
    }

    /// Parse a schema from its wire bytes.
    pub fn from_slice(bytes: &[u8]) -> InferenceResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| InferenceError::InvalidSchema(e.to_string()))
    }

    /// Canonical wire bytes.
    pub fn to_bytes(&self) -> InferenceResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(InferenceError::Serialization)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Merge a batch's inferred top-level fields into this schema.
    ///
    /// A schema that has never held fields adopts the batch as-is, so the
    /// first batch does not turn every field nullable.
    pub fn absorb(
        &mut self,
        batch: Vec<(String, FieldType)>,
        policy: ConflictPolicy,
    ) -> InferenceResult<()> {
        if self.fields.is_empty() {
            self.fields = batch
                .into_iter()
                .map(|(name, t)| SchemaField::new(name, t))
                .collect();
            return Ok(());
        }

        let current: Vec<(String, FieldType)> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.field_type.clone()))
            .collect();
        let merged = merge_fields(current, batch, "", policy)?;

        let mut previous = std::mem::take(&mut self.fields);
        self.fields = merged
            .into_iter()
            .map(|(name, field_type)| {
                match previous.iter().position(|f| f.name == name) {
                    Some(pos) => {
                        let mut field = previous.swap_remove(pos);
                        field.field_type = field_type;
                        field
                    }
                    None => SchemaField::new(name, field_type),
                }
            })
            .collect();
        Ok(())
    }

    /// Apply primary key and autogenerate markers to top-level fields.
    ///
    /// A non-empty `primary_key` replaces the current key. Autogenerate
    /// markers only accumulate. Names that match no field are kept in the
    /// key list as given.
    pub fn annotate(
        &mut self,
        primary_key: &[String],
        autogenerate: &[String],
    ) {
        if !primary_key.is_empty() {
            self.primary_key = primary_key.to_vec();
            for field in &mut self.fields {
                field.is_primary_key = primary_key.contains(&field.name);
            }
        }

        for field in &mut self.fields {
            if autogenerate.contains(&field.name) {
                field.is_auto_generated = true;
            }
        }

        for name in primary_key.iter().chain(autogenerate) {
            if self.field(name).is_none() {
                debug!(
                    collection = %self.collection_name,
                    field = %name,
                    "annotated field not present in schema"
                );
            }
        }
    }
}
