//! Schema metadata boundary
//!
//! Composite (user-defined type) values need the backend's declared field
//! types to convert. The driver layer supplies them through `SchemaLookup`;
//! `SchemaCache` memoizes lookups per entity and type name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// Backend column/field type as declared in schema metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Int,
    BigInt,
    Double,
    Decimal,
    Boolean,
    Blob,
    Uuid,
    Timestamp,
    Date,
    List { element: Box<FieldType> },
    Map { value: Box<FieldType> },
    Udt { name: String },
}

impl FieldType {
    pub fn list(element: FieldType) -> Self {
        FieldType::List {
            element: Box::new(element),
        }
    }

    pub fn map(value: FieldType) -> Self {
        FieldType::Map {
            value: Box::new(value),
        }
    }

    pub fn udt(name: impl Into<String>) -> Self {
        FieldType::Udt { name: name.into() }
    }
}

/// A user-defined type: ordered `(field, type)` declarations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserType {
    pub name: String,
    pub fields: Vec<(String, FieldType)>,
}

impl UserType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declare a field
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push((name.into(), field_type));
        self
    }

    pub fn field_type(&self, name: &str) -> Option<&FieldType> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, ty)| ty)
    }
}

/// Read access to backend schema metadata
pub trait SchemaLookup: Send + Sync {
    /// Describe `type_name` as visible from `entity` (its keyspace/table)
    fn user_type(&self, entity: &str, type_name: &str) -> Option<UserType>;
}

/// Fetch the declaration of `type_name`, failing with a conversion error on `field`
pub fn resolve_user_type(
    lookup: &dyn SchemaLookup,
    entity: &str,
    type_name: &str,
    field: &str,
) -> Result<UserType> {
    lookup.user_type(entity, type_name).ok_or_else(|| {
        QueryError::conversion(
            entity,
            field,
            format!("user type '{}' is not declared", type_name),
        )
    })
}

/// Declared type of `field` within an already resolved user type
pub fn declared_field(user_type: &UserType, entity: &str, field: &str) -> Result<FieldType> {
    user_type.field_type(field).cloned().ok_or_else(|| {
        QueryError::conversion(
            entity,
            field,
            format!("missing field '{}' in user type '{}'", field, user_type.name),
        )
    })
}

/// Resolve the declared type of one UDT sub-field
pub fn resolve_field(
    lookup: &dyn SchemaLookup,
    entity: &str,
    type_name: &str,
    field: &str,
) -> Result<FieldType> {
    let user_type = resolve_user_type(lookup, entity, type_name, field)?;
    declared_field(&user_type, entity, field)
}

impl<L: SchemaLookup + ?Sized> SchemaLookup for Arc<L> {
    fn user_type(&self, entity: &str, type_name: &str) -> Option<UserType> {
        (**self).user_type(entity, type_name)
    }
}

type CacheKey = (String, String);

/// Caches `SchemaLookup` answers per `(entity, type_name)`
pub struct SchemaCache<L> {
    inner: L,
    entries: RwLock<HashMap<CacheKey, Option<Arc<UserType>>>>,
}

impl<L: SchemaLookup> SchemaCache<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every cached entry, e.g. after a schema change
    pub fn invalidate(&self) {
        self.entries.write().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.entries.read().len()
    }
}

impl<L: SchemaLookup> SchemaLookup for SchemaCache<L> {
    fn user_type(&self, entity: &str, type_name: &str) -> Option<UserType> {
        let key = (entity.to_string(), type_name.to_string());
        let hit = self.entries.read().get(&key).cloned();
        if let Some(hit) = hit {
            return hit.as_deref().cloned();
        }

        let resolved = self.inner.user_type(entity, type_name).map(Arc::new);
        self.entries.write().insert(key, resolved.clone());
        tracing::trace!(entity, type_name, found = resolved.is_some(), "cached user type lookup");
        resolved.as_deref().cloned()
    }
}

/// Fixed, in-memory schema metadata
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    types: HashMap<CacheKey, UserType>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `user_type` for `entity`
    pub fn with_type(mut self, entity: impl Into<String>, user_type: UserType) -> Self {
        self.types
            .insert((entity.into(), user_type.name.clone()), user_type);
        self
    }
}

impl SchemaLookup for StaticSchema {
    fn user_type(&self, entity: &str, type_name: &str) -> Option<UserType> {
        self.types
            .get(&(entity.to_string(), type_name.to_string()))
            .cloned()
    }
}
