//! The declarative data model. Maps use `Vec<(String, T)>` rather than a
//! hash map so that iteration order matches insertion order: statements
//! within a phase must execute in the order the model declares them.

use schema_sync_db::schema::{IndexAlgorithm, IndexKind};

use crate::case::{CasePolicy, normalize};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataModel {
    pub entities: Vec<(String, EntityDefinition)>,
}

impl DataModel {
    #[must_use]
    pub fn get(&self, entity_name: &str) -> Option<&EntityDefinition> {
        self.entities
            .iter()
            .find(|(name, _)| name == entity_name)
            .map(|(_, e)| e)
    }

    #[must_use]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDefinition {
    pub module: String,
    pub attributes: Vec<(String, AttributeDefinition)>,
    pub indexes: Vec<IndexDefinition>,
    pub relationships: Vec<(String, Vec<String>)>,
    pub options: EntityOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityOptions {
    pub enforce_locking_constraints: bool,
    pub is_audit_enabled: bool,
}

impl Default for EntityOptions {
    fn default() -> Self {
        Self {
            enforce_locking_constraints: true,
            is_audit_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LengthOrValues {
    None,
    Integer(u64),
    /// Comma-separated value list, e.g. for `enum`/`set` attribute types.
    ValueList(String),
}

impl LengthOrValues {
    /// The string form used when comparing against an introspected column's
    /// length/values token (the model's integer is coerced to its string
    /// form for the comparison).
    #[must_use]
    pub fn as_comparable_string(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Integer(n) => Some(n.to_string()),
            Self::ValueList(v) => Some(v.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeDefault {
    Null,
    CurrentTimestamp,
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDefinition {
    pub sql_type: String,
    pub length_or_values: LengthOrValues,
    pub default: AttributeDefault,
    pub allow_null: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub attribute: String,
    pub index_name: String,
    pub index_choice: IndexKind,
    pub algorithm: IndexAlgorithm,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub port: u16,
    pub ssl: Option<TlsConfig>,
    pub module_schema_mapping: Vec<ModuleSchemaMapping>,
}

impl ConnectionConfig {
    #[must_use]
    pub fn schema_for_module(&self, module_name: &str) -> Option<&str> {
        self.module_schema_mapping
            .iter()
            .find(|m| m.module_name == module_name)
            .map(|m| m.schema_name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub ca: Option<String>,
    pub key: Option<String>,
    pub cert: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSchemaMapping {
    pub module_name: String,
    pub schema_name: String,
}

/// `id` for snake/camel, `Id` for pascal.
#[must_use]
pub fn primary_key_name(policy: CasePolicy) -> String {
    normalize("id", policy)
}

/// `last_updated` / `lastUpdated` / `LastUpdated`.
#[must_use]
pub fn locking_column_name(policy: CasePolicy) -> String {
    normalize("lastUpdated", policy)
}

/// `relationshipColumn(rel, role) = normalize(rel) + sep + normalize(role)`.
#[must_use]
pub fn relationship_column_name(related_entity: &str, role: &str, policy: CasePolicy) -> String {
    let sep = match policy {
        CasePolicy::Snake => "_",
        CasePolicy::Pascal | CasePolicy::Camel => "",
    };
    format!(
        "{}{sep}{}",
        normalize(related_entity, policy),
        normalize(role, policy)
    )
}

/// Synthetic attribute definition for the locking column.
#[must_use]
pub fn locking_column_attribute() -> AttributeDefinition {
    AttributeDefinition {
        sql_type: "datetime".to_string(),
        length_or_values: LengthOrValues::None,
        default: AttributeDefault::CurrentTimestamp,
        allow_null: false,
    }
}

/// Reverse lookup used when emitting a foreign key: given an entity and one
/// of its relationship/FK column names, find which related entity it points
/// at. Returns `None` if no relationship role produces that column name.
#[must_use]
pub fn relationship_from_column(
    entity: &EntityDefinition,
    column: &str,
    policy: CasePolicy,
) -> Option<String> {
    for (related_entity, roles) in &entity.relationships {
        for role in roles {
            if relationship_column_name(related_entity, role, policy) == column {
                return Some(related_entity.clone());
            }
        }
    }
    None
}
