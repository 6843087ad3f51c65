//! Structural checks over the raw JSON documents, producing a validated,
//! defaulted [`DataModel`]/[`ConnectionConfig`] or a diagnostic naming the
//! offending entity/attribute.

use std::collections::BTreeSet;

use schema_sync_db::schema::{IndexAlgorithm, IndexKind};
use serde_json::Value;

use crate::error::ReconcileError;
use crate::model::{
    AttributeDefault, AttributeDefinition, ConnectionConfig, DataModel, EntityDefinition,
    EntityOptions, IndexDefinition, LengthOrValues, ModuleSchemaMapping, TlsConfig,
};

fn config_err(msg: impl Into<String>) -> ReconcileError {
    ReconcileError::Config(msg.into())
}

fn as_object<'a>(value: &'a Value, context: &str) -> Result<&'a serde_json::Map<String, Value>, ReconcileError> {
    value
        .as_object()
        .ok_or_else(|| config_err(format!("{context} must be a JSON object")))
}

fn key_set(obj: &serde_json::Map<String, Value>) -> BTreeSet<&str> {
    obj.keys().map(String::as_str).collect()
}

/// Validates and defaults the data model document.
pub fn validate_data_model(doc: &Value) -> Result<DataModel, ReconcileError> {
    let obj = as_object(doc, "data model")?;
    if obj.is_empty() {
        return Ok(DataModel::default());
    }

    let entity_names: BTreeSet<&str> = key_set(obj);
    let mut entities = Vec::with_capacity(obj.len());

    for (entity_name, entity_value) in obj {
        let entity_obj = as_object(entity_value, &format!("entity '{entity_name}'"))?;
        let keys = key_set(entity_obj);
        let allowed: BTreeSet<&str> = ["module", "attributes", "indexes", "relationships", "options"]
            .into_iter()
            .collect();
        if let Some(unknown) = keys.difference(&allowed).next() {
            return Err(config_err(format!(
                "entity '{entity_name}' has unknown key '{unknown}'"
            )));
        }

        let module = entity_obj
            .get("module")
            .and_then(Value::as_str)
            .ok_or_else(|| config_err(format!("entity '{entity_name}' is missing 'module'")))?
            .to_string();

        let attributes_value = entity_obj
            .get("attributes")
            .ok_or_else(|| config_err(format!("entity '{entity_name}' is missing 'attributes'")))?;
        let attributes_obj = as_object(attributes_value, &format!("entity '{entity_name}'.attributes"))?;
        if attributes_obj.is_empty() {
            return Err(config_err(format!(
                "entity '{entity_name}' has an empty 'attributes' map"
            )));
        }

        let mut attributes = Vec::with_capacity(attributes_obj.len());
        for (attr_name, attr_value) in attributes_obj {
            attributes.push((
                attr_name.clone(),
                validate_attribute(entity_name, attr_name, attr_value)?,
            ));
        }

        let indexes = match entity_obj.get("indexes") {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => {
                let arr = v.as_array().ok_or_else(|| {
                    config_err(format!("entity '{entity_name}'.indexes must be an array"))
                })?;
                let mut out = Vec::with_capacity(arr.len());
                for idx in arr {
                    out.push(validate_index(entity_name, idx, &attributes)?);
                }
                out
            }
        };

        let relationships = match entity_obj.get("relationships") {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => {
                let rel_obj = as_object(v, &format!("entity '{entity_name}'.relationships"))?;
                let mut out = Vec::with_capacity(rel_obj.len());
                for (related, roles_value) in rel_obj {
                    if !entity_names.contains(related.as_str()) {
                        return Err(config_err(format!(
                            "entity '{entity_name}' has a relationship to unknown entity '{related}'"
                        )));
                    }
                    let roles_arr = roles_value.as_array().ok_or_else(|| {
                        config_err(format!(
                            "entity '{entity_name}'.relationships.{related} must be a sequence"
                        ))
                    })?;
                    let mut roles = Vec::with_capacity(roles_arr.len());
                    for role in roles_arr {
                        let role = role.as_str().ok_or_else(|| {
                            config_err(format!(
                                "entity '{entity_name}'.relationships.{related} must contain only strings"
                            ))
                        })?;
                        roles.push(role.to_string());
                    }
                    out.push((related.clone(), roles));
                }
                out
            }
        };

        let options = match entity_obj.get("options") {
            None | Some(Value::Null) => EntityOptions::default(),
            Some(v) => validate_options(entity_name, v)?,
        };

        entities.push((
            entity_name.clone(),
            EntityDefinition {
                module,
                attributes,
                indexes,
                relationships,
                options,
            },
        ));
    }

    Ok(DataModel { entities })
}

fn validate_attribute(
    entity_name: &str,
    attr_name: &str,
    value: &Value,
) -> Result<AttributeDefinition, ReconcileError> {
    let obj = as_object(value, &format!("entity '{entity_name}'.attributes.{attr_name}"))?;
    let keys = key_set(obj);
    let expected: BTreeSet<&str> = ["type", "lengthOrValues", "default", "allowNull"]
        .into_iter()
        .collect();
    if keys != expected {
        return Err(config_err(format!(
            "entity '{entity_name}' attribute '{attr_name}' must have exactly the keys \
             type, lengthOrValues, default, allowNull"
        )));
    }

    let sql_type = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| config_err(format!("attribute '{entity_name}.{attr_name}'.type must be a string")))?
        .to_string();

    let length_or_values = match obj.get("lengthOrValues") {
        Some(Value::Null) | None => LengthOrValues::None,
        Some(Value::Number(n)) => LengthOrValues::Integer(n.as_u64().ok_or_else(|| {
            config_err(format!(
                "attribute '{entity_name}.{attr_name}'.lengthOrValues must be a non-negative integer"
            ))
        })?),
        Some(Value::String(s)) => LengthOrValues::ValueList(s.clone()),
        Some(_) => {
            return Err(config_err(format!(
                "attribute '{entity_name}.{attr_name}'.lengthOrValues must be null, an integer, or a string"
            )));
        }
    };

    let default = match obj.get("default") {
        Some(Value::Null) | None => AttributeDefault::Null,
        Some(Value::String(s)) if s == "CURRENT_TIMESTAMP" => AttributeDefault::CurrentTimestamp,
        Some(Value::String(s)) => AttributeDefault::Literal(s.clone()),
        Some(Value::Number(n)) => AttributeDefault::Literal(n.to_string()),
        Some(Value::Bool(b)) => AttributeDefault::Literal(b.to_string()),
        Some(_) => {
            return Err(config_err(format!(
                "attribute '{entity_name}.{attr_name}'.default must be null or a literal value"
            )));
        }
    };

    let allow_null = obj
        .get("allowNull")
        .and_then(Value::as_bool)
        .ok_or_else(|| {
            config_err(format!(
                "attribute '{entity_name}.{attr_name}'.allowNull must be a boolean"
            ))
        })?;

    Ok(AttributeDefinition {
        sql_type,
        length_or_values,
        default,
        allow_null,
    })
}

fn validate_index(
    entity_name: &str,
    value: &Value,
    attributes: &[(String, AttributeDefinition)],
) -> Result<IndexDefinition, ReconcileError> {
    let obj = as_object(value, &format!("entity '{entity_name}'.indexes[]"))?;
    let keys = key_set(obj);
    let expected: BTreeSet<&str> = ["attribute", "indexName", "indexChoice", "type"]
        .into_iter()
        .collect();
    if keys != expected {
        return Err(config_err(format!(
            "entity '{entity_name}' has an index with keys other than \
             attribute, indexName, indexChoice, type"
        )));
    }

    let attribute = obj
        .get("attribute")
        .and_then(Value::as_str)
        .ok_or_else(|| config_err(format!("entity '{entity_name}' index.attribute must be a string")))?
        .to_string();
    if !attributes.iter().any(|(name, _)| name == &attribute) {
        return Err(config_err(format!(
            "entity '{entity_name}' index references unknown attribute '{attribute}'"
        )));
    }

    let index_name = obj
        .get("indexName")
        .and_then(Value::as_str)
        .ok_or_else(|| config_err(format!("entity '{entity_name}' index.indexName must be a string")))?
        .to_string();

    let index_choice_raw = obj
        .get("indexChoice")
        .and_then(Value::as_str)
        .ok_or_else(|| config_err(format!("entity '{entity_name}' index.indexChoice must be a string")))?;
    let index_choice = match index_choice_raw.to_ascii_lowercase().as_str() {
        "index" => IndexKind::Index,
        "unique" => IndexKind::Unique,
        "spatial" => IndexKind::Spatial,
        "fulltext" => IndexKind::Fulltext,
        other => {
            return Err(config_err(format!(
                "entity '{entity_name}' index '{index_name}' has invalid indexChoice '{other}'"
            )));
        }
    };

    let algorithm_raw = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| config_err(format!("entity '{entity_name}' index.type must be a string")))?;
    let algorithm = match algorithm_raw.to_ascii_uppercase().as_str() {
        "BTREE" => IndexAlgorithm::Btree,
        "HASH" => IndexAlgorithm::Hash,
        other => {
            return Err(config_err(format!(
                "entity '{entity_name}' index '{index_name}' has invalid type '{other}'"
            )));
        }
    };

    Ok(IndexDefinition {
        attribute,
        index_name,
        index_choice,
        algorithm,
    })
}

fn validate_options(entity_name: &str, value: &Value) -> Result<EntityOptions, ReconcileError> {
    let obj = as_object(value, &format!("entity '{entity_name}'.options"))?;
    let allowed: BTreeSet<&str> = ["enforceLockingConstraints", "isAuditEnabled"]
        .into_iter()
        .collect();
    if let Some(unknown) = key_set(obj).difference(&allowed).next() {
        return Err(config_err(format!(
            "entity '{entity_name}'.options has unknown key '{unknown}'"
        )));
    }
    let enforce_locking_constraints = obj
        .get("enforceLockingConstraints")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let is_audit_enabled = obj
        .get("isAuditEnabled")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    Ok(EntityOptions {
        enforce_locking_constraints,
        is_audit_enabled,
    })
}

/// Validates the connection configuration document.
pub fn validate_connection_config(doc: &Value) -> Result<ConnectionConfig, ReconcileError> {
    let obj = as_object(doc, "connection config")?;
    let expected: BTreeSet<&str> = [
        "host",
        "user",
        "password",
        "database",
        "port",
        "ssl",
        "moduleSchemaMapping",
    ]
    .into_iter()
    .collect();
    if key_set(obj) != expected {
        return Err(config_err(
            "connection config must have exactly the keys host, user, password, \
             database, port, ssl, moduleSchemaMapping"
                .to_string(),
        ));
    }

    let host = string_field(obj, "host")?;
    let user = string_field(obj, "user")?;
    let password = string_field(obj, "password")?;
    let database = string_field(obj, "database")?;
    let port = obj
        .get("port")
        .and_then(Value::as_u64)
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| config_err("connection config.port must be a 16-bit integer"))?;

    let ssl = match obj.get("ssl") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => None,
        Some(v) => {
            let ssl_obj = as_object(v, "connection config.ssl")?;
            Some(TlsConfig {
                ca: ssl_obj.get("ca").and_then(Value::as_str).map(str::to_string),
                key: ssl_obj.get("key").and_then(Value::as_str).map(str::to_string),
                cert: ssl_obj
                    .get("cert")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        }
    };

    let mapping_value = obj
        .get("moduleSchemaMapping")
        .ok_or_else(|| config_err("connection config.moduleSchemaMapping is required"))?;
    let mapping_arr = mapping_value
        .as_array()
        .ok_or_else(|| config_err("connection config.moduleSchemaMapping must be an array"))?;
    let mut module_schema_mapping = Vec::with_capacity(mapping_arr.len());
    for entry in mapping_arr {
        let entry_obj = as_object(entry, "connection config.moduleSchemaMapping[]")?;
        let module_name = string_field(entry_obj, "moduleName")?;
        let schema_name = string_field(entry_obj, "schemaName")?;
        module_schema_mapping.push(ModuleSchemaMapping {
            module_name,
            schema_name,
        });
    }

    Ok(ConnectionConfig {
        host,
        user,
        password,
        database,
        port,
        ssl,
        module_schema_mapping,
    })
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Result<String, ReconcileError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| config_err(format!("connection config.{key} must be a string")))
}

/// Cross-check: every entity's `module` must resolve in the connection
/// configuration's `moduleSchemaMapping`.
pub fn validate_module_references(
    model: &DataModel,
    config: &ConnectionConfig,
) -> Result<(), ReconcileError> {
    for (entity_name, entity) in &model.entities {
        if config.schema_for_module(&entity.module).is_none() {
            return Err(config_err(format!(
                "entity '{entity_name}' references unknown module '{}'",
                entity.module
            )));
        }
    }
    Ok(())
}
