//! Loads the two JSON documents the binary needs from disk and hands them to
//! the validator before anything touches a database.

use std::path::Path;

use schema_sync_core::{ConnectionConfig, DataModel, ReconcileError, ReconcileResult};

async fn read_json(path: &Path) -> ReconcileResult<serde_json::Value> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ReconcileError::Config(format!("reading {}: {source}", path.display())))?;
    serde_json::from_str(&text)
        .map_err(|source| ReconcileError::Config(format!("parsing {}: {source}", path.display())))
}

pub async fn load_data_model(path: &Path) -> ReconcileResult<DataModel> {
    let doc = read_json(path).await?;
    schema_sync_core::validate::validate_data_model(&doc)
}

pub async fn load_connection_config(path: &Path) -> ReconcileResult<ConnectionConfig> {
    let doc = read_json(path).await?;
    schema_sync_core::validate::validate_connection_config(&doc)
}
