//! The reconciliation engine: the phased plan, the column/index/foreign-key
//! diff algorithms, and the constraint-renaming behaviour.
//!
//! Validation has no database dependency and is expected to have already
//! run via [`crate::validate`] before [`reconcile`] is called — this
//! function begins with an integrity probe and assumes it is handed a
//! [`DataModel`]/[`ConnectionConfig`] that already passed validation, and
//! one already-connected [`Gateway`] per module.
//!
//! Every phase below runs to completion across every module before the next
//! phase starts for any module — phases are the outer loop, modules the
//! inner one. A module whose entity set is empty simply contributes no work
//! to a phase; it never blocks or reorders another module's phase.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use schema_sync_db::Gateway;
use schema_sync_db::schema::{self, ColumnDef, ColumnDefault};

use crate::case::{CasePolicy, denormalize, normalize};
use crate::error::{ReconcileError, ReconcileResult};
use crate::interaction::{Answer, Confirm, Level, Reporter};
use crate::model::{
    AttributeDefault, ConnectionConfig, DataModel, EntityDefinition, LengthOrValues,
    locking_column_attribute, locking_column_name, primary_key_name, relationship_column_name,
};

/// How orphan tables are disposed of. Chosen by the caller (the CLI maps
/// `--yes` to `All` and an absent flag to `List`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropMode {
    All,
    OneByOne,
    None,
    /// Preview then re-decide; falls back to `None` if the operator asks
    /// for the list a second time instead of picking a disposition.
    List,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub tables_created: usize,
    pub tables_removed: usize,
    pub columns_added: usize,
    pub columns_modified: usize,
    pub columns_dropped: usize,
    pub indexes_added: usize,
    pub indexes_removed: usize,
    pub foreign_keys_dropped: usize,
    pub foreign_keys_created: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ForeignKeySpec {
    column: String,
    referenced_entity: String,
    constraint_name: String,
}

/// Everything phase 4 (introspect + diff) produces for one module, carried
/// forward so phases 5-10 can each sweep every module in turn instead of
/// re-introspecting or recomputing per phase.
struct ModuleState<'m> {
    module: String,
    gateway: Arc<dyn Gateway>,
    entities: Vec<(&'m str, &'m EntityDefinition)>,
    tables_create: Vec<String>,
    tables_remove: BTreeSet<String>,
    expected_fks: HashMap<&'m str, Vec<ForeignKeySpec>>,
}

static FK_NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hex digest of a high-resolution timestamp plus a process-local counter —
/// collision-resistant per run without pulling in a dedicated RNG crate.
fn fresh_constraint_name() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let counter = FK_NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();

    let mut hasher = <sha2::Sha256 as sha2::Digest>::new();
    sha2::Digest::update(&mut hasher, format!("{nanos}-{counter}-{pid}").as_bytes());
    let digest = sha2::Digest::finalize(hasher);
    format!("fk_{}", hex::encode(&digest[..8]))
}

fn expected_foreign_keys(entity: &EntityDefinition, policy: CasePolicy) -> Vec<ForeignKeySpec> {
    let mut specs = Vec::new();
    for (related_entity, roles) in &entity.relationships {
        for role in roles {
            specs.push(ForeignKeySpec {
                column: relationship_column_name(related_entity, role, policy),
                referenced_entity: related_entity.clone(),
                constraint_name: fresh_constraint_name(),
            });
        }
    }
    specs
}

fn expected_column_set(entity: &EntityDefinition, policy: CasePolicy) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    set.insert(primary_key_name(policy));
    for (attr_name, _) in &entity.attributes {
        set.insert(normalize(attr_name, policy));
    }
    for (related_entity, roles) in &entity.relationships {
        for role in roles {
            set.insert(relationship_column_name(related_entity, role, policy));
        }
    }
    if entity.options.enforce_locking_constraints {
        set.insert(locking_column_name(policy));
    }
    set
}

/// Splits `information_schema.COLUMNS.COLUMN_TYPE` (e.g. `"varchar(50)"`)
/// into `(type, lengthOrValues)` by cutting at the first `(` and trimming
/// the trailing `)`.
fn split_column_type(column_type: &str) -> (String, Option<String>) {
    match column_type.find('(') {
        Some(idx) => {
            let (ty, rest) = column_type.split_at(idx);
            let values = rest.trim_start_matches('(').trim_end_matches(')');
            (ty.to_string(), Some(values.to_string()))
        }
        None => (column_type.to_string(), None),
    }
}

fn is_current_timestamp(default: Option<&str>) -> bool {
    default.is_some_and(|d| d.eq_ignore_ascii_case("CURRENT_TIMESTAMP"))
}

/// Runs the full phased plan against every module with a gateway supplied
/// in `gateways`. Every phase completes across all modules before the next
/// phase begins.
pub async fn reconcile(
    model: &DataModel,
    config: &ConnectionConfig,
    policy: CasePolicy,
    gateways: &HashMap<String, Arc<dyn Gateway>>,
    confirm: &dyn Confirm,
    reporter: &dyn Reporter,
    drop_mode: DropMode,
) -> ReconcileResult<Summary> {
    let _ = config; // module->schema mapping already baked into `gateways`
    let mut summary = Summary::default();

    // Integrity probe: bail out before touching anything if a module's
    // default storage engine isn't InnoDB.
    log::debug!("phase[IntegrityProbe]: checking {} module(s)", gateways.len());
    for (module, gateway) in gateways {
        let is_innodb = gateway
            .engine_supports_innodb()
            .await
            .map_err(ReconcileError::Introspection)?;
        log::trace!("phase[IntegrityProbe]: module={module} innodb={is_innodb}");
        if !is_innodb {
            return Err(ReconcileError::Integrity {
                module: module.clone(),
                reason: "default storage engine is not InnoDB".to_string(),
            });
        }
    }

    // Disable FK checks everywhere before any mutation.
    log::debug!("phase[DisableForeignKeyChecks]: {} module(s)", gateways.len());
    for gateway in gateways.values() {
        gateway
            .set_foreign_key_checks(false)
            .await
            .map_err(ReconcileError::Introspection)?;
    }

    let result = run_mutating_phases(
        model, policy, gateways, confirm, reporter, drop_mode, &mut summary,
    )
    .await;

    // FK checks are guaranteed back on regardless of outcome.
    log::debug!("phase[RestoreForeignKeyChecks]: {} module(s)", gateways.len());
    for gateway in gateways.values() {
        let _ = gateway.set_foreign_key_checks(true).await;
    }

    match result {
        Ok(()) => {
            for gateway in gateways.values() {
                gateway.commit().await.map_err(ReconcileError::Introspection)?;
            }
            log::info!("reconcile: committed, summary={summary:?}");
            Ok(summary)
        }
        Err(err) => {
            for gateway in gateways.values() {
                let _ = gateway.rollback().await;
            }
            log::warn!("reconcile: rolled back after error: {err}");
            Err(err)
        }
    }
}

/// Phase 4 (introspect existing tables, diff against the model, precompute
/// this run's fresh FK names) through phase 10 (create the expected foreign
/// keys). Each phase below sweeps every module before the next one starts.
#[allow(clippy::too_many_arguments)]
async fn run_mutating_phases<'m>(
    model: &'m DataModel,
    policy: CasePolicy,
    gateways: &HashMap<String, Arc<dyn Gateway>>,
    confirm: &dyn Confirm,
    reporter: &dyn Reporter,
    drop_mode: DropMode,
    summary: &mut Summary,
) -> ReconcileResult<()> {
    // Phase 4: introspect + diff, across all modules.
    let mut states: Vec<ModuleState<'m>> = Vec::with_capacity(gateways.len());
    for (module, gateway) in gateways {
        log::debug!("phase[Introspect]: module={module}");
        let entities: Vec<(&str, &EntityDefinition)> = model
            .entities
            .iter()
            .filter(|(_, e)| &e.module == module)
            .map(|(name, e)| (name.as_str(), e))
            .collect();

        let existing_tables: BTreeSet<String> = gateway
            .introspect_tables()
            .await
            .map_err(ReconcileError::Introspection)?
            .into_iter()
            .map(|t| t.name)
            .collect();
        let expected_tables: BTreeSet<String> = entities
            .iter()
            .map(|(name, _)| normalize(name, policy))
            .collect();
        let tables_create: Vec<String> = expected_tables
            .difference(&existing_tables)
            .cloned()
            .collect();
        let tables_remove: BTreeSet<String> = existing_tables
            .difference(&expected_tables)
            .cloned()
            .collect();

        reporter.report(
            "Existing table clean up",
            &format!("{} orphan table(s) found", tables_remove.len()),
            Level::Info,
        );

        // Precompute this run's fresh foreign-key names once, reused by the
        // drop pass's bookkeeping, the index phase, and the create pass.
        let mut expected_fks: HashMap<&str, Vec<ForeignKeySpec>> = HashMap::new();
        for &(entity_name, entity) in &entities {
            expected_fks.insert(entity_name, expected_foreign_keys(entity, policy));
        }

        states.push(ModuleState {
            module: module.clone(),
            gateway: gateway.clone(),
            entities,
            tables_create,
            tables_remove,
            expected_fks,
        });
    }

    // Phase 5: drop orphan tables, across all modules.
    for state in &states {
        log::debug!("phase[DropOrphans]: module={}", state.module);
        let dropped = drop_orphan_tables(
            state.gateway.as_ref(),
            &state.module,
            &state.tables_remove,
            drop_mode,
            confirm,
        )
        .await?;
        summary.tables_removed += dropped;
        reporter.report(
            "Existing table clean up",
            &format!("{dropped} table(s) removed"),
            Level::Success,
        );
    }

    // Phase 6: create skeleton tables (primary key only), across all modules.
    let pk = primary_key_name(policy);
    for state in &states {
        log::debug!("phase[CreateSkeletons]: module={}", state.module);
        for table in &state.tables_create {
            let create = schema::create_table(table).primary_key(pk.as_str());
            let statement = create.statement();
            create
                .execute(state.gateway.as_ref())
                .await
                .map_err(|source| ReconcileError::Ddl {
                    module: state.module.clone(),
                    phase: "CreateSkeletons",
                    statement,
                    source,
                })?;
            summary.tables_created += 1;
        }
        reporter.report(
            "Create new tables",
            &format!("{} table(s) created", state.tables_create.len()),
            Level::Success,
        );
    }

    // Phase 7: drop every stored foreign key unconditionally, across all
    // modules — this run's expected names are freshly generated and can
    // never equal a name already stored.
    for state in &states {
        log::debug!("phase[DropStaleForeignKeys]: module={}", state.module);
        let mut module_fks_dropped = 0usize;
        for &(entity_name, _entity) in &state.entities {
            let table = normalize(entity_name, policy);
            let stored = state
                .gateway
                .introspect_foreign_keys(&table)
                .await
                .map_err(ReconcileError::Introspection)?;
            for fk in stored {
                let drop = schema::alter_table(&table).drop_foreign_key(fk.constraint_name.clone());
                let statement = drop.statements().join("; ");
                drop.execute(state.gateway.as_ref())
                    .await
                    .map_err(|source| ReconcileError::Ddl {
                        module: state.module.clone(),
                        phase: "DropStaleForeignKeys",
                        statement,
                        source,
                    })?;
                module_fks_dropped += 1;
            }
        }
        summary.foreign_keys_dropped += module_fks_dropped;
        reporter.report(
            "Update relationships",
            &format!("{module_fks_dropped} foreign key(s) dropped"),
            Level::Info,
        );
    }

    // Phase 8: reconcile columns, across all modules.
    for state in &states {
        log::debug!("phase[ReconcileColumns]: module={}", state.module);
        for &(entity_name, entity) in &state.entities {
            let table = normalize(entity_name, policy);
            let (added, modified, dropped) =
                reconcile_columns(state.gateway.as_ref(), &state.module, &table, entity, policy)
                    .await?;
            summary.columns_added += added;
            summary.columns_modified += modified;
            summary.columns_dropped += dropped;
        }
    }

    // Phase 9: reconcile indexes (FK constraint names ∪ model index names
    // are never dropped), across all modules.
    for state in &states {
        log::debug!("phase[ReconcileIndexes]: module={}", state.module);
        let mut module_idx_added = 0usize;
        let mut module_idx_removed = 0usize;
        for &(entity_name, entity) in &state.entities {
            let table = normalize(entity_name, policy);
            let fk_names: BTreeSet<String> = state.expected_fks[entity_name]
                .iter()
                .map(|f| f.constraint_name.clone())
                .collect();
            let (added, removed) =
                reconcile_indexes(state.gateway.as_ref(), &state.module, &table, entity, policy, &fk_names)
                    .await?;
            module_idx_added += added;
            module_idx_removed += removed;
        }
        summary.indexes_added += module_idx_added;
        summary.indexes_removed += module_idx_removed;
        reporter.report(
            "Update indexes",
            &format!("{module_idx_added} index(es) added, {module_idx_removed} removed"),
            Level::Success,
        );
    }

    // Phase 10: create the expected foreign keys under their fresh names,
    // across all modules.
    for state in &states {
        log::debug!("phase[CreateForeignKeys]: module={}", state.module);
        let mut module_fks_created = 0usize;
        for &(entity_name, _entity) in &state.entities {
            let table = normalize(entity_name, policy);
            for fk in &state.expected_fks[entity_name] {
                let ref_table = normalize(&fk.referenced_entity, policy);
                let add = schema::alter_table(&table).add_foreign_key(
                    fk.constraint_name.clone(),
                    fk.column.clone(),
                    ref_table,
                    pk.as_str(),
                );
                let statement = add.statements().join("; ");
                add.execute(state.gateway.as_ref())
                    .await
                    .map_err(|source| ReconcileError::Ddl {
                        module: state.module.clone(),
                        phase: "CreateForeignKeys",
                        statement,
                        source,
                    })?;
                module_fks_created += 1;
            }
        }
        summary.foreign_keys_created += module_fks_created;
        reporter.report(
            "Update relationships",
            &format!("{module_fks_created} foreign key(s) created"),
            Level::Success,
        );
    }

    Ok(())
}

async fn drop_orphan_tables(
    gateway: &dyn Gateway,
    module: &str,
    tables_remove: &BTreeSet<String>,
    drop_mode: DropMode,
    confirm: &dyn Confirm,
) -> ReconcileResult<usize> {
    if tables_remove.is_empty() {
        return Ok(0);
    }

    let mode = match drop_mode {
        DropMode::List => match confirm.confirm("Orphan tables found, choose disposition").await {
            Answer::All => DropMode::All,
            Answer::No | Answer::None => DropMode::None,
            Answer::Yes => DropMode::OneByOne,
            Answer::List => DropMode::None,
        },
        other => other,
    };

    match mode {
        DropMode::None => Ok(0),
        DropMode::All => {
            let mut names = tables_remove.iter();
            let first = names.next().expect("checked non-empty above");
            let drop = schema::drop_table(first).tables(names.map(String::as_str));
            let statement = drop.statement();
            drop.execute(gateway)
                .await
                .map_err(|source| ReconcileError::Ddl {
                    module: module.to_string(),
                    phase: "DropOrphans",
                    statement,
                    source,
                })?;
            Ok(tables_remove.len())
        }
        DropMode::OneByOne => {
            let mut dropped = 0;
            for table in tables_remove {
                if confirm.confirm(&format!("Drop table '{table}'?")).await == Answer::Yes {
                    let drop = schema::drop_table(table);
                    let statement = drop.statement();
                    drop.execute(gateway)
                        .await
                        .map_err(|source| ReconcileError::Ddl {
                            module: module.to_string(),
                            phase: "DropOrphans",
                            statement,
                            source,
                        })?;
                    dropped += 1;
                }
            }
            Ok(dropped)
        }
        DropMode::List => unreachable!("resolved above"),
    }
}

async fn reconcile_columns(
    gateway: &dyn Gateway,
    module: &str,
    table: &str,
    entity: &EntityDefinition,
    policy: CasePolicy,
) -> ReconcileResult<(usize, usize, usize)> {
    let pk = primary_key_name(policy);
    let locking = locking_column_name(policy);
    let expected = expected_column_set(entity, policy);

    let existing = gateway
        .introspect_columns(table)
        .await
        .map_err(ReconcileError::Introspection)?;

    let mut processed: BTreeSet<String> = BTreeSet::new();
    let mut relationship_processed: BTreeSet<String> = BTreeSet::new();
    let mut added = 0usize;
    let mut modified = 0usize;
    let mut dropped = 0usize;

    for column in &existing {
        let field = &column.field;
        if field == &pk {
            processed.insert(field.clone());
            continue;
        }
        if !expected.contains(field) {
            let alter = schema::alter_table(table).drop_column(field.clone());
            let statement = alter.statements().join("; ");
            alter
                .execute(gateway)
                .await
                .map_err(|source| ReconcileError::Ddl {
                    module: module.to_string(),
                    phase: "ReconcileColumns",
                    statement,
                    source,
                })?;
            dropped += 1;
            continue;
        }

        let denorm = denormalize(field, policy);
        let (existing_type, existing_length) = split_column_type(&column.column_type);

        if let Some((_, attr)) = entity.attributes.iter().find(|(name, _)| name == &denorm) {
            if let Some(def) = mismatched_column_def(
                &existing_type,
                existing_length.as_deref(),
                column.nullable,
                column.default.as_deref(),
                attr,
            ) {
                let alter = schema::alter_table(table).modify_column(field.clone(), def);
                let statement = alter.statements().join("; ");
                alter
                    .execute(gateway)
                    .await
                    .map_err(|source| ReconcileError::Ddl {
                        module: module.to_string(),
                        phase: "ReconcileColumns",
                        statement,
                        source,
                    })?;
                modified += 1;
            }
            processed.insert(field.clone());
        } else if field == &locking && entity.options.enforce_locking_constraints {
            let ok = existing_type.eq_ignore_ascii_case("datetime")
                && is_current_timestamp(column.default.as_deref());
            if !ok {
                let def = ColumnDef::new("datetime", false).with_default(ColumnDefault::CurrentTimestamp);
                let alter = schema::alter_table(table).modify_column(field.clone(), def);
                let statement = alter.statements().join("; ");
                alter
                    .execute(gateway)
                    .await
                    .map_err(|source| ReconcileError::Ddl {
                        module: module.to_string(),
                        phase: "ReconcileColumns",
                        statement,
                        source,
                    })?;
                modified += 1;
            }
            processed.insert(field.clone());
        } else {
            // Relationship (foreign-key) column.
            if !existing_type.eq_ignore_ascii_case("bigint") {
                let def = ColumnDef::new("bigint", true).with_length("20");
                let alter = schema::alter_table(table).modify_column(field.clone(), def);
                let statement = alter.statements().join("; ");
                alter
                    .execute(gateway)
                    .await
                    .map_err(|source| ReconcileError::Ddl {
                        module: module.to_string(),
                        phase: "ReconcileColumns",
                        statement,
                        source,
                    })?;
                modified += 1;
            }
            relationship_processed.insert(field.clone());
            processed.insert(field.clone());
        }
    }

    // Columns to add: model attributes + pk + locking column, minus processed.
    for (attr_name, attr) in &entity.attributes {
        let col_name = normalize(attr_name, policy);
        if processed.contains(&col_name) {
            continue;
        }
        let def = column_def_from_attribute(attr);
        let alter = schema::alter_table(table).add_column(col_name, def);
        let statement = alter.statements().join("; ");
        alter
            .execute(gateway)
            .await
            .map_err(|source| ReconcileError::Ddl {
                module: module.to_string(),
                phase: "ReconcileColumns",
                statement,
                source,
            })?;
        added += 1;
    }
    if entity.options.enforce_locking_constraints && !processed.contains(&locking) {
        let def = column_def_from_attribute(&locking_column_attribute());
        let alter = schema::alter_table(table).add_column(locking.clone(), def);
        let statement = alter.statements().join("; ");
        alter
            .execute(gateway)
            .await
            .map_err(|source| ReconcileError::Ddl {
                module: module.to_string(),
                phase: "ReconcileColumns",
                statement,
                source,
            })?;
        added += 1;
    }

    // Relationship columns to add.
    for (related_entity, roles) in &entity.relationships {
        for role in roles {
            let col_name = relationship_column_name(related_entity, role, policy);
            if relationship_processed.contains(&col_name) {
                continue;
            }
            let def = ColumnDef::new("bigint", true).with_length("20");
            let alter = schema::alter_table(table).add_column(col_name, def);
            let statement = alter.statements().join("; ");
            alter
                .execute(gateway)
                .await
                .map_err(|source| ReconcileError::Ddl {
                    module: module.to_string(),
                    phase: "ReconcileColumns",
                    statement,
                    source,
                })?;
            added += 1;
        }
    }

    Ok((added, modified, dropped))
}

/// Compares an existing column (already split into type/length) against its
/// attribute definition on `{type, lengthOrValues, default, allowNull}`,
/// returning the `ColumnDef` to emit a `MODIFY COLUMN` for on the first
/// mismatch, or `None` if every key already matches.
fn mismatched_column_def(
    existing_type: &str,
    existing_length: Option<&str>,
    existing_nullable: bool,
    existing_default: Option<&str>,
    attr: &crate::model::AttributeDefinition,
) -> Option<ColumnDef> {
    let type_matches = existing_type.eq_ignore_ascii_case(&attr.sql_type);
    let length_matches = existing_length.map(str::to_string) == attr.length_or_values.as_comparable_string();
    let null_matches = existing_nullable == attr.allow_null;
    let default_matches = match &attr.default {
        AttributeDefault::Null => existing_default.is_none(),
        AttributeDefault::CurrentTimestamp => is_current_timestamp(existing_default),
        AttributeDefault::Literal(v) => existing_default == Some(v.as_str()),
    };

    if type_matches && length_matches && null_matches && default_matches {
        None
    } else {
        Some(column_def_from_attribute(attr))
    }
}

fn column_def_from_attribute(attr: &crate::model::AttributeDefinition) -> ColumnDef {
    let mut def = ColumnDef::new(attr.sql_type.clone(), attr.allow_null);
    if let Some(length) = attr.length_or_values.as_comparable_string() {
        def = def.with_length(length);
    }
    def = match &attr.default {
        AttributeDefault::Null => def,
        AttributeDefault::CurrentTimestamp => def.with_default(ColumnDefault::CurrentTimestamp),
        AttributeDefault::Literal(v) => def.with_default(ColumnDefault::Literal(v.clone())),
    };
    def
}

async fn reconcile_indexes(
    gateway: &dyn Gateway,
    module: &str,
    table: &str,
    entity: &EntityDefinition,
    policy: CasePolicy,
    fk_constraint_names: &BTreeSet<String>,
) -> ReconcileResult<(usize, usize)> {
    let existing = gateway
        .introspect_indexes(table)
        .await
        .map_err(ReconcileError::Introspection)?;
    let existing_names: BTreeSet<String> = existing.iter().map(|i| i.name.clone()).collect();

    let mut expected_index_names: BTreeSet<String> = fk_constraint_names.clone();
    for idx in &entity.indexes {
        expected_index_names.insert(normalize(&idx.index_name, policy));
    }

    let mut added = 0usize;
    for idx in &entity.indexes {
        let name = normalize(&idx.index_name, policy);
        if existing_names.contains(&name) {
            continue;
        }
        let column = normalize(&idx.attribute, policy);
        let create = schema::create_index(&name)
            .table(table)
            .column(&column)
            .kind(idx.index_choice)
            .algorithm(idx.algorithm);
        let statement = create.statement();
        create
            .execute(gateway)
            .await
            .map_err(|source| ReconcileError::Ddl {
                module: module.to_string(),
                phase: "ReconcileIndexes",
                statement,
                source,
            })?;
        added += 1;
    }

    let mut removed = 0usize;
    for name in &existing_names {
        if name.eq_ignore_ascii_case("PRIMARY") || expected_index_names.contains(name) {
            continue;
        }
        let drop = schema::drop_index(name, table);
        let statement = drop.statement();
        drop.execute(gateway)
            .await
            .map_err(|source| ReconcileError::Ddl {
                module: module.to_string(),
                phase: "ReconcileIndexes",
                statement,
                source,
            })?;
        removed += 1;
    }

    Ok((added, removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use schema_sync_db::{ColumnInfo, ForeignKeyInfo, GatewayResult, IndexInfo, TableSummary};
    use std::sync::Mutex as StdMutex;

    use crate::interaction::{AcceptAll, NullReporter};
    use crate::model::{AttributeDefinition, EntityDefinition, EntityOptions, IndexDefinition};

    /// `"field type[(len)] [NOT NULL] [DEFAULT ...]"` back into a
    /// [`ColumnInfo`] — the inverse of [`schema::column_clause`], used only
    /// by [`FakeGateway::apply_alter`] to keep its in-memory state honest
    /// across a run.
    fn parse_column_clause(clause: &str) -> ColumnInfo {
        let (field, rest) = clause.split_once(' ').unwrap_or((clause, ""));
        let mut rest = rest;

        let default = if let Some(idx) = rest.find("DEFAULT ") {
            let value = rest[idx + "DEFAULT ".len()..].trim();
            let parsed = if value == "NULL" {
                None
            } else {
                Some(value.trim_matches('\'').to_string())
            };
            rest = rest[..idx].trim_end();
            parsed
        } else {
            None
        };

        let nullable = !rest.contains("NOT NULL");
        let column_type = rest.replace("NOT NULL", "").trim().to_string();

        ColumnInfo {
            field: field.to_string(),
            column_type,
            nullable,
            default,
            is_primary_key: false,
            ordinal_position: 0,
        }
    }

    fn parse_foreign_key_clause(rest: &str) -> Option<ForeignKeyInfo> {
        let (name, rest) = rest.split_once(' ')?;
        let rest = rest.strip_prefix("FOREIGN KEY (")?;
        let (column, rest) = rest.split_once(')')?;
        let rest = rest.trim_start().strip_prefix("REFERENCES ")?;
        let (referenced_table, rest) = rest.split_once('(')?;
        let (referenced_column, _rest) = rest.split_once(')')?;
        Some(ForeignKeyInfo {
            constraint_name: name.to_string(),
            column: column.to_string(),
            referenced_table: referenced_table.trim().to_string(),
            referenced_column: referenced_column.to_string(),
            on_update: "CASCADE".to_string(),
            on_delete: "SET NULL".to_string(),
        })
    }

    fn parse_index_clause(rest: &str) -> Option<IndexInfo> {
        let (unique, rest) = if let Some(r) = rest.strip_prefix("UNIQUE INDEX ") {
            (true, r)
        } else if let Some(r) = rest.strip_prefix("INDEX ") {
            (false, r)
        } else if let Some(r) = rest.strip_prefix("SPATIAL INDEX ") {
            (false, r)
        } else if let Some(r) = rest.strip_prefix("FULLTEXT INDEX ") {
            (false, r)
        } else {
            return None;
        };
        let (name, rest) = rest.split_once(" (")?;
        let (column, _rest) = rest.split_once(')')?;
        Some(IndexInfo {
            name: name.to_string(),
            unique,
            columns: vec![column.to_string()],
        })
    }

    /// In-memory `Gateway` test double so the engine can be exercised
    /// without a live MySQL server. `execute` parses back the DDL text the
    /// engine renders, so a second `reconcile` call against the same
    /// instance sees a converged schema instead of a static fixture.
    struct FakeGateway {
        schema: String,
        tables: StdMutex<Vec<String>>,
        columns: StdMutex<HashMap<String, Vec<ColumnInfo>>>,
        indexes: StdMutex<HashMap<String, Vec<IndexInfo>>>,
        foreign_keys: StdMutex<HashMap<String, Vec<ForeignKeyInfo>>>,
        statements: StdMutex<Vec<String>>,
        innodb: bool,
    }

    impl Default for FakeGateway {
        fn default() -> Self {
            Self {
                schema: String::new(),
                tables: StdMutex::new(Vec::new()),
                columns: StdMutex::new(HashMap::new()),
                indexes: StdMutex::new(HashMap::new()),
                foreign_keys: StdMutex::new(HashMap::new()),
                statements: StdMutex::new(Vec::new()),
                innodb: true,
            }
        }
    }

    impl FakeGateway {
        fn apply_alter(&self, rest: &str) {
            let Some((table, tail)) = rest.split_once(' ') else {
                return;
            };
            let table = table.to_string();

            if let Some(clause) = tail.strip_prefix("ADD COLUMN ") {
                let info = parse_column_clause(clause);
                self.columns.lock().unwrap().entry(table).or_default().push(info);
            } else if let Some(clause) = tail.strip_prefix("MODIFY COLUMN ") {
                let info = parse_column_clause(clause);
                let mut columns = self.columns.lock().unwrap();
                if let Some(existing) = columns
                    .entry(table)
                    .or_default()
                    .iter_mut()
                    .find(|c| c.field == info.field)
                {
                    existing.column_type = info.column_type;
                    existing.nullable = info.nullable;
                    existing.default = info.default;
                }
            } else if let Some(name) = tail.strip_prefix("DROP COLUMN ") {
                self.columns
                    .lock()
                    .unwrap()
                    .entry(table)
                    .or_default()
                    .retain(|c| c.field != name);
            } else if let Some(name) = tail.strip_prefix("DROP FOREIGN KEY ") {
                self.foreign_keys
                    .lock()
                    .unwrap()
                    .entry(table)
                    .or_default()
                    .retain(|f| f.constraint_name != name);
            } else if let Some(name) = tail.strip_prefix("DROP INDEX ") {
                self.indexes
                    .lock()
                    .unwrap()
                    .entry(table)
                    .or_default()
                    .retain(|i| i.name != name);
            } else if let Some(rest) = tail.strip_prefix("ADD CONSTRAINT ") {
                if let Some(fk) = parse_foreign_key_clause(rest) {
                    self.foreign_keys.lock().unwrap().entry(table).or_default().push(fk);
                }
            } else if let Some(rest) = tail.strip_prefix("ADD ") {
                if let Some(idx) = parse_index_clause(rest) {
                    self.indexes.lock().unwrap().entry(table).or_default().push(idx);
                }
            }
        }
    }

    #[async_trait::async_trait]
    impl Gateway for FakeGateway {
        fn schema(&self) -> &str {
            &self.schema
        }

        async fn introspect_tables(&self) -> GatewayResult<Vec<TableSummary>> {
            Ok(self
                .tables
                .lock()
                .unwrap()
                .iter()
                .map(|name| TableSummary {
                    name: name.clone(),
                    table_type: "BASE TABLE".to_string(),
                })
                .collect())
        }

        async fn introspect_columns(&self, table: &str) -> GatewayResult<Vec<ColumnInfo>> {
            Ok(self.columns.lock().unwrap().get(table).cloned().unwrap_or_default())
        }

        async fn introspect_indexes(&self, table: &str) -> GatewayResult<Vec<IndexInfo>> {
            Ok(self.indexes.lock().unwrap().get(table).cloned().unwrap_or_default())
        }

        async fn introspect_foreign_keys(&self, table: &str) -> GatewayResult<Vec<ForeignKeyInfo>> {
            Ok(self
                .foreign_keys
                .lock()
                .unwrap()
                .get(table)
                .cloned()
                .unwrap_or_default())
        }

        async fn set_foreign_key_checks(&self, _enabled: bool) -> GatewayResult<()> {
            Ok(())
        }

        async fn execute(&self, statement: &str) -> GatewayResult<()> {
            self.statements.lock().unwrap().push(statement.to_string());

            if let Some(rest) = statement.strip_prefix("CREATE TABLE ") {
                let name = rest.split('(').next().unwrap().trim().to_string();
                self.tables.lock().unwrap().push(name.clone());
                self.columns.lock().unwrap().insert(
                    name,
                    vec![ColumnInfo {
                        field: "id".to_string(),
                        column_type: "bigint".to_string(),
                        nullable: false,
                        default: None,
                        is_primary_key: true,
                        ordinal_position: 1,
                    }],
                );
            } else if let Some(rest) = statement.strip_prefix("DROP TABLE ") {
                for name in rest.split(',') {
                    let name = name.trim();
                    self.tables.lock().unwrap().retain(|t| t != name);
                    self.columns.lock().unwrap().remove(name);
                    self.indexes.lock().unwrap().remove(name);
                    self.foreign_keys.lock().unwrap().remove(name);
                }
            } else if let Some(rest) = statement.strip_prefix("ALTER TABLE ") {
                self.apply_alter(rest);
            }
            Ok(())
        }

        async fn engine_supports_innodb(&self) -> GatewayResult<bool> {
            Ok(self.innodb)
        }

        async fn commit(&self) -> GatewayResult<()> {
            Ok(())
        }

        async fn rollback(&self) -> GatewayResult<()> {
            Ok(())
        }
    }

    fn greenfield_model() -> DataModel {
        DataModel {
            entities: vec![(
                "exampleEntityOne".to_string(),
                EntityDefinition {
                    module: "main".to_string(),
                    attributes: vec![(
                        "exampleOneBigInt".to_string(),
                        AttributeDefinition {
                            sql_type: "bigint".to_string(),
                            length_or_values: LengthOrValues::Integer(20),
                            default: AttributeDefault::Null,
                            allow_null: true,
                        },
                    )],
                    indexes: vec![IndexDefinition {
                        attribute: "exampleOneBigInt".to_string(),
                        index_name: "exampleOneBigInt".to_string(),
                        index_choice: schema_sync_db::schema::IndexKind::Index,
                        algorithm: schema_sync_db::schema::IndexAlgorithm::Btree,
                    }],
                    relationships: vec![],
                    options: EntityOptions::default(),
                },
            )],
        }
    }

    #[tokio::test]
    async fn greenfield_creates_table_and_columns() {
        let model = greenfield_model();
        let config = ConnectionConfig::default();
        let gateway: Arc<dyn Gateway> = Arc::new(FakeGateway::default());
        let mut gateways = HashMap::new();
        gateways.insert("main".to_string(), gateway.clone());

        let summary = reconcile(
            &model,
            &config,
            CasePolicy::Snake,
            &gateways,
            &AcceptAll,
            &NullReporter,
            DropMode::All,
        )
        .await
        .unwrap();

        assert_eq!(summary.tables_created, 1);
        assert!(summary.columns_added >= 2, "expects attribute + locking column");
        assert_eq!(summary.indexes_added, 1);
    }

    /// S2: an orphan table (not present in the model) is removed under
    /// `DropMode::All` and survives untouched under `DropMode::None`.
    #[tokio::test]
    async fn orphan_tables_are_dropped_under_all_mode() {
        let model = DataModel { entities: vec![] };
        let config = ConnectionConfig::default();
        let fake = Arc::new(FakeGateway::default());
        fake.tables.lock().unwrap().push("legacy_table".to_string());
        let gateway: Arc<dyn Gateway> = fake.clone();
        let mut gateways = HashMap::new();
        gateways.insert("main".to_string(), gateway);

        let summary = reconcile(
            &model,
            &config,
            CasePolicy::Snake,
            &gateways,
            &AcceptAll,
            &NullReporter,
            DropMode::All,
        )
        .await
        .unwrap();

        assert_eq!(summary.tables_removed, 1);
        assert_eq!(summary.tables_created, 0);
        assert!(fake.tables.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn orphan_tables_survive_none_mode() {
        let model = DataModel { entities: vec![] };
        let config = ConnectionConfig::default();
        let fake = Arc::new(FakeGateway::default());
        fake.tables.lock().unwrap().push("legacy_table".to_string());
        let gateway: Arc<dyn Gateway> = fake.clone();
        let mut gateways = HashMap::new();
        gateways.insert("main".to_string(), gateway);

        let summary = reconcile(
            &model,
            &config,
            CasePolicy::Snake,
            &gateways,
            &AcceptAll,
            &NullReporter,
            DropMode::None,
        )
        .await
        .unwrap();

        assert_eq!(summary.tables_removed, 0);
        assert_eq!(fake.tables.lock().unwrap().len(), 1);
    }

    /// S3: an existing column whose type/length drifted from the model
    /// emits exactly one `MODIFY COLUMN` statement.
    #[tokio::test]
    async fn type_drift_emits_single_modify_column() {
        let model = DataModel {
            entities: vec![(
                "exampleEntityOne".to_string(),
                EntityDefinition {
                    module: "main".to_string(),
                    attributes: vec![(
                        "exampleOneStringWithNull".to_string(),
                        AttributeDefinition {
                            sql_type: "varchar".to_string(),
                            length_or_values: LengthOrValues::Integer(50),
                            default: AttributeDefault::Null,
                            allow_null: true,
                        },
                    )],
                    indexes: vec![],
                    relationships: vec![],
                    options: EntityOptions {
                        enforce_locking_constraints: false,
                        is_audit_enabled: false,
                    },
                },
            )],
        };
        let config = ConnectionConfig::default();
        let fake = Arc::new(FakeGateway::default());
        fake.tables.lock().unwrap().push("example_entity_one".to_string());
        fake.columns.lock().unwrap().insert(
            "example_entity_one".to_string(),
            vec![
                ColumnInfo {
                    field: "id".to_string(),
                    column_type: "bigint".to_string(),
                    nullable: false,
                    default: None,
                    is_primary_key: true,
                    ordinal_position: 1,
                },
                ColumnInfo {
                    field: "example_one_string_with_null".to_string(),
                    column_type: "varchar(20)".to_string(),
                    nullable: true,
                    default: None,
                    is_primary_key: false,
                    ordinal_position: 2,
                },
            ],
        );
        let gateway: Arc<dyn Gateway> = fake.clone();
        let mut gateways = HashMap::new();
        gateways.insert("main".to_string(), gateway);

        let summary = reconcile(
            &model,
            &config,
            CasePolicy::Snake,
            &gateways,
            &AcceptAll,
            &NullReporter,
            DropMode::All,
        )
        .await
        .unwrap();

        assert_eq!(summary.tables_created, 0);
        assert_eq!(summary.columns_modified, 1);
        assert_eq!(summary.columns_added, 0);
        assert!(fake.statements.lock().unwrap().iter().any(|s| {
            s == "ALTER TABLE example_entity_one MODIFY COLUMN example_one_string_with_null varchar(50) DEFAULT NULL"
        }));
    }

    /// S4: two relationship roles to the same entity add two relationship
    /// columns and two foreign keys, each under a distinct fresh name.
    #[tokio::test]
    async fn relationship_columns_get_fresh_unique_fk_names() {
        let model = DataModel {
            entities: vec![
                (
                    "exampleEntityOne".to_string(),
                    EntityDefinition {
                        module: "main".to_string(),
                        attributes: vec![],
                        indexes: vec![],
                        relationships: vec![],
                        options: EntityOptions {
                            enforce_locking_constraints: false,
                            is_audit_enabled: false,
                        },
                    },
                ),
                (
                    "exampleEntityTwo".to_string(),
                    EntityDefinition {
                        module: "main".to_string(),
                        attributes: vec![],
                        indexes: vec![],
                        relationships: vec![(
                            "exampleEntityOne".to_string(),
                            vec!["relationshipOne".to_string(), "relationshipTwo".to_string()],
                        )],
                        options: EntityOptions {
                            enforce_locking_constraints: false,
                            is_audit_enabled: false,
                        },
                    },
                ),
            ],
        };
        let config = ConnectionConfig::default();
        let fake = Arc::new(FakeGateway::default());
        let gateway: Arc<dyn Gateway> = fake.clone();
        let mut gateways = HashMap::new();
        gateways.insert("main".to_string(), gateway);

        let summary = reconcile(
            &model,
            &config,
            CasePolicy::Snake,
            &gateways,
            &AcceptAll,
            &NullReporter,
            DropMode::All,
        )
        .await
        .unwrap();

        assert_eq!(summary.tables_created, 2);
        assert_eq!(summary.foreign_keys_created, 2);

        let statements = fake.statements.lock().unwrap();
        let relationship_columns = statements
            .iter()
            .filter(|s| s.contains("ADD COLUMN example_entity_one_relationship_"))
            .count();
        assert_eq!(relationship_columns, 2);

        let fk_names: BTreeSet<&str> = statements
            .iter()
            .filter_map(|s| s.strip_prefix("ALTER TABLE example_entity_two ADD CONSTRAINT "))
            .filter_map(|s| s.split_whitespace().next())
            .collect();
        assert_eq!(fk_names.len(), 2, "each relationship role gets a distinct constraint name");
    }

    /// S5: a second run against an already-converged schema makes no
    /// further changes.
    #[tokio::test]
    async fn second_run_is_idempotent() {
        let model = greenfield_model();
        let config = ConnectionConfig::default();
        let fake = Arc::new(FakeGateway::default());
        let gateway: Arc<dyn Gateway> = fake.clone();
        let mut gateways = HashMap::new();
        gateways.insert("main".to_string(), gateway);

        let first = reconcile(
            &model,
            &config,
            CasePolicy::Snake,
            &gateways,
            &AcceptAll,
            &NullReporter,
            DropMode::All,
        )
        .await
        .unwrap();
        assert_eq!(first.tables_created, 1);

        let second = reconcile(
            &model,
            &config,
            CasePolicy::Snake,
            &gateways,
            &AcceptAll,
            &NullReporter,
            DropMode::All,
        )
        .await
        .unwrap();

        assert_eq!(second.tables_created, 0);
        assert_eq!(second.tables_removed, 0);
        assert_eq!(second.columns_added, 0);
        assert_eq!(second.columns_modified, 0);
        assert_eq!(second.columns_dropped, 0);
        assert_eq!(second.indexes_added, 0);
        assert_eq!(second.indexes_removed, 0);
    }

    /// S6: a module whose default engine isn't InnoDB aborts the whole run
    /// before any DDL is issued anywhere.
    #[tokio::test]
    async fn non_innodb_module_aborts_before_any_ddl() {
        let model = greenfield_model();
        let config = ConnectionConfig::default();
        let mut fake = FakeGateway::default();
        fake.innodb = false;
        let fake = Arc::new(fake);
        let gateway: Arc<dyn Gateway> = fake.clone();
        let mut gateways = HashMap::new();
        gateways.insert("main".to_string(), gateway);

        let err = reconcile(
            &model,
            &config,
            CasePolicy::Snake,
            &gateways,
            &AcceptAll,
            &NullReporter,
            DropMode::All,
        )
        .await
        .unwrap_err();

        match err {
            ReconcileError::Integrity { module, .. } => assert_eq!(module, "main"),
            other => panic!("expected Integrity error, got {other:?}"),
        }
        assert!(fake.statements.lock().unwrap().is_empty());
    }

    #[test]
    fn split_column_type_handles_length_and_bare_types() {
        assert_eq!(
            split_column_type("varchar(50)"),
            ("varchar".to_string(), Some("50".to_string()))
        );
        assert_eq!(split_column_type("datetime"), ("datetime".to_string(), None));
    }

    #[test]
    fn relationship_from_column_round_trips() {
        let entity = EntityDefinition {
            module: "main".to_string(),
            attributes: vec![],
            indexes: vec![],
            relationships: vec![(
                "exampleEntityOne".to_string(),
                vec!["relationshipOne".to_string(), "relationshipTwo".to_string()],
            )],
            options: EntityOptions::default(),
        };
        let col = relationship_column_name("exampleEntityOne", "relationshipOne", CasePolicy::Snake);
        assert_eq!(
            crate::model::relationship_from_column(&entity, &col, CasePolicy::Snake),
            Some("exampleEntityOne".to_string())
        );
        assert_eq!(
            crate::model::relationship_from_column(&entity, "not_a_column", CasePolicy::Snake),
            None
        );
    }
}
