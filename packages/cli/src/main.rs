//! `schema-sync`: reconciles one or more MySQL/MariaDB schemas against a
//! declarative data model.

mod config;
mod interaction;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use schema_sync_core::engine::DropMode;
use schema_sync_core::interaction::{AcceptAll, Answer, Confirm, NullReporter, Reporter};
use schema_sync_core::{CasePolicy, ConnectionConfig, ReconcileError};
use schema_sync_db::{Gateway, MySqlGateway};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlSslMode};

#[derive(Parser, Debug)]
#[command(name = "schema-sync", version, about = "Reconcile MySQL/MariaDB schemas against a data model")]
struct Args {
    /// Path to the data model JSON document.
    #[arg(long)]
    data_model: PathBuf,

    /// Path to the connection configuration JSON document.
    #[arg(long)]
    db_config: PathBuf,

    /// Identifier case: `snake`, `pascal`, or `camel`.
    #[arg(long, default_value = "snake")]
    case: String,

    /// Answer every orphan-table prompt with "all" instead of asking
    /// interactively.
    #[arg(long)]
    yes: bool,
}

async fn connect_gateways(
    config: &ConnectionConfig,
) -> Result<HashMap<String, Arc<dyn Gateway>>, ReconcileError> {
    let mut gateways: HashMap<String, Arc<dyn Gateway>> = HashMap::new();

    for mapping in &config.module_schema_mapping {
        if gateways.contains_key(&mapping.module_name) {
            continue;
        }

        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&mapping.schema_name);

        if let Some(tls) = &config.ssl {
            options = options.ssl_mode(MySqlSslMode::Required);
            if let Some(ca) = &tls.ca {
                options = options.ssl_ca(ca);
            }
            if let Some(cert) = &tls.cert {
                options = options.ssl_client_cert(cert);
            }
            if let Some(key) = &tls.key {
                options = options.ssl_client_key(key);
            }
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|source| ReconcileError::Connect {
                module: mapping.module_name.clone(),
                source: schema_sync_db::GatewayError::Connect {
                    schema: mapping.schema_name.clone(),
                    source,
                },
            })?;

        let gateway = MySqlGateway::connect(&pool, &mapping.schema_name)
            .await
            .map_err(|source| ReconcileError::Connect {
                module: mapping.module_name.clone(),
                source,
            })?;

        gateways.insert(mapping.module_name.clone(), Arc::new(gateway));
    }

    Ok(gateways)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("schema-sync: {err}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(args: Args) -> Result<(), ReconcileError> {
    let policy = CasePolicy::parse(&args.case)
        .ok_or_else(|| ReconcileError::Config(format!("unknown case policy '{}'", args.case)))?;

    let model = config::load_data_model(&args.data_model).await?;
    let db_config = config::load_connection_config(&args.db_config).await?;
    schema_sync_core::validate::validate_module_references(&model, &db_config)?;

    let gateways = connect_gateways(&db_config).await?;

    let drop_mode = if args.yes { DropMode::All } else { DropMode::List };

    let terminal_confirm = interaction::TerminalConfirm;
    let terminal_reporter = interaction::TerminalReporter;
    let (confirm, reporter): (&dyn Confirm, &dyn Reporter) = if args.yes {
        (&AcceptAll, &NullReporter)
    } else {
        (&terminal_confirm, &terminal_reporter)
    };

    if !args.yes {
        match confirm.confirm("Ready to proceed? y/n").await {
            Answer::Yes | Answer::All => {}
            _ => return Err(ReconcileError::UserCancel),
        }
    }

    let summary = schema_sync_core::reconcile(
        &model, &db_config, policy, &gateways, confirm, reporter, drop_mode,
    )
    .await?;

    log::info!(
        "reconciliation complete: {} table(s) created, {} removed, {} column(s) added, \
         {} modified, {} dropped, {} index(es) added, {} removed, {} foreign key(s) \
         dropped, {} created",
        summary.tables_created,
        summary.tables_removed,
        summary.columns_added,
        summary.columns_modified,
        summary.columns_dropped,
        summary.indexes_added,
        summary.indexes_removed,
        summary.foreign_keys_dropped,
        summary.foreign_keys_created,
    );

    Ok(())
}
