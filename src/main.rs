use clap::Parser;
use oasa_sync::api::OasaClient;
use oasa_sync::config::{ClientConfig, DatabaseConfig, SyncConfig};
use oasa_sync::models::EntityKind;
use oasa_sync::sync::database::{PgStore, PgTuning, run_migrations};
use oasa_sync::sync::run::SyncReport;
use oasa_sync::{SyncError, SyncService, db, init_logger};
use sqlx::PgPool;

type Service = SyncService<PgStore, OasaClient>;

#[derive(Parser, Debug)]
#[command(
    name = "oasa-sync",
    about = "Replace the local OASA reference-data snapshot with fresh telematics data"
)]
struct Args {
    /// Entity types to sync: lines, routes, stops, route-stops. Defaults to all four.
    entities: Vec<EntityKind>,

    /// Run the selected entity types concurrently instead of in order.
    #[arg(long)]
    concurrent: bool,

    /// Do not apply pending database migrations before syncing.
    #[arg(long)]
    skip_migrations: bool,

    /// Database connection string; overrides `DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,
}

impl Args {
    /// Selected entity types in canonical order, without duplicates.
    fn kinds(&self) -> Vec<EntityKind> {
        if self.entities.is_empty() {
            return EntityKind::ALL.to_vec();
        }

        EntityKind::ALL
            .into_iter()
            .filter(|kind| self.entities.contains(kind))
            .collect()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();

    let args = Args::parse();
    let kinds = args.kinds();

    let database = match args.database_url.clone() {
        Some(url) => DatabaseConfig::with_url(url)?,
        None => DatabaseConfig::from_env()?,
    };
    let pool = db::connect(&database).await?;

    if !args.skip_migrations {
        run_migrations(&pool).await?;
    }

    let sync_config = SyncConfig::from_env();
    let store = PgStore::new(pool.clone()).with_bulk_tuning(sync_config.bulk_tuning);
    let client = OasaClient::new(ClientConfig::from_env())?;
    let service = SyncService::new(store, client, sync_config);

    let token = service.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received, cancelling sync");
            token.cancel();
        }
    });

    let results = if args.concurrent {
        run_concurrent(&service, &kinds).await
    } else {
        run_in_order(&service, &kinds).await
    };

    let mut failures = 0;
    for result in results {
        match result {
            Ok(report) => {
                println!("{}", serde_json::to_string(&report)?);
                analyze(&pool, &report).await;
            }
            Err(err) => {
                failures += 1;
                log::error!("{}", err);
            }
        }
    }

    pool.close().await;

    if failures > 0 {
        log::error!("{} of {} sync runs failed", failures, kinds.len());
        std::process::exit(1);
    }

    Ok(())
}

/// Sync `kinds` one after another, stopping at the first failure.
async fn run_in_order(
    service: &Service,
    kinds: &[EntityKind],
) -> Vec<Result<SyncReport, SyncError>> {
    let mut results = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let result = service.sync(*kind).await;
        let failed = result.is_err();
        results.push(result);
        if failed {
            break;
        }
    }
    results
}

/// Sync `kinds` concurrently on the current task; each run keeps its own transaction.
async fn run_concurrent(
    service: &Service,
    kinds: &[EntityKind],
) -> Vec<Result<SyncReport, SyncError>> {
    let run = move |kind: EntityKind| async move {
        if kinds.contains(&kind) {
            Some(service.sync(kind).await)
        } else {
            None
        }
    };

    let (lines, routes, stops, route_stops) = tokio::join!(
        run(EntityKind::Line),
        run(EntityKind::Route),
        run(EntityKind::Stop),
        run(EntityKind::RouteStop),
    );

    [lines, routes, stops, route_stops]
        .into_iter()
        .flatten()
        .collect()
}

async fn analyze(pool: &PgPool, report: &SyncReport) {
    let table = report.entity.table_name();
    if let Err(err) = PgTuning::analyze_tables(pool, &[table]).await {
        log::warn!("ANALYZE {} failed: {}", table, err);
    }
}
