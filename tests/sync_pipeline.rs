use oasa_sync::SyncError;
use oasa_sync::config::SyncConfig;
use oasa_sync::error::StoreOperation;
use oasa_sync::models::{EntityKind, Line, Route, RouteStop, Stop};
use oasa_sync::sync::SyncService;
use oasa_sync::sync::mapper::RecordError;
use oasa_sync::sync::parser::RecordShapeError;
use oasa_sync::sync::run::SyncPhase;
use oasa_sync::sync::store::{EntityTable, SnapshotStore};
use oasa_sync::test_support::{
    MemoryRow, MemoryStore, MemoryStoreError, MemoryTx, StaticSource, StoreCall,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn route_line(route_code: i32) -> String {
    format!(
        r#"{route_code},799, "ΕΛ.ΒΕΝΙΖΕΛΟΥ - ΚΑΙΣΑΡΙΑΝΗ", "EL. VENIZELOU - KAISARIANI",2,9889.61"#
    )
}

fn route_stop_line(index: usize) -> String {
    format!("{},2081,{},{}", 100_000 + index, 10_000 + index, index % 100 + 1)
}

fn existing_routes() -> Vec<Route> {
    vec![
        Route {
            route_code: 1,
            line_code: 1,
            route_descr: "ΠΑΛΙΑ".to_string(),
            route_descr_eng: "PALIA".to_string(),
            route_type: 1,
            route_distance: 10.0,
        },
        Route {
            route_code: 2,
            line_code: 1,
            route_descr: "ΠΑΛΙΑ".to_string(),
            route_descr_eng: "PALIA".to_string(),
            route_type: 2,
            route_distance: 20.0,
        },
    ]
}

/// Memory store that cancels `token` as soon as a batch is inserted.
struct CancelAfterInsert {
    inner: MemoryStore,
    token: CancellationToken,
}

impl SnapshotStore for CancelAfterInsert {
    type Tx = MemoryTx;
    type Error = MemoryStoreError;

    async fn begin(&self) -> Result<MemoryTx, MemoryStoreError> {
        self.inner.begin().await
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), MemoryStoreError> {
        self.inner.commit(tx).await
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<(), MemoryStoreError> {
        self.inner.rollback(tx).await
    }
}

impl<E: MemoryRow> EntityTable<E> for CancelAfterInsert {
    async fn delete_all(&self, tx: &mut MemoryTx) -> Result<u64, MemoryStoreError> {
        EntityTable::<E>::delete_all(&self.inner, tx).await
    }

    async fn insert_array(
        &self,
        tx: &mut MemoryTx,
        batch: &[E],
    ) -> Result<u64, MemoryStoreError> {
        let inserted = EntityTable::<E>::insert_array(&self.inner, tx, batch).await?;
        self.token.cancel();
        Ok(inserted)
    }
}

#[tokio::test]
async fn route_stops_are_replaced_in_bounded_batches() {
    let lines: Vec<String> = (0..2500).map(route_stop_line).collect();
    let source = StaticSource::new().with_text("getRouteStops", lines);
    let store = MemoryStore::new().with_rows(vec![RouteStop {
        route_code: 1,
        stop_code: 1,
        senu: 1,
    }]);
    let service = SyncService::new(store, source, SyncConfig::uniform(1000));

    let report = service.sync_route_stops().await.expect("sync succeeds");

    assert_eq!(report.phase, SyncPhase::Done);
    assert_eq!(report.fetched, 2500);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.inserted, 2500);
    assert_eq!(report.batches, vec![1000, 1000, 500]);

    let rows = service.store().rows::<RouteStop>();
    assert_eq!(rows.len(), 2500);
    assert_eq!(
        rows[0],
        RouteStop {
            route_code: 2081,
            stop_code: 10_000,
            senu: 1,
        }
    );

    let calls = service.store().calls();
    assert_eq!(calls.first(), Some(&StoreCall::Begin));
    assert_eq!(calls[1], StoreCall::Delete(EntityKind::RouteStop));
    assert_eq!(calls.last(), Some(&StoreCall::Commit));
    assert_eq!(
        calls.iter().filter(|call| **call == StoreCall::Commit).count(),
        1
    );
}

#[tokio::test]
async fn lines_are_mapped_from_json_and_projected() {
    let source = StaticSource::new().with_json(
        "webGetLinesWithMLInfo",
        vec![
            json!({
                "ml_code": "9",
                "sdc_code": "54",
                "line_code": "1151",
                "line_id": "021",
                "line_descr": "ΠΛΑΤΕΙΑ ΚΑΝΙΓΓΟΣ - ΓΚΥΖH (ΚΥΚΛΙΚΗ)",
                "line_descr_eng": "PLATEIA KANIGKOS - GKIZI",
                "mld_master": "1"
            }),
            json!({
                "line_code": "1152",
                "line_id": "022",
                "line_descr": null
            }),
        ],
    );
    let service = SyncService::new(MemoryStore::new(), source, SyncConfig::default());

    let report = service.sync_lines().await.expect("sync succeeds");
    assert_eq!(report.batches, vec![2]);

    let lines = service.store().rows::<Line>();
    assert_eq!(lines[0].line_code, 1151);
    assert_eq!(lines[0].line_descr_eng, "PLATEIA KANIGKOS - GKIZI");
    assert_eq!(lines[0].mld_master, 1);
    assert_eq!(
        lines[1],
        Line {
            line_code: 1152,
            line_id: "022".to_string(),
            ..Line::default()
        }
    );
}

#[tokio::test]
async fn short_record_aborts_and_keeps_prior_snapshot() {
    let malformed = " 1754,799, \"ΕΛ.ΒΕΝΙΖΕΛΟΥ\", 2,9889.61";
    let source = StaticSource::new().with_text(
        "getRoutes",
        vec![route_line(10), route_line(11), malformed.to_string()],
    );
    let store = MemoryStore::new().with_rows(existing_routes());
    let service = SyncService::new(store, source, SyncConfig::uniform(1));

    let err = service.sync_routes().await.unwrap_err();

    match err {
        SyncError::Record {
            entity,
            position,
            source: RecordError::Shape(shape),
        } => {
            assert_eq!(entity, EntityKind::Route);
            assert_eq!(position, 3);
            assert_eq!(
                shape,
                RecordShapeError {
                    record: malformed.to_string(),
                    expected: 6,
                    actual: 5,
                }
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(service.store().rows::<Route>(), existing_routes());
    assert_eq!(service.store().calls().last(), Some(&StoreCall::Rollback));
}

#[tokio::test]
async fn failed_insert_rolls_back_the_delete() {
    let lines: Vec<String> = (0..10).map(|code| route_line(100 + code)).collect();
    let source = StaticSource::new().with_text("getRoutes", lines);
    let store = MemoryStore::new()
        .with_rows(existing_routes())
        .fail_on_insert(3);
    let service = SyncService::new(store, source, SyncConfig::uniform(2));

    let err = service.sync_routes().await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Persistence {
            entity: EntityKind::Route,
            operation: StoreOperation::Insert,
            ..
        }
    ));
    assert_eq!(service.store().insert_sizes(EntityKind::Route), vec![2, 2, 2]);
    assert_eq!(service.store().rows::<Route>(), existing_routes());
    assert!(!service.store().calls().contains(&StoreCall::Commit));
}

#[tokio::test]
async fn coercion_failure_names_field_and_position() {
    let source = StaticSource::new().with_text(
        "getStops",
        vec![
            "10001,010001,ΣΤΡΟΦΗ,STROFH,ΟΔΟΣ,ODOS,-1,23.665,37.9986,0,0,|Α,|A",
            "10002,010002,ΣΤΡΟΦΗ,STROFH,ΟΔΟΣ,ODOS,-1,east,37.9986,0,0,|Α,|A",
        ],
    );
    let service = SyncService::new(MemoryStore::new(), source, SyncConfig::default());

    let err = service.sync_stops().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Record {
            entity: EntityKind::Stop,
            position: 2,
            source: RecordError::Field {
                field: "stop_lng",
                ..
            },
        }
    ));
    assert!(service.store().rows::<Stop>().is_empty());
}

#[tokio::test]
async fn fetch_failure_never_opens_a_transaction() {
    let source = StaticSource::new().with_remote_error("getStops", "service unavailable");
    let service = SyncService::new(MemoryStore::new(), source, SyncConfig::default());

    let err = service.sync_stops().await.unwrap_err();

    match err {
        SyncError::Fetch { entity, source } => {
            assert_eq!(entity, EntityKind::Stop);
            assert!(!source.is_transport());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(service.store().calls().is_empty());
}

#[tokio::test]
async fn cancelled_before_start_never_opens_a_transaction() {
    let lines: Vec<String> = (0..5).map(|code| route_line(200 + code)).collect();
    let source = StaticSource::new().with_text("getRoutes", lines);
    let store = MemoryStore::new().with_rows(existing_routes());
    let service = SyncService::new(store, source, SyncConfig::uniform(2));

    service.cancellation_token().cancel();
    let err = service.sync_routes().await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Cancelled {
            entity: EntityKind::Route
        }
    ));
    assert!(service.store().calls().is_empty());
    assert_eq!(service.store().rows::<Route>(), existing_routes());
}

#[tokio::test]
async fn cancellation_while_streaming_rolls_back() {
    let lines: Vec<String> = (0..5).map(|code| route_line(300 + code)).collect();
    let source = StaticSource::new().with_text("getRoutes", lines);
    let token = CancellationToken::new();
    let store = CancelAfterInsert {
        inner: MemoryStore::new().with_rows(existing_routes()),
        token: token.clone(),
    };
    let service = SyncService::new(store, source, SyncConfig::uniform(2))
        .with_cancellation(token);

    let err = service.sync_routes().await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Cancelled {
            entity: EntityKind::Route
        }
    ));
    assert_eq!(
        service.store().inner.calls(),
        vec![
            StoreCall::Begin,
            StoreCall::Delete(EntityKind::Route),
            StoreCall::Insert(EntityKind::Route, 2),
            StoreCall::Rollback,
        ]
    );
    assert_eq!(service.store().inner.rows::<Route>(), existing_routes());
}

#[tokio::test]
async fn commit_failure_leaves_snapshot_untouched() {
    let source = StaticSource::new().with_text("getRoutes", vec![route_line(7)]);
    let store = MemoryStore::new()
        .with_rows(existing_routes())
        .fail_on_commit();
    let service = SyncService::new(store, source, SyncConfig::default());

    let err = service.sync_routes().await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Persistence {
            operation: StoreOperation::Commit,
            ..
        }
    ));
    assert_eq!(service.store().rows::<Route>(), existing_routes());
}

#[tokio::test]
async fn rollback_failure_reports_the_original_error() {
    let source = StaticSource::new().with_text("getRoutes", vec!["not,a,route"]);
    let store = MemoryStore::new().fail_on_rollback();
    let service = SyncService::new(store, source, SyncConfig::default());

    let err = service.sync_routes().await.unwrap_err();
    assert!(matches!(err, SyncError::Record { position: 1, .. }));
}

#[tokio::test]
async fn empty_response_clears_the_snapshot() {
    let source = StaticSource::new().with_text("getRoutes", Vec::<String>::new());
    let store = MemoryStore::new().with_rows(existing_routes());
    let service = SyncService::new(store, source, SyncConfig::default());

    let report = service.sync_routes().await.expect("sync succeeds");

    assert_eq!(report.deleted, 2);
    assert!(report.batches.is_empty());
    assert!(service.store().rows::<Route>().is_empty());
}

#[tokio::test]
async fn sync_all_runs_in_order_and_stops_at_first_failure() {
    let source = StaticSource::new()
        .with_json("webGetLinesWithMLInfo", vec![json!({"line_code": "1"})])
        .with_text("getRoutes", vec![route_line(1)])
        .with_remote_error("getStops", "timeout");
    let service = SyncService::new(MemoryStore::new(), source, SyncConfig::default());

    let err = service.sync_all().await.unwrap_err();

    assert_eq!(err.entity(), EntityKind::Stop);
    assert_eq!(
        service.source().requests(),
        vec!["webGetLinesWithMLInfo", "getRoutes", "getStops"]
    );
    assert_eq!(service.store().rows::<Line>().len(), 1);
    assert_eq!(service.store().rows::<Route>().len(), 1);
    assert!(service.store().rows::<RouteStop>().is_empty());
}

#[tokio::test]
async fn sync_all_reports_every_entity_type() {
    let source = StaticSource::new()
        .with_json("webGetLinesWithMLInfo", vec![json!({"line_code": "1"})])
        .with_text("getRoutes", vec![route_line(1)])
        .with_text(
            "getStops",
            vec!["10001,010001,Α,A,Β,B,-1,23.665,37.9986,0,1,|Γ,|G"],
        )
        .with_text("getRouteStops", vec![route_stop_line(1)]);
    let service = SyncService::new(MemoryStore::new(), source, SyncConfig::default());

    let reports = service.sync_all().await.expect("all runs succeed");

    let entities: Vec<EntityKind> = reports.iter().map(|report| report.entity).collect();
    assert_eq!(entities, EntityKind::ALL.to_vec());
    assert!(reports.iter().all(|report| report.phase == SyncPhase::Done));
    assert_eq!(service.store().rows::<Stop>()[0].stop_amea, 1);
}

#[tokio::test]
async fn undecodable_line_response_is_a_fetch_error() {
    let source = StaticSource::new().with_decode_error("webGetLinesWithMLInfo", "expected value");
    let store = MemoryStore::new().with_rows(vec![Line {
        line_code: 1,
        ..Line::default()
    }]);
    let service = SyncService::new(store, source, SyncConfig::default());

    let err = service.sync_lines().await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Fetch {
            entity: EntityKind::Line,
            ..
        }
    ));
    assert_eq!(service.store().rows::<Line>().len(), 1);
}
