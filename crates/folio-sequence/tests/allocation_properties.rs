//! End-to-end allocation behaviour over the in-memory backend: ordering,
//! concurrency, scope independence, tenant isolation, gaps and rollback.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use folio_core::{ScopeId, TenantId};
use folio_sequence::{
    CatalogItemCodes, CatalogItemScope, EntityRecordCodes, EntityRecordScope,
    CounterStore, InventoryMovementCodes, InventoryMovementScope, MemoryCounterStore,
    MemoryDatabase, ScopeKey, ScopeKind, Transactional,
};
use proptest::prelude::*;
use tokio::sync::oneshot;

fn ids(raw: &[i64]) -> Vec<ScopeId> {
    raw.iter()
        .map(|&id| ScopeId::new("id", id).unwrap())
        .collect()
}

fn tenant(id: i64) -> TenantId {
    TenantId::new(id).unwrap()
}

fn register<K: ScopeKey>(db: &MemoryDatabase, scope: &K) {
    assert!(db.register_parent(K::KIND, &scope.parent_ids(), scope.tenant_id(), true));
}

#[tokio::test]
async fn sequential_calls_yield_one_through_n() {
    let db = MemoryDatabase::new();
    register(&db, &CatalogItemScope::new(7, 3, 9).unwrap());
    let codes = CatalogItemCodes::in_memory(&db);

    let mut issued = Vec::new();
    for _ in 0..25 {
        issued.push(codes.allocate_next_code(7, 3, 9).await.unwrap());
    }
    assert_eq!(issued, (1..=25).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_issue_each_code_once() {
    let db = MemoryDatabase::new();
    register(&db, &InventoryMovementScope::new(7, 11).unwrap());
    let codes = Arc::new(InventoryMovementCodes::in_memory(&db));

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let codes = Arc::clone(&codes);
            tokio::spawn(async move { codes.allocate_next_code(7, 11).await })
        })
        .collect();

    let mut issued = BTreeSet::new();
    for handle in handles {
        let code = handle.await.unwrap().unwrap();
        assert!(issued.insert(code), "code {code} issued twice");
    }
    assert_eq!(issued, (1..=64).collect::<BTreeSet<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_first_allocations_create_one_row() {
    let db = MemoryDatabase::new();
    let scope = EntityRecordScope::new(7, 21).unwrap();
    register(&db, &scope);
    let codes = Arc::new(EntityRecordCodes::in_memory(&db));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let codes = Arc::clone(&codes);
            tokio::spawn(async move { codes.allocate(&scope).await })
        })
        .collect();

    let mut issued = BTreeSet::new();
    for handle in handles {
        issued.insert(handle.await.unwrap().unwrap());
    }
    assert_eq!(issued, (1..=16).collect::<BTreeSet<_>>());
    assert_eq!(db.counter_rows(ScopeKind::EntityRecord), 1);
    assert_eq!(db.counter_value(&scope), Some(Some(17)));
}

#[tokio::test]
async fn scopes_count_independently() {
    let db = MemoryDatabase::new();
    let a = CatalogItemScope::new(7, 3, 9).unwrap();
    let b = CatalogItemScope::new(7, 3, 10).unwrap();
    register(&db, &a);
    register(&db, &b);
    let codes = CatalogItemCodes::in_memory(&db);

    assert_eq!(codes.allocate(&a).await.unwrap(), 1);
    assert_eq!(codes.allocate(&a).await.unwrap(), 2);
    assert_eq!(codes.allocate(&b).await.unwrap(), 1);
    assert_eq!(codes.allocate(&a).await.unwrap(), 3);
    assert_eq!(codes.allocate(&b).await.unwrap(), 2);
}

#[tokio::test]
async fn kinds_sharing_parent_ids_count_independently() {
    let db = MemoryDatabase::new();
    let movement = InventoryMovementScope::new(7, 5).unwrap();
    let record = EntityRecordScope::new(7, 5).unwrap();
    register(&db, &movement);
    register(&db, &record);

    let movements = InventoryMovementCodes::in_memory(&db);
    let records = EntityRecordCodes::in_memory(&db);

    assert_eq!(movements.allocate(&movement).await.unwrap(), 1);
    assert_eq!(movements.allocate(&movement).await.unwrap(), 2);
    assert_eq!(records.allocate(&record).await.unwrap(), 1);
}

#[tokio::test]
async fn foreign_tenant_is_refused_without_touching_counters() {
    let db = MemoryDatabase::new();
    db.register_parent(ScopeKind::CatalogItem, &ids(&[3, 9]), tenant(7), true);
    db.register_parent(ScopeKind::CatalogItem, &ids(&[3, 10]), tenant(7), true);
    let codes = CatalogItemCodes::in_memory(&db);

    assert_eq!(codes.allocate_next_code(7, 3, 9).await.unwrap(), 1);
    assert_eq!(codes.allocate_next_code(7, 3, 9).await.unwrap(), 2);
    assert_eq!(codes.allocate_next_code(7, 3, 10).await.unwrap(), 1);

    let err = codes.allocate_next_code(8, 3, 9).await.unwrap_err();
    assert!(err.is_invalid_scope());
    // The rejection does not disclose who owns the scope.
    assert!(!err.to_string().contains("tenant:7"));

    assert_eq!(codes.allocate_next_code(7, 3, 9).await.unwrap(), 3);
    assert_eq!(
        db.counter_value(&CatalogItemScope::new(8, 3, 9).unwrap()),
        None
    );
}

#[tokio::test]
async fn unknown_scope_is_refused() {
    let db = MemoryDatabase::new();
    let codes = EntityRecordCodes::in_memory(&db);
    let err = codes.allocate_next_code(7, 404).await.unwrap_err();
    assert!(err.is_invalid_scope());
    assert_eq!(db.counter_rows(ScopeKind::EntityRecord), 0);
}

#[tokio::test]
async fn deactivated_scope_stops_issuing_and_resumes_after_reactivation() {
    let db = MemoryDatabase::new();
    let scope = InventoryMovementScope::new(7, 11).unwrap();
    register(&db, &scope);
    let codes = InventoryMovementCodes::in_memory(&db);

    assert_eq!(codes.allocate(&scope).await.unwrap(), 1);
    assert_eq!(codes.allocate(&scope).await.unwrap(), 2);

    assert!(db.set_parent_active(
        ScopeKind::InventoryMovement,
        &scope.parent_ids(),
        scope.tenant_id(),
        false
    ));
    assert!(codes.allocate(&scope).await.unwrap_err().is_invalid_scope());
    assert_eq!(db.counter_value(&scope), Some(Some(3)));

    db.set_parent_active(
        ScopeKind::InventoryMovement,
        &scope.parent_ids(),
        scope.tenant_id(),
        true,
    );
    assert_eq!(codes.allocate(&scope).await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn code_lost_by_cancelled_caller_is_never_reissued() {
    let db = MemoryDatabase::new();
    let scope = CatalogItemScope::new(7, 3, 9).unwrap();
    register(&db, &scope);
    let codes = CatalogItemCodes::in_memory(&db);
    assert_eq!(codes.allocate(&scope).await.unwrap(), 1);

    // The caller receives its code, then dies before writing its record.
    let (sent, received) = oneshot::channel();
    let caller = {
        let codes = codes.clone();
        let scope = scope.clone();
        tokio::spawn(async move {
            let code = codes.allocate(&scope).await.unwrap();
            sent.send(code).unwrap();
            std::future::pending::<()>().await;
        })
    };
    let lost = received.await.unwrap();
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());
    assert_eq!(lost, 2);

    // The allocation was already committed when the caller saw it.
    assert_eq!(db.counter_value(&scope), Some(Some(lost + 1)));
    let next = codes.allocate(&scope).await.unwrap();
    assert!(next > lost);
    assert_eq!(next, 3);
}

#[tokio::test]
async fn uncommitted_increment_is_reissued_after_rollback() {
    let db = MemoryDatabase::new();
    let scope = CatalogItemScope::new(7, 3, 9).unwrap();
    register(&db, &scope);
    let codes = CatalogItemCodes::in_memory(&db);
    assert_eq!(codes.allocate(&scope).await.unwrap(), 1);

    // A transaction takes the row and stages the increment for code 2.
    let mut holder = db.begin().await.unwrap();
    let mut row = MemoryCounterStore
        .fetch_for_update(&mut holder, &scope)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.next_value, Some(2));
    row.next_value = Some(3);
    MemoryCounterStore.save(&mut holder, &row).await.unwrap();

    // A concurrent allocation blocks on the row lock and is abandoned.
    let waiter = tokio::time::timeout(Duration::from_millis(50), codes.allocate(&scope)).await;
    assert!(waiter.is_err(), "allocation should wait for the row lock");

    db.rollback(holder).await.unwrap();
    assert_eq!(db.counter_value(&scope), Some(Some(2)));

    // Nothing was committed, so code 2 is still available.
    assert_eq!(codes.allocate(&scope).await.unwrap(), 2);
    assert_eq!(codes.allocate(&scope).await.unwrap(), 3);
}

#[tokio::test]
async fn legacy_rows_are_normalised() {
    let db = MemoryDatabase::new();
    let scope = EntityRecordScope::new(7, 21).unwrap();
    register(&db, &scope);
    db.seed_counter(&scope, None);
    let codes = EntityRecordCodes::in_memory(&db);

    assert_eq!(codes.allocate(&scope).await.unwrap(), 1);
    assert_eq!(codes.allocate(&scope).await.unwrap(), 2);
}

#[tokio::test]
async fn existing_counter_continues_from_stored_value() {
    let db = MemoryDatabase::new();
    let scope = CatalogItemScope::new(7, 3, 9).unwrap();
    register(&db, &scope);
    db.seed_counter(&scope, Some(500));
    let codes = CatalogItemCodes::in_memory(&db);

    assert_eq!(codes.allocate(&scope).await.unwrap(), 500);
    assert_eq!(db.counter_value(&scope), Some(Some(501)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn interleaved_scopes_each_see_consecutive_codes(
        picks in proptest::collection::vec(0usize..3, 1..60)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let db = MemoryDatabase::new();
            let scopes = [
                CatalogItemScope::new(7, 3, 9).unwrap(),
                CatalogItemScope::new(7, 3, 10).unwrap(),
                CatalogItemScope::new(8, 4, 9).unwrap(),
            ];
            for s in &scopes {
                register(&db, s);
            }
            let codes = CatalogItemCodes::in_memory(&db);

            let mut expected = [1i64; 3];
            for pick in picks {
                let code = codes.allocate(&scopes[pick]).await.unwrap();
                assert_eq!(code, expected[pick]);
                expected[pick] += 1;
            }
        });
    }
}
