//! PostgreSQL record store tests.
//!
//! Need a reachable database configured through `KEEL_DB_*`:
//! `cargo test -p keel-api --features db-tests --test pg_store_tests`

#![cfg(feature = "db-tests")]

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use keel_api::{AccessLevel, ApiResult, DbConfig, PgRecordStore};
use keel_core::{Page, PageType, Product, RecordKind, TenantId};
use keel_llm::ProviderRegistry;
use keel_storage::{RecordQuery, RecordStore, RecordStoreExt};
use keel_test_utils::fixtures;
use serde_json::json;

#[path = "support/app.rs"]
mod app_support;
use app_support::{id_of, send, test_app_with_store};

async fn test_store() -> ApiResult<PgRecordStore> {
    let store = PgRecordStore::from_config(&DbConfig::from_env())?;
    store.migrate().await?;
    Ok(store)
}

#[tokio::test]
async fn pg_roundtrip_and_tenant_scoping() -> ApiResult<()> {
    let store = test_store().await?;
    store.ping().await?;

    let tenant = fixtures::tenant();
    let product = fixtures::product(tenant);
    store.insert_record(&product).await?;

    let loaded: Option<Product> = store.get_record(tenant, product.product_id.as_uuid()).await?;
    assert_eq!(loaded.map(|p| p.name), Some(product.name.clone()));

    let other: Option<Product> = store
        .get_record(TenantId::now_v7(), product.product_id.as_uuid())
        .await?;
    assert!(other.is_none());
    assert!(
        !store
            .delete(RecordKind::Product, TenantId::now_v7(), product.product_id.as_uuid())
            .await?
    );

    let mut renamed = product.clone();
    renamed.name = "Renamed".to_string();
    assert!(store.update_record(&renamed).await?);

    let listed: Vec<Product> = store.list_records(tenant, &RecordQuery::all()).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Renamed");

    assert!(store.delete_record::<Product>(tenant, product.product_id.as_uuid()).await?);
    Ok(())
}

#[tokio::test]
async fn pg_children_are_ordered_and_counted() -> ApiResult<()> {
    let store = test_store().await?;
    let tenant = fixtures::tenant();

    let root = fixtures::page(tenant, PageType::Project, None, 0);
    store.insert_record(&root).await?;
    for position in 0..3 {
        let child = fixtures::page(tenant, PageType::Document, Some(root.page_id), position);
        store.insert_record(&child).await?;
    }

    let query = RecordQuery::children_of(root.page_id.as_uuid());
    assert_eq!(store.count(RecordKind::Page, tenant, &query).await?, 3);

    let page: Vec<Page> = store
        .list_records(tenant, &query.clone().with_limit(2).with_offset(1))
        .await?;
    assert_eq!(page.len(), 2);
    assert!(page[0].created_at <= page[1].created_at);
    Ok(())
}

#[tokio::test]
async fn pg_backed_api_cascade() -> ApiResult<()> {
    let store: Arc<dyn RecordStore> = Arc::new(test_store().await?);
    let app = test_app_with_store(store, ProviderRegistry::new(), AccessLevel::Write);
    let tenant = TenantId::now_v7();

    let (status, product) = send(&app, tenant, Method::POST, "/api/v1/products", Some(json!({"name": "PG"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let product_id = id_of(&product, "product_id");
    let (status, _) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/products/{}/interfaces", product_id),
        Some(json!({"name": "API"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, deleted) = send(&app, tenant, Method::DELETE, &format!("/api/v1/products/{}", product_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], 2);
    Ok(())
}
