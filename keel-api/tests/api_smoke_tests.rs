//! End-to-end tests for the REST API over the in-memory store.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use keel_api::AccessLevel;
use keel_core::TenantId;
use keel_llm::ProviderRegistry;
use serde_json::json;

#[path = "support/app.rs"]
mod app_support;
use app_support::{id_of, read, send, test_app, TEST_API_KEY};

fn app() -> axum::Router {
    test_app(ProviderRegistry::new(), AccessLevel::Write)
}

#[tokio::test]
async fn product_tree_crud_and_cascade() {
    let app = app();
    let tenant = TenantId::now_v7();

    let (status, product) = send(
        &app,
        tenant,
        Method::POST,
        "/api/v1/products",
        Some(json!({"name": "  Atlas  ", "description": "Planning"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(product["name"], "Atlas");
    let product_id = id_of(&product, "product_id");

    let (status, interface) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/products/{}/interfaces", product_id),
        Some(json!({"name": "Web"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let interface_id = id_of(&interface, "interface_id");

    let (status, feature) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/interfaces/{}/features", interface_id),
        Some(json!({"name": "SSO", "priority": "high"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(feature["priority"], "high");
    assert_eq!(feature["status"], "planned");
    let feature_id = id_of(&feature, "feature_id");

    let (status, requirement) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/features/{}/requirements", feature_id),
        Some(json!({
            "name": "SAML",
            "acceptance_criteria": ["  works with Okta ", "", "works with Okta"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let requirement_id = id_of(&requirement, "requirement_id");

    let (status, _) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/features/{}/releases", feature_id),
        Some(json!({"name": "v1", "target_date": "2026-12-01"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, updated) = send(
        &app,
        tenant,
        Method::PATCH,
        &format!("/api/v1/requirements/{}", requirement_id),
        Some(json!({"status": "approved", "owner": "pm@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "approved");
    assert_eq!(updated["owner"], "pm@example.com");

    let (status, listed) = send(&app, tenant, Method::GET, "/api/v1/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["total"], 1);

    let (status, deleted) = send(
        &app,
        tenant,
        Method::DELETE,
        &format!("/api/v1/products/{}", product_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // product + interface + feature + requirement + release
    assert_eq!(deleted["deleted"], 5);

    let (status, body) = send(
        &app,
        tenant,
        Method::GET,
        &format!("/api/v1/features/{}", feature_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ENTITY_NOT_FOUND");
}

#[tokio::test]
async fn create_rejects_blank_name() {
    let app = app();
    let (status, body) = send(
        &app,
        TenantId::now_v7(),
        Method::POST,
        "/api/v1/products",
        Some(json!({"name": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap_or_default().contains("name"));
}

#[tokio::test]
async fn child_of_missing_parent_is_not_found() {
    let app = app();
    let (status, _) = send(
        &app,
        TenantId::now_v7(),
        Method::POST,
        &format!("/api/v1/products/{}/interfaces", TenantId::now_v7()),
        Some(json!({"name": "Orphan"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn single_default_roadmap() {
    let app = app();
    let tenant = TenantId::now_v7();

    let (_, first) = send(
        &app,
        tenant,
        Method::POST,
        "/api/v1/roadmaps",
        Some(json!({"name": "2026", "is_default": true})),
    )
    .await;
    let (_, second) = send(
        &app,
        tenant,
        Method::POST,
        "/api/v1/roadmaps",
        Some(json!({"name": "2027"})),
    )
    .await;
    let second_id = id_of(&second, "roadmap_id");

    let (status, current) = send(&app, tenant, Method::GET, "/api/v1/roadmaps/default", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["roadmap_id"], first["roadmap_id"]);

    let (status, promoted) = send(
        &app,
        tenant,
        Method::PUT,
        &format!("/api/v1/roadmaps/{}/default", second_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(promoted["is_default"], true);

    let (_, all) = send(&app, tenant, Method::GET, "/api/v1/roadmaps", None).await;
    let defaults = all["items"]
        .as_array()
        .map(|items| items.iter().filter(|r| r["is_default"] == true).count())
        .unwrap_or(0);
    assert_eq!(defaults, 1);
}

#[tokio::test]
async fn deleting_roadmap_detaches_releases() {
    let app = app();
    let tenant = TenantId::now_v7();

    let (_, product) = send(&app, tenant, Method::POST, "/api/v1/products", Some(json!({"name": "P"}))).await;
    let (_, interface) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/products/{}/interfaces", id_of(&product, "product_id")),
        Some(json!({"name": "I"})),
    )
    .await;
    let (_, feature) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/interfaces/{}/features", id_of(&interface, "interface_id")),
        Some(json!({"name": "F"})),
    )
    .await;
    let (_, roadmap) = send(&app, tenant, Method::POST, "/api/v1/roadmaps", Some(json!({"name": "R"}))).await;
    let roadmap_id = id_of(&roadmap, "roadmap_id");

    let (status, release) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/features/{}/releases", id_of(&feature, "feature_id")),
        Some(json!({"name": "v1", "roadmap_id": roadmap_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let release_id = id_of(&release, "release_id");

    let (_, on_roadmap) = send(
        &app,
        tenant,
        Method::GET,
        &format!("/api/v1/roadmaps/{}/releases", roadmap_id),
        None,
    )
    .await;
    assert_eq!(on_roadmap["total"], 1);

    let (status, deleted) = send(
        &app,
        tenant,
        Method::DELETE,
        &format!("/api/v1/roadmaps/{}", roadmap_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["detached"], 1);

    let (status, release) = send(
        &app,
        tenant,
        Method::GET,
        &format!("/api/v1/releases/{}", release_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(release.get("roadmap_id").map_or(true, |v| v.is_null()));
}

#[tokio::test]
async fn page_tree_nesting_and_moves() {
    let app = app();
    let tenant = TenantId::now_v7();

    let (status, project) = send(
        &app,
        tenant,
        Method::POST,
        "/api/v1/pages",
        Some(json!({"page_type": "project", "title": "Atlas"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let project_id = id_of(&project, "page_id");

    let mut docs = Vec::new();
    for title in ["Launch plan", "Notes dump", "FAQ"] {
        let (status, doc) = send(
            &app,
            tenant,
            Method::POST,
            "/api/v1/pages",
            Some(json!({"page_type": "document", "title": title, "parent_id": project_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        docs.push(id_of(&doc, "page_id"));
    }

    // Notes cannot be roots, and nothing nests under a note.
    let (status, _) = send(
        &app,
        tenant,
        Method::POST,
        "/api/v1/pages",
        Some(json!({"page_type": "note", "title": "loose"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A page cannot move under its own descendant.
    let (status, body) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/pages/{}/move", project_id),
        Some(json!({"parent_id": docs[0]})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "TREE_CONFLICT");

    // Move the last document to the front.
    let (status, moved) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/pages/{}/move", docs[2]),
        Some(json!({"parent_id": project_id, "position": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["position"], 0);

    let (status, children) = send(
        &app,
        tenant,
        Method::GET,
        &format!("/api/v1/pages/{}/children", project_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let order: Vec<String> = children
        .as_array()
        .map(|c| c.iter().map(|p| id_of(p, "page_id")).collect())
        .unwrap_or_default();
    assert_eq!(order, vec![docs[2].clone(), docs[0].clone(), docs[1].clone()]);
    let positions: Vec<u64> = children
        .as_array()
        .map(|c| c.iter().filter_map(|p| p["position"].as_u64()).collect())
        .unwrap_or_default();
    assert_eq!(positions, vec![0, 1, 2]);

    let (status, ancestors) = send(
        &app,
        tenant,
        Method::GET,
        &format!("/api/v1/pages/{}/ancestors", docs[0]),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ancestors[0]["page_id"], project["page_id"]);

    let (status, tree) = send(&app, tenant, Method::GET, "/api/v1/pages/tree", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree.as_array().map(Vec::len), Some(1));
    assert_eq!(tree[0]["children"].as_array().map(Vec::len), Some(3));

    let (status, deleted) = send(
        &app,
        tenant,
        Method::DELETE,
        &format!("/api/v1/pages/{}", project_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], 4);
}

#[tokio::test]
async fn page_move_without_parent_keeps_parent() {
    let app = app();
    let tenant = TenantId::now_v7();

    let (_, project) = send(
        &app,
        tenant,
        Method::POST,
        "/api/v1/pages",
        Some(json!({"page_type": "project", "title": "Atlas"})),
    )
    .await;
    let project_id = id_of(&project, "page_id");

    let mut notes = Vec::new();
    for title in ["first", "second", "third"] {
        let (status, note) = send(
            &app,
            tenant,
            Method::POST,
            "/api/v1/pages",
            Some(json!({"page_type": "note", "title": title, "parent_id": project_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        notes.push(id_of(&note, "page_id"));
    }

    // Only a position: reorder in place. Notes cannot be roots, so a
    // re-parent to the top level would be a conflict.
    let (status, moved) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/pages/{}/move", notes[2]),
        Some(json!({"position": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["parent_id"], project["page_id"]);
    assert_eq!(moved["position"], 0);

    // An explicit null still means the top level.
    let (status, body) = send(
        &app,
        tenant,
        Method::POST,
        &format!("/api/v1/pages/{}/move", notes[0]),
        Some(json!({"parent_id": null})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "TREE_CONFLICT");

    // Deleting the front note shifts the other two.
    let (status, deleted) = send(
        &app,
        tenant,
        Method::DELETE,
        &format!("/api/v1/pages/{}", notes[2]),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], 1);
    assert_eq!(deleted["renumbered"], 2);
    assert_eq!(deleted["detached"], 0);
}

#[tokio::test]
async fn api_requires_credentials() {
    let app = app();

    let request = Request::builder()
        .uri("/api/v1/products")
        .body(Body::empty())
        .expect("request");
    let (status, body) = read(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let request = Request::builder()
        .uri("/api/v1/products")
        .header("x-api-key", "wrong")
        .header("x-tenant-id", TenantId::now_v7().to_string())
        .body(Body::empty())
        .expect("request");
    let (status, _) = read(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/v1/products")
        .header("x-api-key", TEST_API_KEY)
        .body(Body::empty())
        .expect("request");
    let (status, _) = read(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn public_endpoints_need_no_auth() {
    let app = app();

    let request = Request::builder()
        .uri("/health/ready")
        .body(Body::empty())
        .expect("request");
    let (status, body) = read(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let request = Request::builder()
        .uri("/openapi.json")
        .body(Body::empty())
        .expect("request");
    let (status, body) = read(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/api/v1/pages/{id}/move").is_some());
}
