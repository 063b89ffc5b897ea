//! Agent Operations
//!
//! [`AgentDispatcher::call`] runs one function call from the model: lookup,
//! access check, argument parsing, schema validation, typed deserialization,
//! the delete confirmation gate and finally the service call.

use std::sync::Arc;
use std::time::Instant;

use keel_core::{FeatureId, InterfaceId, PageId, ProductId, ReleaseId, RequirementId, RoadmapId, TenantId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use super::{AccessLevel, AgentError, ToolCatalog};
use crate::services::Services;
use crate::telemetry::metrics;
use crate::types::{
    CreateFeatureRequest, CreateInterfaceRequest, CreatePageRequest, CreateProductRequest,
    CreateReleaseRequest, CreateRequirementRequest, CreateRoadmapRequest, ListParams,
    MovePageRequest, UpdateFeatureRequest, UpdateInterfaceRequest, UpdatePageRequest,
    UpdateProductRequest, UpdateReleaseRequest, UpdateRequirementRequest,
};

/// Metric label for names not in the catalog.
pub const UNKNOWN_FUNCTION_LABEL: &str = "unknown";

/// Summary of one agent function call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentCallRecord {
    pub name: String,
    pub ok: bool,
    pub duration_ms: u64,
    /// Agent error code when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// Result of [`AgentDispatcher::call`].
#[derive(Debug, Clone)]
pub struct AgentCallOutcome {
    pub record: AgentCallRecord,
    pub result: Result<JsonValue, AgentError>,
}

impl AgentCallOutcome {
    /// Tool result payload: `{"ok":true,"data":..}` or `{"ok":false,"error":{..}}`.
    pub fn render(&self) -> JsonValue {
        match &self.result {
            Ok(data) => json!({ "ok": true, "data": data }),
            Err(err) => json!({ "ok": false, "error": err.to_json() }),
        }
    }
}

/// Routes model function calls to the service layer under an access policy.
#[derive(Clone)]
pub struct AgentDispatcher {
    services: Services,
    catalog: Arc<ToolCatalog>,
    access: AccessLevel,
}

impl AgentDispatcher {
    pub fn new(services: Services, catalog: Arc<ToolCatalog>, access: AccessLevel) -> Self {
        Self {
            services,
            catalog,
            access,
        }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn access(&self) -> AccessLevel {
        self.access
    }

    /// Run one function call. Never fails: errors are part of the outcome.
    ///
    /// `arguments` is either the raw JSON string produced by the model or an
    /// already parsed object.
    pub async fn call(&self, tenant_id: TenantId, name: &str, arguments: &JsonValue) -> AgentCallOutcome {
        let start = Instant::now();
        let result = self.dispatch(tenant_id, name, arguments).await;
        let elapsed = start.elapsed();

        let error_code = result.as_ref().err().map(|e| e.code().to_string());
        let outcome = error_code.as_deref().unwrap_or("ok");
        if let Some(m) = metrics() {
            m.record_agent_call(self.metric_label(name), outcome, elapsed.as_secs_f64());
        }
        match &result {
            Ok(_) => tracing::info!(
                %tenant_id,
                function = name,
                duration_ms = elapsed.as_millis() as u64,
                "Agent call succeeded"
            ),
            Err(err) => tracing::warn!(
                %tenant_id,
                function = name,
                code = err.code(),
                error = %err,
                duration_ms = elapsed.as_millis() as u64,
                "Agent call failed"
            ),
        }

        AgentCallOutcome {
            record: AgentCallRecord {
                name: name.to_string(),
                ok: result.is_ok(),
                duration_ms: elapsed.as_millis() as u64,
                error_code,
            },
            result,
        }
    }

    /// Catalog names label themselves; anything else shares one series.
    fn metric_label<'a>(&self, name: &'a str) -> &'a str {
        if self.catalog.get(name).is_some() {
            name
        } else {
            UNKNOWN_FUNCTION_LABEL
        }
    }

    async fn dispatch(
        &self,
        tenant_id: TenantId,
        name: &str,
        arguments: &JsonValue,
    ) -> Result<JsonValue, AgentError> {
        let tool = self
            .catalog
            .get(name)
            .ok_or_else(|| AgentError::UnknownFunction {
                name: name.to_string(),
            })?;
        if !self.access.allows(tool.access) {
            return Err(AgentError::AccessDenied {
                name: name.to_string(),
                required: tool.access,
                allowed: self.access,
            });
        }

        let args = parse_arguments(arguments)?;
        self.catalog.validate(name, &args)?;
        self.execute(tenant_id, name, args).await
    }

    async fn execute(
        &self,
        tenant: TenantId,
        name: &str,
        args: JsonValue,
    ) -> Result<JsonValue, AgentError> {
        let s = &self.services;
        match name {
            // Products
            "list_products" => {
                let a: PageArgs = typed(args)?;
                data(s.products.list(tenant, a.params()).await?)
            }
            "get_product" => {
                let a: ProductRef = typed(args)?;
                data(s.products.get(tenant, a.product_id).await?)
            }
            "create_product" => {
                let req: CreateProductRequest = typed(args)?;
                data(s.products.create(tenant, req).await?)
            }
            "update_product" => {
                let a: WithId<ProductRef, UpdateProductRequest> = typed(args)?;
                data(s.products.update(tenant, a.id.product_id, a.body).await?)
            }
            "delete_product" => {
                let a: Confirmed<ProductRef> = typed(args)?;
                a.check(name)?;
                data(s.products.delete(tenant, a.id.product_id).await?)
            }

            // Interfaces
            "list_interfaces" => {
                let a: WithId<ProductRef, PageArgs> = typed(args)?;
                data(s.interfaces.list_by_product(tenant, a.id.product_id, a.body.params()).await?)
            }
            "create_interface" => {
                let a: WithId<ProductRef, CreateInterfaceRequest> = typed(args)?;
                data(s.interfaces.create(tenant, a.id.product_id, a.body).await?)
            }
            "update_interface" => {
                let a: WithId<InterfaceRef, UpdateInterfaceRequest> = typed(args)?;
                data(s.interfaces.update(tenant, a.id.interface_id, a.body).await?)
            }
            "delete_interface" => {
                let a: Confirmed<InterfaceRef> = typed(args)?;
                a.check(name)?;
                data(s.interfaces.delete(tenant, a.id.interface_id).await?)
            }

            // Features
            "list_features" => {
                let a: WithId<InterfaceRef, PageArgs> = typed(args)?;
                data(s.features.list_by_interface(tenant, a.id.interface_id, a.body.params()).await?)
            }
            "get_feature" => {
                let a: FeatureRef = typed(args)?;
                data(s.features.get(tenant, a.feature_id).await?)
            }
            "create_feature" => {
                let a: WithId<InterfaceRef, CreateFeatureRequest> = typed(args)?;
                data(s.features.create(tenant, a.id.interface_id, a.body).await?)
            }
            "update_feature" => {
                let a: WithId<FeatureRef, UpdateFeatureRequest> = typed(args)?;
                data(s.features.update(tenant, a.id.feature_id, a.body).await?)
            }
            "delete_feature" => {
                let a: Confirmed<FeatureRef> = typed(args)?;
                a.check(name)?;
                data(s.features.delete(tenant, a.id.feature_id).await?)
            }

            // Requirements
            "list_requirements" => {
                let a: WithId<FeatureRef, PageArgs> = typed(args)?;
                data(s.requirements.list_by_feature(tenant, a.id.feature_id, a.body.params()).await?)
            }
            "create_requirement" => {
                let a: WithId<FeatureRef, CreateRequirementRequest> = typed(args)?;
                data(s.requirements.create(tenant, a.id.feature_id, a.body).await?)
            }
            "update_requirement" => {
                let a: WithId<RequirementRef, UpdateRequirementRequest> = typed(args)?;
                data(s.requirements.update(tenant, a.id.requirement_id, a.body).await?)
            }
            "delete_requirement" => {
                let a: Confirmed<RequirementRef> = typed(args)?;
                a.check(name)?;
                data(s.requirements.delete(tenant, a.id.requirement_id).await?)
            }

            // Releases
            "list_releases" => {
                let a: ListReleasesArgs = typed(args)?;
                let params = ListParams::new(a.limit, a.offset);
                match (a.feature_id, a.roadmap_id) {
                    (Some(feature_id), None) => {
                        data(s.releases.list_by_feature(tenant, feature_id, params).await?)
                    }
                    (None, Some(roadmap_id)) => {
                        data(s.releases.list_by_roadmap(tenant, roadmap_id, params).await?)
                    }
                    _ => Err(AgentError::invalid_arguments(
                        "pass exactly one of feature_id or roadmap_id",
                    )),
                }
            }
            "create_release" => {
                let a: WithId<FeatureRef, CreateReleaseRequest> = typed(args)?;
                data(s.releases.create(tenant, a.id.feature_id, a.body).await?)
            }
            "update_release" => {
                let a: WithId<ReleaseRef, UpdateReleaseRequest> = typed(args)?;
                data(s.releases.update(tenant, a.id.release_id, a.body).await?)
            }
            "delete_release" => {
                let a: Confirmed<ReleaseRef> = typed(args)?;
                a.check(name)?;
                data(s.releases.delete(tenant, a.id.release_id).await?)
            }

            // Roadmaps
            "list_roadmaps" => {
                let a: PageArgs = typed(args)?;
                data(s.roadmaps.list(tenant, a.params()).await?)
            }
            "create_roadmap" => {
                let req: CreateRoadmapRequest = typed(args)?;
                data(s.roadmaps.create(tenant, req).await?)
            }

            // Pages
            "list_pages" => {
                let a: ListPagesArgs = typed(args)?;
                data(s.pages.list_children(tenant, a.parent_id).await?)
            }
            "get_page_tree" => {
                let a: PageTreeArgs = typed(args)?;
                data(s.pages.tree(tenant, a.root_id).await?)
            }
            "create_page" => {
                let req: CreatePageRequest = typed(args)?;
                data(s.pages.create(tenant, req).await?)
            }
            "update_page" => {
                let a: WithId<PageRef, UpdatePageRequest> = typed(args)?;
                data(s.pages.update(tenant, a.id.page_id, a.body).await?)
            }
            "move_page" => {
                let a: WithId<PageRef, MovePageRequest> = typed(args)?;
                data(s.pages.move_page(tenant, a.id.page_id, a.body).await?)
            }
            "delete_page" => {
                let a: Confirmed<PageRef> = typed(args)?;
                a.check(name)?;
                data(s.pages.delete(tenant, a.id.page_id).await?)
            }

            _ => Err(AgentError::UnknownFunction {
                name: name.to_string(),
            }),
        }
    }
}

// ============================================================================
// ARGUMENT HANDLING
// ============================================================================

/// Accept the model's raw JSON string or an object; empty input means `{}`.
fn parse_arguments(arguments: &JsonValue) -> Result<JsonValue, AgentError> {
    let parsed = match arguments {
        JsonValue::Null => return Ok(json!({})),
        JsonValue::String(raw) if raw.trim().is_empty() => return Ok(json!({})),
        JsonValue::String(raw) => serde_json::from_str(raw).map_err(|e| {
            AgentError::invalid_arguments(format!("arguments are not valid JSON: {}", e))
        })?,
        other => other.clone(),
    };
    if !parsed.is_object() {
        return Err(AgentError::invalid_arguments(
            "arguments must be a JSON object",
        ));
    }
    Ok(parsed)
}

fn typed<T: DeserializeOwned>(args: JsonValue) -> Result<T, AgentError> {
    serde_json::from_value(args).map_err(|e| AgentError::invalid_arguments(e.to_string()))
}

fn data<T: Serialize>(value: T) -> Result<JsonValue, AgentError> {
    serde_json::to_value(value).map_err(|e| AgentError::Internal {
        message: format!("failed to serialize result: {}", e),
    })
}

#[derive(Debug, Deserialize)]
struct PageArgs {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

impl PageArgs {
    fn params(&self) -> ListParams {
        ListParams::new(self.limit, self.offset)
    }
}

/// Target id plus the rest of the arguments as a request body.
#[derive(Debug, Deserialize)]
struct WithId<I, B> {
    #[serde(flatten)]
    id: I,
    #[serde(flatten)]
    body: B,
}

/// Delete target plus the `confirm` flag.
#[derive(Debug, Deserialize)]
struct Confirmed<I> {
    #[serde(flatten)]
    id: I,
    #[serde(default)]
    confirm: bool,
}

impl<I> Confirmed<I> {
    fn check(&self, name: &str) -> Result<(), AgentError> {
        if self.confirm {
            Ok(())
        } else {
            Err(AgentError::ConfirmationRequired {
                name: name.to_string(),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProductRef {
    product_id: ProductId,
}

#[derive(Debug, Deserialize)]
struct InterfaceRef {
    interface_id: InterfaceId,
}

#[derive(Debug, Deserialize)]
struct FeatureRef {
    feature_id: FeatureId,
}

#[derive(Debug, Deserialize)]
struct RequirementRef {
    requirement_id: RequirementId,
}

#[derive(Debug, Deserialize)]
struct ReleaseRef {
    release_id: ReleaseId,
}

#[derive(Debug, Deserialize)]
struct PageRef {
    page_id: PageId,
}

#[derive(Debug, Deserialize)]
struct ListReleasesArgs {
    #[serde(default)]
    feature_id: Option<FeatureId>,
    #[serde(default)]
    roadmap_id: Option<RoadmapId>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ListPagesArgs {
    #[serde(default)]
    parent_id: Option<PageId>,
}

#[derive(Debug, Deserialize)]
struct PageTreeArgs {
    #[serde(default)]
    root_id: Option<PageId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_storage::InMemoryStore;

    fn dispatcher(access: AccessLevel) -> AgentDispatcher {
        let catalog = Arc::new(ToolCatalog::new().unwrap());
        AgentDispatcher::new(Services::new(Arc::new(InMemoryStore::new())), catalog, access)
    }

    fn code(outcome: &AgentCallOutcome) -> Option<&'static str> {
        outcome.result.as_ref().err().map(|e| e.code())
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(parse_arguments(&JsonValue::Null).unwrap(), json!({}));
        assert_eq!(parse_arguments(&json!("  ")).unwrap(), json!({}));
        assert_eq!(
            parse_arguments(&json!(r#"{"name":"x"}"#)).unwrap(),
            json!({"name": "x"})
        );
        assert!(parse_arguments(&json!("{not json")).is_err());
        assert!(parse_arguments(&json!([1, 2])).is_err());
        assert!(parse_arguments(&json!("42")).is_err());
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let d = dispatcher(AccessLevel::Destructive);
        let outcome = d.call(TenantId::now_v7(), "drop_database", &json!({})).await;
        assert_eq!(code(&outcome), Some("unknown_function"));
        assert!(!outcome.record.ok);
        assert_eq!(outcome.record.name, "drop_database");
    }

    #[tokio::test]
    async fn test_name_length_matches_rest_limit() {
        use keel_core::validation::MAX_NAME_LEN;

        let d = dispatcher(AccessLevel::Write);
        let tenant = TenantId::now_v7();
        let longest = "n".repeat(MAX_NAME_LEN);
        let outcome = d
            .call(tenant, "create_product", &json!({ "name": longest }))
            .await;
        assert!(outcome.record.ok, "{:?}", outcome.result);

        let too_long = "n".repeat(MAX_NAME_LEN + 1);
        let outcome = d
            .call(tenant, "create_product", &json!({ "name": too_long }))
            .await;
        assert_eq!(code(&outcome), Some("invalid_arguments"));
    }

    #[tokio::test]
    async fn test_move_page_without_parent_keeps_parent() {
        let d = dispatcher(AccessLevel::Write);
        let tenant = TenantId::now_v7();
        let project = d
            .call(tenant, "create_page", &json!({"page_type": "project", "title": "P"}))
            .await
            .result
            .unwrap();
        let project_id = project["page_id"].clone();
        let mut notes = Vec::new();
        for title in ["a", "b"] {
            let note = d
                .call(
                    tenant,
                    "create_page",
                    &json!({"page_type": "note", "title": title, "parent_id": project_id}),
                )
                .await
                .result
                .unwrap();
            notes.push(note["page_id"].clone());
        }

        let moved = d
            .call(tenant, "move_page", &json!({"page_id": notes[1], "position": 0}))
            .await
            .result
            .unwrap();
        assert_eq!(moved["parent_id"], project_id);
        assert_eq!(moved["position"], 0);
    }

    #[tokio::test]
    async fn test_unknown_names_share_one_metric_series() {
        use prometheus::{Encoder, TextEncoder};

        let d = dispatcher(AccessLevel::Read);
        assert_eq!(d.metric_label("list_products"), "list_products");
        assert_eq!(d.metric_label("bogus_fn_0"), UNKNOWN_FUNCTION_LABEL);

        let m = metrics().expect("metrics registered");
        let series = m
            .agent_calls_total
            .with_label_values(&[UNKNOWN_FUNCTION_LABEL, "unknown_function"]);
        let before = series.get();
        for i in 0..50 {
            let name = format!("bogus_fn_{}", i);
            d.call(TenantId::now_v7(), &name, &json!({})).await;
        }
        assert!(series.get() - before >= 50.0);

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("keel_agent_calls_total"));
        assert!(!text.contains("bogus_fn_"));
    }

    /// Smallest arguments object that passes the tool's schema.
    fn sample_args(schema: &JsonValue) -> JsonValue {
        let mut args = serde_json::Map::new();
        for key in schema["required"].as_array().unwrap() {
            let key = key.as_str().unwrap();
            let prop = &schema["properties"][key];
            let value = if let Some(values) = prop["enum"].as_array() {
                values[0].clone()
            } else if prop["type"] == "boolean" {
                json!(true)
            } else if prop.get("pattern").is_some() {
                json!(uuid::Uuid::now_v7())
            } else {
                json!("x")
            };
            args.insert(key.to_string(), value);
        }
        JsonValue::Object(args)
    }

    #[tokio::test]
    async fn test_every_catalog_tool_has_a_handler() {
        let d = dispatcher(AccessLevel::Destructive);
        let tenant = TenantId::now_v7();
        let tools: Vec<_> = d
            .catalog()
            .tools()
            .iter()
            .map(|t| (t.name, sample_args(&t.parameters)))
            .collect();
        for (name, args) in tools {
            let outcome = d.call(tenant, name, &args).await;
            assert_ne!(code(&outcome), Some("unknown_function"), "{}", name);
        }
    }

    #[tokio::test]
    async fn test_access_checked_before_arguments() {
        let d = dispatcher(AccessLevel::Read);
        let outcome = d
            .call(TenantId::now_v7(), "create_product", &json!("{garbage"))
            .await;
        assert_eq!(code(&outcome), Some("access_denied"));
    }

    #[tokio::test]
    async fn test_create_then_read_through_string_arguments() {
        let d = dispatcher(AccessLevel::Write);
        let tenant = TenantId::now_v7();
        let created = d
            .call(tenant, "create_product", &json!(r#"{"name":"Keel"}"#))
            .await;
        assert!(created.record.ok, "{:?}", created.result);
        let product_id = created.result.unwrap()["product_id"].clone();

        let listed = d.call(tenant, "list_products", &json!({})).await;
        let data = listed.result.unwrap();
        assert_eq!(data["total"], 1);
        assert_eq!(data["items"][0]["product_id"], product_id);
    }

    #[tokio::test]
    async fn test_delete_requires_confirm() {
        let d = dispatcher(AccessLevel::Destructive);
        let tenant = TenantId::now_v7();
        let created = d.call(tenant, "create_product", &json!({"name": "Keel"})).await;
        let product_id = created.result.unwrap()["product_id"].clone();

        let refused = d
            .call(tenant, "delete_product", &json!({"product_id": product_id, "confirm": false}))
            .await;
        assert_eq!(code(&refused), Some("confirmation_required"));

        let deleted = d
            .call(tenant, "delete_product", &json!({"product_id": product_id, "confirm": true}))
            .await;
        assert_eq!(deleted.result.unwrap()["deleted"], 1);
    }

    #[tokio::test]
    async fn test_missing_parent_is_not_found() {
        let d = dispatcher(AccessLevel::Write);
        let outcome = d
            .call(
                TenantId::now_v7(),
                "create_interface",
                &json!({"product_id": ProductId::now_v7(), "name": "Web"}),
            )
            .await;
        assert_eq!(code(&outcome), Some("not_found"));
    }

    #[tokio::test]
    async fn test_list_releases_needs_exactly_one_parent() {
        let d = dispatcher(AccessLevel::Read);
        let outcome = d.call(TenantId::now_v7(), "list_releases", &json!({})).await;
        assert_eq!(code(&outcome), Some("invalid_arguments"));
    }

    #[tokio::test]
    async fn test_render_envelope() {
        let d = dispatcher(AccessLevel::Read);
        let outcome = d
            .call(TenantId::now_v7(), "get_product", &json!({"product_id": "nope", "x": 1}))
            .await;
        let rendered = outcome.render();
        assert_eq!(rendered["ok"], false);
        assert_eq!(rendered["error"]["code"], "invalid_arguments");
        assert!(rendered["error"]["violations"].as_array().unwrap().len() >= 2);
    }
}
