//! OpenAPI Specification for the Keel API
//!
//! Generated with utoipa from the route annotations and schema derives.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::agent::{AccessLevel, AgentCallRecord, AssistantReply};
use crate::error::{ApiError, ErrorCode};
use crate::routes::{agent, feature, health, interface, page, product, release, requirement, roadmap};
use crate::types::*;

use keel_core::{
    Feature, FeatureStatus, Interface, Page, PageType, Priority, Product, Release, ReleaseStatus,
    Requirement, RequirementStatus, Roadmap,
};
use keel_llm::{ChatMessage, ChatRole, TokenUsage, ToolCall};

/// OpenAPI document for the Keel API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Keel API",
        version = "0.1.0",
        description = "Product-management backend: products, interfaces, features, requirements, releases, roadmaps, pages and a function-calling assistant",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Products", description = "Top-level products"),
        (name = "Interfaces", description = "Surfaces of a product (web app, API, ...)"),
        (name = "Features", description = "Features of an interface"),
        (name = "Requirements", description = "Requirements of a feature"),
        (name = "Releases", description = "Releases of a feature"),
        (name = "Roadmaps", description = "Roadmaps grouping releases"),
        (name = "Pages", description = "Hierarchical page tree"),
        (name = "Assistant", description = "Function-calling AI assistant"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Products ===
        product::create_product,
        product::list_products,
        product::get_product,
        product::update_product,
        product::delete_product,
        product::list_product_interfaces,
        product::create_product_interface,

        // === Interfaces ===
        interface::get_interface,
        interface::update_interface,
        interface::delete_interface,
        interface::list_interface_features,
        interface::create_interface_feature,

        // === Features ===
        feature::get_feature,
        feature::update_feature,
        feature::delete_feature,
        feature::list_feature_requirements,
        feature::create_feature_requirement,
        feature::list_feature_releases,
        feature::create_feature_release,

        // === Requirements and releases ===
        requirement::get_requirement,
        requirement::update_requirement,
        requirement::delete_requirement,
        release::get_release,
        release::update_release,
        release::delete_release,

        // === Roadmaps ===
        roadmap::create_roadmap,
        roadmap::list_roadmaps,
        roadmap::get_default_roadmap,
        roadmap::get_roadmap,
        roadmap::update_roadmap,
        roadmap::delete_roadmap,
        roadmap::set_default_roadmap,
        roadmap::list_roadmap_releases,

        // === Pages ===
        page::create_page,
        page::list_pages,
        page::page_tree,
        page::get_page,
        page::update_page,
        page::delete_page,
        page::list_page_children,
        page::list_page_ancestors,
        page::move_page,

        // === Assistant ===
        agent::list_tools,
        agent::call_function,
        agent::chat,

        // === Health and metrics ===
        health::liveness,
        health::readiness,
        crate::telemetry::metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,
            DeleteResponse,
            CreateProductRequest, UpdateProductRequest,
            CreateInterfaceRequest, UpdateInterfaceRequest,
            CreateFeatureRequest, UpdateFeatureRequest,
            CreateRequirementRequest, UpdateRequirementRequest,
            CreateReleaseRequest, UpdateReleaseRequest,
            CreateRoadmapRequest, UpdateRoadmapRequest,
            CreatePageRequest, UpdatePageRequest, MovePageRequest,
            Product, Interface, Feature, Requirement, Release, Roadmap, Page,
            Priority, FeatureStatus, RequirementStatus, ReleaseStatus, PageType,
            AccessLevel, AgentCallRecord, AssistantReply,
            agent::AgentToolsResponse, agent::AgentCallRequest, agent::AgentCallResponse,
            agent::AgentChatRequest,
            ChatMessage, ChatRole, ToolCall, TokenUsage,
            health::HealthResponse, health::HealthStatus, health::HealthDetails,
            health::ComponentHealth,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security scheme modifier for OpenAPI document.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
