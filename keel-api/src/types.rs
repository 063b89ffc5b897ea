//! Request and response types for the REST API and agent operations.
//!
//! Create requests carry every field a client may set; the parent id comes
//! from the URL path (REST) or from the tool arguments (agent). Update requests
//! are sparse: absent fields are left unchanged.

use chrono::NaiveDate;
use keel_core::{FeatureStatus, PageId, PageType, Priority, ReleaseStatus, RequirementStatus, RoadmapId};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Deserialize a present field (even `null`) as `Some`, so `Option<Option<T>>`
/// can tell "absent" from "set to null".
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// PAGINATION
// ============================================================================

/// Default page size for list endpoints.
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Largest page size a client may request.
pub const MAX_LIST_LIMIT: usize = 1000;

/// `?limit=&offset=` query parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ListParams {
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self { limit, offset }
    }

    /// Effective limit, defaulted and clamped to [`MAX_LIST_LIMIT`].
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Outcome of a delete, counting cascaded rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeleteResponse {
    /// Rows removed, including the target.
    pub deleted: u64,
    /// Releases whose `roadmap_id` was cleared by a roadmap delete.
    #[serde(default)]
    pub detached: u64,
    /// Sibling pages whose position shifted to close the gap.
    #[serde(default)]
    pub renumbered: u64,
}

// ============================================================================
// PRODUCTS AND INTERFACES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateInterfaceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateInterfaceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// FEATURES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateFeatureRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<FeatureStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateFeatureRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<FeatureStatus>,
    /// Setting this to `true` stamps `saved_at`.
    #[serde(default)]
    pub is_saved: Option<bool>,
}

// ============================================================================
// REQUIREMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateRequirementRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<RequirementStatus>,
    #[serde(default)]
    pub cuj: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateRequirementRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `null` clears the owner.
    #[serde(default, deserialize_with = "double_option")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub owner: Option<Option<String>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<RequirementStatus>,
    #[serde(default, deserialize_with = "double_option")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub cuj: Option<Option<String>>,
    /// Replaces the whole list.
    #[serde(default)]
    pub acceptance_criteria: Option<Vec<String>>,
}

// ============================================================================
// RELEASES AND ROADMAPS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateReleaseRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub roadmap_id: Option<RoadmapId>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<ReleaseStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateReleaseRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// `null` detaches the release from its roadmap.
    #[serde(default, deserialize_with = "double_option")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = Uuid))]
    pub roadmap_id: Option<Option<RoadmapId>>,
    #[serde(default, deserialize_with = "double_option")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = Date))]
    pub target_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: Option<ReleaseStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateRoadmapRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Make this the tenant's default roadmap.
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateRoadmapRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// PAGES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreatePageRequest {
    /// Parent page; absent for a root page.
    #[serde(default)]
    pub parent_id: Option<PageId>,
    pub page_type: PageType,
    pub title: String,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub properties: Map<String, JsonValue>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub blocks: Vec<JsonValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdatePageRequest {
    #[serde(default)]
    pub title: Option<String>,
    /// Merged into the existing properties; `null` values remove keys.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub properties: Option<Map<String, JsonValue>>,
    /// Replaces the whole block list.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Vec<Object>>))]
    pub blocks: Option<Vec<JsonValue>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MovePageRequest {
    /// Absent keeps the current parent; `null` moves the page to the top level.
    #[serde(default, deserialize_with = "double_option")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = Uuid))]
    pub parent_id: Option<Option<PageId>>,
    /// Zero-based position among the new siblings; absent appends.
    #[serde(default)]
    pub position: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_clamp() {
        assert_eq!(ListParams::default().limit(), DEFAULT_LIST_LIMIT);
        assert_eq!(ListParams::new(Some(0), None).limit(), 1);
        assert_eq!(ListParams::new(Some(50_000), Some(7)).limit(), MAX_LIST_LIMIT);
        assert_eq!(ListParams::new(None, Some(7)).offset(), 7);
    }

    #[test]
    fn test_double_option_distinguishes_null_from_absent() {
        let absent: UpdateReleaseRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.roadmap_id, None);

        let cleared: UpdateReleaseRequest =
            serde_json::from_str(r#"{"roadmap_id": null}"#).unwrap();
        assert_eq!(cleared.roadmap_id, Some(None));

        let id = RoadmapId::now_v7();
        let set: UpdateReleaseRequest =
            serde_json::from_value(serde_json::json!({ "roadmap_id": id })).unwrap();
        assert_eq!(set.roadmap_id, Some(Some(id)));
    }

    #[test]
    fn test_move_parent_absent_vs_null() {
        let keep: MovePageRequest = serde_json::from_str(r#"{"position": 0}"#).unwrap();
        assert_eq!(keep.parent_id, None);
        assert_eq!(keep.position, Some(0));

        let top: MovePageRequest = serde_json::from_str(r#"{"parent_id": null}"#).unwrap();
        assert_eq!(top.parent_id, Some(None));
    }

    #[test]
    fn test_create_page_defaults() {
        let req: CreatePageRequest =
            serde_json::from_str(r#"{"page_type": "document", "title": "Launch plan"}"#).unwrap();
        assert!(req.parent_id.is_none());
        assert!(req.properties.is_empty());
        assert!(req.blocks.is_empty());
    }
}
