//! Entity structs for the product tree, roadmaps and pages.
//!
//! Every entity carries its tenant and timestamps. Parent links follow the
//! product hierarchy: product → interface → feature → requirement / release.

use crate::{
    FeatureId, FeatureStatus, InterfaceId, PageId, PageType, Priority, ProductId, RecordKind,
    ReleaseId, ReleaseStatus, RequirementId, RequirementStatus, RoadmapId, TenantId, Timestamp,
};
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

// ============================================================================
// RECORD TRAIT
// ============================================================================

/// A tenant-scoped entity that can be persisted by a record store.
///
/// The store keeps `id`, `tenant_id` and `parent_id` as indexed columns and the
/// whole entity as a JSON document.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind discriminator used for storage and error messages.
    const KIND: RecordKind;

    fn id(&self) -> Uuid;

    fn tenant_id(&self) -> TenantId;

    /// Parent row in the hierarchy, if any.
    fn parent_id(&self) -> Option<Uuid>;

    fn created_at(&self) -> Timestamp;

    fn updated_at(&self) -> Timestamp;

    /// Bump `updated_at` after a mutation.
    fn touch(&mut self, now: Timestamp);
}

macro_rules! impl_record {
    ($ty:ty, $kind:expr, id: |$s:ident| $id:expr, parent: |$p:ident| $parent:expr) => {
        impl Record for $ty {
            const KIND: RecordKind = $kind;

            fn id(&$s) -> Uuid {
                $id
            }

            fn tenant_id(&self) -> TenantId {
                self.tenant_id
            }

            fn parent_id(&$p) -> Option<Uuid> {
                $parent
            }

            fn created_at(&self) -> Timestamp {
                self.created_at
            }

            fn updated_at(&self) -> Timestamp {
                self.updated_at
            }

            fn touch(&mut self, now: Timestamp) {
                if now > self.updated_at {
                    self.updated_at = now;
                }
            }
        }
    };
}

// ============================================================================
// PRODUCT TREE
// ============================================================================

/// Top-level product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Product {
    pub product_id: ProductId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// A surface of a product (web app, mobile app, public API...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Interface {
    pub interface_id: InterfaceId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// A feature delivered through an interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Feature {
    pub feature_id: FeatureId,
    pub tenant_id: TenantId,
    pub interface_id: InterfaceId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: FeatureStatus,
    /// Drafts stay unsaved until the author commits them.
    #[serde(default)]
    pub is_saved: bool,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub saved_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// A requirement attached to a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Requirement {
    pub requirement_id: RequirementId,
    pub tenant_id: TenantId,
    pub feature_id: FeatureId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: RequirementStatus,
    /// Critical user journey this requirement serves.
    #[serde(default)]
    pub cuj: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// A planned release of a feature, optionally grouped under a roadmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Release {
    pub release_id: ReleaseId,
    pub tenant_id: TenantId,
    pub feature_id: FeatureId,
    #[serde(default)]
    pub roadmap_id: Option<RoadmapId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: ReleaseStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// A named grouping of releases. At most one roadmap per tenant is the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Roadmap {
    pub roadmap_id: RoadmapId,
    pub tenant_id: TenantId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_default: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

// ============================================================================
// PAGES
// ============================================================================

/// Node of the generic page tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Page {
    pub page_id: PageId,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub parent_id: Option<PageId>,
    pub page_type: PageType,
    pub title: String,
    /// Free-form typed properties (status, owner, dates...).
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub properties: Map<String, JsonValue>,
    /// Editor content blocks, stored opaquely.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub blocks: Vec<JsonValue>,
    /// Zero-based order among siblings.
    #[serde(default)]
    pub position: u32,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl_record!(Product, RecordKind::Product,
    id: |self| self.product_id.as_uuid(),
    parent: |self| None);
impl_record!(Interface, RecordKind::Interface,
    id: |self| self.interface_id.as_uuid(),
    parent: |self| Some(self.product_id.as_uuid()));
impl_record!(Feature, RecordKind::Feature,
    id: |self| self.feature_id.as_uuid(),
    parent: |self| Some(self.interface_id.as_uuid()));
impl_record!(Requirement, RecordKind::Requirement,
    id: |self| self.requirement_id.as_uuid(),
    parent: |self| Some(self.feature_id.as_uuid()));
impl_record!(Release, RecordKind::Release,
    id: |self| self.release_id.as_uuid(),
    parent: |self| Some(self.feature_id.as_uuid()));
impl_record!(Roadmap, RecordKind::Roadmap,
    id: |self| self.roadmap_id.as_uuid(),
    parent: |self| None);
impl_record!(Page, RecordKind::Page,
    id: |self| self.page_id.as_uuid(),
    parent: |self| self.parent_id.map(|id| id.as_uuid()));

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample_page() -> Page {
        let now = Utc::now();
        Page {
            page_id: PageId::now_v7(),
            tenant_id: TenantId::now_v7(),
            parent_id: None,
            page_type: PageType::Project,
            title: "Launch".to_string(),
            properties: Map::new(),
            blocks: vec![],
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_record_parent_links() {
        let now = Utc::now();
        let feature = Feature {
            feature_id: FeatureId::now_v7(),
            tenant_id: TenantId::now_v7(),
            interface_id: InterfaceId::now_v7(),
            name: "Search".to_string(),
            description: String::new(),
            priority: Priority::High,
            status: FeatureStatus::Planned,
            is_saved: false,
            saved_at: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(Feature::KIND, RecordKind::Feature);
        assert_eq!(feature.parent_id(), Some(feature.interface_id.as_uuid()));
        assert_eq!(sample_page().parent_id(), None);
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let mut page = sample_page();
        let original = page.updated_at;
        page.touch(original - Duration::seconds(10));
        assert_eq!(page.updated_at, original);
        page.touch(original + Duration::seconds(10));
        assert!(page.updated_at > original);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = serde_json::json!({
            "requirement_id": RequirementId::now_v7(),
            "tenant_id": TenantId::now_v7(),
            "feature_id": FeatureId::now_v7(),
            "name": "Login with SSO",
            "created_at": Utc::now(),
            "updated_at": Utc::now(),
        });
        let req: Requirement = serde_json::from_value(json).unwrap();
        assert_eq!(req.status, RequirementStatus::Draft);
        assert_eq!(req.priority, Priority::Med);
        assert!(req.acceptance_criteria.is_empty());
    }
}
