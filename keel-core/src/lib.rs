//! Keel Core - Entity Types
//!
//! Pure data structures shared by every Keel crate: typed ids, the product
//! tree and page entities, enums, errors, and the small tree and validation
//! helpers that enforce the hierarchy invariants.

pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod tree;
pub mod validation;

pub use entities::{Feature, Interface, Page, Product, Record, Release, Requirement, Roadmap};
pub use enums::{
    EnumParseError, FeatureStatus, PageType, Priority, RecordKind, ReleaseStatus,
    RequirementStatus,
};
pub use error::{
    ConfigError, KeelError, KeelResult, LlmError, StorageError, TreeError, ValidationError,
};
pub use identity::{
    new_entity_id, EntityId, EntityIdType, FeatureId, IdParseError, InterfaceId, PageId,
    ProductId, ReleaseId, RequirementId, RoadmapId, TenantId, Timestamp,
};
pub use tree::{TreeNode, TreeView, MAX_TREE_DEPTH};
pub use validation::{MAX_DESCRIPTION_LEN, MAX_NAME_LEN};
