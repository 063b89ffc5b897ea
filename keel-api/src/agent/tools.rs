//! Function Tool Catalog
//!
//! The functions the assistant may call, with their JSON Schemas and access
//! levels. Schemas are compiled once when the catalog is built.

use std::collections::HashMap;

use keel_core::{FeatureStatus, PageType, Priority, ReleaseStatus, RequirementStatus};
use keel_core::validation::MAX_NAME_LEN;
use keel_llm::ToolDefinition;
use serde_json::{json, Map, Value as JsonValue};

use super::{AccessLevel, AgentError};
use crate::error::{ApiError, ApiResult};

/// One callable function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTool {
    pub name: &'static str,
    pub description: &'static str,
    pub access: AccessLevel,
    /// JSON Schema (draft 2020-12) of the arguments object.
    pub parameters: JsonValue,
}

impl FunctionTool {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.parameters.clone(),
        }
    }

    /// `{"type":"function","function":{name,description,parameters}}`
    pub fn to_openai(&self) -> JsonValue {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// All tools plus their compiled validators.
pub struct ToolCatalog {
    tools: Vec<FunctionTool>,
    validators: HashMap<&'static str, jsonschema::Validator>,
}

impl ToolCatalog {
    /// Build the catalog and compile every schema.
    pub fn new() -> ApiResult<Self> {
        let tools = available_tools();
        let mut validators = HashMap::with_capacity(tools.len());
        for tool in &tools {
            let validator = jsonschema::draft202012::new(&tool.parameters).map_err(|e| {
                ApiError::internal_error(format!("Invalid schema for {}: {}", tool.name, e))
            })?;
            validators.insert(tool.name, validator);
        }
        Ok(Self { tools, validators })
    }

    pub fn get(&self, name: &str) -> Option<&FunctionTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tools(&self) -> &[FunctionTool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tools a policy of `access` may call.
    pub fn allowed(&self, access: AccessLevel) -> impl Iterator<Item = &FunctionTool> {
        self.tools.iter().filter(move |t| access.allows(t.access))
    }

    /// Definitions handed to the chat provider.
    pub fn definitions(&self, access: AccessLevel) -> Vec<ToolDefinition> {
        self.allowed(access).map(FunctionTool::definition).collect()
    }

    /// The catalog in OpenAI `tools` format.
    pub fn openai_tools(&self, access: AccessLevel) -> Vec<JsonValue> {
        self.allowed(access).map(FunctionTool::to_openai).collect()
    }

    /// Check `arguments` against the tool's schema, reporting every violation.
    pub fn validate(&self, name: &str, arguments: &JsonValue) -> Result<(), AgentError> {
        let validator = self
            .validators
            .get(name)
            .ok_or_else(|| AgentError::UnknownFunction {
                name: name.to_string(),
            })?;

        let violations: Vec<String> = validator
            .iter_errors(arguments)
            .map(|e| e.to_string())
            .collect();
        if violations.is_empty() {
            return Ok(());
        }
        Err(AgentError::InvalidArguments {
            message: format!(
                "{} argument{} failed schema validation",
                violations.len(),
                if violations.len() == 1 { "" } else { "s" }
            ),
            violations,
        })
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.tools.iter().map(|t| t.name).collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// SCHEMA HELPERS
// ============================================================================

const UUID_PATTERN: &str =
    "^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";

fn id(description: &str) -> JsonValue {
    json!({ "type": "string", "pattern": UUID_PATTERN, "description": description })
}

fn nullable_id(description: &str) -> JsonValue {
    json!({ "type": ["string", "null"], "pattern": UUID_PATTERN, "description": description })
}

fn text(description: &str) -> JsonValue {
    json!({ "type": "string", "description": description })
}

fn name() -> JsonValue {
    json!({ "type": "string", "minLength": 1, "maxLength": MAX_NAME_LEN, "description": "Display name" })
}

fn one_of(values: Vec<&'static str>, description: &str) -> JsonValue {
    json!({ "type": "string", "enum": values, "description": description })
}

fn page_limit() -> JsonValue {
    json!({ "type": "integer", "minimum": 1, "maximum": 1000, "description": "Page size (default 100)" })
}

fn page_offset() -> JsonValue {
    json!({ "type": "integer", "minimum": 0, "description": "Rows to skip" })
}

fn confirm() -> JsonValue {
    json!({
        "type": "boolean",
        "description": "Must be true. Only set after the user explicitly agreed to the deletion."
    })
}

/// `{"type":"object", ...}` that rejects unknown properties.
fn object(properties: Vec<(&str, JsonValue)>, required: &[&str]) -> JsonValue {
    let properties: Map<String, JsonValue> = properties
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn tool(
    name: &'static str,
    description: &'static str,
    access: AccessLevel,
    parameters: JsonValue,
) -> FunctionTool {
    FunctionTool {
        name,
        description,
        access,
        parameters,
    }
}

// ============================================================================
// CATALOG
// ============================================================================

fn available_tools() -> Vec<FunctionTool> {
    use AccessLevel::{Destructive, Read, Write};

    vec![
        // ---------------------------------------------------------------- products
        tool(
            "list_products",
            "List the workspace's products",
            Read,
            object(vec![("limit", page_limit()), ("offset", page_offset())], &[]),
        ),
        tool(
            "get_product",
            "Get one product by id",
            Read,
            object(vec![("product_id", id("Product id"))], &["product_id"]),
        ),
        tool(
            "create_product",
            "Create a product",
            Write,
            object(
                vec![("name", name()), ("description", text("Longer description"))],
                &["name"],
            ),
        ),
        tool(
            "update_product",
            "Rename or re-describe a product",
            Write,
            object(
                vec![
                    ("product_id", id("Product id")),
                    ("name", name()),
                    ("description", text("Longer description")),
                ],
                &["product_id"],
            ),
        ),
        tool(
            "delete_product",
            "Delete a product with all of its interfaces, features, requirements and releases",
            Destructive,
            object(
                vec![("product_id", id("Product id")), ("confirm", confirm())],
                &["product_id", "confirm"],
            ),
        ),
        // -------------------------------------------------------------- interfaces
        tool(
            "list_interfaces",
            "List the interfaces of a product",
            Read,
            object(
                vec![
                    ("product_id", id("Product id")),
                    ("limit", page_limit()),
                    ("offset", page_offset()),
                ],
                &["product_id"],
            ),
        ),
        tool(
            "create_interface",
            "Create an interface (a surface such as web app or API) under a product",
            Write,
            object(
                vec![
                    ("product_id", id("Parent product id")),
                    ("name", name()),
                    ("description", text("Longer description")),
                ],
                &["product_id", "name"],
            ),
        ),
        tool(
            "update_interface",
            "Rename or re-describe an interface",
            Write,
            object(
                vec![
                    ("interface_id", id("Interface id")),
                    ("name", name()),
                    ("description", text("Longer description")),
                ],
                &["interface_id"],
            ),
        ),
        tool(
            "delete_interface",
            "Delete an interface with its features, requirements and releases",
            Destructive,
            object(
                vec![("interface_id", id("Interface id")), ("confirm", confirm())],
                &["interface_id", "confirm"],
            ),
        ),
        // ---------------------------------------------------------------- features
        tool(
            "list_features",
            "List the features of an interface",
            Read,
            object(
                vec![
                    ("interface_id", id("Interface id")),
                    ("limit", page_limit()),
                    ("offset", page_offset()),
                ],
                &["interface_id"],
            ),
        ),
        tool(
            "get_feature",
            "Get one feature by id",
            Read,
            object(vec![("feature_id", id("Feature id"))], &["feature_id"]),
        ),
        tool(
            "create_feature",
            "Create a feature under an interface",
            Write,
            object(
                vec![
                    ("interface_id", id("Parent interface id")),
                    ("name", name()),
                    ("description", text("What the feature does")),
                    ("priority", one_of(Priority::db_names(), "Priority (default med)")),
                    ("status", one_of(FeatureStatus::db_names(), "Status (default planned)")),
                ],
                &["interface_id", "name"],
            ),
        ),
        tool(
            "update_feature",
            "Change a feature's fields; is_saved bookmarks it",
            Write,
            object(
                vec![
                    ("feature_id", id("Feature id")),
                    ("name", name()),
                    ("description", text("What the feature does")),
                    ("priority", one_of(Priority::db_names(), "Priority")),
                    ("status", one_of(FeatureStatus::db_names(), "Status")),
                    ("is_saved", json!({ "type": "boolean", "description": "Bookmark flag" })),
                ],
                &["feature_id"],
            ),
        ),
        tool(
            "delete_feature",
            "Delete a feature with its requirements and releases",
            Destructive,
            object(
                vec![("feature_id", id("Feature id")), ("confirm", confirm())],
                &["feature_id", "confirm"],
            ),
        ),
        // ------------------------------------------------------------ requirements
        tool(
            "list_requirements",
            "List the requirements of a feature",
            Read,
            object(
                vec![
                    ("feature_id", id("Feature id")),
                    ("limit", page_limit()),
                    ("offset", page_offset()),
                ],
                &["feature_id"],
            ),
        ),
        tool(
            "create_requirement",
            "Create a requirement under a feature",
            Write,
            object(
                vec![
                    ("feature_id", id("Parent feature id")),
                    ("name", name()),
                    ("description", text("The requirement statement")),
                    ("owner", text("Person responsible")),
                    ("priority", one_of(Priority::db_names(), "Priority (default med)")),
                    (
                        "status",
                        one_of(RequirementStatus::db_names(), "Status (default draft)"),
                    ),
                    ("cuj", text("Critical user journey this serves")),
                    (
                        "acceptance_criteria",
                        json!({ "type": "array", "items": { "type": "string" } }),
                    ),
                ],
                &["feature_id", "name"],
            ),
        ),
        tool(
            "update_requirement",
            "Change a requirement's fields; null clears owner or cuj",
            Write,
            object(
                vec![
                    ("requirement_id", id("Requirement id")),
                    ("name", name()),
                    ("description", text("The requirement statement")),
                    ("owner", json!({ "type": ["string", "null"] })),
                    ("priority", one_of(Priority::db_names(), "Priority")),
                    ("status", one_of(RequirementStatus::db_names(), "Status")),
                    ("cuj", json!({ "type": ["string", "null"] })),
                    (
                        "acceptance_criteria",
                        json!({
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Replaces the whole list"
                        }),
                    ),
                ],
                &["requirement_id"],
            ),
        ),
        tool(
            "delete_requirement",
            "Delete a requirement",
            Destructive,
            object(
                vec![("requirement_id", id("Requirement id")), ("confirm", confirm())],
                &["requirement_id", "confirm"],
            ),
        ),
        // ---------------------------------------------------------------- releases
        tool(
            "list_releases",
            "List releases of a feature or of a roadmap (pass exactly one of the two ids)",
            Read,
            object(
                vec![
                    ("feature_id", id("Feature id")),
                    ("roadmap_id", id("Roadmap id")),
                    ("limit", page_limit()),
                    ("offset", page_offset()),
                ],
                &[],
            ),
        ),
        tool(
            "create_release",
            "Create a release of a feature, optionally placed on a roadmap",
            Write,
            object(
                vec![
                    ("feature_id", id("Parent feature id")),
                    ("name", name()),
                    ("description", text("Release notes")),
                    ("roadmap_id", id("Roadmap to place the release on")),
                    (
                        "target_date",
                        json!({ "type": "string", "format": "date", "description": "YYYY-MM-DD" }),
                    ),
                    ("priority", one_of(Priority::db_names(), "Priority (default med)")),
                    (
                        "status",
                        one_of(ReleaseStatus::db_names(), "Status (default planned)"),
                    ),
                ],
                &["feature_id", "name"],
            ),
        ),
        tool(
            "update_release",
            "Change a release's fields; null roadmap_id detaches it from its roadmap",
            Write,
            object(
                vec![
                    ("release_id", id("Release id")),
                    ("name", name()),
                    ("description", text("Release notes")),
                    ("roadmap_id", nullable_id("Roadmap id or null")),
                    (
                        "target_date",
                        json!({ "type": ["string", "null"], "format": "date" }),
                    ),
                    ("priority", one_of(Priority::db_names(), "Priority")),
                    ("status", one_of(ReleaseStatus::db_names(), "Status")),
                ],
                &["release_id"],
            ),
        ),
        tool(
            "delete_release",
            "Delete a release",
            Destructive,
            object(
                vec![("release_id", id("Release id")), ("confirm", confirm())],
                &["release_id", "confirm"],
            ),
        ),
        // ---------------------------------------------------------------- roadmaps
        tool(
            "list_roadmaps",
            "List roadmaps; at most one is marked is_default",
            Read,
            object(vec![("limit", page_limit()), ("offset", page_offset())], &[]),
        ),
        tool(
            "create_roadmap",
            "Create a roadmap, optionally making it the default",
            Write,
            object(
                vec![
                    ("name", name()),
                    ("description", text("Longer description")),
                    ("is_default", json!({ "type": "boolean" })),
                ],
                &["name"],
            ),
        ),
        // ------------------------------------------------------------------- pages
        tool(
            "list_pages",
            "List the pages directly under a parent page, or the top-level pages",
            Read,
            object(vec![("parent_id", id("Parent page id; omit for top level"))], &[]),
        ),
        tool(
            "get_page_tree",
            "Get a page hierarchy as nested nodes, from one page or from the top level",
            Read,
            object(vec![("root_id", id("Root page id; omit for the whole forest"))], &[]),
        ),
        tool(
            "create_page",
            "Create a page under a parent, or at the top level. Notes cannot be top-level.",
            Write,
            object(
                vec![
                    ("parent_id", id("Parent page id")),
                    ("page_type", one_of(PageType::db_names(), "Kind of page")),
                    ("title", name()),
                    ("properties", json!({ "type": "object" })),
                    (
                        "blocks",
                        json!({ "type": "array", "items": { "type": "object" } }),
                    ),
                ],
                &["page_type", "title"],
            ),
        ),
        tool(
            "update_page",
            "Change a page's title or blocks, or merge properties (null removes a key)",
            Write,
            object(
                vec![
                    ("page_id", id("Page id")),
                    ("title", name()),
                    ("properties", json!({ "type": "object" })),
                    (
                        "blocks",
                        json!({ "type": "array", "items": { "type": "object" } }),
                    ),
                ],
                &["page_id"],
            ),
        ),
        tool(
            "move_page",
            "Move a page to a new position. Omit parent_id to stay under the current parent; pass a page id to re-parent or null for the top level",
            Write,
            object(
                vec![
                    ("page_id", id("Page id")),
                    ("parent_id", nullable_id("New parent page id, null for top level, omit to keep")),
                    ("position", json!({ "type": "integer", "minimum": 0 })),
                ],
                &["page_id"],
            ),
        ),
        tool(
            "delete_page",
            "Delete a page and every page beneath it",
            Destructive,
            object(
                vec![("page_id", id("Page id")), ("confirm", confirm())],
                &["page_id", "confirm"],
            ),
        ),
    ]
}
