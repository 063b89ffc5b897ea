//! Enum types for Keel entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error when parsing an invalid enum string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub enum_name: &'static str,
    pub value: String,
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.enum_name, self.value)
    }
}

impl std::error::Error for EnumParseError {}

/// Implements `as_db_str`, `from_db_str`, `ALL`, `Display` and `FromStr` for a
/// fieldless enum whose serde representation is snake_case.
macro_rules! db_string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stable lowercase name used in storage, JSON and tool schemas.
            pub fn as_db_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parse from the stable name (case-insensitive).
            pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(EnumParseError {
                        enum_name: $label,
                        value: s.to_string(),
                    }),
                }
            }

            /// All stable names, for JSON Schema `enum` lists.
            pub fn db_names() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_db_str()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_db_str())
            }
        }

        impl FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_db_str(s)
            }
        }
    };
}

// ============================================================================
// RECORD KIND
// ============================================================================

/// Discriminator for every stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Product,
    Interface,
    Feature,
    Requirement,
    Release,
    Roadmap,
    Page,
}

db_string_enum!(RecordKind, "record kind", {
    Product => "product",
    Interface => "interface",
    Feature => "feature",
    Requirement => "requirement",
    Release => "release",
    Roadmap => "roadmap",
    Page => "page",
});

impl RecordKind {
    /// Human-readable label for error messages.
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Product => "Product",
            RecordKind::Interface => "Interface",
            RecordKind::Feature => "Feature",
            RecordKind::Requirement => "Requirement",
            RecordKind::Release => "Release",
            RecordKind::Roadmap => "Roadmap",
            RecordKind::Page => "Page",
        }
    }
}

// ============================================================================
// PLANNING ENUMS
// ============================================================================

/// Relative importance of a feature, requirement or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Med,
    Low,
}

db_string_enum!(Priority, "priority", {
    High => "high",
    Med => "med",
    Low => "low",
});

/// Delivery state of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    #[default]
    Planned,
    InProgress,
    Complete,
    Cancelled,
}

db_string_enum!(FeatureStatus, "feature status", {
    Planned => "planned",
    InProgress => "in_progress",
    Complete => "complete",
    Cancelled => "cancelled",
});

/// Review state of a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    #[default]
    Draft,
    InReview,
    Approved,
    Rejected,
    Deferred,
}

db_string_enum!(RequirementStatus, "requirement status", {
    Draft => "draft",
    InReview => "in_review",
    Approved => "approved",
    Rejected => "rejected",
    Deferred => "deferred",
});

/// Delivery state of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    #[default]
    Planned,
    InProgress,
    Complete,
    Cancelled,
}

db_string_enum!(ReleaseStatus, "release status", {
    Planned => "planned",
    InProgress => "in_progress",
    Complete => "complete",
    Cancelled => "cancelled",
});

// ============================================================================
// PAGE TYPE
// ============================================================================

/// Type of a node in the generic page tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Project,
    Feature,
    Release,
    Roadmap,
    Document,
    Note,
}

db_string_enum!(PageType, "page type", {
    Project => "project",
    Feature => "feature",
    Release => "release",
    Roadmap => "roadmap",
    Document => "document",
    Note => "note",
});

impl PageType {
    /// Whether a page of this type may hold a child of type `child`.
    pub fn can_contain(&self, child: PageType) -> bool {
        use PageType::*;
        match self {
            Project => matches!(child, Feature | Release | Roadmap | Document | Note),
            Feature => matches!(child, Release | Document | Note),
            Release | Roadmap => matches!(child, Document | Note),
            Document => matches!(child, Document | Note),
            Note => false,
        }
    }

    /// Whether a page of this type may sit at the top of the tree.
    pub fn can_be_root(&self) -> bool {
        !matches!(self, PageType::Note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_str_roundtrip_all_variants() {
        for status in FeatureStatus::ALL {
            assert_eq!(FeatureStatus::from_db_str(status.as_db_str()), Ok(*status));
        }
        for kind in RecordKind::ALL {
            assert_eq!(kind.as_db_str().parse::<RecordKind>(), Ok(*kind));
        }
    }

    #[test]
    fn test_serde_matches_db_str() {
        let json = serde_json::to_string(&RequirementStatus::InReview).unwrap();
        assert_eq!(json, "\"in_review\"");
        assert_eq!(RequirementStatus::InReview.as_db_str(), "in_review");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_note_is_a_leaf() {
        for child in PageType::ALL {
            assert!(!PageType::Note.can_contain(*child));
        }
        assert!(!PageType::Note.can_be_root());
    }

    #[test]
    fn test_project_nesting() {
        assert!(PageType::Project.can_contain(PageType::Feature));
        assert!(PageType::Feature.can_contain(PageType::Release));
        assert!(!PageType::Release.can_contain(PageType::Feature));
        assert!(!PageType::Document.can_contain(PageType::Project));
    }
}
