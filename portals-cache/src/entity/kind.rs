//! Entity kinds cached by the client.

use serde::{Deserialize, Serialize};

/// Kinds of entities held in the registries.
///
/// Each kind owns exactly one registry; identities are unique per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// CMS category (tree-shaped)
    Category,
    /// CMS content item
    Content,
    /// Portal content type definition
    ContentType,
    /// Crawler definition
    Crawler,
    /// Portal desktop (tree-shaped)
    Desktop,
    /// Filter/sort expression
    Expression,
    /// CMS item
    Item,
    /// CMS link (tree-shaped)
    Link,
    /// Portal module
    Module,
    /// Organization (owning system)
    Organization,
    /// Portlet placed on a desktop
    Portlet,
    /// Role
    Role,
    /// Scheduled background task
    SchedulingTask,
    /// Site bound to an organization
    Site,
    /// E-book (chapters are children)
    Book,
}

impl EntityKind {
    /// Wire tag of the kind, as carried by push events.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "Category",
            Self::Content => "Content",
            Self::ContentType => "ContentType",
            Self::Crawler => "Crawler",
            Self::Desktop => "Desktop",
            Self::Expression => "Expression",
            Self::Item => "Item",
            Self::Link => "Link",
            Self::Module => "Module",
            Self::Organization => "Organization",
            Self::Portlet => "Portlet",
            Self::Role => "Role",
            Self::SchedulingTask => "SchedulingTask",
            Self::Site => "Site",
            Self::Book => "Book",
        }
    }

    /// Path segment used when building route URIs.
    #[must_use]
    pub fn route_segment(&self) -> &'static str {
        match self {
            Self::Category => "categories",
            Self::Content => "contents",
            Self::ContentType => "content.types",
            Self::Crawler => "crawlers",
            Self::Desktop => "desktops",
            Self::Expression => "expressions",
            Self::Item => "items",
            Self::Link => "links",
            Self::Module => "modules",
            Self::Organization => "organizations",
            Self::Portlet => "portlets",
            Self::Role => "roles",
            Self::SchedulingTask => "scheduling.tasks",
            Self::Site => "sites",
            Self::Book => "books",
        }
    }

    /// Parse a wire tag.
    ///
    /// Case-insensitive; qualified tags such as `"Portals.Category"` or
    /// `"CMS.Category"` resolve to their last segment.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        let name = tag.rsplit('.').next().unwrap_or(tag).trim();
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }

    /// Whether entities of this kind are normally arranged as a tree.
    #[must_use]
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Category | Self::Desktop | Self::Link | Self::Book)
    }

    /// Get all kinds in declaration order.
    #[must_use]
    pub fn all() -> &'static [EntityKind] {
        &[
            Self::Category,
            Self::Content,
            Self::ContentType,
            Self::Crawler,
            Self::Desktop,
            Self::Expression,
            Self::Item,
            Self::Link,
            Self::Module,
            Self::Organization,
            Self::Portlet,
            Self::Role,
            Self::SchedulingTask,
            Self::Site,
            Self::Book,
        ]
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
