use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use storefront_core::CategoryId;

/// Parent id carried by top-level categories.
pub const ROOT_CATEGORY_PARENT_ID: CategoryId = CategoryId::new(0);

/// A category row as returned by the category store.
///
/// Records carry no hierarchy information beyond `parent_id`; the cache layer
/// derives `children` from a complete fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub parent_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub visible: bool,
    /// Advisory sort order (lower first).
    pub weight: i32,
}

impl CategoryRecord {
    pub fn new(id: i64, parent_id: i64, name: impl Into<String>) -> Self {
        Self {
            id: CategoryId::new(id),
            parent_id: CategoryId::new(parent_id),
            name: name.into(),
            description: None,
            visible: true,
            weight: 0,
        }
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_CATEGORY_PARENT_ID
    }
}

/// Node of the cached category hierarchy.
///
/// `children` is a back-reference set (ids only), computed from the same
/// fetch that produced this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub parent_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub visible: bool,
    pub weight: i32,
    pub children: BTreeSet<CategoryId>,
}

impl Category {
    pub fn from_record(record: CategoryRecord, children: BTreeSet<CategoryId>) -> Self {
        Self {
            id: record.id,
            parent_id: record.parent_id,
            name: record.name,
            description: record.description,
            visible: record.visible,
            weight: record.weight,
            children,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_CATEGORY_PARENT_ID
    }

    /// Sort key used when presenting sibling categories.
    pub fn display_order(&self) -> (i32, CategoryId) {
        (self.weight, self.id)
    }
}
