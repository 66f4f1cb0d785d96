use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, ProductId};

/// A persisted product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Category label (free text, not a taxonomy reference).
    pub category: String,
    /// Price in smallest currency unit (e.g., cents).
    pub price: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product ready to be inserted; the store assigns its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub price: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewProduct {
    /// Attach the store-assigned id.
    pub fn with_id(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            category: self.category,
            price: self.price,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    pub category: String,
    pub price: u64,
}

impl CreateProduct {
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: u64) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            price,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }

        if self.price == 0 {
            return Err(DomainError::validation("price must be at least 1"));
        }

        Ok(())
    }

    /// Validate and stamp the creation time on both timestamps.
    pub fn into_new_product(self, now: DateTime<Utc>) -> DomainResult<NewProduct> {
        self.validate()?;
        Ok(NewProduct {
            name: self.name,
            category: self.category,
            price: self.price,
            created_at: now,
            updated_at: now,
        })
    }
}
