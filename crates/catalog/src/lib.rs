//! Catalog domain module.
//!
//! This crate contains the product and category types shared by the cache
//! layer and its stores, implemented as plain data plus deterministic
//! validation (no IO, no HTTP, no storage).

pub mod category;
pub mod page;
pub mod product;

pub use category::{Category, CategoryRecord, ROOT_CATEGORY_PARENT_ID};
pub use page::{Page, ProductQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use product::{CreateProduct, NewProduct, Product};
