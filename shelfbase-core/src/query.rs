// src/query.rs
//! Document matching
//!
//! Two separate predicates live here:
//!
//! - [`exact::matches_exact`] - flat strict equality across every query
//!   field (logical AND, no operators). Used by `read`, `update`, `remove`.
//! - [`operators::matches_where`] - the condition tree with `$eq`/`$gt`/`$lt`
//!   style field operators and `$and`/`$or`/`$not` composition. Used only by
//!   `read_many`.
//!
//! A query like `{"age": {"$gt": 18}}` therefore means "age is greater than 18"
//! for `read_many`, but "age equals the object `{"$gt": 18}`" for `read`.

pub mod exact;
pub mod operators;

pub use exact::matches_exact;
pub use operators::{matches_condition, matches_where, Where};
