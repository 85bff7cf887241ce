//! Alias maps and join-result hydration for relmap.
//!
//! - `AliasMap` describes which entity each alias of a joined query selects
//!   and how aliases nest through relations.
//! - `Hydrator` turns the flat, duplicate-laden rows of such a query back
//!   into deduplicated nested entities.

pub mod alias;
pub mod hydrate;

pub use alias::{Alias, AliasMap};
pub use hydrate::Hydrator;
