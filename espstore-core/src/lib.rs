//! # espstore
//!
//! Layered record storage for ordered game-data plugin files.
//!
//! Plugins form an ordered stack; every plugin may redefine any record,
//! and the last definition wins. On top of the merged static world the
//! engine creates records at runtime. Both layers sit behind one lookup
//! surface per record type:
//!
//! - [`Store`] — id-keyed records, case-insensitive, original case kept
//! - [`IndexedStore`] / [`AttributeStore`] — numeric-index records
//! - [`CellStore`] — interior and exterior cells, cross-plugin merge
//!   with moved-reference relocation
//! - [`LandStore`] / [`LandTextureStore`] — terrain height and texture
//!   data, the latter keyed per originating plugin
//! - [`PathgridStore`] — navigation meshes, classified against cells
//! - [`WorldStore`] — the aggregate, one tag-dispatched load surface
//!
//! ## Lifecycle Contract
//!
//! Load every plugin, call `set_up` exactly once, then query freely.
//! After `set_up` the static layers never change; concurrent reads are
//! safe. Runtime records enter through `insert` and leave through
//! `erase`, never disturbing the static layer.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cell_store;
pub mod codec;
pub mod error;
pub mod indexed;
pub mod pathgrid_store;
pub mod records;
pub mod store;
pub mod terrain;
pub mod types;
pub mod world;

pub use cell_store::CellStore;
pub use error::{Result, StoreError};
pub use indexed::{AttributeStore, IndexedStore};
pub use pathgrid_store::PathgridStore;
pub use store::Store;
pub use terrain::{LandStore, LandTextureStore};
pub use types::*;
pub use world::WorldStore;
