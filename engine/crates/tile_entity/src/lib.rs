//! Tile-anchored entity manager.
//!
//! Behavior templates are registered in a catalog, instantiated into a
//! slot-reusing table when grid scans or placements find matching anchors,
//! ticked once per simulation frame, persisted as hierarchical records, and
//! kept consistent across an authority and its remote peers.

pub mod anchor;
pub mod behavior;
pub mod catalog;
pub mod draw;
pub mod entity;
pub mod hooks;
pub mod persist;
pub mod sync;
pub mod table;
pub mod tick;
pub mod world;

#[cfg(test)]
pub(crate) mod test_util;

pub use behavior::{TileBehavior, UpdateCtx};
pub use catalog::{CatalogError, Template, TemplateCatalog, TemplateId, TemplateSpec};
pub use draw::{DrawLayer, DrawSurface, RecordingSurface};
pub use entity::{Payload, TileEntity};
pub use hooks::GlobalHooks;
pub use persist::{LoadStats, PersistError, SaveFile, SavedWorld, SAVE_KEY, SAVE_VERSION};
pub use sync::{ApplyStats, SyncError};
pub use table::EntityTable;
pub use tick::{TickInput, ViewRect};
pub use world::{Role, World, WorldConfig};
