pub mod memory_grid;
pub mod model;

pub use memory_grid::{MemoryGrid, MemoryGridSnapshot};
pub use model::{CellView, ContentId, GridConfig, GridError, GridPos, TileGrid, CELL_SIZE};
