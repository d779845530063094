use serde::{Deserialize, Serialize};

use crate::model::{CellView, ContentId, GridConfig, GridError, GridPos, TileGrid};

/// Dense in-memory grid, the reference `TileGrid` implementation used by the
/// demo binary and tests. The real host supplies its own tile storage.
#[derive(Debug, Clone)]
pub struct MemoryGrid {
    config: GridConfig,
    cells: Vec<CellView>,
}

impl MemoryGrid {
    pub fn new(config: GridConfig) -> Self {
        let cells = vec![CellView::empty(); (config.width * config.height) as usize];
        Self { config, cells }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let col = (x - self.config.origin_x) as usize;
        let row = (y - self.config.origin_y) as usize;
        Some(row * self.config.width as usize + col)
    }

    /// Number of non-empty cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.content.is_some()).count()
    }

    /// Capture the full grid state as a serializable snapshot.
    pub fn snapshot_state(&self) -> MemoryGridSnapshot {
        MemoryGridSnapshot {
            config: self.config.clone(),
            cells: self.cells.clone(),
        }
    }

    /// Restore grid state from a snapshot, replacing all current data.
    pub fn restore_from_snapshot(&mut self, snapshot: MemoryGridSnapshot) {
        self.config = snapshot.config;
        self.cells = snapshot.cells;
    }
}

impl TileGrid for MemoryGrid {
    fn config(&self) -> &GridConfig {
        &self.config
    }

    fn cell(&self, x: i32, y: i32) -> Option<CellView> {
        self.index(x, y).map(|i| self.cells[i])
    }

    fn place(
        &mut self,
        x: i32,
        y: i32,
        content: ContentId,
        w: u8,
        h: u8,
    ) -> Result<(), GridError> {
        // Validate the whole footprint before writing anything.
        for dy in 0..h {
            for dx in 0..w {
                let cx = x + dx as i32;
                let cy = y + dy as i32;
                match self.index(cx, cy) {
                    None => return Err(GridError::OutOfBounds { x: cx, y: cy }),
                    Some(i) => {
                        if self.cells[i].content.is_some() {
                            return Err(GridError::Occupied { x: cx, y: cy });
                        }
                    }
                }
            }
        }
        for dy in 0..h {
            for dx in 0..w {
                if let Some(i) = self.index(x + dx as i32, y + dy as i32) {
                    self.cells[i] = CellView {
                        content: Some(content),
                        origin_dx: dx,
                        origin_dy: dy,
                    };
                }
            }
        }
        tracing::trace!(x, y, content = content.0, w, h, "placed structure");
        Ok(())
    }

    fn clear(&mut self, x: i32, y: i32) {
        let Some(origin) = self.structure_origin(x, y) else {
            return;
        };
        let Some((w, h)) = self.structure_size(x, y) else {
            return;
        };
        for dy in 0..h {
            for dx in 0..w {
                if let Some(i) = self.index(origin.x + dx as i32, origin.y + dy as i32) {
                    self.cells[i] = CellView::empty();
                }
            }
        }
    }
}

/// Serializable snapshot of the entire in-memory grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryGridSnapshot {
    pub config: GridConfig,
    pub cells: Vec<CellView>,
}
