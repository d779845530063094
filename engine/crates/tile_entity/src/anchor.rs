use grid::{GridPos, TileGrid};

use crate::hooks::{last_non_empty, GlobalHooks};

/// Tests whether (x, y) is the canonical top-left anchor of the structure
/// occupying it, returning the anchor coordinate on success.
///
/// The default answer comes from the grid's own multi-cell convention; every
/// registered anchor hook is then consulted in registration order and the
/// last non-abstaining hook wins.
pub fn is_anchor(grid: &dyn TileGrid, hooks: &GlobalHooks, x: i32, y: i32) -> Option<GridPos> {
    let here = GridPos::new(x, y);
    let default = match grid.structure_origin(x, y) {
        Some(origin) if origin == here => Some(here),
        _ => None,
    };
    last_non_empty(hooks.anchor().iter().map(|h| h(grid, x, y)), default)
}

/// Placement-time counterpart: resolves the anchor of the structure
/// containing (x, y), wherever in the footprint the query lands. Same hook
/// override chain as `is_anchor`.
pub fn resolve_anchor(grid: &dyn TileGrid, hooks: &GlobalHooks, x: i32, y: i32) -> Option<GridPos> {
    let default = grid.structure_origin(x, y);
    last_non_empty(hooks.anchor().iter().map(|h| h(grid, x, y)), default)
}
