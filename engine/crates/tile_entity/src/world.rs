use grid::{ContentId, GridPos, TileGrid};
use record::Record;

use crate::anchor;
use crate::catalog::{TemplateCatalog, TemplateId};
use crate::draw::{self, DrawSurface};
use crate::entity::{Payload, TileEntity};
use crate::hooks::GlobalHooks;
use crate::persist;
use crate::table::EntityTable;

/// Which side of the authority protocol this peer plays. Death and placement
/// decisions bind only when made by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Authority,
    Remote,
}

#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Hard upper bound on table slots.
    pub capacity: usize,
    /// World-space radius within which a participant keeps entities updating.
    /// 0 disables suspension.
    pub idle_distance: i32,
    /// Resync chunk cap by record count.
    pub max_records_per_message: usize,
    /// Resync chunk cap by serialized bytes; an over-budget chunk is dropped.
    pub max_message_bytes: usize,
    /// Outbound delta budget per instance per rate window.
    pub max_sends_per_window: u32,
    pub debug_overlay: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            idle_distance: 0,
            max_records_per_message: 100,
            max_message_bytes: 60_000,
            max_sends_per_window: 10,
            debug_overlay: false,
        }
    }
}

/// Everything the manager owns: catalog, table, hooks, counters. There is no
/// ambient state; several worlds can coexist in one process.
pub struct World {
    pub config: WorldConfig,
    pub role: Role,
    pub catalog: TemplateCatalog,
    pub table: EntityTable,
    pub hooks: GlobalHooks,
    pub(crate) counters: Vec<u32>,
    pub(crate) tick_number: u64,
    pub(crate) pending_save: Option<Record>,
}

impl World {
    pub fn new(role: Role, config: WorldConfig) -> Self {
        let capacity = config.capacity;
        Self {
            config,
            role,
            catalog: TemplateCatalog::new(),
            table: EntityTable::new(capacity),
            hooks: GlobalHooks::new(),
            counters: Vec::new(),
            tick_number: 0,
            pending_save: None,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.tick_number
    }

    /// In-world instance count for `template`, as computed by the last
    /// per-entity pass.
    pub fn count_of(&self, template: TemplateId) -> u32 {
        self.counters.get(template.0 as usize).copied().unwrap_or(0)
    }

    /// Clone one specific template into the table at `anchor`. Silently
    /// no-ops (None) once the table is at capacity.
    pub fn spawn_template(
        &mut self,
        template: TemplateId,
        anchor: GridPos,
        placed_by_item: Option<u32>,
    ) -> Option<u32> {
        let t = self.catalog.get(template)?;
        let behavior = t.spawn_behavior();
        let slot = self
            .table
            .alloc(|slot| TileEntity::known(slot, template, behavior, anchor, placed_by_item));
        if slot.is_none() {
            tracing::debug!(template = template.0, anchor = %anchor, "entity table full, spawn ignored");
        }
        slot
    }

    /// Instantiate every template registered against `content` at `anchor`.
    /// None content never spawns anything. Returns the first slot created.
    pub fn insert(
        &mut self,
        content: Option<ContentId>,
        anchor: GridPos,
        placed_by_item: Option<u32>,
    ) -> Option<u32> {
        let content = content?;
        let ids: Vec<TemplateId> = self.catalog.templates_for(content).to_vec();
        let mut first = None;
        for tid in ids {
            if let Some(slot) = self.spawn_template(tid, anchor, placed_by_item) {
                first.get_or_insert(slot);
            }
        }
        first
    }

    /// Queue save data to apply after the next world scan.
    pub fn prepare_load(&mut self, data: Record) {
        self.pending_save = Some(data);
    }

    /// Clear and repopulate the table from a full grid scan, apply any queued
    /// save data against the scanned entities, then fire every instance's
    /// loaded callback.
    pub fn world_scan(&mut self, grid: &dyn TileGrid) {
        self.table.clear();
        let cfg = grid.config().clone();
        for y in cfg.origin_y..cfg.origin_y + cfg.height as i32 {
            for x in cfg.origin_x..cfg.origin_x + cfg.width as i32 {
                let Some(view) = grid.cell(x, y) else { continue };
                let Some(content) = view.content else { continue };
                if self.catalog.templates_for(content).is_empty() {
                    continue;
                }
                if let Some(anchor) = anchor::is_anchor(grid, &self.hooks, x, y) {
                    self.insert(Some(content), anchor, None);
                }
            }
        }

        if let Some(data) = self.pending_save.take() {
            match persist::load(self, &data) {
                Ok(stats) => tracing::debug!(
                    matched = stats.matched,
                    dropped = stats.dropped,
                    placeholders = stats.placeholders,
                    "applied saved entity data"
                ),
                Err(e) => tracing::warn!(error = %e, "failed to apply saved entity data"),
            }
        }

        for i in 0..self.table.slot_count() as u32 {
            let Some(ent) = self.table.get_mut(i) else { continue };
            if !ent.active {
                continue;
            }
            let anchor = ent.anchor;
            if let Payload::Known { behavior, .. } = &mut ent.payload {
                behavior.loaded(anchor);
            }
        }
        tracing::info!(entities = self.table.active_len(), "world scan complete");
    }

    /// Serialize every active instance for the host's world save.
    pub fn save(&self) -> Record {
        persist::save(self)
    }

    pub fn draw(&self, surface: &mut dyn DrawSurface) {
        draw::draw_world(self, surface);
    }
}
