use grid::{GridPos, TileGrid};
use record::Record;
use wire::{ByteReader, ByteWriter, WireError};

use crate::catalog::Template;
use crate::draw::DrawSurface;
use crate::world::Role;

/// Context handed to per-instance behavior callbacks.
pub struct UpdateCtx<'a> {
    pub grid: &'a dyn TileGrid,
    pub anchor: GridPos,
    pub slot: u32,
    pub template: &'a Template,
    pub tick: u64,
    pub role: Role,
    /// Set by the behavior to request an outbound state push for this
    /// instance. Subject to the per-instance rate limit.
    pub request_sync: bool,
}

/// Per-type entity logic. One long-lived instance per registered template;
/// live entities hold clones produced by `clone_box`.
///
/// Every method except `clone_box` has a default, so concrete behaviors only
/// implement the parts they use.
pub trait TileBehavior: Send {
    /// Explicit clone factory for instantiating this template.
    fn clone_box(&self) -> Box<dyn TileBehavior>;

    /// One-time per-template setup, run once at registration.
    fn static_setup(&mut self) {}

    /// One-time per-instance setup, run on the instance's first tick.
    fn init(&mut self, _ctx: &mut UpdateCtx<'_>) {}

    /// Fired after a world scan has (re)created this instance.
    fn loaded(&mut self, _anchor: GridPos) {}

    /// Per-tick logic. Skipped while no participant is within idle range.
    fn update(&mut self, _ctx: &mut UpdateCtx<'_>) {}

    /// Once-per-tick per-type callback, invoked on the catalog's template
    /// instance whenever at least one instance of the type is in-world.
    fn singleton_update(&mut self, _tick: u64) {}

    /// Fired just before the instance is deactivated.
    fn on_kill(&mut self, _anchor: GridPos) {}

    /// Death predicate. The default dies when the anchored cell no longer
    /// carries the template's target content. Only the authority acts on it;
    /// global death hooks may override the result (last non-abstaining wins).
    fn is_dead(&self, grid: &dyn TileGrid, template: &Template, anchor: GridPos) -> bool {
        match template.attach {
            Some(content) => {
                grid.cell(anchor.x, anchor.y).and_then(|v| v.content) != Some(content)
            }
            None => false,
        }
    }

    /// Write custom persistent state. An untouched record means the save
    /// envelope carries no data section.
    fn save(&self, _out: &mut Record) {}

    /// Restore custom persistent state written by `save`.
    fn load(&mut self, _data: &Record) {}

    /// Write the custom network payload for resync and delta messages.
    fn net_write(&self, _out: &mut ByteWriter) -> Result<(), WireError> {
        Ok(())
    }

    /// Apply a network payload produced by `net_write`.
    fn net_read(&mut self, _input: &mut ByteReader<'_>) -> Result<(), WireError> {
        Ok(())
    }

    /// Whether this type participates in resync and delta traffic.
    fn wants_net_sync(&self) -> bool {
        true
    }

    fn draw_back(&self, _template: &Template, _anchor: GridPos, _surface: &mut dyn DrawSurface) {}

    fn draw(&self, _template: &Template, _anchor: GridPos, _surface: &mut dyn DrawSurface) {}

    fn draw_front(&self, _template: &Template, _anchor: GridPos, _surface: &mut dyn DrawSurface) {}

    /// Extra world-space margin added to the visibility bounding test.
    fn extra_frame_margin(&self) -> i32 {
        0
    }
}
