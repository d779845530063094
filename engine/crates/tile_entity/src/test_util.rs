//! Shared test doubles for the crate's unit tests.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;

use grid::{ContentId, GridPos};
use record::Record;
use wire::{ByteReader, ByteWriter, WireError};

use crate::behavior::{TileBehavior, UpdateCtx};
use crate::catalog::{Template, TemplateSpec};
use crate::draw::{DrawLayer, DrawSurface};
use crate::world::{Role, World, WorldConfig};

/// Shared event counter observable from outside the world.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicU32>);

impl Counter {
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shared i64 cell, used for the probe's custom state so tests can read and
/// seed it without downcasting behaviors.
#[derive(Clone, Default)]
pub struct Cell64(Arc<AtomicI64>);

impl Cell64 {
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, v: i64) {
        self.0.store(v, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct Counters {
    pub static_setups: Counter,
    pub inits: Counter,
    pub updates: Counter,
    pub singletons: Counter,
    pub kills: Counter,
    pub loads: Counter,
    /// Persisted custom state.
    pub fuel: Cell64,
    /// Net-synced custom state.
    pub charge: Cell64,
}

/// Configurable behavior double covering every extension point.
#[derive(Clone)]
pub struct ProbeBehavior {
    counters: Counters,
    panic_on_update: bool,
    push_updates: bool,
    sync_eligible: bool,
    save_nothing: bool,
}

impl ProbeBehavior {
    pub fn new(counters: Counters) -> Self {
        Self {
            counters,
            panic_on_update: false,
            push_updates: false,
            sync_eligible: true,
            save_nothing: false,
        }
    }

    /// Panic on every update.
    pub fn panicking(mut self) -> Self {
        self.panic_on_update = true;
        self
    }

    /// Request an outbound delta on every update.
    pub fn pushing(mut self) -> Self {
        self.push_updates = true;
        self
    }

    /// Opt out of resync and delta traffic.
    pub fn unsynced(mut self) -> Self {
        self.sync_eligible = false;
        self
    }

    /// Write no persistent data.
    pub fn silent(mut self) -> Self {
        self.save_nothing = true;
        self
    }
}

impl TileBehavior for ProbeBehavior {
    fn clone_box(&self) -> Box<dyn TileBehavior> {
        Box::new(self.clone())
    }

    fn static_setup(&mut self) {
        self.counters.static_setups.bump();
    }

    fn init(&mut self, _ctx: &mut UpdateCtx<'_>) {
        self.counters.inits.bump();
    }

    fn loaded(&mut self, _anchor: GridPos) {
        self.counters.loads.bump();
    }

    fn update(&mut self, ctx: &mut UpdateCtx<'_>) {
        if self.panic_on_update {
            panic!("probe update fault");
        }
        self.counters.updates.bump();
        if self.push_updates {
            self.counters.charge.set(self.counters.charge.get() + 1);
            ctx.request_sync = true;
        }
    }

    fn singleton_update(&mut self, _tick: u64) {
        self.counters.singletons.bump();
    }

    fn on_kill(&mut self, _anchor: GridPos) {
        self.counters.kills.bump();
    }

    fn save(&self, out: &mut Record) {
        if !self.save_nothing {
            out.set_i64("fuel", self.counters.fuel.get());
        }
    }

    fn load(&mut self, data: &Record) {
        self.counters.fuel.set(data.get_i64("fuel").unwrap_or(0));
    }

    fn net_write(&self, out: &mut ByteWriter) -> Result<(), WireError> {
        out.write_u64(self.counters.charge.get() as u64);
        Ok(())
    }

    fn net_read(&mut self, input: &mut ByteReader<'_>) -> Result<(), WireError> {
        self.counters.charge.set(input.read_u64()? as i64);
        Ok(())
    }

    fn wants_net_sync(&self) -> bool {
        self.sync_eligible
    }

    fn draw_back(&self, template: &Template, anchor: GridPos, surface: &mut dyn DrawSurface) {
        surface.sprite(DrawLayer::Back, template.id, anchor);
    }

    fn draw(&self, template: &Template, anchor: GridPos, surface: &mut dyn DrawSurface) {
        surface.sprite(DrawLayer::Main, template.id, anchor);
    }

    fn draw_front(&self, template: &Template, anchor: GridPos, surface: &mut dyn DrawSurface) {
        surface.sprite(DrawLayer::Front, template.id, anchor);
    }
}

/// A world with one probe template registered against content type 7.
pub fn test_world(role: Role, counters: &Counters) -> World {
    let mut world = World::new(role, WorldConfig::default());
    world.catalog.register(
        TemplateSpec::new(
            "test",
            "probe",
            Box::new(ProbeBehavior::new(counters.clone())),
        )
        .with_attach(ContentId(7)),
    );
    world
}
