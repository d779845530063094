use std::time::Instant;

use serde::{Deserialize, Serialize};

use grid::{ContentId, MemoryGrid, TileGrid};
use record::Record;
use tile_entity::{SaveFile, TemplateSpec, TickInput, TileBehavior, UpdateCtx, World};
use wire::transport::NullSink;
use wire::{ByteReader, ByteWriter, WireError};

/// Content type the demo template attaches to.
const PULSE_CONTENT: ContentId = ContentId(1);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PulseState {
    ticks: u64,
}

/// Minimal demo behavior: counts its own ticks and persists the tally.
#[derive(Debug, Clone, Default)]
struct PulseBehavior {
    state: PulseState,
}

impl TileBehavior for PulseBehavior {
    fn clone_box(&self) -> Box<dyn TileBehavior> {
        Box::new(self.clone())
    }

    fn update(&mut self, _ctx: &mut UpdateCtx<'_>) {
        self.state.ticks += 1;
    }

    fn save(&self, out: &mut Record) {
        if let Ok(bytes) = postcard::to_allocvec(&self.state) {
            out.set_bytes("state", bytes);
        }
    }

    fn load(&mut self, data: &Record) {
        if let Some(bytes) = data.get_bytes("state") {
            self.state = postcard::from_bytes(bytes).unwrap_or_default();
        }
    }

    fn net_write(&self, out: &mut ByteWriter) -> Result<(), WireError> {
        let bytes = postcard::to_allocvec(&self.state).unwrap_or_default();
        out.write_bytes(&bytes)
    }

    fn net_read(&mut self, input: &mut ByteReader<'_>) -> Result<(), WireError> {
        let bytes = input.read_bytes()?;
        self.state = postcard::from_bytes(bytes).unwrap_or_default();
        Ok(())
    }
}

fn seed_demo_world(grid: &mut MemoryGrid) {
    for &(x, y) in &[(10, 10), (40, 25), (100, 80)] {
        if let Err(e) = grid.place(x, y, PULSE_CONTENT, 1, 1) {
            tracing::warn!(x, y, error = %e, "could not seed demo cell");
        }
    }
}

fn main() {
    let config = tile_engine::config::parse_cli_args();
    observability::init_logging();
    tracing::info!(mode = ?config.mode, tps = config.tick.tps, "starting tile server");

    let mut grid = MemoryGrid::new(config.to_grid_config());
    seed_demo_world(&mut grid);

    let mut world = World::new(config.to_role(), config.to_world_config());
    world.catalog.register(
        TemplateSpec::new("demo", "pulse", Box::<PulseBehavior>::default())
            .with_attach(PULSE_CONTENT),
    );

    let save_file = SaveFile::new(&config.persistence.save_dir);
    if save_file.has_latest() {
        match save_file.load_latest() {
            Ok(saved) => {
                tracing::info!(tick = saved.tick, "resuming from previous save");
                world.prepare_load(saved.data);
            }
            Err(e) => tracing::warn!(error = %e, "could not load previous save, starting fresh"),
        }
    }
    world.world_scan(&grid);

    // The demo runs without peers; a real host wires a transport here.
    let mut sink = NullSink;
    let tick_duration = config.tick_duration();

    loop {
        if config.tick.max_ticks > 0 && world.current_tick() >= config.tick.max_ticks {
            break;
        }
        let tick_start = Instant::now();
        world.tick(&grid, &mut sink, &TickInput::default());

        if config.persistence.autosave_interval > 0
            && world.current_tick() % config.persistence.autosave_interval == 0
        {
            if let Err(e) = save_file.save_to_disk(&world.save(), world.current_tick()) {
                tracing::error!(error = %e, "autosave failed");
            }
        }

        let elapsed = tick_start.elapsed();
        if elapsed < tick_duration {
            std::thread::sleep(tick_duration - elapsed);
        }
    }

    if let Err(e) = save_file.save_to_disk(&world.save(), world.current_tick()) {
        tracing::error!(error = %e, "final save failed");
    }
    tracing::info!(
        ticks = world.current_tick(),
        entities = world.table.active_len(),
        "shutdown"
    );
}
