//! Authority/remote consistency over an in-memory transport: the authority
//! rule for deaths, placement propagation, full resync, and initial deltas.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use grid::{ContentId, GridConfig, GridPos, MemoryGrid, TileGrid};
use tile_entity::sync::{handle_message, notify_placed, request_sync};
use tile_entity::{
    Role, TemplateSpec, TickInput, TileBehavior, UpdateCtx, World, WorldConfig,
};
use wire::{ByteReader, ByteWriter, MemoryHub, PeerId, WireError, AUTHORITY};

const CONTENT: ContentId = ContentId(7);
const REMOTE: PeerId = PeerId(1);
const REMOTE2: PeerId = PeerId(2);

#[derive(Clone)]
struct ChargeBehavior {
    charge: Arc<AtomicI64>,
}

impl ChargeBehavior {
    fn new(charge: &Arc<AtomicI64>) -> Box<dyn TileBehavior> {
        Box::new(Self {
            charge: charge.clone(),
        })
    }
}

impl TileBehavior for ChargeBehavior {
    fn clone_box(&self) -> Box<dyn TileBehavior> {
        Box::new(self.clone())
    }

    fn update(&mut self, _ctx: &mut UpdateCtx<'_>) {}

    fn net_write(&self, out: &mut ByteWriter) -> Result<(), WireError> {
        out.write_u64(self.charge.load(Ordering::SeqCst) as u64);
        Ok(())
    }

    fn net_read(&mut self, input: &mut ByteReader<'_>) -> Result<(), WireError> {
        self.charge.store(input.read_u64()? as i64, Ordering::SeqCst);
        Ok(())
    }
}

fn peer(role: Role) -> (World, Arc<AtomicI64>) {
    let charge = Arc::new(AtomicI64::new(0));
    let mut world = World::new(role, WorldConfig::default());
    world.catalog.register(
        TemplateSpec::new("base", "cell", ChargeBehavior::new(&charge)).with_attach(CONTENT),
    );
    (world, charge)
}

fn deliver(
    frames: Vec<Vec<u8>>,
    world: &mut World,
    grid: &mut MemoryGrid,
    sink: &mut MemoryHub,
    from: PeerId,
) {
    for frame in frames {
        handle_message(world, grid, sink, from, &frame).unwrap();
    }
}

#[test]
fn remote_death_waits_for_authority_broadcast() {
    let (mut authority, _) = peer(Role::Authority);
    let (mut remote, _) = peer(Role::Remote);

    let mut grid_a = MemoryGrid::new(GridConfig::default());
    grid_a.place(10, 5, CONTENT, 1, 1).unwrap();
    let mut grid_r = grid_a.clone();

    authority.world_scan(&grid_a);
    remote.world_scan(&grid_r);

    let mut hub_a = MemoryHub::new();
    hub_a.add_peer(REMOTE);
    let mut hub_r = MemoryHub::new();
    hub_r.add_peer(AUTHORITY);

    // The remote's local predicate turns true, but the authority has not
    // spoken: the entity must stay active.
    grid_r.clear(10, 5);
    for _ in 0..5 {
        remote.tick(&grid_r, &mut hub_r, &TickInput::default());
    }
    assert_eq!(remote.table.active_len(), 1);

    // Now the authority sees the same removal, kills, and broadcasts.
    grid_a.clear(10, 5);
    authority.tick(&grid_a, &mut hub_a, &TickInput::default());
    assert_eq!(authority.table.active_len(), 0);

    // The very next processed message deactivates the remote instance.
    deliver(
        hub_a.drain(REMOTE),
        &mut remote,
        &mut grid_r,
        &mut hub_r,
        AUTHORITY,
    );
    assert_eq!(remote.table.active_len(), 0);
}

#[test]
fn placement_propagates_exactly_one_hop() {
    let (mut authority, _) = peer(Role::Authority);
    let (mut remote1, _) = peer(Role::Remote);
    let (mut remote2, _) = peer(Role::Remote);

    let mut grid_a = MemoryGrid::new(GridConfig::default());
    let mut grid_r1 = MemoryGrid::new(GridConfig::default());
    let mut grid_r2 = MemoryGrid::new(GridConfig::default());

    let mut hub_a = MemoryHub::new();
    hub_a.add_peer(REMOTE);
    hub_a.add_peer(REMOTE2);
    let mut hub_r1 = MemoryHub::new();
    hub_r1.add_peer(AUTHORITY);
    let mut hub_r2 = MemoryHub::new();
    hub_r2.add_peer(AUTHORITY);

    // Peer 1 places locally (the host already wrote its grid).
    grid_r1.place(5, 5, CONTENT, 1, 1).unwrap();
    notify_placed(&mut remote1, &mut hub_r1, CONTENT, GridPos::new(5, 5), Some(99));
    assert_eq!(remote1.table.active_len(), 1);

    // The authority applies it and relays to the other peer only.
    deliver(
        hub_r1.drain(AUTHORITY),
        &mut authority,
        &mut grid_a,
        &mut hub_a,
        REMOTE,
    );
    assert_eq!(authority.table.active_len(), 1);
    assert_eq!(hub_a.pending(REMOTE), 0);
    assert_eq!(hub_a.pending(REMOTE2), 1);

    // Peer 2 applies without echoing anything back.
    deliver(
        hub_a.drain(REMOTE2),
        &mut remote2,
        &mut grid_r2,
        &mut hub_r2,
        AUTHORITY,
    );
    assert_eq!(remote2.table.active_len(), 1);
    assert_eq!(hub_r2.pending(AUTHORITY), 0);
    // The relayed placement also mirrored the grid content.
    assert_eq!(grid_r2.cell(5, 5).unwrap().content, Some(CONTENT));
}

#[test]
fn join_resync_reproduces_authority_state() {
    let (mut authority, charge_a) = peer(Role::Authority);
    let mut grid_a = MemoryGrid::new(GridConfig::default());
    for x in 0..12 {
        grid_a.place(x * 3, 4, CONTENT, 1, 1).unwrap();
    }
    authority.world_scan(&grid_a);
    authority.config.max_records_per_message = 5;
    charge_a.store(31, Ordering::SeqCst);

    // A joining peer with an empty grid asks for everything.
    let (mut remote, charge_r) = peer(Role::Remote);
    let mut grid_r = MemoryGrid::new(GridConfig::default());
    let mut hub_a = MemoryHub::new();
    hub_a.add_peer(REMOTE);
    let mut hub_r = MemoryHub::new();
    hub_r.add_peer(AUTHORITY);

    request_sync(&mut hub_r, true);
    deliver(
        hub_r.drain(AUTHORITY),
        &mut authority,
        &mut grid_a,
        &mut hub_a,
        REMOTE,
    );
    // 12 records at 5 per message.
    assert_eq!(hub_a.pending(REMOTE), 3);

    deliver(
        hub_a.drain(REMOTE),
        &mut remote,
        &mut grid_r,
        &mut hub_r,
        AUTHORITY,
    );
    assert_eq!(remote.table.active_len(), 12);
    assert_eq!(charge_r.load(Ordering::SeqCst), 31);

    // The recreate path rebuilt the remote's missing grid content.
    assert_eq!(grid_r.cell(9, 4).unwrap().content, Some(CONTENT));

    // Re-applying the whole response is harmless.
    request_sync(&mut hub_r, false);
    deliver(
        hub_r.drain(AUTHORITY),
        &mut authority,
        &mut grid_a,
        &mut hub_a,
        REMOTE,
    );
    deliver(
        hub_a.drain(REMOTE),
        &mut remote,
        &mut grid_r,
        &mut hub_r,
        AUTHORITY,
    );
    assert_eq!(remote.table.active_len(), 12);
}

#[test]
fn remote_placement_sends_initial_state_once() {
    let (mut remote, charge_r) = peer(Role::Remote);
    let mut grid_r = MemoryGrid::new(GridConfig::default());
    grid_r.place(2, 2, CONTENT, 1, 1).unwrap();

    let mut hub_r = MemoryHub::new();
    hub_r.add_peer(AUTHORITY);

    charge_r.store(64, Ordering::SeqCst);
    notify_placed(&mut remote, &mut hub_r, CONTENT, GridPos::new(2, 2), Some(7));
    // The placement report itself.
    assert_eq!(hub_r.pending(AUTHORITY), 1);

    // First tick after insertion: one immediate state message, none after.
    remote.tick(&grid_r, &mut hub_r, &TickInput::default());
    assert_eq!(hub_r.pending(AUTHORITY), 2);
    remote.tick(&grid_r, &mut hub_r, &TickInput::default());
    assert_eq!(hub_r.pending(AUTHORITY), 2);

    // The authority accepts both messages and ends up with the state.
    let (mut authority, charge_a) = peer(Role::Authority);
    let mut grid_a = MemoryGrid::new(GridConfig::default());
    let mut hub_a = MemoryHub::new();
    hub_a.add_peer(REMOTE);
    deliver(
        hub_r.drain(AUTHORITY),
        &mut authority,
        &mut grid_a,
        &mut hub_a,
        REMOTE,
    );
    assert_eq!(authority.table.active_len(), 1);
    assert_eq!(charge_a.load(Ordering::SeqCst), 64);
}
