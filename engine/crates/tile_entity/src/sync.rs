//! Authority/remote state synchronization: placement propagation, chunked
//! full resync with marker recovery, authoritative kills, and incremental
//! per-entity deltas.

use grid::{ContentId, GridPos, TileGrid};
use wire::{
    read_frame, write_frame, ByteReader, ByteWriter, MessageKind, MessageSink, PeerId, WireError,
    AUTHORITY, RECORD_MARKER,
};

use crate::anchor;
use crate::catalog::{TemplateCatalog, TemplateId};
use crate::entity::{Payload, TileEntity};
use crate::world::{Role, World};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("{0:?} message not valid for this peer's role")]
    WrongRole(MessageKind),
}

/// Outcome of applying one resync chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub applied: usize,
    pub skipped: usize,
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    write_frame(&mut out, payload);
    out
}

// --- encoding ---

pub fn encode_place(content: ContentId, anchor: GridPos) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u8(MessageKind::Place.as_u8());
    w.write_u16(content.0);
    w.write_i32(anchor.x);
    w.write_i32(anchor.y);
    frame(w.as_bytes())
}

pub fn encode_sync_request(initial_join: bool) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u8(MessageKind::SyncRequest.as_u8());
    w.write_bool(initial_join);
    frame(w.as_bytes())
}

pub fn encode_kill(template: TemplateId, anchor: GridPos) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u8(MessageKind::Kill.as_u8());
    w.write_u16(template.0);
    w.write_i32(anchor.x);
    w.write_i32(anchor.y);
    frame(w.as_bytes())
}

/// Build a delta message carrying one instance's current net payload.
pub(crate) fn encode_delta_for(catalog: &TemplateCatalog, ent: &TileEntity) -> Option<Vec<u8>> {
    let Payload::Known { template, behavior } = &ent.payload else {
        return None;
    };
    let t = catalog.get(*template)?;
    let mut payload = ByteWriter::new();
    if let Err(e) = behavior.net_write(&mut payload) {
        tracing::warn!(
            module = %t.module,
            name = %t.name,
            x = ent.anchor.x,
            y = ent.anchor.y,
            error = %e,
            "failed to encode entity delta"
        );
        return None;
    }
    let mut w = ByteWriter::new();
    w.write_u8(MessageKind::Delta.as_u8());
    w.write_u16(template.0);
    w.write_i32(ent.anchor.x);
    w.write_i32(ent.anchor.y);
    w.write_bytes(payload.as_bytes()).ok()?;
    Some(frame(w.as_bytes()))
}

/// One self-describing record: marker, identity strings, anchor, dimensions,
/// then the length-prefixed behavior payload.
fn encode_record(
    out: &mut ByteWriter,
    catalog: &TemplateCatalog,
    ent: &TileEntity,
) -> Result<bool, WireError> {
    let Payload::Known { template, behavior } = &ent.payload else {
        return Ok(false);
    };
    if !behavior.wants_net_sync() {
        return Ok(false);
    }
    let Some(t) = catalog.get(*template) else {
        return Ok(false);
    };
    out.write_raw(&RECORD_MARKER);
    out.write_str(&t.module)?;
    out.write_str(&t.name)?;
    out.write_i32(ent.anchor.x);
    out.write_i32(ent.anchor.y);
    out.write_u8(t.size.0);
    out.write_u8(t.size.1);
    let mut payload = ByteWriter::new();
    behavior.net_write(&mut payload)?;
    out.write_bytes(payload.as_bytes())?;
    Ok(true)
}

/// Collect every sync-eligible instance into ordered chunk messages, capped
/// by record count and serialized size. A chunk that still exceeds the byte
/// cap after count-splitting is dropped with a warning: that data is lost
/// until the next request, and the log is the only witness.
pub fn build_sync_chunks(world: &World) -> Vec<Vec<u8>> {
    let mut records: Vec<Vec<u8>> = Vec::new();
    for ent in world.table.iter_active() {
        let mut w = ByteWriter::new();
        match encode_record(&mut w, &world.catalog, ent) {
            Ok(true) => records.push(w.into_bytes()),
            Ok(false) => {}
            Err(e) => tracing::warn!(
                x = ent.anchor.x,
                y = ent.anchor.y,
                error = %e,
                "failed to encode resync record"
            ),
        }
    }

    let cap = world.config.max_records_per_message.max(1);
    let mut out = Vec::new();
    for chunk in records.chunks(cap) {
        let mut w = ByteWriter::new();
        w.write_u8(MessageKind::SyncChunk.as_u8());
        w.write_u16(chunk.len() as u16);
        for rec in chunk {
            w.write_raw(rec);
        }
        if w.len() > world.config.max_message_bytes {
            tracing::warn!(
                bytes = w.len(),
                cap = world.config.max_message_bytes,
                records = chunk.len(),
                "resync chunk exceeds byte cap, dropped"
            );
            continue;
        }
        out.push(frame(w.as_bytes()));
    }
    out
}

/// Answer one peer's resync request with the full chunk sequence.
pub fn answer_sync_request(world: &World, sink: &mut dyn MessageSink, to: PeerId) {
    for msg in build_sync_chunks(world) {
        sink.send(to, msg);
    }
}

/// Ask the authority for a full resync.
pub fn request_sync(sink: &mut dyn MessageSink, initial_join: bool) {
    sink.send(AUTHORITY, encode_sync_request(initial_join));
}

/// A placement observed locally on this peer: spawn matching templates and
/// propagate. The authority broadcasts to everyone; a remote reports to the
/// authority only and relies on it to relay (one hop, never amplified).
pub fn notify_placed(
    world: &mut World,
    sink: &mut dyn MessageSink,
    content: ContentId,
    anchor: GridPos,
    placed_by_item: Option<u32>,
) -> Option<u32> {
    let slot = world.insert(Some(content), anchor, placed_by_item);
    let msg = encode_place(content, anchor);
    match world.role {
        Role::Authority => sink.broadcast(msg),
        Role::Remote => sink.send(AUTHORITY, msg),
    }
    slot
}

// --- decoding ---

/// Dispatch one received frame. The grid is mutable because resync records
/// may rebuild structures a partially-loaded peer is missing.
pub fn handle_message(
    world: &mut World,
    grid: &mut dyn TileGrid,
    sink: &mut dyn MessageSink,
    from: PeerId,
    frame_bytes: &[u8],
) -> Result<(), SyncError> {
    let payload = read_frame(frame_bytes)?;
    let mut r = ByteReader::new(payload);
    let kind = MessageKind::from_u8(r.read_u8()?)?;

    match kind {
        MessageKind::Place => {
            let content = ContentId(r.read_u16()?);
            let x = r.read_i32()?;
            let y = r.read_i32()?;
            apply_place(world, grid, content, GridPos::new(x, y));
            if world.role == Role::Authority {
                sink.broadcast_except(from, encode_place(content, GridPos::new(x, y)));
            }
        }
        MessageKind::SyncRequest => {
            if world.role != Role::Authority {
                return Err(SyncError::WrongRole(kind));
            }
            let initial_join = r.read_bool()?;
            tracing::debug!(peer = %from, initial_join, "answering resync request");
            answer_sync_request(world, sink, from);
        }
        MessageKind::SyncChunk => {
            if world.role != Role::Remote {
                return Err(SyncError::WrongRole(kind));
            }
            let stats = apply_sync_chunk(world, grid, &mut r)?;
            tracing::debug!(
                applied = stats.applied,
                skipped = stats.skipped,
                "applied resync chunk"
            );
        }
        MessageKind::Kill => {
            if world.role != Role::Remote {
                return Err(SyncError::WrongRole(kind));
            }
            let template = TemplateId(r.read_u16()?);
            let x = r.read_i32()?;
            let y = r.read_i32()?;
            apply_kill(world, template, GridPos::new(x, y));
        }
        MessageKind::Delta => {
            let template = TemplateId(r.read_u16()?);
            let x = r.read_i32()?;
            let y = r.read_i32()?;
            let payload = r.read_bytes()?;
            let size = world.catalog.get(template).map(|t| t.size);
            match size {
                Some((w, h)) => {
                    apply_payload(world, grid, template, GridPos::new(x, y), w, h, payload)?;
                }
                None => tracing::debug!(
                    template = template.0,
                    x,
                    y,
                    "delta for unregistered template ignored"
                ),
            }
        }
    }
    Ok(())
}

/// A placement relayed from another peer. Rebuilds missing local grid content
/// before inserting, then spawns exactly as a local placement would.
fn apply_place(world: &mut World, grid: &mut dyn TileGrid, content: ContentId, pos: GridPos) {
    if grid.cell(pos.x, pos.y).and_then(|v| v.content) != Some(content) {
        let size = world
            .catalog
            .templates_for(content)
            .first()
            .and_then(|&tid| world.catalog.get(tid))
            .map(|t| t.size)
            .unwrap_or((1, 1));
        grid.clear(pos.x, pos.y);
        if let Err(e) = grid.place(pos.x, pos.y, content, size.0, size.1) {
            tracing::warn!(x = pos.x, y = pos.y, error = %e, "could not mirror placed content");
        }
    }
    let anchor = anchor::resolve_anchor(grid, &world.hooks, pos.x, pos.y).unwrap_or(pos);
    world.insert(Some(content), anchor, None);
}

/// Unconditional authoritative kill: no local re-evaluation of the predicate.
pub fn apply_kill(world: &mut World, template: TemplateId, anchor: GridPos) {
    let Some(slot) = world.table.find_at(template, anchor) else {
        tracing::debug!(template = template.0, anchor = %anchor, "kill for absent entity ignored");
        return;
    };
    if let Some(ent) = world.table.get_mut(slot) {
        let pos = ent.anchor;
        if let Payload::Known { behavior, .. } = &mut ent.payload {
            behavior.on_kill(pos);
        }
        ent.active = false;
    }
    world.table.release(slot);
}

/// Walk a chunk's records, resynchronizing on the marker after any corrupt or
/// undecodable region instead of discarding the remainder.
pub fn apply_sync_chunk(
    world: &mut World,
    grid: &mut dyn TileGrid,
    r: &mut ByteReader<'_>,
) -> Result<ApplyStats, WireError> {
    let declared = r.read_u16()? as usize;
    let mut stats = ApplyStats::default();

    while !r.is_empty() {
        if !r.consume_marker(&RECORD_MARKER) {
            tracing::warn!(pos = r.pos(), "resync marker mismatch, scanning forward");
            stats.skipped += 1;
            if !r.scan_to_marker(&RECORD_MARKER) {
                break;
            }
            continue;
        }
        match decode_and_apply(world, grid, r) {
            Ok(true) => stats.applied += 1,
            Ok(false) => stats.skipped += 1,
            Err(e) => {
                tracing::warn!(pos = r.pos(), error = %e, "undecodable resync record, scanning forward");
                stats.skipped += 1;
                if !r.scan_to_marker(&RECORD_MARKER) {
                    break;
                }
            }
        }
    }

    if stats.applied + stats.skipped != declared {
        tracing::warn!(
            declared,
            applied = stats.applied,
            skipped = stats.skipped,
            "resync chunk record count mismatch"
        );
    }
    Ok(stats)
}

/// Decode the fields after a consumed marker and apply them. Ok(false) means
/// a clean skip (unregistered type or full table).
fn decode_and_apply(
    world: &mut World,
    grid: &mut dyn TileGrid,
    r: &mut ByteReader<'_>,
) -> Result<bool, WireError> {
    let module = r.read_str()?;
    let name = r.read_str()?;
    let x = r.read_i32()?;
    let y = r.read_i32()?;
    let w = r.read_u8()?;
    let h = r.read_u8()?;
    let payload = r.read_bytes()?;

    let Ok(template) = world.catalog.id_of(&module, &name) else {
        tracing::debug!(
            module = %module,
            name = %name,
            x,
            y,
            "resync record for unregistered type skipped"
        );
        return Ok(false);
    };
    apply_payload(world, grid, template, GridPos::new(x, y), w, h, payload)
}

/// Apply a net payload to the instance at `pos`, recreating it from template
/// defaults first if this peer doesn't have one there. The sent dimensions
/// override whatever a partially-loaded grid believes the structure size is.
fn apply_payload(
    world: &mut World,
    grid: &mut dyn TileGrid,
    template: TemplateId,
    pos: GridPos,
    w: u8,
    h: u8,
    payload: &[u8],
) -> Result<bool, WireError> {
    let slot = match world.table.find_at(template, pos) {
        Some(slot) => slot,
        None => {
            let Some(slot) = recreate_at(world, grid, template, pos, w, h) else {
                return Ok(false);
            };
            slot
        }
    };
    let Some(ent) = world.table.get_mut(slot) else {
        return Ok(false);
    };
    if let Payload::Known { behavior, .. } = &mut ent.payload {
        let mut pr = ByteReader::new(payload);
        behavior.net_read(&mut pr)?;
    }
    Ok(true)
}

fn recreate_at(
    world: &mut World,
    grid: &mut dyn TileGrid,
    template: TemplateId,
    pos: GridPos,
    w: u8,
    h: u8,
) -> Option<u32> {
    let t = world.catalog.get(template)?;
    if let Some(content) = t.attach {
        let local_content = grid.cell(pos.x, pos.y).and_then(|v| v.content);
        let local_size = grid.structure_size(pos.x, pos.y);
        if local_content != Some(content) || local_size != Some((w, h)) {
            grid.clear(pos.x, pos.y);
            if let Err(e) = grid.place(pos.x, pos.y, content, w, h) {
                tracing::warn!(
                    x = pos.x,
                    y = pos.y,
                    error = %e,
                    "could not rebuild structure for resync record"
                );
            }
        }
    }
    world.spawn_template(template, pos, None)
}
