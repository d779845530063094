use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use grid::{TileGrid, CELL_SIZE};
use observability::TickMetrics;
use wire::{MessageSink, AUTHORITY};

use crate::behavior::UpdateCtx;
use crate::catalog::{TemplateCatalog, TemplateId};
use crate::entity::{Payload, TileEntity};
use crate::hooks::{last_non_empty, GlobalHooks};
use crate::sync;
use crate::world::{Role, World, WorldConfig};

/// Per-instance outbound send counters reset on this cadence.
pub const NET_WINDOW_TICKS: u64 = 60;
/// Suppression period once an instance exceeds its send budget.
pub const NET_COOLDOWN_TICKS: u32 = 60;

/// Screen-relative view rectangle in world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl ViewRect {
    fn intersects(&self, x0: i32, y0: i32, x1: i32, y1: i32) -> bool {
        x0 < self.x + self.w && x1 > self.x && y0 < self.y + self.h && y1 > self.y
    }
}

/// Host-supplied per-tick inputs.
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Current view; None means nothing is on screen (headless peer).
    pub view: Option<ViewRect>,
    /// Cursor position in world units, for hover bookkeeping.
    pub cursor: Option<(i32, i32)>,
    /// World-space positions of every connected participant, used by the
    /// idle-distance suspension test.
    pub participants: Vec<(i32, i32)>,
}

#[derive(Debug, PartialEq, Eq)]
enum SlotOutcome {
    Kept,
    Released,
}

impl World {
    /// One scheduler pass: reset counters, walk every active slot in table
    /// order (bookkeeping, death, update), then fire each populated type's
    /// singleton callback exactly once.
    pub fn tick(
        &mut self,
        grid: &dyn TileGrid,
        sink: &mut dyn MessageSink,
        input: &TickInput,
    ) -> TickMetrics {
        let start = Instant::now();
        self.tick_number += 1;
        let tick = self.tick_number;

        let mut metrics = TickMetrics {
            tick_number: tick,
            ..Default::default()
        };

        // 1. Counter reset.
        self.counters.clear();
        self.counters.resize(self.catalog.len(), 0);

        // 2. Per-entity pass, in table order.
        for i in 0..self.table.slot_count() as u32 {
            let outcome = {
                let Some(ent) = self.table.get_mut(i) else { continue };
                if !ent.active {
                    continue;
                }
                run_entity(
                    &self.catalog,
                    &self.hooks,
                    &self.config,
                    self.role,
                    &mut self.counters,
                    ent,
                    grid,
                    sink,
                    input,
                    tick,
                    &mut metrics,
                )
            };
            if outcome == SlotOutcome::Released {
                self.table.release(i);
            }
        }

        // 3. Singleton pass: once per type with any live instances, no matter
        // how many there are.
        for idx in 0..self.catalog.len() {
            if self.counters.get(idx).copied().unwrap_or(0) == 0 {
                continue;
            }
            if let Some(t) = self.catalog.get_mut(TemplateId(idx as u16)) {
                t.behavior_mut().singleton_update(tick);
            }
        }

        // 4. Advance the outbound rate window.
        if tick % NET_WINDOW_TICKS == 0 {
            self.table.reset_net_windows();
        }

        metrics.duration_us = start.elapsed().as_micros();
        metrics.log();
        metrics
    }
}

#[allow(clippy::too_many_arguments)]
fn run_entity(
    catalog: &TemplateCatalog,
    hooks: &GlobalHooks,
    config: &WorldConfig,
    role: Role,
    counters: &mut [u32],
    ent: &mut TileEntity,
    grid: &dyn TileGrid,
    sink: &mut dyn MessageSink,
    input: &TickInput,
    tick: u64,
    metrics: &mut TickMetrics,
) -> SlotOutcome {
    metrics.active_entities += 1;
    let anchor = ent.anchor;
    let slot = ent.slot;
    ent.net_cooldown = ent.net_cooldown.saturating_sub(1);

    // Visibility and hover bookkeeping, cached for draw and input reuse.
    refresh_visibility(catalog, ent, input);

    // Per-type in-world counter.
    if let Payload::Known { template, .. } = &ent.payload {
        if let Some(c) = counters.get_mut(template.0 as usize) {
            *c += 1;
        }
    }

    // Death evaluation. Only the authority decides; remotes deactivate solely
    // on the authority's broadcast. Placeholders never die by predicate.
    if role == Role::Authority {
        let dead = match &ent.payload {
            Payload::Known { template, behavior } => match catalog.get(*template) {
                Some(t) => {
                    let base = behavior.is_dead(grid, t, anchor);
                    last_non_empty(hooks.death().iter().map(|h| h(grid, t, anchor, base)), base)
                }
                None => false,
            },
            Payload::Placeholder { .. } => false,
        };
        if dead {
            // Broadcast before finalizing so remotes never see a kill for an
            // entity the authority still lists.
            if let Payload::Known { template, .. } = &ent.payload {
                sink.broadcast(sync::encode_kill(*template, anchor));
                metrics.messages_sent += 1;
            }
            if let Payload::Known { behavior, .. } = &mut ent.payload {
                behavior.on_kill(anchor);
            }
            ent.active = false;
            metrics.killed += 1;
            return SlotOutcome::Released;
        }
    }

    // Placeholders only ride the persistence round-trip; no init, hooks,
    // update, or sync.
    if ent.is_placeholder() {
        return SlotOutcome::Kept;
    }

    // First tick after insertion: one-time init, then the global per-instance
    // initializers, then (remote placements) an immediate state push.
    if !ent.spawned {
        ent.spawned = true;
        if let Payload::Known { template, behavior } = &mut ent.payload {
            if let Some(t) = catalog.get(*template) {
                let mut ctx = UpdateCtx {
                    grid,
                    anchor,
                    slot,
                    template: t,
                    tick,
                    role,
                    request_sync: false,
                };
                behavior.init(&mut ctx);
            }
        }
        for hook in hooks.instance_init() {
            hook(ent);
        }
        if role == Role::Remote && ent.placed_by_item.is_some() {
            if let Some(msg) = sync::encode_delta_for(catalog, ent) {
                sink.send(AUTHORITY, msg);
                metrics.messages_sent += 1;
            }
        }
    }

    // Idle suspension: death already ran; everything below is skipped while
    // no participant is in range.
    if config.idle_distance > 0 {
        let limit = config.idle_distance as i64 * config.idle_distance as i64;
        let within = input
            .participants
            .iter()
            .any(|&(px, py)| anchor.world_dist_sq(px, py) <= limit);
        if !within {
            metrics.suspended += 1;
            return SlotOutcome::Kept;
        }
    }

    // Pre-update hooks all run; any false suppresses the entity's own update.
    let mut suppressed = false;
    for hook in hooks.pre_update() {
        if !hook(ent) {
            suppressed = true;
        }
    }

    let mut request_sync = false;
    let mut panicked = false;
    if !suppressed {
        if let Payload::Known { template, behavior } = &mut ent.payload {
            if let Some(t) = catalog.get(*template) {
                let mut ctx = UpdateCtx {
                    grid,
                    anchor,
                    slot,
                    template: t,
                    tick,
                    role,
                    request_sync: false,
                };
                match catch_unwind(AssertUnwindSafe(|| behavior.update(&mut ctx))) {
                    Ok(()) => request_sync = ctx.request_sync,
                    Err(_) => {
                        tracing::error!(
                            module = %t.module,
                            name = %t.name,
                            x = anchor.x,
                            y = anchor.y,
                            "entity update panicked, deactivating"
                        );
                        panicked = true;
                    }
                }
            }
        }
    }
    if panicked {
        ent.active = false;
        return SlotOutcome::Released;
    }
    metrics.updated += 1;

    for hook in hooks.post_update() {
        hook(ent);
    }

    // Outbound delta, rate-limited per instance.
    if request_sync && allow_send(ent, config) {
        if let Some(msg) = sync::encode_delta_for(catalog, ent) {
            match role {
                Role::Authority => sink.broadcast(msg),
                Role::Remote => sink.send(AUTHORITY, msg),
            }
            metrics.messages_sent += 1;
        }
    }

    SlotOutcome::Kept
}

fn refresh_visibility(catalog: &TemplateCatalog, ent: &mut TileEntity, input: &TickInput) {
    let anchor = ent.anchor;
    let (size, margin, is_known) = match &ent.payload {
        Payload::Known { template, behavior } => {
            let size = catalog.get(*template).map(|t| t.size).unwrap_or((1, 1));
            (size, behavior.extra_frame_margin(), true)
        }
        Payload::Placeholder { .. } => ((1, 1), 0, false),
    };
    let x0 = anchor.world_x();
    let y0 = anchor.world_y();
    let x1 = x0 + size.0 as i32 * CELL_SIZE;
    let y1 = y0 + size.1 as i32 * CELL_SIZE;

    ent.visible = is_known
        && match input.view {
            Some(view) => view.intersects(x0 - margin, y0 - margin, x1 + margin, y1 + margin),
            None => false,
        };
    ent.hovered = match input.cursor {
        Some((cx, cy)) => cx >= x0 && cx < x1 && cy >= y0 && cy < y1,
        None => false,
    };
}

/// Budget check for one outbound delta. Counts the attempt, trips the
/// cooldown once the window budget is exceeded.
fn allow_send(ent: &mut TileEntity, config: &WorldConfig) -> bool {
    if ent.net_cooldown > 0 {
        return false;
    }
    ent.net_window_sends += 1;
    if ent.net_window_sends > config.max_sends_per_window {
        ent.net_cooldown = NET_COOLDOWN_TICKS;
        tracing::debug!(slot = ent.slot, "entity sync rate capped, cooling down");
        return false;
    }
    true
}
