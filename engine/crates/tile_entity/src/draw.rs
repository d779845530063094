use grid::GridPos;

use crate::catalog::TemplateId;
use crate::entity::Payload;
use crate::hooks::last_non_empty;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawLayer {
    Back,
    Main,
    Front,
}

/// Host-supplied render sink. Rendering itself is out of scope; behaviors
/// emit draw commands and the host rasterizes them however it likes.
pub trait DrawSurface {
    fn sprite(&mut self, layer: DrawLayer, template: TemplateId, anchor: GridPos);

    /// Debug overlay rectangle in cells.
    fn overlay(&mut self, anchor: GridPos, w: u8, h: u8);
}

/// Captures draw commands for assertions.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub sprites: Vec<(DrawLayer, TemplateId, GridPos)>,
    pub overlays: Vec<(GridPos, u8, u8)>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DrawSurface for RecordingSurface {
    fn sprite(&mut self, layer: DrawLayer, template: TemplateId, anchor: GridPos) {
        self.sprites.push((layer, template, anchor));
    }

    fn overlay(&mut self, anchor: GridPos, w: u8, h: u8) {
        self.overlays.push((anchor, w, h));
    }
}

/// Three ordered passes over the entities whose visibility the tick pass
/// cached: back layer, hook-wrapped main layer, front layer plus the
/// optional debug overlay.
pub fn draw_world(world: &World, surface: &mut dyn DrawSurface) {
    // Pass 1: back layer.
    for ent in world.table.iter_active() {
        if !ent.visible {
            continue;
        }
        if let Payload::Known { template, behavior } = &ent.payload {
            if let Some(t) = world.catalog.get(*template) {
                behavior.draw_back(t, ent.anchor, surface);
            }
        }
    }

    // Pass 2: main layer, wrapped by pre-draw (last non-abstaining wins) and
    // post-draw hooks.
    for ent in world.table.iter_active() {
        if !ent.visible {
            continue;
        }
        if let Payload::Known { template, behavior } = &ent.payload {
            if let Some(t) = world.catalog.get(*template) {
                let allow =
                    last_non_empty(world.hooks.pre_draw().iter().map(|h| h(ent)), true);
                if allow {
                    behavior.draw(t, ent.anchor, surface);
                }
                for hook in world.hooks.post_draw() {
                    hook(ent, surface);
                }
            }
        }
    }

    // Pass 3: front layer, then the debug overlay.
    for ent in world.table.iter_active() {
        if !ent.visible {
            continue;
        }
        if let Payload::Known { template, behavior } = &ent.payload {
            if let Some(t) = world.catalog.get(*template) {
                behavior.draw_front(t, ent.anchor, surface);
            }
        }
    }
    if world.config.debug_overlay {
        for ent in world.table.iter_active() {
            if !ent.visible {
                continue;
            }
            if let Payload::Known { template, .. } = &ent.payload {
                if let Some(t) = world.catalog.get(*template) {
                    surface.overlay(ent.anchor, t.size.0, t.size.1);
                }
            }
        }
    }
}
