use grid::GridPos;
use record::Record;

use crate::behavior::TileBehavior;
use crate::catalog::TemplateId;

/// What a slot holds: a live behavior clone, or an opaque stand-in for saved
/// data whose type is not currently registered. Placeholders participate only
/// in the persistence round-trip; update, draw, sync, and the death predicate
/// all skip them.
pub enum Payload {
    Known {
        template: TemplateId,
        behavior: Box<dyn TileBehavior>,
    },
    Placeholder {
        module: String,
        name: String,
        raw: Record,
    },
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known { template, .. } => write!(f, "Known({})", template.0),
            Self::Placeholder { module, name, .. } => {
                write!(f, "Placeholder({module}:{name})")
            }
        }
    }
}

/// One live entity instance occupying a table slot.
///
/// The slot index is stable for this occupancy only; after deactivation the
/// slot is reused by an unrelated instance. Holders of a slot index must
/// re-check `matches` before trusting it across a tick boundary.
#[derive(Debug)]
pub struct TileEntity {
    pub slot: u32,
    pub active: bool,
    pub anchor: GridPos,
    /// Item that placed this instance; None for world-load spawns.
    pub placed_by_item: Option<u32>,
    /// One-time instance init has run.
    pub spawned: bool,
    /// Visibility result cached by the tick pass for draw and input reuse.
    pub visible: bool,
    pub hovered: bool,
    pub(crate) net_window_sends: u32,
    pub(crate) net_cooldown: u32,
    pub payload: Payload,
}

impl TileEntity {
    pub(crate) fn known(
        slot: u32,
        template: TemplateId,
        behavior: Box<dyn TileBehavior>,
        anchor: GridPos,
        placed_by_item: Option<u32>,
    ) -> Self {
        Self {
            slot,
            active: true,
            anchor,
            placed_by_item,
            spawned: false,
            visible: false,
            hovered: false,
            net_window_sends: 0,
            net_cooldown: 0,
            payload: Payload::Known { template, behavior },
        }
    }

    pub(crate) fn placeholder(
        slot: u32,
        module: String,
        name: String,
        anchor: GridPos,
        raw: Record,
    ) -> Self {
        Self {
            slot,
            active: true,
            anchor,
            placed_by_item: None,
            spawned: false,
            visible: false,
            hovered: false,
            net_window_sends: 0,
            net_cooldown: 0,
            payload: Payload::Placeholder { module, name, raw },
        }
    }

    pub fn template_id(&self) -> Option<TemplateId> {
        match &self.payload {
            Payload::Known { template, .. } => Some(*template),
            Payload::Placeholder { .. } => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.payload, Payload::Placeholder { .. })
    }

    /// Validates a cached slot handle: still active, same type, same anchor.
    pub fn matches(&self, template: TemplateId, anchor: GridPos) -> bool {
        self.active && self.anchor == anchor && self.template_id() == Some(template)
    }
}
