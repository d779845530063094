use grid::{GridPos, TileGrid};

use crate::catalog::Template;
use crate::draw::DrawSurface;
use crate::entity::TileEntity;

/// Override the anchor test for a cell. Outer None = abstain.
pub type AnchorHook = Box<dyn Fn(&dyn TileGrid, i32, i32) -> Option<Option<GridPos>> + Send>;

/// Override a death verdict. Receives the predicate result computed so far;
/// None = abstain.
pub type DeathHook = Box<dyn Fn(&dyn TileGrid, &Template, GridPos, bool) -> Option<bool> + Send>;

/// Per-instance initializer run after the behavior's own `init`.
pub type InstanceInitHook = Box<dyn Fn(&mut TileEntity) + Send>;

/// Returning false suppresses the entity's own update. Every pre-update hook
/// runs regardless.
pub type PreUpdateHook = Box<dyn Fn(&TileEntity) -> bool + Send>;

pub type PostUpdateHook = Box<dyn Fn(&mut TileEntity) + Send>;

/// Override whether the main-layer draw runs. None = abstain.
pub type PreDrawHook = Box<dyn Fn(&TileEntity) -> Option<bool> + Send>;

pub type PostDrawHook = Box<dyn Fn(&TileEntity, &mut dyn DrawSurface) + Send>;

/// Registry of global override hooks, organized by phase. Hooks fire in
/// registration order; for the override chains (anchor, death, pre-draw) the
/// last hook returning a value wins.
#[derive(Default)]
pub struct GlobalHooks {
    anchor: Vec<AnchorHook>,
    death: Vec<DeathHook>,
    instance_init: Vec<InstanceInitHook>,
    pre_update: Vec<PreUpdateHook>,
    post_update: Vec<PostUpdateHook>,
    pre_draw: Vec<PreDrawHook>,
    post_draw: Vec<PostDrawHook>,
}

impl GlobalHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_anchor(
        &mut self,
        hook: impl Fn(&dyn TileGrid, i32, i32) -> Option<Option<GridPos>> + Send + 'static,
    ) {
        self.anchor.push(Box::new(hook));
    }

    pub fn on_death(
        &mut self,
        hook: impl Fn(&dyn TileGrid, &Template, GridPos, bool) -> Option<bool> + Send + 'static,
    ) {
        self.death.push(Box::new(hook));
    }

    pub fn on_instance_init(&mut self, hook: impl Fn(&mut TileEntity) + Send + 'static) {
        self.instance_init.push(Box::new(hook));
    }

    pub fn on_pre_update(&mut self, hook: impl Fn(&TileEntity) -> bool + Send + 'static) {
        self.pre_update.push(Box::new(hook));
    }

    pub fn on_post_update(&mut self, hook: impl Fn(&mut TileEntity) + Send + 'static) {
        self.post_update.push(Box::new(hook));
    }

    pub fn on_pre_draw(&mut self, hook: impl Fn(&TileEntity) -> Option<bool> + Send + 'static) {
        self.pre_draw.push(Box::new(hook));
    }

    pub fn on_post_draw(
        &mut self,
        hook: impl Fn(&TileEntity, &mut dyn DrawSurface) + Send + 'static,
    ) {
        self.post_draw.push(Box::new(hook));
    }

    pub fn anchor(&self) -> &[AnchorHook] {
        &self.anchor
    }

    pub fn death(&self) -> &[DeathHook] {
        &self.death
    }

    pub fn instance_init(&self) -> &[InstanceInitHook] {
        &self.instance_init
    }

    pub fn pre_update(&self) -> &[PreUpdateHook] {
        &self.pre_update
    }

    pub fn post_update(&self) -> &[PostUpdateHook] {
        &self.post_update
    }

    pub fn pre_draw(&self) -> &[PreDrawHook] {
        &self.pre_draw
    }

    pub fn post_draw(&self) -> &[PostDrawHook] {
        &self.post_draw
    }

    pub fn clear(&mut self) {
        self.anchor.clear();
        self.death.clear();
        self.instance_init.clear();
        self.pre_update.clear();
        self.post_update.clear();
        self.pre_draw.clear();
        self.post_draw.clear();
    }
}

/// Fold an ordered override chain: the last hook that returns a value wins,
/// silently discarding earlier answers. Abstentions (None) leave the running
/// result untouched.
pub fn last_non_empty<T>(overrides: impl Iterator<Item = Option<T>>, default: T) -> T {
    let mut result = default;
    for value in overrides.flatten() {
        result = value;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_returns_default_without_hooks() {
        let verdict = last_non_empty(std::iter::empty::<Option<bool>>(), true);
        assert!(verdict);
    }

    #[test]
    fn fold_last_answer_wins() {
        let answers = vec![Some(1), None, Some(3), None];
        assert_eq!(last_non_empty(answers.into_iter(), 0), 3);
    }

    #[test]
    fn fold_all_abstain_keeps_default() {
        let answers: Vec<Option<i32>> = vec![None, None];
        assert_eq!(last_non_empty(answers.into_iter(), 7), 7);
    }

    #[test]
    fn registration_order_is_preserved() {
        let mut hooks = GlobalHooks::new();
        hooks.on_pre_update(|_| true);
        hooks.on_pre_update(|_| false);
        assert_eq!(hooks.pre_update().len(), 2);

        hooks.clear();
        assert!(hooks.pre_update().is_empty());
    }
}
