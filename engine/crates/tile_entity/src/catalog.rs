use std::collections::BTreeMap;

use grid::ContentId;
use serde::{Deserialize, Serialize};

use crate::behavior::TileBehavior;

/// Dense template identifier, assigned in registration order. Stable for a
/// load cycle; peers built from the same registration sequence agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub u16);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("no template registered as {module}:{name}")]
    Unknown { module: String, name: String },
}

/// Everything needed to register one entity type.
pub struct TemplateSpec {
    pub module: String,
    pub name: String,
    /// Grid content type this template auto-attaches to. None = never
    /// auto-placed by scans or content placements.
    pub attach: Option<ContentId>,
    /// Structure extent in cells.
    pub size: (u8, u8),
    pub behavior: Box<dyn TileBehavior>,
}

impl TemplateSpec {
    pub fn new(
        module: impl Into<String>,
        name: impl Into<String>,
        behavior: Box<dyn TileBehavior>,
    ) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            attach: None,
            size: (1, 1),
            behavior,
        }
    }

    pub fn with_attach(mut self, content: ContentId) -> Self {
        self.attach = Some(content);
        self
    }

    pub fn with_size(mut self, w: u8, h: u8) -> Self {
        self.size = (w, h);
        self
    }
}

/// A registered entity type. Immutable after registration; the behavior
/// instance it carries is only mutated by the singleton pass.
pub struct Template {
    pub id: TemplateId,
    pub module: String,
    pub name: String,
    pub attach: Option<ContentId>,
    pub size: (u8, u8),
    behavior: Box<dyn TileBehavior>,
}

impl Template {
    pub fn behavior(&self) -> &dyn TileBehavior {
        self.behavior.as_ref()
    }

    pub(crate) fn behavior_mut(&mut self) -> &mut dyn TileBehavior {
        self.behavior.as_mut()
    }

    /// Clone the template's behavior for a new live instance.
    pub fn spawn_behavior(&self) -> Box<dyn TileBehavior> {
        self.behavior.clone_box()
    }
}

/// Registry of all entity types, built once at load.
#[derive(Default)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
    by_name: BTreeMap<(String, String), TemplateId>,
    by_attach: BTreeMap<ContentId, Vec<TemplateId>>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, assigning the next dense id. Multiple templates
    /// may share a target content type; all are tried at placement time.
    pub fn register(&mut self, spec: TemplateSpec) -> TemplateId {
        let id = TemplateId(self.templates.len() as u16);
        let mut behavior = spec.behavior;
        behavior.static_setup();

        if let Some(content) = spec.attach {
            self.by_attach.entry(content).or_default().push(id);
        }
        self.by_name
            .insert((spec.module.clone(), spec.name.clone()), id);
        tracing::debug!(
            id = id.0,
            module = %spec.module,
            name = %spec.name,
            "registered entity template"
        );
        self.templates.push(Template {
            id,
            module: spec.module,
            name: spec.name,
            attach: spec.attach,
            size: spec.size,
            behavior,
        });
        id
    }

    /// Stable identifier lookup; fails if the type was never registered.
    pub fn id_of(&self, module: &str, name: &str) -> Result<TemplateId, CatalogError> {
        self.by_name
            .get(&(module.to_string(), name.to_string()))
            .copied()
            .ok_or_else(|| CatalogError::Unknown {
                module: module.to_string(),
                name: name.to_string(),
            })
    }

    pub fn get(&self, id: TemplateId) -> Option<&Template> {
        self.templates.get(id.0 as usize)
    }

    pub(crate) fn get_mut(&mut self, id: TemplateId) -> Option<&mut Template> {
        self.templates.get_mut(id.0 as usize)
    }

    /// All templates registered against a content type, in registration order.
    pub fn templates_for(&self, content: ContentId) -> &[TemplateId] {
        self.by_attach
            .get(&content)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Drop every registration. Only valid at full unload.
    pub fn clear(&mut self) {
        self.templates.clear();
        self.by_name.clear();
        self.by_attach.clear();
    }
}
