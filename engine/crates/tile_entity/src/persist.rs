use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use grid::GridPos;
use record::{Record, RecordError, Value};
use serde::{Deserialize, Serialize};

use crate::entity::{Payload, TileEntity};
use crate::world::World;

/// Top-level record key the entity list is stored under.
pub const SAVE_KEY: &str = "tile_entities";

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("save version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    #[error("corrupt save data: {0}")]
    Corrupt(String),
}

impl From<bincode::Error> for PersistError {
    fn from(e: bincode::Error) -> Self {
        PersistError::Serialization(e.to_string())
    }
}

impl From<RecordError> for PersistError {
    fn from(e: RecordError) -> Self {
        PersistError::Corrupt(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Envelopes matched to a scanned instance.
    pub matched: usize,
    /// Envelopes for registered types whose anchor no longer exists.
    pub dropped: usize,
    /// Envelopes held by placeholders because their type is unregistered.
    pub placeholders: usize,
}

/// Serialize every active instance into an envelope list under `SAVE_KEY`.
/// Placeholders write their retained raw envelope back verbatim, so data for
/// disabled types survives any number of save cycles.
pub fn save(world: &World) -> Record {
    let mut list = Vec::new();
    for ent in world.table.iter_active() {
        match &ent.payload {
            Payload::Known { template, behavior } => {
                let Some(t) = world.catalog.get(*template) else {
                    continue;
                };
                let mut envelope = Record::new();
                envelope.set_str("module", t.module.clone());
                envelope.set_str("name", t.name.clone());
                envelope.set_i64("x", ent.anchor.x as i64);
                envelope.set_i64("y", ent.anchor.y as i64);

                let mut scratch = Record::new();
                behavior.save(&mut scratch);
                if !scratch.is_empty() {
                    envelope.set_record("data", scratch);
                }
                list.push(Value::Record(envelope));
            }
            Payload::Placeholder { raw, .. } => {
                list.push(Value::Record(raw.clone()));
            }
        }
    }
    let mut top = Record::new();
    top.set_list(SAVE_KEY, list);
    top
}

/// Apply saved data against the freshly scanned table: match each envelope to
/// a live instance by (module, name, anchor) and hand it the nested data
/// record. Envelopes for unregistered types become placeholder entities.
pub fn load(world: &mut World, data: &Record) -> Result<LoadStats, PersistError> {
    let mut stats = LoadStats::default();
    let Some(list) = data.get_list(SAVE_KEY) else {
        return Ok(stats);
    };

    let mut by_key: BTreeMap<(String, String, i32, i32), u32> = BTreeMap::new();
    for ent in world.table.iter_active() {
        if let Payload::Known { template, .. } = &ent.payload {
            if let Some(t) = world.catalog.get(*template) {
                by_key.insert(
                    (t.module.clone(), t.name.clone(), ent.anchor.x, ent.anchor.y),
                    ent.slot,
                );
            }
        }
    }

    for value in list {
        let Value::Record(envelope) = value else {
            return Err(PersistError::Corrupt(
                "entity envelope is not a record".to_string(),
            ));
        };
        let module = envelope.require_str("module")?.to_string();
        let name = envelope.require_str("name")?.to_string();
        let x = envelope.require_i64("x")? as i32;
        let y = envelope.require_i64("y")? as i32;

        if world.catalog.id_of(&module, &name).is_ok() {
            match by_key.get(&(module.clone(), name.clone(), x, y)) {
                Some(&slot) => {
                    if let Some(data_rec) = envelope.get_record("data") {
                        if let Some(ent) = world.table.get_mut(slot) {
                            if let Payload::Known { behavior, .. } = &mut ent.payload {
                                behavior.load(data_rec);
                            }
                        }
                    }
                    stats.matched += 1;
                }
                None => {
                    tracing::debug!(
                        module = %module,
                        name = %name,
                        x,
                        y,
                        "saved entity has no surviving anchor, dropped"
                    );
                    stats.dropped += 1;
                }
            }
        } else {
            // Type not currently registered: hold the raw envelope until a
            // future load cycle where it is.
            let raw = envelope.clone();
            let slot = world.table.alloc(|slot| {
                TileEntity::placeholder(slot, module.clone(), name.clone(), GridPos::new(x, y), raw)
            });
            match slot {
                Some(_) => {
                    tracing::warn!(
                        module = %module,
                        name = %name,
                        x,
                        y,
                        "unknown entity type, holding saved data in placeholder"
                    );
                    stats.placeholders += 1;
                }
                None => tracing::warn!(
                    module = %module,
                    name = %name,
                    x,
                    y,
                    "entity table full, saved data for unknown type lost"
                ),
            }
        }
    }
    Ok(stats)
}

/// Versioned on-disk container for one world save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedWorld {
    pub version: u32,
    pub tick: u64,
    pub data: Record,
}

/// Manages world-save persistence to disk.
pub struct SaveFile {
    save_dir: PathBuf,
}

impl SaveFile {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
        }
    }

    /// Save a world record to disk.
    pub fn save_to_disk(&self, data: &Record, tick: u64) -> Result<PathBuf, PersistError> {
        std::fs::create_dir_all(&self.save_dir)?;

        let saved = SavedWorld {
            version: SAVE_VERSION,
            tick,
            data: data.clone(),
        };
        let bytes = bincode::serialize(&saved)?;

        let filename = format!("world_tick_{}.bin", tick);
        let path = self.save_dir.join(&filename);

        // Write to temp file first, then rename for atomicity
        let tmp_path = self.save_dir.join(format!("{}.tmp", filename));
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, &path)?;

        let latest_path = self.save_dir.join("latest.bin");
        let latest_tmp = self.save_dir.join("latest.bin.tmp");
        std::fs::write(&latest_tmp, &bytes)?;
        std::fs::rename(&latest_tmp, &latest_path)?;

        tracing::info!(
            tick,
            bytes = bytes.len(),
            path = %path.display(),
            "world save written"
        );
        Ok(path)
    }

    /// Load the latest save from disk.
    pub fn load_latest(&self) -> Result<SavedWorld, PersistError> {
        let path = self.save_dir.join("latest.bin");
        self.load_from_path(&path)
    }

    pub fn load_from_path(&self, path: &Path) -> Result<SavedWorld, PersistError> {
        let bytes = std::fs::read(path)?;
        let saved: SavedWorld = bincode::deserialize(&bytes)?;
        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                got: saved.version,
            });
        }
        tracing::info!(
            tick = saved.tick,
            version = saved.version,
            path = %path.display(),
            "world save loaded"
        );
        Ok(saved)
    }

    pub fn has_latest(&self) -> bool {
        self.save_dir.join("latest.bin").exists()
    }
}
