use std::path::Path;

use serde::Deserialize;

use grid::GridConfig;
use tile_entity::{Role, WorldConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerMode {
    Authority,
    Remote,
}

impl Default for PeerMode {
    fn default() -> Self {
        Self::Authority
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TickSection {
    pub tps: u32,
    /// Maximum ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// World-space idle-suspension radius (0 = never suspend).
    pub idle_distance: i32,
}

impl Default for TickSection {
    fn default() -> Self {
        Self {
            tps: 30,
            max_ticks: 0,
            idle_distance: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableSection {
    pub capacity: usize,
}

impl Default for TableSection {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub max_records_per_message: usize,
    pub max_message_bytes: usize,
    pub max_sends_per_window: u32,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            max_records_per_message: 100,
            max_message_bytes: 60_000,
            max_sends_per_window: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistSection {
    pub save_dir: String,
    /// Ticks between autosaves (0 = only save on shutdown).
    pub autosave_interval: u64,
}

impl Default for PersistSection {
    fn default() -> Self {
        Self {
            save_dir: "data/saves".to_string(),
            autosave_interval: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GridSection {
    pub width: u32,
    pub height: u32,
    pub origin_x: i32,
    pub origin_y: i32,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            origin_x: 0,
            origin_y: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DrawSection {
    pub debug_overlay: bool,
}

impl Default for DrawSection {
    fn default() -> Self {
        Self {
            debug_overlay: false,
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub mode: PeerMode,
    pub tick: TickSection,
    pub table: TableSection,
    pub sync: SyncSection,
    pub persistence: PersistSection,
    pub grid: GridSection,
    pub draw: DrawSection,
}

impl ServerConfig {
    /// Load configuration from an optional TOML file path.
    /// Falls back to defaults if path is None or file doesn't exist.
    pub fn load(config_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let config = match config_path {
            Some(path) if Path::new(path).exists() => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            _ => Self::default(),
        };
        Ok(config)
    }

    pub fn to_role(&self) -> Role {
        match self.mode {
            PeerMode::Authority => Role::Authority,
            PeerMode::Remote => Role::Remote,
        }
    }

    pub fn to_world_config(&self) -> WorldConfig {
        WorldConfig {
            capacity: self.table.capacity,
            idle_distance: self.tick.idle_distance,
            max_records_per_message: self.sync.max_records_per_message,
            max_message_bytes: self.sync.max_message_bytes,
            max_sends_per_window: self.sync.max_sends_per_window,
            debug_overlay: self.draw.debug_overlay,
        }
    }

    pub fn to_grid_config(&self) -> GridConfig {
        GridConfig {
            width: self.grid.width,
            height: self.grid.height,
            origin_x: self.grid.origin_x,
            origin_y: self.grid.origin_y,
        }
    }

    pub fn tick_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.tick.tps.max(1) as f64)
    }
}

/// Parse CLI arguments and merge with config.
/// Supports: --config <path>, --mode <authority|remote>, --ticks <n>
pub fn parse_cli_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<&str> = None;
    let mut mode_override: Option<PeerMode> = None;
    let mut ticks_override: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if let Some(val) = args.get(i + 1) {
                    config_path = Some(val.as_str());
                    i += 2;
                } else {
                    eprintln!("--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--mode" => {
                if let Some(val) = args.get(i + 1) {
                    match val.as_str() {
                        "authority" => mode_override = Some(PeerMode::Authority),
                        "remote" => mode_override = Some(PeerMode::Remote),
                        other => {
                            eprintln!("Unknown mode '{}', expected 'authority' or 'remote'", other);
                            std::process::exit(1);
                        }
                    }
                    i += 2;
                } else {
                    eprintln!("--mode requires a value argument");
                    std::process::exit(1);
                }
            }
            "--ticks" => {
                if let Some(val) = args.get(i + 1) {
                    match val.parse() {
                        Ok(n) => ticks_override = Some(n),
                        Err(_) => {
                            eprintln!("--ticks requires a number");
                            std::process::exit(1);
                        }
                    }
                    i += 2;
                } else {
                    eprintln!("--ticks requires a value argument");
                    std::process::exit(1);
                }
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
    }

    let mut config = match ServerConfig::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(mode) = mode_override {
        config.mode = mode;
    }
    if let Some(ticks) = ticks_override {
        config.tick.max_ticks = ticks;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_matches_hardcoded_values() {
        let config = ServerConfig::default();
        assert_eq!(config.mode, PeerMode::Authority);
        assert_eq!(config.tick.tps, 30);
        assert_eq!(config.tick.max_ticks, 0);
        assert_eq!(config.table.capacity, 1000);
        assert_eq!(config.sync.max_records_per_message, 100);
        assert_eq!(config.sync.max_message_bytes, 60_000);
        assert_eq!(config.persistence.save_dir, "data/saves");
        assert_eq!(config.grid.width, 256);
        assert_eq!(config.grid.height, 256);
        assert!(!config.draw.debug_overlay);
    }

    #[test]
    fn to_world_config() {
        let config = ServerConfig::default();
        let wc = config.to_world_config();
        assert_eq!(wc.capacity, 1000);
        assert_eq!(wc.idle_distance, 0);
        assert_eq!(wc.max_records_per_message, 100);
    }

    #[test]
    fn to_grid_config() {
        let config = ServerConfig::default();
        let gc = config.to_grid_config();
        assert_eq!(gc.width, 256);
        assert_eq!(gc.height, 256);
        assert_eq!(gc.origin_x, 0);
        assert_eq!(gc.origin_y, 0);
    }

    #[test]
    fn to_role_maps_mode() {
        let mut config = ServerConfig::default();
        assert_eq!(config.to_role(), Role::Authority);
        config.mode = PeerMode::Remote;
        assert_eq!(config.to_role(), Role::Remote);
    }

    #[test]
    fn load_nonexistent_file_returns_defaults() {
        let config = ServerConfig::load(Some("/tmp/nonexistent_config_98765.toml")).unwrap();
        assert_eq!(config.tick.tps, 30);
    }

    #[test]
    fn load_none_returns_defaults() {
        let config = ServerConfig::load(None).unwrap();
        assert_eq!(config.mode, PeerMode::Authority);
    }

    #[test]
    fn load_partial_toml() {
        let mut f = NamedTempFile::new().unwrap();
        write!(
            f,
            r#"
mode = "remote"

[tick]
tps = 60

[grid]
width = 512
"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(f.path().to_str().unwrap())).unwrap();
        assert_eq!(config.mode, PeerMode::Remote);
        assert_eq!(config.tick.tps, 60);
        assert_eq!(config.grid.width, 512);
        // Unset fields remain default
        assert_eq!(config.grid.height, 256);
        assert_eq!(config.table.capacity, 1000);
    }

    #[test]
    fn load_full_toml() {
        let mut f = NamedTempFile::new().unwrap();
        write!(
            f,
            r#"
mode = "authority"

[tick]
tps = 20
max_ticks = 100
idle_distance = 2000

[table]
capacity = 500

[sync]
max_records_per_message = 50
max_message_bytes = 32768
max_sends_per_window = 5

[persistence]
save_dir = "saves"
autosave_interval = 300

[grid]
width = 1024
height = 1024
origin_x = -512
origin_y = -512

[draw]
debug_overlay = true
"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(f.path().to_str().unwrap())).unwrap();
        assert_eq!(config.tick.tps, 20);
        assert_eq!(config.tick.max_ticks, 100);
        assert_eq!(config.tick.idle_distance, 2000);
        assert_eq!(config.table.capacity, 500);
        assert_eq!(config.sync.max_records_per_message, 50);
        assert_eq!(config.sync.max_sends_per_window, 5);
        assert_eq!(config.persistence.save_dir, "saves");
        assert_eq!(config.grid.origin_x, -512);
        assert!(config.draw.debug_overlay);
    }
}
