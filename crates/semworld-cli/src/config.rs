//! Configuration – reads/writes `~/.semworld/config.toml`.
//!
//! Every field has a default, so a missing file or a partial one is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use semworld_scene::PlaceParams;

/// Persisted configuration stored in `~/.semworld/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Frame every surface is stored in.
    #[serde(default = "default_fixed_frame")]
    pub fixed_frame: String,

    /// Grid spacing for place-pose sampling, in metres.
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    #[serde(default)]
    pub height_above_table: f64,

    #[serde(default = "default_delta_height")]
    pub delta_height: f64,

    #[serde(default = "default_num_heights")]
    pub num_heights: usize,

    /// Edge margin used both for sampling and for matching.
    #[serde(default = "default_min_distance_from_edge")]
    pub min_distance_from_edge: f64,

    #[serde(default)]
    pub min_vertical_offset: f64,

    /// Slab thickness when surfaces are handed to the collision world.
    #[serde(default = "default_surface_thickness")]
    pub surface_thickness: f64,

    /// Batches buffered on the surface bus.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
}

fn default_fixed_frame() -> String {
    "world".to_string()
}
fn default_resolution() -> f64 {
    0.05
}
fn default_delta_height() -> f64 {
    semworld_scene::place::DEFAULT_DELTA_HEIGHT
}
fn default_num_heights() -> usize {
    semworld_scene::place::DEFAULT_NUM_HEIGHTS
}
fn default_min_distance_from_edge() -> f64 {
    0.10
}
fn default_surface_thickness() -> f64 {
    0.01
}
fn default_feed_capacity() -> usize {
    semworld_middleware::bus::DEFAULT_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fixed_frame: default_fixed_frame(),
            resolution: default_resolution(),
            height_above_table: 0.0,
            delta_height: default_delta_height(),
            num_heights: default_num_heights(),
            min_distance_from_edge: default_min_distance_from_edge(),
            min_vertical_offset: 0.0,
            surface_thickness: default_surface_thickness(),
            feed_capacity: default_feed_capacity(),
        }
    }
}

impl Config {
    /// Sampling parameters for the explicit place-pose call.
    pub fn place_params(&self) -> PlaceParams {
        PlaceParams::new(
            self.resolution,
            self.height_above_table,
            self.delta_height,
            self.num_heights,
            self.min_distance_from_edge,
        )
    }
}

/// Return the path to `~/.semworld/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".semworld").join("config.toml")
}

/// Load the config, falling back to defaults when the file is absent.
/// Environment overrides apply either way.
pub fn load_or_default() -> Result<Config, String> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `SEMWORLD_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SEMWORLD_FIXED_FRAME` | `fixed_frame` |
/// | `SEMWORLD_RESOLUTION` | `resolution` |
/// | `SEMWORLD_NUM_HEIGHTS` | `num_heights` |
/// | `SEMWORLD_SURFACE_THICKNESS` | `surface_thickness` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SEMWORLD_FIXED_FRAME")
        && !v.is_empty()
    {
        cfg.fixed_frame = v;
    }
    if let Ok(v) = std::env::var("SEMWORLD_RESOLUTION")
        && let Ok(resolution) = v.parse::<f64>()
    {
        cfg.resolution = resolution;
    }
    if let Ok(v) = std::env::var("SEMWORLD_NUM_HEIGHTS")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.num_heights = n;
    }
    if let Ok(v) = std::env::var("SEMWORLD_SURFACE_THICKNESS")
        && let Ok(thickness) = v.parse::<f64>()
    {
        cfg.surface_thickness = thickness;
    }
}

/// Save the config to `~/.semworld/config.toml`.
pub fn save(cfg: &Config) -> Result<PathBuf, String> {
    let path = config_path();
    save_to(cfg, &path)?;
    Ok(path)
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, Config::default());
        assert_eq!(loaded.fixed_frame, "world");
        assert_eq!(loaded.num_heights, 2);
    }

    #[cfg(unix)]
    #[test]
    fn saved_config_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let parent = path.parent().expect("parent");
        let dir_mode = std::fs::metadata(parent).expect("dir metadata").permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "fixed_frame = \"map\"\nresolution = 0.2\n").expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.fixed_frame, "map");
        assert_eq!(cfg.resolution, 0.2);
        assert_eq!(cfg.min_distance_from_edge, 0.10);
        assert_eq!(cfg.surface_thickness, 0.01);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "resolution = \"fine\"").expect("write");
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn config_path_points_to_semworld_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".semworld"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn place_params_mirror_config() {
        let cfg = Config {
            resolution: 0.1,
            num_heights: 0,
            ..Config::default()
        };
        let params = cfg.place_params();
        assert_eq!(params.resolution, 0.1);
        assert_eq!(params.num_heights, 0);
        assert_eq!(params.min_distance_from_edge, 0.10);
    }

    // All env-var cases share one test so they never race each other.
    #[test]
    fn apply_env_overrides_reads_semworld_vars() {
        // SAFETY: only this test touches SEMWORLD_* variables.
        unsafe {
            std::env::set_var("SEMWORLD_FIXED_FRAME", "map");
            std::env::set_var("SEMWORLD_RESOLUTION", "0.25");
            std::env::set_var("SEMWORLD_NUM_HEIGHTS", "not-a-number");
            std::env::set_var("SEMWORLD_SURFACE_THICKNESS", "0.03");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        unsafe {
            std::env::remove_var("SEMWORLD_FIXED_FRAME");
            std::env::remove_var("SEMWORLD_RESOLUTION");
            std::env::remove_var("SEMWORLD_NUM_HEIGHTS");
            std::env::remove_var("SEMWORLD_SURFACE_THICKNESS");
        }

        assert_eq!(cfg.fixed_frame, "map");
        assert_eq!(cfg.resolution, 0.25);
        assert_eq!(cfg.num_heights, 2, "unparsable value is ignored");
        assert_eq!(cfg.surface_thickness, 0.03);
    }
}
