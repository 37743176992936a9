use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::alert::AlertPolicy;
use crate::detect::MatchMode;
use crate::source::{CameraConfig, FileConfig};
use crate::zone::ZoneTemplate;

const DEFAULT_DB_PATH: &str = "alerts.db";
const DEFAULT_SCREENSHOTS_DIR: &str = "screenshots";
const DEFAULT_SOURCE: &str = "stub://video";
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_STUB_FRAMES: usize = 100;
const DEFAULT_OCCUPANCY_CLASS: &str = "person";
const DEFAULT_COOLDOWN_SECS: u64 = 30;
const DEFAULT_REARM_CLEAR_FRAMES: u32 = 3;
const DEFAULT_LOG_CAPACITY: usize = 100;
const DEFAULT_MAX_READ_FAILURES: u32 = 30;

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    db_path: Option<String>,
    screenshots_dir: Option<String>,
    source: Option<SourceConfigFile>,
    zone: Option<ZoneConfigFile>,
    occupancy: Option<OccupancyConfigFile>,
    alerts: Option<AlertConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    /// `camera` or `file`.
    kind: Option<String>,
    /// Device path / camera index for cameras, file path for files.
    location: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    stub_frames: Option<usize>,
    max_read_failures: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ZoneConfigFile {
    /// Normalized polygon vertices in `[0,1]²`, at least three.
    vertices: Option<Vec<(f64, f64)>>,
}

#[derive(Debug, Deserialize, Default)]
struct OccupancyConfigFile {
    class: Option<String>,
    exact_match: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    trigger_classes: Option<Vec<String>>,
    exact_match: Option<bool>,
    cooldown_secs: Option<u64>,
    rearm_clear_frames: Option<u32>,
    log_capacity: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Camera,
    File,
}

#[derive(Clone, Debug)]
pub struct SourceSettings {
    pub kind: SourceKind,
    pub location: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub stub_frames: usize,
    pub max_read_failures: u32,
}

impl SourceSettings {
    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            device: self.location.clone(),
            width: self.width,
            height: self.height,
            target_fps: self.target_fps,
        }
    }

    pub fn file_config(&self) -> FileConfig {
        FileConfig {
            path: self.location.clone(),
            width: self.width,
            height: self.height,
            stub_frames: self.stub_frames,
        }
    }
}

/// Daemon configuration: defaults, overlaid by an optional TOML file
/// (`SENTINEL_CONFIG`), overlaid by `SENTINEL_*` environment variables.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub db_path: String,
    pub screenshots_dir: String,
    pub source: SourceSettings,
    pub zone_template: ZoneTemplate,
    pub occupancy_class: String,
    pub occupancy_match: MatchMode,
    pub alerts: AlertPolicy,
}

impl MonitorConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let db_path = file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let screenshots_dir = file
            .screenshots_dir
            .unwrap_or_else(|| DEFAULT_SCREENSHOTS_DIR.to_string());

        let source_file = file.source.unwrap_or_default();
        let kind = match source_file.kind.as_deref() {
            None | Some("file") => SourceKind::File,
            Some("camera") => SourceKind::Camera,
            Some(other) => {
                return Err(anyhow!(
                    "source kind must be \"camera\" or \"file\", got \"{}\"",
                    other
                ))
            }
        };
        let source = SourceSettings {
            kind,
            location: source_file
                .location
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            width: source_file.width.unwrap_or(DEFAULT_WIDTH),
            height: source_file.height.unwrap_or(DEFAULT_HEIGHT),
            target_fps: source_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            stub_frames: source_file.stub_frames.unwrap_or(DEFAULT_STUB_FRAMES),
            max_read_failures: source_file
                .max_read_failures
                .unwrap_or(DEFAULT_MAX_READ_FAILURES),
        };

        let zone_template = match file.zone.and_then(|zone| zone.vertices) {
            Some(vertices) => ZoneTemplate::new(vertices)?,
            None => ZoneTemplate::left_half(),
        };

        let occupancy_file = file.occupancy.unwrap_or_default();
        let occupancy_class = occupancy_file
            .class
            .unwrap_or_else(|| DEFAULT_OCCUPANCY_CLASS.to_string());
        let occupancy_match = match_mode(occupancy_file.exact_match.unwrap_or(false));

        let alert_file = file.alerts.unwrap_or_default();
        let alerts = AlertPolicy {
            trigger_classes: alert_file
                .trigger_classes
                .unwrap_or_else(|| AlertPolicy::default().trigger_classes),
            match_mode: match_mode(alert_file.exact_match.unwrap_or(false)),
            cooldown: Duration::from_secs(
                alert_file.cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS),
            ),
            rearm_clear_frames: alert_file
                .rearm_clear_frames
                .unwrap_or(DEFAULT_REARM_CLEAR_FRAMES),
            log_capacity: alert_file.log_capacity.unwrap_or(DEFAULT_LOG_CAPACITY),
        };

        Ok(Self {
            db_path,
            screenshots_dir,
            source,
            zone_template,
            occupancy_class,
            occupancy_match,
            alerts,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SENTINEL_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(dir) = std::env::var("SENTINEL_SCREENSHOTS_DIR") {
            if !dir.trim().is_empty() {
                self.screenshots_dir = dir;
            }
        }
        if let Ok(location) = std::env::var("SENTINEL_SOURCE") {
            if !location.trim().is_empty() {
                self.source.location = location;
            }
        }
        if let Ok(kind) = std::env::var("SENTINEL_SOURCE_KIND") {
            match kind.as_str() {
                "camera" => self.source.kind = SourceKind::Camera,
                "file" => self.source.kind = SourceKind::File,
                "" => {}
                other => {
                    return Err(anyhow!(
                        "SENTINEL_SOURCE_KIND must be \"camera\" or \"file\", got \"{}\"",
                        other
                    ))
                }
            }
        }
        if let Ok(classes) = std::env::var("SENTINEL_TRIGGER_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.alerts.trigger_classes = parsed;
            }
        }
        if let Ok(cooldown) = std::env::var("SENTINEL_COOLDOWN_SECS") {
            let seconds: u64 = cooldown.parse().map_err(|_| {
                anyhow!("SENTINEL_COOLDOWN_SECS must be an integer number of seconds")
            })?;
            self.alerts.cooldown = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(anyhow!("db_path must not be empty"));
        }
        if self.screenshots_dir.trim().is_empty() {
            return Err(anyhow!("screenshots_dir must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source resolution must be non-zero"));
        }
        if self.alerts.trigger_classes.is_empty() {
            return Err(anyhow!("at least one alert trigger class is required"));
        }
        for class in &mut self.alerts.trigger_classes {
            if class.trim().is_empty() {
                return Err(anyhow!("alert trigger classes must not be empty"));
            }
            *class = class.to_lowercase();
        }
        if self.occupancy_class.trim().is_empty() {
            return Err(anyhow!("occupancy class must not be empty"));
        }
        self.occupancy_class = self.occupancy_class.to_lowercase();
        if self.alerts.log_capacity == 0 {
            return Err(anyhow!("alert log capacity must be greater than zero"));
        }
        if self.source.max_read_failures == 0 {
            return Err(anyhow!("max_read_failures must be greater than zero"));
        }
        self.zone_template = self.zone_template.clone().validated()?;
        Ok(())
    }
}

fn match_mode(exact: bool) -> MatchMode {
    if exact {
        MatchMode::Exact
    } else {
        MatchMode::Substring
    }
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = toml::from_str(&raw)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
