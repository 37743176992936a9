use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use zone_sentinel::config::{MonitorConfig, SourceKind};
use zone_sentinel::detect::MatchMode;
use zone_sentinel::zone::ZoneTemplate;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SENTINEL_CONFIG",
        "SENTINEL_DB_PATH",
        "SENTINEL_SCREENSHOTS_DIR",
        "SENTINEL_SOURCE",
        "SENTINEL_SOURCE_KIND",
        "SENTINEL_TRIGGER_CLASSES",
        "SENTINEL_COOLDOWN_SECS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = MonitorConfig::load().expect("load config");

    assert_eq!(cfg.db_path, "alerts.db");
    assert_eq!(cfg.screenshots_dir, "screenshots");
    assert_eq!(cfg.source.kind, SourceKind::File);
    assert_eq!(cfg.source.location, "stub://video");
    assert_eq!((cfg.source.width, cfg.source.height), (1280, 720));
    assert_eq!(cfg.zone_template, ZoneTemplate::left_half());
    assert_eq!(cfg.occupancy_class, "person");
    assert_eq!(cfg.occupancy_match, MatchMode::Substring);
    assert_eq!(cfg.alerts.trigger_classes, vec!["gun", "knife"]);
    assert_eq!(cfg.alerts.cooldown, Duration::from_secs(30));
    assert_eq!(cfg.alerts.rearm_clear_frames, 3);
    assert_eq!(cfg.alerts.log_capacity, 100);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        db_path = "prod_alerts.db"
        screenshots_dir = "/var/lib/sentinel/shots"

        [source]
        kind = "camera"
        location = "/dev/video2"
        width = 1920
        height = 1080
        target_fps = 15

        [zone]
        vertices = [[0.0, 0.0], [1.0, 0.0], [1.0, 0.5], [0.0, 0.5]]

        [occupancy]
        class = "Person"
        exact_match = true

        [alerts]
        trigger_classes = ["Gun", "knife", "rifle"]
        cooldown_secs = 10
        rearm_clear_frames = 5
        log_capacity = 20
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("SENTINEL_CONFIG", file.path());
    std::env::set_var("SENTINEL_DB_PATH", "env_alerts.db");
    std::env::set_var("SENTINEL_COOLDOWN_SECS", "45");

    let cfg = MonitorConfig::load().expect("load config");

    // Env beats file, file beats defaults.
    assert_eq!(cfg.db_path, "env_alerts.db");
    assert_eq!(cfg.screenshots_dir, "/var/lib/sentinel/shots");
    assert_eq!(cfg.source.kind, SourceKind::Camera);
    assert_eq!(cfg.source.location, "/dev/video2");
    assert_eq!((cfg.source.width, cfg.source.height), (1920, 1080));
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(cfg.zone_template.vertices().len(), 4);
    assert_eq!(cfg.occupancy_class, "person");
    assert_eq!(cfg.occupancy_match, MatchMode::Exact);
    // Trigger classes are lowercased during validation.
    assert_eq!(cfg.alerts.trigger_classes, vec!["gun", "knife", "rifle"]);
    assert_eq!(cfg.alerts.cooldown, Duration::from_secs(45));
    assert_eq!(cfg.alerts.rearm_clear_frames, 5);
    assert_eq!(cfg.alerts.log_capacity, 20);

    clear_env();
}

#[test]
fn env_trigger_classes_replace_the_list() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENTINEL_TRIGGER_CLASSES", "Machete, gun ,");
    let cfg = MonitorConfig::load().expect("load config");
    assert_eq!(cfg.alerts.trigger_classes, vec!["machete", "gun"]);

    clear_env();
}

#[test]
fn rejects_invalid_zone_from_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        [zone]
        vertices = [[0.0, 0.0], [1.5, 0.0], [1.0, 1.0]]
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("SENTINEL_CONFIG", file.path());

    assert!(MonitorConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_unknown_source_kind() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENTINEL_SOURCE_KIND", "carrier-pigeon");
    assert!(MonitorConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_empty_trigger_classes() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        [alerts]
        trigger_classes = []
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("SENTINEL_CONFIG", file.path());

    assert!(MonitorConfig::load().is_err());

    clear_env();
}
