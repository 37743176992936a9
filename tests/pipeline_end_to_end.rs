use anyhow::Result;

use zone_sentinel::alert::{AlertManager, AlertPolicy, AlertStore, ScreenshotStore, SqliteAlertStore};
use zone_sentinel::detect::{BoundingBox, Detection, MatchMode, ScriptedDetector};
use zone_sentinel::pipeline::{Monitor, NullSink};
use zone_sentinel::source::StubSource;
use zone_sentinel::zone::{Zone, ZoneTemplate};
use zone_sentinel::OccupancyCounter;

fn detection(label: &str, confidence: f32, cx: f32, cy: f32) -> Detection {
    Detection::new(
        label,
        confidence,
        BoundingBox::new(cx - 8.0, cy - 8.0, cx + 8.0, cy + 8.0),
    )
}

fn build_monitor(
    frames: usize,
    script: Vec<Vec<Detection>>,
    db_path: &std::path::Path,
    shots_dir: &std::path::Path,
) -> Result<Monitor> {
    let source = Box::new(StubSource::file(frames, 320, 240));
    let zone = Zone::from_template(&ZoneTemplate::left_half(), 320, 240);
    Ok(Monitor::new(
        source,
        Box::new(ScriptedDetector::new(script)),
        zone,
        OccupancyCounter::new("person", MatchMode::Substring),
        AlertManager::new(AlertPolicy::default()),
        ScreenshotStore::new(shots_dir)?,
        Box::new(SqliteAlertStore::open(db_path)?),
        Box::new(NullSink),
    ))
}

#[test]
fn knife_frame_produces_one_durable_record_with_screenshot() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("alerts.db");
    let shots_dir = dir.path().join("screenshots");

    let script = vec![
        Vec::new(),
        vec![detection("knife 0.90", 0.90, 60.0, 120.0)],
        Vec::new(),
    ];
    let mut monitor = build_monitor(3, script, &db_path, &shots_dir)?;
    let summary = monitor.run()?;

    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.alerts_fired, 1);
    assert_eq!(summary.last_occupancy, 0);

    // The record survives the run: reopen the database cold.
    let store = SqliteAlertStore::open(&db_path)?;
    let records = store.list_all()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_name, "knife");
    assert!(!records[0].screenshot_path.is_empty());
    assert!(std::path::Path::new(&records[0].screenshot_path).exists());
    Ok(())
}

#[test]
fn sustained_weapon_yields_one_record_and_occupancy_spans_the_frame() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("alerts.db");
    let shots_dir = dir.path().join("screenshots");

    // Gun present on every frame; two people, one inside the left-half zone
    // (x < 160) and one outside. Occupancy counts both.
    let per_frame = vec![
        detection("gun 0.95", 0.95, 200.0, 100.0),
        detection("person 0.80", 0.80, 80.0, 120.0),
        detection("person 0.75", 0.75, 280.0, 120.0),
    ];
    let script = vec![per_frame.clone(), per_frame.clone(), per_frame];
    let mut monitor = build_monitor(3, script, &db_path, &shots_dir)?;
    let summary = monitor.run()?;

    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.alerts_fired, 1, "sustained detection fires once");
    assert_eq!(summary.last_occupancy, 2);

    let store = SqliteAlertStore::open(&db_path)?;
    let records = store.list_all()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_name, "gun");
    Ok(())
}

#[test]
fn alert_log_messages_name_the_item() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("alerts.db");
    let shots_dir = dir.path().join("screenshots");

    let script = vec![vec![detection("gun 0.93", 0.93, 50.0, 50.0)]];
    let mut monitor = build_monitor(1, script, &db_path, &shots_dir)?;
    monitor.run()?;

    let messages: Vec<&str> = monitor.alert_log().collect();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Objectionable item (gun)"));
    Ok(())
}
