//! Alert triggering state machine.
//!
//! Watches each frame's detections for a configured set of trigger classes
//! (weapon classes in the deployed configuration). A trigger class is a small
//! state machine: `Idle` arms it, a matching detection fires it, and it only
//! re-arms after the class has been absent for a configured number of
//! consecutive frames. A minimum interval between fires of the same class
//! applies on top, so a sustained detection produces one record per cooldown
//! window instead of one per frame. A match that lands inside the cooldown
//! does not consume the arming: the class fires on the first frame at or
//! after cooldown expiry if it is still (or again) present.
//!
//! Firing is a unit of work: screenshot the current frame, persist the record,
//! append a human-readable message to the bounded in-process log. A failed
//! screenshot write downgrades to an empty path rather than losing the event;
//! a failed persist is retried once and then surfaced to the caller.

mod screenshot;
pub mod store;

pub use screenshot::ScreenshotStore;
pub use store::{AlertRecord, AlertStore, InMemoryAlertStore, NewAlert, SqliteAlertStore};

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::detect::{label_matches, Detection, MatchMode};
use crate::frame::Frame;

/// Alerting policy for one deployment.
#[derive(Clone, Debug)]
pub struct AlertPolicy {
    /// Canonical trigger classes, lowercase (e.g. `["gun", "knife"]`).
    pub trigger_classes: Vec<String>,
    /// How raw labels are matched against trigger classes.
    pub match_mode: MatchMode,
    /// Minimum interval between consecutive fires of the same class.
    pub cooldown: Duration,
    /// Consecutive clear frames required before a fired class re-arms.
    pub rearm_clear_frames: u32,
    /// Capacity of the in-process alert message log.
    pub log_capacity: usize,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            trigger_classes: vec!["gun".to_string(), "knife".to_string()],
            match_mode: MatchMode::Substring,
            cooldown: Duration::from_secs(30),
            rearm_clear_frames: 3,
            log_capacity: 100,
        }
    }
}

/// One fired alert, after persistence.
#[derive(Clone, Debug)]
pub struct FiredAlert {
    pub record_id: i64,
    pub trigger_class: String,
    pub item_name: String,
    /// `None` when the screenshot write failed.
    pub screenshot_path: Option<PathBuf>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TriggerState {
    Idle,
    /// Fired and waiting to re-arm; counts consecutive clear frames.
    Fired { clear_frames: u32 },
}

struct ClassTracker {
    class: String,
    state: TriggerState,
    last_fired: Option<DateTime<Utc>>,
}

pub struct AlertManager {
    policy: AlertPolicy,
    trackers: Vec<ClassTracker>,
    log: VecDeque<String>,
    fired_total: u64,
}

impl AlertManager {
    pub fn new(policy: AlertPolicy) -> Self {
        let trackers = policy
            .trigger_classes
            .iter()
            .map(|class| ClassTracker {
                class: class.to_lowercase(),
                state: TriggerState::Idle,
                last_fired: None,
            })
            .collect();
        Self {
            policy,
            trackers,
            log: VecDeque::new(),
            fired_total: 0,
        }
    }

    pub fn fired_total(&self) -> u64 {
        self.fired_total
    }

    /// Bounded log of human-readable alert messages, oldest first.
    pub fn alert_log(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    /// Run the state machine for one frame.
    ///
    /// Returns the alerts fired on this frame. The screenshot+record pair for
    /// each fire completes inside this call, so a cancellation between frames
    /// never leaves a record half-created.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        detections: &[Detection],
        screenshots: &mut ScreenshotStore,
        store: &mut dyn AlertStore,
    ) -> Result<Vec<FiredAlert>> {
        let mut fired = Vec::new();

        for i in 0..self.trackers.len() {
            let matched_label = {
                let tracker = &self.trackers[i];
                detections
                    .iter()
                    .find(|d| label_matches(&d.label, &tracker.class, self.policy.match_mode))
                    .map(|d| d.label.clone())
            };

            match (matched_label, self.trackers[i].state) {
                (Some(label), TriggerState::Idle) => {
                    // While the cooldown runs the class stays armed, so a
                    // detection that persists past the interval still fires
                    // on the first eligible frame.
                    if self.cooldown_elapsed(i, frame.captured_at) {
                        let alert = self.fire(i, &label, frame, screenshots, store)?;
                        fired.push(alert);
                        self.trackers[i].state = TriggerState::Fired { clear_frames: 0 };
                    }
                }
                (Some(_), TriggerState::Fired { .. }) => {
                    self.trackers[i].state = TriggerState::Fired { clear_frames: 0 };
                }
                (None, TriggerState::Fired { clear_frames }) => {
                    let clear_frames = clear_frames.saturating_add(1);
                    if clear_frames >= self.policy.rearm_clear_frames {
                        self.trackers[i].state = TriggerState::Idle;
                    } else {
                        self.trackers[i].state = TriggerState::Fired { clear_frames };
                    }
                }
                (None, TriggerState::Idle) => {}
            }
        }

        Ok(fired)
    }

    fn cooldown_elapsed(&self, tracker_idx: usize, now: DateTime<Utc>) -> bool {
        match self.trackers[tracker_idx].last_fired {
            None => true,
            Some(last) => {
                let elapsed = now.signed_duration_since(last);
                elapsed >= chrono::Duration::from_std(self.policy.cooldown)
                    .unwrap_or_else(|_| chrono::Duration::MAX)
            }
        }
    }

    fn fire(
        &mut self,
        tracker_idx: usize,
        matched_label: &str,
        frame: &Frame,
        screenshots: &mut ScreenshotStore,
        store: &mut dyn AlertStore,
    ) -> Result<FiredAlert> {
        let observed_at = frame.captured_at;

        let screenshot_path = match screenshots.save(frame, observed_at) {
            Ok(path) => Some(path),
            Err(e) => {
                // The record still goes in; losing the image must not lose
                // the event.
                log::warn!("screenshot write failed, recording alert without image: {e:#}");
                None
            }
        };

        let item_name = matched_label
            .split_whitespace()
            .next()
            .unwrap_or(matched_label)
            .to_string();

        let new_alert = NewAlert {
            item_name: item_name.clone(),
            timestamp: observed_at,
            screenshot_path: screenshot_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        let record_id = match store.append(&new_alert) {
            Ok(id) => id,
            Err(first_err) => {
                log::warn!("alert persist failed, retrying once: {first_err:#}");
                store
                    .append(&new_alert)
                    .context("alert persist failed after retry")?
            }
        };

        let tracker = &mut self.trackers[tracker_idx];
        tracker.last_fired = Some(observed_at);
        self.fired_total += 1;

        let message = format!(
            "Alert: Objectionable item ({}) detected at {}",
            item_name,
            observed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        log::warn!("{message}");
        if self.log.len() == self.policy.log_capacity {
            self.log.pop_front();
        }
        self.log.push_back(message);

        Ok(FiredAlert {
            record_id,
            trigger_class: tracker.class.clone(),
            item_name,
            screenshot_path,
            observed_at,
        })
    }
}
