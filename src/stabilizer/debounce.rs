use super::window::VoteWindow;
use crate::config::StabilizerConfig;
use crate::gesture::{DetectedEvent, Gesture, RawClassification};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Why a classification did not count as a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Hand too small, usually too far from the camera
    Area,
    /// Label outside the gesture vocabulary, "none" included
    Label,
    /// Model not confident enough
    Confidence,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StabilizerStats {
    pub observed: u64,
    pub rejected_area: u64,
    pub rejected_label: u64,
    pub rejected_confidence: u64,
    pub suppressed: u64,
    pub emitted: u64,
}

/// Turns noisy per-frame classifications into one event per gesture.
///
/// A gesture becomes stable once it holds `min_votes` of the last
/// `window_size` observations. A stable gesture fires once and stays latched
/// until it loses its majority; re-firing the same gesture is additionally
/// held back for the cooldown, while a different gesture fires immediately.
pub struct GestureStabilizer {
    config: StabilizerConfig,
    window: VoteWindow,
    active: Option<Gesture>,
    last_emitted: Option<(Gesture, SystemTime)>,
    stats: StabilizerStats,
}

impl GestureStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        let window = VoteWindow::new(config.window_size);
        Self {
            config,
            window,
            active: None,
            last_emitted: None,
            stats: StabilizerStats::default(),
        }
    }

    /// Check one classification against the area, label and confidence gates
    pub fn accept(&self, raw: &RawClassification) -> Result<Gesture, Rejection> {
        if raw.area < self.config.min_area {
            return Err(Rejection::Area);
        }
        let gesture = raw.gesture().ok_or(Rejection::Label)?;
        if raw.confidence < self.config.min_confidence {
            return Err(Rejection::Confidence);
        }
        Ok(gesture)
    }

    /// Feed one classification; returns an event when a gesture is confirmed
    pub fn observe(&mut self, raw: &RawClassification) -> Option<DetectedEvent> {
        self.stats.observed += 1;

        let vote = match self.accept(raw) {
            Ok(gesture) => Some(gesture),
            Err(reason) => {
                match reason {
                    Rejection::Area => self.stats.rejected_area += 1,
                    Rejection::Label => self.stats.rejected_label += 1,
                    Rejection::Confidence => self.stats.rejected_confidence += 1,
                }
                debug!(
                    "Frame {} filtered ({:?}): {} conf {:.2} area {:.4}",
                    raw.frame_id,
                    reason,
                    raw.label,
                    raw.confidence,
                    raw.area
                );
                None
            }
        };
        self.window.push(vote);

        let stable = match self.window.stable(self.config.min_votes) {
            Some(gesture) => gesture,
            None => {
                if let Some(released) = self.active.take() {
                    debug!("{} released", released);
                }
                return None;
            }
        };

        if self.active == Some(stable) {
            return None;
        }
        self.active = Some(stable);

        if self.in_cooldown(stable, raw.timestamp) {
            self.stats.suppressed += 1;
            debug!("{} stable again within cooldown, suppressed", stable);
            return None;
        }

        self.last_emitted = Some((stable, raw.timestamp));
        self.stats.emitted += 1;
        debug!(
            "{} confirmed ({} of last {} frames)",
            stable,
            self.window.votes(stable),
            self.window.len()
        );

        Some(DetectedEvent {
            gesture: stable,
            timestamp: raw.timestamp,
            area: raw.area,
            confidence: raw.confidence,
        })
    }

    fn in_cooldown(&self, gesture: Gesture, now: SystemTime) -> bool {
        match self.last_emitted {
            Some((last, at)) if last == gesture => {
                // A clock step backwards counts as still cooling down
                let elapsed = now.duration_since(at).unwrap_or(Duration::ZERO);
                elapsed < self.config.cooldown()
            }
            _ => false,
        }
    }

    /// Gesture currently latched, if any
    pub fn active(&self) -> Option<Gesture> {
        self.active
    }

    pub fn stats(&self) -> &StabilizerStats {
        &self.stats
    }

    /// Forget the window and latch; the cooldown survives
    pub fn reset(&mut self) {
        self.window.clear();
        self.active = None;
    }
}
