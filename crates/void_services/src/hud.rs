//! Display and messaging contracts
//!
//! All calls are fire-and-forget; gameplay code never inspects a result.

use serde::{Deserialize, Serialize};
use void_core::{Location, ParticipantId};

/// HUD layer a line is drawn on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HudLayer {
    Instance,
    Party,
    Threat,
}

/// One HUD line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HudElement {
    pub text: String,
    /// 0xRRGGBB
    pub color: u32,
}

impl HudElement {
    pub fn new(text: impl Into<String>, color: u32) -> Self {
        Self {
            text: text.into(),
            color,
        }
    }
}

/// Host HUD renderer
pub trait HudService: Send + Sync {
    fn set_hud(&self, participant: ParticipantId, layer: HudLayer, element: HudElement);

    fn clear_hud(&self, participant: ParticipantId, layer: HudLayer);
}

/// Host compass/waypoint display
pub trait WaypointService: Send + Sync {
    /// Point a participant's compass at a location
    fn set_waypoint(&self, participant: ParticipantId, label: &str, location: &Location);

    fn clear_waypoint(&self, participant: ParticipantId);
}

/// Chat messages to a single participant
pub trait Notifier: Send + Sync {
    fn send_message(&self, participant: ParticipantId, message: &str);
}
