// ── Unit domain types ──

use std::fmt;

use serde::{Deserialize, Serialize};

// ── UnitId ──────────────────────────────────────────────────────────

/// Identity of one elevator car, assigned by the controller.
///
/// Stable for the lifetime of a session and never reused within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl UnitId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for UnitId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// ── State enums ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementState {
    Idle,
    MovingUp,
    MovingDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoorState {
    Open,
    Closed,
}

/// Operating mode set through the control endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitMode {
    Normal,
    Maintenance,
    Emergency,
}

// ── Unit ────────────────────────────────────────────────────────────

/// One elevator car as last reported by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    #[serde(rename = "elevatorId")]
    pub id: UnitId,
    pub current_floor: i32,
    pub movement_state: MovementState,
    pub door_state: DoorState,
    pub mode: UnitMode,
    /// Informational only.
    pub capacity: u32,
}

impl Unit {
    pub fn is_idle(&self) -> bool {
        self.movement_state == MovementState::Idle
    }

    pub fn is_moving(&self) -> bool {
        !self.is_idle()
    }

    pub fn door_open(&self) -> bool {
        self.door_state == DoorState::Open
    }

    // ── Control availability (advisory, the controller decides) ─────

    pub fn can_trigger_emergency(&self) -> bool {
        self.mode != UnitMode::Emergency
    }

    pub fn can_clear_emergency(&self) -> bool {
        self.mode == UnitMode::Emergency
    }

    pub fn can_toggle_maintenance(&self) -> bool {
        self.mode != UnitMode::Emergency
    }

    pub fn in_maintenance(&self) -> bool {
        self.mode == UnitMode::Maintenance
    }
}
