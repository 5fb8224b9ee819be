// ── Outbound message bodies ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::UnitId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        })
    }
}

/// Hall call: someone on `target_floor` wants to travel in `direction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub target_floor: i32,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
}

impl CallRequest {
    pub fn new(target_floor: i32, direction: Direction) -> Self {
        Self {
            target_floor,
            direction,
            timestamp: Utc::now(),
        }
    }
}

/// Car call: a specific car should go to `target_floor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GotoRequest {
    pub elevator_id: UnitId,
    pub target_floor: i32,
    pub timestamp: DateTime<Utc>,
}

impl GotoRequest {
    pub fn new(elevator_id: UnitId, target_floor: i32) -> Self {
        Self {
            elevator_id,
            target_floor,
            timestamp: Utc::now(),
        }
    }
}
