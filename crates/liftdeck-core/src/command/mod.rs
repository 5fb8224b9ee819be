// ── Command system ──
//
// Every outbound action the dispatcher can take. Used as the payload of
// `CommandSent`/`CommandFailed` events and in `CoreError::CommandFailed`.

pub mod requests;

use std::fmt;

pub use requests::{CallRequest, Direction, GotoRequest};

use crate::model::UnitId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Hall call published on the call destination.
    Call { floor: i32, direction: Direction },
    /// Car call published on the goto destination.
    Goto { unit_id: UnitId, floor: i32 },
    TriggerEmergency { unit_id: UnitId },
    ClearEmergency { unit_id: UnitId },
    SetMaintenance { unit_id: UnitId, enabled: bool },
}

impl CommandKind {
    /// Whether this command travels over the pub/sub link rather than HTTP.
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Call { .. } | Self::Goto { .. })
    }

    pub fn unit_id(&self) -> Option<UnitId> {
        match self {
            Self::Call { .. } => None,
            Self::Goto { unit_id, .. }
            | Self::TriggerEmergency { unit_id }
            | Self::ClearEmergency { unit_id }
            | Self::SetMaintenance { unit_id, .. } => Some(*unit_id),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call { floor, direction } => write!(f, "call {direction} at floor {floor}"),
            Self::Goto { unit_id, floor } => write!(f, "send elevator {unit_id} to floor {floor}"),
            Self::TriggerEmergency { unit_id } => write!(f, "trigger emergency on elevator {unit_id}"),
            Self::ClearEmergency { unit_id } => write!(f, "clear emergency on elevator {unit_id}"),
            Self::SetMaintenance { unit_id, enabled: true } => {
                write!(f, "enable maintenance on elevator {unit_id}")
            }
            Self::SetMaintenance { unit_id, enabled: false } => {
                write!(f, "disable maintenance on elevator {unit_id}")
            }
        }
    }
}
