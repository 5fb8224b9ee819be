// ── Side-effect events ──
//
// What the core tells its collaborators. Broadcast after the state change
// that caused them is visible, so a listener that reads the store on
// receipt sees the new snapshot.

use strum::IntoStaticStr;

use crate::command::CommandKind;
use crate::controller::ConnectionState;
use crate::model::UnitId;

#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum FleetEvent {
    /// A car went from moving to idle.
    Arrived { unit_id: UnitId, floor: i32 },
    DoorOpened { unit_id: UnitId },
    DoorClosed { unit_id: UnitId },
    /// A command left the client successfully.
    CommandSent { command: CommandKind },
    CommandFailed { command: CommandKind, reason: String },
    ConnectionChanged { state: ConnectionState },
    /// An emergency was accepted by the controller.
    Alarm,
}

impl FleetEvent {
    /// Stable kebab-case name, e.g. `door-opened`.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn unit_id(&self) -> Option<UnitId> {
        match self {
            Self::Arrived { unit_id, .. }
            | Self::DoorOpened { unit_id }
            | Self::DoorClosed { unit_id } => Some(*unit_id),
            Self::CommandSent { command } | Self::CommandFailed { command, .. } => {
                command.unit_id()
            }
            Self::ConnectionChanged { .. } | Self::Alarm => None,
        }
    }
}
