// ── Fleet snapshot ──
//
// One complete, index-aligned report of every car. Position `i` refers to
// the same physical car across consecutive snapshots; the ingestor relies
// on that upstream guarantee instead of re-matching by id.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::unit::{Unit, UnitId};
use crate::config::FloorRange;
use crate::error::CoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetSnapshot {
    units: Vec<Unit>,
    /// `None` until the first snapshot of a session has been applied.
    received_at: Option<DateTime<Utc>>,
}

impl FleetSnapshot {
    /// The placeholder held before any snapshot arrives.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap units received just now.
    pub fn from_units(units: Vec<Unit>) -> Self {
        Self {
            units,
            received_at: Some(Utc::now()),
        }
    }

    /// Parse and validate a raw message body.
    ///
    /// The whole snapshot is rejected if it is not a JSON array of unit
    /// records, if two records share an id, or if a car reports a floor
    /// outside `floors`.
    pub fn parse(raw: &str, floors: FloorRange) -> Result<Self, CoreError> {
        let units: Vec<Unit> =
            serde_json::from_str(raw).map_err(|e| CoreError::MalformedSnapshot {
                reason: e.to_string(),
            })?;

        let mut seen = HashSet::with_capacity(units.len());
        for unit in &units {
            if !seen.insert(unit.id) {
                return Err(CoreError::MalformedSnapshot {
                    reason: format!("duplicate elevator id {}", unit.id),
                });
            }
            if !floors.contains(unit.current_floor) {
                return Err(CoreError::MalformedSnapshot {
                    reason: format!(
                        "elevator {} reports floor {} outside {floors}",
                        unit.id, unit.current_floor
                    ),
                });
            }
        }

        Ok(Self::from_units(units))
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Whether this snapshot came from the controller.
    pub fn is_primed(&self) -> bool {
        self.received_at.is_some()
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Ids in fleet order.
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.iter().map(|u| u.id).collect()
    }
}
