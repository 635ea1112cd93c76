// THEORY:
// A `RunSnapshot` is the allocator's memory written down: the cursor and every
// category-to-bin binding made so far. The bins on the machine physically hold the
// parts routed into them, so if the process restarts mid-run the new process must
// keep sending each category to the same bin and must not hand a used bin to a new
// category. Restoring a snapshot into a freshly loaded profile gives exactly that.
//
// A snapshot is applied all-or-nothing. Every assignment is checked against the
// profile and the cursor before the first binding is written, so a rejected
// snapshot leaves the profile untouched.

use crate::core_modules::bin_grid::{AllocatorCursor, BinLocation};
use crate::core_modules::profile::Profile;
use crate::error::{SortError, SortResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinAssignment {
    pub category: String,
    pub location: BinLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub profile_id: u32,
    pub profile_name: String,
    pub cursor: AllocatorCursor,
    /// In allocation order.
    pub assignments: Vec<BinAssignment>,
    pub taken_at_ms: u64,
}

impl RunSnapshot {
    pub fn capture(profile: &Profile, cursor: &AllocatorCursor) -> Self {
        let taken_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        Self {
            profile_id: profile.id,
            profile_name: profile.name.clone(),
            cursor: cursor.clone(),
            assignments: profile
                .bindings()
                .into_iter()
                .map(|(category, location)| BinAssignment { category, location })
                .collect(),
            taken_at_ms,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Binds every assignment into `profile` and returns the cursor to resume from.
    pub(crate) fn apply(&self, profile: &mut Profile) -> SortResult<AllocatorCursor> {
        self.validate(profile)?;
        for assignment in &self.assignments {
            let category = profile
                .category_mut(&assignment.category)
                .ok_or_else(|| SortError::UnknownCategory(assignment.category.clone()))?;
            category.bind(assignment.location);
        }
        Ok(self.cursor.clone())
    }

    fn validate(&self, profile: &Profile) -> SortResult<()> {
        let mismatch = |reason: String| Err(SortError::SnapshotMismatch(reason));

        if self.profile_id != profile.id {
            return mismatch(format!(
                "snapshot was taken for profile {} but profile {} is loaded",
                self.profile_id, profile.id
            ));
        }
        if self.cursor.position().column >= self.cursor.grid_width() {
            return mismatch(format!(
                "cursor {} lies outside a grid {} columns wide",
                self.cursor.position(),
                self.cursor.grid_width()
            ));
        }
        if self.cursor.position().row == u32::MAX {
            return mismatch(format!(
                "cursor {} sits on the last addressable row",
                self.cursor.position()
            ));
        }

        let mut categories = HashSet::new();
        let mut locations = HashSet::new();
        for BinAssignment { category, location } in &self.assignments {
            let Some(target) = profile.category(category) else {
                return mismatch(format!("category '{category}' is not in the profile"));
            };
            if target.bin().is_some() {
                return mismatch(format!("category '{category}' is already bound"));
            }
            if !categories.insert(category) {
                return mismatch(format!("category '{category}' is assigned twice"));
            }
            if !locations.insert(*location) {
                return mismatch(format!("bin {location} is assigned twice"));
            }
            if !self.cursor.has_passed(*location) {
                return mismatch(format!(
                    "bin {location} was never handed out by cursor {}",
                    self.cursor.position()
                ));
            }
        }
        Ok(())
    }
}
