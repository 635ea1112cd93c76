// THEORY:
// The `router` module is the top-level API of the sorting engine. It ties the
// classifier and the bin allocator into the one call the sort loop makes per part:
// "here is what the camera saw, which bin does it go in?"
//
// Each part goes through two phases and never more:
// 1.  **Classify**: ask the `Classifier` which category of the profile the part
//     belongs to. A part nothing accepts is returned to the caller as
//     `NoMatchingCategory`; there is no hidden fallback bin. A profile that wants one
//     declares a catch-all category and it wins through ordinary matching.
// 2.  **Allocate or Look Up**: ask the allocator for that category's bin, binding
//     the next free slot if this is the category's first part.
//
// `SortRouter` owns the run-scoped state (profile and cursor) so a single loop gets
// exclusive access through `&mut self`. Parallel lanes share it through
// `parallel_router::SharedRouter`.

use crate::config::SorterConfig;
use crate::core_modules::bin_grid::{AllocatorCursor, BinLocation, allocate_or_get};
use crate::core_modules::classifier::{Classifier, MatchPolicy, MostSpecific};
use crate::core_modules::item::ItemDescriptor;
use crate::core_modules::profile::Profile;
use crate::core_modules::snapshot::RunSnapshot;
use crate::error::{SortError, SortResult};
use serde::Serialize;
use tracing::{debug, info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::bin_grid::{Allocation, FixtureBounds};
pub use crate::core_modules::category::Category;
pub use crate::core_modules::item::{Characteristic, Color, Kind};

/// Where one part goes, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    /// Key of the category in the profile.
    pub category: String,
    pub category_id: u32,
    pub category_name: String,
    pub location: BinLocation,
    /// True when this part opened a new bin.
    pub fresh_bin: bool,
}

/// Classifies `item` against `profile` and returns its category's bin, allocating
/// one from `cursor` on the category's first appearance.
pub fn route<P: MatchPolicy>(
    classifier: &Classifier<P>,
    item: &ItemDescriptor,
    profile: &mut Profile,
    cursor: &mut AllocatorCursor,
) -> SortResult<RoutingDecision> {
    let key = match classifier.classify(item, profile) {
        Ok(matched) => matched.key.to_string(),
        Err(err) => {
            warn!(item = %item.label(), profile = %profile.name, "no category accepts item");
            return Err(err);
        }
    };

    let category = profile
        .category_mut(&key)
        .ok_or_else(|| SortError::UnknownCategory(key.clone()))?;
    let Allocation { location, fresh } = allocate_or_get(category, cursor);

    if fresh {
        info!(category = %key, %location, "bound new bin to category");
    } else {
        debug!(category = %key, %location, "category already bound");
    }

    Ok(RoutingDecision {
        category_id: category.id,
        category_name: category.name.clone(),
        category: key,
        location,
        fresh_bin: fresh,
    })
}

/// The run-scoped routing state: one profile, one cursor.
pub struct SortRouter<P: MatchPolicy = MostSpecific> {
    profile: Profile,
    cursor: AllocatorCursor,
    classifier: Classifier<P>,
    record_contents: bool,
}

impl SortRouter<MostSpecific> {
    pub fn new(profile: Profile, config: &SorterConfig) -> Self {
        Self::with_classifier(profile, config, Classifier::new())
    }
}

impl<P: MatchPolicy> SortRouter<P> {
    pub fn with_classifier(
        profile: Profile,
        config: &SorterConfig,
        classifier: Classifier<P>,
    ) -> Self {
        Self {
            profile,
            cursor: AllocatorCursor::new(config.grid_width),
            classifier,
            record_contents: config.record_contents,
        }
    }

    pub fn route(&mut self, item: &ItemDescriptor) -> SortResult<RoutingDecision> {
        let decision = route(&self.classifier, item, &mut self.profile, &mut self.cursor)?;
        if self.record_contents {
            if let Some(category) = self.profile.category_mut(&decision.category) {
                category.contents.push(item.clone());
            }
        }
        Ok(decision)
    }

    /// The bin bound to category `key`, without routing anything.
    pub fn bin_for(&self, key: &str) -> SortResult<Option<BinLocation>> {
        self.profile
            .category(key)
            .map(Category::bin)
            .ok_or_else(|| SortError::UnknownCategory(key.to_string()))
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn cursor(&self) -> &AllocatorCursor {
        &self.cursor
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot::capture(&self.profile, &self.cursor)
    }

    /// Resumes an interrupted run. Only valid before anything has been routed.
    pub fn restore(&mut self, snapshot: &RunSnapshot) -> SortResult<()> {
        if self.cursor.allocated() > 0 {
            return Err(SortError::SnapshotMismatch(
                "bins were already allocated in this run".into(),
            ));
        }
        if snapshot.cursor.grid_width() != self.cursor.grid_width() {
            return Err(SortError::SnapshotMismatch(format!(
                "snapshot grid is {} columns wide, configured grid is {}",
                snapshot.cursor.grid_width(),
                self.cursor.grid_width()
            )));
        }

        match snapshot.apply(&mut self.profile) {
            Ok(cursor) => {
                self.cursor = cursor;
                info!(
                    profile = %self.profile.name,
                    restored = snapshot.assignments.len(),
                    next = %self.cursor.position(),
                    "restored run snapshot"
                );
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "rejected run snapshot");
                Err(err)
            }
        }
    }

    pub fn into_profile(self) -> Profile {
        self.profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const PROFILE: &str = r#"{"name":"demo","id":1,"categories":{
        "red_bricks":{"name":"Red bricks","id":1,"characteristics":["brick","color=red"],"defaults":["color=blue"]},
        "bricks":{"name":"Bricks","id":2,"characteristics":["brick"]},
        "tiles":{"name":"Tiles","id":3,"characteristics":["tile"]}
    }}"#;

    fn item(color: &str, tags: &[&str]) -> ItemDescriptor {
        ItemDescriptor::new(
            Kind { name: "Part".into(), id: 1 },
            Color { name: color.into(), id: 1 },
            tags.iter().map(|t| Characteristic::new(t).unwrap()),
        )
    }

    fn router() -> SortRouter {
        SortRouter::new(Profile::from_json_str(PROFILE).unwrap(), &SorterConfig::default())
    }

    #[test]
    fn first_part_of_each_category_opens_the_next_bin() {
        let mut router = router();
        let tile = router.route(&item("White", &["tile"])).unwrap();
        let brick = router.route(&item("Yellow", &["brick"])).unwrap();
        let red = router.route(&item("Red", &["brick"])).unwrap();

        assert_eq!((tile.category.as_str(), tile.location), ("tiles", BinLocation::new(0, 0)));
        assert_eq!((brick.category.as_str(), brick.location), ("bricks", BinLocation::new(1, 0)));
        assert_eq!((red.category.as_str(), red.location), ("red_bricks", BinLocation::new(2, 0)));
        assert!(tile.fresh_bin && brick.fresh_bin && red.fresh_bin);
    }

    #[test]
    fn repeat_parts_reuse_their_bin() {
        let mut router = router();
        let first = router.route(&item("White", &["tile"])).unwrap();
        router.route(&item("Yellow", &["brick"])).unwrap();
        let again = router.route(&item("Black", &["tile"])).unwrap();

        assert_eq!(first.location, again.location);
        assert!(!again.fresh_bin);
        assert_eq!(router.cursor().position(), BinLocation::new(2, 0));
    }

    #[test]
    fn unmatched_part_allocates_nothing() {
        let mut router = router();
        let result = router.route(&item("Red", &["round"]));
        assert!(matches!(result, Err(SortError::NoMatchingCategory { .. })));
        assert_eq!(router.cursor().allocated(), 0);
        assert!(router.profile().bindings().is_empty());
    }

    #[test]
    fn explicit_color_tag_beats_category_default() {
        let mut router = router();
        let decision = router.route(&item("", &["brick", "color=red"])).unwrap();
        assert_eq!(decision.category, "red_bricks");
        assert_eq!(router.bin_for("red_bricks").unwrap(), Some(decision.location));
        assert_eq!(router.bin_for("tiles").unwrap(), None);
        assert!(matches!(router.bin_for("gears"), Err(SortError::UnknownCategory(_))));
    }

    #[test]
    fn no_two_categories_share_a_bin() {
        let json = format!(
            r#"{{"name":"many","id":2,"categories":{{{}}}}}"#,
            (0..20)
                .map(|i| {
                    format!(r#""c{i}":{{"name":"C{i}","id":{i},"characteristics":["part={i}"]}}"#)
                })
                .collect::<Vec<_>>()
                .join(",")
        );
        let profile = Profile::from_json_str(&json).unwrap();
        let mut router = SortRouter::new(profile, &SorterConfig::default());

        let mut seen = HashSet::new();
        for i in (0..20).rev() {
            let tag = format!("part={i}");
            let decision = router.route(&item("Gray", &[tag.as_str()])).unwrap();
            assert!(seen.insert(decision.location));
        }
        assert_eq!(router.cursor().position(), BinLocation::new(4, 2));
    }

    #[test]
    fn contents_are_recorded_only_when_enabled() {
        let mut quiet = router();
        quiet.route(&item("White", &["tile"])).unwrap();
        assert!(quiet.profile().category("tiles").unwrap().contents.is_empty());

        let config = SorterConfig {
            record_contents: true,
            ..SorterConfig::default()
        };
        let mut recording = SortRouter::new(Profile::from_json_str(PROFILE).unwrap(), &config);
        recording.route(&item("White", &["tile"])).unwrap();
        recording.route(&item("Black", &["tile"])).unwrap();
        assert_eq!(recording.profile().category("tiles").unwrap().contents.len(), 2);
    }

    #[test]
    fn restore_resumes_where_the_last_run_stopped() {
        let mut first_run = router();
        first_run.route(&item("White", &["tile"])).unwrap();
        first_run.route(&item("Yellow", &["brick"])).unwrap();
        let snapshot = first_run.snapshot();

        let mut second_run = router();
        second_run.restore(&snapshot).unwrap();
        let tile = second_run.route(&item("Gray", &["tile"])).unwrap();
        assert_eq!(tile.location, BinLocation::new(0, 0));
        let red = second_run.route(&item("Red", &["brick"])).unwrap();
        assert_eq!(red.location, BinLocation::new(2, 0));
        assert!(red.fresh_bin);
    }

    #[test]
    fn restore_is_refused_mid_run_or_on_another_grid() {
        let mut source = router();
        source.route(&item("White", &["tile"])).unwrap();
        let snapshot = source.snapshot();

        let mut busy = router();
        busy.route(&item("Yellow", &["brick"])).unwrap();
        assert!(matches!(busy.restore(&snapshot), Err(SortError::SnapshotMismatch(_))));

        let narrow = SorterConfig {
            grid_width: 4,
            ..SorterConfig::default()
        };
        let mut other_grid = SortRouter::new(Profile::from_json_str(PROFILE).unwrap(), &narrow);
        assert!(matches!(other_grid.restore(&snapshot), Err(SortError::SnapshotMismatch(_))));
    }
}
