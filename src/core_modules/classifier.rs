// THEORY:
// The `classifier` decides which category of a profile an identified item belongs
// to. It is a pure function of the item and the current profile: it never binds a
// bin, never touches the cursor, and gives the same answer every time it is asked
// the same question.
//
// Key architectural principles:
// 1.  **Requirements are Necessary**: A category accepts an item only if every one
//     of its characteristics is among the item's traits. Having more traits than
//     required is fine.
// 2.  **Item Overrides Defaults**: Before testing requirements, the category's
//     defaults are layered *under* the item's own traits. A default only counts on a
//     dimension the item is silent about, so an item that says `color=red` is red
//     even in a category that assumes blue.
// 3.  **Most Specific Wins**: Among accepting categories the one with the most
//     requirements wins; ties go to the lowest category id. A catch-all (no
//     requirements) only wins when nothing more specific accepts.
// 4.  **Pluggable Policy**: The acceptance/scoring rule sits behind `MatchPolicy` so
//     a deployment with different requirements can swap it without touching routing.

use crate::core_modules::category::Category;
use crate::core_modules::item::{ItemDescriptor, TraitSet};
use crate::core_modules::profile::Profile;
use crate::error::{SortError, SortResult};
use std::collections::BTreeSet;

/// Decides whether a category accepts an item and how specific the match is.
pub trait MatchPolicy: Send + Sync {
    /// `Some(score)` when `category` accepts an item with `traits`; higher is more specific.
    fn score(&self, traits: &TraitSet, category: &Category) -> Option<usize>;
}

/// Necessary characteristics, scored by how many the category requires.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostSpecific;

impl MatchPolicy for MostSpecific {
    fn score(&self, traits: &TraitSet, category: &Category) -> Option<usize> {
        let effective = traits.with_defaults(&category.defaults);
        let required: BTreeSet<_> = category.characteristics.iter().collect();
        required
            .iter()
            .all(|characteristic| effective.contains(characteristic))
            .then_some(required.len())
    }
}

/// The category an item was classified into.
#[derive(Debug, Clone, Copy)]
pub struct Match<'p> {
    pub key: &'p str,
    pub category: &'p Category,
    pub score: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Classifier<P: MatchPolicy = MostSpecific> {
    policy: P,
}

impl Classifier<MostSpecific> {
    pub fn new() -> Self {
        Self { policy: MostSpecific }
    }
}

impl<P: MatchPolicy> Classifier<P> {
    pub fn with_policy(policy: P) -> Self {
        Self { policy }
    }

    /// Picks the most specific accepting category, or `NoMatchingCategory`.
    pub fn classify<'p>(
        &self,
        item: &ItemDescriptor,
        profile: &'p Profile,
    ) -> SortResult<Match<'p>> {
        let traits = item.traits();
        profile
            .categories()
            .filter_map(|(key, category)| {
                self.policy
                    .score(&traits, category)
                    .map(|score| Match { key, category, score })
            })
            .max_by(|a, b| {
                a.score
                    .cmp(&b.score)
                    .then_with(|| b.category.id.cmp(&a.category.id))
            })
            .ok_or_else(|| SortError::NoMatchingCategory { item: item.label() })
    }
}
