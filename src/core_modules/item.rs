// THEORY:
// The `item` module describes what the identification step hands to the sorter:
// a single physical part, reduced to its kind, its color and a set of descriptive
// tags ("tile", "round", "one-wide"). The sorter never looks at pixels; this is the
// whole of its knowledge about a part.
//
// Key architectural principles:
// 1.  **Normalized Tags**: A `Characteristic` is trimmed and lower-cased on the way
//     in, so "Tile" from a hand-written profile and "tile" from the model compare
//     equal.
// 2.  **Trait Dimensions**: A tag written as `dimension=value` (e.g. `color=red`)
//     belongs to a dimension. Two tags on the same dimension compete, which is what
//     lets an item's own value override a category's inherited default.
// 3.  **Immutable Descriptor**: An `ItemDescriptor` is built once per part and only
//     read afterwards. Its `traits()` view folds the kind and color into tags so the
//     matcher only has to reason about one kind of thing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A normalized descriptive tag, optionally scoped to a trait dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Characteristic(String);

impl Characteristic {
    /// Parses and normalizes a raw tag. Rejects empty tags and half-written
    /// dimension tags such as `=red` or `color=`.
    pub fn new(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("characteristic is empty".to_string());
        }
        match trimmed.split_once('=') {
            Some((dimension, value)) => {
                let (dimension, value) = (dimension.trim(), value.trim());
                if dimension.is_empty() || value.is_empty() {
                    return Err(format!(
                        "characteristic '{trimmed}' has an empty dimension or value"
                    ));
                }
                Ok(Self::with_dimension(dimension, value))
            }
            None => Ok(Self(trimmed.to_lowercase())),
        }
    }

    /// Builds a `dimension=value` tag from already-known parts.
    pub fn with_dimension(dimension: &str, value: &str) -> Self {
        Self(format!(
            "{}={}",
            dimension.trim().to_lowercase(),
            value.trim().to_lowercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trait dimension this tag describes, if any.
    pub fn dimension(&self) -> Option<&str> {
        self.0.split_once('=').map(|(dimension, _)| dimension)
    }
}

impl TryFrom<String> for Characteristic {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(&raw)
    }
}

impl From<Characteristic> for String {
    fn from(characteristic: Characteristic) -> Self {
        characteristic.0
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identified part kind, e.g. "Brick 2x4" / 3001.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kind {
    pub name: String,
    pub id: u32,
}

/// The identified part color, e.g. "Red" / 4.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub name: String,
    pub id: u32,
}

/// The output of identification for one physical part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub kind: Kind,
    pub color: Color,
    #[serde(default)]
    pub characteristics: BTreeSet<Characteristic>,
}

impl ItemDescriptor {
    pub fn new(
        kind: Kind,
        color: Color,
        characteristics: impl IntoIterator<Item = Characteristic>,
    ) -> Self {
        Self {
            kind,
            color,
            characteristics: characteristics.into_iter().collect(),
        }
    }

    /// A short human-readable label used in logs and errors.
    pub fn label(&self) -> String {
        format!("{} #{} ({} #{})", self.kind.name, self.kind.id, self.color.name, self.color.id)
    }

    /// The item's effective traits: its own tags, plus `kind=` and `color=` tags
    /// derived from the descriptor for any dimension the tags leave unset.
    pub fn traits(&self) -> TraitSet {
        let mut traits = TraitSet(self.characteristics.clone());
        for (dimension, name) in [("kind", &self.kind.name), ("color", &self.color.name)] {
            if !name.trim().is_empty() && !traits.has_dimension(dimension) {
                traits.0.insert(Characteristic::with_dimension(dimension, name));
            }
        }
        traits
    }
}

/// A set of characteristics that can be layered over inherited defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraitSet(BTreeSet<Characteristic>);

impl TraitSet {
    pub fn contains(&self, characteristic: &Characteristic) -> bool {
        self.0.contains(characteristic)
    }

    pub fn has_dimension(&self, dimension: &str) -> bool {
        self.0.iter().any(|c| c.dimension() == Some(dimension))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Characteristic> {
        self.0.iter()
    }

    /// Fills in `defaults` underneath this set. A default on a dimension this set
    /// already describes is dropped; bare defaults are always added.
    pub fn with_defaults(&self, defaults: &[Characteristic]) -> TraitSet {
        let mut merged = self.0.clone();
        for default in defaults {
            match default.dimension() {
                Some(dimension) if self.has_dimension(dimension) => continue,
                _ => {
                    merged.insert(default.clone());
                }
            }
        }
        TraitSet(merged)
    }
}

impl FromIterator<Characteristic> for TraitSet {
    fn from_iter<I: IntoIterator<Item = Characteristic>>(iter: I) -> Self {
        TraitSet(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(raw: &str) -> Characteristic {
        Characteristic::new(raw).unwrap()
    }

    #[test]
    fn characteristics_are_normalized() {
        assert_eq!(tag("  Tile ").as_str(), "tile");
        assert_eq!(tag("Color = Red").as_str(), "color=red");
        assert_eq!(tag("color=red").dimension(), Some("color"));
        assert_eq!(tag("round").dimension(), None);
    }

    #[test]
    fn half_written_dimension_tags_are_rejected() {
        assert!(Characteristic::new("").is_err());
        assert!(Characteristic::new("=red").is_err());
        assert!(Characteristic::new("color=").is_err());
    }

    #[test]
    fn descriptor_fields_fill_unset_dimensions() {
        let item = ItemDescriptor::new(
            Kind { name: "Plate 2x2".into(), id: 3022 },
            Color { name: "White".into(), id: 1 },
            [tag("plate")],
        );
        let traits = item.traits();
        assert!(traits.contains(&tag("plate")));
        assert!(traits.contains(&tag("kind=plate 2x2")));
        assert!(traits.contains(&tag("color=white")));
    }

    #[test]
    fn explicit_tags_win_over_descriptor_fields() {
        let item = ItemDescriptor::new(
            Kind { name: "Brick 2x4".into(), id: 3001 },
            Color { name: "Dark Red".into(), id: 59 },
            [tag("color=red")],
        );
        let traits = item.traits();
        assert!(traits.contains(&tag("color=red")));
        assert!(!traits.contains(&tag("color=dark red")));
    }

    #[test]
    fn defaults_only_fill_missing_dimensions() {
        let traits: TraitSet = [tag("color=red")].into_iter().collect();
        let merged = traits.with_defaults(&[tag("color=blue"), tag("shape=round"), tag("tile")]);
        assert!(merged.contains(&tag("color=red")));
        assert!(!merged.contains(&tag("color=blue")));
        assert!(merged.contains(&tag("shape=round")));
        assert!(merged.contains(&tag("tile")));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn characteristics_deserialize_through_normalization() {
        let item: ItemDescriptor = serde_json::from_str(
            r#"{"kind":{"name":"Tile 1x1","id":3070},"color":{"name":"Blue","id":5},"characteristics":["TILE","One-Wide"]}"#,
        )
        .unwrap();
        assert!(item.characteristics.contains(&tag("tile")));
        assert!(item.characteristics.contains(&tag("one-wide")));

        let bad = serde_json::from_str::<ItemDescriptor>(
            r#"{"kind":{"name":"Tile","id":1},"color":{"name":"Blue","id":5},"characteristics":["color="]}"#,
        );
        assert!(bad.is_err());
    }
}
