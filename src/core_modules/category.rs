// THEORY:
// A `Category` is one bucket of a sorting profile: "red bricks", "1-wide tiles",
// "everything else". It carries what an item must have to belong (requirements),
// what the category assumes about its members when the item says nothing
// (defaults), and the bin it was given the first time one of its items was routed.
//
// The bin field is write-once. Only the allocator in `bin_grid` writes it, and only
// while it is still empty, so a category is always either fully bound or not bound.

use crate::core_modules::bin_grid::BinLocation;
use crate::core_modules::item::{Characteristic, ItemDescriptor};

#[derive(Debug, Clone)]
pub struct Category {
    pub name: String,
    pub id: u32,
    /// Necessary conditions: every one must be among the item's traits.
    pub characteristics: Vec<Characteristic>,
    /// Inherited traits; an item's own value on the same dimension overrides them.
    pub defaults: Vec<Characteristic>,
    /// Items routed here so far. Informational only.
    pub contents: Vec<ItemDescriptor>,
    bin: Option<BinLocation>,
}

impl Category {
    pub fn new(
        name: impl Into<String>,
        id: u32,
        characteristics: Vec<Characteristic>,
        defaults: Vec<Characteristic>,
    ) -> Self {
        Self {
            name: name.into(),
            id,
            characteristics,
            defaults,
            contents: Vec::new(),
            bin: None,
        }
    }

    /// The bin bound to this category, if it has been routed before.
    pub fn bin(&self) -> Option<BinLocation> {
        self.bin
    }

    /// A category without requirements accepts every item.
    pub fn is_catch_all(&self) -> bool {
        self.characteristics.is_empty()
    }

    /// Binds `location` unless a bin is already bound; returns the bound bin.
    pub(crate) fn bind(&mut self, location: BinLocation) -> BinLocation {
        *self.bin.get_or_insert(location)
    }
}
