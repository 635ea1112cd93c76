// THEORY:
// The `bin_grid` module owns the physical addressing of the sorting fixture: a grid
// of bins, a fixed number of columns wide and open-ended in rows. It answers a single
// question, "where does this category go?", and answers it the same way forever once
// a category has been seen.
//
// Key architectural principles:
// 1.  **Rolling Cursor**: The `AllocatorCursor` is the next free slot. It only moves
//     forward, column by column, wrapping to a new row at the grid width. Because it
//     never moves back, no slot is ever handed out twice.
// 2.  **Write-Once Binding**: A category's bin is bound the first time the category is
//     routed and never changes afterwards. Looking up an already-bound category does
//     not touch the cursor.
// 3.  **No Self-Limiting**: Rows are unbounded here. Whether a row exists on the real
//     fixture is the actuation layer's problem, checked with `FixtureBounds`.
// 4.  **Run-Scoped State**: The cursor is an ordinary value owned by the run, passed
//     in by `&mut`. Exclusive access is the borrow checker's job in a single loop and
//     the router's mutex when lanes share it.

use crate::core_modules::category::Category;
use crate::error::{SortError, SortResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column count of the reference fixture.
pub const DEFAULT_GRID_WIDTH: u32 = 8;

/// A bin address on the sorting grid. Opaque addressing, not a motor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BinLocation {
    pub column: u32,
    pub row: u32,
}

impl BinLocation {
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }
}

impl fmt::Display for BinLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.column, self.row)
    }
}

/// The next free slot on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorCursor {
    column: u32,
    row: u32,
    grid_width: u32,
}

impl AllocatorCursor {
    /// A fresh cursor at (0, 0). A zero width is treated as a single column.
    pub fn new(grid_width: u32) -> Self {
        Self {
            column: 0,
            row: 0,
            grid_width: grid_width.max(1),
        }
    }

    pub fn position(&self) -> BinLocation {
        BinLocation::new(self.column, self.row)
    }

    pub fn grid_width(&self) -> u32 {
        self.grid_width
    }

    /// Number of slots handed out so far.
    pub fn allocated(&self) -> u64 {
        self.row as u64 * self.grid_width as u64 + self.column as u64
    }

    /// True when `location` was handed out before the cursor's current position.
    pub fn has_passed(&self, location: BinLocation) -> bool {
        location.column < self.grid_width
            && (location.row < self.row
                || (location.row == self.row && location.column < self.column))
    }

    fn advance(&mut self) {
        self.column += 1;
        if self.column >= self.grid_width {
            self.column = 0;
            self.row += 1;
        }
    }
}

impl Default for AllocatorCursor {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_WIDTH)
    }
}

/// The outcome of an allocate-or-get call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub location: BinLocation,
    /// True when this call bound the category; false for a lookup.
    pub fresh: bool,
}

/// Returns the category's bin, binding the cursor's current slot and advancing the
/// cursor if the category has never been routed before.
pub fn allocate_or_get(category: &mut Category, cursor: &mut AllocatorCursor) -> Allocation {
    if let Some(location) = category.bin() {
        return Allocation { location, fresh: false };
    }

    let location = category.bind(cursor.position());
    cursor.advance();
    Allocation { location, fresh: true }
}

/// The real extent of a physical fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureBounds {
    pub columns: u32,
    pub rows: u32,
}

impl FixtureBounds {
    pub fn contains(&self, location: BinLocation) -> bool {
        location.column < self.columns && location.row < self.rows
    }

    /// Rejects a location the fixture cannot physically reach.
    pub fn check(&self, location: BinLocation) -> SortResult<()> {
        if self.contains(location) {
            Ok(())
        } else {
            Err(SortError::GridExhausted {
                location,
                columns: self.columns,
                rows: self.rows,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn category(id: u32) -> Category {
        Category::new(format!("category-{id}"), id, Vec::new(), Vec::new())
    }

    #[test]
    fn first_row_fills_then_wraps() {
        let mut cursor = AllocatorCursor::new(DEFAULT_GRID_WIDTH);
        let mut categories: Vec<Category> = (0..9).map(category).collect();

        let locations: Vec<BinLocation> = categories
            .iter_mut()
            .map(|c| allocate_or_get(c, &mut cursor).location)
            .collect();

        for (column, location) in locations.iter().take(8).enumerate() {
            assert_eq!(*location, BinLocation::new(column as u32, 0));
        }
        assert_eq!(locations[8], BinLocation::new(0, 1));
        assert_eq!(cursor.position(), BinLocation::new(1, 1));
    }

    #[test]
    fn lookup_does_not_advance_cursor() {
        let mut cursor = AllocatorCursor::default();
        let mut bricks = category(1);

        let first = allocate_or_get(&mut bricks, &mut cursor);
        let after_first = cursor.clone();
        let second = allocate_or_get(&mut bricks, &mut cursor);

        assert!(first.fresh);
        assert!(!second.fresh);
        assert_eq!(first.location, second.location);
        assert_eq!(cursor, after_first);
    }

    #[test]
    fn binding_survives_other_allocations() {
        let mut cursor = AllocatorCursor::default();
        let mut plates = category(1);
        let bound = allocate_or_get(&mut plates, &mut cursor).location;

        for id in 2..30 {
            allocate_or_get(&mut category(id), &mut cursor);
        }

        assert_eq!(allocate_or_get(&mut plates, &mut cursor).location, bound);
    }

    #[test]
    fn allocations_never_collide() {
        let mut cursor = AllocatorCursor::new(3);
        let mut seen = HashSet::new();
        for id in 0..100 {
            let location = allocate_or_get(&mut category(id), &mut cursor).location;
            assert!(location.column < 3);
            assert!(seen.insert(location), "{location} handed out twice");
        }
        assert_eq!(cursor.allocated(), 100);
    }

    #[test]
    fn zero_width_grid_degrades_to_a_single_column() {
        let mut cursor = AllocatorCursor::new(0);
        assert_eq!(allocate_or_get(&mut category(1), &mut cursor).location, BinLocation::new(0, 0));
        assert_eq!(allocate_or_get(&mut category(2), &mut cursor).location, BinLocation::new(0, 1));
    }

    #[test]
    fn cursor_knows_which_slots_it_has_passed() {
        let mut cursor = AllocatorCursor::new(4);
        for id in 0..6 {
            allocate_or_get(&mut category(id), &mut cursor);
        }
        assert!(cursor.has_passed(BinLocation::new(3, 0)));
        assert!(cursor.has_passed(BinLocation::new(1, 1)));
        assert!(!cursor.has_passed(BinLocation::new(2, 1)));
        assert!(!cursor.has_passed(BinLocation::new(0, 2)));
        assert!(!cursor.has_passed(BinLocation::new(7, 0)));
    }

    #[test]
    fn fixture_bounds_reject_overflowing_rows() {
        let bounds = FixtureBounds { columns: 8, rows: 2 };
        assert!(bounds.check(BinLocation::new(7, 1)).is_ok());
        match bounds.check(BinLocation::new(0, 2)) {
            Err(SortError::GridExhausted { location, rows, .. }) => {
                assert_eq!(location, BinLocation::new(0, 2));
                assert_eq!(rows, 2);
            }
            other => panic!("expected GridExhausted, got {other:?}"),
        }
    }
}
