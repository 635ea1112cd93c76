// THEORY:
// This file is the main entry point for the `nexus_sort` library crate: the decision
// logic of a part sorting machine. A camera identifies each part on the conveyor;
// this crate decides which bin it belongs in.
//
// The public surface is the `router` (`SortRouter`, `RoutingDecision`) for a single
// sort loop, `parallel_router` for several lanes sharing one bin grid, and
// `sort_loop` for driving a router from a stream of identified parts. The engine
// pieces they are built from (`core_modules`) are public too, so an integrator can
// use the classifier or the allocator on their own.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_router;
pub mod router;
pub mod sort_loop;

pub use config::{SorterConfig, UnmatchedPolicy};
pub use core_modules::bin_grid::{AllocatorCursor, BinLocation, FixtureBounds};
pub use core_modules::item::{Characteristic, Color, ItemDescriptor, Kind};
pub use core_modules::profile::Profile;
pub use core_modules::snapshot::RunSnapshot;
pub use core_modules::stats::SortStats;
pub use error::{ConfigError, ProfileParseError, SortError, SortResult};
pub use router::{RoutingDecision, SortRouter};
