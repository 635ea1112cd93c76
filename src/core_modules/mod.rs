pub mod bin_grid;
pub mod category;
pub mod classifier;
pub mod item;
pub mod profile;
pub mod snapshot;
pub mod stats;
