//! Pipeline module - orchestrates the analysis steps

pub mod cleaner;
pub mod comparator;
pub mod config;
pub mod correlation;
pub mod loader;
pub mod matrix;
pub mod missing;
pub mod pca;
pub mod predict;
pub mod split;
pub mod validation;

pub use cleaner::*;
pub use comparator::*;
pub use config::*;
pub use correlation::*;
pub use loader::*;
pub use matrix::*;
pub use missing::*;
pub use pca::*;
pub use predict::*;
pub use split::*;
pub use validation::*;
