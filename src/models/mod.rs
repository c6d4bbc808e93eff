//! Core data models for the deck meta tracker.

mod analysis;
mod archetype;
mod card;
mod ids;
mod performance;
mod sample;
mod snapshot;
mod variant;

pub use analysis::*;
pub use archetype::*;
pub use card::*;
pub use ids::*;
pub use performance::*;
pub use sample::*;
pub use snapshot::*;
pub use variant::*;
