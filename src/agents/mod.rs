pub mod specialists;
pub mod traits;

pub use specialists::{instructions_for, SpecialistAgent};
