pub mod classifier;

pub use classifier::RouterAgent;
