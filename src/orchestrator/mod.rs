pub mod router;
pub mod routing;

pub use router::{Orchestrator, RouteLabel, RoutedResponse};
