//! Tables for a GTFS feed imported into SQLite, and the `route_patterns` table derived from them.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod ids;
mod loader;
pub mod route_patterns;
pub mod routes;
pub mod trips;

pub use ids::{orig, CheapID, DirectionID, RouteIndex, RoutePatternIndex, ShapeID, TripIndex};
pub use loader::{count_indices, rebuild, run_loader, TableLoader};
pub use route_patterns::{RoutePattern, RoutePatternLoader};
pub use routes::{Route, RouteLoader};
pub use trips::{Trip, TripLoader};
