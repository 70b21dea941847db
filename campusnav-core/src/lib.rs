//! Navigation core for the campus guide.
//!
//! Two cooperating parts share the geometric toolkit in [`geometry`]:
//!
//! - [`indoor`] builds walking graphs from floor plans and runs Dijkstra over them;
//! - [`tracking`] follows a live position along a fetched outdoor route, including
//!   the three-leg shuttle itinerary.

pub mod directions;
pub mod error;
pub mod geometry;
pub mod indoor;
pub mod prelude;
pub mod tracking;

pub use error::Error;

/// Distance in metres under which a position counts as lying on a polyline.
pub const SNAP_TOLERANCE_METERS: f64 = 15.0;
