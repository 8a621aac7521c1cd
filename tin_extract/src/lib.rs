//! Feature extraction from triangulated irregular network (TIN) surface
//! models.
//!
//! A [`SurfaceModel`] holds points, an optional triangulation and a feature
//! table. [`Extractor`] enumerates every occurrence of a requested
//! [`FeatureKind`] in one call and pushes point batches to a
//! [`FeatureSink`]; [`ScanContext`] produces the same sequence one
//! occurrence at a time. Both accept an optional [`Fence`] that keeps,
//! drops or clips occurrences against a polygon.

pub mod attributes;
pub mod callback;
pub mod clip;
pub mod config;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod io;
pub mod lattice;
pub mod model;
pub mod scan;
pub mod traversal;

pub use callback::{sink_fn, Collector, FeatureSink, Occurrence};
pub use clip::{Fence, FenceOption, FenceType};
pub use config::ExtractConfig;
pub use error::{ExtractError, Result};
pub use extract::{extract_lattice, extract_slope_lines, Extractor};
pub use geometry::Point3;
pub use lattice::Lattice;
pub use model::{FeatureKind, SurfaceModel, NULL_FEATURE_ID, NULL_USER_TAG};
pub use scan::{Cursor, ScanContext};
