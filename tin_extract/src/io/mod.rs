//! Surface, fence and lattice files.

mod json;
mod landxml;

pub use json::{FeatureRecord, SurfaceFile};
pub use landxml::{read_landxml_surface, write_landxml_surface};

use crate::error::Result;
use crate::model::SurfaceModel;

/// Loads a surface from a `.xml` LandXML file or a JSON surface file.
/// Raw JSON surfaces are triangulated when `triangulate` is set.
pub fn load_surface(path: &str, triangulate: bool) -> Result<SurfaceModel> {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".xml") || lower.ends_with(".landxml") {
        read_landxml_surface(path)
    } else {
        SurfaceFile::load(path)?.into_model(triangulate)
    }
}
