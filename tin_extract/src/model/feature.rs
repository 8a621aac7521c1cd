use crate::geometry::Point3;

/// Sentinel user tag for occurrences that carry no caller tag.
pub const NULL_USER_TAG: u64 = u64::MAX;
/// Sentinel feature id for occurrences that carry no feature id.
pub const NULL_FEATURE_ID: u64 = u64::MAX;

/// Every kind of occurrence the engine can deliver.
///
/// The first group are feature types that can be stored in a model's feature
/// table. The remaining variants are synthetic: they are derived from the
/// points, connectivity or an associated lattice at extraction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FeatureKind {
    GroupSpots,
    Breakline,
    SoftBreakline,
    ContourLine,
    Void,
    Island,
    Hole,
    GraphicBreak,
    Hull,
    Polygon,
    SlopeToe,
    Region,

    /// Every point of the model.
    Spots,
    /// Points that are not part of any feature.
    RandomSpots,
    /// Points that lie on at least one feature.
    FeatureSpot,
    /// Triangulated vertices.
    TinPoint,
    Triangle,
    /// Triangle vertices followed by the index triple and slope attributes.
    TriangleInfo,
    TriangleIndex,
    FlowArrow,
    TinLine,
    TinHull,
    /// Vertical skirt quads hanging from the hull down to the lowest point.
    TriangleEdge,

    LatticePoint,
    Lattice,
    LatticeEdge,
    LatticeXLine,
    LatticeYLine,

    SlopeLine,
    /// Zero point sentinel a caller can use to stop a long bulk run.
    CheckStop,
}

impl FeatureKind {
    /// Returns `true` for the kinds that may appear in a feature table.
    pub fn is_stored(self) -> bool {
        matches!(
            self,
            FeatureKind::GroupSpots
                | FeatureKind::Breakline
                | FeatureKind::SoftBreakline
                | FeatureKind::ContourLine
                | FeatureKind::Void
                | FeatureKind::Island
                | FeatureKind::Hole
                | FeatureKind::GraphicBreak
                | FeatureKind::Hull
                | FeatureKind::Polygon
                | FeatureKind::SlopeToe
                | FeatureKind::Region
        )
    }

    /// Kinds that can only be produced from a triangulated model.
    pub fn requires_tin(self) -> bool {
        matches!(
            self,
            FeatureKind::TinPoint
                | FeatureKind::Triangle
                | FeatureKind::TriangleInfo
                | FeatureKind::TriangleIndex
                | FeatureKind::FlowArrow
                | FeatureKind::TinLine
                | FeatureKind::TinHull
                | FeatureKind::TriangleEdge
        )
    }

    pub fn is_lattice(self) -> bool {
        matches!(
            self,
            FeatureKind::LatticePoint
                | FeatureKind::Lattice
                | FeatureKind::LatticeEdge
                | FeatureKind::LatticeXLine
                | FeatureKind::LatticeYLine
        )
    }

    /// Stored kinds whose point sequence describes a closed area.
    pub fn is_area(self) -> bool {
        matches!(
            self,
            FeatureKind::Void
                | FeatureKind::Island
                | FeatureKind::Hole
                | FeatureKind::Hull
                | FeatureKind::Polygon
                | FeatureKind::Region
        )
    }

    /// Parses a kebab-case name such as `tin-hull` or `random-spots`.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "group-spots" => FeatureKind::GroupSpots,
            "breakline" => FeatureKind::Breakline,
            "soft-breakline" => FeatureKind::SoftBreakline,
            "contour-line" | "contour" => FeatureKind::ContourLine,
            "void" => FeatureKind::Void,
            "island" => FeatureKind::Island,
            "hole" => FeatureKind::Hole,
            "graphic-break" => FeatureKind::GraphicBreak,
            "hull" => FeatureKind::Hull,
            "polygon" => FeatureKind::Polygon,
            "slope-toe" => FeatureKind::SlopeToe,
            "region" => FeatureKind::Region,
            "spots" => FeatureKind::Spots,
            "random-spots" => FeatureKind::RandomSpots,
            "feature-spot" => FeatureKind::FeatureSpot,
            "tin-point" => FeatureKind::TinPoint,
            "triangle" => FeatureKind::Triangle,
            "triangle-info" => FeatureKind::TriangleInfo,
            "triangle-index" => FeatureKind::TriangleIndex,
            "flow-arrow" => FeatureKind::FlowArrow,
            "tin-line" => FeatureKind::TinLine,
            "tin-hull" => FeatureKind::TinHull,
            "triangle-edge" => FeatureKind::TriangleEdge,
            "lattice-point" => FeatureKind::LatticePoint,
            "lattice" => FeatureKind::Lattice,
            "lattice-edge" => FeatureKind::LatticeEdge,
            "lattice-x-line" => FeatureKind::LatticeXLine,
            "lattice-y-line" => FeatureKind::LatticeYLine,
            "slope-line" => FeatureKind::SlopeLine,
            "check-stop" => FeatureKind::CheckStop,
            _ => return None,
        };
        Some(kind)
    }
}

/// Lifecycle state of a feature table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FeatureState {
    /// Contiguous range in the point array of an untriangulated model.
    Data,
    /// Linked into the feature chains of a triangulated model.
    Tin,
    /// Explicit list of point indices.
    OffsetsArray,
    /// Could not be linked into the triangulation; keeps its raw points.
    TinError,
    Rollback,
    Deleted,
}

impl FeatureState {
    /// Only raw and linked features are extracted.
    pub fn is_live(self) -> bool {
        matches!(self, FeatureState::Data | FeatureState::Tin)
    }
}

/// Where a feature's points live.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum FeaturePoints {
    Range { first: usize, count: usize },
    Chain { head: usize },
    Offsets(Vec<usize>),
    Stored(Vec<Point3>),
}

/// One entry of the feature table.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Feature {
    pub kind: FeatureKind,
    pub state: FeatureState,
    pub user_tag: u64,
    pub feature_id: u64,
    pub points: FeaturePoints,
}
