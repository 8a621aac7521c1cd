use log::warn;

use crate::geometry::{BoundingBox, Point3};

/// Shape of the containment test applied by a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FenceType {
    /// Axis aligned bounding rectangle of the fence points.
    Block,
    /// True polygon containment.
    Shape,
}

impl FenceType {
    /// Maps a raw selector (`1` block, `2` shape). Unknown values fall back
    /// to [`FenceType::Block`].
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FenceType::Block,
            2 => FenceType::Shape,
            other => {
                warn!("unknown fence type {other}, using block");
                FenceType::Block
            }
        }
    }
}

/// Which side of the fence an extraction keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FenceOption {
    Inside,
    Overlap,
    Outside,
}

impl FenceOption {
    /// Maps a raw selector (`1` inside, `2` overlap, `3` outside). Unknown
    /// values fall back to [`FenceOption::Overlap`].
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FenceOption::Inside,
            2 => FenceOption::Overlap,
            3 => FenceOption::Outside,
            other => {
                warn!("unknown fence option {other}, using overlap");
                FenceOption::Overlap
            }
        }
    }
}

/// Closed polygon restricting an extraction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Fence {
    pub points: Vec<Point3>,
    pub fence_type: FenceType,
    pub option: FenceOption,
}

impl Fence {
    pub fn new(points: Vec<Point3>, fence_type: FenceType, option: FenceOption) -> Self {
        Self {
            points,
            fence_type,
            option,
        }
    }

    /// Rectangular fence covering `bbox`.
    pub fn block(bbox: BoundingBox, option: FenceOption) -> Self {
        let mut points: Vec<Point3> = bbox
            .corners()
            .iter()
            .map(|c| Point3::new(c.x, c.y, 0.0))
            .collect();
        points.push(points[0]);
        Self::new(points, FenceType::Block, option)
    }

    pub fn from_line_string(
        line: &geo_types::LineString<f64>,
        fence_type: FenceType,
        option: FenceOption,
    ) -> Self {
        Self::new(
            line.coords().map(|c| Point3::from(*c)).collect(),
            fence_type,
            option,
        )
    }

    pub fn from_rect(rect: &geo_types::Rect<f64>, option: FenceOption) -> Self {
        Self::block(
            BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y),
            option,
        )
    }

    /// A usable fence has at least three points and repeats its first point
    /// at the end.
    pub fn is_valid(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) if self.points.len() >= 3 => first.same_xy(last),
            _ => false,
        }
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.points)
    }

    pub fn load(path: &str) -> std::io::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}
