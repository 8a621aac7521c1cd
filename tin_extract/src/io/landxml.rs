use std::collections::HashMap;
use std::fmt::Write as _;

use log::{debug, warn};
use roxmltree::{Document, Node};

use crate::error::{ExtractError, Result};
use crate::geometry::Point3;
use crate::model::{FeatureKind, SurfaceModel, NULL_USER_TAG};
use crate::traversal;

fn numbers<T: std::str::FromStr>(node: Node<'_, '_>) -> Vec<T> {
    node.text()
        .map(|text| text.split_whitespace().filter_map(|s| s.parse().ok()).collect())
        .unwrap_or_default()
}

/// Reads the first surface of a LandXML file.
///
/// Faces reference points by their `id` attribute, falling back to the
/// 1-based position when ids are absent. Breaklines listed under
/// `<Breaklines>` are linked as breakline features.
pub fn read_landxml_surface(path: &str) -> Result<SurfaceModel> {
    let xml = std::fs::read_to_string(path)?;
    let doc = Document::parse(&xml).map_err(|e| ExtractError::Xml(e.to_string()))?;

    let mut vertices = Vec::new();
    let mut ids: HashMap<String, usize> = HashMap::new();
    if let Some(pnts) = doc.descendants().find(|n| n.has_tag_name("Pnts")) {
        for p in pnts.children().filter(|c| c.has_tag_name("P")) {
            let nums: Vec<f64> = numbers(p);
            if nums.len() >= 3 {
                if let Some(id) = p.attribute("id") {
                    ids.insert(id.to_string(), vertices.len());
                }
                vertices.push(Point3::new(nums[0], nums[1], nums[2]));
            }
        }
    }
    let lookup = |token: &str| -> Option<usize> {
        match ids.get(token) {
            Some(&i) => Some(i),
            None if ids.is_empty() => token.parse::<usize>().ok()?.checked_sub(1),
            None => None,
        }
    };

    let mut triangles = Vec::new();
    if let Some(faces) = doc.descendants().find(|n| n.has_tag_name("Faces")) {
        for f in faces.children().filter(|c| c.has_tag_name("F")) {
            // invisible faces lie outside the surface
            if f.attribute("i") == Some("1") {
                continue;
            }
            let corners: Vec<usize> = f
                .text()
                .map(|t| t.split_whitespace().filter_map(&lookup).collect())
                .unwrap_or_default();
            if corners.len() >= 3 {
                triangles.push([corners[0], corners[1], corners[2]]);
            } else {
                warn!("skipping face with unknown point references");
            }
        }
    }

    let mut model = if triangles.is_empty() {
        SurfaceModel::from_points(vertices)
    } else {
        SurfaceModel::from_triangles(vertices, &triangles)?
    };

    for (i, bl) in doc
        .descendants()
        .filter(|n| n.has_tag_name("Breakline"))
        .enumerate()
    {
        let Some(list) = bl.children().find(|c| c.has_tag_name("PntList3D")) else {
            continue;
        };
        let nums: Vec<f64> = numbers(list);
        let points: Vec<Point3> = nums
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect();
        if points.len() >= 2 {
            model.add_feature(FeatureKind::Breakline, NULL_USER_TAG, i as u64, &points)?;
        }
    }
    debug!(
        "read LandXML surface: {} points, {} triangles, {} features",
        model.num_points(),
        triangles.len(),
        model.num_features()
    );
    Ok(model)
}

/// Writes the points and unique triangles of a model as a LandXML surface.
pub fn write_landxml_surface(path: &str, model: &SurfaceModel) -> Result<()> {
    let xml = surface_xml(model)?;
    std::fs::write(path, xml)?;
    Ok(())
}

fn surface_xml(model: &SurfaceModel) -> Result<String> {
    let mut xml = String::new();
    writeln!(xml, "<?xml version=\"1.0\"?>")?;
    writeln!(xml, "<LandXML>")?;
    writeln!(xml, "  <Surfaces>")?;
    writeln!(xml, "    <Surface name=\"TIN\">")?;
    writeln!(xml, "      <Definition surfType=\"TIN\">")?;
    writeln!(xml, "        <Pnts>")?;
    for (i, v) in model.points().iter().enumerate() {
        writeln!(xml, "          <P id=\"{}\">{} {} {}</P>", i + 1, v.x, v.y, v.z)?;
    }
    writeln!(xml, "        </Pnts>")?;
    writeln!(xml, "        <Faces>")?;
    if model.is_triangulated() {
        for t in traversal::triangles(model) {
            writeln!(xml, "          <F>{} {} {}</F>", t[0] + 1, t[1] + 1, t[2] + 1)?;
        }
    }
    writeln!(xml, "        </Faces>")?;
    writeln!(xml, "      </Definition>")?;
    let breaklines: Vec<usize> = model
        .features()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind == FeatureKind::Breakline && f.state.is_live())
        .map(|(i, _)| i)
        .collect();
    if !breaklines.is_empty() {
        writeln!(xml, "      <SourceData>")?;
        writeln!(xml, "        <Breaklines>")?;
        for index in breaklines {
            let coords: Vec<String> = model
                .feature_points(index)
                .iter()
                .map(|p| format!("{} {} {}", p.x, p.y, p.z))
                .collect();
            writeln!(xml, "          <Breakline>")?;
            writeln!(xml, "            <PntList3D>{}</PntList3D>", coords.join(" "))?;
            writeln!(xml, "          </Breakline>")?;
        }
        writeln!(xml, "        </Breaklines>")?;
        writeln!(xml, "      </SourceData>")?;
    }
    writeln!(xml, "    </Surface>")?;
    writeln!(xml, "  </Surfaces>")?;
    writeln!(xml, "</LandXML>")?;
    Ok(xml)
}
