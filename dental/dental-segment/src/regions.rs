//! Tooth regions from the harmonic field.
//!
//! Feature points alternate between the low (0) and high (1) ends of the
//! field, so each tooth sits in a low or high basin separated from its
//! neighbors by the mid level 0.5. Vertices are classified against a
//! neutral band around the mid level, faces whose three vertices agree are
//! grouped into edge-connected components, and every component holding a
//! feature point becomes a tooth region.

use dental_mesh::{ScanMesh, VertexIndexMap};
use hashbrown::HashMap;
use tracing::{debug, info};

use crate::error::{SegmentError, SegmentResult};
use crate::harmonic::{HarmonicField, ToothFeature};
use crate::params::RegionParams;

/// Which end of the field a vertex or region lies at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldSide {
    /// Below `0.5 - band`.
    Low,
    /// Above `0.5 + band`.
    High,
}

/// One extracted tooth.
#[derive(Debug, Clone)]
pub struct ToothRegion {
    /// Name of the feature group that claimed the region.
    pub name: String,
    /// Field side of the region.
    pub side: FieldSide,
    /// Face indices into the source mesh, ascending.
    pub faces: Vec<usize>,
    /// The region as its own mesh.
    pub mesh: ScanMesh,
    /// Source-mesh vertex indices to region vertex indices.
    pub index_map: VertexIndexMap,
}

/// Classify one field value.
#[must_use]
pub fn classify(value: f64, band: f64) -> Option<FieldSide> {
    let mid = HarmonicField::MID_VALUE;
    if value < mid - band {
        Some(FieldSide::Low)
    } else if value > mid + band {
        Some(FieldSide::High)
    } else {
        None
    }
}

/// Extract one region per feature group from a harmonic field.
///
/// Each group claims the first classified component containing one of its
/// points; a component is claimed at most once and groups that claim
/// nothing are skipped. Components smaller than `params.min_faces` are
/// ignored. Regions are returned in group order.
///
/// # Errors
///
/// Returns [`SegmentError::PreconditionViolation`] if the field length does
/// not match the mesh, or for invalid params.
pub fn extract_tooth_regions(
    mesh: &ScanMesh,
    field: &[f64],
    features: &[ToothFeature],
    params: &RegionParams,
) -> SegmentResult<Vec<ToothRegion>> {
    params.validate()?;
    if field.len() != mesh.vertex_count() {
        return Err(SegmentError::precondition(format!(
            "field has {} values for {} vertices",
            field.len(),
            mesh.vertex_count()
        )));
    }

    let vertex_side: Vec<Option<FieldSide>> = field
        .iter()
        .map(|&v| classify(v, params.band))
        .collect();
    let face_side: Vec<Option<FieldSide>> = mesh
        .faces()
        .iter()
        .map(|f| {
            let s = vertex_side[f[0] as usize]?;
            f.iter()
                .all(|&v| vertex_side[v as usize] == Some(s))
                .then_some(s)
        })
        .collect();

    let components = classified_components(mesh, &face_side);
    debug!(components = components.len(), "Classified face components");

    // Vertex to the components its classified faces belong to.
    let mut vertex_components: HashMap<usize, Vec<usize>> = HashMap::new();
    for (c, faces) in components.iter().enumerate() {
        for &f in faces {
            for &v in &mesh.faces()[f] {
                let list = vertex_components.entry(v as usize).or_default();
                if !list.contains(&c) {
                    list.push(c);
                }
            }
        }
    }

    let mut claimed = vec![false; components.len()];
    let mut regions = Vec::new();
    for group in features {
        let hit = group
            .points
            .iter()
            .filter_map(|v| vertex_components.get(v))
            .flatten()
            .copied()
            .find(|&c| !claimed[c] && components[c].len() >= params.min_faces);
        let Some(c) = hit else {
            debug!(tooth = %group.name, "No region for feature group");
            continue;
        };
        claimed[c] = true;

        let faces = components[c].clone();
        let (region_mesh, index_map) = mesh.submesh(&faces)?;
        let side = face_side[faces[0]].unwrap_or(FieldSide::Low);
        regions.push(ToothRegion {
            name: group.name.clone(),
            side,
            faces,
            mesh: region_mesh,
            index_map,
        });
    }

    info!(
        groups = features.len(),
        regions = regions.len(),
        band = params.band,
        "Extracted tooth regions"
    );
    Ok(regions)
}

/// Edge-connected components of faces sharing the same side.
fn classified_components(mesh: &ScanMesh, face_side: &[Option<FieldSide>]) -> Vec<Vec<usize>> {
    let mut edge_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
    for (f, face) in mesh.faces().iter().enumerate() {
        if face_side[f].is_none() {
            continue;
        }
        for i in 0..3 {
            let (a, b) = (face[i], face[(i + 1) % 3]);
            let edge = if a < b { (a, b) } else { (b, a) };
            edge_faces.entry(edge).or_default().push(f);
        }
    }

    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); face_side.len()];
    for faces in edge_faces.values() {
        for (k, &f) in faces.iter().enumerate() {
            for &g in &faces[k + 1..] {
                if face_side[f] == face_side[g] {
                    neighbors[f].push(g);
                    neighbors[g].push(f);
                }
            }
        }
    }

    let mut visited = vec![false; face_side.len()];
    let mut components = Vec::new();
    for start in 0..face_side.len() {
        if visited[start] || face_side[start].is_none() {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![start];
        visited[start] = true;
        while let Some(f) = stack.pop() {
            component.push(f);
            for &g in &neighbors[f] {
                if !visited[g] {
                    visited[g] = true;
                    stack.push(g);
                }
            }
        }
        component.sort_unstable();
        components.push(component);
    }
    components
}
