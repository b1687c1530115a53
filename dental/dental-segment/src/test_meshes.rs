//! Small synthetic meshes shared by unit tests.

#![allow(
    clippy::unwrap_used,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use dental_mesh::ScanMesh;
use nalgebra::Point3;

/// Faces of an `n x n` vertex grid in row-major order, two triangles per
/// cell, counter-clockwise seen from +Z.
pub fn grid_faces(n: u32) -> Vec<[u32; 3]> {
    let mut faces = Vec::new();
    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let v = j * n + i;
            faces.push([v, v + 1, v + n + 1]);
            faces.push([v, v + n + 1, v + n]);
        }
    }
    faces
}

/// Unit-spaced flat grid in the XY plane.
pub fn flat_grid(n: u32) -> ScanMesh {
    let mut positions = Vec::new();
    for j in 0..n {
        for i in 0..n {
            positions.push(Point3::new(f64::from(i), f64::from(j), 0.0));
        }
    }
    ScanMesh::from_geometry(positions, grid_faces(n)).unwrap()
}

/// Grid in the XY plane with a Gaussian bump of the given height at its
/// center, rising along +Z.
///
/// Coordinates carry a tiny per-vertex offset that breaks exact ties
/// between mirrored vertices.
pub fn bumped_grid(n: u32, height: f64) -> ScanMesh {
    let c = f64::from(n - 1) / 2.0;
    let sigma2 = (c / 2.0).max(0.5).powi(2);
    let mut positions = Vec::new();
    for j in 0..n {
        for i in 0..n {
            let k = f64::from(j * n + i);
            let (x, y) = (f64::from(i), f64::from(j));
            let r2 = (x - c).powi(2) + (y - c).powi(2);
            positions.push(Point3::new(
                x + 1e-7 * k,
                y + 2e-7 * k,
                height * (-r2 / sigma2).exp() + 3e-7 * k,
            ));
        }
    }
    ScanMesh::from_geometry(positions, grid_faces(n)).unwrap()
}

/// Regular octahedron with unit vertices on the axes, outward facing.
pub fn octahedron() -> ScanMesh {
    let positions = vec![
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(-1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, -1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
        Point3::new(0.0, 0.0, -1.0),
    ];
    let mut faces = Vec::new();
    for (sx, px) in [(0_u32, 1.0), (1, -1.0)] {
        for (sy, py) in [(2_u32, 1.0), (3, -1.0)] {
            for (sz, pz) in [(4_u32, 1.0), (5, -1.0)] {
                if px * py * pz > 0.0 {
                    faces.push([sx, sy, sz]);
                } else {
                    faces.push([sx, sz, sy]);
                }
            }
        }
    }
    ScanMesh::from_geometry(positions, faces).unwrap()
}

/// Two cusps rising in +Y from a base sheet in the XZ plane.
///
/// The sheet spans `x` in `[0, 2 * (n - 1)]` and `z` in `[0, n - 1]`. Cusps
/// sit at a quarter and three quarters of the way along X, the second one
/// slightly taller. Returns the mesh and the indices of the two peak
/// vertices.
pub fn two_cusp_sheet(n: u32) -> (ScanMesh, [usize; 2]) {
    let w = 2 * n - 1;
    let peaks = [(f64::from(w - 1) * 0.25, 1.0), (f64::from(w - 1) * 0.75, 1.2)];
    let zc = f64::from(n - 1) / 2.0;
    let sigma2 = (f64::from(n) / 4.0).max(0.75).powi(2);

    let mut positions = Vec::new();
    for j in 0..n {
        for i in 0..w {
            let k = f64::from(j * w + i);
            let (x, z) = (f64::from(i), f64::from(j));
            let y: f64 = peaks
                .iter()
                .map(|&(px, h)| h * (-((x - px).powi(2) + (z - zc).powi(2)) / sigma2).exp())
                .sum();
            positions.push(Point3::new(x + 1e-7 * k, y + 2e-7 * k, z + 3e-7 * k));
        }
    }

    let mut faces = Vec::new();
    for j in 0..n - 1 {
        for i in 0..w - 1 {
            let v = j * w + i;
            // Counter-clockwise seen from +Y.
            faces.push([v, v + w + 1, v + 1]);
            faces.push([v, v + w, v + w + 1]);
        }
    }

    let row = (n / 2) * w;
    let peak_index = |px: f64| (row + px.round() as u32) as usize;
    let mesh = ScanMesh::from_geometry(positions, faces).unwrap();
    (mesh, [peak_index(peaks[0].0), peak_index(peaks[1].0)])
}
