//! Indexed triangle meshes for dental scan processing.
//!
//! This crate provides the mesh data structure the segmentation pipeline
//! works on, together with the derived structures it queries:
//!
//! - **[`ScanMesh`]** - positions, normals, faces and everything derived from them
//! - **[`AdjacencyList`] / [`IncidenceList`]** - vertex neighbors and incident faces
//! - **[`SpatialIndex`]** - KD-tree nearest-neighbor and radius queries
//! - **[`VertexIndexMap`]** - old/new vertex correspondence across a mesh cut
//! - **[`Plane`]** and **[`Aabb`]** - small geometric helpers
//!
//! Derived structures are rebuilt whenever the data they depend on changes,
//! so a `ScanMesh` never answers a query with stale topology or a stale
//! spatial index.
//!
//! # Example
//!
//! ```
//! use dental_mesh::{Plane, ScanMesh};
//! use nalgebra::{Point3, Vector3};
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh = ScanMesh::from_geometry(positions, vec![[0, 1, 2], [0, 2, 3]]).unwrap();
//!
//! // Extract the second triangle; vertex 1 is not part of it.
//! let (half, map) = mesh.submesh(&[1]).unwrap();
//! assert_eq!(half.vertex_count(), 3);
//! assert_eq!(map.new_index(1), None);
//!
//! let plane = Plane::new(Point3::new(0.5, 0.0, 0.0), Vector3::x()).unwrap();
//! assert!(plane.signed_distance(&mesh.positions()[1]) > 0.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod error;
mod index_map;
mod mesh;
mod normals;
mod plane;
mod spatial;
mod topology;

pub use bounds::Aabb;
pub use error::{MeshError, MeshResult};
pub use index_map::VertexIndexMap;
pub use mesh::ScanMesh;
pub use normals::compute_vertex_normals;
pub use plane::Plane;
pub use spatial::SpatialIndex;
pub use topology::{AdjacencyList, IncidenceList};

pub use nalgebra::{Matrix3, Point3, Vector3};
