//! Parametric primitive solids. Each generator produces a point cloud and
//! takes its convex hull, so coplanar patches (cube faces, cylinder caps)
//! come back as cleanly fan-triangulated facets.


use glam::Vec3;

use crate::error::{Error, Result};
use crate::hull::convex_hull;
use crate::vertex_list::{Primitive, VertexList};

/// Axis-aligned box with the given half-extents, centered on the origin.
pub fn cube(hx: f32, hy: f32, hz: f32) -> Result<VertexList> {
    if hx <= 0.0 || hy <= 0.0 || hz <= 0.0 {
        return Err(Error::InputInvalid("cube half-extents must be positive".into()));
    }
    let mut points = VertexList::new(3, Primitive::Points)?;
    for sx in [-hx, hx] {
        for sy in [-hy, hy] {
            for sz in [-hz, hz] {
                points.add(&[sx, sy, sz])?;
            }
        }
    }
    convex_hull(&points)
}

/// Cylinder of radius `r` and height `h` about the z axis, approximated by
/// `points_per_rev` points around each rim.
pub fn cylinder(r: f32, h: f32, points_per_rev: u32) -> Result<VertexList> {
    if r <= 0.0 || h <= 0.0 {
        return Err(Error::InputInvalid("cylinder dimensions must be positive".into()));
    }
    if points_per_rev < 3 {
        return Err(Error::InputInvalid("cylinder needs at least 3 points per revolution".into()));
    }
    let mut points = VertexList::new(3, Primitive::Points)?;
    let half = h * 0.5;
    for i in 0..points_per_rev {
        let a = std::f32::consts::TAU * i as f32 / points_per_rev as f32;
        let (x, y) = (r * a.cos(), r * a.sin());
        points.add(&[x, y, -half])?;
        points.add(&[x, y, half])?;
    }
    convex_hull(&points)
}

/// Latitude/longitude sphere: `rings` latitude bands, `segs` points per
/// ring, plus the two poles.
pub fn uv_sphere(r: f32, segs: u32, rings: u32) -> Result<VertexList> {
    if r <= 0.0 {
        return Err(Error::InputInvalid("sphere radius must be positive".into()));
    }
    if segs < 3 || rings < 2 {
        return Err(Error::InputInvalid(
            "uv sphere needs at least 3 segments and 2 rings".into(),
        ));
    }
    let mut points = VertexList::new(3, Primitive::Points)?;
    points.add(&[0.0, 0.0, r])?;
    points.add(&[0.0, 0.0, -r])?;
    for i in 1..rings {
        let theta = std::f32::consts::PI * i as f32 / rings as f32;
        let (z, band) = (r * theta.cos(), r * theta.sin());
        for j in 0..segs {
            let phi = std::f32::consts::TAU * j as f32 / segs as f32;
            points.add(&[band * phi.cos(), band * phi.sin(), z])?;
        }
    }
    convex_hull(&points)
}

const ICO_FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

fn ico_verts() -> [Vec3; 12] {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ]
    .map(Vec3::normalize)
}

/// Geodesic sphere: the icosahedron with each face subdivided `subdiv`
/// times and every point pushed out to radius `r`, giving `20 * 4^subdiv`
/// triangles.
pub fn icosphere(r: f32, subdiv: u32) -> Result<VertexList> {
    if r <= 0.0 {
        return Err(Error::InputInvalid("sphere radius must be positive".into()));
    }
    if subdiv > 7 {
        return Err(Error::Capacity("icosphere subdivision above 7 is unreasonable".into()));
    }
    let verts = ico_verts();
    let n = 1u32 << subdiv;
    let mut points = VertexList::new(3, Primitive::Points)?;
    for face in ICO_FACES {
        for i in 0..=n {
            for j in 0..=(n - i) {
                let k = n - i - j;
                // Weight the corners in ascending global-vertex order so a
                // lattice point shared across faces sums in the same order
                // and lands on bit-identical coordinates.
                let mut terms = [
                    (face[0], i as f32),
                    (face[1], j as f32),
                    (face[2], k as f32),
                ];
                terms.sort_by_key(|t| t.0);
                let p: Vec3 = terms
                    .iter()
                    .fold(Vec3::ZERO, |acc, &(v, w)| acc + verts[v] * w);
                let p = p.normalize() * r;
                points.add(&[p.x, p.y, p.z])?;
            }
        }
    }
    convex_hull(&points)
}
