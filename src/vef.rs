#[cfg(test)]
mod tests;

use std::collections::HashMap;
use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::queue::UniqueQueue;
use crate::vertex_list::VertexList;

struct VefVert {
    pos: Vec3,
    edges: Vec<usize>,
}

struct VefEdge {
    v: [usize; 2],
    faces: [Option<usize>; 2],
    frame: Option<EdgeFrame>,
}

struct VefFace {
    v: [usize; 3],
    edges: [usize; 3],
    normal: Vec3,
    d: f32,
    basis: Option<FaceBasis>,
}

/// Dihedral frame of an interior edge: `z` along the edge, `x` in the plane
/// of the first face perpendicular to `z`, and the dihedral angle from the
/// first face to the second about `z`, in `[0, 2π)`. A flat edge reads π.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EdgeFrame {
    pub z: Vec3,
    pub x: Vec3,
    pub ang: f32,
}

/// Orthonormal 2D basis in a face's plane plus the triangle's own 2D
/// coordinates in it: `v0` maps to the origin, `v1` to `(v1x, 0)` with
/// `v1x > 0`, and `v2` to a point with positive y.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FaceBasis {
    pub x: Vec3,
    pub y: Vec3,
    pub v1x: f32,
    pub v2: Vec2,
}

/// Topological mesh: shared vertex/edge/face pools with adjacency.
///
/// Built by inserting triangles one at a time; vertices are shared by
/// coordinate bit-identity and edges by vertex-pair identity. All
/// cross-references are dense arena indices.
pub struct Vef {
    verts: Vec<VefVert>,
    edges: Vec<VefEdge>,
    faces: Vec<VefFace>,
    vert_map: HashMap<[u8; 12], usize>,
    edge_map: FxHashMap<(usize, usize), usize>,
    pub(crate) min: Vec3,
    pub(crate) max: Vec3,
}

impl Vef {
    pub fn from_vertex_list(vl: &VertexList) -> Result<Self> {
        vl.expect_triangles(3, "Vef construction")?;
        let mut vef = Vef {
            verts: Vec::new(),
            edges: Vec::new(),
            faces: Vec::new(),
            vert_map: HashMap::new(),
            edge_map: FxHashMap::default(),
            min: Vec3::INFINITY,
            max: Vec3::NEG_INFINITY,
        };
        for [i, j, k] in vl.triangles() {
            vef.insert_face(vl.pos(i), vl.pos(j), vl.pos(k))?;
        }
        Ok(vef)
    }

    pub fn vert_count(&self) -> usize {
        self.verts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub(crate) fn vert_pos(&self, v: usize) -> Vec3 {
        self.verts[v].pos
    }

    pub(crate) fn edge_verts(&self, e: usize) -> [usize; 2] {
        self.edges[e].v
    }

    pub(crate) fn edge_faces(&self, e: usize) -> [Option<usize>; 2] {
        self.edges[e].faces
    }

    pub(crate) fn face_normal(&self, f: usize) -> Vec3 {
        self.faces[f].normal
    }

    fn insert_face(&mut self, a: Vec3, b: Vec3, c: Vec3) -> Result<()> {
        let normal = (b - a).cross(c - a);
        if normal.length_squared() == 0.0 {
            log::warn!("skipping degenerate triangle at {a:?}");
            return Ok(());
        }
        let va = self.intern_vert(a);
        let vb = self.intern_vert(b);
        let vc = self.intern_vert(c);
        if va == vb || vb == vc || vc == va {
            log::warn!("skipping triangle with coincident vertices at {a:?}");
            return Ok(());
        }
        let face = self.faces.len();
        let normal = normal.normalize();
        let edges = [
            self.intern_edge(va, vb, face)?,
            self.intern_edge(vb, vc, face)?,
            self.intern_edge(vc, va, face)?,
        ];
        self.faces.push(VefFace {
            v: [va, vb, vc],
            edges,
            normal,
            d: normal.dot(a),
            basis: None,
        });
        Ok(())
    }

    fn intern_vert(&mut self, p: Vec3) -> usize {
        let mut key = [0u8; 12];
        key[0..4].copy_from_slice(&p.x.to_ne_bytes());
        key[4..8].copy_from_slice(&p.y.to_ne_bytes());
        key[8..12].copy_from_slice(&p.z.to_ne_bytes());
        if let Some(&id) = self.vert_map.get(&key) {
            return id;
        }
        self.min = self.min.min(p);
        self.max = self.max.max(p);
        self.verts.push(VefVert { pos: p, edges: Vec::new() });
        let id = self.verts.len() - 1;
        self.vert_map.insert(key, id);
        id
    }

    fn intern_edge(&mut self, a: usize, b: usize, face: usize) -> Result<usize> {
        let key = (a.min(b), a.max(b));
        let id = if let Some(&id) = self.edge_map.get(&key) {
            id
        } else {
            let id = self.edges.len();
            self.edges.push(VefEdge { v: [a, b], faces: [None, None], frame: None });
            self.verts[a].edges.push(id);
            self.verts[b].edges.push(id);
            self.edge_map.insert(key, id);
            id
        };
        let edge = &mut self.edges[id];
        if edge.faces[0].is_none() {
            edge.faces[0] = Some(face);
        } else if edge.faces[1].is_none() {
            edge.faces[1] = Some(face);
        } else {
            return Err(Error::InputInvalid(format!(
                "edge ({a}, {b}) is incident to more than two faces"
            )));
        }
        Ok(id)
    }

    /// Dihedral frame of edge `e`. Requires both incident faces.
    pub(crate) fn edge_frame(&mut self, e: usize) -> Result<EdgeFrame> {
        if let Some(frame) = self.edges[e].frame {
            return Ok(frame);
        }
        let [v0, v1] = self.edges[e].v;
        let [f0, f1] = self.edges[e].faces;
        let (f0, f1) = match (f0, f1) {
            (Some(f0), Some(f1)) => (f0, f1),
            _ => {
                return Err(Error::InputInvalid(format!(
                    "edge {e} has a single incident face; mesh is not closed"
                )));
            }
        };
        let z = (self.verts[v1].pos - self.verts[v0].pos).normalize();
        let n0 = self.faces[f0].normal;
        let x = n0.cross(z).normalize();
        // With y = z × x = n0, the second normal's polar angle around z
        // measured from the first face's half-plane.
        let n1 = self.faces[f1].normal;
        let mut ang = (n1.dot(x)).atan2(-n1.dot(n0));
        if ang < 0.0 {
            ang += std::f32::consts::TAU;
        }
        let frame = EdgeFrame { z, x, ang };
        self.edges[e].frame = Some(frame);
        Ok(frame)
    }

    pub(crate) fn face_basis(&mut self, f: usize) -> FaceBasis {
        if let Some(basis) = self.faces[f].basis {
            return basis;
        }
        let [v0, v1, v2] = self.faces[f].v;
        let p0 = self.verts[v0].pos;
        let x = (self.verts[v1].pos - p0).normalize();
        let y = self.faces[f].normal.cross(x).normalize();
        let w1 = self.verts[v1].pos - p0;
        let w2 = self.verts[v2].pos - p0;
        let basis = FaceBasis { x, y, v1x: w1.dot(x), v2: Vec2::new(w2.dot(x), w2.dot(y)) };
        self.faces[f].basis = Some(basis);
        basis
    }

    /// Signed distance from `pt` to the closest boundary face of a convex
    /// closed mesh, positive inside. `start` seeds the search and is updated
    /// to the face realizing the result, so repeated nearby queries walk
    /// instead of flooding.
    pub fn convex_interior_dist(&mut self, pt: Vec3, start: &mut usize) -> f32 {
        let tol = 1e-6 * (self.max - self.min).length();
        let mut queue = UniqueQueue::new();
        queue.push((*start).min(self.faces.len() - 1));
        let mut best = f32::INFINITY;
        while let Some(f) = queue.pop() {
            let face = &self.faces[f];
            let d = face.d - face.normal.dot(pt);
            if d < -tol {
                *start = f;
                return d;
            }
            if d < best {
                best = d;
                *start = f;
            }
            // A face already far worse than the running minimum cannot lead
            // to the realizing face.
            if d <= best + tol {
                for &e in &face.edges {
                    for other in self.edges[e].faces.into_iter().flatten() {
                        if other != f {
                            queue.push(other);
                        }
                    }
                }
            }
        }
        best
    }

    /// Distance from `pt` along `dir` to the boundary of a convex closed
    /// mesh, walking faces from `start` (updated to the exit face).
    pub fn convex_ray_dist(&mut self, pt: Vec3, dir: Vec3, start: &mut usize) -> Result<f32> {
        let mut visited = UniqueQueue::new();
        let mut cur = (*start).min(self.faces.len() - 1);
        loop {
            if !visited.push(cur) {
                return Err(Error::Numeric("convex ray walk revisited a face".into()));
            }
            let normal = self.faces[cur].normal;
            let d = self.faces[cur].d;
            let div = dir.dot(normal);
            let basis = self.face_basis(cur);
            let flat = Vec2::new(dir.dot(basis.x), dir.dot(basis.y));
            let mut crossing = None;
            if div < -0.5 || div >= 1e-6 {
                let t = (d - pt.dot(normal)) / div;
                if t >= 0.0 {
                    let hit = pt + t * dir;
                    let p0 = self.verts[self.faces[cur].v[0]].pos;
                    let p2 = Vec2::new((hit - p0).dot(basis.x), (hit - p0).dot(basis.y));
                    let tol = 1e-5 * (basis.v1x * basis.v2.y * 0.5).abs().sqrt();
                    let (edge, outside) = edge2d_toward(p2, flat, basis.v1x, basis.v2, tol);
                    if div > 0.0 && outside < tol {
                        *start = cur;
                        return Ok(t);
                    }
                    crossing = Some(edge);
                }
            }
            // Backward or near-parallel faces carry no usable hit; step in
            // the ray's in-plane direction instead.
            let crossing = crossing.unwrap_or_else(|| walk_edge2d(flat, basis.v1x, basis.v2));
            let e = self.faces[cur].edges[crossing];
            cur = match self.edges[e].faces.into_iter().flatten().find(|&f| f != cur) {
                Some(next) => next,
                None => {
                    return Err(Error::InputInvalid(
                        "convex ray walk escaped through an open edge".into(),
                    ));
                }
            };
        }
    }
}

/// [`edge2d`] with a direction-aware tie-break: among edges the point is
/// equally far outside of, prefer the one the in-plane direction leaves
/// through. Exact ties happen whenever a hit lands on a triangle corner.
fn edge2d_toward(p: Vec2, dir: Vec2, v1x: f32, v2: Vec2, tol: f32) -> (usize, f32) {
    let corners = [Vec2::ZERO, Vec2::new(v1x, 0.0), v2];
    let mut dists = [0.0f32; 3];
    let mut max = f32::NEG_INFINITY;
    for i in 0..3 {
        let a = corners[i];
        let e = corners[(i + 1) % 3] - a;
        dists[i] = -e.perp_dot(p - a) / e.length();
        max = max.max(dists[i]);
    }
    let mut best = (0, f32::NEG_INFINITY);
    for i in 0..3 {
        if dists[i] >= max - tol {
            let e = (corners[(i + 1) % 3] - corners[i]).normalize();
            let along = Vec2::new(e.y, -e.x).dot(dir);
            if along > best.1 {
                best = (i, along);
            }
        }
    }
    (best.0, max)
}

/// Classify a 2D point against the triangle `(0,0) (v1x,0) v2` (CCW).
/// Returns the index of the furthest-out edge and its signed outward
/// distance (negative when the point is inside every edge).
pub(crate) fn edge2d(p: Vec2, v1x: f32, v2: Vec2, _tol: f32) -> (usize, f32) {
    let corners = [Vec2::ZERO, Vec2::new(v1x, 0.0), v2];
    let mut best = (0, f32::NEG_INFINITY);
    for i in 0..3 {
        let a = corners[i];
        let b = corners[(i + 1) % 3];
        let e = b - a;
        let out = -e.perp_dot(p - a) / e.length();
        if out > best.1 {
            best = (i, out);
        }
    }
    best
}

/// Which edge of the triangle the in-plane direction `dir` leaves through
/// first, ignoring position: the edge whose outward normal agrees most.
fn walk_edge2d(dir: Vec2, v1x: f32, v2: Vec2) -> usize {
    let corners = [Vec2::ZERO, Vec2::new(v1x, 0.0), v2];
    let mut best = (0, f32::NEG_INFINITY);
    for i in 0..3 {
        let e = (corners[(i + 1) % 3] - corners[i]).normalize();
        // Outward normal of a CCW edge.
        let n = Vec2::new(e.y, -e.x);
        let d = n.dot(dir);
        if d > best.1 {
            best = (i, d);
        }
    }
    best.0
}
