
use std::collections::HashMap;
use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::queue::UniqueQueue;
use crate::triangulate::triangulate_2d;
use crate::vertex_list::{Primitive, VertexList};

/// One side of the cut while it is being assembled: the kept triangles,
/// the growing cap outline in the cut plane's 2D basis, the registry
/// mapping cap points back to 3D, and the XOR set of triangle edges lying
/// in the plane.
struct SideShape {
    vl: VertexList,
    outline: VertexList,
    plane_pts: HashMap<[u8; 8], Vec3>,
    on_edges: FxHashMap<(u32, u32), ()>,
}

impl SideShape {
    fn new() -> Result<Self> {
        Ok(SideShape {
            vl: VertexList::new(3, Primitive::Triangles)?,
            outline: VertexList::new(2, Primitive::Lines)?,
            plane_pts: HashMap::new(),
            on_edges: FxHashMap::default(),
        })
    }

    fn add_tri(&mut self, a: Vec3, b: Vec3, c: Vec3) -> Result<()> {
        self.vl.add_point(a)?;
        self.vl.add_point(b)?;
        self.vl.add_point(c)?;
        Ok(())
    }

    fn toggle_on_edge(&mut self, i: u32, j: u32) {
        let key = (i.min(j), i.max(j));
        if self.on_edges.remove(&key).is_none() {
            self.on_edges.insert(key, ());
        }
    }

    fn outline_segment(&mut self, a: (Vec3, Vec2), b: (Vec3, Vec2)) -> Result<()> {
        for (p3, p2) in [a, b] {
            let mut key = [0u8; 8];
            key[0..4].copy_from_slice(&p2.x.to_ne_bytes());
            key[4..8].copy_from_slice(&p2.y.to_ne_bytes());
            self.plane_pts.insert(key, p3);
            self.outline.add_point2(p2)?;
        }
        Ok(())
    }

    fn lookup(&self, p2: Vec2) -> Result<Vec3> {
        let mut key = [0u8; 8];
        key[0..4].copy_from_slice(&p2.x.to_ne_bytes());
        key[4..8].copy_from_slice(&p2.y.to_ne_bytes());
        self.plane_pts
            .get(&key)
            .copied()
            .ok_or_else(|| Error::Internal("cap point lost its 3D origin".into()))
    }
}

/// Split a closed triangle mesh by the plane `normal · x = d`, close both
/// caps, and return the connected components of each side, the negative
/// side's components first.
///
/// The cap triangulation failing fails the whole cut; nothing partial is
/// returned.
pub fn plane_cut(vl: &VertexList, normal: Vec3, d: f32) -> Result<Vec<VertexList>> {
    vl.expect_triangles(3, "plane_cut")?;
    if normal.length_squared() == 0.0 {
        return Err(Error::InputInvalid("plane_cut normal must be nonzero".into()));
    }
    let n = normal.normalize();
    let x_axis = n.any_orthonormal_vector();
    let y_axis = n.cross(x_axis);
    let proj = |p: Vec3| Vec2::new(p.dot(x_axis), p.dot(y_axis));

    // Signed distances per vertex, snapped to the plane within tolerance.
    let dists: Vec<f32> = (0..vl.vert_count())
        .map(|i| {
            let p = vl.pos(i);
            let dist = p.dot(n) - d;
            if dist.abs() < 1e-5 * p.length().max(d.abs()) { 0.0 } else { dist }
        })
        .collect();

    // Each crossing edge is intersected once so both sides splice in the
    // bit-identical point.
    let mut crossings: FxHashMap<(u32, u32), Vec3> = FxHashMap::default();
    for [a, b, c] in vl.triangles() {
        for (i, j) in [(a, b), (b, c), (c, a)] {
            let (di, dj) = (dists[i as usize], dists[j as usize]);
            if di * dj < 0.0 {
                let key = (i.min(j), i.max(j));
                crossings.entry(key).or_insert_with(|| {
                    let (pi, pj) = (vl.pos(i), vl.pos(j));
                    let t = -di / (dj - di);
                    pi + t * (pj - pi)
                });
            }
        }
    }

    let mut sides = [SideShape::new()?, SideShape::new()?];
    let side_of = |dist: f32| usize::from(dist > 0.0);

    for tri in vl.triangles() {
        let d3 = tri.map(|i| dists[i as usize]);
        let crossing_count =
            (0..3).filter(|&e| d3[e] * d3[(e + 1) % 3] < 0.0).count();
        let zeros = d3.iter().filter(|&&x| x == 0.0).count();
        match (crossing_count, zeros) {
            (0, 3) => {} // degenerate planar triangle
            (0, 2) => {
                let lone = (0..3).find(|&k| d3[k] != 0.0).expect("two zeros, one not");
                let shape = &mut sides[side_of(d3[lone])];
                shape.add_tri(vl.pos(tri[0]), vl.pos(tri[1]), vl.pos(tri[2]))?;
                let (i, j) = (tri[(lone + 1) % 3], tri[(lone + 2) % 3]);
                shape.toggle_on_edge(i, j);
            }
            (0, _) => {
                let lone = (0..3).find(|&k| d3[k] != 0.0).expect("not all on plane");
                sides[side_of(d3[lone])].add_tri(
                    vl.pos(tri[0]),
                    vl.pos(tri[1]),
                    vl.pos(tri[2]),
                )?;
            }
            (1, _) => {
                // One edge crosses, so the remaining vertex sits exactly on
                // the plane. Two triangles, one per side, meeting at the
                // intersection point.
                let zero = (0..3)
                    .find(|&k| d3[k] == 0.0)
                    .ok_or_else(|| Error::Internal("crossing without an on-plane vertex".into()))?;
                let (c, a, b) = (tri[zero], tri[(zero + 1) % 3], tri[(zero + 2) % 3]);
                let p = crossings[&(a.min(b), a.max(b))];
                let cp = vl.pos(c);
                sides[side_of(dists[a as usize])].add_tri(cp, vl.pos(a), p)?;
                sides[side_of(dists[b as usize])].add_tri(cp, p, vl.pos(b))?;
                for side in &mut sides {
                    side.outline_segment((p, proj(p)), (cp, proj(cp)))?;
                }
            }
            (2, _) => {
                // The lone vertex is the one both crossing edges share.
                let lone = (0..3)
                    .find(|&k| {
                        d3[k] * d3[(k + 1) % 3] < 0.0 && d3[k] * d3[(k + 2) % 3] < 0.0
                    })
                    .ok_or_else(|| Error::Internal("crossings without a lone vertex".into()))?;
                let (a, b, c) = (tri[lone], tri[(lone + 1) % 3], tri[(lone + 2) % 3]);
                let (ap, bp, cp) = (vl.pos(a), vl.pos(b), vl.pos(c));
                let pab = crossings[&(a.min(b), a.max(b))];
                let pca = crossings[&(c.min(a), c.max(a))];
                sides[side_of(dists[a as usize])].add_tri(ap, pab, pca)?;
                let far = &mut sides[side_of(dists[b as usize])];
                // Quad split along the shorter diagonal.
                if pab.distance_squared(cp) < bp.distance_squared(pca) {
                    far.add_tri(pab, bp, cp)?;
                    far.add_tri(pab, cp, pca)?;
                } else {
                    far.add_tri(pab, bp, pca)?;
                    far.add_tri(bp, cp, pca)?;
                }
                for side in &mut sides {
                    side.outline_segment((pab, proj(pab)), (pca, proj(pca)))?;
                }
            }
            _ => {
                return Err(Error::Internal(
                    "triangle crosses the plane three times".into(),
                ));
            }
        }
    }

    // Unpaired on-plane edges bound the cap where whole triangles touched
    // the plane.
    for s in 0..2 {
        let keys: Vec<(u32, u32)> = sides[s].on_edges.keys().copied().collect();
        for (i, j) in keys {
            let (pi, pj) = (vl.pos(i), vl.pos(j));
            sides[s].outline_segment((pi, proj(pi)), (pj, proj(pj)))?;
        }
    }

    // Close the caps. CCW triangles in the (x, y) basis face +n, outward
    // for the negative side; the positive side flips.
    for (s, side) in sides.iter_mut().enumerate() {
        if side.outline.indices().is_empty() {
            continue;
        }
        let cap = triangulate_2d(&side.outline)
            .map_err(|e| Error::Numeric(format!("cap triangulation failed: {e}")))?;
        for [i, j, k] in cap.triangles() {
            let a = side.lookup(cap.pos2(i))?;
            let b = side.lookup(cap.pos2(j))?;
            let c = side.lookup(cap.pos2(k))?;
            if s == 0 {
                side.vl.add_point(a)?;
                side.vl.add_point(b)?;
                side.vl.add_point(c)?;
            } else {
                side.vl.add_point(a)?;
                side.vl.add_point(c)?;
                side.vl.add_point(b)?;
            }
        }
    }

    let mut out = Vec::new();
    for side in &sides {
        out.extend(components(&side.vl)?);
    }
    Ok(out)
}

/// Partition a triangle list into connected components over shared edges.
fn components(vl: &VertexList) -> Result<Vec<VertexList>> {
    let tris: Vec<[u32; 3]> = vl.triangles().collect();
    let mut edge_faces: FxHashMap<(u32, u32), Vec<usize>> = FxHashMap::default();
    for (f, t) in tris.iter().enumerate() {
        for (i, j) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
            edge_faces.entry((i.min(j), i.max(j))).or_default().push(f);
        }
    }
    let mut queue = UniqueQueue::new();
    let mut out = Vec::new();
    for seed in 0..tris.len() {
        if !queue.push(seed) {
            continue; // already swept into an earlier component
        }
        let mut part = VertexList::new(3, Primitive::Triangles)?;
        while let Some(f) = queue.pop() {
            let t = tris[f];
            for v in t {
                part.add_point(vl.pos(v))?;
            }
            for (i, j) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                for &g in &edge_faces[&(i.min(j), i.max(j))] {
                    queue.push(g);
                }
            }
        }
        out.push(part);
    }
    Ok(out)
}
