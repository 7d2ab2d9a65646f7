#[cfg(test)]
mod tests;

use std::collections::HashMap;
use glam::{Vec2, Vec3};
use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::ftree::{FTree, NodeId};
use crate::queue::UniqueQueue;
use crate::vertex_list::{Primitive, VertexList};

const NO_FACE: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Category {
    /// Strictly above the face plane: the face is visible from the point
    /// and will be deleted when the point joins the hull.
    Delete,
    /// Within tolerance of the face plane but beyond its boundary: the face
    /// absorbs the point by growing its ring instead of being replaced.
    Extend,
    /// Below the face plane, or above within tolerance while inside the
    /// face: the face survives as-is.
    Present,
}

#[derive(Clone, Copy, Debug)]
struct FaceVert {
    vert: u32,
    /// Face across the ring edge from this vertex to the next.
    neighbor: u32,
}

struct HullFace {
    ring: Vec<FaceVert>,
    normal: Vec3,
    d: f32,
    /// Outside points as (point, distance); slot 0 always holds the max.
    outside: Vec<(u32, f32)>,
    node: Option<NodeId>,
    alive: bool,
}

impl HullFace {
    fn push_outside(&mut self, p: u32, dist: f32) {
        self.outside.push((p, dist));
        let last = self.outside.len() - 1;
        if self.outside[last].1 > self.outside[0].1 {
            self.outside.swap(0, last);
        }
    }
}

/// A horizon ridge edge `a -> b`, directed as it appears in the visible
/// face's ring, with the surviving face on the far side.
#[derive(Clone, Copy)]
struct RidgeEdge {
    a: u32,
    b: u32,
    /// Visible face carrying the edge; `NO_FACE` during hull initialization.
    inside: u32,
    outside: u32,
}

struct Hull {
    points: Vec<Vec3>,
    faces: Vec<HullFace>,
    tree: FTree<u32>,
}

/// Convex hull of the vertex records of `vl` (first three floats of each).
///
/// Fails with [`Error::InputInvalid`] for fewer than four unique points and
/// for colinear or coplanar input. The output is a deduplicated CCW
/// triangle list; coplanar input regions come back fan-triangulated from
/// single hull facets.
pub fn convex_hull(vl: &VertexList) -> Result<VertexList> {
    if vl.floats_per_vert() < 3 {
        return Err(Error::InputInvalid(
            "convex_hull requires at least 3 floats per vertex".into(),
        ));
    }
    let mut points = Vec::new();
    let mut seen = HashMap::new();
    for i in 0..vl.vert_count() {
        let p = vl.pos(i);
        let mut key = [0u8; 12];
        key[0..4].copy_from_slice(&p.x.to_ne_bytes());
        key[4..8].copy_from_slice(&p.y.to_ne_bytes());
        key[8..12].copy_from_slice(&p.z.to_ne_bytes());
        seen.entry(key).or_insert_with(|| points.push(p));
    }
    if points.len() < 4 {
        return Err(Error::InputInvalid(format!(
            "convex hull needs at least 4 unique points, got {}",
            points.len()
        )));
    }
    if points.len() > (u32::MAX - 1) as usize {
        return Err(Error::Capacity("too many points for u32 indexing".into()));
    }

    let mut hull = Hull { points, faces: Vec::new(), tree: FTree::new() };
    hull.init()?;
    hull.run()?;
    hull.emit()
}

impl Hull {
    fn init(&mut self) -> Result<()> {
        let pmin = (0..self.points.len())
            .min_by(|&a, &b| self.points[a].x.total_cmp(&self.points[b].x))
            .unwrap() as u32;
        let pmax = (0..self.points.len())
            .max_by(|&a, &b| self.points[a].x.total_cmp(&self.points[b].x))
            .unwrap() as u32;
        if pmin == pmax {
            return Err(Error::InputInvalid("convex hull of coincident points".into()));
        }
        let (a, b) = (self.points[pmin as usize], self.points[pmax as usize]);
        let p3 = (0..self.points.len() as u32)
            .filter(|&i| i != pmin && i != pmax)
            .max_by(|&i, &j| {
                let di = self.points[i as usize].distance(a) + self.points[i as usize].distance(b);
                let dj = self.points[j as usize].distance(a) + self.points[j as usize].distance(b);
                di.total_cmp(&dj)
            })
            .unwrap();
        let c = self.points[p3 as usize];
        let cross = (b - a).cross(c - a);
        if cross.length_squared() == 0.0 || !cross.is_finite() {
            return Err(Error::InputInvalid("convex hull of colinear points".into()));
        }
        let normal = cross.normalize();
        self.faces.push(HullFace {
            ring: [pmin, pmax, p3]
                .map(|vert| FaceVert { vert, neighbor: NO_FACE })
                .to_vec(),
            normal,
            d: normal.dot(a),
            outside: Vec::new(),
            node: None,
            alive: true,
        });

        let mut above = Vec::new();
        let mut below = Vec::new();
        let mut pool = Vec::new();
        for i in 0..self.points.len() as u32 {
            if i == pmin || i == pmax || i == p3 {
                continue;
            }
            let (cat, dist) = self.categorize(0, self.points[i as usize]);
            match cat {
                Category::Delete => above.push((i, dist)),
                Category::Present => below.push((i, dist)),
                Category::Extend => pool.push(i),
            }
        }
        if below.len() > above.len() {
            // Keep the populated side below: swap the triangle's winding.
            let face = &mut self.faces[0];
            face.ring.swap(1, 2);
            face.normal = -face.normal;
            face.d = -face.d;
            std::mem::swap(&mut above, &mut below);
            for side in [&mut above, &mut below] {
                for entry in side.iter_mut() {
                    entry.1 = -entry.1;
                }
            }
        }
        let apex = below
            .iter()
            .copied()
            .min_by(|x, y| x.1.total_cmp(&y.1))
            .ok_or_else(|| Error::InputInvalid("convex hull of coplanar points".into()))?;
        let area = (b - a).cross(c - a).length() * 0.5;
        if apex.1.abs() < 1e-5 * area.sqrt() {
            return Err(Error::InputInvalid("convex hull of coplanar points".into()));
        }

        for (i, dist) in above {
            self.faces[0].push_outside(i, dist);
        }
        pool.extend(below.iter().map(|&(i, _)| i).filter(|&i| i != apex.0));

        // Close the back of the hull: the triangle's reversed boundary is a
        // ridge, the furthest below point the apex. f0 survives as the
        // "outside" of every ridge edge.
        let ring: Vec<u32> = self.faces[0].ring.iter().map(|fv| fv.vert).collect();
        let ridge = vec![
            RidgeEdge { a: ring[1], b: ring[0], inside: NO_FACE, outside: 0 },
            RidgeEdge { a: ring[0], b: ring[2], inside: NO_FACE, outside: 0 },
            RidgeEdge { a: ring[2], b: ring[1], inside: NO_FACE, outside: 0 },
        ];
        let mut cats = FxHashMap::default();
        cats.insert(0u32, Category::Present);
        self.rebuild(apex.0, ridge, &cats, pool)?;
        self.refresh_tree_key(0);
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        while let Some(top) = self.tree.last() {
            let f = *self.tree.get(top);
            let p = self.faces[f as usize].outside[0].0;
            match self.find_delete_seed(f, p) {
                Some(seed) => self.add_point(p, seed)?,
                None => {
                    // Numerical tie: no face sees the point any more.
                    // Demote it and move on to the next candidate.
                    log::debug!("demoting hull point {p} with no visible face");
                    let face = &mut self.faces[f as usize];
                    face.outside.swap_remove(0);
                    if let Some((at, _)) = face
                        .outside
                        .iter()
                        .enumerate()
                        .max_by(|x, y| x.1.1.total_cmp(&y.1.1))
                    {
                        face.outside.swap(0, at);
                    }
                    self.refresh_tree_key(f);
                }
            }
        }
        Ok(())
    }

    fn emit(&self) -> Result<VertexList> {
        let mut out = VertexList::new(3, Primitive::Triangles)?;
        for face in self.faces.iter().filter(|f| f.alive) {
            for (b, c) in face.ring[1..].iter().tuple_windows() {
                for fv in [face.ring[0], *b, *c] {
                    out.add_point(self.points[fv.vert as usize])?;
                }
            }
        }
        out.finalize();
        Ok(out)
    }

    /// Classify `p` against face `f`: signed plane distance plus how far
    /// outside the face's in-plane extent it falls.
    fn categorize(&self, f: u32, p: Vec3) -> (Category, f32) {
        let face = &self.faces[f as usize];
        let dist = face.normal.dot(p) - face.d;
        let origin = self.points[face.ring[0].vert as usize];
        let x = (self.points[face.ring[1].vert as usize] - origin).normalize();
        let y = face.normal.cross(x).normalize();
        let flat: Vec<Vec2> = face
            .ring
            .iter()
            .map(|fv| {
                let w = self.points[fv.vert as usize] - origin;
                Vec2::new(w.dot(x), w.dot(y))
            })
            .collect();
        let p2 = Vec2::new((p - origin).dot(x), (p - origin).dot(y));
        let mut max = f32::NEG_INFINITY;
        let mut area = 0.0;
        for i in 0..flat.len() {
            let a = flat[i];
            let b = flat[(i + 1) % flat.len()];
            let e = b - a;
            max = max.max(-e.perp_dot(p2 - a) / e.length());
            area += a.perp_dot(b);
        }
        let tol = 1e-5 * (area.abs() * 0.5).sqrt();
        let cat = if max > 0.0 {
            if dist.abs() < tol || dist.abs() < 1e-5 * max {
                Category::Extend
            } else if dist > 0.0 {
                Category::Delete
            } else {
                Category::Present
            }
        } else if dist > tol {
            Category::Delete
        } else if (dist + tol) * (dist + tol) + max * max < 4.0 * tol * tol {
            Category::Extend
        } else {
            Category::Present
        };
        (cat, dist)
    }

    fn find_delete_seed(&self, f: u32, p: u32) -> Option<u32> {
        let pos = self.points[p as usize];
        if self.categorize(f, pos).0 == Category::Delete {
            return Some(f);
        }
        self.faces[f as usize]
            .ring
            .iter()
            .map(|fv| fv.neighbor)
            .find(|&g| g != NO_FACE && self.categorize(g, pos).0 == Category::Delete)
    }

    /// Incorporate point `p`, flooding the visible region from `seed`.
    fn add_point(&mut self, p: u32, seed: u32) -> Result<()> {
        let pos = self.points[p as usize];

        // Flood the visible region: Delete and Extend faces propagate,
        // Present faces become the horizon.
        let mut cats: FxHashMap<u32, Category> = FxHashMap::default();
        let mut queue = UniqueQueue::new();
        queue.push(seed);
        let mut visible = Vec::new();
        while let Some(f) = queue.pop() {
            let (cat, _) = self.categorize(f, pos);
            cats.insert(f, cat);
            if cat == Category::Delete || cat == Category::Extend {
                visible.push(f);
                for fv in &self.faces[f as usize].ring {
                    if fv.neighbor != NO_FACE {
                        queue.push(fv.neighbor);
                    }
                }
            }
        }

        // Trace the closed horizon ridge.
        let mut ridge = Vec::new();
        for &f in &visible {
            let ring = &self.faces[f as usize].ring;
            for i in 0..ring.len() {
                let g = ring[i].neighbor;
                if cats.get(&g).copied().unwrap_or(Category::Present) == Category::Present {
                    ridge.push(RidgeEdge {
                        a: ring[i].vert,
                        b: ring[(i + 1) % ring.len()].vert,
                        inside: f,
                        outside: g,
                    });
                }
            }
        }
        let ridge = order_ridge(ridge)?;

        let pool: Vec<u32> = visible
            .iter()
            .flat_map(|&f| self.faces[f as usize].outside.iter().map(|&(i, _)| i))
            .filter(|&i| i != p)
            .collect();
        self.rebuild(p, ridge, &cats, pool)?;
        Ok(())
    }

    /// Replace the visible region with faces around `apex`: new triangles
    /// along Delete horizon segments, ring surgery on Extend faces, then
    /// neighbor stitching and outside-point reassignment.
    fn rebuild(
        &mut self,
        apex: u32,
        ridge: Vec<RidgeEdge>,
        cats: &FxHashMap<u32, Category>,
        pool: Vec<u32>,
    ) -> Result<()> {
        let is_delete =
            |f: u32| f != NO_FACE && cats.get(&f).copied() == Some(Category::Delete);
        let extend_faces: Vec<u32> = {
            let mut seen = Vec::new();
            for r in &ridge {
                if r.inside != NO_FACE
                    && cats.get(&r.inside).copied() == Some(Category::Extend)
                    && !seen.contains(&r.inside)
                {
                    seen.push(r.inside);
                }
            }
            // Extend faces with no horizon edge of their own still need
            // surgery; pick them up from the category map.
            for (&f, &c) in cats {
                if c == Category::Extend && !seen.contains(&f) {
                    seen.push(f);
                }
            }
            seen
        };

        // New triangles along ridge edges whose inside face goes away.
        let mut touched = Vec::new();
        for r in &ridge {
            if r.inside == NO_FACE || is_delete(r.inside) {
                let normal_raw = (self.points[r.a as usize] - self.points[apex as usize])
                    .cross(self.points[r.b as usize] - self.points[apex as usize]);
                if normal_raw.length_squared() == 0.0 {
                    return Err(Error::Numeric("degenerate hull face".into()));
                }
                let normal = normal_raw.normalize();
                let id = self.faces.len() as u32;
                self.faces.push(HullFace {
                    ring: vec![
                        FaceVert { vert: apex, neighbor: NO_FACE },
                        FaceVert { vert: r.a, neighbor: r.outside },
                        FaceVert { vert: r.b, neighbor: NO_FACE },
                    ],
                    normal,
                    d: normal.dot(self.points[apex as usize]),
                    outside: Vec::new(),
                    node: None,
                    alive: true,
                });
                // The far side's pointer back across this ridge edge.
                let out_ring = &mut self.faces[r.outside as usize].ring;
                let len = out_ring.len();
                let at = (0..len)
                    .find(|&i| out_ring[i].vert == r.b && out_ring[(i + 1) % len].vert == r.a)
                    .ok_or_else(|| Error::Internal("horizon edge missing from far face".into()))?;
                out_ring[at].neighbor = id;
                touched.push(id);
            }
        }

        // Extend-face ring surgery: drop vertices whose both ring edges
        // bordered deleted faces, then splice the apex into the seam.
        for &f in &extend_faces {
            let ring = self.faces[f as usize].ring.clone();
            let len = ring.len();
            let delete_edge: Vec<bool> = ring.iter().map(|fv| is_delete(fv.neighbor)).collect();
            let keep: Vec<bool> = (0..len)
                .map(|i| !(delete_edge[(i + len - 1) % len] && delete_edge[i]))
                .collect();
            if keep.iter().filter(|&&k| !k).count() == len {
                return Err(Error::Internal("extend face fully consumed".into()));
            }
            // The seam is the single contiguous cyclic run of dropped
            // vertices and deleted-border edges; apex replaces it.
            let mut new_ring = Vec::with_capacity(len + 1);
            let mut seam = None;
            let start = (0..len)
                .find(|&i| keep[i] && !delete_edge[(i + len - 1) % len])
                .ok_or_else(|| Error::Internal("extend face with no anchored vertex".into()))?;
            for k in 0..len {
                let i = (start + k) % len;
                if keep[i] {
                    new_ring.push(ring[i]);
                    if delete_edge[i] {
                        match seam {
                            None => seam = Some(new_ring.len()),
                            Some(at) if at == new_ring.len() => {}
                            Some(_) => {
                                return Err(Error::Internal(
                                    "extend face with a split seam".into(),
                                ));
                            }
                        }
                    }
                } else if seam != Some(new_ring.len()) {
                    return Err(Error::Internal("extend face with a split seam".into()));
                }
            }
            let seam = match seam {
                Some(at) => at,
                // No deleted border at all: a purely coplanar grow. Splice
                // at the ring edge the apex is furthest outside of.
                None => self.coplanar_seam(f, apex)? ,
            };
            self.faces[f as usize].ring = new_ring;
            self.faces[f as usize]
                .ring
                .insert(seam, FaceVert { vert: apex, neighbor: NO_FACE });
            touched.push(f);
        }

        // Stitch neighbors around the apex: the face whose ring runs
        // u -> apex -> w borders, across (apex, w), the face that has w
        // just before its own apex.
        let mut before: FxHashMap<u32, u32> = FxHashMap::default();
        let mut after: FxHashMap<u32, u32> = FxHashMap::default();
        for &f in &touched {
            let ring = &self.faces[f as usize].ring;
            let len = ring.len();
            let at = ring
                .iter()
                .position(|fv| fv.vert == apex)
                .ok_or_else(|| Error::Internal("touched face lost the apex".into()))?;
            let u = ring[(at + len - 1) % len].vert;
            let w = ring[(at + 1) % len].vert;
            if before.insert(u, f).is_some() || after.insert(w, f).is_some() {
                return Err(Error::Internal("apex fan is not a single cycle".into()));
            }
        }
        for &f in &touched {
            let ring = self.faces[f as usize].ring.clone();
            let len = ring.len();
            let at = ring.iter().position(|fv| fv.vert == apex).unwrap();
            let u = ring[(at + len - 1) % len].vert;
            let w = ring[(at + 1) % len].vert;
            let next = *before
                .get(&w)
                .ok_or_else(|| Error::Internal("apex fan is not closed".into()))?;
            let prev = *after
                .get(&u)
                .ok_or_else(|| Error::Internal("apex fan is not closed".into()))?;
            let face = &mut self.faces[f as usize];
            face.ring[at].neighbor = next;
            face.ring[(at + len - 1) % len].neighbor = prev;
        }

        // Retire deleted faces.
        for (&f, &c) in cats {
            if c == Category::Delete {
                let face = &mut self.faces[f as usize];
                face.alive = false;
                face.outside.clear();
                if let Some(node) = face.node.take() {
                    self.tree.remove(node);
                }
            }
        }
        for &f in &extend_faces {
            self.faces[f as usize].outside.clear();
        }

        // Hand every orphaned point to the face that sees it furthest.
        for i in pool {
            let pos = self.points[i as usize];
            let mut best: Option<(u32, f32)> = None;
            for &f in &touched {
                let (cat, dist) = self.categorize(f, pos);
                if cat == Category::Delete && best.is_none_or(|(_, bd)| dist > bd) {
                    best = Some((f, dist));
                }
            }
            if let Some((f, dist)) = best {
                self.faces[f as usize].push_outside(i, dist);
            }
        }
        for &f in &touched {
            self.refresh_tree_key(f);
        }
        Ok(())
    }

    /// Seam position for a coplanar grow with no deleted border: after the
    /// ring vertex starting the edge the apex is furthest outside of.
    fn coplanar_seam(&self, f: u32, apex: u32) -> Result<usize> {
        let face = &self.faces[f as usize];
        let p = self.points[apex as usize];
        let origin = self.points[face.ring[0].vert as usize];
        let x = (self.points[face.ring[1].vert as usize] - origin).normalize();
        let y = face.normal.cross(x).normalize();
        let flat: Vec<Vec2> = face
            .ring
            .iter()
            .map(|fv| {
                let w = self.points[fv.vert as usize] - origin;
                Vec2::new(w.dot(x), w.dot(y))
            })
            .collect();
        let p2 = Vec2::new((p - origin).dot(x), (p - origin).dot(y));
        (0..flat.len())
            .max_by(|&i, &j| {
                let out = |k: usize| {
                    let a = flat[k];
                    let e = flat[(k + 1) % flat.len()] - a;
                    -e.perp_dot(p2 - a) / e.length()
                };
                out(i).total_cmp(&out(j))
            })
            .map(|i| i + 1)
            .ok_or_else(|| Error::Internal("empty extend ring".into()))
    }

    fn refresh_tree_key(&mut self, f: u32) {
        let node = self.faces[f as usize].node.take();
        if let Some(node) = node {
            self.tree.remove(node);
        }
        if !self.faces[f as usize].outside.is_empty() {
            let node = {
                let Hull { tree, faces, .. } = self;
                let faces: &[HullFace] = faces;
                tree.insert(f, |&id| faces[id as usize].outside[0].1)
            };
            self.faces[f as usize].node = Some(node);
        }
    }
}

/// Order a bag of ridge edges into the single closed loop they must form.
fn order_ridge(edges: Vec<RidgeEdge>) -> Result<Vec<RidgeEdge>> {
    if edges.is_empty() {
        return Err(Error::Internal("empty horizon ridge".into()));
    }
    let mut by_start: FxHashMap<u32, RidgeEdge> = FxHashMap::default();
    for e in &edges {
        if by_start.insert(e.a, *e).is_some() {
            return Err(Error::Internal("horizon ridge branches".into()));
        }
    }
    let mut ordered = Vec::with_capacity(edges.len());
    let mut cur = edges[0];
    loop {
        ordered.push(cur);
        cur = *by_start
            .get(&cur.b)
            .ok_or_else(|| Error::Internal("horizon ridge is not closed".into()))?;
        if cur.a == edges[0].a {
            break;
        }
    }
    if ordered.len() != edges.len() {
        return Err(Error::Internal("horizon ridge is disconnected".into()));
    }
    Ok(ordered)
}
