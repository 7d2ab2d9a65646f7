#[cfg(test)]
mod tests;

use std::collections::HashMap;
use glam::{DMat3, DVec3, Vec3};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Result;
use crate::ftree::{FTree, NodeId};
use crate::vertex_list::{Primitive, VertexList};

/// Symmetric 4x4 quadric as its ten unique coefficients:
/// `(a², ab, ac, ad, b², bc, bd, c², cd, d²)`.
type Quadric = [f64; 10];

fn plane_quadric(n: Vec3, d: f32) -> Quadric {
    let (a, b, c, d) = (n.x as f64, n.y as f64, n.z as f64, d as f64);
    [a * a, a * b, a * c, a * d, b * b, b * c, b * d, c * c, c * d, d * d]
}

fn quadric_add(q: &mut Quadric, r: &Quadric) {
    for (qi, ri) in q.iter_mut().zip(r) {
        *qi += ri;
    }
}

fn quadric_eval(q: &Quadric, v: DVec3) -> f64 {
    let (x, y, z) = (v.x, v.y, v.z);
    q[0] * x * x
        + 2.0 * q[1] * x * y
        + 2.0 * q[2] * x * z
        + 2.0 * q[3] * x
        + q[4] * y * y
        + 2.0 * q[5] * y * z
        + 2.0 * q[6] * y
        + q[7] * z * z
        + 2.0 * q[8] * z
        + q[9]
}

/// Optimal contraction target for a summed quadric: the stationary point
/// of the quadratic form, or the best of the endpoints and midpoint when
/// the system is singular.
fn solve_target(q: &Quadric, pa: Vec3, pb: Vec3) -> (Vec3, f64) {
    let m = DMat3::from_cols(
        DVec3::new(q[0], q[1], q[2]),
        DVec3::new(q[1], q[4], q[5]),
        DVec3::new(q[2], q[5], q[7]),
    );
    let rhs = -DVec3::new(q[3], q[6], q[8]);
    let det = m.determinant();
    if det.abs() > 1e-12 {
        let v = m.inverse() * rhs;
        if v.is_finite() {
            return (v.as_vec3(), quadric_eval(q, v));
        }
    }
    [pa, pb, (pa + pb) * 0.5]
        .into_iter()
        .map(|p| (p, quadric_eval(q, p.as_dvec3())))
        .min_by(|x, y| x.1.total_cmp(&y.1))
        .expect("three candidates")
}

struct SimpVert {
    pos: Vec3,
    q: Quadric,
    faces: FxHashSet<usize>,
    /// Neighbor vertex -> pair id.
    pairs: FxHashMap<usize, usize>,
}

struct SimpFace {
    v: [usize; 3],
    normal: Vec3,
    alive: bool,
}

struct SimpPair {
    a: usize,
    b: usize,
    target: Vec3,
    cost: f64,
    node: Option<NodeId>,
}

struct Simplifier {
    verts: Vec<SimpVert>,
    faces: Vec<SimpFace>,
    pairs: Vec<SimpPair>,
    tree: FTree<usize>,
    alive_faces: usize,
}

/// Quadric-error edge contraction down to at most `target_faces` faces.
///
/// With `aggregation_thresh > 0`, vertex pairs within that distance are
/// contracted too (found by a median-split BVH), which lets disconnected
/// pieces fuse. Stops early, with a warning, if every remaining pair would
/// invert a face normal.
pub fn simplify(vl: &VertexList, target_faces: usize, aggregation_thresh: f32) -> Result<VertexList> {
    vl.expect_triangles(3, "simplify")?;
    let mut s = Simplifier {
        verts: Vec::new(),
        faces: Vec::new(),
        pairs: Vec::new(),
        tree: FTree::new(),
        alive_faces: 0,
    };
    s.build(vl)?;
    if aggregation_thresh > 0.0 {
        s.aggregation_pairs(aggregation_thresh);
    }
    for pid in 0..s.pairs.len() {
        s.rekey(pid);
    }
    s.contract_until(target_faces);
    s.emit()
}

impl Simplifier {
    fn build(&mut self, vl: &VertexList) -> Result<()> {
        let mut interned: HashMap<[u8; 12], usize> = HashMap::new();
        let mut intern = |p: Vec3, verts: &mut Vec<SimpVert>| {
            let mut key = [0u8; 12];
            key[0..4].copy_from_slice(&p.x.to_ne_bytes());
            key[4..8].copy_from_slice(&p.y.to_ne_bytes());
            key[8..12].copy_from_slice(&p.z.to_ne_bytes());
            *interned.entry(key).or_insert_with(|| {
                verts.push(SimpVert {
                    pos: p,
                    q: [0.0; 10],
                    faces: FxHashSet::default(),
                    pairs: FxHashMap::default(),
                });
                verts.len() - 1
            })
        };
        for [i, j, k] in vl.triangles() {
            let a = intern(vl.pos(i), &mut self.verts);
            let b = intern(vl.pos(j), &mut self.verts);
            let c = intern(vl.pos(k), &mut self.verts);
            if a == b || b == c || c == a {
                log::warn!("simplify: skipping degenerate triangle");
                continue;
            }
            let cross = (self.verts[b].pos - self.verts[a].pos)
                .cross(self.verts[c].pos - self.verts[a].pos);
            if cross.length_squared() == 0.0 {
                log::warn!("simplify: skipping zero-area triangle");
                continue;
            }
            let normal = cross.normalize();
            let fid = self.faces.len();
            self.faces.push(SimpFace { v: canonical([a, b, c]), normal, alive: true });
            self.alive_faces += 1;
            let plane = plane_quadric(normal, -normal.dot(self.verts[a].pos));
            for v in [a, b, c] {
                quadric_add(&mut self.verts[v].q, &plane);
                self.verts[v].faces.insert(fid);
            }
            for (u, w) in [(a, b), (b, c), (c, a)] {
                self.ensure_pair(u, w);
            }
        }
        Ok(())
    }

    fn ensure_pair(&mut self, a: usize, b: usize) {
        if self.verts[a].pairs.contains_key(&b) {
            return;
        }
        let pid = self.pairs.len();
        self.pairs.push(SimpPair { a, b, target: Vec3::ZERO, cost: 0.0, node: None });
        self.verts[a].pairs.insert(b, pid);
        self.verts[b].pairs.insert(a, pid);
    }

    /// All unordered vertex pairs within `thresh`, via a median-split BVH
    /// (split the widest axis until the range fits or fewer than 4 points
    /// remain).
    fn aggregation_pairs(&mut self, thresh: f32) {
        let mut indices: Vec<usize> = (0..self.verts.len()).collect();
        let positions: Vec<Vec3> = self.verts.iter().map(|v| v.pos).collect();
        let bvh = build_bvh(&positions, &mut indices, thresh);
        let mut found = Vec::new();
        pairs_within(&positions, &bvh, thresh, &mut found);
        for (a, b) in found {
            self.ensure_pair(a, b);
        }
    }

    fn rekey(&mut self, pid: usize) {
        if let Some(node) = self.pairs[pid].node.take() {
            self.tree.remove(node);
        }
        let (a, b) = (self.pairs[pid].a, self.pairs[pid].b);
        let mut q = self.verts[a].q;
        quadric_add(&mut q, &self.verts[b].q);
        let (target, cost) = solve_target(&q, self.verts[a].pos, self.verts[b].pos);
        self.pairs[pid].target = target;
        self.pairs[pid].cost = cost;
        let node = {
            let Simplifier { tree, pairs, .. } = self;
            let pairs: &[SimpPair] = pairs;
            tree.insert(pid, |&p| pairs[p].cost as f32)
        };
        self.pairs[pid].node = Some(node);
    }

    fn poison(&mut self, pid: usize) {
        if let Some(node) = self.pairs[pid].node.take() {
            self.tree.remove(node);
        }
        self.pairs[pid].cost = f64::INFINITY;
        let node = {
            let Simplifier { tree, pairs, .. } = self;
            let pairs: &[SimpPair] = pairs;
            tree.insert(pid, |&p| pairs[p].cost as f32)
        };
        self.pairs[pid].node = Some(node);
    }

    fn drop_pair(&mut self, pid: usize) {
        if let Some(node) = self.pairs[pid].node.take() {
            self.tree.remove(node);
        }
        let (a, b) = (self.pairs[pid].a, self.pairs[pid].b);
        self.verts[a].pairs.remove(&b);
        self.verts[b].pairs.remove(&a);
    }

    /// Would moving `v` to `target` flip any surviving face around `v`?
    fn flips(&self, v: usize, other: usize, target: Vec3) -> bool {
        for &f in &self.verts[v].faces {
            let face = &self.faces[f];
            if !face.alive || face.v.contains(&other) {
                continue;
            }
            let p = face.v.map(|i| if i == v { target } else { self.verts[i].pos });
            let cross = (p[1] - p[0]).cross(p[2] - p[0]);
            if cross.length_squared() == 0.0 || cross.dot(face.normal) < 0.0 {
                return true;
            }
        }
        false
    }

    fn contract_until(&mut self, target_faces: usize) {
        while self.alive_faces > target_faces {
            let Some(first) = self.tree.first() else { break };
            let pid = *self.tree.get(first);
            if self.pairs[pid].cost.is_infinite() {
                log::warn!(
                    "simplify: no legal contraction remains at {} faces (target {})",
                    self.alive_faces,
                    target_faces
                );
                break;
            }
            let (a, b, target) = {
                let p = &self.pairs[pid];
                (p.a, p.b, p.target)
            };
            if self.flips(a, b, target) || self.flips(b, a, target) {
                self.poison(pid);
                continue;
            }
            self.contract(pid, a, b, target);
        }
    }

    fn contract(&mut self, pid: usize, a: usize, b: usize, target: Vec3) {
        self.drop_pair(pid);
        let qb = self.verts[b].q;
        quadric_add(&mut self.verts[a].q, &qb);
        self.verts[a].pos = target;

        // Faces spanning the contracted pair disappear; faces holding only
        // `b` are redirected to `a`.
        let b_faces: Vec<usize> = self.verts[b].faces.drain().collect();
        for f in b_faces {
            if !self.faces[f].alive {
                continue;
            }
            if self.faces[f].v.contains(&a) {
                self.faces[f].alive = false;
                self.alive_faces -= 1;
                for v in self.faces[f].v {
                    if v != b {
                        self.verts[v].faces.remove(&f);
                    }
                }
            } else {
                let moved = self.faces[f].v.map(|v| if v == b { a } else { v });
                self.faces[f].v = canonical(moved);
                self.verts[a].faces.insert(f);
            }
        }
        // Normals of everything around the moved vertex refresh so the
        // inversion guard keeps comparing against current geometry.
        for &f in &self.verts[a].faces {
            let face = &self.faces[f];
            if !face.alive {
                continue;
            }
            let p = face.v.map(|i| self.verts[i].pos);
            let cross = (p[1] - p[0]).cross(p[2] - p[0]);
            if cross.length_squared() > 0.0 {
                let id = f;
                let n = cross.normalize();
                self.faces[id].normal = n;
            }
        }

        // Rewrite (b, x) pairs into (a, x), dropping duplicates.
        let b_pairs: Vec<(usize, usize)> = self.verts[b].pairs.drain().collect();
        for (x, pid2) in b_pairs {
            self.verts[x].pairs.remove(&b);
            if x == a || self.verts[a].pairs.contains_key(&x) {
                if let Some(node) = self.pairs[pid2].node.take() {
                    self.tree.remove(node);
                }
                continue;
            }
            self.pairs[pid2].a = a;
            self.pairs[pid2].b = x;
            self.verts[a].pairs.insert(x, pid2);
            self.verts[x].pairs.insert(a, pid2);
        }
        let rekey: Vec<usize> = self.verts[a].pairs.values().copied().collect();
        for pid2 in rekey {
            self.rekey(pid2);
        }
    }

    fn emit(&self) -> Result<VertexList> {
        let mut out = VertexList::new(3, Primitive::Triangles)?;
        for face in &self.faces {
            if !face.alive {
                continue;
            }
            for v in face.v {
                out.add_point(self.verts[v].pos)?;
            }
        }
        Ok(out)
    }
}

/// Rotate a triple so the smallest index leads, preserving orientation.
fn canonical(v: [usize; 3]) -> [usize; 3] {
    let lead = (0..3).min_by_key(|&i| v[i]).expect("three entries");
    [v[lead], v[(lead + 1) % 3], v[(lead + 2) % 3]]
}

enum Bvh {
    Leaf { pts: Vec<usize> },
    Split { min: Vec3, max: Vec3, children: Box<[Bvh; 2]> },
}

fn bounds(positions: &[Vec3], indices: &[usize]) -> (Vec3, Vec3) {
    let mut min = Vec3::INFINITY;
    let mut max = Vec3::NEG_INFINITY;
    for &i in indices {
        min = min.min(positions[i]);
        max = max.max(positions[i]);
    }
    (min, max)
}

fn build_bvh(positions: &[Vec3], indices: &mut [usize], thresh: f32) -> Bvh {
    let (min, max) = bounds(positions, indices);
    let extent = max - min;
    let range = extent.max_element();
    if indices.len() < 4 || range <= thresh {
        return Bvh::Leaf { pts: indices.to_vec() };
    }
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };
    let mid = indices.len() / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| {
        positions[a][axis].total_cmp(&positions[b][axis])
    });
    let (lo, hi) = indices.split_at_mut(mid);
    let children = Box::new([
        build_bvh(positions, lo, thresh),
        build_bvh(positions, hi, thresh),
    ]);
    Bvh::Split { min, max, children }
}

fn bvh_bounds(positions: &[Vec3], bvh: &Bvh) -> (Vec3, Vec3) {
    match bvh {
        Bvh::Leaf { pts } => bounds(positions, pts),
        Bvh::Split { min, max, .. } => (*min, *max),
    }
}

fn box_gap(a: (Vec3, Vec3), b: (Vec3, Vec3)) -> f32 {
    let gap = (b.0 - a.1).max(a.0 - b.1).max(Vec3::ZERO);
    gap.length()
}

fn pairs_within(positions: &[Vec3], bvh: &Bvh, thresh: f32, out: &mut Vec<(usize, usize)>) {
    match bvh {
        Bvh::Leaf { pts } => {
            for (i, &a) in pts.iter().enumerate() {
                for &b in &pts[i + 1..] {
                    if positions[a].distance(positions[b]) <= thresh {
                        out.push((a.min(b), a.max(b)));
                    }
                }
            }
        }
        Bvh::Split { children, .. } => {
            pairs_within(positions, &children[0], thresh, out);
            pairs_within(positions, &children[1], thresh, out);
            pairs_between(positions, &children[0], &children[1], thresh, out);
        }
    }
}

fn pairs_between(positions: &[Vec3], x: &Bvh, y: &Bvh, thresh: f32, out: &mut Vec<(usize, usize)>) {
    if box_gap(bvh_bounds(positions, x), bvh_bounds(positions, y)) > thresh {
        return;
    }
    match (x, y) {
        (Bvh::Leaf { pts: px }, Bvh::Leaf { pts: py }) => {
            for &a in px {
                for &b in py {
                    if a != b && positions[a].distance(positions[b]) <= thresh {
                        out.push((a.min(b), a.max(b)));
                    }
                }
            }
        }
        (Bvh::Split { children, .. }, _) => {
            pairs_between(positions, &children[0], y, thresh, out);
            pairs_between(positions, &children[1], y, thresh, out);
        }
        (_, Bvh::Split { children, .. }) => {
            pairs_between(positions, x, &children[0], thresh, out);
            pairs_between(positions, x, &children[1], thresh, out);
        }
    }
}
