#[cfg(test)]
mod tests;

use glam::Vec2;
use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::ftree::{FTree, NodeId};
use crate::vertex_list::{Primitive, VertexList};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// An active edge of a monotone polygon, from the vertex where the sweep
/// entered it down to its other endpoint.
#[derive(Clone, Copy, Debug)]
struct ActiveEdge {
    top: usize,
    bot: usize,
}

/// A region currently being triangulated: bounded by a left and a right
/// active edge, carrying the classic monotone reflex-chain stack. After a
/// merge the region temporarily holds the right-hand piece's stack as well
/// (the "cusp"); the next vertex landing in the region fuses or splits
/// them.
struct Mp {
    left: ActiveEdge,
    right: ActiveEdge,
    stack: Vec<(usize, Side)>,
    merge_stack: Option<Vec<(usize, Side)>>,
    node: Option<NodeId>,
}

/// One incident edge at a sweep event.
#[derive(Clone, Copy)]
enum Incident {
    /// Already part of an active MP (its other endpoint was processed).
    Top { mp: usize, side: Side },
    /// Opens downward; becomes an active edge of some MP.
    Bottom { other: usize },
}

/// Actions an event resolves into. Executed closes-first, news last, so
/// enclosure tests run against the settled tree.
#[derive(Clone, Copy)]
enum Action {
    Close(usize),
    Advance { mp: usize, side: Side, bottom: usize },
    Merge { left: usize, right: usize },
    NewSmart { bl: usize, br: usize },
}

/// Triangulate the interior of an unordered set of 2D line segments
/// forming simple polygons, possibly nested and with holes.
///
/// Segments cancel in pairs (XOR), so a boundary shared by two input
/// polygons vanishes. Output triangles have positive oriented area and
/// cover the interior exactly.
pub fn triangulate_2d(vl: &VertexList) -> Result<VertexList> {
    if vl.primitive() != Primitive::Lines || vl.floats_per_vert() != 2 {
        return Err(Error::InputInvalid(
            "triangulate_2d requires a 2-float line list".into(),
        ));
    }

    let mut ids: FxHashMap<(u32, u32), usize> = FxHashMap::default();
    let mut verts: Vec<Vec2> = Vec::new();
    let mut segments: FxHashSet<(usize, usize)> = FxHashSet::default();
    for [i, j] in vl.segments() {
        let mut intern = |p: Vec2| {
            *ids.entry((p.x.to_bits(), p.y.to_bits())).or_insert_with(|| {
                verts.push(p);
                verts.len() - 1
            })
        };
        let a = intern(vl.pos2(i));
        let b = intern(vl.pos2(j));
        if a == b {
            continue;
        }
        let key = (a.min(b), a.max(b));
        if !segments.remove(&key) {
            segments.insert(key);
        }
    }
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); verts.len()];
    for &(a, b) in &segments {
        adjacency[a].push(b);
        adjacency[b].push(a);
    }
    for (v, adj) in adjacency.iter().enumerate() {
        if adj.len() % 2 != 0 {
            return Err(Error::InputInvalid(format!(
                "odd number of edges ({}) at vertex {:?}",
                adj.len(),
                verts[v]
            )));
        }
    }

    // Sweep top to bottom, left to right within a row.
    let mut order: Vec<usize> = (0..verts.len()).collect();
    order.sort_by(|&a, &b| {
        verts[b].y.total_cmp(&verts[a].y).then(verts[a].x.total_cmp(&verts[b].x))
    });

    let processed = vec![false; verts.len()];
    let mut sweep = Sweep {
        verts,
        adjacency,
        processed,
        mps: Vec::new(),
        free: Vec::new(),
        tree: FTree::new(),
        edge_mp: FxHashMap::default(),
        tris: Vec::new(),
    };
    for &v in &order {
        if !sweep.adjacency[v].is_empty() {
            sweep.event(v)?;
        }
        sweep.processed[v] = true;
    }
    if !sweep.tree.is_empty() {
        return Err(Error::Numeric("sweep finished with open regions".into()));
    }

    let mut out = VertexList::new(2, Primitive::Triangles)?;
    for [a, b, c] in sweep.tris {
        out.add_point2(a)?;
        out.add_point2(b)?;
        out.add_point2(c)?;
    }
    Ok(out)
}

struct Sweep {
    verts: Vec<Vec2>,
    adjacency: Vec<Vec<usize>>,
    processed: Vec<bool>,
    mps: Vec<Option<Mp>>,
    free: Vec<usize>,
    tree: FTree<usize>,
    /// Which MP and side each active polygon edge currently bounds,
    /// keyed by unordered endpoint ids.
    edge_mp: FxHashMap<(usize, usize), (usize, Side)>,
    tris: Vec<[Vec2; 3]>,
}

fn mp_key(mps: &[Option<Mp>], verts: &[Vec2], id: usize, y: f32) -> f32 {
    let mp = mps[id].as_ref().expect("key of a dead region");
    edge_x_at(verts, mp.left, y)
}

/// Angle of the ray from `from` down through `to`, comparable left-to-right
/// among downward edges.
fn down_angle(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.y.atan2(d.x)
}

fn edge_x_at(verts: &[Vec2], edge: ActiveEdge, y: f32) -> f32 {
    let (top, bot) = (verts[edge.top], verts[edge.bot]);
    if top.y <= bot.y {
        return top.x.min(bot.x);
    }
    let t = ((top.y - y) / (top.y - bot.y)).clamp(0.0, 1.0);
    top.x + t * (bot.x - top.x)
}

impl Sweep {
    fn event(&mut self, v: usize) -> Result<()> {
        let pos = self.verts[v];
        let mut tops: Vec<(f32, Incident)> = Vec::new();
        let mut bottoms: Vec<(f32, Incident)> = Vec::new();
        for &w in &self.adjacency[v].clone() {
            let d = self.verts[w] - pos;
            let ang = d.y.atan2(d.x);
            if self.processed[w] {
                let key = (v.min(w), v.max(w));
                let (mp, side) = self
                    .edge_mp
                    .remove(&key)
                    .ok_or_else(|| Error::Numeric("active edge lost its region".into()))?;
                tops.push((ang, Incident::Top { mp, side }));
            } else {
                bottoms.push((ang, Incident::Bottom { other: w }));
            }
        }
        // Left-to-right is descending angle for upward edges, ascending
        // for downward ones.
        tops.sort_by(|a, b| b.0.total_cmp(&a.0));
        bottoms.sort_by(|a, b| a.0.total_cmp(&b.0));
        let tops: Vec<Incident> = tops.into_iter().map(|t| t.1).collect();
        let bottoms: Vec<Incident> = bottoms.into_iter().map(|t| t.1).collect();

        let mut actions = if tops.is_empty() {
            bottoms
                .chunks_exact(2)
                .map(|pair| match (pair[0], pair[1]) {
                    (Incident::Bottom { other: bl }, Incident::Bottom { other: br }) => {
                        Action::NewSmart { bl, br }
                    }
                    _ => unreachable!(),
                })
                .collect()
        } else {
            self.pair_actions(v, &tops, &bottoms)?
        };
        actions.sort_by_key(|a| match a {
            Action::Close(_) => 0,
            Action::Advance { .. } => 1,
            Action::Merge { .. } => 2,
            Action::NewSmart { .. } => 3,
        });
        for action in actions {
            match action {
                Action::Close(mp) => self.close(mp, v),
                Action::Advance { mp, side, bottom } => self.advance(mp, side, v, bottom),
                Action::Merge { left, right } => self.merge(left, right, v),
                Action::NewSmart { bl, br } => self.new_smart(v, bl, br)?,
            }
        }
        Ok(())
    }

    /// Pair the edges around `v` through the interior wedges between them.
    ///
    /// Walking clockwise around the vertex (tops left to right, then
    /// bottoms right to left) the wedges between consecutive edges
    /// alternate interior/exterior, and every edge borders the interior on
    /// exactly one side. A left active edge has its region clockwise-after
    /// it, a right edge clockwise-before; that anchors the alternation.
    fn pair_actions(
        &self,
        v: usize,
        tops: &[Incident],
        bottoms: &[Incident],
    ) -> Result<Vec<Action>> {
        let mut cw: Vec<Incident> = tops.to_vec();
        cw.extend(bottoms.iter().rev().copied());
        let k = cw.len();
        let mut interior0: Option<bool> = None;
        for (j, inc) in cw.iter().enumerate() {
            if let Incident::Top { side, .. } = inc {
                let wedge = match side {
                    Side::Left => j,
                    Side::Right => (j + k - 1) % k,
                };
                let implied = wedge % 2 == 0;
                match interior0 {
                    None => interior0 = Some(implied),
                    Some(prev) if prev == implied => {}
                    Some(_) => {
                        return Err(Error::Numeric(format!(
                            "inconsistent winding around vertex {:?}",
                            self.verts[v]
                        )));
                    }
                }
            }
        }
        let interior0 = interior0.expect("pair_actions requires a top edge");

        let mut actions = Vec::new();
        for w in 0..k {
            if (w % 2 == 0) != interior0 {
                continue;
            }
            let action = match (cw[w], cw[(w + 1) % k]) {
                (Incident::Top { mp: m1, side: s1 }, Incident::Top { mp: m2, side: s2 }) => {
                    if m1 == m2 {
                        Action::Close(m1)
                    } else if s1 == Side::Right && s2 == Side::Left {
                        Action::Merge { left: m1, right: m2 }
                    } else if s1 == Side::Left && s2 == Side::Right {
                        // The wrap wedge lists the right owner second.
                        Action::Merge { left: m2, right: m1 }
                    } else {
                        return Err(Error::Numeric(format!(
                            "two same-side chains meet at {:?}",
                            self.verts[v]
                        )));
                    }
                }
                (Incident::Top { mp, side }, Incident::Bottom { other })
                | (Incident::Bottom { other }, Incident::Top { mp, side }) => {
                    Action::Advance { mp, side, bottom: other }
                }
                (Incident::Bottom { other: br }, Incident::Bottom { other: bl }) => {
                    // Clockwise order lists the right-hand bottom first.
                    Action::NewSmart { bl, br }
                }
            };
            actions.push(action);
        }
        Ok(actions)
    }

    fn tree_insert(&mut self, id: usize, y: f32) -> NodeId {
        let Sweep { tree, mps, verts, .. } = self;
        let (mps, verts) = (&*mps, &*verts);
        tree.insert(id, |&i| mp_key(mps, verts, i, y))
    }

    /// The active region enclosing a fresh bottom pair at `v`, if any: the
    /// nearest region whose left edge is at or left of `v` and whose right
    /// edge is right of it. A left edge passing exactly through `v` is
    /// disambiguated by angle: only an edge falling left of the pair's own
    /// left edge can enclose it; anything else is a sibling created at
    /// this same vertex.
    fn enclosing_mp(&self, v: usize, bl: usize) -> Option<usize> {
        let (mps, verts) = (&self.mps, &self.verts);
        let pos = verts[v];
        let pair_angle = down_angle(pos, verts[bl]);
        let mut node = self.tree.last_not_above(pos.x, |&i| mp_key(mps, verts, i, pos.y));
        while let Some(id) = node {
            let mp_id = *self.tree.get(id);
            let mp = mps[mp_id].as_ref().expect("tree holds a dead region");
            let lx = edge_x_at(verts, mp.left, pos.y);
            if lx < pos.x || down_angle(verts[mp.left.top], verts[mp.left.bot]) < pair_angle {
                return (edge_x_at(verts, mp.right, pos.y) > pos.x).then_some(mp_id);
            }
            node = self.tree.prev(id);
        }
        None
    }

    fn close(&mut self, id: usize, v: usize) {
        let mp = self.mps[id].take().expect("closing a dead region");
        if let Some(right) = &mp.merge_stack {
            fan(&mut self.tris, &self.verts, v, right);
        }
        fan(&mut self.tris, &self.verts, v, &mp.stack);
        if let Some(node) = mp.node {
            self.tree.remove(node);
        }
        self.free.push(id);
    }

    fn advance(&mut self, id: usize, side: Side, v: usize, bottom: usize) {
        let mut mp = self.mps[id].take().expect("advancing a dead region");
        self.arrive(&mut mp, v, side);
        let edge = ActiveEdge { top: v, bot: bottom };
        match side {
            Side::Left => mp.left = edge,
            Side::Right => mp.right = edge,
        }
        self.edge_mp.insert((v.min(bottom), v.max(bottom)), (id, side));
        self.mps[id] = Some(mp);
    }

    fn merge(&mut self, left: usize, right: usize, v: usize) {
        let mut a = self.mps[left].take().expect("merging a dead region");
        let b = self.mps[right].take().expect("merging a dead region");
        self.arrive(&mut a, v, Side::Right);
        let mut b_stack = b.stack;
        if let Some(extra) = b.merge_stack {
            // The right region still carried a cusp of its own: its left
            // piece closes against v before the chains combine.
            fan(&mut self.tris, &self.verts, v, &b_stack);
            b_stack = extra;
        }
        push_vertex(&mut self.tris, &self.verts, &mut b_stack, v, Side::Left);
        a.merge_stack = Some(b_stack);
        a.right = b.right;
        let key = (a.right.top.min(a.right.bot), a.right.top.max(a.right.bot));
        self.edge_mp.insert(key, (left, Side::Right));
        if let Some(node) = b.node {
            self.tree.remove(node);
        }
        self.mps[left] = Some(a);
        self.free.push(right);
    }

    fn new_smart(&mut self, v: usize, bl: usize, br: usize) -> Result<()> {
        let y = self.verts[v].y;
        match self.enclosing_mp(v, bl) {
            Some(outer) => self.split(outer, v, bl, br),
            None => {
                let id = self.alloc();
                self.mps[id] = Some(Mp {
                    left: ActiveEdge { top: v, bot: bl },
                    right: ActiveEdge { top: v, bot: br },
                    stack: vec![(v, Side::Left)],
                    merge_stack: None,
                    node: None,
                });
                let node = self.tree_insert(id, y);
                self.mps[id].as_mut().expect("just placed").node = Some(node);
                self.edge_mp.insert((v.min(bl), v.max(bl)), (id, Side::Left));
                self.edge_mp.insert((v.min(br), v.max(br)), (id, Side::Right));
                Ok(())
            }
        }
    }

    /// Split `outer` at `v`: a hole top (or split vertex) divides the
    /// region in two. The implied diagonal runs down to `v` from the cusp,
    /// or from the top of the chain when no cusp is pending, and each side
    /// takes its share of the stacks.
    fn split(&mut self, outer: usize, v: usize, bl: usize, br: usize) -> Result<()> {
        let mut e = self.mps[outer].take().expect("splitting a dead region");
        let (mut left_stack, mut right_stack) = match e.merge_stack.take() {
            Some(b) => (std::mem::take(&mut e.stack), b),
            None => {
                let top = *e.stack.last().expect("region with an empty chain");
                let s = std::mem::take(&mut e.stack);
                match top.1 {
                    Side::Right => (s, vec![top]),
                    Side::Left => (vec![top], s),
                }
            }
        };
        push_vertex(&mut self.tris, &self.verts, &mut left_stack, v, Side::Right);
        push_vertex(&mut self.tris, &self.verts, &mut right_stack, v, Side::Left);

        let right_id = self.alloc();
        let outer_right = e.right;
        self.mps[right_id] = Some(Mp {
            left: ActiveEdge { top: v, bot: br },
            right: outer_right,
            stack: right_stack,
            merge_stack: None,
            node: None,
        });
        let y = self.verts[v].y;
        let node = self.tree_insert(right_id, y);
        self.mps[right_id].as_mut().expect("just placed").node = Some(node);
        let key = (outer_right.top.min(outer_right.bot), outer_right.top.max(outer_right.bot));
        self.edge_mp.insert(key, (right_id, Side::Right));
        self.edge_mp.insert((v.min(br), v.max(br)), (right_id, Side::Left));

        e.right = ActiveEdge { top: v, bot: bl };
        e.stack = left_stack;
        self.edge_mp.insert((v.min(bl), v.max(bl)), (outer, Side::Right));
        self.mps[outer] = Some(e);
        Ok(())
    }

    /// Land `v` in a region on the given side, fusing any pending cusp:
    /// the piece on the arrival side closes against the diagonal to the
    /// cusp, the other piece's chain carries on.
    fn arrive(&mut self, mp: &mut Mp, v: usize, side: Side) {
        if let Some(right_stack) = mp.merge_stack.take() {
            match side {
                Side::Left => {
                    fan(&mut self.tris, &self.verts, v, &mp.stack);
                    mp.stack = right_stack;
                }
                Side::Right => {
                    fan(&mut self.tris, &self.verts, v, &right_stack);
                }
            }
        }
        push_vertex(&mut self.tris, &self.verts, &mut mp.stack, v, side);
    }

    fn alloc(&mut self) -> usize {
        match self.free.pop() {
            Some(id) => id,
            None => {
                self.mps.push(None);
                self.mps.len() - 1
            }
        }
    }
}

/// Emit a triangle, normalizing to positive orientation and discarding
/// slivers below the mixed tolerance of the two longer edges.
fn emit(tris: &mut Vec<[Vec2; 3]>, a: Vec2, b: Vec2, c: Vec2) {
    let area2 = (b - a).perp_dot(c - a);
    let mut lens = [
        (b - a).length_squared(),
        (c - b).length_squared(),
        (a - c).length_squared(),
    ];
    lens.sort_by(f32::total_cmp);
    let tol = 1e-6 * (lens[1].sqrt() * lens[2].sqrt());
    if area2.abs() * 0.5 <= tol {
        return;
    }
    if area2 > 0.0 {
        tris.push([a, b, c]);
    } else {
        tris.push([a, c, b]);
    }
}

/// Triangulate `apex` against every consecutive pair of a finished chain.
fn fan(tris: &mut Vec<[Vec2; 3]>, verts: &[Vec2], apex: usize, stack: &[(usize, Side)]) {
    for (a, b) in stack.iter().tuple_windows() {
        emit(tris, verts[apex], verts[a.0], verts[b.0]);
    }
}

/// The classic monotone stack step: a same-side vertex pops while the
/// corner it exposes turns convex toward the interior, an opposite-side
/// vertex fans the whole chain and restarts it.
fn push_vertex(
    tris: &mut Vec<[Vec2; 3]>,
    verts: &[Vec2],
    stack: &mut Vec<(usize, Side)>,
    v: usize,
    side: Side,
) {
    if stack.len() < 2 {
        if stack.last().map(|t| t.0) != Some(v) {
            stack.push((v, side));
        }
        return;
    }
    if stack.last().expect("checked above").1 == side {
        while stack.len() >= 2 {
            let a = stack[stack.len() - 1].0;
            let b = stack[stack.len() - 2].0;
            let area2 = (verts[a] - verts[v]).perp_dot(verts[b] - verts[v]);
            let mut lens = [
                (verts[a] - verts[v]).length_squared(),
                (verts[b] - verts[a]).length_squared(),
                (verts[v] - verts[b]).length_squared(),
            ];
            lens.sort_by(f32::total_cmp);
            let tol = 2e-6 * (lens[1].sqrt() * lens[2].sqrt());
            let pops = match side {
                Side::Left => area2 < -tol,
                Side::Right => area2 > tol,
            };
            if !pops {
                break;
            }
            emit(tris, verts[v], verts[a], verts[b]);
            stack.pop();
        }
        stack.push((v, side));
    } else {
        fan(tris, verts, v, stack);
        let last = *stack.last().expect("nonempty stack");
        stack.clear();
        stack.push(last);
        stack.push((v, side));
    }
}
