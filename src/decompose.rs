
use glam::{Quat, Vec3};

use crate::cut::plane_cut;
use crate::error::Result;
use crate::ftree::FTree;
use crate::hull::convex_hull;
use crate::mass;
use crate::vef::Vef;
use crate::vertex_list::VertexList;

/// How many of the most concave edges are tried as cut candidates.
const NUM_EDGES: usize = 16;
/// Candidate planes per edge sweep between the two face normals. The k = 0
/// orientation is deliberately excluded.
const NUM_ANGLES: usize = 9;
/// Outer-loop backstop for inputs that refuse to converge.
const MAX_CUTS: usize = 1024;

struct Part {
    vl: VertexList,
    hull: Option<VertexList>,
    error: f32,
    abandoned: bool,
}

impl Part {
    fn new(vl: VertexList) -> Self {
        // Too few vertices to hull: carried through as-is.
        if vl.vert_count() <= 4 {
            return Part { vl, hull: None, error: 0.0, abandoned: true };
        }
        match convex_hull(&vl) {
            Ok(hull) => {
                let error = match (mass::volume(&hull), mass::volume(&vl)) {
                    (Ok(hv), Ok(pv)) => (hv - pv).max(0.0),
                    _ => 0.0,
                };
                Part { vl, hull: Some(hull), error, abandoned: false }
            }
            Err(e) => {
                log::warn!("decomposition piece could not be hulled: {e}");
                Part { vl, hull: None, error: 0.0, abandoned: true }
            }
        }
    }
}

/// Approximate convex decomposition: repeatedly split the part whose hull
/// overshoots its volume the most, cutting along a plane swept about one
/// of its most concave edges, until the total overshoot drops below
/// `threshold` times the input volume. Returns the convex hulls of the
/// final parts.
pub fn convex_decomp(vl: &VertexList, threshold: f32) -> Result<Vec<VertexList>> {
    vl.expect_triangles(3, "convex_decomp")?;
    let total_volume = mass::volume(vl)?.abs();
    let target = threshold * total_volume;

    // The trivial infinite cut just separates connected components.
    let mut parts: Vec<Part> = plane_cut(vl, Vec3::X, f32::INFINITY)?
        .into_iter()
        .map(Part::new)
        .collect();

    for round in 0.. {
        let err: f32 = parts.iter().map(|p| p.error).sum();
        if err <= target {
            break;
        }
        let worst = parts
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.abandoned && p.error > 0.0)
            .max_by(|a, b| a.1.error.total_cmp(&b.1.error))
            .map(|(i, _)| i);
        let Some(worst) = worst else { break };
        if round >= MAX_CUTS {
            log::warn!("convex decomposition stopped after {MAX_CUTS} cuts at error {err}");
            break;
        }
        log::debug!(
            "decomposition round {round}: {} parts, error {err} (target {target})",
            parts.len()
        );
        match cut_part(&parts[worst]) {
            Some(pieces) => {
                parts.swap_remove(worst);
                parts.extend(pieces.into_iter().map(Part::new));
            }
            None => parts[worst].abandoned = true,
        }
    }

    Ok(parts
        .into_iter()
        .map(|p| match p.hull {
            Some(hull) => hull,
            None => p.vl,
        })
        .collect())
}

/// Pick the best cut for one part: rank its edges by how far the dihedral
/// bisector ray escapes before reaching the part's hull (deep rays mean
/// concave creases), then sweep candidate planes about the top edges and
/// keep the split minimizing the sum of squared piece errors.
fn cut_part(part: &Part) -> Option<Vec<VertexList>> {
    let hull = part.hull.as_ref()?;
    let mut vef = Vef::from_vertex_list(&part.vl).ok()?;
    let mut hvef = Vef::from_vertex_list(hull).ok()?;

    let mut ranked = FTree::new();
    let mut start = 0;
    for e in 0..vef.edge_count() {
        let [f0, f1] = vef.edge_faces(e);
        let (Some(f0), Some(f1)) = (f0, f1) else { continue };
        let bis = (vef.face_normal(f0) + vef.face_normal(f1)).normalize_or_zero();
        if bis == Vec3::ZERO {
            continue;
        }
        let [v0, v1] = vef.edge_verts(e);
        let mid = (vef.vert_pos(v0) + vef.vert_pos(v1)) * 0.5;
        let Ok(depth) = hvef.convex_ray_dist(mid, bis, &mut start) else { continue };
        ranked.insert((e, depth), |t| t.1);
    }

    let mut candidates = Vec::new();
    let mut cur = ranked.last();
    while let Some(id) = cur {
        candidates.push(ranked.get(id).0);
        if candidates.len() == NUM_EDGES {
            break;
        }
        cur = ranked.prev(id);
    }

    let mut best: Option<(f32, Vec<VertexList>)> = None;
    for (rank, &e) in candidates.iter().enumerate() {
        let Ok(frame) = vef.edge_frame(e) else { continue };
        let Some(f0) = vef.edge_faces(e)[0] else { continue };
        let n0 = vef.face_normal(f0);
        let [v0, v1] = vef.edge_verts(e);
        let mid = (vef.vert_pos(v0) + vef.vert_pos(v1)) * 0.5;
        let bias = 1.0 + 1e-3 * (rank as f32 - (NUM_EDGES as f32 - 1.0) / 2.0).abs();
        for k in (1..NUM_ANGLES).rev() {
            let nk = Quat::from_axis_angle(frame.z, frame.ang * k as f32 / NUM_ANGLES as f32) * n0;
            let Ok(pieces) = plane_cut(&part.vl, nk, nk.dot(mid)) else { continue };
            if pieces.len() < 2 {
                continue;
            }
            let score: f32 = pieces.iter().map(|p| piece_error(p).powi(2)).sum::<f32>() * bias;
            if best.as_ref().is_none_or(|(s, _)| score < *s) {
                best = Some((score, pieces));
            }
        }
    }
    best.map(|(_, pieces)| pieces)
}

fn piece_error(piece: &VertexList) -> f32 {
    if piece.vert_count() <= 4 {
        return 0.0;
    }
    let Ok(hull) = convex_hull(piece) else { return 0.0 };
    match (mass::volume(&hull), mass::volume(piece)) {
        (Ok(hv), Ok(pv)) => (hv - pv).max(0.0),
        _ => 0.0,
    }
}
