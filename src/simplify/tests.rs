use assert2::check;
use glam::Vec3;
use rand::prelude::*;
use rustc_hash::FxHashSet;

use crate::mass;
use crate::primitives;
use crate::simplify::{build_bvh, pairs_within, simplify};
use crate::vertex_list::{Primitive, VertexList};

#[test]
fn target_above_face_count_is_a_noop() {
    let cube = primitives::cube(1.0, 1.0, 1.0).unwrap();
    let out = simplify(&cube, 100, 0.0).unwrap();
    check!(out.triangles().count() == 12);
    check!((mass::volume(&out).unwrap() - 8.0).abs() < 1e-4);
}

#[test]
#[ntest::timeout(120000)]
fn sphere_reduces_to_target() {
    let sphere = primitives::uv_sphere(1.0, 16, 16).unwrap();
    let before = sphere.triangles().count();
    let out = simplify(&sphere, 20, 0.0).unwrap();
    let after = out.triangles().count();
    check!(after <= 20, "got {:?} faces from {:?}", after, before);
    let props = mass::mass_properties(&out).unwrap();
    check!(props.com.length() < 1e-2, "center of mass drifted to {:?}", props.com);
    let full = 4.0 * std::f32::consts::PI / 3.0;
    check!(props.volume > 0.5 * full && props.volume < full);
}

#[test]
fn no_face_normal_inverts() {
    let sphere = primitives::uv_sphere(1.0, 12, 12).unwrap();
    let out = simplify(&sphere, 40, 0.0).unwrap();
    // On a convex solid around the origin, outward faces keep a positive
    // offset; an inverted face would face the origin.
    for [a, b, c] in out.triangles() {
        let n = (out.pos(b) - out.pos(a)).cross(out.pos(c) - out.pos(a));
        check!(n.dot(out.pos(a)) > 0.0, "face turned inward");
    }
}

#[test]
fn aggregation_fuses_nearby_pieces() {
    // Two tetrahedra a hair apart; with an aggregation threshold their
    // vertices pair up across the gap and contraction can bridge it.
    let mut vl = VertexList::new(3, Primitive::Triangles).unwrap();
    for offset in [Vec3::ZERO, Vec3::new(3.05, 0.0, 0.0)] {
        let p = [
            offset,
            offset + Vec3::new(1.0, 0.0, 0.0),
            offset + Vec3::new(0.0, 1.0, 0.0),
            offset + Vec3::new(0.0, 0.0, 1.0),
        ];
        for t in [[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]] {
            for v in t {
                vl.add_point(p[v]).unwrap();
            }
        }
    }
    let out = simplify(&vl, 4, 2.5).unwrap();
    check!(out.triangles().count() <= 8);
    check!(out.triangles().count() >= 1);
}

#[test]
fn bvh_pair_search_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(1234);
    let positions: Vec<Vec3> = (0..300)
        .map(|_| Vec3::new(rng.r#gen::<f32>(), rng.r#gen::<f32>(), rng.r#gen::<f32>()) * 4.0)
        .collect();
    let thresh = 0.35;
    let mut indices: Vec<usize> = (0..positions.len()).collect();
    let bvh = build_bvh(&positions, &mut indices, thresh);
    let mut found = Vec::new();
    pairs_within(&positions, &bvh, thresh, &mut found);
    let found: FxHashSet<(usize, usize)> = found.into_iter().collect();

    let mut brute = FxHashSet::default();
    for a in 0..positions.len() {
        for b in a + 1..positions.len() {
            if positions[a].distance(positions[b]) <= thresh {
                brute.insert((a, b));
            }
        }
    }
    check!(found == brute, "BVH found {:?} pairs, brute force {:?}", found.len(), brute.len());
}

#[test]
fn rejects_non_triangle_input() {
    let vl = VertexList::new(3, Primitive::Lines).unwrap();
    check!(simplify(&vl, 10, 0.0).is_err());
}
