use assert2::check;
use glam::Vec3;
use rand::prelude::*;
use rustc_hash::FxHashSet;

use crate::hull::convex_hull;
use crate::mass;
use crate::vertex_list::{Primitive, VertexList};

fn point_list(points: &[[f32; 3]]) -> VertexList {
    let mut vl = VertexList::new(3, Primitive::Points).unwrap();
    for p in points {
        vl.add(p).unwrap();
    }
    vl
}

/// Every directed edge must appear exactly once, and its reverse exactly
/// once: a closed manifold with consistent winding.
fn check_closed_manifold(vl: &VertexList) {
    let mut directed = FxHashSet::default();
    for [a, b, c] in vl.triangles() {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            check!(directed.insert((u, v)), "directed edge ({:?}, {:?}) repeated", u, v);
        }
    }
    for &(u, v) in &directed {
        check!(directed.contains(&(v, u)), "edge ({:?}, {:?}) has no facing edge", u, v);
    }
}

fn check_contains_points(hull: &VertexList, vl: &VertexList) {
    let planes: Vec<(Vec3, f32)> = hull
        .triangles()
        .map(|[a, b, c]| {
            let n = (hull.pos(b) - hull.pos(a))
                .cross(hull.pos(c) - hull.pos(a))
                .normalize();
            (n, n.dot(hull.pos(a)))
        })
        .collect();
    for i in 0..vl.vert_count() {
        let p = vl.pos(i);
        for &(n, d) in &planes {
            check!(n.dot(p) - d < 1e-4, "input point {:?} ended up outside the hull", p);
        }
    }
}

const CUBE: [[f32; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

#[test]
fn tetrahedron() {
    let vl = point_list(&[
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ]);
    let hull = convex_hull(&vl).unwrap();
    check!(hull.triangles().count() == 4);
    check!(hull.vert_count() == 4);
    check_closed_manifold(&hull);
    check!((mass::volume(&hull).unwrap() - 1.0 / 6.0).abs() < 1e-6);
}

#[test]
fn cube_corners_merge_coplanar_faces() {
    let hull = convex_hull(&point_list(&CUBE)).unwrap();
    check!(hull.vert_count() == 8);
    check!(hull.triangles().count() == 12, "six quads, two triangles each");
    check_closed_manifold(&hull);
    check!((mass::volume(&hull).unwrap() - 8.0).abs() < 1e-4);
}

#[test]
fn interior_and_surface_points_are_absorbed() {
    let mut points = CUBE.to_vec();
    points.push([0.0, 0.0, 0.0]);
    points.push([0.5, 0.5, 0.5]);
    points.push([1.0, 0.0, 0.0]); // on a face
    points.push([0.0, 1.0, 1.0]); // on an edge
    let vl = point_list(&points);
    let hull = convex_hull(&vl).unwrap();
    check!(hull.vert_count() == 8, "non-extreme points must not appear in the hull");
    check!((mass::volume(&hull).unwrap() - 8.0).abs() < 1e-4);
    check_closed_manifold(&hull);
    check_contains_points(&hull, &vl);
}

#[test]
fn degenerate_inputs_fail() {
    check!(convex_hull(&point_list(&[[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])).is_err());
    check!(
        convex_hull(&point_list(&[
            [0.0; 3],
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [3.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
        ]))
        .is_err(),
        "colinear points have no hull"
    );
    let mut flat = Vec::new();
    for i in 0..4 {
        for j in 0..4 {
            flat.push([i as f32, j as f32, 0.0]);
        }
    }
    check!(convex_hull(&point_list(&flat)).is_err(), "coplanar points have no hull");
    let mut dup = point_list(&[[1.0, 2.0, 3.0]]);
    for _ in 0..10 {
        dup.add(&[1.0, 2.0, 3.0]).unwrap();
    }
    check!(convex_hull(&dup).is_err(), "coincident points have no hull");
}

#[test]
fn octagonal_prism_caps_become_single_facets() {
    let n = 8;
    let mut points = Vec::new();
    for i in 0..n {
        let a = std::f32::consts::TAU * i as f32 / n as f32;
        points.push([a.cos(), a.sin(), 1.0]);
        points.push([a.cos(), a.sin(), -1.0]);
    }
    let vl = point_list(&points);
    let hull = convex_hull(&vl).unwrap();
    check_closed_manifold(&hull);
    check_contains_points(&hull, &vl);
    // Caps fan into n-2 triangles each, sides are n quads.
    check!(hull.triangles().count() == 2 * (n - 2) + 2 * n);
    let octagon = 0.5 * n as f32 * (std::f32::consts::TAU / n as f32).sin();
    check!((mass::volume(&hull).unwrap() - octagon * 2.0).abs() < 1e-3);
}

#[test]
#[ntest::timeout(60000)]
fn random_sphere_cloud() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut vl = VertexList::new(3, Primitive::Points).unwrap();
    for _ in 0..500 {
        let v = Vec3::new(
            rng.r#gen::<f32>() - 0.5,
            rng.r#gen::<f32>() - 0.5,
            rng.r#gen::<f32>() - 0.5,
        )
        .normalize();
        // Half on the unit sphere, half strictly inside.
        let r = if rng.r#gen::<bool>() { 1.0 } else { rng.r#gen::<f32>() * 0.9 };
        vl.add(&[v.x * r, v.y * r, v.z * r]).unwrap();
    }
    let hull = convex_hull(&vl).unwrap();
    check_closed_manifold(&hull);
    check_contains_points(&hull, &vl);
    let v = mass::volume(&hull).unwrap();
    check!(v > 2.5 && v < 4.19, "hull volume {:?} should be a bit under the sphere's", v);
}

#[test]
fn hull_of_hull_is_identical() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut vl = VertexList::new(3, Primitive::Points).unwrap();
    for _ in 0..200 {
        vl.add(&[rng.r#gen::<f32>(), rng.r#gen::<f32>(), rng.r#gen::<f32>()]).unwrap();
    }
    let once = convex_hull(&vl).unwrap();
    let twice = convex_hull(&once).unwrap();
    check!(once.vert_count() == twice.vert_count());
    check!(once.triangles().count() == twice.triangles().count());
    let dv = (mass::volume(&once).unwrap() - mass::volume(&twice).unwrap()).abs();
    check!(dv < 1e-5);
}
