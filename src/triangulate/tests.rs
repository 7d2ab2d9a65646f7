use assert2::check;
use rustc_hash::FxHashSet;

use crate::triangulate::triangulate_2d;
use crate::vertex_list::{Primitive, VertexList};

fn segment_list(segments: &[[f32; 4]]) -> VertexList {
    let mut vl = VertexList::new(2, Primitive::Lines).unwrap();
    for s in segments {
        vl.add(&[s[0], s[1]]).unwrap();
        vl.add(&[s[2], s[3]]).unwrap();
    }
    vl
}

/// Closed loop through the listed points.
fn outline(points: &[[f32; 2]]) -> Vec<[f32; 4]> {
    (0..points.len())
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            [a[0], a[1], b[0], b[1]]
        })
        .collect()
}

fn total_area(vl: &VertexList) -> f32 {
    let mut area = 0.0;
    for [i, j, k] in vl.triangles() {
        let (a, b, c) = (vl.pos2(i), vl.pos2(j), vl.pos2(k));
        let signed = (b - a).perp_dot(c - a) * 0.5;
        check!(signed > 0.0, "triangle ({:?} {:?} {:?}) is not CCW", a, b, c);
        area += signed;
    }
    area
}

fn check_no_repeated_directed_edges(vl: &VertexList) {
    let mut seen = FxHashSet::default();
    for [i, j, k] in vl.triangles() {
        for (u, v) in [(i, j), (j, k), (k, i)] {
            check!(seen.insert((u, v)), "directed edge repeated: triangles overlap");
        }
    }
}

#[test]
fn unit_square() {
    let vl = segment_list(&outline(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]));
    let tris = triangulate_2d(&vl).unwrap();
    check!(tris.triangles().count() == 2);
    check!((total_area(&tris) - 1.0).abs() < 1e-6);
    check_no_repeated_directed_edges(&tris);
}

#[test]
fn square_with_square_hole() {
    let mut segments = outline(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
    segments.extend(outline(&[
        [0.25, 0.25],
        [0.75, 0.25],
        [0.75, 0.75],
        [0.25, 0.75],
    ]));
    let tris = triangulate_2d(&segment_list(&segments)).unwrap();
    check!((total_area(&tris) - 0.75).abs() < 1e-6);
    check_no_repeated_directed_edges(&tris);
}

#[test]
fn convex_polygon() {
    let n = 7;
    let points: Vec<[f32; 2]> = (0..n)
        .map(|i| {
            let a = std::f32::consts::TAU * i as f32 / n as f32;
            [a.cos(), a.sin()]
        })
        .collect();
    let tris = triangulate_2d(&segment_list(&outline(&points))).unwrap();
    check!(tris.triangles().count() == n - 2);
    let expected = 0.5 * n as f32 * (std::f32::consts::TAU / n as f32).sin();
    check!((total_area(&tris) - expected).abs() < 1e-5);
}

#[test]
fn merge_vertex_notch_from_above() {
    // Square with a triangular notch cut into the top edge; the notch tip
    // joins two regions on the way down.
    let tris = triangulate_2d(&segment_list(&outline(&[
        [0.0, 0.0],
        [2.0, 0.0],
        [2.0, 2.0],
        [1.5, 2.0],
        [1.0, 0.5],
        [0.5, 2.0],
        [0.0, 2.0],
    ])))
    .unwrap();
    let notch = 0.5 * 1.0 * 1.5;
    check!((total_area(&tris) - (4.0 - notch)).abs() < 1e-5);
    check_no_repeated_directed_edges(&tris);
}

#[test]
fn split_vertex_notch_from_below() {
    let tris = triangulate_2d(&segment_list(&outline(&[
        [0.0, 0.0],
        [0.5, 0.0],
        [1.0, 1.5],
        [1.5, 0.0],
        [2.0, 0.0],
        [2.0, 2.0],
        [0.0, 2.0],
    ])))
    .unwrap();
    check!((total_area(&tris) - (4.0 - 0.75)).abs() < 1e-5);
    check_no_repeated_directed_edges(&tris);
}

#[test]
fn two_disjoint_triangles() {
    let mut segments = outline(&[[0.0, 0.0], [1.0, 0.0], [0.5, 1.0]]);
    segments.extend(outline(&[[3.0, 0.0], [4.0, 0.0], [3.5, 1.0]]));
    let tris = triangulate_2d(&segment_list(&segments)).unwrap();
    check!(tris.triangles().count() == 2);
    check!((total_area(&tris) - 1.0).abs() < 1e-6);
}

#[test]
fn nested_islands() {
    // Outer square, hole, and an island inside the hole.
    let mut segments = outline(&[[0.0, 0.0], [9.0, 0.0], [9.0, 9.0], [0.0, 9.0]]);
    segments.extend(outline(&[[1.0, 1.0], [8.0, 1.0], [8.0, 8.0], [1.0, 8.0]]));
    segments.extend(outline(&[[3.0, 3.0], [6.0, 3.0], [6.0, 6.0], [3.0, 6.0]]));
    let tris = triangulate_2d(&segment_list(&segments)).unwrap();
    check!((total_area(&tris) - (81.0 - 49.0 + 9.0)).abs() < 1e-4);
    check_no_repeated_directed_edges(&tris);
}

#[test]
fn duplicate_segments_cancel() {
    let mut segments = outline(&[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
    let copy = segments.clone();
    segments.extend(copy);
    let tris = triangulate_2d(&segment_list(&segments)).unwrap();
    check!(tris.triangles().count() == 0, "an XOR-cancelled boundary encloses nothing");
}

#[test]
fn odd_arity_is_rejected() {
    let vl = segment_list(&[
        [0.0, 0.0, 1.0, 0.0],
        [1.0, 0.0, 1.0, 1.0],
        [1.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 2.0, 5.0],
    ]);
    check!(triangulate_2d(&vl).is_err());
}

#[test]
fn wrong_primitive_is_rejected() {
    let vl = VertexList::new(2, Primitive::Triangles).unwrap();
    check!(triangulate_2d(&vl).is_err());
    let vl = VertexList::new(3, Primitive::Lines).unwrap();
    check!(triangulate_2d(&vl).is_err());
}

#[test]
fn reflex_hexagon() {
    let tris = triangulate_2d(&segment_list(&outline(&[
        [0.0, 0.0],
        [3.0, 0.0],
        [2.5, 1.0],
        [3.0, 2.0],
        [0.0, 2.0],
        [0.5, 1.0],
    ])))
    .unwrap();
    check_no_repeated_directed_edges(&tris);
    let hexagon_area = 2.0 * 3.0 - 2.0 * (0.5 * 0.5 * 2.0);
    check!((total_area(&tris) - hexagon_area).abs() < 1e-5);
}

#[test]
fn vertical_sliver() {
    // Tall thin triangle with colinear-ish points still triangulates.
    let tris = triangulate_2d(&segment_list(&outline(&[
        [0.0, 0.0],
        [0.1, 0.0],
        [0.05, 10.0],
    ])))
    .unwrap();
    check!((total_area(&tris) - 0.5).abs() < 1e-4);
}

#[test]
fn square_area_is_exact() {
    let tris = triangulate_2d(&segment_list(&outline(&[
        [0.0, 0.0],
        [1.0, 0.0],
        [1.0, 1.0],
        [0.0, 1.0],
    ])))
    .unwrap();
    check!(total_area(&tris) == 1.0);
}
