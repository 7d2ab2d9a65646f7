use assert2::check;
use glam::{Vec2, Vec3};
use std::f32::consts::PI;

use crate::vef::{Vef, edge2d};
use crate::vertex_list::{Primitive, VertexList};

/// Unit-half-extent cube as 12 CCW outward triangles.
fn cube_vl() -> VertexList {
    let p = [
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
    ];
    let quads = [
        [0, 3, 2, 1],
        [4, 5, 6, 7],
        [0, 1, 5, 4],
        [1, 2, 6, 5],
        [2, 3, 7, 6],
        [3, 0, 4, 7],
    ];
    let mut vl = VertexList::new(3, Primitive::Triangles).unwrap();
    for q in quads {
        for t in [[q[0], q[1], q[2]], [q[0], q[2], q[3]]] {
            for v in t {
                vl.add(&p[v]).unwrap();
            }
        }
    }
    vl
}

#[test]
fn cube_topology_counts() {
    let vef = Vef::from_vertex_list(&cube_vl()).unwrap();
    check!(vef.vert_count() == 8);
    check!(vef.edge_count() == 18);
    check!(vef.face_count() == 12);
    for e in 0..vef.edge_count() {
        let faces = vef.edge_faces(e);
        check!(faces[0].is_some() && faces[1].is_some(), "closed mesh: edge {:?} must have two faces", e);
    }
}

#[test]
fn nonmanifold_edge_is_rejected() {
    let mut vl = VertexList::new(3, Primitive::Triangles).unwrap();
    // Three triangles sharing the edge (0,0,0)-(1,0,0).
    for apex in [[0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, -1.0, 0.0]] {
        vl.add(&[0.0, 0.0, 0.0]).unwrap();
        vl.add(&[1.0, 0.0, 0.0]).unwrap();
        vl.add(&apex).unwrap();
    }
    check!(Vef::from_vertex_list(&vl).is_err());
}

#[test]
fn dihedral_angles() {
    let mut vef = Vef::from_vertex_list(&cube_vl()).unwrap();
    // Every cube edge is convex with an interior right angle; in the
    // outside-measured convention that reads 3π/2. Face-diagonal edges
    // introduced by quad splitting are flat: π.
    let mut seen_corner = 0;
    let mut seen_flat = 0;
    for e in 0..vef.edge_count() {
        let ang = vef.edge_frame(e).unwrap().ang;
        if (ang - 3.0 * PI / 2.0).abs() < 1e-4 {
            seen_corner += 1;
        } else if (ang - PI).abs() < 1e-4 {
            seen_flat += 1;
        }
    }
    check!(seen_corner == 12);
    check!(seen_flat == 6);
}

#[test]
fn interior_dist_inside_and_outside() {
    let mut vef = Vef::from_vertex_list(&cube_vl()).unwrap();
    let mut start = 0;
    let d = vef.convex_interior_dist(Vec3::ZERO, &mut start);
    check!((d - 1.0).abs() < 1e-5, "center of a unit-half cube is 1 from every face");
    let d = vef.convex_interior_dist(Vec3::new(0.9, 0.0, 0.0), &mut start);
    check!((d - 0.1).abs() < 1e-5);
    let d = vef.convex_interior_dist(Vec3::new(2.0, 0.0, 0.0), &mut start);
    check!(d < -0.5, "points outside must read negative");
}

#[test]
fn ray_dist_walks_to_the_exit_face() {
    let mut vef = Vef::from_vertex_list(&cube_vl()).unwrap();
    let mut start = 0;
    let t = vef.convex_ray_dist(Vec3::ZERO, Vec3::X, &mut start).unwrap();
    check!((t - 1.0).abs() < 1e-5);
    let diag = Vec3::new(1.0, 1.0, 1.0).normalize();
    let mut start = 0;
    let t = vef.convex_ray_dist(Vec3::ZERO, diag, &mut start).unwrap();
    check!((t - 3.0_f32.sqrt()).abs() < 1e-4);
    // Off-center, tilted.
    let mut start = 3;
    let t = vef
        .convex_ray_dist(Vec3::new(-0.5, 0.25, 0.0), Vec3::new(1.0, 0.0, 0.1).normalize(), &mut start)
        .unwrap();
    let exit = Vec3::new(-0.5, 0.25, 0.0) + t * Vec3::new(1.0, 0.0, 0.1).normalize();
    check!((exit.x - 1.0).abs() < 1e-4, "ray should leave through the +x face");
}

#[test]
fn edge2d_classifies_against_each_edge() {
    // Triangle (0,0) (2,0) (1,1).
    let v1x = 2.0;
    let v2 = Vec2::new(1.0, 1.0);
    let (_, inside) = edge2d(Vec2::new(1.0, 0.3), v1x, v2, 1e-6);
    check!(inside < 0.0, "interior point must be inside every edge");
    let (e, out) = edge2d(Vec2::new(1.0, -0.5), v1x, v2, 1e-6);
    check!(e == 0 && out > 0.0);
    let (e, _) = edge2d(Vec2::new(2.0, 1.0), v1x, v2, 1e-6);
    check!(e == 1);
    let (e, _) = edge2d(Vec2::new(0.0, 1.0), v1x, v2, 1e-6);
    check!(e == 2);
}
