use assert2::check;
use std::path::PathBuf;

use crate::io::{read_vertex_lists, write_vertex_lists};
use crate::mass;
use crate::primitives;
use crate::triangulate::triangulate_2d;
use crate::vertex_list::{Primitive, VertexList};

fn scratch(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("polyhedra-test-{}-{name}", std::process::id()));
    p
}

#[test]
fn obj_round_trip_preserves_cube() {
    let cube = primitives::cube(1.0, 1.0, 1.0).unwrap();
    let path = scratch("cube.obj");
    write_vertex_lists(&path, std::slice::from_ref(&cube), 1.0).unwrap();
    let back = read_vertex_lists(&path, 1.0).unwrap();
    check!(back.len() == 1);
    check!(back[0].vert_count() == 8, "dedup must restore the 8 unique vertices");
    check!(back[0].triangles().count() == 12);
    check!((mass::volume(&back[0]).unwrap() - 8.0).abs() < 1e-4);
    let _ = std::fs::remove_file(path);
}

#[test]
fn obj_scale_applies_on_read() {
    let cube = primitives::cube(1.0, 1.0, 1.0).unwrap();
    let path = scratch("scaled.obj");
    write_vertex_lists(&path, std::slice::from_ref(&cube), 1.0).unwrap();
    let back = read_vertex_lists(&path, 2.0).unwrap();
    check!((mass::volume(&back[0]).unwrap() - 64.0).abs() < 1e-3);
    let _ = std::fs::remove_file(path);
}

#[test]
fn obj_multiple_objects() {
    let a = primitives::cube(1.0, 1.0, 1.0).unwrap();
    let b = primitives::cube(0.5, 0.5, 0.5).unwrap();
    let path = scratch("two.obj");
    write_vertex_lists(&path, &[a, b], 1.0).unwrap();
    let back = read_vertex_lists(&path, 1.0).unwrap();
    check!(back.len() == 2);
    check!((mass::volume(&back[0]).unwrap() - 8.0).abs() < 1e-4);
    check!((mass::volume(&back[1]).unwrap() - 1.0).abs() < 1e-4);
    let _ = std::fs::remove_file(path);
}

#[test]
fn obj_parse_errors_carry_line_numbers() {
    let path = scratch("broken.obj");
    std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 oops\n").unwrap();
    let err = read_vertex_lists(&path, 1.0).unwrap_err();
    check!(format!("{err}").contains("line 4"));
    let _ = std::fs::remove_file(path);
}

#[test]
fn obj_rejects_quads() {
    let path = scratch("quad.obj");
    std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").unwrap();
    check!(read_vertex_lists(&path, 1.0).is_err());
    let _ = std::fs::remove_file(path);
}

#[test]
fn stl_round_trip() {
    let sphere = primitives::icosphere(1.0, 1).unwrap();
    let path = scratch("sphere.stl");
    write_vertex_lists(&path, std::slice::from_ref(&sphere), 1.0).unwrap();
    let back = read_vertex_lists(&path, 1.0).unwrap();
    check!(back.len() == 1);
    check!(back[0].triangles().count() == sphere.triangles().count());
    check!(back[0].vert_count() == sphere.vert_count());
    let dv = (mass::volume(&back[0]).unwrap() - mass::volume(&sphere).unwrap()).abs();
    check!(dv < 1e-5, "winding must survive the round trip");
    let _ = std::fs::remove_file(path);
}

#[test]
fn stl_requires_exactly_one_mesh() {
    let cube = primitives::cube(1.0, 1.0, 1.0).unwrap();
    let path = scratch("multi.stl");
    check!(write_vertex_lists(&path, &[cube.clone(), cube], 1.0).is_err());
}

#[test]
fn ascii_stl_is_rejected() {
    let path = scratch("ascii.stl");
    std::fs::write(
        &path,
        "solid ascii\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendloop\nendfacet\nendsolid\n",
    )
    .unwrap();
    let err = read_vertex_lists(&path, 1.0).unwrap_err();
    check!(format!("{err}").contains("ASCII"));
    let _ = std::fs::remove_file(path);
}

#[test]
fn svg_writes_lines_and_polygons() {
    let mut lines = VertexList::new(2, Primitive::Lines).unwrap();
    for s in [[0.0, 0.0, 1.0, 0.0], [1.0, 0.0, 1.0, 1.0]] {
        lines.add(&[s[0], s[1]]).unwrap();
        lines.add(&[s[2], s[3]]).unwrap();
    }
    let mut square = VertexList::new(2, Primitive::Lines).unwrap();
    for s in [
        [0.0f32, 0.0, 1.0, 0.0],
        [1.0, 0.0, 1.0, 1.0],
        [1.0, 1.0, 0.0, 1.0],
        [0.0, 1.0, 0.0, 0.0],
    ] {
        square.add(&[s[0], s[1]]).unwrap();
        square.add(&[s[2], s[3]]).unwrap();
    }
    let tris = triangulate_2d(&square).unwrap();
    let path = scratch("shapes.svg");
    write_vertex_lists(&path, &[lines, tris], 1.0).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    check!(text.contains("<line"));
    check!(text.contains("<polygon"));
    check!(text.contains("viewBox"));
    check!(read_vertex_lists(&path, 1.0).is_err(), "SVG reading is unsupported");
    let _ = std::fs::remove_file(path);
}

#[test]
fn unknown_extension_is_rejected() {
    let cube = primitives::cube(1.0, 1.0, 1.0).unwrap();
    check!(write_vertex_lists(scratch("cube.ply"), std::slice::from_ref(&cube), 1.0).is_err());
    check!(read_vertex_lists(scratch("nothing.xyz"), 1.0).is_err());
}
