use assert2::check;
use crate::{Primitive, VertexList};

#[test]
fn add_deduplicates_byte_identical_records() {
    let mut vl = VertexList::new(3, Primitive::Triangles).unwrap();
    let a = vl.add(&[0.0, 1.0, 2.0]).unwrap();
    let b = vl.add(&[3.0, 4.0, 5.0]).unwrap();
    let a2 = vl.add(&[0.0, 1.0, 2.0]).unwrap();
    check!(a == a2, "byte-identical records must map to the same index");
    check!(a != b);
    check!(vl.vert_count() == 2);
    check!(vl.indices() == [a, b, a], "every add appends to the index array");
}

#[test]
fn negative_zero_is_a_distinct_vertex() {
    // Dedup is on bytes, not on float equality.
    let mut vl = VertexList::new(1, Primitive::Points).unwrap();
    let a = vl.add(&[0.0]).unwrap();
    let b = vl.add(&[-0.0]).unwrap();
    check!(a != b);
}

#[test]
fn add_index_range() {
    let mut vl = VertexList::new(3, Primitive::Triangles).unwrap();
    vl.add(&[0.0, 0.0, 0.0]).unwrap();
    vl.add(&[1.0, 0.0, 0.0]).unwrap();
    check!(vl.add_index(0).is_ok());
    check!(vl.add_index(2).is_ok(), "vert_count itself is an accepted sentinel");
    check!(vl.add_index(3).is_err());
}

#[test]
fn finalize_stops_dedup() {
    let mut vl = VertexList::new(2, Primitive::Lines).unwrap();
    vl.add(&[1.0, 1.0]).unwrap();
    vl.finalize();
    let b = vl.add(&[1.0, 1.0]).unwrap();
    check!(b == 1, "after finalize, adds append without de-duplication");
    check!(vl.vert_count() == 2);
}

#[test]
fn zero_width_records_are_rejected() {
    check!(VertexList::new(0, Primitive::Points).is_err());
}
