#![doc = include_str!("../README.md")]

mod error;
mod ftree;
mod queue;
mod vertex_list;

mod cut;
mod decompose;
mod hull;
mod mass;
mod simplify;
mod transform;
mod triangulate;
mod vef;

pub mod io;
pub mod primitives;

pub use cut::plane_cut;
pub use decompose::convex_decomp;
pub use error::{Error, Result};
pub use hull::convex_hull;
pub use mass::{MassProperties, mass_properties};
pub use simplify::simplify;
pub use transform::Transform;
pub use triangulate::triangulate_2d;
pub use vef::Vef;
pub use vertex_list::{Primitive, VertexList};
