//! Mesh file I/O: Wavefront OBJ (read/write), binary STL (read/write) and
//! SVG (write only). Format is picked by file extension.

#[cfg(test)]
mod tests;

mod obj;
mod stl;
mod svg;

use std::path::Path;

use crate::error::{Error, Result};
use crate::vertex_list::VertexList;

/// Read every mesh in `path`, scaling positions by `scale`.
///
/// ASCII STL and SVG inputs are rejected, matching the formats the rest of
/// the pipeline can produce.
pub fn read_vertex_lists(path: impl AsRef<Path>, scale: f32) -> Result<Vec<VertexList>> {
    let path = path.as_ref();
    match extension(path)?.as_str() {
        "obj" => obj::read(path, scale),
        "stl" => stl::read(path, scale),
        "svg" => Err(Error::InputInvalid("reading SVG is not supported".into())),
        other => Err(Error::InputInvalid(format!("unknown mesh extension '{other}'"))),
    }
}

/// Write `lists` to `path`, scaling positions by `scale`. STL holds
/// exactly one mesh per file.
pub fn write_vertex_lists(path: impl AsRef<Path>, lists: &[VertexList], scale: f32) -> Result<()> {
    let path = path.as_ref();
    match extension(path)?.as_str() {
        "obj" => obj::write(path, lists, scale),
        "stl" => match lists {
            [single] => stl::write(path, single, scale),
            _ => Err(Error::InputInvalid(format!(
                "STL holds exactly one mesh, got {}",
                lists.len()
            ))),
        },
        "svg" => svg::write(path, lists, scale),
        other => Err(Error::InputInvalid(format!("unknown mesh extension '{other}'"))),
    }
}

fn extension(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| Error::InputInvalid(format!("{} has no file extension", path.display())))
}
