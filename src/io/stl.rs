use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::vertex_list::{Primitive, VertexList};

const HEADER_LEN: usize = 80;
const FACE_LEN: usize = 50;

pub fn read(path: &Path, scale: f32) -> Result<Vec<VertexList>> {
    let bytes = fs::read(path)?;
    if bytes.len() < HEADER_LEN + 4 {
        return Err(Error::Parse { line: 0, message: "STL file too short".into() });
    }
    let count = u32::from_le_bytes(bytes[HEADER_LEN..HEADER_LEN + 4].try_into().expect("4 bytes"));
    let expected = HEADER_LEN + 4 + count as usize * FACE_LEN;
    if bytes.len() != expected {
        if bytes.starts_with(b"solid") {
            return Err(Error::InputInvalid("ASCII STL is not supported".into()));
        }
        return Err(Error::Parse {
            line: 0,
            message: format!("STL size mismatch: {} bytes for {count} faces", bytes.len()),
        });
    }

    let mut vl = VertexList::new(3, Primitive::Triangles)?;
    for f in 0..count as usize {
        let at = HEADER_LEN + 4 + f * FACE_LEN;
        let mut floats = [0.0f32; 12];
        for (i, slot) in floats.iter_mut().enumerate() {
            let o = at + i * 4;
            *slot = f32::from_le_bytes(bytes[o..o + 4].try_into().expect("4 bytes"));
        }
        let stored = glam::Vec3::from_slice(&floats[0..3]);
        let mut tri = [
            glam::Vec3::from_slice(&floats[3..6]) * scale,
            glam::Vec3::from_slice(&floats[6..9]) * scale,
            glam::Vec3::from_slice(&floats[9..12]) * scale,
        ];
        // Trust the stored normal over the stored winding.
        let computed = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
        if computed.dot(stored) < 0.0 {
            tri.swap(1, 2);
        }
        for p in tri {
            vl.add(&[p.x, p.y, p.z])?;
        }
    }
    Ok(vec![vl])
}

pub fn write(path: &Path, vl: &VertexList, scale: f32) -> Result<()> {
    vl.expect_triangles(3, "STL output")?;
    let tris: Vec<[u32; 3]> = vl.triangles().collect();
    let mut bytes = Vec::with_capacity(HEADER_LEN + 4 + tris.len() * FACE_LEN);
    let mut header = [0u8; HEADER_LEN];
    let tag = b"polyhedra binary stl";
    header[..tag.len()].copy_from_slice(tag);
    bytes.extend_from_slice(&header);
    let count = u32::try_from(tris.len())
        .map_err(|_| Error::Capacity("too many faces for STL".into()))?;
    bytes.extend_from_slice(&count.to_le_bytes());
    for [a, b, c] in tris {
        let (pa, pb, pc) = (vl.pos(a) * scale, vl.pos(b) * scale, vl.pos(c) * scale);
        let normal = (pb - pa).cross(pc - pa).normalize_or_zero();
        for v in [normal, pa, pb, pc] {
            for f in [v.x, v.y, v.z] {
                bytes.extend_from_slice(&f.to_le_bytes());
            }
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
    }
    fs::write(path, bytes)?;
    Ok(())
}
