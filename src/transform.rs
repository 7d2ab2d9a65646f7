use glam::{Quat, Vec3};

use crate::error::Result;
use crate::vertex_list::VertexList;

/// Rigid-body transform: rotate, then offset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub rot: Quat,
    pub offset: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform { rot: Quat::IDENTITY, offset: Vec3::ZERO };

    pub fn translation(offset: Vec3) -> Self {
        Transform { rot: Quat::IDENTITY, offset }
    }

    /// Rotation of `angle` radians about `axis` (normalized here).
    pub fn rotation(angle: f32, axis: Vec3) -> Self {
        Transform { rot: Quat::from_axis_angle(axis.normalize(), angle), offset: Vec3::ZERO }
    }

    pub fn from_quat(rot: Quat) -> Self {
        Transform { rot, offset: Vec3::ZERO }
    }

    /// The transform equivalent to applying `self` first, then `next`.
    pub fn then(&self, next: &Transform) -> Transform {
        Transform {
            rot: (next.rot * self.rot).normalize(),
            offset: next.rot * self.offset + next.offset,
        }
    }

    pub fn inverse(&self) -> Transform {
        let inv = self.rot.conjugate();
        Transform { rot: inv, offset: -(inv * self.offset) }
    }

    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        self.rot * p + self.offset
    }

    /// Rotation only, no offset. For directions and normals.
    pub fn apply_vector(&self, v: Vec3) -> Vec3 {
        self.rot * v
    }

    /// Transform the first three floats of every vertex record; any further
    /// floats (uv, normals beyond the position) are copied through.
    pub fn apply_to_list(&self, vl: &VertexList) -> Result<VertexList> {
        let mut out = VertexList::new(vl.floats_per_vert(), vl.primitive())?;
        // Appending without dedup keeps the vertex numbering 1:1 with the
        // input, so the index array can be replayed verbatim below.
        out.finalize();
        let fpv = vl.floats_per_vert();
        for i in 0..vl.vert_count() {
            let rec = vl.vert(i);
            if fpv >= 3 {
                let p = self.apply_point(Vec3::new(rec[0], rec[1], rec[2]));
                let mut moved = rec.to_vec();
                moved[0] = p.x;
                moved[1] = p.y;
                moved[2] = p.z;
                out.add(&moved)?;
            } else {
                out.add(rec)?;
            }
        }
        out.clear_indices();
        for &idx in vl.indices() {
            out.add_index(idx)?;
        }
        Ok(out)
    }
}
