#[cfg(test)]
mod tests;

use std::collections::HashMap;
use glam::{Vec2, Vec3};

use crate::error::{Error, Result};

/// What the index array of a [`VertexList`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Points,
    Lines,
    Triangles,
    Unspecified,
}

/// Indexed vertex buffer with optional on-add geometric de-duplication.
///
/// Vertices are flat `f32` records of a fixed width. Two records are the
/// same vertex exactly when their byte representations match; the dedup map
/// is keyed by those bytes, hashed with the standard library's per-process
/// randomized SipHash.
#[derive(Clone, Debug)]
pub struct VertexList {
    floats_per_vert: usize,
    primitive: Primitive,
    verts: Vec<f32>,
    indices: Vec<u32>,
    dedup: Option<HashMap<Vec<u8>, u32>>,
}

impl VertexList {
    pub fn new(floats_per_vert: usize, primitive: Primitive) -> Result<Self> {
        if floats_per_vert == 0 {
            return Err(Error::InputInvalid("floats_per_vert must be at least 1".into()));
        }
        Ok(VertexList {
            floats_per_vert,
            primitive,
            verts: Vec::new(),
            indices: Vec::new(),
            dedup: Some(HashMap::new()),
        })
    }

    pub fn floats_per_vert(&self) -> usize {
        self.floats_per_vert
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn vert_count(&self) -> u32 {
        (self.verts.len() / self.floats_per_vert) as u32
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vert(&self, index: u32) -> &[f32] {
        let at = index as usize * self.floats_per_vert;
        &self.verts[at..at + self.floats_per_vert]
    }

    /// First three floats of a vertex record as a point. Requires
    /// `floats_per_vert >= 3`.
    pub fn pos(&self, index: u32) -> Vec3 {
        let v = self.vert(index);
        Vec3::new(v[0], v[1], v[2])
    }

    /// First two floats of a vertex record as a 2D point.
    pub fn pos2(&self, index: u32) -> Vec2 {
        let v = self.vert(index);
        Vec2::new(v[0], v[1])
    }

    /// Add a vertex record, de-duplicating against every record added so
    /// far: a byte-identical record returns the existing index. Either way
    /// the resulting index is also appended to the index array.
    pub fn add(&mut self, vert: &[f32]) -> Result<u32> {
        debug_assert_eq!(vert.len(), self.floats_per_vert);
        let index = match self.dedup.take() {
            Some(mut map) => {
                let key: Vec<u8> = vert.iter().flat_map(|f| f.to_ne_bytes()).collect();
                let at = match map.get(&key) {
                    Some(&at) => at,
                    None => {
                        let at = self.next_index()?;
                        map.insert(key, at);
                        self.verts.extend_from_slice(vert);
                        at
                    }
                };
                self.dedup = Some(map);
                at
            }
            // Finalized lists append without de-duplication.
            None => {
                let at = self.next_index()?;
                self.verts.extend_from_slice(vert);
                at
            }
        };
        self.indices.push(index);
        Ok(index)
    }

    pub fn add_point(&mut self, p: Vec3) -> Result<u32> {
        self.add(&[p.x, p.y, p.z])
    }

    pub fn add_point2(&mut self, p: Vec2) -> Result<u32> {
        self.add(&[p.x, p.y])
    }

    /// Append an existing index to the index array. Indices strictly greater
    /// than the current vertex count are out of range; the count itself is
    /// accepted as a sentinel.
    pub fn add_index(&mut self, index: u32) -> Result<u32> {
        if index > self.vert_count() {
            return Err(Error::Capacity(format!(
                "index {index} out of range for {} vertices",
                self.vert_count()
            )));
        }
        self.indices.push(index);
        Ok(index)
    }

    /// Drop the dedup map. Later `add` calls append without checking.
    pub fn finalize(&mut self) {
        self.dedup = None;
    }

    pub(crate) fn clear_indices(&mut self) {
        self.indices.clear();
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }

    pub fn segments(&self) -> impl Iterator<Item = [u32; 2]> + '_ {
        self.indices.chunks_exact(2).map(|c| [c[0], c[1]])
    }

    pub(crate) fn expect_triangles(&self, min_floats: usize, what: &str) -> Result<()> {
        if self.primitive != Primitive::Triangles {
            return Err(Error::InputInvalid(format!("{what} requires a triangle list")));
        }
        if self.floats_per_vert < min_floats {
            return Err(Error::InputInvalid(format!(
                "{what} requires at least {min_floats} floats per vertex, got {}",
                self.floats_per_vert
            )));
        }
        Ok(())
    }

    fn next_index(&self) -> Result<u32> {
        let count = self.verts.len() / self.floats_per_vert;
        u32::try_from(count)
            .ok()
            .filter(|&c| c != u32::MAX)
            .ok_or_else(|| Error::Capacity("vertex index space exhausted".into()))
    }
}
