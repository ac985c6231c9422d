//! Domain mesh model: shared vertex list, per-surface tris/quads, UVs and
//! sparse morph targets.

use crate::util::{BBox3f, Vec2, Vec3};

/// Facets of one arity with optional parallel UV indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Facets<const N: usize> {
    /// Position indices, counter-clockwise winding.
    pub vert_inds: Vec<[u32; N]>,
    /// UV indices: empty, or one entry per `vert_inds` entry.
    pub uv_inds: Vec<[u32; N]>,
}

impl<const N: usize> Facets<N> {
    /// Number of facets.
    #[inline]
    pub fn len(&self) -> usize {
        self.vert_inds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vert_inds.is_empty()
    }

    /// UV indices present and parallel to the position indices.
    #[inline]
    pub fn has_uvs(&self) -> bool {
        !self.vert_inds.is_empty() && self.uv_inds.len() == self.vert_inds.len()
    }

    /// UV indices are either absent or parallel.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.uv_inds.is_empty() || self.uv_inds.len() == self.vert_inds.len()
    }
}

/// A group of polygons sharing one material.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Surface {
    /// Material name.
    pub name: String,
    pub tris: Facets<3>,
    pub quads: Facets<4>,
    /// Texture file name; the image itself is handled elsewhere.
    pub texture: Option<String>,
}

impl Surface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Tris plus quads.
    #[inline]
    pub fn num_facets(&self) -> usize {
        self.tris.len() + self.quads.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tris.is_empty() && self.quads.is_empty()
    }

    /// Every non-empty facet list carries UV indices.
    pub fn has_uvs(&self) -> bool {
        !self.is_empty()
            && (self.tris.is_empty() || self.tris.has_uvs())
            && (self.quads.is_empty() || self.quads.has_uvs())
    }
}

/// Sparse per-vertex position deltas.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MorphTarget {
    pub name: String,
    /// Base vertex indices, parallel to `deltas`.
    pub indices: Vec<u32>,
    pub deltas: Vec<Vec3>,
}

impl MorphTarget {
    /// Accumulate `weight * delta` into `verts`. Indices outside `verts`
    /// are skipped.
    pub fn apply(&self, verts: &mut [Vec3], weight: f32) {
        for (&i, d) in self.indices.iter().zip(&self.deltas) {
            if let Some(v) = verts.get_mut(i as usize) {
                *v += *d * weight;
            }
        }
    }
}

/// Polygonal mesh: one vertex list shared by several surfaces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub surfaces: Vec<Surface>,
    pub morphs: Vec<MorphTarget>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Tris plus quads over all surfaces.
    pub fn num_facets(&self) -> usize {
        self.surfaces.iter().map(Surface::num_facets).sum()
    }

    /// Mesh has texture coordinates and every non-empty surface uses them.
    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
            && self.surfaces.iter().filter(|s| !s.is_empty()).all(Surface::has_uvs)
    }

    /// Bounds of the base shape.
    pub fn bounds(&self) -> BBox3f {
        BBox3f::from_points(&self.vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> Mesh {
        let mut s = Surface::new("skin");
        s.tris.vert_inds.push([0, 1, 2]);
        s.tris.uv_inds.push([0, 1, 2]);
        s.quads.vert_inds.push([0, 1, 2, 3]);
        s.quads.uv_inds.push([0, 1, 2, 3]);
        Mesh {
            name: "head".into(),
            vertices: vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
            uvs: vec![Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y],
            surfaces: vec![s],
            morphs: Vec::new(),
        }
    }

    #[test]
    fn test_counts_and_uvs() {
        let mut m = quad_mesh();
        assert_eq!(m.num_facets(), 2);
        assert!(m.has_uvs());
        m.surfaces[0].quads.uv_inds.clear();
        assert!(!m.has_uvs());
        assert!(m.surfaces[0].quads.is_valid());
        m.surfaces.push(Surface::new("empty"));
        m.surfaces[0].quads.uv_inds.push([0, 1, 2, 3]);
        assert!(m.has_uvs());
    }

    #[test]
    fn test_bounds() {
        let b = quad_mesh().bounds();
        assert_eq!(b.min, Vec3::ZERO);
        assert_eq!(b.max, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_morph_apply() {
        let morph = MorphTarget {
            name: "smile".into(),
            indices: vec![1, 3, 99],
            deltas: vec![Vec3::Z, Vec3::new(0.0, 2.0, 0.0), Vec3::ONE],
        };
        let mut verts = quad_mesh().vertices;
        morph.apply(&mut verts, 0.5);
        assert_eq!(verts[1], Vec3::new(1.0, 0.0, 0.5));
        assert_eq!(verts[3], Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(verts[0], Vec3::ZERO);
    }
}
