//! Document to mesh conversion.

use std::collections::HashMap;

use super::links::{object_class, object_name, Links};
use super::mesh::{Mesh, MorphTarget};
use super::polygon::{build_surfaces, split_polygons};
use crate::binary::{Document, Record, GEOMETRY, OBJECTS, VERTICES};
use crate::util::{Result, Vec2, Vec3, Warning};

/// Meshes recovered from a document plus everything that degraded them.
#[derive(Clone, Debug, Default)]
pub struct SceneImport {
    pub meshes: Vec<Mesh>,
    pub warnings: Vec<Warning>,
}

/// One `Geometry` of class `Mesh`, before linkage.
struct GeometryMesh {
    id: i64,
    mesh: Mesh,
    /// Material id per surface, parallel to `mesh.surfaces`.
    material_ids: Vec<i32>,
}

/// Extract every mesh geometry with its surfaces, UVs, material names,
/// textures and blend shapes.
///
/// Coordinates are narrowed from the container's `f64` to `f32`.
///
/// A surface takes its name from the material its id indexes in the
/// model's linked materials, in connection order. Ids are not compacted:
/// with sparse ids such as `[0, 2]` and two linked materials, surface 2
/// finds no material and keeps its default `surface2` name.
pub fn import_meshes(doc: &Document) -> Result<SceneImport> {
    let objects = doc.require(OBJECTS)?;
    let links = Links::collect(doc)?;
    let mut warnings = Vec::new();

    let mut geometries = Vec::new();
    let mut shapes = Vec::new();
    for rec in objects.children_named(GEOMETRY) {
        match object_class(rec) {
            Some("Mesh") => geometries.push(read_mesh_geometry(rec, &mut warnings)?),
            Some("Shape") => shapes.push((rec.i64_at(0)?, read_shape(rec, &mut warnings)?)),
            _ => {}
        }
    }

    for geom in &mut geometries {
        let Some(model) = links.model_of(geom.id) else {
            continue;
        };
        geom.mesh.name = model.name.clone();

        let materials = links.materials_of(model.id);
        if materials.len() > geom.mesh.surfaces.len() {
            Warning::ExcessMaterials {
                model: model.name.clone(),
                linked: materials.len(),
                surfaces: geom.mesh.surfaces.len(),
            }
            .emit(&mut warnings);
        }
        for (surface, &id) in geom.mesh.surfaces.iter_mut().zip(&geom.material_ids) {
            let Some(material) = usize::try_from(id).ok().and_then(|i| materials.get(i)) else {
                continue;
            };
            surface.name = material.name.clone();
            surface.texture = links.texture_of(material.id).map(str::to_string);
        }
    }

    let by_id: HashMap<i64, usize> = geometries
        .iter()
        .enumerate()
        .map(|(i, g)| (g.id, i))
        .collect();
    for (shape_id, mut morph) in shapes {
        let owner = links
            .shape_owner(shape_id)
            .and_then(|(geometry, channel)| Some((*by_id.get(&geometry)?, channel)));
        match owner {
            Some((index, channel)) => {
                morph.name = channel.name.clone();
                geometries[index].mesh.morphs.push(morph);
            }
            None => Warning::OrphanShape { shape: morph.name }.emit(&mut warnings),
        }
    }

    let meshes: Vec<Mesh> = geometries.into_iter().map(|g| g.mesh).collect();
    tracing::debug!(
        meshes = meshes.len(),
        warnings = warnings.len(),
        "imported FBX meshes"
    );
    Ok(SceneImport { meshes, warnings })
}

fn read_mesh_geometry(rec: &Record, warnings: &mut Vec<Warning>) -> Result<GeometryMesh> {
    let id = rec.i64_at(0)?;
    let name = object_name(rec.str_at(1)?).to_string();

    let coords = rec.require_child(VERTICES)?.f64_array_at(0)?;
    if coords.len() % 3 != 0 {
        Warning::RaggedVertexArray {
            geometry: name.clone(),
            len: coords.len(),
        }
        .emit(warnings);
    }
    let vertices = coords
        .chunks_exact(3)
        .map(|c| Vec3::new(c[0] as f32, c[1] as f32, c[2] as f32))
        .collect();

    let indices = rec.require_child("PolygonVertexIndex")?.i32_array_at(0)?;
    let (uvs, uv_indices) = read_uv_layer(rec, &name, indices, warnings)?;
    let materials = read_material_layer(rec)?;

    let polys = split_polygons(indices);
    let groups = build_surfaces(&name, &polys, uv_indices.as_deref(), materials, warnings);
    let (material_ids, surfaces) = groups.into_iter().unzip();

    tracing::debug!(
        geometry = %name,
        polygons = polys.polygons.len(),
        uvs = uv_indices.is_some(),
        "read mesh geometry"
    );

    Ok(GeometryMesh {
        id,
        mesh: Mesh {
            name,
            vertices,
            uvs,
            surfaces,
            morphs: Vec::new(),
        },
        material_ids,
    })
}

/// UV coordinates and per-corner UV indices of the first UV layer.
///
/// Corner indices are only returned when they line up with the position
/// stream; otherwise the geometry loses its UVs with a warning.
fn read_uv_layer(
    geom: &Record,
    geometry: &str,
    indices: &[i32],
    warnings: &mut Vec<Warning>,
) -> Result<(Vec<Vec2>, Option<Vec<i32>>)> {
    let mut layers = geom.children_named("LayerElementUV");
    let Some(layer) = layers.next() else {
        return Ok((Vec::new(), None));
    };
    if layers.next().is_some() || layer.children_named("UVIndex").count() > 1 {
        Warning::DuplicateUvLayer {
            geometry: geometry.to_string(),
        }
        .emit(warnings);
    }

    let uvs: Vec<Vec2> = layer
        .require_child("UV")?
        .f64_array_at(0)?
        .chunks_exact(2)
        .map(|c| Vec2::new(c[0] as f32, c[1] as f32))
        .collect();

    let mapping = layer
        .child_prop("MappingInformationType")
        .and_then(|p| p.as_str())
        .unwrap_or("ByPolygonVertex");
    let direct = layer
        .child_prop("ReferenceInformationType")
        .and_then(|p| p.as_str())
        == Some("Direct");
    let uv_index = match layer.child("UVIndex") {
        Some(r) => Some(r.i32_array_at(0)?),
        None => None,
    };
    let by_vertex = matches!(mapping, "ByVertice" | "ByVertex" | "ByControlPoint");
    let position = |v: i32| if v < 0 { !v } else { v };

    let corners: Option<Vec<i32>> = match (by_vertex, uv_index) {
        (false, Some(idx)) => Some(idx.to_vec()),
        (false, None) if direct => Some((0..indices.len() as i32).collect()),
        (true, None) if direct => Some(indices.iter().map(|&v| position(v)).collect()),
        (true, Some(idx)) => Some(
            indices
                .iter()
                .map(|&v| idx.get(position(v) as usize).copied().unwrap_or(0))
                .collect(),
        ),
        _ => None,
    };

    match corners {
        Some(c) if c.len() != indices.len() => {
            Warning::UvIndexCountMismatch {
                geometry: geometry.to_string(),
                uv_indices: c.len(),
                position_indices: indices.len(),
            }
            .emit(warnings);
            Ok((Vec::new(), None))
        }
        Some(c) => Ok((uvs, Some(c))),
        None => Ok((Vec::new(), None)),
    }
}

/// Per-polygon material indices, honoured only for `ByPolygon` mapping.
fn read_material_layer(geom: &Record) -> Result<Option<&[i32]>> {
    let Some(layer) = geom.child("LayerElementMaterial") else {
        return Ok(None);
    };
    let mapping = layer
        .child_prop("MappingInformationType")
        .and_then(|p| p.as_str());
    if mapping != Some("ByPolygon") {
        return Ok(None);
    }
    match layer.child("Materials") {
        Some(m) => Ok(Some(m.i32_array_at(0)?)),
        None => Ok(None),
    }
}

/// Sparse deltas of a `Shape` geometry, named after the shape until the
/// channel linkage renames it.
fn read_shape(rec: &Record, warnings: &mut Vec<Warning>) -> Result<MorphTarget> {
    let name = object_name(rec.str_at(1)?).to_string();
    let indexes = rec.require_child("Indexes")?.i32_array_at(0)?;
    let deltas = rec.require_child(VERTICES)?.f64_array_at(0)?;

    if indexes.len() * 3 != deltas.len() {
        Warning::MorphLengthMismatch {
            shape: name.clone(),
            indices: indexes.len(),
            deltas: deltas.len() / 3,
        }
        .emit(warnings);
    }

    let (indices, deltas) = indexes
        .iter()
        .zip(deltas.chunks_exact(3))
        .map(|(&i, d)| (i.max(0) as u32, Vec3::new(d[0] as f32, d[1] as f32, d[2] as f32)))
        .unzip();

    Ok(MorphTarget { name, indices, deltas })
}
