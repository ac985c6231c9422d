//! Mesh to document conversion (binary FBX).
//!
//! Per mesh the document gets:
//!
//! ```text
//! Model ──────────────── root (id 0)
//!   └─ Geometry "Mesh"
//!   └─ Material (one per surface, surface order)
//!        └─ Texture ─ Video     (when the surface names a texture)
//! Geometry "Mesh"
//!   └─ Deformer "BlendShape" (one per morph)
//!        └─ SubDeformer "BlendShapeChannel"
//!             └─ Geometry "Shape"
//! ```
//!
//! Ids are handed out sequentially from `ExportOptions::first_id`; import
//! resolves the same edges, so linkage survives a round trip.

use super::links::{binary_name, Connection, LinkKind};
use super::mesh::{Mesh, MorphTarget, Surface};
use super::polygon::encode_polygon;
use crate::binary::{Document, Property, Record, DEFAULT_VERSION, GEOMETRY, OBJECTS, VERTICES};
use crate::util::{Error, Result, Warning};

/// Export settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    /// Format version; 7500 and above switches to 64-bit record fields.
    pub version: u32,
    /// `Creator` string in the header extension.
    pub creator: String,
    /// Ids are allocated from `first_id + 1` upward.
    pub first_id: i64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION,
            creator: format!("fbx-rs {}", env!("CARGO_PKG_VERSION")),
            first_id: 2_740_000,
        }
    }
}

/// Exported document plus any recoverable problems.
#[derive(Clone, Debug)]
pub struct SceneExport {
    pub document: Document,
    pub warnings: Vec<Warning>,
}

/// Build a binary document from meshes with default options.
pub fn export_meshes(meshes: &[Mesh]) -> Result<Document> {
    Ok(export_meshes_with(meshes, &ExportOptions::default())?.document)
}

/// Build a binary document from meshes.
pub fn export_meshes_with(meshes: &[Mesh], opts: &ExportOptions) -> Result<SceneExport> {
    let mut builder = SceneBuilder {
        next_id: opts.first_id,
        objects: Record::new(OBJECTS),
        connections: Vec::new(),
        counts: ObjectCounts::default(),
        warnings: Vec::new(),
    };
    for mesh in meshes {
        builder.add_mesh(mesh)?;
    }

    let mut doc = Document::new(opts.version);
    doc.records.push(header_extension(opts));
    doc.records.push(global_settings());
    doc.records.push(builder.counts.definitions());
    doc.records.push(builder.objects);

    let mut conns = Record::new("Connections");
    for c in &builder.connections {
        conns.push_child(c.to_record());
    }
    doc.records.push(conns);
    doc.records.push(Record::new("Takes").with_child(Record::new("Current").with("")));

    tracing::debug!(
        meshes = meshes.len(),
        objects = builder.counts.total(),
        connections = builder.connections.len(),
        "exported FBX scene"
    );
    Ok(SceneExport {
        document: doc,
        warnings: builder.warnings,
    })
}

#[derive(Default)]
struct ObjectCounts {
    models: usize,
    geometries: usize,
    materials: usize,
    textures: usize,
    videos: usize,
    deformers: usize,
}

impl ObjectCounts {
    fn total(&self) -> usize {
        1 + self.models + self.geometries + self.materials + self.textures + self.videos + self.deformers
    }

    /// `Definitions` section: how many objects of each type follow.
    fn definitions(&self) -> Record {
        let mut defs = Record::new("Definitions")
            .with_child(Record::new("Version").with(100i32))
            .with_child(Record::new("Count").with(self.total() as i32));
        let types = [
            ("GlobalSettings", 1),
            ("Model", self.models),
            ("Geometry", self.geometries),
            ("Material", self.materials),
            ("Texture", self.textures),
            ("Video", self.videos),
            ("Deformer", self.deformers),
        ];
        for (name, count) in types.into_iter().filter(|(_, n)| *n > 0) {
            defs.push_child(
                Record::new("ObjectType")
                    .with(name)
                    .with_child(Record::new("Count").with(count as i32)),
            );
        }
        defs
    }
}

struct SceneBuilder {
    next_id: i64,
    objects: Record,
    connections: Vec<Connection>,
    counts: ObjectCounts,
    warnings: Vec<Warning>,
}

impl SceneBuilder {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn link(&mut self, src: i64, dst: i64) {
        self.connections.push(Connection {
            kind: LinkKind::ObjectObject,
            src,
            dst,
            property: None,
        });
    }

    fn link_property(&mut self, src: i64, dst: i64, property: &str) {
        self.connections.push(Connection {
            kind: LinkKind::ObjectProperty,
            src,
            dst,
            property: Some(property.to_string()),
        });
    }

    fn add_mesh(&mut self, mesh: &Mesh) -> Result<()> {
        let model_id = self.id();
        self.objects.push_child(model_record(model_id, &mesh.name));
        self.counts.models += 1;
        self.link(model_id, 0);

        let geometry_id = self.id();
        let geometry = geometry_record(geometry_id, mesh, &mut self.warnings)
            .map_err(|e| e.in_record(&mesh.name, None))?;
        self.objects.push_child(geometry);
        self.counts.geometries += 1;
        self.link(geometry_id, model_id);

        for (i, surface) in mesh.surfaces.iter().enumerate() {
            self.add_surface(surface, i, mesh, model_id);
        }
        for morph in &mesh.morphs {
            self.add_morph(morph, mesh.vertices.len(), geometry_id)
                .map_err(|e| e.in_record(&morph.name, None))?;
        }
        Ok(())
    }

    fn add_surface(&mut self, surface: &Surface, index: usize, mesh: &Mesh, model_id: i64) {
        let name = if surface.name.is_empty() {
            format!("{}_{}", mesh.name, index)
        } else {
            surface.name.clone()
        };

        let material_id = self.id();
        self.objects.push_child(material_record(material_id, &name));
        self.counts.materials += 1;
        self.link(material_id, model_id);

        if let Some(file) = &surface.texture {
            let texture_id = self.id();
            let video_id = self.id();
            self.objects.push_child(texture_record(texture_id, &name, file));
            self.objects.push_child(video_record(video_id, &name, file));
            self.counts.textures += 1;
            self.counts.videos += 1;
            self.link_property(texture_id, material_id, "DiffuseColor");
            self.link(video_id, texture_id);
        }
    }

    fn add_morph(&mut self, morph: &MorphTarget, num_verts: usize, geometry_id: i64) -> Result<()> {
        let n = morph.indices.len().min(morph.deltas.len());
        let indexes = morph.indices[..n]
            .iter()
            .map(|&i| {
                if i as usize >= num_verts {
                    return Err(Error::invalid(format!(
                        "morph '{}' references vertex {} of {}",
                        morph.name, i, num_verts
                    )));
                }
                i32::try_from(i).map_err(|_| {
                    Error::invalid(format!("morph '{}' has an index beyond i32 range", morph.name))
                })
            })
            .collect::<Result<Vec<i32>>>()?;
        let deltas: Vec<f64> = morph.deltas[..n]
            .iter()
            .flat_map(|d| [d.x as f64, d.y as f64, d.z as f64])
            .collect();

        let shape_id = self.id();
        let deformer_id = self.id();
        let channel_id = self.id();

        self.objects.push_child(
            Record::new(GEOMETRY)
                .with(shape_id)
                .with(binary_name(&morph.name, "Geometry"))
                .with("Shape")
                .with_child(Record::new("Version").with(100i32))
                .with_child(Record::new("Indexes").with(indexes))
                .with_child(Record::new(VERTICES).with(deltas)),
        );
        self.objects.push_child(
            Record::new("Deformer")
                .with(deformer_id)
                .with(binary_name(&morph.name, "Deformer"))
                .with("BlendShape")
                .with_child(Record::new("Version").with(100i32)),
        );
        self.objects.push_child(
            Record::new("Deformer")
                .with(channel_id)
                .with(binary_name(&morph.name, "SubDeformer"))
                .with("BlendShapeChannel")
                .with_child(Record::new("Version").with(100i32))
                .with_child(Record::new("DeformPercent").with(0.0f64))
                .with_child(Record::new("FullWeights").with(vec![100.0f64])),
        );
        self.counts.geometries += 1;
        self.counts.deformers += 2;

        self.link(deformer_id, geometry_id);
        self.link(channel_id, deformer_id);
        self.link(shape_id, channel_id);
        Ok(())
    }
}

/// `P` entry of a `Properties70` block.
fn p70(name: &str, ty: &str, label: &str, flags: &str, values: Vec<Property>) -> Record {
    let mut p = Record::new("P").with(name).with(ty).with(label).with(flags);
    p.properties.extend(values);
    p
}

fn header_extension(opts: &ExportOptions) -> Record {
    Record::new("FBXHeaderExtension")
        .with_child(Record::new("FBXHeaderVersion").with(1003i32))
        .with_child(Record::new("FBXVersion").with(opts.version as i32))
        .with_child(Record::new("Creator").with(opts.creator.as_str()))
}

fn global_settings() -> Record {
    let int = |name: &str, v: i32| p70(name, "int", "Integer", "", vec![v.into()]);
    Record::new("GlobalSettings")
        .with_child(Record::new("Version").with(1000i32))
        .with_child(
            Record::new("Properties70")
                .with_child(int("UpAxis", 1))
                .with_child(int("UpAxisSign", 1))
                .with_child(int("FrontAxis", 2))
                .with_child(int("FrontAxisSign", 1))
                .with_child(int("CoordAxis", 0))
                .with_child(int("CoordAxisSign", 1))
                .with_child(p70("UnitScaleFactor", "double", "Number", "", vec![1.0f64.into()])),
        )
}

fn model_record(id: i64, name: &str) -> Record {
    let zero3 = || vec![0.0f64.into(), 0.0f64.into(), 0.0f64.into()];
    Record::new("Model")
        .with(id)
        .with(binary_name(name, "Model"))
        .with("Mesh")
        .with_child(Record::new("Version").with(232i32))
        .with_child(
            Record::new("Properties70")
                .with_child(p70("ScalingMax", "Vector3D", "Vector", "", zero3()))
                .with_child(p70("DefaultAttributeIndex", "int", "Integer", "", vec![0i32.into()]))
                .with_child(p70("Lcl Translation", "Lcl Translation", "", "A", zero3())),
        )
        .with_child(Record::new("Shading").with(true))
        .with_child(Record::new("Culling").with("CullingOff"))
}

fn material_record(id: i64, name: &str) -> Record {
    let rgb = |r: f64, g: f64, b: f64| vec![r.into(), g.into(), b.into()];
    let num = |v: f64| vec![v.into()];
    Record::new("Material")
        .with(id)
        .with(binary_name(name, "Material"))
        .with("")
        .with_child(Record::new("Version").with(102i32))
        .with_child(Record::new("ShadingModel").with("phong"))
        .with_child(Record::new("MultiLayer").with(0i32))
        .with_child(
            Record::new("Properties70")
                .with_child(p70("ShadingModel", "KString", "", "", vec!["phong".into()]))
                .with_child(p70("AmbientColor", "Color", "", "A", rgb(1.0, 1.0, 1.0)))
                .with_child(p70("DiffuseColor", "Color", "", "A", rgb(1.0, 1.0, 1.0)))
                .with_child(p70("SpecularColor", "Color", "", "A", rgb(0.0, 0.0, 0.0)))
                .with_child(p70("ShininessExponent", "Number", "", "A", num(0.5)))
                .with_child(p70("Opacity", "double", "Number", "", num(1.0)))
                .with_child(p70("Reflectivity", "double", "Number", "", num(0.0))),
        )
}

fn texture_record(id: i64, name: &str, file: &str) -> Record {
    Record::new("Texture")
        .with(id)
        .with(binary_name(name, "Texture"))
        .with("")
        .with_child(Record::new("Type").with("TextureVideoClip"))
        .with_child(Record::new("Version").with(202i32))
        .with_child(Record::new("TextureName").with(binary_name(name, "Texture")))
        .with_child(Record::new("Media").with(binary_name(name, "Video")))
        .with_child(Record::new("FileName").with(file))
        .with_child(Record::new("RelativeFilename").with(file))
}

fn video_record(id: i64, name: &str, file: &str) -> Record {
    Record::new("Video")
        .with(id)
        .with(binary_name(name, "Video"))
        .with("Clip")
        .with_child(Record::new("Type").with("Clip"))
        .with_child(Record::new("FileName").with(file))
        .with_child(Record::new("RelativeFilename").with(file))
}

fn layer_element(kind: &str) -> Record {
    Record::new("LayerElement")
        .with_child(Record::new("Type").with(kind))
        .with_child(Record::new("TypedIndex").with(0i32))
}

/// Base mesh geometry: positions, polygon stream, UV and material layers.
fn geometry_record(id: i64, mesh: &Mesh, warnings: &mut Vec<Warning>) -> Result<Record> {
    let num_verts = mesh.vertices.len();
    let vertices: Vec<f64> = mesh
        .vertices
        .iter()
        .flat_map(|v| [v.x as f64, v.y as f64, v.z as f64])
        .collect();

    let export_uvs = uv_export_check(mesh, warnings);

    let mut polygon_index = Vec::new();
    let mut uv_index = Vec::new();
    let mut materials = Vec::new();
    for (s, surface) in mesh.surfaces.iter().enumerate() {
        let tris = surface.tris.vert_inds.iter().map(|f| &f[..]);
        let quads = surface.quads.vert_inds.iter().map(|f| &f[..]);
        for verts in tris.chain(quads) {
            if let Some(&bad) = verts.iter().find(|&&v| v as usize >= num_verts) {
                return Err(Error::invalid(format!(
                    "surface '{}' references vertex {} of {}",
                    surface.name, bad, num_verts
                )));
            }
            encode_polygon(verts, &mut polygon_index).ok_or_else(|| {
                Error::invalid(format!("surface '{}' has an index beyond i32 range", surface.name))
            })?;
            materials.push(s as i32);
        }
        if export_uvs {
            let tris = surface.tris.uv_inds.iter().flat_map(|f| f.iter());
            let quads = surface.quads.uv_inds.iter().flat_map(|f| f.iter());
            uv_index.extend(tris.chain(quads).map(|&i| i as i32));
        }
    }

    let mut geom = Record::new(GEOMETRY)
        .with(id)
        .with(binary_name(&mesh.name, "Geometry"))
        .with("Mesh")
        .with_child(Record::new(VERTICES).with(vertices))
        .with_child(Record::new("PolygonVertexIndex").with(polygon_index))
        .with_child(Record::new("GeometryVersion").with(124i32));

    if export_uvs {
        let uvs: Vec<f64> = mesh
            .uvs
            .iter()
            .flat_map(|uv| [uv.x as f64, uv.y as f64])
            .collect();
        geom.push_child(
            Record::new("LayerElementUV")
                .with(0i32)
                .with_child(Record::new("Version").with(101i32))
                .with_child(Record::new("Name").with("UVs"))
                .with_child(Record::new("MappingInformationType").with("ByPolygonVertex"))
                .with_child(Record::new("ReferenceInformationType").with("IndexToDirect"))
                .with_child(Record::new("UV").with(uvs))
                .with_child(Record::new("UVIndex").with(uv_index)),
        );
    }

    let (mapping, materials) = if mesh.surfaces.len() > 1 {
        ("ByPolygon", materials)
    } else {
        ("AllSame", vec![0])
    };
    geom.push_child(
        Record::new("LayerElementMaterial")
            .with(0i32)
            .with_child(Record::new("Version").with(101i32))
            .with_child(Record::new("Name").with(""))
            .with_child(Record::new("MappingInformationType").with(mapping))
            .with_child(Record::new("ReferenceInformationType").with("IndexToDirect"))
            .with_child(Record::new("Materials").with(materials)),
    );

    let mut layer = Record::new("Layer")
        .with(0i32)
        .with_child(Record::new("Version").with(100i32))
        .with_child(layer_element("LayerElementMaterial"));
    if export_uvs {
        layer.push_child(layer_element("LayerElementUV"));
    }
    geom.push_child(layer);

    Ok(geom)
}

/// Whether the UV layer can be written faithfully; warns when a mesh has
/// UVs that cannot be.
fn uv_export_check(mesh: &Mesh, warnings: &mut Vec<Warning>) -> bool {
    if mesh.uvs.is_empty() {
        return false;
    }
    let reason = if !mesh.has_uvs() {
        Some("some facets lack UV indices")
    } else {
        let num_uvs = mesh.uvs.len();
        let out_of_range = mesh.surfaces.iter().any(|s| {
            s.tris.uv_inds.iter().flatten().chain(s.quads.uv_inds.iter().flatten())
                .any(|&i| i as usize >= num_uvs)
        });
        out_of_range.then_some("UV index out of range")
    };
    match reason {
        Some(reason) => {
            Warning::UvsNotExported {
                mesh: mesh.name.clone(),
                reason,
            }
            .emit(warnings);
            false
        }
        None => true,
    }
}
