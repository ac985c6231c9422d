//! Object tables and the `Connections` edge list.
//!
//! Objects refer to each other only through `C` records in `Connections`:
//!
//! ```text
//! C: "OO", child_id, parent_id              object -> object
//! C: "OP", child_id, parent_id, "Property"  object -> object property
//! ```
//!
//! Geometry links to its model, materials link to the model in surface
//! order, textures link to a material property, and a blend shape is the
//! chain `shape -> channel -> deformer -> geometry`.

use std::collections::HashMap;

use crate::binary::{Document, Record, OBJECTS};
use crate::util::Result;

/// Separator between name and class in binary object names.
pub const NAME_CLASS_SEPARATOR: &str = "\u{0}\u{1}";

/// Display name of an object: strips `"\0\x01Class"` (binary) or
/// `"Class::"` (text) decorations.
pub fn object_name(raw: &str) -> &str {
    if let Some((name, _)) = raw.split_once(NAME_CLASS_SEPARATOR) {
        name
    } else if let Some((_, name)) = raw.split_once("::") {
        name
    } else {
        raw
    }
}

/// Binary form of an object name.
pub fn binary_name(name: &str, class: &str) -> String {
    format!("{}{}{}", name, NAME_CLASS_SEPARATOR, class)
}

/// Edge kind of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
    ObjectObject,
    ObjectProperty,
}

/// One `C` record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub kind: LinkKind,
    pub src: i64,
    pub dst: i64,
    /// Target property name for `OP` edges.
    pub property: Option<String>,
}

impl Connection {
    /// Read a `C` record. Unknown kinds yield `None`.
    pub fn from_record(rec: &Record) -> Result<Option<Self>> {
        let kind = match rec.str_at(0)? {
            "OO" => LinkKind::ObjectObject,
            "OP" => LinkKind::ObjectProperty,
            _ => return Ok(None),
        };
        let property = match kind {
            LinkKind::ObjectProperty if rec.properties.len() > 3 => Some(rec.str_at(3)?.to_string()),
            _ => None,
        };
        Ok(Some(Self {
            kind,
            src: rec.i64_at(1)?,
            dst: rec.i64_at(2)?,
            property,
        }))
    }

    /// Build the record form.
    pub fn to_record(&self) -> Record {
        let rec = Record::new("C");
        let rec = match self.kind {
            LinkKind::ObjectObject => rec.with("OO"),
            LinkKind::ObjectProperty => rec.with("OP"),
        };
        let rec = rec.with(self.src).with(self.dst);
        match &self.property {
            Some(p) => rec.with(p.as_str()),
            None => rec,
        }
    }
}

/// A named object of the `Objects` section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneObject {
    pub id: i64,
    pub name: String,
}

impl SceneObject {
    fn from_record(rec: &Record) -> Result<Self> {
        Ok(Self {
            id: rec.i64_at(0)?,
            name: object_name(rec.str_at(1)?).to_string(),
        })
    }
}

/// Class string (third property) of an object record, if any.
pub fn object_class(rec: &Record) -> Option<&str> {
    rec.properties.get(2).and_then(|p| p.as_str())
}

/// Objects and edges needed to resolve geometry ownership.
#[derive(Clone, Debug, Default)]
pub struct Links {
    models: HashMap<i64, SceneObject>,
    materials: HashMap<i64, SceneObject>,
    textures: HashMap<i64, String>,
    blend_shapes: HashMap<i64, SceneObject>,
    channels: HashMap<i64, SceneObject>,
    connections: Vec<Connection>,
}

impl Links {
    /// Collect mesh models, materials, textures, blend shape deformers and
    /// channels, plus every `OO`/`OP` connection in document order.
    pub fn collect(doc: &Document) -> Result<Self> {
        let mut links = Self::default();

        if let Some(objects) = doc.record(OBJECTS) {
            for rec in &objects.children {
                match (rec.name.as_str(), object_class(rec)) {
                    ("Model", Some("Mesh")) => {
                        let obj = SceneObject::from_record(rec)?;
                        links.models.insert(obj.id, obj);
                    }
                    ("Material", _) => {
                        let obj = SceneObject::from_record(rec)?;
                        links.materials.insert(obj.id, obj);
                    }
                    ("Texture", _) => {
                        let file = ["RelativeFilename", "FileName"]
                            .iter()
                            .filter_map(|n| rec.child_prop(n).and_then(|p| p.as_str()))
                            .find(|f| !f.is_empty());
                        if let Some(file) = file {
                            links.textures.insert(rec.i64_at(0)?, file.to_string());
                        }
                    }
                    ("Deformer", Some("BlendShape")) => {
                        let obj = SceneObject::from_record(rec)?;
                        links.blend_shapes.insert(obj.id, obj);
                    }
                    ("Deformer", Some("BlendShapeChannel")) => {
                        let obj = SceneObject::from_record(rec)?;
                        links.channels.insert(obj.id, obj);
                    }
                    _ => {}
                }
            }
        }

        if let Some(conns) = doc.record("Connections") {
            for rec in conns.children_named("C") {
                if let Some(c) = Connection::from_record(rec)? {
                    links.connections.push(c);
                }
            }
        }

        tracing::debug!(
            models = links.models.len(),
            materials = links.materials.len(),
            connections = links.connections.len(),
            "collected scene links"
        );
        Ok(links)
    }

    /// Connections in document order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    fn object_edges(&self) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(|c| c.kind == LinkKind::ObjectObject)
    }

    /// Mesh model a geometry is attached to.
    pub fn model_of(&self, geometry: i64) -> Option<&SceneObject> {
        self.object_edges()
            .filter(|c| c.src == geometry)
            .find_map(|c| self.models.get(&c.dst))
    }

    /// Materials attached to a model, in connection order.
    pub fn materials_of(&self, model: i64) -> Vec<&SceneObject> {
        self.object_edges()
            .filter(|c| c.dst == model)
            .filter_map(|c| self.materials.get(&c.src))
            .collect()
    }

    /// Texture file feeding a material, preferring the diffuse slot.
    pub fn texture_of(&self, material: i64) -> Option<&str> {
        let mut fallback = None;
        for c in self.connections.iter().filter(|c| c.dst == material) {
            if let Some(file) = self.textures.get(&c.src) {
                if c.property.as_deref() == Some("DiffuseColor") {
                    return Some(file.as_str());
                }
                fallback.get_or_insert(file.as_str());
            }
        }
        fallback
    }

    /// Geometry a shape deforms and the channel naming it, following
    /// `shape -> channel -> blend shape -> geometry`.
    pub fn shape_owner(&self, shape: i64) -> Option<(i64, &SceneObject)> {
        let channel = self
            .object_edges()
            .filter(|c| c.src == shape)
            .find_map(|c| self.channels.get(&c.dst))?;
        let deformer = self
            .object_edges()
            .filter(|c| c.src == channel.id)
            .find_map(|c| self.blend_shapes.get(&c.dst))?;
        let geometry = self.object_edges().find(|c| c.src == deformer.id)?.dst;
        Some((geometry, channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(kind: &str, id: i64, name: &str, class: &str) -> Record {
        Record::new(kind).with(id).with(binary_name(name, kind)).with(class)
    }

    fn oo(src: i64, dst: i64) -> Record {
        Connection { kind: LinkKind::ObjectObject, src, dst, property: None }.to_record()
    }

    fn doc() -> Document {
        let mut d = Document::new(7400);
        let texture = object("Texture", 30, "skin_tex", "")
            .with_child(Record::new("FileName").with("C:/tex/skin.png"))
            .with_child(Record::new("RelativeFilename").with("skin.png"));
        d.records.push(
            Record::new("Objects")
                .with_child(object("Model", 1, "Head", "Mesh"))
                .with_child(object("Model", 2, "Cam", "Camera"))
                .with_child(object("Geometry", 10, "Head", "Mesh"))
                .with_child(object("Material", 20, "skin", ""))
                .with_child(object("Material", 21, "eyes", ""))
                .with_child(texture)
                .with_child(object("Geometry", 40, "smile", "Shape"))
                .with_child(object("Deformer", 41, "smile", "BlendShape"))
                .with_child(object("Deformer", 42, "Smile", "BlendShapeChannel")),
        );
        d.records.push(
            Record::new("Connections")
                .with_child(oo(1, 0))
                .with_child(oo(10, 1))
                .with_child(oo(21, 1))
                .with_child(oo(20, 1))
                .with_child(
                    Connection {
                        kind: LinkKind::ObjectProperty,
                        src: 30,
                        dst: 20,
                        property: Some("DiffuseColor".into()),
                    }
                    .to_record(),
                )
                .with_child(oo(41, 10))
                .with_child(oo(42, 41))
                .with_child(oo(40, 42)),
        );
        d
    }

    #[test]
    fn test_object_name() {
        assert_eq!(object_name("Head\u{0}\u{1}Model"), "Head");
        assert_eq!(object_name("Model::Head"), "Head");
        assert_eq!(object_name("Head"), "Head");
        assert_eq!(binary_name("Head", "Model"), "Head\u{0}\u{1}Model");
    }

    #[test]
    fn test_resolution() {
        let links = Links::collect(&doc()).unwrap();
        assert_eq!(links.connections().len(), 8);

        assert_eq!(links.model_of(10).unwrap().name, "Head");
        assert!(links.model_of(99).is_none());

        let mats: Vec<&str> = links.materials_of(1).iter().map(|m| m.name.as_str()).collect();
        assert_eq!(mats, ["eyes", "skin"]);

        assert_eq!(links.texture_of(20), Some("skin.png"));
        assert_eq!(links.texture_of(21), None);

        let (geometry, channel) = links.shape_owner(40).unwrap();
        assert_eq!(geometry, 10);
        assert_eq!(channel.name, "Smile");
    }

    #[test]
    fn test_connection_record_roundtrip() {
        let c = Connection {
            kind: LinkKind::ObjectProperty,
            src: 5,
            dst: 6,
            property: Some("DiffuseColor".into()),
        };
        assert_eq!(Connection::from_record(&c.to_record()).unwrap(), Some(c));

        let pp = Record::new("C").with("PP").with(1i64).with(2i64);
        assert_eq!(Connection::from_record(&pp).unwrap(), None);
    }

    #[test]
    fn test_connection_wrong_id_type() {
        let bad = Record::new("C").with("OO").with(1i32).with(2i64);
        assert!(Connection::from_record(&bad).is_err());
    }
}
