//! Whole FBX binary documents: header, version, top-level records, footer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;

use super::format::*;
use super::record::Record;
use super::stream::ByteReader;
use super::value::{Property, TypeCode};
use crate::util::{Error, Result, Warning};

/// A parsed or freshly built FBX binary document.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    /// Magic plus padding, copied verbatim.
    pub header: Vec<u8>,
    /// Format version; selects the width mode.
    pub version: u32,
    /// Top-level records in file order.
    pub records: Vec<Record>,
    /// Bytes after the top-level terminator, opaque.
    pub footer: Vec<u8>,
}

impl Document {
    /// Empty document with the standard header and footer.
    pub fn new(version: u32) -> Self {
        Self {
            header: FBX_HEADER.to_vec(),
            version,
            records: Vec::new(),
            footer: standard_footer(version),
        }
    }

    /// Codec context for this document's version.
    #[inline]
    pub fn context(&self) -> CodecContext {
        CodecContext::for_version(self.version)
    }

    /// Width mode for this document's version.
    #[inline]
    pub fn width(&self) -> Width {
        self.context().width
    }

    /// Parse a document from an in-memory buffer.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FBX_MAGIC.len() || &bytes[..FBX_MAGIC.len()] != FBX_MAGIC {
            return Err(Error::NotThisFormat);
        }

        let mut r = ByteReader::new(bytes);
        let header = r.take(HEADER_SIZE)?.to_vec();
        let version = r.read_u32()?;
        let ctx = CodecContext::for_version(version);

        let mut records = Vec::new();
        while let Some(rec) = Record::read(&mut r, ctx, 0)? {
            records.push(rec);
        }
        let footer = r.rest().to_vec();

        tracing::debug!(
            version,
            width = ?ctx.width,
            records = records.len(),
            footer = footer.len(),
            "loaded FBX document ({} bytes)",
            bytes.len()
        );

        Ok(Self { header, version, records, footer })
    }

    /// Open and parse a file through a read-only memory map.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        if file.metadata()?.len() == 0 {
            return Err(Error::NotThisFormat);
        }
        // Safety: the map is read-only and dropped before this call returns.
        let mmap = unsafe { Mmap::map(&file) }?;
        Self::load(&mmap)
    }

    /// Serialize, recomputing every end offset.
    pub fn save(&self) -> Result<Vec<u8>> {
        let ctx = self.context();
        let mut out = Vec::with_capacity(self.header.len() + 4 + self.footer.len());
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.version.to_le_bytes());
        for rec in &self.records {
            rec.write(&mut out, ctx)?;
        }
        out.resize(out.len() + ctx.terminator_len(), 0);
        out.extend_from_slice(&self.footer);

        tracing::debug!(
            version = self.version,
            records = self.records.len(),
            "saved FBX document ({} bytes)",
            out.len()
        );
        Ok(out)
    }

    /// Serialize and write to a file in one pass.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.save()?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// First top-level record with the given name.
    pub fn record(&self, name: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.name == name)
    }

    /// First top-level record with the given name, mutable.
    pub fn record_mut(&mut self, name: &str) -> Option<&mut Record> {
        self.records.iter_mut().find(|r| r.name == name)
    }

    /// First top-level record with the given name, or `RecordNotFound`.
    pub fn require(&self, name: &str) -> Result<&Record> {
        self.record(name)
            .ok_or_else(|| Error::RecordNotFound(name.to_string()))
    }

    /// Recompute every record's end offset for the current contents.
    /// Returns the position of the top-level terminator.
    pub fn layout(&mut self) -> u64 {
        let ctx = self.context();
        let mut pos = (self.header.len() + 4) as u64;
        for rec in &mut self.records {
            pos = rec.layout(pos, ctx);
        }
        pos
    }

    /// Overwrite the vertex arrays of every mesh geometry, in document
    /// order, from a flat coordinate stream.
    ///
    /// Each geometry consumes exactly as many coordinates as its array
    /// already holds. Too few coordinates fail before anything is modified;
    /// leftovers are reported as a warning. Only vertex payloads change,
    /// then offsets are recomputed.
    pub fn inject_vertices(&mut self, coords: &[f64]) -> Result<Vec<Warning>> {
        let mut needed = 0usize;
        for geom in mesh_geometries(self) {
            let verts = geom.require_child(VERTICES).map_err(|e| e.in_record(&geom.name, None))?;
            needed += vertex_array_len(verts)?;
        }
        if coords.len() < needed {
            return Err(Error::InsufficientData {
                needed,
                available: coords.len(),
            });
        }

        let mut cursor = coords;
        if let Some(objects) = self.record_mut(OBJECTS) {
            for geom in objects.children.iter_mut().filter(|g| is_mesh_geometry(g)) {
                let Some(verts) = geom.child_mut(VERTICES) else {
                    continue;
                };
                let (head, tail) = cursor.split_at(vertex_array_len(verts)?);
                match verts.properties.first_mut() {
                    Some(Property::F64Array(v)) => v.copy_from_slice(head),
                    Some(Property::F32Array(v)) => {
                        for (dst, src) in v.iter_mut().zip(head) {
                            *dst = *src as f32;
                        }
                    }
                    _ => {}
                }
                cursor = tail;
            }
        }

        let mut warnings = Vec::new();
        if !cursor.is_empty() {
            Warning::LeftoverCoordinates { unused: cursor.len() }.emit(&mut warnings);
        }
        self.layout();
        tracing::debug!(injected = needed, "vertex injection complete");
        Ok(warnings)
    }
}

fn is_mesh_geometry(rec: &Record) -> bool {
    rec.name == GEOMETRY
        && rec.properties.get(2).and_then(Property::as_str) == Some("Mesh")
}

fn mesh_geometries(doc: &Document) -> impl Iterator<Item = &Record> {
    doc.record(OBJECTS)
        .into_iter()
        .flat_map(|objects| objects.children.iter())
        .filter(|g| is_mesh_geometry(g))
}

/// Element count of a `Vertices` record holding a `d` or `f` array.
fn vertex_array_len(verts: &Record) -> Result<usize> {
    match verts.prop(0)? {
        Property::F64Array(v) => Ok(v.len()),
        Property::F32Array(v) => Ok(v.len()),
        other => Err(Error::TypeMismatch {
            expected: TypeCode::F64Array.as_char(),
            actual: other.type_code().as_char(),
        }
        .in_record(&verts.name, Some(0))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(version: u32) -> Document {
        let mut d = Document::new(version);
        d.records.push(
            Record::new("FBXHeaderExtension")
                .with_child(Record::new("FBXVersion").with(version as i32)),
        );
        d.records.push(Record::new("Objects").with_child(
            Record::new("Geometry")
                .with(1i64)
                .with("g\u{0}\u{1}Geometry")
                .with("Mesh")
                .with_child(Record::new("Vertices").with(vec![0.0f64; 6])),
        ));
        d
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(Document::load(b"Kaydara FBX ASCII"), Err(Error::NotThisFormat)));
        assert!(matches!(Document::load(b""), Err(Error::NotThisFormat)));
    }

    #[test]
    fn test_truncated_header() {
        let err = Document::load(b"Kaydara FBX Binary  \x00").unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof(_)));
    }

    #[test]
    fn test_save_load_identity() {
        for version in [7400, 7500] {
            let d = doc(version);
            let bytes = d.save().unwrap();
            let back = Document::load(&bytes).unwrap();
            assert_eq!(back, d);
            assert_eq!(back.save().unwrap(), bytes);
        }
    }

    #[test]
    fn test_layout_matches_saved_offsets() {
        let mut d = doc(7500);
        let terminator_at = d.layout();
        let bytes = d.save().unwrap();
        let back = Document::load(&bytes).unwrap();
        let laid: Vec<u64> = d.records.iter().flat_map(|r| r.descendants()).map(Record::end_offset).collect();
        let read: Vec<u64> = back.records.iter().flat_map(|r| r.descendants()).map(Record::end_offset).collect();
        assert_eq!(laid, read);
        assert_eq!(terminator_at as usize + 25 + d.footer.len(), bytes.len());
    }

    #[test]
    fn test_missing_sentinel() {
        let bytes = doc(7400).save().unwrap();
        // cut inside the top-level terminator
        let cut = &bytes[..bytes.len() - doc(7400).footer.len() - 5];
        assert!(matches!(Document::load(cut), Err(Error::UnexpectedEof(_))));
    }

    #[test]
    fn test_inject_rejects_wrong_vertex_type() {
        let mut d = doc(7400);
        d.records[1].children[0].children[0].properties[0] = Property::I32Array(vec![0; 6]);
        let err = d.inject_vertices(&[0.0; 6]).unwrap_err();
        assert!(matches!(err.root_cause(), Error::TypeMismatch { expected: 'd', actual: 'i' }));
    }

    #[test]
    fn test_inject_f32_vertices() {
        let mut d = doc(7400);
        d.records[1].children[0].children[0].properties[0] = Property::F32Array(vec![0.0; 6]);
        let warnings = d.inject_vertices(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(
            d.records[1].children[0].children[0].properties[0],
            Property::F32Array(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        );
    }
}
