//! Records: the nodes of the FBX binary tree.
//!
//! ```text
//! +-------------------------+
//! | end_offset     u32/u64  |  absolute position after subtree + terminator
//! | num_properties u32/u64  |
//! | property_bytes u32/u64  |
//! | name_len       u8       |
//! | name           bytes    |
//! +-------------------------+
//! | properties              |  property_bytes long
//! +-------------------------+
//! | children ...            |
//! | terminator (if any)     |  13 or 25 zero bytes
//! +-------------------------+
//! ```
//!
//! A header whose `end_offset` is zero is the sentinel closing a sibling list.

use super::format::{CodecContext, MAX_DEPTH};
use super::stream::{patch_field, write_field, ByteReader};
use super::value::{Property, TypeCode};
use crate::util::{Error, Result};

/// One node of the tree: name, ordered properties, ordered children.
#[derive(Clone, Debug, Default)]
pub struct Record {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<Record>,
    /// Encoding artifact: where this record ended when last read or laid out.
    end_offset: u64,
}

/// Equality is structural; `end_offset` is ignored.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.properties == other.properties
            && self.children == other.children
    }
}

impl Record {
    /// Create an empty record.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder: append a property.
    pub fn with(mut self, prop: impl Into<Property>) -> Self {
        self.properties.push(prop.into());
        self
    }

    /// Builder: append a child record.
    pub fn with_child(mut self, child: Record) -> Self {
        self.children.push(child);
        self
    }

    /// Append a property.
    pub fn push(&mut self, prop: impl Into<Property>) {
        self.properties.push(prop.into());
    }

    /// Append a child record.
    pub fn push_child(&mut self, child: Record) {
        self.children.push(child);
    }

    /// Absolute end position from the last read or layout pass.
    #[inline]
    pub fn end_offset(&self) -> u64 {
        self.end_offset
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Record> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First child with the given name, mutable.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Record> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// First child with the given name, or `RecordNotFound`.
    pub fn require_child(&self, name: &str) -> Result<&Record> {
        self.child(name)
            .ok_or_else(|| Error::RecordNotFound(format!("{}/{}", self.name, name)))
    }

    /// All children with the given name, in order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// This record and all descendants, depth-first pre-order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Property at `index`.
    pub fn prop(&self, index: usize) -> Result<&Property> {
        self.properties.get(index).ok_or_else(|| {
            Error::PropertyOutOfRange {
                index,
                count: self.properties.len(),
            }
            .in_record(&self.name, Some(index))
        })
    }

    /// Property at `index`, which must carry type `code`.
    pub fn expect(&self, index: usize, code: TypeCode) -> Result<&Property> {
        let prop = self.prop(index)?;
        if prop.type_code() != code {
            return Err(Error::TypeMismatch {
                expected: code.as_char(),
                actual: prop.type_code().as_char(),
            }
            .in_record(&self.name, Some(index)));
        }
        Ok(prop)
    }

    /// First property of the named child, the usual shape of FBX leaves.
    pub fn child_prop(&self, name: &str) -> Option<&Property> {
        self.child(name).and_then(|c| c.properties.first())
    }

    pub fn i32_at(&self, index: usize) -> Result<i32> {
        self.typed(index, TypeCode::I32, Property::as_i32)
    }

    pub fn i64_at(&self, index: usize) -> Result<i64> {
        self.typed(index, TypeCode::I64, Property::as_i64)
    }

    pub fn f64_at(&self, index: usize) -> Result<f64> {
        self.typed(index, TypeCode::F64, Property::as_f64)
    }

    pub fn str_at(&self, index: usize) -> Result<&str> {
        self.typed(index, TypeCode::String, Property::as_str)
    }

    pub fn i32_array_at(&self, index: usize) -> Result<&[i32]> {
        self.typed(index, TypeCode::I32Array, Property::as_i32_slice)
    }

    pub fn f64_array_at(&self, index: usize) -> Result<&[f64]> {
        self.typed(index, TypeCode::F64Array, Property::as_f64_slice)
    }

    fn typed<'a, T>(
        &'a self,
        index: usize,
        code: TypeCode,
        get: impl FnOnce(&'a Property) -> Option<T>,
    ) -> Result<T> {
        let prop = self.expect(index, code)?;
        get(prop).ok_or_else(|| {
            Error::TypeMismatch {
                expected: code.as_char(),
                actual: prop.type_code().as_char(),
            }
            .in_record(&self.name, Some(index))
        })
    }

    /// Read one record (or the sentinel, returned as `None`).
    pub(crate) fn read(r: &mut ByteReader<'_>, ctx: CodecContext, depth: usize) -> Result<Option<Self>> {
        if depth > MAX_DEPTH {
            return Err(Error::NestingTooDeep(MAX_DEPTH));
        }

        let end_offset = r.read_field(ctx)?;
        let num_properties = r.read_field(ctx)?;
        let property_bytes = r.read_field(ctx)?;
        let name_len = r.read_u8()? as usize;
        if end_offset == 0 {
            return Ok(None);
        }

        let name = String::from_utf8(r.take(name_len)?.to_vec())?;
        if end_offset < r.pos() || end_offset > r.len() {
            return Err(Error::CorruptEndOffset { end: end_offset, pos: r.pos() }
                .in_record(&name, None));
        }

        let props_start = r.pos();
        // Smallest property is 2 bytes; garbage header fields must not drive the reservation.
        let max_props = property_bytes.min(r.remaining()) / 2;
        let mut properties = Vec::with_capacity(num_properties.min(max_props) as usize);
        for i in 0..num_properties as usize {
            let prop = Property::read(r).map_err(|e| e.in_record(&name, Some(i)))?;
            properties.push(prop);
        }
        let consumed = r.pos() - props_start;
        if consumed != property_bytes {
            return Err(Error::CorruptPropertyListLength {
                declared: property_bytes,
                actual: consumed,
            }
            .in_record(&name, None));
        }
        if r.pos() > end_offset {
            return Err(Error::CorruptEndOffset { end: end_offset, pos: r.pos() }
                .in_record(&name, None));
        }

        let mut children = Vec::new();
        while r.pos() + (ctx.terminator_len() as u64) < end_offset {
            match Self::read(r, ctx, depth + 1).map_err(|e| e.in_record(&name, None))? {
                Some(child) => children.push(child),
                None => break,
            }
            if r.pos() > end_offset {
                return Err(Error::CorruptEndOffset { end: end_offset, pos: r.pos() }
                    .in_record(&name, None));
            }
        }
        // Writers disagree on terminators after empty child lists; the end
        // offset is the only reliable resync point. It never moves backwards.
        if r.pos() > end_offset {
            return Err(Error::CorruptEndOffset { end: end_offset, pos: r.pos() }
                .in_record(&name, None));
        }
        r.seek(end_offset)?;

        Ok(Some(Self {
            name,
            properties,
            children,
            end_offset,
        }))
    }

    /// Append this record at the end of `out`, whose length is the absolute
    /// position, then back-patch the end offset once the subtree is written.
    pub(crate) fn write(&self, out: &mut Vec<u8>, ctx: CodecContext) -> Result<()> {
        if self.name.len() > u8::MAX as usize {
            return Err(Error::NameTooLong(self.name.len()));
        }

        let mut props = Vec::with_capacity(self.properties_len());
        for (i, prop) in self.properties.iter().enumerate() {
            prop.write(&mut props).map_err(|e| e.in_record(&self.name, Some(i)))?;
        }

        let start = out.len();
        write_field(out, ctx, 0)?;
        write_field(out, ctx, self.properties.len() as u64)?;
        write_field(out, ctx, props.len() as u64)?;
        out.push(self.name.len() as u8);
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&props);

        for child in &self.children {
            child.write(out, ctx).map_err(|e| e.in_record(&self.name, None))?;
        }
        if !self.children.is_empty() {
            out.resize(out.len() + ctx.terminator_len(), 0);
        }

        let end = out.len() as u64;
        patch_field(out, start, ctx, end).map_err(|e| e.in_record(&self.name, None))
    }

    /// Recompute `end_offset` for this subtree as if written at `start`.
    /// Returns the end position.
    pub(crate) fn layout(&mut self, start: u64, ctx: CodecContext) -> u64 {
        let mut pos = start + (ctx.header_len() + self.name.len() + self.properties_len()) as u64;
        for child in &mut self.children {
            pos = child.layout(pos, ctx);
        }
        if !self.children.is_empty() {
            pos += ctx.terminator_len() as u64;
        }
        self.end_offset = pos;
        pos
    }

    fn properties_len(&self) -> usize {
        self.properties.iter().map(Property::encoded_len).sum()
    }
}

/// Pre-order iterator over a record subtree.
pub struct Descendants<'a> {
    stack: Vec<&'a Record>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Record;

    fn next(&mut self) -> Option<Self::Item> {
        let rec = self.stack.pop()?;
        self.stack.extend(rec.children.iter().rev());
        Some(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NARROW: CodecContext = CodecContext::for_version(7400);
    const WIDE: CodecContext = CodecContext::for_version(7500);

    fn sample() -> Record {
        Record::new("Geometry")
            .with(42i64)
            .with("Cube\u{0}\u{1}Geometry")
            .with("Mesh")
            .with_child(Record::new("Vertices").with(vec![0.0f64, 1.0, 2.0]))
            .with_child(
                Record::new("LayerElementUV")
                    .with(0i32)
                    .with_child(Record::new("Version").with(101i32)),
            )
    }

    fn write_one(rec: &Record, ctx: CodecContext) -> Vec<u8> {
        let mut out = Vec::new();
        rec.write(&mut out, ctx).unwrap();
        out
    }

    #[test]
    fn test_write_read() {
        for ctx in [NARROW, WIDE] {
            let rec = sample();
            let bytes = write_one(&rec, ctx);
            let mut r = ByteReader::new(&bytes);
            let back = Record::read(&mut r, ctx, 0).unwrap().unwrap();
            assert_eq!(back, rec);
            assert_eq!(back.end_offset(), bytes.len() as u64);
            assert_eq!(r.pos(), bytes.len() as u64);
        }
    }

    #[test]
    fn test_layout_matches_writer() {
        for ctx in [NARROW, WIDE] {
            let mut rec = sample();
            let bytes = write_one(&rec, ctx);
            let back = Record::read(&mut ByteReader::new(&bytes), ctx, 0).unwrap().unwrap();

            assert_eq!(rec.layout(0, ctx), bytes.len() as u64);
            let laid: Vec<u64> = rec.descendants().map(Record::end_offset).collect();
            let read: Vec<u64> = back.descendants().map(Record::end_offset).collect();
            assert_eq!(laid, read);
        }
    }

    #[test]
    fn test_terminator_only_after_children() {
        let leaf = Record::new("Version").with(100i32);
        let bytes = write_one(&leaf, NARROW);
        assert_eq!(bytes.len(), 13 + 7 + 5);

        let parent = Record::new("P").with_child(leaf);
        let bytes = write_one(&parent, NARROW);
        assert_eq!(bytes.len(), 13 + 1 + 25 + 13);
        assert!(bytes[bytes.len() - 13..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_spurious_terminator_tolerated() {
        // "A" has no children but its end offset covers a terminator.
        let mut bytes = Vec::new();
        let props = {
            let mut p = Vec::new();
            Property::I32(7).write(&mut p).unwrap();
            p
        };
        let a_end = (13 + 1 + props.len() + 13) as u32;
        bytes.extend_from_slice(&a_end.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&(props.len() as u32).to_le_bytes());
        bytes.push(1);
        bytes.push(b'A');
        bytes.extend_from_slice(&props);
        bytes.extend_from_slice(&[0u8; 13]);
        bytes.extend_from_slice(&write_one(&Record::new("B").with(8i32), NARROW));

        let mut r = ByteReader::new(&bytes);
        let a = Record::read(&mut r, NARROW, 0).unwrap().unwrap();
        let b = Record::read(&mut r, NARROW, 0).unwrap().unwrap();
        assert_eq!(a.name, "A");
        assert!(a.children.is_empty());
        assert_eq!(a.i32_at(0).unwrap(), 7);
        assert_eq!(b.name, "B");
        assert_eq!(r.pos(), bytes.len() as u64);
    }

    #[test]
    fn test_sentinel() {
        let bytes = [0u8; 25];
        let mut r = ByteReader::new(&bytes);
        assert!(Record::read(&mut r, WIDE, 0).unwrap().is_none());
        assert_eq!(r.pos(), 25);
    }

    #[test]
    fn test_property_list_length_mismatch() {
        let mut bytes = write_one(&Record::new("X").with(1i32), NARROW);
        // declared property bytes: 5 -> 6
        bytes[8] = 6;
        let err = Record::read(&mut ByteReader::new(&bytes), NARROW, 0).unwrap_err();
        match err {
            Error::InRecord { record, source, .. } => {
                assert_eq!(record, "X");
                assert!(matches!(
                    *source,
                    Error::CorruptPropertyListLength { declared: 6, actual: 5 }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_property_reports_index() {
        let mut bytes = write_one(&Record::new("X").with(1i32).with(2i32), NARROW);
        // second property type byte
        let at = 13 + 1 + 5;
        bytes[at] = b'?';
        let err = Record::read(&mut ByteReader::new(&bytes), NARROW, 0).unwrap_err();
        assert!(matches!(err, Error::InRecord { index: Some(1), .. }));
        assert!(matches!(err.root_cause(), Error::UnknownPropertyType(b'?')));
    }

    #[test]
    fn test_truncated_subtree() {
        let bytes = write_one(&sample(), WIDE);
        let cut = &bytes[..bytes.len() - 30];
        let err = Record::read(&mut ByteReader::new(cut), WIDE, 0).unwrap_err();
        assert!(matches!(err.root_cause(), Error::CorruptEndOffset { .. }));
    }

    #[test]
    fn test_end_offset_inside_properties() {
        // "A" carries a blob holding a complete record "B"; A's end offset
        // points at B inside the blob instead of past the property list.
        let inner = write_one(&Record::new("B").with(1i32), NARROW);
        let mut props = Vec::new();
        Property::Raw(inner).write(&mut props).unwrap();

        let header_len = 13 + 1;
        let a_end = (header_len + 5) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&a_end.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&(props.len() as u32).to_le_bytes());
        bytes.push(1);
        bytes.push(b'A');
        bytes.extend_from_slice(&props);
        bytes.extend_from_slice(&[0u8; 13]);

        let mut r = ByteReader::new(&bytes);
        let err = Record::read(&mut r, NARROW, 0).unwrap_err();
        assert!(matches!(err, Error::InRecord { ref record, .. } if record == "A"));
        assert!(matches!(
            err.root_cause(),
            Error::CorruptEndOffset { end: 19, pos } if *pos == (header_len + props.len()) as u64
        ));
    }

    #[test]
    fn test_garbage_property_count() {
        let mut bytes = write_one(&Record::new("X").with(1i32), NARROW);
        // declared property count: 1 -> u32::MAX
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = Record::read(&mut ByteReader::new(&bytes), NARROW, 0).unwrap_err();
        assert!(matches!(err, Error::InRecord { index: Some(1), .. }));
    }

    #[test]
    fn test_nesting_limit() {
        let mut rec = Record::new("leaf");
        for _ in 0..MAX_DEPTH + 1 {
            rec = Record::new("n").with_child(rec);
        }
        let bytes = write_one(&rec, NARROW);
        let err = Record::read(&mut ByteReader::new(&bytes), NARROW, 0).unwrap_err();
        assert!(matches!(err.root_cause(), Error::NestingTooDeep(_)));
    }

    #[test]
    fn test_typed_lookup() {
        let rec = sample();
        assert_eq!(rec.i64_at(0).unwrap(), 42);
        assert_eq!(rec.str_at(2).unwrap(), "Mesh");
        assert_eq!(rec.require_child("Vertices").unwrap().f64_array_at(0).unwrap().len(), 3);

        let err = rec.i32_at(0).unwrap_err();
        assert!(matches!(
            err,
            Error::InRecord { ref record, index: Some(0), .. } if record == "Geometry"
        ));
        assert!(matches!(err.root_cause(), Error::TypeMismatch { expected: 'I', actual: 'L' }));

        assert!(matches!(
            rec.prop(9).unwrap_err().root_cause(),
            Error::PropertyOutOfRange { index: 9, count: 3 }
        ));
        assert!(matches!(rec.require_child("Nope"), Err(Error::RecordNotFound(_))));
    }

    #[test]
    fn test_name_too_long() {
        let rec = Record::new("x".repeat(256));
        let mut out = Vec::new();
        assert!(matches!(rec.write(&mut out, NARROW), Err(Error::NameTooLong(256))));
    }

    #[test]
    fn test_descendants_order() {
        let rec = sample();
        let names: Vec<&str> = rec.descendants().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Geometry", "Vertices", "LayerElementUV", "Version"]);
    }
}
