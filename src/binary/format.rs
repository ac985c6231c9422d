//! FBX binary format constants and the width-mode codec context.

/// Magic prefix every binary FBX file starts with.
pub const FBX_MAGIC: &[u8; 18] = b"Kaydara FBX Binary";

/// Full header written on export: magic, two spaces, NUL, 0x1A, NUL.
pub const FBX_HEADER: &[u8; HEADER_SIZE] = b"Kaydara FBX Binary  \x00\x1a\x00";

/// Size of the header preceding the version field.
pub const HEADER_SIZE: usize = 23;

/// First format version whose records use 64-bit header fields.
pub const WIDE_VERSION_THRESHOLD: u32 = 7500;

/// Version written by default on export.
pub const DEFAULT_VERSION: u32 = 7400;

/// Identifier that opens the standard footer.
pub const FOOTER_ID: [u8; 16] = [
    0xfa, 0xbc, 0xab, 0x09, 0xd0, 0xc8, 0xd4, 0x66,
    0xb1, 0x76, 0xfb, 0x83, 0x1c, 0xf7, 0x26, 0x7e,
];

/// Magic that closes the standard footer.
pub const FOOTER_MAGIC: [u8; 16] = [
    0xf8, 0x5a, 0x8c, 0x6a, 0xde, 0xf5, 0xd9, 0x7e,
    0xec, 0xe9, 0x0c, 0xe3, 0x75, 0x8f, 0x29, 0x0b,
];

/// Ceiling on any single decoded array payload (1 GiB).
pub const MAX_ARRAY_BYTES: u64 = 1 << 30;

/// Largest inflate ratio DEFLATE can achieve; declared sizes above
/// `compressed_len * MAX_DEFLATE_RATIO` cannot be genuine.
pub const MAX_DEFLATE_RATIO: u64 = 1032;

/// Deepest record nesting the reader follows.
pub const MAX_DEPTH: usize = 256;

/// Top-level record holding every scene object.
pub const OBJECTS: &str = "Objects";

/// Object record carrying mesh or shape data.
pub const GEOMETRY: &str = "Geometry";

/// Position (or shape delta) array under a geometry.
pub const VERTICES: &str = "Vertices";

/// Size of integer header fields, fixed for a whole document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    /// 4-byte offsets/counts, 13-byte terminator (versions below 7500).
    Narrow,
    /// 8-byte offsets/counts, 25-byte terminator (7500 and later).
    Wide,
}

impl Width {
    /// Width mode selected by a format version.
    #[inline]
    pub const fn for_version(version: u32) -> Self {
        if version >= WIDE_VERSION_THRESHOLD {
            Self::Wide
        } else {
            Self::Narrow
        }
    }

    /// Bytes per header field.
    #[inline]
    pub const fn field_len(self) -> usize {
        match self {
            Self::Narrow => 4,
            Self::Wide => 8,
        }
    }
}

/// Encoding parameters threaded through every record read and write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecContext {
    pub width: Width,
}

impl CodecContext {
    /// Context for a document of the given version.
    #[inline]
    pub const fn for_version(version: u32) -> Self {
        Self { width: Width::for_version(version) }
    }

    /// Bytes of a record header before the name: three fields plus the
    /// name length byte.
    #[inline]
    pub const fn header_len(self) -> usize {
        self.width.field_len() * 3 + 1
    }

    /// Bytes of the all-zero sentinel ending a sibling list.
    #[inline]
    pub const fn terminator_len(self) -> usize {
        self.header_len()
    }
}

/// Footer emitted after the top-level terminator on export.
pub fn standard_footer(version: u32) -> Vec<u8> {
    let mut footer = Vec::with_capacity(16 + 4 + 4 + 120 + 16);
    footer.extend_from_slice(&FOOTER_ID);
    footer.extend_from_slice(&[0u8; 4]);
    footer.extend_from_slice(&version.to_le_bytes());
    footer.extend_from_slice(&[0u8; 120]);
    footer.extend_from_slice(&FOOTER_MAGIC);
    footer
}
