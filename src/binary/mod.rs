//! Low-level FBX binary format implementation.
//!
//! ## File Structure
//!
//! ```text
//! +---------------------------+
//! | "Kaydara FBX Binary  \0"  |  23 bytes (magic + padding)
//! +---------------------------+
//! | Version                   |  4 bytes (u32 LE)
//! +---------------------------+
//! | Record ...                |  top-level records
//! | Sentinel                  |  13 zero bytes (< 7500) or 25 (>= 7500)
//! +---------------------------+
//! | Footer                    |  opaque, copied verbatim
//! +---------------------------+
//! ```
//!
//! Every record stores the absolute offset of its own end, so any edit to a
//! leaf shifts the offsets of all later records and all ancestors. The
//! writer recomputes them on every save.

mod format;
mod stream;
mod value;
mod record;
mod document;

pub use format::*;
pub use stream::*;
pub use value::*;
pub use record::*;
pub use document::*;
