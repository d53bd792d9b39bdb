//! Disc image readers and the PSX executable hasher.
//!
//! Two [`ArchiveBackend`](retro_hash_core::ArchiveBackend) implementations
//! (CHD archives, cue-described raw dumps), an ISO 9660 reader on top of
//! them, and the MD5 identifier construction over the disc's primary
//! executable.

pub mod chd;
pub mod cue;
pub mod detect;
pub mod iso9660;
pub mod psx;

pub use chd::ChdBackend;
pub use cue::BinBackend;
pub use detect::{detect_disc_format, DiscFormat};
pub use iso9660::{DirectoryEntry, IsoReader};
pub use psx::{identify, ExecutableInfo};
