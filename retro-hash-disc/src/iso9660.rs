//! Sector-aware ISO 9660 traversal.
//!
//! Reads 2048-byte logical blocks out of whatever physical sector layout
//! the backend exposes, using only logical-sector reads on the first data
//! track. Just enough of ISO 9660 for PlayStation discs: the Primary
//! Volume Descriptor, directory records, and contiguous file extents.
//! Joliet, Rock Ridge, path tables and multi-extent files are out of scope.

use retro_hash_core::util::read_ascii_fixed;
use retro_hash_core::{ArchiveBackend, DiscError, Track};

/// The Primary Volume Descriptor is always at logical sector 16.
pub const PVD_SECTOR: u64 = 16;

/// Offset of the root directory record within the PVD.
const PVD_ROOT_RECORD_OFFSET: usize = 156;

/// A parsed directory record.
///
/// Names are stored uppercased with any `;N` version suffix stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub extent_lba: u32,
    pub size_bytes: u32,
    pub is_directory: bool,
}

/// ISO 9660 reader rooted at the Primary Volume Descriptor of a data track.
pub struct IsoReader<'a> {
    backend: &'a mut dyn ArchiveBackend,
    track: Track,
    root: DirectoryEntry,
    /// System identifier from the PVD, e.g. "PLAYSTATION".
    pub system_identifier: String,
    /// Volume identifier from the PVD.
    pub volume_identifier: String,
}

impl std::fmt::Debug for IsoReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsoReader")
            .field("track", &self.track)
            .field("root", &self.root)
            .field("system_identifier", &self.system_identifier)
            .field("volume_identifier", &self.volume_identifier)
            .finish_non_exhaustive()
    }
}

impl<'a> IsoReader<'a> {
    /// Read and validate the PVD, extracting the root directory record.
    pub fn open(backend: &'a mut dyn ArchiveBackend, track: Track) -> Result<Self, DiscError> {
        let pvd = backend.read_user_data(&track, PVD_SECTOR)?;
        if pvd.len() < PVD_ROOT_RECORD_OFFSET + 34 {
            return Err(DiscError::filesystem_not_found(format!(
                "sector 16 holds only {} bytes",
                pvd.len()
            )));
        }
        if pvd[0] != 0x01 {
            return Err(DiscError::filesystem_not_found(format!(
                "expected descriptor type 0x01, got 0x{:02X}",
                pvd[0]
            )));
        }
        if &pvd[1..6] != b"CD001" {
            return Err(DiscError::filesystem_not_found(
                "missing CD001 signature".to_string(),
            ));
        }

        let root_record = &pvd[PVD_ROOT_RECORD_OFFSET..PVD_ROOT_RECORD_OFFSET + 34];
        let root = DirectoryEntry {
            name: String::new(),
            extent_lba: read_le_u32(root_record, 2),
            size_bytes: read_le_u32(root_record, 10),
            is_directory: true,
        };

        let system_identifier = read_ascii_fixed(&pvd[8..40]);
        let volume_identifier = read_ascii_fixed(&pvd[40..72]);
        log::debug!(
            "PVD: system {:?}, volume {:?}, root at LBA {} ({} bytes)",
            system_identifier,
            volume_identifier,
            root.extent_lba,
            root.size_bytes,
        );

        Ok(Self {
            backend,
            track,
            root,
            system_identifier,
            volume_identifier,
        })
    }

    /// The root directory entry.
    pub fn root(&self) -> DirectoryEntry {
        self.root.clone()
    }

    /// Iterate the records of a directory.
    pub fn read_dir<'r>(&'r mut self, dir: &DirectoryEntry) -> DirIter<'r, 'a> {
        DirIter {
            reader: self,
            extent_lba: dir.extent_lba,
            remaining: dir.size_bytes,
            next_sector: 0,
            sector: Vec::new(),
            pos: 0,
        }
    }

    /// Resolve a `/`-separated path to a file entry.
    ///
    /// Comparison is case-insensitive with version suffixes stripped on
    /// both sides. Non-final segments must name directories; the final
    /// segment must name a file. Returns `Ok(None)` when any segment is
    /// missing.
    pub fn find_file(&mut self, path: &str) -> Result<Option<DirectoryEntry>, DiscError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Ok(None);
        }

        let mut dir = self.root();
        for (i, segment) in segments.iter().enumerate() {
            let wanted = normalize_name(segment);
            let is_last = i + 1 == segments.len();

            let mut matched = None;
            let mut iter = self.read_dir(&dir);
            while let Some(entry) = iter.next_entry() {
                let entry = entry?;
                if entry.name == wanted && entry.is_directory != is_last {
                    matched = Some(entry);
                    break;
                }
            }

            match matched {
                Some(entry) if is_last => return Ok(Some(entry)),
                Some(entry) => dir = entry,
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Read a file's contents as a contiguous byte stream: consecutive
    /// user-data slices starting at the entry's extent, for exactly
    /// `size_bytes` bytes.
    pub fn read_file(&mut self, entry: &DirectoryEntry) -> Result<Vec<u8>, DiscError> {
        let mut contents = Vec::with_capacity(entry.size_bytes as usize);
        let mut remaining = entry.size_bytes as usize;
        let mut sector = entry.extent_lba as u64;

        while remaining > 0 {
            let data = self.read_fs_sector(sector)?;
            if data.is_empty() {
                break;
            }
            let take = remaining.min(data.len());
            contents.extend_from_slice(&data[..take]);
            remaining -= take;
            sector += 1;
        }
        Ok(contents)
    }

    /// The refined data track this reader traverses.
    pub fn track(&self) -> Track {
        self.track
    }

    fn read_fs_sector(&mut self, lba: u64) -> Result<Vec<u8>, DiscError> {
        // The track's own frames are addressed from its start; the
        // filesystem addresses logical blocks from the start of the disc,
        // which for the first data track coincide.
        self.backend.read_user_data(&self.track, lba)
    }
}

/// Uppercase a name and strip any `;N` version suffix.
fn normalize_name(name: &str) -> String {
    let upper = name.to_uppercase();
    match upper.split_once(';') {
        Some((stem, _)) => stem.to_string(),
        None => upper,
    }
}

/// Pull cursor over a directory's content stream.
///
/// The stream is the concatenation of user-data slices from consecutive
/// sectors starting at the directory's extent. Records never cross a
/// sector boundary; a zero length byte means the rest of the sector is
/// padding. Iteration ends once `size_bytes` of stream have been consumed.
pub struct DirIter<'r, 'a> {
    reader: &'r mut IsoReader<'a>,
    extent_lba: u32,
    remaining: u32,
    next_sector: u64,
    sector: Vec<u8>,
    pos: usize,
}

impl DirIter<'_, '_> {
    /// Advance to the next real entry, skipping the `0x00`/`0x01`
    /// special records for "." and "..".
    pub fn next_entry(&mut self) -> Option<Result<DirectoryEntry, DiscError>> {
        loop {
            if self.remaining == 0 {
                return None;
            }

            if self.pos >= self.sector.len() {
                let sector = self.extent_lba as u64 + self.next_sector;
                match self.reader.read_fs_sector(sector) {
                    Ok(data) if data.is_empty() => return None,
                    Ok(data) => {
                        self.sector = data;
                        self.pos = 0;
                        self.next_sector += 1;
                    }
                    Err(e) => {
                        self.remaining = 0;
                        return Some(Err(e));
                    }
                }
            }

            let record_len = self.sector[self.pos] as usize;
            if record_len == 0 {
                // Padding fills the rest of this sector
                let skipped = self.sector.len() - self.pos;
                self.remaining = self.remaining.saturating_sub(skipped as u32);
                self.pos = self.sector.len();
                continue;
            }
            if self.pos + record_len > self.sector.len() {
                self.remaining = 0;
                return Some(Err(DiscError::filesystem_not_found(format!(
                    "directory record crosses sector boundary at LBA {}",
                    self.extent_lba as u64 + self.next_sector - 1,
                ))));
            }

            let record = &self.sector[self.pos..self.pos + record_len];
            self.pos += record_len;
            self.remaining = self.remaining.saturating_sub(record_len as u32);

            if let Some(entry) = parse_directory_record(record) {
                return Some(Ok(entry));
            }
        }
    }
}

impl Iterator for DirIter<'_, '_> {
    type Item = Result<DirectoryEntry, DiscError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry()
    }
}

/// Parse a single directory record, returning `None` for records too short
/// to hold a name and for the `0x00`/`0x01` special entries.
fn parse_directory_record(record: &[u8]) -> Option<DirectoryEntry> {
    if record.len() < 34 {
        return None;
    }

    let name_len = record[32] as usize;
    if 33 + name_len > record.len() {
        return None;
    }
    let name_bytes = &record[33..33 + name_len];

    // "." and ".." use single-byte names 0x00 and 0x01; check raw bytes
    // before any text interpretation
    if name_len == 1 && (name_bytes[0] == 0x00 || name_bytes[0] == 0x01) {
        return None;
    }

    Some(DirectoryEntry {
        name: normalize_name(&String::from_utf8_lossy(name_bytes)),
        extent_lba: read_le_u32(record, 2),
        size_bytes: read_le_u32(record, 10),
        is_directory: record[25] & 0x02 != 0,
    })
}

fn read_le_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

#[cfg(test)]
#[path = "tests/iso9660_tests.rs"]
mod tests;
