//! CHD archive backend.
//!
//! Exposes logical CD sectors out of a MAME Compressed Hunks of Data
//! archive. Track layout comes from the archive's CD metadata entries; the
//! hunk decompression itself is delegated to the `chd` crate. The archive
//! handle stays open for the lifetime of the backend and is released on
//! drop.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chd::Chd;

use retro_hash_core::{pad_to_quad, ArchiveBackend, DiscError, Track, TrackType};

/// CD frame size within a CHD: raw sector (2352) + subchannel (96).
///
/// Also the substitute unit size for CD-mastered archives whose header
/// reports `unit_bytes` as zero.
const CD_FRAME_SIZE: u32 = 2448;

/// Metadata tags tried, in order, at each track index.
const CD_TRACK_TAGS: [u32; 3] = [
    u32::from_be_bytes(*b"CHT2"),
    u32::from_be_bytes(*b"CHTR"),
    u32::from_be_bytes(*b"CHGD"),
];

/// Sector accessor over a CHD archive.
pub struct ChdBackend {
    chd: Chd<BufReader<File>>,
    unit_bytes: u32,
    frames_per_hunk: u64,
    tracks: Vec<Track>,
    hunk_buf: Vec<u8>,
    cmp_buf: Vec<u8>,
    cached_hunk: Option<u32>,
}

impl ChdBackend {
    /// Open a CHD archive and enumerate its track table.
    pub fn open(path: &Path) -> Result<Self, DiscError> {
        let file = File::open(path)
            .map_err(|e| DiscError::archive_open(format!("{}: {}", path.display(), e)))?;
        let mut chd = Chd::open(BufReader::new(file), None)
            .map_err(|e| DiscError::archive_open(format!("{}: {}", path.display(), e)))?;

        let header = chd.header();
        let hunk_bytes = header.hunk_size();
        let mut unit_bytes = header.unit_bytes();
        if unit_bytes == 0 {
            // Observed in CD-mastered archives
            unit_bytes = CD_FRAME_SIZE;
        }
        if hunk_bytes == 0 || !hunk_bytes.is_multiple_of(unit_bytes) {
            return Err(DiscError::header_invalid(format!(
                "hunk size {} is not a multiple of unit size {}",
                hunk_bytes, unit_bytes,
            )));
        }
        let frames_per_hunk = (hunk_bytes / unit_bytes) as u64;
        log::debug!(
            "CHD v{}: {} hunks of {} bytes, {} frames per hunk",
            header.version() as u32,
            header.hunk_count(),
            hunk_bytes,
            frames_per_hunk,
        );

        let metadata: Vec<_> = chd
            .metadata_refs()
            .try_into()
            .map_err(|e| DiscError::header_invalid(format!("CHD metadata: {}", e)))?;
        let raw_entries: Vec<(u32, Vec<u8>)> = metadata
            .into_iter()
            .map(|m| (m.metatag, m.value))
            .collect();
        let tracks = tracks_from_metadata(&raw_entries)?;

        let hunk_buf = chd.get_hunksized_buffer();
        Ok(Self {
            chd,
            unit_bytes,
            frames_per_hunk,
            tracks,
            hunk_buf,
            cmp_buf: Vec::new(),
            cached_hunk: None,
        })
    }

    fn load_hunk(&mut self, hunk_index: u32) -> Result<(), DiscError> {
        if self.cached_hunk == Some(hunk_index) {
            return Ok(());
        }
        let mut hunk = self
            .chd
            .hunk(hunk_index)
            .map_err(|e| DiscError::sector_read(format!("hunk {}: {}", hunk_index, e)))?;
        hunk.read_hunk_in(&mut self.cmp_buf, &mut self.hunk_buf)
            .map_err(|e| DiscError::sector_read(format!("hunk {}: {}", hunk_index, e)))?;
        self.cached_hunk = Some(hunk_index);
        Ok(())
    }
}

impl ArchiveBackend for ChdBackend {
    fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn read_sector(&mut self, track: &Track, sector: u64) -> Result<Vec<u8>, DiscError> {
        let absolute_frame = track.start_frame + sector;
        let (hunk_index, offset) =
            hunk_position(absolute_frame, self.frames_per_hunk, self.unit_bytes);
        self.load_hunk(hunk_index)?;

        let end = offset + track.physical_sector_size as usize;
        match self.hunk_buf.get(offset..end) {
            Some(data) => Ok(data.to_vec()),
            None => Err(DiscError::sector_read(format!(
                "frame {} extends beyond hunk {} boundary",
                absolute_frame, hunk_index,
            ))),
        }
    }
}

/// Locate an absolute frame inside the hunk grid: which hunk holds it, and
/// the byte offset of the frame within that hunk.
fn hunk_position(absolute_frame: u64, frames_per_hunk: u64, unit_bytes: u32) -> (u32, usize) {
    let hunk = absolute_frame / frames_per_hunk;
    let offset = (absolute_frame % frames_per_hunk) * unit_bytes as u64;
    (hunk as u32, offset as usize)
}

/// Build the track table from the archive's CD metadata entries.
///
/// For each index 0, 1, … the tags `CHT2`, `CHTR`, `CHGD` are tried in
/// order; enumeration stops at the first index where none yields an entry.
/// A payload that fails to parse is skipped with a warning; the result is
/// fatal only when no track parses at all.
fn tracks_from_metadata(entries: &[(u32, Vec<u8>)]) -> Result<Vec<Track>, DiscError> {
    let mut tracks = Vec::new();
    let mut frame_offset: u64 = 0;

    for index in 0usize.. {
        let entry = CD_TRACK_TAGS
            .iter()
            .find_map(|&tag| entries.iter().filter(|(t, _)| *t == tag).nth(index));
        let Some((_, payload)) = entry else {
            break;
        };

        let text = String::from_utf8_lossy(payload);
        match parse_track_metadata(text.trim_end_matches('\0').trim()) {
            Ok((number, track_type, frames, pregap)) => {
                tracks.push(Track::from_chd(number, track_type, pregap, frames, frame_offset));
                // Every track is padded to a multiple of 4 frames whether or
                // not the metadata carried an explicit PAD field
                frame_offset += pregap as u64 + frames as u64 + pad_to_quad(frames) as u64;
            }
            Err(e) => {
                log::warn!("skipping CD track metadata at index {}: {}", index, e);
            }
        }
    }

    if tracks.is_empty() {
        return Err(DiscError::track_metadata(
            "no usable CD track metadata entries",
        ));
    }
    Ok(tracks)
}

/// Extract the value of a `KEY:value` field from a metadata payload.
fn parse_meta_field<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.split_whitespace()
        .find_map(|token| token.strip_prefix(key).and_then(|rest| rest.strip_prefix(':')))
}

/// Parse one `TRACK:%d TYPE:%s SUBTYPE:%s FRAMES:%d [PREGAP:%d …]` payload
/// into `(number, type, frames, pregap)`. Unknown fields are ignored.
fn parse_track_metadata(text: &str) -> Result<(u32, TrackType, u32, u32), DiscError> {
    let number: u32 = parse_meta_field(text, "TRACK")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| DiscError::track_metadata(format!("missing TRACK field in {:?}", text)))?;

    let type_tag = parse_meta_field(text, "TYPE")
        .ok_or_else(|| DiscError::track_metadata(format!("missing TYPE field in {:?}", text)))?;
    let track_type = TrackType::from_chd_tag(type_tag)
        .ok_or_else(|| DiscError::track_metadata(format!("unknown track type {:?}", type_tag)))?;

    let frames: u32 = parse_meta_field(text, "FRAMES")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| DiscError::track_metadata(format!("missing FRAMES field in {:?}", text)))?;

    let pregap: u32 = match parse_meta_field(text, "PREGAP") {
        Some(v) => v
            .parse()
            .map_err(|_| DiscError::track_metadata(format!("bad PREGAP value {:?}", v)))?,
        None => 0,
    };

    Ok((number, track_type, frames, pregap))
}

#[cfg(test)]
#[path = "tests/chd_tests.rs"]
mod tests;
