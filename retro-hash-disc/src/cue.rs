//! CUE sheet parsing and the raw BIN dump backend.
//!
//! A cue sheet is line-oriented text with case-insensitive keywords. Only
//! the fields that place tracks inside the BIN matter here: the `FILE`
//! entry, each `TRACK` declaration, and its `INDEX 01` timecode. `PREGAP`,
//! `POSTGAP`, `REM` and friends are ignored.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use retro_hash_core::{msf_to_frame, ArchiveBackend, DiscError, Track, TrackType};

/// A parsed cue sheet: the BIN it describes and the track layout.
#[derive(Debug, Clone)]
pub struct CueSheet {
    /// BIN filename as written in the sheet, relative to the cue directory.
    pub bin_file: String,
    pub tracks: Vec<Track>,
}

/// Map a cue `TRACK` type tag (uppercased) to
/// `(track_type, (physical, data_offset, user_data_size))`.
fn cue_track_layout(tag: &str) -> (TrackType, (u32, u32, u32)) {
    match tag {
        "MODE1/2048" => (TrackType::Mode1, (2048, 0, 2048)),
        "MODE1/2352" => (TrackType::Mode1Raw, (2352, 16, 2048)),
        "MODE2/2048" => (TrackType::Mode2, (2048, 0, 2048)),
        "MODE2/2352" => (TrackType::Mode2Raw, (2352, 24, 2048)),
        "AUDIO" => (TrackType::Audio, (2352, 0, 2352)),
        _ => (TrackType::Mode2Raw, (2352, 0, 2048)),
    }
}

/// Parse a cue sheet from its text content.
pub fn parse_cue(content: &str) -> Result<CueSheet, DiscError> {
    let mut bin_file: Option<String> = None;
    let mut tracks: Vec<Track> = Vec::new();
    let mut pending: Option<(u32, TrackType, (u32, u32, u32))> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let upper = line.to_uppercase();

        if upper.starts_with("FILE ") {
            let (filename, file_type) = parse_cue_file_line(line)?;
            if !file_type.eq_ignore_ascii_case("BINARY") {
                continue;
            }
            if bin_file.is_none() {
                bin_file = Some(filename);
            } else {
                log::warn!("ignoring additional FILE entry {:?} in cue sheet", filename);
            }
        } else if upper.starts_with("TRACK ") {
            let (number, type_tag) = parse_cue_track_line(line)?;
            let (track_type, layout) = cue_track_layout(&type_tag);
            pending = Some((number, track_type, layout));
        } else if upper.starts_with("INDEX ")
            && let Some((number, track_type, layout)) = pending
            && let Some(start_frame) = parse_cue_index_line(line)?
        {
            tracks.push(Track::from_cue(number, track_type, layout, start_frame));
            pending = None;
        }
    }

    let bin_file = bin_file
        .ok_or_else(|| DiscError::archive_open("cue sheet has no FILE … BINARY entry"))?;
    if tracks.is_empty() {
        return Err(DiscError::track_metadata("cue sheet declares no tracks"));
    }
    Ok(CueSheet { bin_file, tracks })
}

/// Parse a FILE line: `FILE "filename.bin" BINARY`
fn parse_cue_file_line(line: &str) -> Result<(String, String), DiscError> {
    let rest = match line.get(..5) {
        Some(keyword) if keyword.eq_ignore_ascii_case("FILE ") => line[5..].trim_start(),
        _ => return Err(DiscError::archive_open("invalid FILE line in cue sheet")),
    };

    if let Some(after_quote) = rest.strip_prefix('"') {
        let end_quote = after_quote
            .find('"')
            .ok_or_else(|| DiscError::archive_open("unterminated quote in cue FILE line"))?;
        let filename = after_quote[..end_quote].to_string();
        let file_type = after_quote[end_quote + 1..].trim().to_string();
        Ok((filename, file_type))
    } else {
        let mut parts = rest.splitn(2, ' ');
        let filename = parts.next().unwrap_or("").to_string();
        let file_type = parts.next().unwrap_or("").trim().to_string();
        Ok((filename, file_type))
    }
}

/// Parse a TRACK line: `TRACK 01 MODE2/2352`
fn parse_cue_track_line(line: &str) -> Result<(u32, String), DiscError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(DiscError::track_metadata("invalid TRACK line in cue sheet"));
    }
    let number: u32 = parts[1]
        .parse()
        .map_err(|_| DiscError::track_metadata("invalid track number in cue sheet"))?;
    Ok((number, parts[2].to_uppercase()))
}

/// Parse an INDEX line, returning the start frame for `INDEX 01` and `None`
/// for any other index number.
fn parse_cue_index_line(line: &str) -> Result<Option<u64>, DiscError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(DiscError::track_metadata("invalid INDEX line in cue sheet"));
    }
    if parts[1] != "01" && parts[1] != "1" {
        return Ok(None);
    }

    let msf: Vec<&str> = parts[2].split(':').collect();
    if msf.len() != 3 {
        return Err(DiscError::track_metadata("invalid MSF timecode in cue sheet"));
    }
    let m: u64 = msf[0]
        .parse()
        .map_err(|_| DiscError::track_metadata("invalid minutes in MSF timecode"))?;
    let s: u64 = msf[1]
        .parse()
        .map_err(|_| DiscError::track_metadata("invalid seconds in MSF timecode"))?;
    let f: u64 = msf[2]
        .parse()
        .map_err(|_| DiscError::track_metadata("invalid frames in MSF timecode"))?;
    Ok(Some(msf_to_frame(m, s, f)))
}

/// Sector accessor over a raw BIN dump described by a cue sheet.
///
/// The file handle is shared by all reads (one seek per sector), so reads
/// within a session are strictly sequential.
pub struct BinBackend {
    bin: File,
    tracks: Vec<Track>,
}

impl BinBackend {
    /// Open the BIN referenced by a cue sheet on disk.
    pub fn open(cue_path: &Path) -> Result<Self, DiscError> {
        let content = std::fs::read_to_string(cue_path)
            .map_err(|e| DiscError::archive_open(format!("{}: {}", cue_path.display(), e)))?;
        let sheet = parse_cue(&content)?;

        let bin_path = resolve_bin_path(cue_path, &sheet.bin_file);
        let bin = File::open(&bin_path)
            .map_err(|e| DiscError::archive_open(format!("{}: {}", bin_path.display(), e)))?;
        Ok(Self {
            bin,
            tracks: sheet.tracks,
        })
    }
}

/// The BIN filename in a cue sheet is relative to the cue's directory.
fn resolve_bin_path(cue_path: &Path, bin_file: &str) -> PathBuf {
    match cue_path.parent() {
        Some(dir) => dir.join(bin_file),
        None => PathBuf::from(bin_file),
    }
}

impl ArchiveBackend for BinBackend {
    fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn read_sector(&mut self, track: &Track, sector: u64) -> Result<Vec<u8>, DiscError> {
        let absolute_frame = track.start_frame + sector;
        let start_byte = absolute_frame * track.physical_sector_size as u64;
        self.bin.seek(SeekFrom::Start(start_byte))?;

        // Reads at the end of the image may come up short; the caller
        // decides whether a partial sector is acceptable
        let mut buf = vec![0u8; track.physical_sector_size as usize];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.bin.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

#[cfg(test)]
#[path = "tests/cue_tests.rs"]
mod tests;
