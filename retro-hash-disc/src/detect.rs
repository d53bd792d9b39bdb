//! Disc image container detection.

use std::io::SeekFrom;

use retro_hash_core::{DiscError, ReadSeek};

/// CHD file magic bytes.
const CHD_MAGIC: &[u8; 8] = b"MComprHD";

/// Supported disc image containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscFormat {
    /// MAME Compressed Hunks of Data archive.
    Chd,
    /// CUE sheet describing a raw BIN dump.
    Cue,
}

impl DiscFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chd => "CHD",
            Self::Cue => "CUE/BIN",
        }
    }
}

/// Detect the container format by examining the reader content.
///
/// The reader is rewound to the start before returning.
pub fn detect_disc_format(reader: &mut dyn ReadSeek) -> Result<DiscFormat, DiscError> {
    reader.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; 8];
    let bytes_read = reader.read(&mut buf)?;

    if bytes_read >= 8 && buf == *CHD_MAGIC {
        reader.seek(SeekFrom::Start(0))?;
        return Ok(DiscFormat::Chd);
    }

    if looks_like_cue(reader)? {
        reader.seek(SeekFrom::Start(0))?;
        return Ok(DiscFormat::Cue);
    }

    reader.seek(SeekFrom::Start(0))?;
    Err(DiscError::archive_open(
        "not a recognized disc image format (expected CHD or CUE)",
    ))
}

/// Check if reader content looks like a cue sheet.
fn looks_like_cue(reader: &mut dyn ReadSeek) -> Result<bool, DiscError> {
    reader.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; 512];
    let n = reader.read(&mut buf)?;

    if n == 0 {
        return Ok(false);
    }

    // Cue sheets are text; reject anything with control bytes beyond
    // ordinary whitespace
    let slice = &buf[..n];
    let has_binary = slice
        .iter()
        .any(|&b| b < 0x09 || (b > 0x0D && b < 0x20 && b != 0x1A));
    if has_binary {
        return Ok(false);
    }

    let text = String::from_utf8_lossy(slice).to_uppercase();
    Ok(text.contains("FILE ") && text.contains("TRACK "))
}

#[cfg(test)]
#[path = "tests/detect_tests.rs"]
mod tests;
