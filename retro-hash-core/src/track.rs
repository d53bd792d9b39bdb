//! CD track model and sector geometry.
//!
//! A [`Track`] describes where a track's frames live in the backend's
//! logical address space and how its physical sectors are laid out
//! (sync/header prefix, user-data payload, error-correction trailer).

/// Frames per second of CD timecode.
pub const FRAMES_PER_SECOND: u64 = 75;

/// Raw CD sector size (sync + header + subheader + data + EDC + ECC).
pub const RAW_SECTOR_SIZE: u32 = 2352;

/// Standard ISO 9660 logical block size (user data only).
pub const ISO_SECTOR_SIZE: u32 = 2048;

/// Declared layout of a CD track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    /// 2352-byte sectors with 16-byte sync/header, 2048-byte payload
    Mode1Raw,
    /// 2352-byte sectors with 16-byte sync/header, 2336-byte payload
    Mode2Raw,
    /// Cooked MODE1 data, no sync prefix
    Mode1,
    /// Cooked MODE2 data, no sync prefix
    Mode2,
    /// Red Book audio, the whole sector is payload
    Audio,
}

impl TrackType {
    /// Parse a CHD metadata `TYPE:` value.
    ///
    /// `MODE2_FORM_MIX` is a raw MODE2 layout under another name; anything
    /// else unrecognized is rejected so the malformed-track policy applies.
    pub fn from_chd_tag(tag: &str) -> Option<Self> {
        match tag {
            "MODE1_RAW" => Some(Self::Mode1Raw),
            "MODE2_RAW" | "MODE2_FORM_MIX" => Some(Self::Mode2Raw),
            "MODE1" => Some(Self::Mode1),
            "MODE2" => Some(Self::Mode2),
            "AUDIO" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Nominal `(data_offset, user_data_size, physical_sector_size)` for
    /// this layout, before any sector-16 probe refinement.
    pub fn nominal_geometry(&self) -> (u32, u32, u32) {
        match self {
            Self::Mode1Raw => (16, 2048, RAW_SECTOR_SIZE),
            Self::Mode2Raw => (16, 2336, RAW_SECTOR_SIZE),
            Self::Mode1 => (0, 2048, RAW_SECTOR_SIZE),
            Self::Mode2 => (0, 2336, RAW_SECTOR_SIZE),
            Self::Audio => (0, RAW_SECTOR_SIZE, RAW_SECTOR_SIZE),
        }
    }

    pub fn is_data(&self) -> bool {
        !matches!(self, Self::Audio)
    }
}

/// One track of a disc image.
///
/// `start_frame` is the absolute sector index within the backend's logical
/// address space. Invariant: `data_offset + user_data_size` never exceeds
/// `physical_sector_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Track {
    pub number: u32,
    pub track_type: TrackType,
    pub physical_sector_size: u32,
    pub data_offset: u32,
    pub user_data_size: u32,
    pub pregap_frames: u32,
    pub total_frames: u32,
    pub start_frame: u64,
}

impl Track {
    /// Build a track from CHD metadata using the nominal geometry of its
    /// declared type.
    pub fn from_chd(
        number: u32,
        track_type: TrackType,
        pregap_frames: u32,
        total_frames: u32,
        start_frame: u64,
    ) -> Self {
        let (data_offset, user_data_size, physical_sector_size) = track_type.nominal_geometry();
        Self {
            number,
            track_type,
            physical_sector_size,
            data_offset,
            user_data_size,
            pregap_frames,
            total_frames,
            start_frame,
        }
    }

    /// Build a track from a cue sheet declaration with an explicit
    /// `(physical, data_offset, user_data_size)` layout.
    pub fn from_cue(
        number: u32,
        track_type: TrackType,
        layout: (u32, u32, u32),
        start_frame: u64,
    ) -> Self {
        let (physical_sector_size, data_offset, user_data_size) = layout;
        Self {
            number,
            track_type,
            physical_sector_size,
            data_offset,
            user_data_size,
            pregap_frames: 0,
            total_frames: 0,
            start_frame,
        }
    }
}

/// Convert an MSF timecode to an absolute frame index.
pub fn msf_to_frame(minutes: u64, seconds: u64, frames: u64) -> u64 {
    (minutes * 60 + seconds) * FRAMES_PER_SECOND + frames
}

/// Frames of padding needed to round a track length up to a multiple of 4.
///
/// The CHD CD layout pads every track this way whether or not the metadata
/// carries an explicit `PAD:` field.
pub fn pad_to_quad(frames: u32) -> u32 {
    ((frames + 3) & !3) - frames
}

#[cfg(test)]
#[path = "tests/track_tests.rs"]
mod tests;
