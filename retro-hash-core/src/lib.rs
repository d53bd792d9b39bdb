use std::io::{Read, Seek};

pub mod error;
pub mod geometry;
pub mod region;
pub mod track;
pub mod util;

pub use error::DiscError;
pub use geometry::{refine_geometry, resolve_data_track, CD_SYNC_PATTERN};
pub use region::Region;
pub use track::{msf_to_frame, pad_to_quad, Track, TrackType, ISO_SECTOR_SIZE, RAW_SECTOR_SIZE};

/// A reader that implements both Read and Seek.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Uniform sector accessor over a disc image.
///
/// Implemented once per container format (CHD archive, cue-described raw
/// dump). A backend is opened per input file, computes its track table once,
/// and services strictly sequential sector reads until dropped; dropping the
/// backend releases the underlying file or archive handle.
pub trait ArchiveBackend {
    /// The immutable track table computed at open.
    fn tracks(&self) -> &[Track];

    /// Read one physical sector of `track`, addressed by sector index
    /// within the track.
    ///
    /// Returns `physical_sector_size` bytes, or fewer when the image ends
    /// mid-sector. Failures are permanent; no layer retries.
    fn read_sector(&mut self, track: &Track, sector: u64) -> Result<Vec<u8>, DiscError>;

    /// Read the user-data payload of a sector: the
    /// `[data_offset, data_offset + user_data_size)` slice of the physical
    /// sector.
    fn read_user_data(&mut self, track: &Track, sector: u64) -> Result<Vec<u8>, DiscError> {
        let raw = self.read_sector(track, sector)?;
        let start = track.data_offset as usize;
        let end = start + track.user_data_size as usize;
        match raw.get(start..end) {
            Some(payload) => Ok(payload.to_vec()),
            None => Err(DiscError::sector_read(format!(
                "sector {} of track {} is {} bytes, expected {}",
                sector,
                track.number,
                raw.len(),
                track.physical_sector_size,
            ))),
        }
    }

    /// The first track that can carry a filesystem.
    fn first_data_track(&self) -> Option<Track> {
        self.tracks()
            .iter()
            .copied()
            .find(|t| t.track_type.is_data())
    }
}
