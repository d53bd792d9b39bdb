use thiserror::Error;

/// Errors that can occur while hashing a disc image.
///
/// One value is surfaced per input file; there is no partial success and
/// no layer retries a failed read.
#[derive(Debug, Error)]
pub enum DiscError {
    /// I/O error while reading the image
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive could not be opened or is not a recognized disc image
    #[error("Failed to open disc image: {0}")]
    ArchiveOpenFailed(String),

    /// The archive header is inconsistent (hunk/unit geometry, version)
    #[error("Invalid archive header: {0}")]
    HeaderInvalid(String),

    /// Track metadata could not be parsed into a usable track table
    #[error("Malformed track metadata: {0}")]
    TrackMetadataMalformed(String),

    /// A sector read failed permanently
    #[error("Sector read failed: {0}")]
    SectorReadFailed(String),

    /// The image contains no data track to carry a filesystem
    #[error("No data track on disc")]
    NotADataDisc,

    /// Sector 16 of the data track is not a valid Primary Volume Descriptor
    #[error("No ISO 9660 filesystem at sector 16: {0}")]
    FilesystemNotFound(String),

    /// No bootable executable could be located on the filesystem
    #[error("No bootable executable found")]
    ExecutableNotFound,

    /// The executable was located but its contents could not be read
    #[error("Failed to read executable: {0}")]
    ExecutableReadFailed(String),
}

impl DiscError {
    pub fn archive_open(msg: impl Into<String>) -> Self {
        Self::ArchiveOpenFailed(msg.into())
    }

    pub fn header_invalid(msg: impl Into<String>) -> Self {
        Self::HeaderInvalid(msg.into())
    }

    pub fn track_metadata(msg: impl Into<String>) -> Self {
        Self::TrackMetadataMalformed(msg.into())
    }

    pub fn sector_read(msg: impl Into<String>) -> Self {
        Self::SectorReadFailed(msg.into())
    }

    pub fn filesystem_not_found(msg: impl Into<String>) -> Self {
        Self::FilesystemNotFound(msg.into())
    }

    pub fn executable_read(msg: impl Into<String>) -> Self {
        Self::ExecutableReadFailed(msg.into())
    }
}
