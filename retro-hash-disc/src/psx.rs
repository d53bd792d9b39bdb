//! PSX executable discovery and identifier hash construction.
//!
//! The identifier is the MD5 of the executable's canonicalized boot path
//! concatenated with its in-disc sector data. This is the same digest used
//! by the established PS1 identification databases, so every detail of the
//! path canonicalization and the sector-by-sector read matters.

use retro_hash_core::{resolve_data_track, ArchiveBackend, DiscError, Region, Track};

/// Magic prefix of PlayStation executables.
const PSX_EXE_MAGIC: &[u8; 8] = b"PS-X EXE";

/// Offset of the size-excluding-header field in a `PS-X EXE` header.
const PSX_EXE_SIZE_OFFSET: usize = 28;

/// Size of the `PS-X EXE` header itself, excluded from the header's size
/// field.
const PSX_EXE_HEADER_SIZE: u64 = 2048;

/// Executables are hashed in 2048-byte slices regardless of the track's
/// user-data size.
const HASH_SLICE_SIZE: usize = 2048;

/// Root-directory filename prefixes tried when neither SYSTEM.CNF nor
/// PSX.EXE exists.
const SERIAL_FALLBACK_PREFIXES: [&str; 3] = ["SLUS", "SLES", "SCUS"];

/// Identification result for one disc image.
#[derive(Debug, Clone)]
pub struct ExecutableInfo {
    /// Lowercase hex MD5 over canonical path + executable sectors.
    pub md5: String,
    /// Logical block address of the executable's extent.
    pub lba: u32,
    /// Hashed executable size in bytes (after any `PS-X EXE` truncation).
    pub size: u32,
    /// Executable filename (uppercased, version suffix stripped).
    pub name: String,
    /// The canonicalized boot path that feeds the hash.
    pub canonical_path: String,
    /// Catalog serial derived from the boot path, e.g. "SLUS-01234".
    pub serial: Option<String>,
    /// Region implied by the serial prefix.
    pub region: Option<Region>,
}

/// Locate the disc's primary executable and compute its identifier hash.
pub fn identify(backend: &mut dyn ArchiveBackend) -> Result<ExecutableInfo, DiscError> {
    let track = resolve_data_track(backend)?;

    let (entry, raw_boot_path) = {
        let mut iso = crate::iso9660::IsoReader::open(backend, track)?;
        let raw_boot_path = discover_boot_path(&mut iso)?;
        let lookup = lookup_path(&raw_boot_path);
        let entry = iso
            .find_file(&lookup)?
            .ok_or(DiscError::ExecutableNotFound)?;

        let body = iso
            .read_file(&entry)
            .map_err(|e| DiscError::executable_read(e.to_string()))?;
        let effective_size = effective_exe_size(&body, &raw_boot_path);
        (
            crate::iso9660::DirectoryEntry {
                size_bytes: effective_size,
                ..entry
            },
            raw_boot_path,
        )
    };

    let hash_path = canonical_hash_path(&raw_boot_path);
    let md5 = hash_executable(backend, &track, &hash_path, &entry)?;
    let serial = extract_serial(&raw_boot_path);
    let region = serial.as_deref().and_then(serial_to_region);

    Ok(ExecutableInfo {
        md5,
        lba: entry.extent_lba,
        size: entry.size_bytes,
        name: entry.name,
        canonical_path: hash_path,
        serial,
        region,
    })
}

/// Find the raw boot path:
///
/// 1. `SYSTEM.CNF`, scanning for its `BOOT =` value
/// 2. a literal `PSX.EXE` in the root
/// 3. any root file named `SLUS…`/`SLES…`/`SCUS…`
fn discover_boot_path(iso: &mut crate::iso9660::IsoReader<'_>) -> Result<String, DiscError> {
    if let Some(cnf) = iso.find_file("SYSTEM.CNF")? {
        let content = iso.read_file(&cnf)?;
        let text = String::from_utf8_lossy(&content);
        if let Some(path) = parse_boot_path(&text) {
            return Ok(path);
        }
        log::warn!("SYSTEM.CNF present but carries no BOOT entry");
    }

    if iso.find_file("PSX.EXE")?.is_some() {
        return Ok("PSX.EXE".to_string());
    }

    let root = iso.root();
    let mut iter = iso.read_dir(&root);
    while let Some(entry) = iter.next_entry() {
        let entry = entry?;
        if !entry.is_directory
            && SERIAL_FALLBACK_PREFIXES
                .iter()
                .any(|prefix| entry.name.starts_with(prefix))
        {
            return Ok(entry.name);
        }
    }

    Err(DiscError::ExecutableNotFound)
}

/// Extract the first `BOOT =` value from SYSTEM.CNF content.
///
/// Keys are matched case-insensitively with arbitrary surrounding
/// whitespace; the value runs to the first whitespace so a `;1` version
/// suffix is preserved.
pub fn parse_boot_path(content: &str) -> Option<String> {
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("BOOT") {
            continue;
        }
        if let Some(path) = value.split_whitespace().next() {
            return Some(path.to_string());
        }
    }
    None
}

/// Strip a leading `cdrom:` device prefix, case-insensitively.
fn strip_device_prefix(path: &str) -> &str {
    match path.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("cdrom:") => &path[6..],
        _ => path,
    }
}

/// The path string that feeds the MD5: device prefix stripped, forward
/// slashes folded to backslashes, leading separators dropped. Case and any
/// `;N` version suffix are preserved. Applying this twice equals applying
/// it once.
pub fn canonical_hash_path(raw: &str) -> String {
    let stripped = strip_device_prefix(raw.trim());
    let folded: String = stripped
        .chars()
        .map(|c| if c == '/' { '\\' } else { c })
        .collect();
    folded.trim_start_matches('\\').to_string()
}

/// The path that feeds ISO traversal: device prefix and version suffix
/// stripped, separators normalized to `/`. Segment case is handled by the
/// reader's case-insensitive lookup.
pub fn lookup_path(raw: &str) -> String {
    let stripped = strip_device_prefix(raw.trim());
    let trimmed = stripped.trim_start_matches(['/', '\\']);
    let normalized: String = trimmed
        .chars()
        .map(|c| if c == '\\' { '/' } else { c })
        .collect();
    match normalized.split_once(';') {
        Some((stem, _)) => stem.to_string(),
        None => normalized,
    }
}

/// Effective executable size for hashing.
///
/// A `PS-X EXE` header declares its code/data size at offset 28, excluding
/// the 2048-byte header. When header + code is smaller than the stored
/// extent the hash covers only that much; when it claims more than the
/// extent stores, the claim is logged and the extent size kept (never
/// padded).
fn effective_exe_size(body: &[u8], boot_path: &str) -> u32 {
    let size = body.len() as u64;
    if body.len() < PSX_EXE_SIZE_OFFSET + 4 || &body[..8] != PSX_EXE_MAGIC {
        return size as u32;
    }

    let declared = u32::from_le_bytes([
        body[PSX_EXE_SIZE_OFFSET],
        body[PSX_EXE_SIZE_OFFSET + 1],
        body[PSX_EXE_SIZE_OFFSET + 2],
        body[PSX_EXE_SIZE_OFFSET + 3],
    ]) as u64;
    let adjusted = declared + PSX_EXE_HEADER_SIZE;

    if adjusted < size {
        adjusted as u32
    } else {
        if adjusted > size {
            log::warn!(
                "{}: PS-X EXE header reports {} bytes but the extent stores {}",
                boot_path,
                adjusted,
                size,
            );
        }
        size as u32
    }
}

/// Compute the identifier digest: the canonical path, then the executable
/// re-read sector by sector.
///
/// Each of the `ceil(size / 2048)` sectors contributes exactly 2048 bytes
/// of user data — the final sector is not trimmed to the file remainder.
/// An empty read (image ends early) stops the stream.
fn hash_executable(
    backend: &mut dyn ArchiveBackend,
    track: &Track,
    hash_path: &str,
    entry: &crate::iso9660::DirectoryEntry,
) -> Result<String, DiscError> {
    let mut ctx = md5::Context::new();
    ctx.consume(hash_path.as_bytes());

    let sectors = (entry.size_bytes as u64).div_ceil(HASH_SLICE_SIZE as u64);
    for i in 0..sectors {
        let slice = read_hash_slice(backend, track, entry.extent_lba as u64 + i)?;
        if slice.is_empty() {
            break;
        }
        ctx.consume(&slice);
    }

    Ok(format!("{:x}", ctx.compute()))
}

/// One 2048-byte hash slice: the physical sector's bytes from
/// `data_offset`, clamped to what the image actually holds.
fn read_hash_slice(
    backend: &mut dyn ArchiveBackend,
    track: &Track,
    sector: u64,
) -> Result<Vec<u8>, DiscError> {
    let raw = backend.read_sector(track, sector)?;
    let start = (track.data_offset as usize).min(raw.len());
    let end = (start + HASH_SLICE_SIZE).min(raw.len());
    Ok(raw[start..end].to_vec())
}

/// Known PS1 serial prefixes and the region each implies.
///
/// PAPX/PCPX are dev and promo serials with no retail region of their own;
/// those discs are Japanese in practice.
const SERIAL_PREFIXES: [(&str, Region); 13] = [
    ("SLUS", Region::Usa),
    ("SCUS", Region::Usa),
    ("SLES", Region::Europe),
    ("SCES", Region::Europe),
    ("SCED", Region::Europe),
    ("SLPS", Region::Japan),
    ("SCPS", Region::Japan),
    ("SLPM", Region::Japan),
    ("SIPS", Region::Japan),
    ("PAPX", Region::Japan),
    ("PCPX", Region::Japan),
    ("SLKA", Region::Korea),
    ("SCKA", Region::Korea),
];

/// First four characters, ASCII-uppercased.
///
/// Boot paths come off the disc and are not guaranteed to be ASCII, so
/// this works in characters rather than byte slices.
fn serial_prefix(s: &str) -> String {
    s.chars().take(4).map(|c| c.to_ascii_uppercase()).collect()
}

/// Extract a normalized catalog serial from a boot path.
///
/// Input: `"cdrom:\SLUS_012.34;1"` or `"cdrom:SLUS_006.91;1"`.
/// Output: `"SLUS-01234"`.
pub fn extract_serial(boot_path: &str) -> Option<String> {
    // Whatever follows the last separator is the filename; "cdrom:FILENAME"
    // with no separator at all also occurs
    let filename = boot_path
        .rsplit(['\\', '/', ':'])
        .next()?
        .split(';')
        .next()?
        .trim();

    let prefix = serial_prefix(filename);
    if !SERIAL_PREFIXES.iter().any(|(known, _)| *known == prefix) {
        return None;
    }

    let digits: String = filename
        .chars()
        .skip(4)
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.len() < 5 {
        return None;
    }
    Some(format!("{}-{}", prefix, digits))
}

/// Map a serial's prefix to a release region.
pub fn serial_to_region(serial: &str) -> Option<Region> {
    let prefix = serial_prefix(serial);
    SERIAL_PREFIXES
        .iter()
        .find(|(known, _)| *known == prefix)
        .map(|&(_, region)| region)
}

#[cfg(test)]
#[path = "tests/psx_tests.rs"]
mod tests;
