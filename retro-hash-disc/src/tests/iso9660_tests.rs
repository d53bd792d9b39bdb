use super::*;
use retro_hash_core::{ArchiveBackend, Track, TrackType};

// -- Test helpers --

const SECTOR: usize = 2048;

/// In-memory backend over cooked 2048-byte sectors.
struct MemBackend {
    data: Vec<u8>,
    tracks: Vec<Track>,
}

impl MemBackend {
    fn new(data: Vec<u8>) -> Self {
        let track = Track::from_cue(1, TrackType::Mode1, (2048, 0, 2048), 0);
        Self {
            data,
            tracks: vec![track],
        }
    }
}

impl ArchiveBackend for MemBackend {
    fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn read_sector(&mut self, track: &Track, sector: u64) -> Result<Vec<u8>, DiscError> {
        let start = ((track.start_frame + sector) * track.physical_sector_size as u64) as usize;
        let end = (start + track.physical_sector_size as usize).min(self.data.len());
        if start >= self.data.len() {
            return Ok(Vec::new());
        }
        Ok(self.data[start..end].to_vec())
    }
}

fn data_track() -> Track {
    Track::from_cue(1, TrackType::Mode1, (2048, 0, 2048), 0)
}

/// Build a minimal 2048-byte PVD sector pointing the root directory at
/// `root_lba` with `root_size` bytes.
fn make_pvd_sector(root_lba: u32, root_size: u32) -> [u8; SECTOR] {
    let mut sector = [0u8; SECTOR];
    sector[0] = 0x01;
    sector[1..6].copy_from_slice(b"CD001");
    sector[6] = 0x01;

    let sys = b"PLAYSTATION";
    sector[8..8 + sys.len()].copy_from_slice(sys);
    for b in &mut sector[8 + sys.len()..40] {
        *b = b' ';
    }
    let vol = b"TEST_VOLUME";
    sector[40..40 + vol.len()].copy_from_slice(vol);
    for b in &mut sector[40 + vol.len()..72] {
        *b = b' ';
    }

    // Root directory record at offset 156
    sector[156] = 34;
    sector[158..162].copy_from_slice(&root_lba.to_le_bytes());
    sector[166..170].copy_from_slice(&root_size.to_le_bytes());
    sector[181] = 0x02; // directory flag

    sector
}

/// Build a directory record. Special entries use `"\0"` / `"\x01"` names.
fn make_dir_record(name: &str, extent_lba: u32, size: u32, is_dir: bool) -> Vec<u8> {
    let id = name.as_bytes();
    let record_len = 33 + id.len() + (id.len() + 1) % 2;
    let mut record = vec![0u8; record_len];
    record[0] = record_len as u8;
    record[2..6].copy_from_slice(&extent_lba.to_le_bytes());
    record[10..14].copy_from_slice(&size.to_le_bytes());
    record[25] = if is_dir { 0x02 } else { 0x00 };
    record[32] = id.len() as u8;
    record[33..33 + id.len()].copy_from_slice(id);
    record
}

/// Pack records into consecutive 2048-byte sectors, never letting a record
/// cross a sector boundary.
fn pack_directory(records: &[Vec<u8>]) -> Vec<u8> {
    let mut sectors: Vec<u8> = vec![0u8; SECTOR];
    let mut pos = 0;
    for record in records {
        if pos + record.len() > SECTOR {
            // zero padding already in place; start the next sector
            let filled = sectors.len();
            sectors.resize(filled + SECTOR, 0);
            pos = 0;
        }
        let base = sectors.len() - SECTOR + pos;
        sectors[base..base + record.len()].copy_from_slice(record);
        pos += record.len();
    }
    sectors
}

/// An image with sectors 0..16 empty, the PVD at 16, and caller-provided
/// sector payloads from LBA 18 on.
fn make_image(root_size: u32, sectors_from_18: &[Vec<u8>]) -> Vec<u8> {
    let mut image = vec![0u8; 16 * SECTOR];
    image.extend_from_slice(&make_pvd_sector(18, root_size));
    image.extend_from_slice(&[0u8; SECTOR]); // sector 17: VD terminator slot
    for payload in sectors_from_18 {
        let mut sector = payload.clone();
        assert!(sector.len() <= SECTOR);
        sector.resize(SECTOR, 0);
        image.extend_from_slice(&sector);
    }
    image
}

fn simple_root(records: &[Vec<u8>]) -> Vec<Vec<u8>> {
    let packed = pack_directory(records);
    packed.chunks(SECTOR).map(|c| c.to_vec()).collect()
}

fn specials() -> [Vec<u8>; 2] {
    [
        make_dir_record("\0", 18, 2048, true),
        make_dir_record("\x01", 18, 2048, true),
    ]
}

// -- PVD validation --

#[test]
fn test_open_reads_root_record() {
    let [dot, dotdot] = specials();
    let image = make_image(2048, &simple_root(&[dot, dotdot]));
    let mut backend = MemBackend::new(image);
    let iso = IsoReader::open(&mut backend, data_track()).unwrap();
    assert_eq!(iso.root().extent_lba, 18);
    assert_eq!(iso.root().size_bytes, 2048);
    assert!(iso.root().is_directory);
    assert_eq!(iso.system_identifier, "PLAYSTATION");
    assert_eq!(iso.volume_identifier, "TEST_VOLUME");
}

#[test]
fn test_open_rejects_missing_signature() {
    let mut image = make_image(2048, &[]);
    image[16 * SECTOR + 1..16 * SECTOR + 6].copy_from_slice(b"XX001");
    let mut backend = MemBackend::new(image);
    let err = IsoReader::open(&mut backend, data_track()).unwrap_err();
    assert!(matches!(err, DiscError::FilesystemNotFound(_)));
}

#[test]
fn test_open_rejects_wrong_descriptor_type() {
    let mut image = make_image(2048, &[]);
    image[16 * SECTOR] = 0x02;
    let mut backend = MemBackend::new(image);
    let err = IsoReader::open(&mut backend, data_track()).unwrap_err();
    assert!(matches!(err, DiscError::FilesystemNotFound(_)));
}

// -- Directory iteration --

#[test]
fn test_read_dir_skips_special_entries() {
    let [dot, dotdot] = specials();
    let records = vec![
        dot,
        dotdot,
        make_dir_record("SYSTEM.CNF;1", 19, 64, false),
        make_dir_record("DATA", 20, 2048, true),
    ];
    let image = make_image(2048, &simple_root(&records));
    let mut backend = MemBackend::new(image);
    let mut iso = IsoReader::open(&mut backend, data_track()).unwrap();

    let root = iso.root();
    let entries: Vec<_> = iso
        .read_dir(&root)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].name, "SYSTEM.CNF");
    assert!(!entries[0].is_directory);
    assert_eq!(entries[1].name, "DATA");
    assert!(entries[1].is_directory);
}

#[test]
fn test_read_dir_names_are_normalized() {
    let records = vec![make_dir_record("Game.Exe;12", 30, 100, false)];
    let image = make_image(2048, &simple_root(&records));
    let mut backend = MemBackend::new(image);
    let mut iso = IsoReader::open(&mut backend, data_track()).unwrap();

    let root = iso.root();
    let entries: Vec<_> = iso
        .read_dir(&root)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(entries[0].name, "GAME.EXE");
    assert_eq!(entries[0].extent_lba, 30);
    assert_eq!(entries[0].size_bytes, 100);
}

#[test]
fn test_read_dir_crosses_sector_boundary() {
    // Enough records to spill into a second sector; the packer leaves the
    // tail of the first sector zeroed so iteration must hop the boundary
    let mut records = Vec::new();
    for i in 0..50 {
        records.push(make_dir_record(
            &format!("FILE{:02}.DAT;1", i),
            100 + i,
            512,
            false,
        ));
    }
    let packed = simple_root(&records);
    assert!(packed.len() >= 2, "fixture should span sectors");
    let size = (packed.len() * SECTOR) as u32;
    let image = make_image(size, &packed);

    let mut backend = MemBackend::new(image);
    let mut iso = IsoReader::open(&mut backend, data_track()).unwrap();
    let root = iso.root();
    let entries: Vec<_> = iso
        .read_dir(&root)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(entries.len(), 50);
    assert_eq!(entries[49].name, "FILE49.DAT");
}

#[test]
fn test_read_dir_stops_at_declared_size() {
    // The directory claims one sector; a second sector full of records
    // follows but must never be touched
    let first = pack_directory(&[make_dir_record("REAL.TXT;1", 40, 10, false)]);
    let stray = pack_directory(&[make_dir_record("STRAY.TXT;1", 41, 10, false)]);
    let image = make_image(
        2048,
        &[first[..SECTOR].to_vec(), stray[..SECTOR].to_vec()],
    );

    let mut backend = MemBackend::new(image);
    let mut iso = IsoReader::open(&mut backend, data_track()).unwrap();
    let root = iso.root();
    let entries: Vec<_> = iso
        .read_dir(&root)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "REAL.TXT");
}

// -- Path resolution --

fn nested_image() -> Vec<u8> {
    // root (LBA 18): EXE dir -> LBA 19, SYSTEM.CNF -> LBA 21
    // EXE (LBA 19): GAME.EXE;1 -> LBA 20
    let root = pack_directory(&[
        make_dir_record("EXE", 19, 2048, true),
        make_dir_record("SYSTEM.CNF;1", 21, 32, false),
    ]);
    let exe_dir = pack_directory(&[make_dir_record("GAME.EXE;1", 20, 4000, false)]);
    let mut game = vec![0u8; SECTOR];
    game[..4].copy_from_slice(b"GAME");
    make_image(
        2048,
        &[
            root[..SECTOR].to_vec(),
            exe_dir[..SECTOR].to_vec(),
            game,
        ],
    )
}

#[test]
fn test_find_file_in_root() {
    let mut backend = MemBackend::new(nested_image());
    let mut iso = IsoReader::open(&mut backend, data_track()).unwrap();
    let entry = iso.find_file("SYSTEM.CNF").unwrap().unwrap();
    assert_eq!(entry.extent_lba, 21);
    assert_eq!(entry.size_bytes, 32);
}

#[test]
fn test_find_file_nested_path() {
    let mut backend = MemBackend::new(nested_image());
    let mut iso = IsoReader::open(&mut backend, data_track()).unwrap();
    let entry = iso.find_file("EXE/GAME.EXE").unwrap().unwrap();
    assert_eq!(entry.extent_lba, 20);
    assert_eq!(entry.size_bytes, 4000);
}

#[test]
fn test_find_file_case_and_version_insensitive() {
    let mut backend = MemBackend::new(nested_image());
    let mut iso = IsoReader::open(&mut backend, data_track()).unwrap();
    assert!(iso.find_file("exe/game.exe").unwrap().is_some());
    assert!(iso.find_file("Exe/Game.Exe;1").unwrap().is_some());
}

#[test]
fn test_find_file_missing_segment() {
    let mut backend = MemBackend::new(nested_image());
    let mut iso = IsoReader::open(&mut backend, data_track()).unwrap();
    assert!(iso.find_file("NOPE/GAME.EXE").unwrap().is_none());
    assert!(iso.find_file("EXE/NOPE.EXE").unwrap().is_none());
    assert!(iso.find_file("").unwrap().is_none());
}

#[test]
fn test_find_file_rejects_directory_as_file() {
    let mut backend = MemBackend::new(nested_image());
    let mut iso = IsoReader::open(&mut backend, data_track()).unwrap();
    // Final segment names a directory, not a file
    assert!(iso.find_file("EXE").unwrap().is_none());
}

// -- File reads --

#[test]
fn test_read_file_exact_size() {
    // 2.5 sectors of patterned data
    let total = SECTOR * 2 + 1024;
    let mut payload = Vec::with_capacity(total);
    for i in 0..total {
        payload.push((i * 31 % 251) as u8);
    }

    let root = pack_directory(&[make_dir_record("BIG.BIN;1", 19, total as u32, false)]);
    let mut sectors = vec![root[..SECTOR].to_vec()];
    for chunk in payload.chunks(SECTOR) {
        sectors.push(chunk.to_vec());
    }
    let image = make_image(2048, &sectors);

    let mut backend = MemBackend::new(image);
    let mut iso = IsoReader::open(&mut backend, data_track()).unwrap();
    let entry = iso.find_file("BIG.BIN").unwrap().unwrap();
    let contents = iso.read_file(&entry).unwrap();
    assert_eq!(contents, payload);
}

#[test]
fn test_read_file_truncated_image() {
    // Directory claims more data than the image holds; the read returns
    // what exists instead of spinning
    let root = pack_directory(&[make_dir_record("HUGE.BIN;1", 19, 100_000, false)]);
    let image = make_image(2048, &[root[..SECTOR].to_vec(), vec![0xAB; SECTOR]]);

    let mut backend = MemBackend::new(image);
    let mut iso = IsoReader::open(&mut backend, data_track()).unwrap();
    let entry = iso.find_file("HUGE.BIN").unwrap().unwrap();
    let contents = iso.read_file(&entry).unwrap();
    assert_eq!(contents.len(), SECTOR);
    assert!(contents.iter().all(|&b| b == 0xAB));
}
