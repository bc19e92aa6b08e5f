/// Integration tests for imdtools

use imdtools::*;
use proptest::prelude::*;
use std::fs::File;
use std::io::{BufReader, Cursor};
use tempfile::NamedTempFile;

const HEADER: &[u8] = b"IMD 1.18: 14/02/2016 21:49:45\r\n";

/// One track, one 512-byte sector stored compressed as 0xE5
fn single_compressed_sector() -> Vec<u8> {
    let mut bytes = HEADER.to_vec();
    bytes.extend_from_slice(b"Sample disk\x1a");
    bytes.extend_from_slice(&[5, 0, 0, 1, 2, 1, 2, 0xE5]);
    bytes
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[test]
fn test_compressed_sector_end_to_end() {
    let image = ImageFile::read_from(Cursor::new(single_compressed_sector()), 0xE5)
        .expect("Failed to read image");

    assert_eq!(image.comment(), b"Sample disk");
    assert_eq!(image.header().version(), Some("1.18"));

    let track = &image.tracks()[0];
    assert_eq!(track.sector_size(), 512);
    let status = track.status(0).expect("Missing status");
    assert!(status.has_data());
    assert!(status.is_compressed());
    assert!(!status.has_error());
    assert!(!status.is_deleted());
    assert_eq!(track.sector_data(0).expect("Missing data"), &[0xE5; 512][..]);

    let opts = WriteOptions {
        compression: CompressionMode::ForceDecompress,
        ..WriteOptions::default()
    };
    let mut out = Vec::new();
    image.write_to(&mut out, &opts).expect("Failed to write image");

    let track_start = out.len() - (5 + 1 + 1 + 512);
    assert_eq!(&out[track_start..track_start + 5], &[5, 0, 0, 1, 2]);
    assert_eq!(out[track_start + 6], 1);
    assert!(out[track_start + 7..].iter().all(|&b| b == 0xE5));
}

#[test]
fn test_save_and_open() {
    let temp_file = NamedTempFile::new().unwrap();

    let image = ImageBuilder::new()
        .cylinders(3)
        .sides(2)
        .format(TrackFormat::sequential(DataMode::Mfm250, 2, 1, 9))
        .comment("Built from raw data")
        .build(Cursor::new(vec![0xE5; 3 * 2 * 9 * 512]))
        .expect("Failed to build image");
    image
        .save(temp_file.path(), &WriteOptions::default())
        .expect("Failed to save image");

    let loaded = ImageFile::open(temp_file.path()).expect("Failed to open image");
    assert_eq!(loaded, image);
    assert_eq!(loaded.track_count(), 6);
    assert_eq!(loaded.head_count(), 2);
    assert_eq!(loaded.comment_text(), "Built from raw data");

    let file = BufReader::new(File::open(temp_file.path()).unwrap());
    let results = run_checks(file, &CheckOptions::default());
    assert!(results.failures.is_empty(), "{}", results.failures);
    assert_eq!(results.max_cylinder, [Some(2), Some(2)]);
    assert_eq!(results.stats.total, 54);
}

#[test]
fn test_builder_compression_on_save() {
    let builder = ImageBuilder::new()
        .cylinders(1)
        .format(TrackFormat::sequential(DataMode::Mfm300, 1, 1, 2));
    let mut raw = vec![0x00; 256];
    raw.extend((0..256).map(|i| i as u8));
    let image = builder.build(Cursor::new(raw)).unwrap();

    let mut out = Vec::new();
    image.write_to(&mut out, &builder.write_options()).unwrap();
    let loaded = ImageFile::read_from(Cursor::new(out), 0xE5).unwrap();

    let track = &loaded.tracks()[0];
    assert_eq!(track.status(0), Some(SectorStatus::COMPRESSED));
    assert_eq!(track.status(1), Some(SectorStatus::NORMAL));
    assert_eq!(track.get_sector(2).unwrap()[255], 255);
}

#[test]
fn test_check_and_compare_files() {
    let a = NamedTempFile::new().unwrap();
    let b = NamedTempFile::new().unwrap();
    std::fs::write(a.path(), single_compressed_sector()).unwrap();

    let image = ImageFile::open(a.path()).unwrap();
    let opts = WriteOptions {
        compression: CompressionMode::ForceDecompress,
        ..WriteOptions::default()
    };
    image.save(b.path(), &opts).unwrap();

    let result = compare_images(
        File::open(a.path()).unwrap(),
        File::open(b.path()).unwrap(),
        false,
    )
    .unwrap();
    assert!(result.flags.compression_only());
    assert!(!result.flags.contains(DiffFlags::TRACK_DATA));

    let result = compare_images(
        File::open(a.path()).unwrap(),
        File::open(b.path()).unwrap(),
        true,
    )
    .unwrap();
    assert!(!result.flags.is_hard());
    assert!(!result.flags.contains(DiffFlags::COMPRESS));
}

#[test]
fn test_image_bytes_round_trip() {
    let mut bytes = b"IMD 1.18: 14/02/2016 21:49:45 \xC9dition\r\n".to_vec();
    bytes.extend_from_slice(b"Caf\xE9\x1a");
    bytes.extend_from_slice(&[5, 0, 0, 1, 2, 1, 2, 0xE5]);

    let image = ImageFile::read_from(Cursor::new(bytes.clone()), 0xE5).unwrap();
    let mut out = Vec::new();
    image.write_to(&mut out, &WriteOptions::default()).unwrap();
    assert_eq!(out, bytes);
}

#[test]
fn test_duplicate_ids_detected() {
    let mut bytes = HEADER.to_vec();
    bytes.push(0x1A);
    bytes.extend_from_slice(&[5, 0, 0, 4, 0, 1, 2, 2, 4, 0, 0, 0, 0]);

    let results = run_checks(Cursor::new(bytes), &CheckOptions::default());
    assert!(results.failures.contains(CheckFailures::DUPE_SID));
    assert!(!results.failures.errors(DEFAULT_ERROR_MASK).is_empty());
}

#[test]
fn test_convert_rate_translation() {
    let mut opts = ConvertOptions::default();
    assert!(opts.write.mode_translation.translate_rate(300, 250));

    let mut out = Vec::new();
    let mut input = HEADER.to_vec();
    input.push(0x1A);
    input.extend_from_slice(&[1, 0, 0, 1, 0, 1, 2, 0x00]);
    input.extend_from_slice(&[4, 1, 0, 1, 0, 1, 2, 0x00]);
    convert(Cursor::new(input), &mut out, &opts).unwrap();

    let image = ImageFile::read_from(Cursor::new(out), 0xE5).unwrap();
    assert_eq!(image.tracks()[0].data_mode(), Some(DataMode::Fm250));
    assert_eq!(image.tracks()[1].data_mode(), Some(DataMode::Mfm250));
}

#[test]
fn test_analyze_built_image() {
    let temp_file = NamedTempFile::new().unwrap();
    let image = ImageBuilder::new()
        .cylinders(40)
        .sides(2)
        .format(TrackFormat::sequential(DataMode::Mfm250, 2, 1, 9))
        .build(Cursor::new(vec![0xE5; 40 * 2 * 9 * 512]))
        .unwrap();
    image.save(temp_file.path(), &WriteOptions::default()).unwrap();

    let file = BufReader::new(File::open(temp_file.path()).unwrap());
    let result = analyze(file).unwrap();
    assert_eq!(result.track_count, 80);
    assert_eq!(result.data_rates, vec![250]);
    assert_eq!(result.recommendations[0].drive, DriveType::D525Dd40);
    assert!(result.recommendations[1]
        .options
        .contains(&DriveOption::DoubleStep));
}

// Proptest strategies

/// (status byte, fill byte, noise) for one 128-byte sector
fn sector_params() -> impl Strategy<Value = (u8, u8, Vec<u8>)> {
    (0u8..=8, any::<u8>(), prop::collection::vec(any::<u8>(), 128))
}

fn track_params() -> impl Strategy<Value = (u8, u8, u8, bool, bool, Vec<u8>, Vec<(u8, u8, Vec<u8>)>)> {
    (
        0u8..6,
        any::<u8>(),
        0u8..2,
        any::<bool>(),
        any::<bool>(),
        prop::collection::hash_set(any::<u8>(), 1..12),
    )
        .prop_flat_map(|(mode, cyl, head, cmap, hmap, ids)| {
            let ids: Vec<u8> = ids.into_iter().collect();
            let n = ids.len();
            (
                Just(mode),
                Just(cyl),
                Just(head),
                Just(cmap),
                Just(hmap),
                Just(ids),
                prop::collection::vec(sector_params(), n),
            )
        })
}

proptest! {
    #[test]
    fn prop_track_round_trip(
        (mode, cyl, head, cmap, hmap, ids, sectors) in track_params()
    ) {
        let mode = DataMode::from_code(mode).unwrap();
        let mut track = Track::new(cyl, head, mode, 0).unwrap();
        for (&id, (wire, fill, noise)) in ids.iter().zip(&sectors) {
            let status = SectorStatus::from_wire(*wire).unwrap();
            let data = match status {
                SectorStatus::Unavailable => vec![0xE5; 128],
                s if s.is_compressed() => vec![*fill; 128],
                _ => noise.clone(),
            };
            track.add_sector(id, status, &data).unwrap();
        }
        if cmap {
            track.set_cylinder_map(Some(ids.iter().map(|id| id ^ 0x55).collect())).unwrap();
        }
        if hmap {
            track.set_head_map(Some(vec![head ^ 1; ids.len()])).unwrap();
        }

        let mut image = ImageFile::new("proptest");
        image.add_track(track.clone());
        let mut out = Vec::new();
        image.write_to(&mut out, &WriteOptions::default()).unwrap();
        let loaded = ImageFile::read_from(Cursor::new(out), 0xE5).unwrap();

        prop_assert_eq!(loaded.tracks().len(), 1);
        prop_assert_eq!(&loaded.tracks()[0], &track);
    }

    #[test]
    fn prop_uniform_iff_compressible(data in prop::collection::vec(any::<u8>(), 1..512)) {
        let all_equal = data.iter().all(|&b| b == data[0]);
        prop_assert_eq!(is_uniform(&data).is_some(), all_equal);

        let status = SectorStatus::NORMAL.resolve(&data, CompressionMode::ForceCompress, false, false);
        prop_assert_eq!(status.is_compressed(), all_equal);
        if let Some(b) = is_uniform(&data) {
            prop_assert!(data.iter().all(|&x| x == b));
        }
    }

    #[test]
    fn prop_force_compress_preserves_data(
        fill in any::<u8>(),
        noise in prop::collection::vec(any::<u8>(), 256),
        uniform in any::<bool>()
    ) {
        let data = if uniform { vec![fill; 256] } else { noise };
        let mut track = Track::new(0, 0, DataMode::Mfm250, 1).unwrap();
        track.add_sector(1, SectorStatus::NORMAL, &data).unwrap();

        let mut image = ImageFile::new("proptest");
        image.add_track(track);
        let opts = WriteOptions {
            compression: CompressionMode::ForceCompress,
            ..WriteOptions::default()
        };
        let mut out = Vec::new();
        image.write_to(&mut out, &opts).unwrap();
        let loaded = ImageFile::read_from(Cursor::new(out), 0xE5).unwrap();

        prop_assert_eq!(loaded.tracks()[0].sector_data(0).unwrap(), &data[..]);
        prop_assert_eq!(
            loaded.tracks()[0].status(0).unwrap().is_compressed(),
            is_uniform(&data).is_some()
        );
    }

    #[test]
    fn prop_interleave_synthesis(
        n in 2usize..=64,
        skip_seed in any::<usize>(),
        rotation in any::<usize>(),
        base in 0u8..=191
    ) {
        let skip = 1 + skip_seed % (n - 1);
        prop_assume!(gcd(skip, n) == 1);

        let smap: Vec<u8> = (0..n)
            .map(|p| base + (((p + rotation % n) * skip) % n) as u8)
            .collect();
        prop_assert_eq!(calculate_best_interleave(&smap), Interleave::Known(skip as u8));
    }
}
