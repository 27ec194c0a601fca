//! Cross-module tests for the database format.
//!
//! These tests build images with [`DatabaseWriter`], load them through
//! both index strategies, and check lookups against a linear scan of the
//! source ranges.

use proptest::prelude::*;

use super::format::*;
use super::writer::DatabaseWriter;
use super::{resolve_entry, DatabaseImage, GeoRecord, IndexStrategy};
use crate::cache::CacheConfig;
use crate::database::Database;
use crate::error::LoadError;
use crate::reader::{GeoReader, ReaderConfig};

const COUNTRIES: &[&str] = &["中国", "美国", "澳大利亚", "", "\u{1}lead", "\u{2}lead"];
const REGIONS: &[&str] = &["北京市", "CZ88.NET", "", "\u{1}lead", "\u{2}lead", "福建省 电信"];

/// (begin, end, country index, region index)
type Range = (u32, u32, usize, usize);

fn build(ranges: &[Range]) -> Vec<u8> {
    let mut writer = DatabaseWriter::new();
    for &(begin, end, c, r) in ranges {
        writer
            .add_range(begin, end, COUNTRIES[c], REGIONS[r])
            .expect("Failed to add range");
    }
    writer.build().expect("Failed to build database")
}

fn load_both(data: &[u8]) -> (Database, Database) {
    let on_disk = Database::from_bytes(data.to_vec(), IndexStrategy::OnDisk).unwrap();
    let materialized = Database::from_bytes(data.to_vec(), IndexStrategy::Materialized).unwrap();
    (on_disk, materialized)
}

/// Linear reference lookup.
fn expected(ranges: &[Range], ip: u32) -> Option<GeoRecord> {
    ranges
        .iter()
        .find(|(begin, end, _, _)| *begin <= ip && ip <= *end)
        .map(|&(_, _, c, r)| GeoRecord::new(COUNTRIES[c], REGIONS[r]))
}

/// Ordered, disjoint ranges from sorted distinct points, paired up.
fn ranges_strategy() -> impl Strategy<Value = Vec<Range>> {
    (
        prop::collection::btree_set(any::<u32>(), 2..80),
        prop::collection::vec((0..COUNTRIES.len(), 0..REGIONS.len()), 40),
    )
        .prop_map(|(points, labels)| {
            let points: Vec<u32> = points.into_iter().collect();
            points
                .chunks_exact(2)
                .zip(labels.iter().cycle())
                .map(|(pair, &(c, r))| (pair[0], pair[1], c, r))
                .collect()
        })
}

/// Every address that sits on or next to a range boundary.
fn boundary_points(ranges: &[Range]) -> Vec<u32> {
    let mut points = vec![0, u32::MAX];
    for &(begin, end, _, _) in ranges {
        points.extend([
            begin.wrapping_sub(1),
            begin,
            begin + (end - begin) / 2,
            end,
            end.wrapping_add(1),
        ]);
    }
    points
}

// ============================================================================
// Load Validation Tests
// ============================================================================

#[test]
fn test_load_rejects_short_buffers() {
    for len in 0..HEADER_SIZE {
        assert!(matches!(
            DatabaseImage::from_bytes(vec![0; len]),
            Err(LoadError::TooSmall(n)) if n == len
        ));
    }
}

#[test]
fn test_load_rejects_bad_index_range() {
    let data = build(&[(0x01000000, 0x010000FF, 0, 0), (0x02000000, 0x020000FF, 1, 1)]);
    let index_begin = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let index_end = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

    let with_header = |begin: u32, end: u32| {
        let mut corrupt = data.clone();
        corrupt[0..4].copy_from_slice(&begin.to_le_bytes());
        corrupt[4..8].copy_from_slice(&end.to_le_bytes());
        corrupt
    };

    // begin > end
    let swapped = with_header(index_end, index_begin);
    assert!(matches!(
        DatabaseImage::from_bytes(swapped),
        Err(LoadError::BadIndexRange { .. })
    ));

    // span not a multiple of 7
    let ragged = with_header(index_begin + 1, index_end);
    assert!(matches!(
        DatabaseImage::from_bytes(ragged),
        Err(LoadError::BadIndexRange { .. })
    ));

    // last entry past the end of the buffer
    let mut truncated = data.clone();
    truncated.pop();
    assert!(matches!(
        DatabaseImage::from_bytes(truncated),
        Err(LoadError::BadIndexRange { .. })
    ));

    // end + 7 overflowing u32 must not wrap around
    let huge = with_header(u32::MAX - 6, u32::MAX - 6);
    assert!(matches!(
        DatabaseImage::from_bytes(huge),
        Err(LoadError::BadIndexRange { .. })
    ));
}

#[test]
fn test_load_tolerates_garbage_records() {
    // Header and index are sound; the record pointer lands on zero bytes.
    let mut data = Vec::new();
    data.extend_from_slice(&16u32.to_le_bytes());
    data.extend_from_slice(&16u32.to_le_bytes());
    data.extend_from_slice(&[0; 8]); // zero ip_end + empty record at 8
    data.extend_from_slice(&0u32.to_le_bytes()); // entry at 16: begin 0
    data.extend_from_slice(&[8, 0, 0]);

    let (on_disk, materialized) = load_both(&data);
    assert_eq!(on_disk.lookup_u32(0), Some(GeoRecord::default()));
    assert_eq!(materialized.lookup_u32(0), Some(GeoRecord::default()));
    assert_eq!(on_disk.lookup_u32(1), None);
    assert_eq!(materialized.lookup_u32(1), None);
}

// ============================================================================
// Lookup Tests
// ============================================================================

#[test]
fn test_gaps_and_edges() {
    let ranges = [
        (0x01000000, 0x010000FF, 0, 0),
        (0x01000100, 0x010003FF, 1, 1),
        // gap 0x01000400 - 0x01FFFFFF
        (0x02000000, 0x02000000, 2, 2),
        (0xFFFFFF00, 0xFFFFFFFF, 3, 3),
    ];
    let (on_disk, materialized) = load_both(&build(&ranges));

    for db in [&on_disk, &materialized] {
        assert_eq!(db.lookup("0.255.255.255").unwrap(), None);
        assert_eq!(
            db.lookup("1.0.0.0").unwrap(),
            Some(GeoRecord::new("中国", "北京市"))
        );
        assert_eq!(
            db.lookup("1.0.1.0").unwrap(),
            Some(GeoRecord::new("美国", "CZ88.NET"))
        );
        assert_eq!(db.lookup("1.0.4.0").unwrap(), None);
        assert_eq!(db.lookup("1.255.255.255").unwrap(), None);
        assert_eq!(
            db.lookup("2.0.0.0").unwrap(),
            Some(GeoRecord::new("澳大利亚", ""))
        );
        assert_eq!(db.lookup("2.0.0.1").unwrap(), None);
        assert_eq!(db.lookup("255.255.255.255").unwrap(), Some(GeoRecord::new("", "\u{1}lead")));
        assert!(db.lookup("1.0.0").is_err());
    }
}

#[test]
fn test_single_address_database() {
    let (on_disk, materialized) = load_both(&build(&[(0, 0, 0, 0)]));
    for db in [&on_disk, &materialized] {
        assert_eq!(db.segment_count(), 1);
        assert_eq!(db.lookup_u32(0), Some(GeoRecord::new("中国", "北京市")));
        assert_eq!(db.lookup_u32(1), None);
        assert_eq!(db.lookup_u32(u32::MAX), None);
    }
}

#[test]
fn test_shared_records_decode_independently() {
    // Same pair three times, then the same strings split across pairs
    let ranges = [
        (10, 19, 0, 0),
        (20, 29, 0, 0),
        (30, 39, 0, 0),
        (40, 49, 0, 1),
        (50, 59, 1, 0),
        (60, 69, 4, 4),
        (70, 79, 5, 3),
    ];
    let data = build(&ranges);
    let image = DatabaseImage::from_bytes(data.clone()).unwrap();

    // The repeated pair is stored once and redirected to
    let first = resolve_entry(&image, 0).unwrap().record_offset as usize;
    for i in 1..3 {
        let offset = resolve_entry(&image, i).unwrap().record_offset as usize;
        assert_eq!(data[offset], MODE_FULL_REDIRECT);
        assert_eq!(read_u24_le(&data, offset + 1).unwrap() as usize, first);
    }

    let (on_disk, materialized) = load_both(&data);
    for &(begin, end, _, _) in &ranges {
        for ip in [begin, end] {
            assert_eq!(on_disk.lookup_u32(ip), expected(&ranges, ip));
            assert_eq!(materialized.lookup_u32(ip), expected(&ranges, ip));
        }
    }
}

#[test]
fn test_last_entry_and_segments() {
    let ranges = [
        (0x01000000, 0x010000FF, 0, 0),
        (0x02000000, 0x020000FF, 1, 1),
        (0xFFFFFF00, 0xFFFFFFFF, 2, 1),
    ];
    let (on_disk, materialized) = load_both(&build(&ranges));

    for db in [&on_disk, &materialized] {
        assert_eq!(db.last_entry(), Some(GeoRecord::new("澳大利亚", "CZ88.NET")));

        let bounds: Vec<(u32, u32)> = db.segments().map(|s| (s.begin, s.end)).collect();
        assert_eq!(
            bounds,
            ranges.iter().map(|&(b, e, _, _)| (b, e)).collect::<Vec<_>>()
        );
    }
}

#[test]
fn test_writer_rejects_bad_input() {
    use crate::error::BuildError;

    let mut writer = DatabaseWriter::new();
    assert_eq!(writer.build(), Err(BuildError::Empty));
    assert_eq!(
        writer.add_range(10, 5, "a", "b"),
        Err(BuildError::InvertedRange { begin: 10, end: 5 })
    );
    writer.add_range(10, 20, "a", "b").unwrap();
    assert_eq!(
        writer.add_range(20, 30, "a", "b"),
        Err(BuildError::Unordered {
            begin: 20,
            previous_end: 20
        })
    );
    writer.add_range(21, 30, "a", "b").unwrap();
    assert_eq!(writer.len(), 2);
}

#[test]
fn test_mapped_and_owned_agree() {
    use std::io::Write;

    let ranges = [(0x01000000, 0x01FFFFFF, 0, 0), (0x03000000, 0x030000FF, 1, 5)];
    let data = build(&ranges);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();

    let mapped = Database::open(file.path(), IndexStrategy::Materialized).unwrap();
    let owned = Database::from_bytes(data, IndexStrategy::OnDisk).unwrap();
    assert!(mapped.image().is_mapped());
    assert!(!owned.image().is_mapped());

    for ip in boundary_points(&ranges) {
        assert_eq!(mapped.lookup_u32(ip), owned.lookup_u32(ip));
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_strategies_agree(ranges in ranges_strategy(), queries in prop::collection::vec(any::<u32>(), 64)) {
        let (on_disk, materialized) = load_both(&build(&ranges));
        for ip in queries.into_iter().chain(boundary_points(&ranges)) {
            prop_assert_eq!(on_disk.locate(ip), materialized.locate(ip));
            prop_assert_eq!(on_disk.lookup_u32(ip), materialized.lookup_u32(ip));
        }
    }

    #[test]
    fn prop_lookup_matches_linear_scan(ranges in ranges_strategy(), queries in prop::collection::vec(any::<u32>(), 64)) {
        let (on_disk, materialized) = load_both(&build(&ranges));
        for ip in queries.into_iter().chain(boundary_points(&ranges)) {
            let want = expected(&ranges, ip);
            prop_assert_eq!(on_disk.lookup_u32(ip), want.clone());
            prop_assert_eq!(materialized.lookup_u32(ip), want);
        }
    }

    #[test]
    fn prop_build_is_deterministic(ranges in ranges_strategy()) {
        prop_assert_eq!(build(&ranges), build(&ranges));
    }

    #[test]
    fn prop_cache_is_transparent(ranges in ranges_strategy(), picks in prop::collection::vec(any::<prop::sample::Index>(), 1..100)) {
        let data = build(&ranges);
        let points = boundary_points(&ranges);
        let queries: Vec<String> = picks
            .iter()
            .map(|pick| std::net::Ipv4Addr::from(points[pick.index(points.len())]).to_string())
            .collect();

        let cached = GeoReader::with_config(ReaderConfig::default().with_cache(CacheConfig::with_capacity(8)));
        let uncached = GeoReader::with_config(ReaderConfig::default().with_cache(CacheConfig::no_cache()));
        cached.load_bytes(data.clone()).unwrap();
        uncached.load_bytes(data).unwrap();

        // Each query twice so repeats hit the cache
        for query in queries.iter().chain(queries.iter()) {
            prop_assert_eq!(cached.lookup(query).unwrap(), uncached.lookup(query).unwrap());
        }
    }
}
