use pretty_assertions::assert_eq;
use simpak::prelude::*;
use simpak::package::{IndexRecord, PackageProgress};
use simpak::resources::types;
use std::rc::Rc;
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn trait_tuning() -> XmlResource {
    XmlResource::create(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<I c=\"Trait\" i=\"trait\" m=\"traits.traits\" n=\"frankkulak_LB:trait_SimlishNative\" s=\"1234\">\n  <T n=\"value\">50</T>\n</I>",
    )
}

fn test_key() -> ResourceKey {
    ResourceKey::new(123, 456, 789)
}

/// A package shaped like a small trait mod: tuning, its string table, and
/// an opaque binary resource
fn trait_package() -> Package {
    let mut package = Package::create();
    package
        .add(
            ResourceKey::new(types::TRAIT, 0, 0x1234),
            Box::new(trait_tuning()),
        )
        .unwrap();
    package
        .add(
            ResourceKey::new(types::STRING_TABLE, 0x8000_0000, 0x0012_3456_789A_BCDE),
            Box::new(StringTableResource::create(vec![
                (fnv32("trait name"), "Simlish Native".to_string()),
                (fnv32("trait description"), "Speaks Simlish.".to_string()),
            ])),
        )
        .unwrap();
    package
        .add(
            ResourceKey::new(types::SIMDATA, 0, 0x1234),
            Box::new(RawResource::from_bytes(&[0xDA, 0x7A, 0x00, 0x01, 0x02])),
        )
        .unwrap();
    package
}

fn read(bytes: &[u8]) -> Package {
    Package::from_bytes(bytes, &PackageReadOptions::default()).unwrap()
}

#[test]
fn test_add_then_get() {
    let mut package = Package::create();
    let id = package.add(test_key(), Box::new(trait_tuning())).unwrap();
    assert_eq!(package.len(), 1);

    let entry = package.get(id).unwrap();
    assert!(entry.key_equals(&test_key()));
    assert!(entry.value().equals(&trait_tuning()));
}

#[test]
fn test_clear_resets_ids() {
    let mut package = trait_package();
    package.clear();
    assert!(package.is_empty());
    assert_eq!(package.add(test_key(), Box::new(trait_tuning())).unwrap(), 0);
}

#[test]
fn test_delete_shared_key_resolves_to_remaining_entry() {
    let mut package = Package::create();
    let first = package.add(test_key(), Box::new(trait_tuning())).unwrap();
    let second = package.add(test_key(), Box::new(XmlResource::create("<I/>"))).unwrap();
    assert_eq!(package.get_id_for_key(&test_key()), Some(second));

    assert!(package.delete(second));
    assert!(package.has_key(&test_key()));
    assert_eq!(package.get_id_for_key(&test_key()), Some(first));
}

#[test]
fn test_round_trip() {
    init_tracing();
    let original = trait_package();
    let parsed = read(&original.serialize().unwrap());

    assert_eq!(parsed.len(), original.len());
    for (before, after) in original.entries().zip(parsed.entries()) {
        assert_eq!(before.key(), after.key());
        assert_eq!(
            before.value().serialize().unwrap().to_vec(),
            after.value().serialize().unwrap().to_vec()
        );
    }
    assert!(parsed.equals(&original));
}

#[test]
fn test_uncache_twice_is_same_as_once() {
    let package = read(&trait_package().serialize().unwrap());
    let entry = package.get(1).unwrap();

    entry.value().uncache();
    assert!(!entry.value().is_cached());
    assert!(!package.is_cached());

    entry.value().uncache();
    assert!(!entry.value().is_cached());
    assert!(!package.is_cached());
    assert!(package.get(0).unwrap().value().is_cached());
}

#[test]
fn test_mutating_one_entry_leaves_siblings_cached() {
    let mut package = read(&trait_package().serialize().unwrap());
    assert!(package.is_cached());

    package
        .get_mut(0)
        .unwrap()
        .update_value(|xml: &mut XmlResource| {
            xml.update_content(|content| *content = content.replace("50", "75"));
        })
        .unwrap();

    assert!(!package.is_cached());
    assert!(!package.get(0).unwrap().value().is_cached());
    assert!(package.get(1).unwrap().value().is_cached());
    assert!(package.get(2).unwrap().value().is_cached());

    let reread = read(&package.serialize().unwrap());
    let xml = reread.get(0).unwrap().value_as::<XmlResource>().unwrap();
    assert!(xml.content().contains("<T n=\"value\">75</T>"));
}

#[test]
fn test_unchanged_entries_are_copied_verbatim() {
    let bytes = trait_package().serialize().unwrap();
    let mut package = read(&bytes);
    let before = Package::read_index(&bytes).unwrap();

    package
        .get_mut(1)
        .unwrap()
        .update_value(|stbl: &mut StringTableResource| {
            stbl.add_and_hash("Extra", None).unwrap();
        })
        .unwrap();
    let rewritten = package.serialize().unwrap();
    let after = Package::read_index(&rewritten).unwrap();

    let payload = |data: &[u8], record: &IndexRecord| {
        let start = record.offset as usize;
        data[start..start + record.file_size as usize].to_vec()
    };
    assert_eq!(payload(&bytes[..], &before[0]), payload(&rewritten[..], &after[0]));
    assert_eq!(payload(&bytes[..], &before[2]), payload(&rewritten[..], &after[2]));
    assert!(after[1].mem_size > before[1].mem_size);
}

#[test]
fn test_entry_ids_memoized_until_structural_change() {
    let mut package = read(&trait_package().serialize().unwrap());
    let ids = package.entry_ids();
    assert!(Rc::ptr_eq(&ids, &package.entry_ids()));

    package.get_mut(0).unwrap().set_key(test_key());
    assert!(Rc::ptr_eq(&ids, &package.entry_ids()));

    package.add(ResourceKey::new(1, 1, 1), Box::new(XmlResource::create("<I/>"))).unwrap();
    let after_add = package.entry_ids();
    assert!(!Rc::ptr_eq(&ids, &after_add));

    package.delete(0);
    assert!(!Rc::ptr_eq(&after_add, &package.entry_ids()));

    let before_clear = package.entry_ids();
    package.clear();
    assert!(!Rc::ptr_eq(&before_clear, &package.entry_ids()));
}

#[test]
fn test_empty_package_round_trip() {
    let package = read(&Package::create().serialize().unwrap());
    assert_eq!(package.len(), 0);
}

#[test]
fn test_single_entry_round_trip() {
    let mut package = read(&Package::create().serialize().unwrap());
    package.add(test_key(), Box::new(trait_tuning())).unwrap();

    let parsed = read(&package.serialize().unwrap());
    assert_eq!(parsed.len(), 1);
    assert!(parsed.get(0).unwrap().key_equals(&test_key()));
}

#[test]
fn test_delete_does_not_renumber() {
    let mut package = Package::create();
    package.add(test_key(), Box::new(trait_tuning())).unwrap();
    package.add(ResourceKey::new(1, 2, 3), Box::new(XmlResource::create("<I/>"))).unwrap();

    assert!(package.delete(0));
    assert_eq!(package.len(), 1);
    assert!(package.get(0).is_none());
    assert!(package.get(1).unwrap().key_equals(&ResourceKey::new(1, 2, 3)));

    // Parsing assigns fresh ids from 0
    let parsed = read(&package.serialize().unwrap());
    assert!(parsed.get(0).unwrap().key_equals(&ResourceKey::new(1, 2, 3)));
}

#[test]
fn test_validate_rejects_identical_keys_only() {
    let mut package = Package::create();
    package.add(ResourceKey::new(1, 2, 3), Box::new(trait_tuning())).unwrap();
    package.add(ResourceKey::new(1, 5, 3), Box::new(trait_tuning())).unwrap();
    assert!(package.validate().is_ok());

    package.add(ResourceKey::new(1, 2, 3), Box::new(trait_tuning())).unwrap();
    assert!(matches!(package.validate(), Err(Error::DuplicateKey { .. })));
}

#[test]
fn test_recovery_mode_keeps_broken_entries_raw() {
    init_tracing();
    let mut package = Package::create();
    package
        .add(
            ResourceKey::new(types::STRING_TABLE, 0, 1),
            Box::new(RawResource::from_bytes(b"not a string table")),
        )
        .unwrap();
    package.add(test_key(), Box::new(trait_tuning())).unwrap();
    let bytes = package.serialize().unwrap();

    let strict = Package::from_bytes(&bytes, &PackageReadOptions::default());
    assert!(matches!(strict, Err(Error::ResourceDecodeFailed { .. })));

    let options = PackageReadOptions::new().with_recovery_mode(true);
    let recovered = Package::from_bytes(&bytes, &options).unwrap();
    assert_eq!(recovered.len(), 2);
    let raw = recovered.get(0).unwrap().value_as::<RawResource>().unwrap();
    assert_eq!(raw.bytes(), b"not a string table");
    assert!(raw.reason().is_some());
    assert_eq!(recovered.serialize().unwrap(), bytes);
}

#[test]
fn test_recovery_mode_still_rejects_broken_container() {
    let bytes = trait_package().serialize().unwrap().to_vec();
    let options = PackageReadOptions::new().with_recovery_mode(true);

    let mut bad_magic = bytes.clone();
    bad_magic[..4].copy_from_slice(b"DBBF");
    assert!(matches!(
        Package::from_bytes(&bad_magic, &options),
        Err(Error::InvalidPackageMagic(_))
    ));

    let mut bad_version = bytes.clone();
    bad_version[4..8].copy_from_slice(&3u32.to_le_bytes());
    assert!(matches!(
        Package::from_bytes(&bad_version, &options),
        Err(Error::UnsupportedFormatVersion { major: 3, .. })
    ));

    let mut index_past_end = bytes.clone();
    index_past_end[64..72].copy_from_slice(&(bytes.len() as u64).to_le_bytes());
    assert!(matches!(
        Package::from_bytes(&index_past_end, &options),
        Err(Error::MalformedPackage(_))
    ));

    // One more record than the index table holds
    let mut too_many_records = bytes.clone();
    too_many_records[36..40].copy_from_slice(&4u32.to_le_bytes());
    assert!(matches!(
        Package::from_bytes(&too_many_records, &options),
        Err(Error::MalformedPackage(_))
    ));
}

#[test]
fn test_internal_compression_round_trip() {
    let mut package = trait_package();
    for id in package.entry_ids().iter().copied() {
        package
            .get_mut(id)
            .unwrap()
            .set_compression_type(CompressionType::InternalCompression);
    }

    let bytes = package.serialize().unwrap();
    let records = Package::read_index(&bytes).unwrap();
    assert!(records
        .iter()
        .all(|record| record.compression == CompressionType::InternalCompression));

    let parsed = read(&bytes);
    assert!(parsed.equals(&trait_package()));
}

#[test]
fn test_async_wrapper() {
    let bytes = trait_package().serialize().unwrap();
    let options = PackageReadOptions::default();
    let package = futures::executor::block_on(Package::from_bytes_async(&bytes, &options)).unwrap();
    assert_eq!(package.len(), 3);

    let error = futures::executor::block_on(Package::from_bytes_async(b"nope", &options));
    assert!(error.is_err());
}

#[test]
fn test_write_and_read_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Trait.package");

    let package = trait_package();
    package.write_to_path(&path).unwrap();

    let loaded = Package::from_path(&path, &PackageReadOptions::default()).unwrap();
    assert!(loaded.equals(&package));
    assert_eq!(std::fs::read(&path).unwrap(), loaded.serialize().unwrap().to_vec());
}

#[test]
fn test_progress_reports_every_entry() {
    let bytes = trait_package().serialize().unwrap();
    let seen = std::cell::RefCell::new(Vec::new());
    let last = std::cell::RefCell::new(None);
    Package::from_bytes_with_progress(&bytes, &PackageReadOptions::default(), &|progress: &PackageProgress| {
        if let Some(key) = progress.current_key {
            seen.borrow_mut().push((progress.current, key, progress.percentage()));
        }
        *last.borrow_mut() = Some(progress.phase.as_str());
    })
    .unwrap();

    let seen = seen.into_inner();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].0, 1);
    assert_eq!(seen[0].1, ResourceKey::new(types::TRAIT, 0, 0x1234));
    assert!((seen[0].2 - 1.0 / 3.0).abs() < f32::EPSILON);
    assert!((seen[2].2 - 1.0).abs() < f32::EPSILON);
    assert_eq!(last.into_inner(), Some("Complete"));
}

#[test]
fn test_key_text_form() {
    let key: ResourceKey = "220557DA:80000000:00123456789ABCDE".parse().unwrap();
    assert_eq!(key, ResourceKey::new(types::STRING_TABLE, 0x8000_0000, 0x0012_3456_789A_BCDE));
    assert_eq!(key.to_string(), "220557DA:80000000:00123456789ABCDE");
    assert!(matches!(
        "1:2:10000000000000000".parse::<ResourceKey>(),
        Err(Error::KeyRange { field: "instance", .. })
    ));
}
