use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use pinboard_core::backup;
use pinboard_core::favorites_store::FavoritesStore;
use pinboard_core::model::FavoriteRecord;

fn temp_dir(label: &str) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("pinboard-backup-{label}-{unique}"))
}

fn record(n: usize) -> FavoriteRecord {
    let url = format!("https://site-{n:03}.example");
    FavoriteRecord::new(
        &format!("website://{url}"),
        "website",
        &format!("{{\"url\":\"{url}\",\"label\":\"Site {n}\"}}"),
    )
}

fn all_records(store: &FavoritesStore) -> Vec<FavoriteRecord> {
    store.page(10_000, 0).unwrap()
}

#[test]
fn export_then_import_reproduces_every_record() {
    let dir = temp_dir("roundtrip");
    let source = FavoritesStore::open_memory().unwrap();
    let mut records = Vec::new();
    for n in 0..250 {
        let mut record = record(n);
        if n % 7 == 0 {
            record = record.with_pin((n % 3) as u32 + 1);
        } else if n % 11 == 0 {
            record = record.with_usage(n as u32, 0.25).hidden();
        } else {
            record = record.with_usage(n as u32, 0.5);
        }
        records.push(record);
    }
    source.replace_all(&records).unwrap();

    assert_eq!(backup::export(&source, &dir).unwrap(), 250);
    assert!(dir.join("favorites.0000").is_file());
    assert!(dir.join("favorites.0002").is_file());
    assert!(!dir.join("favorites.0003").exists());

    let target = FavoritesStore::open_memory().unwrap();
    target.upsert(&record(999)).unwrap();
    assert_eq!(backup::import(&target, &dir).unwrap(), 250);
    assert_eq!(all_records(&target), all_records(&source));

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn import_skips_malformed_pages_and_untyped_entries() {
    let dir = temp_dir("malformed");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("favorites.0000"), "not json").unwrap();
    std::fs::write(
        dir.join("favorites.0001"),
        r#"[
            {"key":"website://a","type":"website","launchCount":3,"pinPosition":0,
             "hidden":false,"searchable":"{\"url\":\"a\",\"label\":\"A\"}"},
            {"key":"website://b","launchCount":1,"searchable":"{}"}
        ]"#,
    )
    .unwrap();
    std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

    let store = FavoritesStore::open_memory().unwrap();
    assert_eq!(backup::import(&store, &dir).unwrap(), 1);

    let imported = store.get("website://a").unwrap().unwrap();
    assert_eq!(imported.launch_count, 3);
    assert_eq!(imported.weight, 0.0);
    assert!(store.get("website://b").unwrap().is_none());

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn exporting_an_empty_table_writes_one_empty_page() {
    let dir = temp_dir("empty");
    let store = FavoritesStore::open_memory().unwrap();

    assert_eq!(backup::export(&store, &dir).unwrap(), 0);
    let raw = std::fs::read_to_string(dir.join("favorites.0000")).unwrap();
    assert_eq!(raw, "[]");

    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn importing_from_a_missing_directory_empties_the_table() {
    let dir = temp_dir("missing");
    let store = FavoritesStore::open_memory().unwrap();
    store.upsert(&record(1).with_pin(2)).unwrap();

    assert_eq!(backup::import(&store, &dir).unwrap(), 0);
    assert_eq!(store.count().unwrap(), 0);
    assert!(!dir.exists());
}
