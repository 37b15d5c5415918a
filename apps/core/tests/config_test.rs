use std::time::{SystemTime, UNIX_EPOCH};

use pinboard_core::settings::WeightFactor;

fn temp_path(name: &str) -> std::path::PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir()
        .join(format!("pinboard-config-{unique}"))
        .join(name)
}

#[test]
fn rejects_grid_columns_out_of_range() {
    let cfg = pinboard_core::config::Config {
        grid_columns: 13,
        ..Default::default()
    };
    assert!(pinboard_core::config::validate(&cfg).is_err());

    let cfg = pinboard_core::config::Config {
        grid_columns: 0,
        ..Default::default()
    };
    assert!(pinboard_core::config::validate(&cfg).is_err());
}

#[test]
fn accepts_default_config() {
    let cfg = pinboard_core::config::Config::default();
    assert_eq!(cfg.grid_columns, 5);
    assert_eq!(cfg.max_favorites, 100);
    assert!(cfg.show_favorites);
    assert!(cfg.index_db_path.ends_with("favorites.sqlite3"));
    assert!(cfg.config_path.ends_with("config.toml"));
    assert!(pinboard_core::config::validate(&cfg).is_ok());
}

#[test]
fn missing_file_loads_defaults_at_that_path() {
    let path = temp_path("absent.toml");
    let cfg = pinboard_core::config::load(Some(&path)).unwrap();
    assert_eq!(cfg.config_path, path);
    assert_eq!(cfg.grid_columns, 5);
}

#[test]
fn saves_and_reloads_toml() {
    let path = temp_path("config.toml");
    let cfg = pinboard_core::config::Config {
        grid_columns: 7,
        weight_factor: WeightFactor::High,
        index_db_path: path.with_file_name("favorites.sqlite3"),
        config_path: path.clone(),
        ..Default::default()
    };
    pinboard_core::config::save(&cfg).unwrap();

    let loaded = pinboard_core::config::load(Some(&path)).unwrap();
    assert_eq!(loaded, cfg);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn partial_toml_keeps_defaults_for_missing_fields() {
    let path = temp_path("partial.toml");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "grid_columns = 3\nweight_factor = \"low\"\n").unwrap();

    let cfg = pinboard_core::config::load(Some(&path)).unwrap();
    assert_eq!(cfg.grid_columns, 3);
    assert_eq!(cfg.weight_factor, WeightFactor::Low);
    assert_eq!(cfg.max_favorites, 100);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn loads_json5_config() {
    let path = temp_path("config.json5");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        "{\n  // launcher grid\n  grid_columns: 4,\n  show_favorites: false,\n}\n",
    )
    .unwrap();

    let cfg = pinboard_core::config::load(Some(&path)).unwrap();
    assert_eq!(cfg.grid_columns, 4);
    assert!(!cfg.show_favorites);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn invalid_values_in_file_are_rejected() {
    let path = temp_path("bad.toml");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "max_favorites = 0\n").unwrap();

    assert!(matches!(
        pinboard_core::config::load(Some(&path)),
        Err(pinboard_core::config::ConfigError::Invalid(_))
    ));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn opens_favorites_store_from_config_path() {
    let mut cfg = pinboard_core::config::Config::default();
    cfg.index_db_path = temp_path("cfg-open.sqlite3");

    let store = pinboard_core::favorites_store::FavoritesStore::open_from_config(&cfg).unwrap();
    let item = pinboard_core::model::FavoriteRecord::new("website://a", "website", "{}");
    store.upsert(&item).unwrap();
    assert!(store.get("website://a").unwrap().is_some());

    drop(store);
    let _ = std::fs::remove_dir_all(cfg.index_db_path.parent().unwrap());
}
