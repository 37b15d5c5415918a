use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use pinboard_core::codec::SearchableCodec;
use pinboard_core::contract::{
    CoreRequest, CoreResponse, FavoritesRequest, ItemRequest, KeysRequest,
};
use pinboard_core::favorites::FavoritesRepository;
use pinboard_core::favorites_store::FavoritesStore;
use pinboard_core::model::{CalendarEvent, Searchable};
use pinboard_core::settings::{LauncherSettings, SettingsStore};
use pinboard_core::transport::{handle_json, handle_request, ErrorCode, TransportResponse};

fn repository() -> FavoritesRepository {
    repository_on(FavoritesStore::open_memory().unwrap())
}

fn repository_on(store: FavoritesStore) -> FavoritesRepository {
    FavoritesRepository::new(
        Arc::new(store),
        Arc::new(SettingsStore::new(LauncherSettings::default())),
        SearchableCodec::default(),
        tokio::runtime::Handle::current(),
    )
}

fn mail() -> Searchable {
    Searchable::app("org.example.mail", "Inbox", "Mail")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pin_request_is_visible_to_the_next_favorites_request() {
    let repo = repository();

    let pinned = handle_request(&repo, CoreRequest::Pin(ItemRequest { item: mail() })).await;
    assert!(matches!(
        pinned,
        TransportResponse::Ok {
            response: CoreResponse::Mutation(_)
        }
    ));

    let response = handle_request(
        &repo,
        CoreRequest::Favorites(FavoritesRequest { columns: Some(4) }),
    )
    .await;
    match response {
        TransportResponse::Ok {
            response: CoreResponse::Favorites(payload),
        } => {
            assert_eq!(payload.items.len(), 1);
            assert_eq!(payload.items[0].key, "app://org.example.mail:Inbox");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    let flag = handle_request(&repo, CoreRequest::IsPinned(ItemRequest { item: mail() })).await;
    match flag {
        TransportResponse::Ok {
            response: CoreResponse::Flag(flag),
        } => assert!(flag.value),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn launch_requests_feed_relevance_sorting() {
    let repo = repository();
    let raw = serde_json::to_string(&CoreRequest::Launch(ItemRequest { item: mail() })).unwrap();
    let parsed: TransportResponse = serde_json::from_str(&handle_json(&repo, &raw).await).unwrap();
    assert!(matches!(parsed, TransportResponse::Ok { .. }));

    let response = handle_request(
        &repo,
        CoreRequest::SortByRelevance(KeysRequest {
            keys: vec!["app://missing:Main".into(), mail().key()],
        }),
    )
    .await;
    match response {
        TransportResponse::Ok {
            response: CoreResponse::Keys(keys),
        } => assert_eq!(keys.keys, vec![mail().key()]),
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn json_handler_returns_invalid_json_error_code() {
    let repo = repository();
    let raw = handle_json(&repo, "{not-json").await;
    let parsed: TransportResponse = serde_json::from_str(&raw).unwrap();

    match parsed {
        TransportResponse::Err { error } => assert_eq!(error.code, ErrorCode::InvalidJson),
        _ => panic!("expected invalid json error"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn json_handler_returns_invalid_request_for_zero_columns() {
    let repo = repository();
    let request = CoreRequest::Favorites(FavoritesRequest { columns: Some(0) });

    let raw = handle_json(&repo, &serde_json::to_string(&request).unwrap()).await;
    let parsed: TransportResponse = serde_json::from_str(&raw).unwrap();

    match parsed {
        TransportResponse::Err { error } => assert_eq!(error.code, ErrorCode::InvalidRequest),
        _ => panic!("expected invalid request error"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn json_handler_rejects_columns_beyond_the_grid_maximum() {
    let repo = repository();
    for columns in ["13", "9223372036854775808"] {
        let raw = handle_json(
            &repo,
            &format!(r#"{{"kind":"favorites","payload":{{"columns":{columns}}}}}"#),
        )
        .await;
        let parsed: TransportResponse = serde_json::from_str(&raw).unwrap();

        match parsed {
            TransportResponse::Err { error } => {
                assert_eq!(error.code, ErrorCode::InvalidRequest)
            }
            other => panic!("expected invalid request error, got {other:?}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_pin_is_reported_as_store_error() {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let db_path = std::env::temp_dir().join(format!("pinboard-transport-{unique}.sqlite3"));
    let repo = repository_on(FavoritesStore::open_file(&db_path).unwrap());
    rusqlite::Connection::open(&db_path)
        .unwrap()
        .execute_batch("DROP TABLE searchable")
        .unwrap();

    let request = CoreRequest::Pin(ItemRequest { item: mail() });
    let raw = handle_json(&repo, &serde_json::to_string(&request).unwrap()).await;
    let parsed: TransportResponse = serde_json::from_str(&raw).unwrap();

    match parsed {
        TransportResponse::Err { error } => assert_eq!(error.code, ErrorCode::Store),
        other => panic!("expected store error, got {other:?}"),
    }

    drop(repo);
    let _ = std::fs::remove_file(db_path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn calendar_requests_use_their_own_lists() {
    let repo = repository();
    let event = Searchable::CalendarEvent(CalendarEvent {
        event_id: 11,
        title: "Standup".into(),
        start_epoch_secs: 1_700_000_000,
    });
    handle_request(&repo, CoreRequest::Pin(ItemRequest { item: event.clone() })).await;

    match handle_request(&repo, CoreRequest::PinnedCalendarEvents).await {
        TransportResponse::Ok {
            response: CoreResponse::Favorites(payload),
        } => assert_eq!(payload.items[0].item, event),
        other => panic!("unexpected response: {other:?}"),
    }

    handle_request(&repo, CoreRequest::Hide(ItemRequest { item: event.clone() })).await;
    match handle_request(&repo, CoreRequest::HiddenCalendarEventKeys).await {
        TransportResponse::Ok {
            response: CoreResponse::Keys(keys),
        } => assert_eq!(keys.keys, vec![event.key()]),
        other => panic!("unexpected response: {other:?}"),
    }
}
