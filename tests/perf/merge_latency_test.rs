use std::time::Instant;

use crate::favorites_store::{FavoritesQuery, FavoritesStore, TypeFilter};
use crate::model::FavoriteRecord;
use crate::ranking::{fill_quota, merge};

fn p95_ms(samples: &mut [f64]) -> f64 {
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let last = samples.len().saturating_sub(1);
    let idx = ((last as f64) * 0.95).round() as usize;
    samples[idx.min(last)]
}

fn seeded_store() -> FavoritesStore {
    let store = FavoritesStore::open_memory().unwrap();
    let records: Vec<FavoriteRecord> = (0..10_000u32)
        .map(|i| {
            let record = FavoriteRecord::new(
                &format!("file://doc-{i:05}"),
                "file",
                &format!("{{\"path\":\"doc-{i:05}\",\"label\":\"Doc {i}\"}}"),
            )
            .with_usage(i % 97, 0.0);
            if i < 6 {
                record.with_pin(i + 1)
            } else {
                record
            }
        })
        .collect();
    store.replace_all(&records).unwrap();
    store
}

#[test]
fn warm_merge_p95_under_15ms() {
    let store = seeded_store();
    let columns = 5;

    let run = || {
        let pinned = store
            .query(&FavoritesQuery::pinned(TypeFilter::All, 100))
            .unwrap();
        let slots = fill_quota(pinned.len(), columns);
        let automatic = store
            .query(&FavoritesQuery::frequent(
                TypeFilter::All,
                slots.saturating_sub(pinned.len()),
            ))
            .unwrap();
        merge(pinned, automatic, slots)
    };

    let merged = run();
    assert_eq!(merged.len(), 10);

    for _ in 0..30 {
        let _ = run();
    }

    let mut batch_p95 = Vec::with_capacity(5);
    for _ in 0..5 {
        let mut samples = Vec::with_capacity(80);
        for _ in 0..80 {
            let start = Instant::now();
            let _ = run();
            samples.push(start.elapsed().as_secs_f64() * 1000.0);
        }
        batch_p95.push(p95_ms(&mut samples));
    }

    batch_p95.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_p95 = batch_p95[batch_p95.len() / 2];

    assert!(
        median_p95 <= 15.0,
        "median batch p95 too high: {median_p95:.3}ms (budget 15.0ms); batches={batch_p95:?}",
    );
}
