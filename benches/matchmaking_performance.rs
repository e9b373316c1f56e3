//! Performance benchmarks for match assembly and perspective rendering

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dropzone_matchmaker::battlefield;
use dropzone_matchmaker::cosmetics::StaticCosmeticsProvider;
use dropzone_matchmaker::lobby::{Matchmaker, MatchmakerConfig, StaticModeProvider};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::sync::Arc;

fn create_bench_matchmaker() -> Matchmaker {
    let config = MatchmakerConfig {
        rng_seed: Some(1),
        ..MatchmakerConfig::default()
    };

    Matchmaker::new(
        Arc::new(StaticModeProvider::new()),
        Arc::new(StaticCosmeticsProvider::with_seed(1)),
        config,
    )
    .unwrap()
}

async fn fill_queue(matchmaker: &Matchmaker, mode: &str, count: u64) {
    for user_id in 0..count {
        let _ = matchmaker
            .enqueue(user_id, "Bench Pilot", json!({ "outfitId": "outfit-sentinel" }), mode)
            .await;
    }
}

fn bench_battlefield_generation(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("battlefield_generate_12", |b| {
        b.iter(|| black_box(battlefield::generate(black_box(6), black_box(12), &mut rng)))
    });
}

fn bench_single_enqueue(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("single_enqueue", |b| {
        b.iter(|| {
            rt.block_on(async {
                let matchmaker = create_bench_matchmaker();
                black_box(
                    matchmaker
                        .enqueue(1, "Bench Pilot", json!({}), "squad")
                        .await,
                )
            })
        })
    });
}

fn bench_capacity_fill_tick(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("tick_solo_48_waiting", |b| {
        b.iter(|| {
            rt.block_on(async {
                let matchmaker = create_bench_matchmaker();
                fill_queue(&matchmaker, "solo", 48).await;
                black_box(matchmaker.tick().await)
            })
        })
    });
}

fn bench_match_perspective(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let matchmaker = create_bench_matchmaker();
    let (match_id, session_id) = rt.block_on(async {
        let viewer = matchmaker
            .enqueue(99, "Viewer", json!({ "outfitId": "outfit-sentinel" }), "duo")
            .await
            .unwrap();
        fill_queue(&matchmaker, "duo", 11).await;
        let report = matchmaker.tick().await.unwrap();
        (report.match_ids[0].clone(), viewer.session_id)
    });

    c.bench_function("serialize_match_for_session", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(
                    matchmaker
                        .serialize_match_for_session(&match_id, &session_id)
                        .await,
                )
            })
        })
    });
}

criterion_group!(
    benches,
    bench_battlefield_generation,
    bench_single_enqueue,
    bench_capacity_fill_tick,
    bench_match_perspective
);
criterion_main!(benches);
