//! Benchmarks for billing cycle hot paths

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use mentora_billing_core::{minutes_due, BillingSession, NewSession};
use mentora_types::{Amount, RoomEvent, SessionId, UserId};

fn sample_session(rate_cents: i64) -> BillingSession {
    let started_at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
    BillingSession::create(
        NewSession {
            session_id: SessionId::new("bench-room"),
            client_id: UserId::new(),
            advisor_id: UserId::new(),
            rate_per_minute: Amount::from_cents(rate_cents),
            started_at: Some(started_at),
        },
        started_at,
    )
    .unwrap()
}

fn bench_cycle_math(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_math");

    let spans = [59u64, 60, 61, 3_600];
    for span in spans {
        group.bench_with_input(BenchmarkId::new("minutes_due", span), &span, |b, &span| {
            b.iter(|| minutes_due(black_box(span)));
        });
    }

    let session = sample_session(150);
    group.bench_function("charge_for_minutes", |b| {
        b.iter(|| session.charge_for_minutes(black_box(3)).unwrap());
    });

    let now = session.started_at + chrono::Duration::seconds(61);
    group.bench_function("unbilled_secs", |b| {
        b.iter(|| session.unbilled_secs(black_box(now)));
    });

    group.finish();
}

fn bench_session_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_state");

    group.bench_function("create", |b| {
        let client = UserId::new();
        let advisor = UserId::new();
        let started_at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        b.iter(|| {
            BillingSession::create(
                NewSession {
                    session_id: SessionId::new(black_box("bench-room")),
                    client_id: client,
                    advisor_id: advisor,
                    rate_per_minute: Amount::from_cents(150),
                    started_at: Some(started_at),
                },
                started_at,
            )
        });
    });

    let session = sample_session(150);
    group.bench_function("clone_snapshot", |b| {
        b.iter(|| black_box(&session).clone());
    });

    group.finish();
}

fn bench_wire_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire_events");

    let update = RoomEvent::BillingUpdate {
        session_id: SessionId::new("bench-room"),
        duration: 180,
        amount_billed: Amount::from_cents(450),
        current_balance: Amount::from_cents(550),
    };
    group.bench_function("serialize_billing_update", |b| {
        b.iter(|| serde_json::to_string(black_box(&update)).unwrap());
    });

    let wire = serde_json::to_string(&update).unwrap();
    group.bench_function("parse_billing_update", |b| {
        b.iter(|| serde_json::from_str::<RoomEvent>(black_box(&wire)).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_cycle_math,
    bench_session_state,
    bench_wire_events
);
criterion_main!(benches);
