//! # Pairing Ledger Benchmarks
//!
//! Hot paths of a pairing node:
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | pl-01 Identity Hashing | Salted SHA-256 digest | < 10µs |
//! | pl-02 Pairing Handshake | Token issue + verify | < 20µs |
//! | pl-02 Pairing Handshake | Split key generation | < 50µs |
//! | pl-04 Trust Ledger | Policy score update | < 1µs |

// Allow excessive nesting in benchmark code
#![allow(clippy::excessive_nesting)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pl_01_identity_hashing::{hash, HasherConfig, IdentityHasher, Namespace};
use pl_02_pairing_handshake::algorithms::{component_key, compute_token, verify_token};
use pl_02_pairing_handshake::SplitKey;
use pl_04_trust_ledger::{FixedStepPolicy, LearningRatePolicy, TrustPolicy};
use rand::Rng;
use shared_types::{ChallengeId, ComponentRole, PairingOutcome};
use std::time::Duration;

// ============================================================================
// PL-01: Identity Hashing
// ============================================================================

fn bench_identity_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("pl-01-identity-hashing");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("hash_single", |b| {
        b.iter(|| black_box(hash("battery-001", "bench-salt-0123456789", "bench-fleet")))
    });

    let hasher = IdentityHasher::new(&HasherConfig::for_testing()).expect("valid hasher config");
    let mut rng = rand::thread_rng();
    for size in [10usize, 100, 1_000] {
        let ids: Vec<String> = (0..size)
            .map(|_| format!("component-{:016x}", rng.gen::<u64>()))
            .collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("derive_batch", size), &ids, |b, ids| {
            b.iter(|| {
                for id in ids {
                    black_box(hasher.derive(Namespace::Component, id).ok());
                }
            })
        });
    }

    group.finish();
}

// ============================================================================
// PL-02: Pairing Handshake
// ============================================================================

fn bench_auth_tokens(c: &mut Criterion) {
    let mut group = c.benchmark_group("pl-02-pairing-handshake");

    let key = component_key(b"bench-authority-key", "battery-001").expect("non-empty key");
    let challenge_id = ChallengeId::new("challenge-bench");
    let nonce = "ab".repeat(32);
    let token = compute_token(key.as_slice(), &challenge_id, &nonce, ComponentRole::A)
        .expect("token computes");

    group.bench_function("component_key", |b| {
        b.iter(|| black_box(component_key(b"bench-authority-key", "battery-001").ok()))
    });
    group.bench_function("compute_token", |b| {
        b.iter(|| {
            black_box(compute_token(key.as_slice(), &challenge_id, &nonce, ComponentRole::A).ok())
        })
    });
    group.bench_function("verify_token", |b| {
        b.iter(|| {
            black_box(verify_token(
                key.as_slice(),
                &challenge_id,
                &nonce,
                ComponentRole::A,
                &token,
            ))
        })
    });
    group.bench_function("split_key_generate", |b| {
        b.iter(|| {
            let key = SplitKey::generate();
            black_box(key.lct_half().commitment())
        })
    });

    group.finish();
}

// ============================================================================
// PL-04: Trust Ledger
// ============================================================================

fn bench_trust_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("pl-04-trust-ledger");

    let policies: [(&str, Box<dyn TrustPolicy>); 2] = [
        (
            "fixed_step",
            Box::new(FixedStepPolicy {
                reward: 0.05,
                penalty: 0.1,
            }),
        ),
        ("learning_rate", Box::new(LearningRatePolicy)),
    ];
    for (name, policy) in &policies {
        group.bench_function(BenchmarkId::new("evidence_run", name), |b| {
            b.iter(|| {
                let mut score = 0.5;
                for evidence in 0..100u64 {
                    let outcome = if evidence % 5 == 0 {
                        PairingOutcome::Failed
                    } else {
                        PairingOutcome::Completed
                    };
                    score = policy.next_score(score, evidence, outcome).clamp(0.0, 1.0);
                }
                black_box(score)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_identity_hashing,
    bench_auth_tokens,
    bench_trust_policies
);
criterion_main!(benches);
