//! Benchmarks for Phase 2 team formation: k-medoids seeding plus the
//! slot-filling Hungarian pass, across bucket sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use indexmap::IndexMap;
use matchmaker_core::budget::{CancellationToken, SolveBudget};
use matchmaker_core::cost::CostComponents;
use matchmaker_core::model::{BucketEntry, Participant, Problem, SkillRegistry};
use matchmaker_core::phases::phase2_team_former::run_phase2;
use matchmaker_core::types::{ParticipantId, ProblemId, Role};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

const ROLES: [Role; 7] = [
    Role::Engineer,
    Role::ProductOwner,
    Role::Designer,
    Role::DataAnalyst,
    Role::Presenter,
    Role::Facilitator,
    Role::DomainExpert,
];

fn random_participant(i: usize, rng: &mut StdRng) -> Participant {
    let mut skills = IndexMap::new();
    skills.insert("rust".to_string(), rng.gen_range(0..10));
    skills.insert("product".to_string(), rng.gen_range(0..10));
    Participant {
        id: ParticipantId::new(format!("p{i}")),
        full_name: format!("Participant {i}"),
        email: format!("p{i}@example.com"),
        roles: vec![ROLES[i % ROLES.len()]],
        skills,
        availability_hours: rng.gen_range(5..40),
        motivation_embedding: (0..8).map(|_| rng.gen_range(-1.0..1.0)).collect(),
        leadership_preference: i % 7 == 0,
        ambiguity_comfort: rng.gen_range(0..10),
    }
}

fn problem(id: &str, team_size: u8) -> Problem {
    Problem {
        id: ProblemId::new(id),
        title: id.to_string(),
        prompt: String::new(),
        estimated_team_size: team_size,
        role_preferences: IndexMap::new(),
        skill_requirements: IndexMap::new(),
        ambiguity_level: 5,
        estimated_workload_hours: 20,
        motivation_embedding: (0..8).map(|_| 0.0).collect(),
    }
}

fn bucket_of(participants: &[Participant]) -> Vec<BucketEntry> {
    participants
        .iter()
        .enumerate()
        .map(|(rank, p)| BucketEntry {
            participant_id: p.id.clone(),
            cost: rank as f64,
            components: CostComponents::default(),
            rank,
        })
        .collect()
}

fn bench_phase2(c: &mut Criterion) {
    let mut group = c.benchmark_group("phase2_team_forming");
    let team_size = 5u8;

    for bucket_size in [20usize, 100, 300] {
        let mut rng = StdRng::seed_from_u64(99);
        let participants: Vec<Participant> = (0..bucket_size)
            .map(|i| random_participant(i, &mut rng))
            .collect();
        let participants_by_id: HashMap<ParticipantId, &Participant> =
            participants.iter().map(|p| (p.id.clone(), p)).collect();
        let problem = problem("q1", team_size);
        let problems_by_id = IndexMap::from([(problem.id.clone(), &problem)]);
        let buckets = IndexMap::from([(problem.id.clone(), bucket_of(&participants))]);
        let registry = SkillRegistry::default();

        group.bench_with_input(
            BenchmarkId::from_parameter(bucket_size),
            &bucket_size,
            |b, _| {
                b.iter(|| {
                    run_phase2(
                        black_box(&buckets),
                        &problems_by_id,
                        &participants_by_id,
                        team_size,
                        &registry,
                        SolveBudget::unlimited(),
                        CancellationToken::new(),
                    )
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_phase2);
criterion_main!(benches);
