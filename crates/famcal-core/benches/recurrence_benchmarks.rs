use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use famcal_core::models::{Event, Recurrence, RecurringType};
use famcal_core::recurrence::{next_occurrence, OccurrenceGenerator};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn create_test_event(recurrence: Recurrence) -> Event {
    let start = at(2015, 1, 31);
    Event {
        id: Uuid::now_v7(),
        family_id: Uuid::now_v7(),
        category_id: None,
        title: "Benchmark Event".to_string(),
        description: None,
        start_date_time: start,
        end_date_time: Some(start + Duration::hours(1)),
        is_all_day: false,
        location: None,
        created_by_id: Uuid::now_v7(),
        recurrence: Some(recurrence),
        is_task: true,
        xp_points: Some(1),
        is_required: false,
        participant_ids: BTreeSet::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn bench_next_occurrence(c: &mut Criterion) {
    let mut group = c.benchmark_group("next_occurrence");
    for kind in [
        RecurringType::Daily,
        RecurringType::Weekly,
        RecurringType::Monthly,
        RecurringType::Yearly,
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            b.iter(|| next_occurrence(black_box(at(2024, 1, 31)), kind, 1))
        });
    }
    group.finish();
}

fn bench_generate_year(c: &mut Criterion) {
    let generator = OccurrenceGenerator::with_defaults();
    let range_start = at(2024, 1, 1);
    let range_end = at(2024, 12, 31);
    let excluded: HashSet<NaiveDate> = (0..52)
        .map(|week| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::weeks(week))
        .collect();

    let mut group = c.benchmark_group("generate_one_year");
    for kind in [
        RecurringType::Daily,
        RecurringType::Weekly,
        RecurringType::Monthly,
    ] {
        let event = create_test_event(Recurrence::new(kind).until(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
        group.bench_with_input(BenchmarkId::from_parameter(kind), &event, |b, event| {
            b.iter(|| generator.generate(black_box(event), range_start, range_end, &excluded))
        });
    }
    group.finish();
}

fn bench_validate_occurrence(c: &mut Criterion) {
    let generator = OccurrenceGenerator::with_defaults();
    let event = create_test_event(
        Recurrence::new(RecurringType::Daily).until(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()),
    );
    let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    let excluded = HashSet::new();

    c.bench_function("validate_daily_occurrence_after_nine_years", |b| {
        b.iter(|| generator.validate_occurrence_date(black_box(&event), date, &excluded))
    });
}

criterion_group!(
    benches,
    bench_next_occurrence,
    bench_generate_year,
    bench_validate_occurrence
);
criterion_main!(benches);
