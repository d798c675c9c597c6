use chrono::{Duration, Months, NaiveDate, NaiveDateTime};
use std::collections::HashSet;

use crate::error::CoreError;
use crate::models::{Event, Recurrence, RecurrenceConfig, RecurringType};

/// Steps one period forward from `current`.
///
/// Month and year steps are calendar-aware: the day of month is clamped to the
/// length of the target month, and each step starts from the previous
/// occurrence (Jan 31 → Feb 29 → Mar 29 in 2024).
pub fn next_occurrence(
    current: NaiveDateTime,
    recurring_type: RecurringType,
    interval: u32,
) -> Option<NaiveDateTime> {
    match recurring_type {
        RecurringType::Daily => current.checked_add_signed(Duration::days(i64::from(interval))),
        RecurringType::Weekly => current.checked_add_signed(Duration::weeks(i64::from(interval))),
        RecurringType::Monthly => current.checked_add_months(Months::new(interval)),
        RecurringType::Yearly => interval
            .checked_mul(12)
            .and_then(|months| current.checked_add_months(Months::new(months))),
    }
}

/// Length in days of one fixed-length step, `None` for calendar-aware types.
fn fixed_step_days(recurring_type: RecurringType, interval: u32) -> Option<i64> {
    match recurring_type {
        RecurringType::Daily => Some(i64::from(interval)),
        RecurringType::Weekly => Some(i64::from(interval) * 7),
        RecurringType::Monthly | RecurringType::Yearly => None,
    }
}

/// Validates a recurrence pattern and fills in the default end date when the
/// series has no end bound at all.
pub fn normalize_recurrence(
    start: NaiveDateTime,
    recurrence: Option<Recurrence>,
) -> Result<Option<Recurrence>, CoreError> {
    let Some(mut recurrence) = recurrence else {
        return Ok(None);
    };

    if recurrence.interval == 0 {
        return Err(CoreError::InvalidInput(
            "Recurring interval must be at least 1".to_string(),
        ));
    }
    if recurrence.end_count == Some(0) {
        return Err(CoreError::InvalidInput(
            "Recurring end count must be at least 1".to_string(),
        ));
    }

    if recurrence.end_date.is_none() && recurrence.end_count.is_none() {
        recurrence.end_date = recurrence
            .recurring_type
            .default_end_date(start.date());
    }

    Ok(Some(recurrence))
}

/// OccurrenceGenerator: expands recurring events into concrete instances.
///
/// Pure computation, no I/O. The iteration caps from [`RecurrenceConfig`] only
/// guard against degenerate input; ranges that passed [`Self::check_range`]
/// never reach them.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceGenerator {
    config: RecurrenceConfig,
}

impl OccurrenceGenerator {
    pub fn new(config: RecurrenceConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RecurrenceConfig::default())
    }

    pub fn config(&self) -> &RecurrenceConfig {
        &self.config
    }

    /// Rejects ranges longer than the limit configured for `recurring_type`.
    pub fn check_range(
        &self,
        recurring_type: RecurringType,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Result<(), CoreError> {
        if range_end < range_start {
            return Err(CoreError::InvalidInput(format!(
                "Range end {} is before range start {}",
                range_end, range_start
            )));
        }

        let requested_days = (range_end - range_start).num_days();
        let limit_days = self.config.range_limits.limit_for(recurring_type);
        if requested_days > limit_days {
            return Err(CoreError::RangeTooLarge {
                recurring_type,
                limit_days,
                requested_days,
            });
        }

        Ok(())
    }

    /// Generates the instances of `base` whose start lies in
    /// `[range_start, range_end]`, in ascending order.
    ///
    /// Dates in `excluded_dates` are skipped and do not count towards the
    /// series' end count. Returns nothing for non-recurring events.
    pub fn generate(
        &self,
        base: &Event,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
        excluded_dates: &HashSet<NaiveDate>,
    ) -> Vec<Event> {
        let Some(recurrence) = base.recurrence.as_ref() else {
            return Vec::new();
        };
        let recurring_type = recurrence.recurring_type;
        let interval = recurrence.interval.max(1);
        let cap = self.config.generation_iteration_cap;

        let mut current = base.start_date_time;
        // Non-excluded occurrences since the series start
        let mut counted: u64 = 0;

        if current < range_start {
            match fixed_step_days(recurring_type, interval) {
                Some(step_days) => {
                    let step_seconds = step_days * 86_400;
                    let gap_seconds = (range_start - current).num_seconds();
                    let steps = (gap_seconds + step_seconds - 1) / step_seconds;
                    let Some(next) =
                        current.checked_add_signed(Duration::days(steps * step_days))
                    else {
                        return Vec::new();
                    };

                    let first = current.date();
                    let skipped_exclusions = excluded_dates
                        .iter()
                        .filter(|date| {
                            **date >= first
                                && **date < next.date()
                                && (**date - first).num_days() % step_days == 0
                        })
                        .count() as u64;
                    counted = (steps as u64).saturating_sub(skipped_exclusions);
                    current = next;
                }
                None => {
                    let mut iterations = 0;
                    while current < range_start {
                        if iterations >= cap {
                            tracing::warn!(
                                event_id = %base.id,
                                cap,
                                "fast-forward hit the iteration cap before reaching the range"
                            );
                            return Vec::new();
                        }
                        if !excluded_dates.contains(&current.date()) {
                            counted += 1;
                        }
                        current = match next_occurrence(current, recurring_type, interval) {
                            Some(next) => next,
                            None => return Vec::new(),
                        };
                        iterations += 1;
                    }
                }
            }
        }

        let mut instances = Vec::new();
        let mut iterations = 0;
        while iterations < cap {
            iterations += 1;

            if current > range_end {
                break;
            }
            if recurrence.end_date.is_some_and(|end| current.date() > end) {
                break;
            }
            if recurrence
                .end_count
                .is_some_and(|end_count| counted >= u64::from(end_count))
            {
                break;
            }

            if !excluded_dates.contains(&current.date()) {
                instances.push(base.instance_at(current));
                counted += 1;
            }

            current = match next_occurrence(current, recurring_type, interval) {
                Some(next) => next,
                None => break,
            };
        }

        tracing::debug!(
            event_id = %base.id,
            generated = instances.len(),
            iterations,
            "generated occurrences"
        );
        instances
    }

    /// Checks that `date` is an occurrence of `event`.
    ///
    /// A single event occurs only on its start date. A recurring event is
    /// stepped from its start until the date is reached, passed, or the series
    /// end is passed. Dates in `excluded_dates` are still on the pattern but do
    /// not count towards the end count, matching [`Self::generate`].
    pub fn validate_occurrence_date(
        &self,
        event: &Event,
        date: NaiveDate,
        excluded_dates: &HashSet<NaiveDate>,
    ) -> Result<(), CoreError> {
        let not_on_pattern = || CoreError::OccurrenceNotOnPattern {
            event_id: event.id,
            date,
        };

        let Some(recurrence) = event.recurrence.as_ref() else {
            return if event.start_date_time.date() == date {
                Ok(())
            } else {
                Err(not_on_pattern())
            };
        };

        let interval = recurrence.interval.max(1);
        let mut current = event.start_date_time;
        let mut counted: u64 = 0;
        for _ in 0..self.config.validation_iteration_cap {
            let current_date = current.date();
            if current_date > date {
                break;
            }
            if recurrence.end_date.is_some_and(|end| current_date > end) {
                break;
            }
            if recurrence
                .end_count
                .is_some_and(|end_count| counted >= u64::from(end_count))
            {
                break;
            }
            if current_date == date {
                return Ok(());
            }
            if !excluded_dates.contains(&current_date) {
                counted += 1;
            }
            current = match next_occurrence(current, recurrence.recurring_type, interval) {
                Some(next) => next,
                None => break,
            };
        }

        Err(not_on_pattern())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recurrence;
    use chrono::Utc;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, 0, 0).unwrap()
    }

    fn end_of(d: NaiveDate) -> NaiveDateTime {
        d.and_hms_opt(23, 59, 59).unwrap()
    }

    fn create_test_event(start: NaiveDateTime, recurrence: Option<Recurrence>) -> Event {
        Event {
            id: Uuid::now_v7(),
            family_id: Uuid::now_v7(),
            category_id: None,
            title: "Take out the bins".to_string(),
            description: None,
            start_date_time: start,
            end_date_time: Some(start + Duration::hours(1)),
            is_all_day: false,
            location: None,
            created_by_id: Uuid::now_v7(),
            recurrence,
            is_task: true,
            xp_points: Some(1),
            is_required: false,
            participant_ids: BTreeSet::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn dates(instances: &[Event]) -> Vec<NaiveDate> {
        instances.iter().map(Event::occurrence_date).collect()
    }

    mod stepping_tests {
        use super::*;

        #[rstest]
        #[case(RecurringType::Daily, 3, at(2024, 1, 4, 9))]
        #[case(RecurringType::Weekly, 2, at(2024, 1, 15, 9))]
        #[case(RecurringType::Monthly, 1, at(2024, 2, 1, 9))]
        #[case(RecurringType::Yearly, 1, at(2025, 1, 1, 9))]
        fn steps_by_interval(
            #[case] kind: RecurringType,
            #[case] interval: u32,
            #[case] expected: NaiveDateTime,
        ) {
            assert_eq!(next_occurrence(at(2024, 1, 1, 9), kind, interval), Some(expected));
        }

        #[test]
        fn monthly_clamps_to_month_length_and_keeps_clamped_day() {
            let jan = at(2024, 1, 31, 9);
            let feb = next_occurrence(jan, RecurringType::Monthly, 1).unwrap();
            assert_eq!(feb, at(2024, 2, 29, 9));
            let mar = next_occurrence(feb, RecurringType::Monthly, 1).unwrap();
            assert_eq!(mar, at(2024, 3, 29, 9));
        }

        #[test]
        fn yearly_from_leap_day_lands_on_feb_28() {
            assert_eq!(
                next_occurrence(at(2024, 2, 29, 9), RecurringType::Yearly, 1),
                Some(at(2025, 2, 28, 9))
            );
        }
    }

    mod normalize_tests {
        use super::*;

        #[test]
        fn unbounded_series_gets_default_end_date() {
            let normalized =
                normalize_recurrence(at(2024, 1, 1, 9), Some(Recurrence::new(RecurringType::Weekly)))
                    .unwrap()
                    .unwrap();
            assert_eq!(normalized.end_date, Some(date(2026, 1, 1)));
        }

        #[test]
        fn count_bounded_series_keeps_no_end_date() {
            let normalized = normalize_recurrence(
                at(2024, 1, 1, 9),
                Some(Recurrence::new(RecurringType::Daily).times(5)),
            )
            .unwrap()
            .unwrap();
            assert_eq!(normalized.end_date, None);
        }

        #[test]
        fn zero_interval_is_rejected() {
            let result = normalize_recurrence(
                at(2024, 1, 1, 9),
                Some(Recurrence::new(RecurringType::Daily).every(0)),
            );
            assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        }

        #[test]
        fn single_events_pass_through() {
            assert_eq!(normalize_recurrence(at(2024, 1, 1, 9), None).unwrap(), None);
        }
    }

    mod generator_tests {
        use super::*;

        #[test]
        fn weekly_series_within_month() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2024, 1, 1, 9),
                Some(Recurrence::new(RecurringType::Weekly).until(date(2024, 12, 31))),
            );

            let instances = generator.generate(
                &event,
                at(2024, 1, 1, 0),
                end_of(date(2024, 1, 31)),
                &HashSet::new(),
            );

            assert_eq!(
                dates(&instances),
                vec![
                    date(2024, 1, 1),
                    date(2024, 1, 8),
                    date(2024, 1, 15),
                    date(2024, 1, 22),
                    date(2024, 1, 29)
                ]
            );
            assert!(instances.iter().all(|i| !i.is_recurring() && i.id == event.id));
            assert_eq!(instances[2].end_date_time, Some(at(2024, 1, 15, 10)));
        }

        #[test]
        fn excluded_dates_are_skipped() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2024, 1, 1, 9),
                Some(Recurrence::new(RecurringType::Weekly).until(date(2024, 12, 31))),
            );
            let excluded = HashSet::from([date(2024, 1, 15)]);

            let instances =
                generator.generate(&event, at(2024, 1, 1, 0), end_of(date(2024, 1, 31)), &excluded);

            assert_eq!(
                dates(&instances),
                vec![date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 22), date(2024, 1, 29)]
            );
        }

        #[test]
        fn end_date_equal_to_range_end_is_inclusive() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2024, 1, 1, 9),
                Some(Recurrence::new(RecurringType::Daily).until(date(2024, 1, 10))),
            );

            let instances = generator.generate(
                &event,
                at(2024, 1, 5, 0),
                end_of(date(2024, 1, 10)),
                &HashSet::new(),
            );

            assert_eq!(instances.last().map(Event::occurrence_date), Some(date(2024, 1, 10)));
            assert_eq!(instances.len(), 6);
        }

        #[test]
        fn end_count_bounds_the_whole_series() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2024, 1, 1, 9),
                Some(Recurrence::new(RecurringType::Daily).times(5)),
            );

            // 1st..5th fall on Jan 1..5; a window starting on the 4th sees only two.
            let instances = generator.generate(
                &event,
                at(2024, 1, 4, 0),
                end_of(date(2024, 1, 31)),
                &HashSet::new(),
            );
            assert_eq!(dates(&instances), vec![date(2024, 1, 4), date(2024, 1, 5)]);
        }

        #[test]
        fn excluded_dates_do_not_consume_end_count() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2024, 1, 1, 9),
                Some(Recurrence::new(RecurringType::Daily).times(3)),
            );
            let excluded = HashSet::from([date(2024, 1, 2)]);

            let instances =
                generator.generate(&event, at(2024, 1, 3, 0), end_of(date(2024, 1, 31)), &excluded);
            assert_eq!(dates(&instances), vec![date(2024, 1, 3), date(2024, 1, 4)]);
        }

        #[test]
        fn long_running_daily_series_is_not_truncated_by_cap() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2019, 1, 1, 7),
                Some(Recurrence::new(RecurringType::Daily).until(date(2030, 1, 1))),
            );

            let instances = generator.generate(
                &event,
                at(2024, 1, 1, 0),
                end_of(date(2024, 12, 31)),
                &HashSet::new(),
            );

            assert_eq!(instances.len(), 366);
            assert_eq!(instances[0].start_date_time, at(2024, 1, 1, 7));
        }

        #[test]
        fn fast_forward_lands_on_pattern_with_interval() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2024, 1, 1, 9),
                Some(Recurrence::new(RecurringType::Weekly).every(2).until(date(2024, 12, 31))),
            );

            let instances = generator.generate(
                &event,
                at(2024, 2, 1, 0),
                end_of(date(2024, 2, 29)),
                &HashSet::new(),
            );
            assert_eq!(dates(&instances), vec![date(2024, 2, 12), date(2024, 2, 26)]);
        }

        #[test]
        fn monthly_fast_forward_keeps_iterative_clamping() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2024, 1, 31, 9),
                Some(Recurrence::new(RecurringType::Monthly).until(date(2026, 1, 1))),
            );

            let instances = generator.generate(
                &event,
                at(2024, 4, 1, 0),
                end_of(date(2024, 5, 31)),
                &HashSet::new(),
            );
            assert_eq!(dates(&instances), vec![date(2024, 4, 29), date(2024, 5, 29)]);
        }

        #[test]
        fn single_events_generate_nothing() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(at(2024, 1, 1, 9), None);
            assert!(generator
                .generate(&event, at(2024, 1, 1, 0), end_of(date(2024, 1, 31)), &HashSet::new())
                .is_empty());
        }
    }

    mod range_check_tests {
        use super::*;

        #[rstest]
        #[case(RecurringType::Daily, 365, true)]
        #[case(RecurringType::Daily, 366, false)]
        #[case(RecurringType::Weekly, 730, true)]
        #[case(RecurringType::Weekly, 731, false)]
        #[case(RecurringType::Monthly, 1095, true)]
        #[case(RecurringType::Monthly, 1096, false)]
        #[case(RecurringType::Yearly, 3650, true)]
        #[case(RecurringType::Yearly, 3651, false)]
        fn enforces_per_type_limits(
            #[case] kind: RecurringType,
            #[case] days: i64,
            #[case] allowed: bool,
        ) {
            let generator = OccurrenceGenerator::with_defaults();
            let start = at(2024, 1, 1, 0);
            let result = generator.check_range(kind, start, start + Duration::days(days));
            assert_eq!(result.is_ok(), allowed);
        }

        #[test]
        fn four_hundred_day_daily_range_cites_limit() {
            let generator = OccurrenceGenerator::with_defaults();
            let start = at(2024, 1, 1, 0);
            let err = generator
                .check_range(RecurringType::Daily, start, start + Duration::days(400))
                .unwrap_err();
            match err {
                CoreError::RangeTooLarge { limit_days, requested_days, recurring_type } => {
                    assert_eq!(limit_days, 365);
                    assert_eq!(requested_days, 400);
                    assert_eq!(recurring_type, RecurringType::Daily);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[test]
        fn inverted_range_is_invalid_input() {
            let generator = OccurrenceGenerator::with_defaults();
            let result =
                generator.check_range(RecurringType::Daily, at(2024, 2, 1, 0), at(2024, 1, 1, 0));
            assert!(matches!(result, Err(CoreError::InvalidInput(_))));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn monthly_from_jan_31_rejects_mid_month() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2024, 1, 31, 9),
                Some(Recurrence::new(RecurringType::Monthly).until(date(2025, 1, 31))),
            );

            assert!(matches!(
                generator.validate_occurrence_date(&event, date(2024, 2, 15), &HashSet::new()),
                Err(CoreError::OccurrenceNotOnPattern { .. })
            ));
            assert!(generator.validate_occurrence_date(&event, date(2024, 2, 29), &HashSet::new()).is_ok());
            assert!(generator.validate_occurrence_date(&event, date(2024, 3, 29), &HashSet::new()).is_ok());
            assert!(generator.validate_occurrence_date(&event, date(2024, 3, 31), &HashSet::new()).is_err());
        }

        #[test]
        fn single_event_only_valid_on_start_date() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(at(2024, 5, 5, 9), None);
            assert!(generator.validate_occurrence_date(&event, date(2024, 5, 5), &HashSet::new()).is_ok());
            assert!(generator.validate_occurrence_date(&event, date(2024, 5, 6), &HashSet::new()).is_err());
        }

        #[test]
        fn dates_after_series_end_are_rejected() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2024, 1, 1, 9),
                Some(Recurrence::new(RecurringType::Daily).until(date(2024, 1, 10))),
            );
            assert!(generator.validate_occurrence_date(&event, date(2024, 1, 10), &HashSet::new()).is_ok());
            assert!(generator.validate_occurrence_date(&event, date(2024, 1, 11), &HashSet::new()).is_err());
        }

        #[test]
        fn end_count_limits_valid_dates_and_skips_exclusions() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2024, 1, 1, 9),
                Some(Recurrence::new(RecurringType::Daily).times(3)),
            );
            assert!(generator.validate_occurrence_date(&event, date(2024, 1, 3), &HashSet::new()).is_ok());
            assert!(generator.validate_occurrence_date(&event, date(2024, 1, 4), &HashSet::new()).is_err());

            let excluded = HashSet::from([date(2024, 1, 2)]);
            assert!(generator.validate_occurrence_date(&event, date(2024, 1, 2), &excluded).is_ok());
            assert!(generator.validate_occurrence_date(&event, date(2024, 1, 4), &excluded).is_ok());
            assert!(generator.validate_occurrence_date(&event, date(2024, 1, 5), &excluded).is_err());
        }

        #[test]
        fn dates_before_series_start_are_rejected() {
            let generator = OccurrenceGenerator::with_defaults();
            let event = create_test_event(
                at(2024, 1, 10, 9),
                Some(Recurrence::new(RecurringType::Daily).until(date(2024, 2, 10))),
            );
            assert!(generator.validate_occurrence_date(&event, date(2024, 1, 9), &HashSet::new()).is_err());
        }
    }

    fn recurring_type_strategy() -> impl Strategy<Value = RecurringType> {
        prop_oneof![
            Just(RecurringType::Daily),
            Just(RecurringType::Weekly),
            Just(RecurringType::Monthly),
            Just(RecurringType::Yearly),
        ]
    }

    proptest! {
        #[test]
        fn generated_instances_are_ordered_in_range_and_on_pattern(
            kind in recurring_type_strategy(),
            interval in 1u32..5,
            start_offset in 0i64..400,
            range_offset in 0i64..400,
            range_days in 0i64..365,
            excluded_offsets in proptest::collection::vec(0i64..800, 0..10),
        ) {
            let generator = OccurrenceGenerator::with_defaults();
            let origin = at(2023, 1, 1, 0);
            let start = origin + Duration::days(start_offset) + Duration::hours(8);
            let event = create_test_event(
                start,
                Some(Recurrence::new(kind).every(interval).until(date(2026, 1, 1))),
            );
            let range_start = origin + Duration::days(range_offset);
            let range_end = range_start + Duration::days(range_days);
            let excluded: HashSet<NaiveDate> = excluded_offsets
                .iter()
                .map(|offset| origin.date() + Duration::days(*offset))
                .collect();

            let instances = generator.generate(&event, range_start, range_end, &excluded);

            for pair in instances.windows(2) {
                prop_assert!(pair[0].start_date_time < pair[1].start_date_time);
            }
            for instance in &instances {
                prop_assert!(instance.start_date_time >= range_start);
                prop_assert!(instance.start_date_time <= range_end);
                prop_assert!(!excluded.contains(&instance.occurrence_date()));
                prop_assert!(!instance.is_recurring());
                prop_assert!(generator
                    .validate_occurrence_date(&event, instance.occurrence_date(), &excluded)
                    .is_ok());
            }
        }
    }
}
