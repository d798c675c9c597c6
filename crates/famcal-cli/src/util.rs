use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use dialoguer::Select;
use famcal_core::error::CoreError;
use famcal_core::models::{EditScope, Event, Recurrence};
use owo_colors::OwoColorize;
use uuid::Uuid;

use crate::cli::RecurrenceArgs;
use crate::config::Config;
use crate::parser::parse_date;

pub fn resolve_family(flag: Option<Uuid>, config: &Config) -> Result<Uuid> {
    flag.or(config.default_family).ok_or_else(|| {
        anyhow!(CoreError::InvalidInput(
            "No family given. Pass --family or set default_family".to_string()
        ))
    })
}

pub fn resolve_member(flag: Option<Uuid>, config: &Config) -> Result<Uuid> {
    flag.or(config.default_member).ok_or_else(|| {
        anyhow!(CoreError::InvalidInput(
            "No member given. Pass --member or set default_member".to_string()
        ))
    })
}

/// `None` when no repeat flag was given.
pub fn build_recurrence(args: &RecurrenceArgs) -> Result<Option<Recurrence>> {
    let Some(recurring_type) = args.every else {
        return Ok(None);
    };
    let mut recurrence = Recurrence::new(recurring_type);
    if let Some(interval) = args.interval {
        recurrence = recurrence.every(interval);
    }
    if let Some(until) = &args.until {
        recurrence = recurrence.until(parse_date(until)?);
    }
    if let Some(count) = args.count {
        recurrence = recurrence.times(count);
    }
    Ok(Some(recurrence))
}

/// Occurrence addressed by `--on`. Series need it unless the whole series is
/// meant; single events default to their own date.
pub fn occurrence_date(event: &Event, on: Option<&str>, scope: EditScope) -> Result<NaiveDate> {
    match on {
        Some(on) => parse_date(on),
        None if !event.is_recurring() || scope == EditScope::All => Ok(event.occurrence_date()),
        None => Err(anyhow!(CoreError::InvalidInput(format!(
            "'{}' repeats. Pass --on to pick the occurrence",
            event.title
        )))),
    }
}

/// Date a completion applies to when `--on` is missing.
pub fn completion_date(event: &Event, on: Option<&str>) -> Result<NaiveDate> {
    match on {
        Some(on) => parse_date(on),
        None if event.is_recurring() => Ok(Local::now().date_naive()),
        None => Ok(event.occurrence_date()),
    }
}

/// Scope for a write on `event`, asking interactively when a series gets no
/// `--scope`.
pub fn resolve_scope(event: &Event, flag: Option<EditScope>, verb: &str) -> Result<EditScope> {
    if !event.is_recurring() {
        return Ok(EditScope::All);
    }
    if let Some(scope) = flag {
        return Ok(scope);
    }

    let options = [
        "This occurrence only",
        "This and following occurrences",
        "All occurrences",
    ];
    println!("{}", format!("'{}' is a recurring event.", event.title).yellow());
    let selection = Select::new()
        .with_prompt(format!("What would you like to {}?", verb))
        .items(&options)
        .default(0)
        .interact()
        .context("No scope chosen. Pass --scope this|following|all")?;

    Ok(match selection {
        0 => EditScope::This,
        1 => EditScope::ThisAndFollowing,
        _ => EditScope::All,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use famcal_core::models::RecurringType;
    use std::path::PathBuf;

    fn config(family: Option<Uuid>) -> Config {
        Config {
            database_path: PathBuf::from("famcal.db"),
            default_family: family,
            default_member: None,
            recurrence: Default::default(),
        }
    }

    fn event(recurrence: Option<Recurrence>) -> Event {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Event {
            id: Uuid::now_v7(),
            family_id: Uuid::now_v7(),
            category_id: None,
            title: "Swim".to_string(),
            description: None,
            start_date_time: start,
            end_date_time: None,
            is_all_day: false,
            location: None,
            created_by_id: Uuid::now_v7(),
            recurrence,
            is_task: false,
            xp_points: None,
            is_required: false,
            participant_ids: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn family_flag_wins_over_default() {
        let flag = Uuid::now_v7();
        let default = Uuid::now_v7();
        assert_eq!(resolve_family(Some(flag), &config(Some(default))).unwrap(), flag);
        assert_eq!(resolve_family(None, &config(Some(default))).unwrap(), default);
        assert!(resolve_family(None, &config(None)).is_err());
    }

    #[test]
    fn recurrence_from_flags() {
        let args = RecurrenceArgs {
            every: Some(RecurringType::Weekly),
            interval: Some(2),
            until: Some("2024-06-30".to_string()),
            count: None,
        };
        let recurrence = build_recurrence(&args).unwrap().unwrap();
        assert_eq!(recurrence.interval, 2);
        assert_eq!(recurrence.end_date, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert!(build_recurrence(&RecurrenceArgs::default()).unwrap().is_none());
    }

    #[test]
    fn series_need_an_occurrence_unless_all() {
        let series = event(Some(Recurrence::new(RecurringType::Daily)));
        assert!(occurrence_date(&series, None, EditScope::This).is_err());
        assert_eq!(
            occurrence_date(&series, None, EditScope::All).unwrap(),
            series.occurrence_date()
        );

        let single = event(None);
        assert_eq!(
            occurrence_date(&single, None, EditScope::This).unwrap(),
            single.occurrence_date()
        );
    }

    #[test]
    fn single_events_skip_the_scope_prompt() {
        let single = event(None);
        assert_eq!(resolve_scope(&single, None, "edit").unwrap(), EditScope::All);
    }
}
