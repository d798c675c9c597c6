use chrono::{Local, NaiveDateTime};
use chrono_humanize::Humanize;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use famcal_core::models::{Event, Member, OccurrenceKind, ScheduledEvent, TaskCompletion};
use std::collections::HashMap;
use uuid::Uuid;

fn relative(start: NaiveDateTime) -> String {
    (start - Local::now().naive_local()).humanize()
}

fn time_span(event: &Event) -> String {
    if event.is_all_day {
        return "all day".to_string();
    }
    match event.end_date_time {
        Some(end) if end.date() == event.start_date_time.date() => format!(
            "{}-{}",
            event.start_date_time.format("%H:%M"),
            end.format("%H:%M")
        ),
        Some(end) => format!(
            "{} - {}",
            event.start_date_time.format("%H:%M"),
            end.format("%a %d %b %H:%M")
        ),
        None => event.start_date_time.format("%H:%M").to_string(),
    }
}

fn kind_label(kind: OccurrenceKind) -> &'static str {
    match kind {
        OccurrenceKind::Single => "single",
        OccurrenceKind::Instance => "series",
        OccurrenceKind::Override => "edited",
        OccurrenceKind::SeriesAnchor => "series start",
    }
}

pub fn display_schedule(entries: &[ScheduledEvent]) {
    if entries.is_empty() {
        println!("Nothing scheduled.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Time", "Title", "Kind", "Task", "When"]);

    for entry in entries {
        let event = &entry.event;
        let mut row = Row::new();
        // Occurrences are addressed through their series.
        let id = entry.series_id.unwrap_or(event.id);
        row.add_cell(Cell::new(id.to_string()));
        row.add_cell(Cell::new(entry.occurrence_date.format("%a %Y-%m-%d")));
        row.add_cell(Cell::new(time_span(event)));

        let mut title = String::new();
        if entry.series_id.is_some() {
            title.push_str("↻ ");
        }
        title.push_str(&event.title);
        let mut title_cell = Cell::new(title);
        if entry.completed {
            title_cell = title_cell
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey);
        } else if event.is_required {
            title_cell = title_cell.add_attribute(Attribute::Bold);
        }
        row.add_cell(title_cell);

        let mut kind_cell = Cell::new(kind_label(entry.kind));
        if entry.kind == OccurrenceKind::Override {
            kind_cell = kind_cell.fg(Color::Yellow);
        }
        row.add_cell(kind_cell);

        let task_cell = if !event.is_task {
            Cell::new("")
        } else if entry.completed {
            Cell::new("done").fg(Color::Green)
        } else if event.start_date_time < Local::now().naive_local() {
            Cell::new(format!("open ({} xp)", event.xp_points.unwrap_or(1))).fg(Color::Red)
        } else {
            Cell::new(format!("open ({} xp)", event.xp_points.unwrap_or(1)))
        };
        row.add_cell(task_cell);
        row.add_cell(Cell::new(relative(event.start_date_time)));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_event(event: &Event) {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);

    let mut add = |field: &str, value: String| {
        table.add_row(vec![Cell::new(field).add_attribute(Attribute::Bold), Cell::new(value)]);
    };

    add("ID", event.id.to_string());
    add("Title", event.title.clone());
    add("Family", event.family_id.to_string());
    add("Start", event.start_date_time.format("%a %Y-%m-%d %H:%M").to_string());
    add(
        "End",
        event
            .end_date_time
            .map(|end| end.format("%a %Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "None".to_string()),
    );
    add("All day", event.is_all_day.to_string());
    add("Location", event.location.clone().unwrap_or_else(|| "None".to_string()));
    add(
        "Description",
        event.description.clone().unwrap_or_else(|| "None".to_string()),
    );

    let repeat = match &event.recurrence {
        None => "Never".to_string(),
        Some(recurrence) => {
            let mut text = if recurrence.interval == 1 {
                format!("{}", recurrence.recurring_type)
            } else {
                format!("every {} x {}", recurrence.interval, recurrence.recurring_type)
            };
            if let Some(end_date) = recurrence.end_date {
                text.push_str(&format!(", until {}", end_date));
            }
            if let Some(end_count) = recurrence.end_count {
                text.push_str(&format!(", {} times", end_count));
            }
            text
        }
    };
    add("Repeats", repeat);

    if event.is_task {
        add("Task", format!("{} xp", event.xp_points.unwrap_or(1)));
        add("Required", event.is_required.to_string());
    }
    if !event.participant_ids.is_empty() {
        add(
            "Participants",
            event
                .participant_ids
                .iter()
                .map(Uuid::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        );
    }
    add("Created by", event.created_by_id.to_string());
    add("Updated", event.updated_at.humanize());

    println!("{table}");
}

pub fn display_members(members: &[Member]) {
    if members.is_empty() {
        println!("No members found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Joined"]);
    for member in members {
        let mut row = Row::new();
        row.add_cell(Cell::new(member.id.to_string()));
        row.add_cell(Cell::new(&member.name));
        row.add_cell(Cell::new(member.created_at.humanize()));
        table.add_row(row);
    }

    println!("{table}");
}

/// Completions with member names where the directory knows them.
pub fn display_completions(completions: &[TaskCompletion], names: &HashMap<Uuid, String>) {
    let mut table = Table::new();
    table.set_header(vec!["Member", "Completed"]);
    for completion in completions {
        let member = names
            .get(&completion.member_id)
            .cloned()
            .unwrap_or_else(|| completion.member_id.to_string());
        table.add_row(vec![
            Cell::new(member).fg(Color::Green),
            Cell::new(completion.completed_at.humanize()),
        ]);
    }

    println!("{table}");
}
