use std::fmt::Write;

use crate::models::{DashboardSummary, FilterOptions, FilterSelection, Kpis, Role, BLANK_LABEL};

fn label(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(BLANK_LABEL)
}

fn describe_selection(selection: &FilterSelection) -> Vec<String> {
    let mut parts = Vec::new();
    let dimensions = [
        ("Region", &selection.regions),
        ("Woreda", &selection.woredas),
        ("Event organizer", &selection.organizers),
        ("Event ID", &selection.event_ids),
        ("User", &selection.usernames),
    ];
    for (name, values) in dimensions {
        if !values.is_empty() {
            let joined: Vec<&str> = values.iter().map(String::as_str).collect();
            parts.push(format!("{name}: {}", joined.join(", ")));
        }
    }
    if let Some(range) = &selection.date_range {
        let start = range.start.map(|d| d.to_string()).unwrap_or_else(|| "start".to_string());
        let end = range.end.map(|d| d.to_string()).unwrap_or_else(|| "end".to_string());
        parts.push(format!("Dates: {start} to {end}"));
    }
    parts
}

pub fn kpi_lines(kpis: &Kpis) -> Vec<String> {
    vec![
        format!("Total records: {}", kpis.total_records),
        format!("Users: {}", kpis.users),
        format!("Regions: {}", kpis.regions),
        format!("Woredas: {}", kpis.woredas),
        format!("Organizers: {}", kpis.organizers),
        format!("Today: {}", kpis.today),
        format!("This month: {}", kpis.this_month),
    ]
}

pub fn build_report(summary: &DashboardSummary) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Event Attendance Dashboard");
    let role = match summary.identity.role {
        Role::Admin => "admin",
        Role::Standard => "standard",
    };
    let _ = writeln!(
        output,
        "Generated {} for {} ({})",
        summary.generated_on, summary.identity.username, role
    );
    if summary.identity.role == Role::Standard {
        let _ = writeln!(
            output,
            "Showing only records entered by {}.",
            summary.identity.username
        );
    }

    let filters = describe_selection(&summary.selection);
    if !filters.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Filters: {}", filters.join("; "));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Figures");
    for line in kpi_lines(&summary.kpis) {
        let _ = writeln!(output, "- {line}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Entry Trends");
    let _ = writeln!(output, "### Recent days");
    if summary.daily_trend.is_empty() {
        let _ = writeln!(output, "No records in the recent window.");
    } else {
        for point in &summary.daily_trend {
            let _ = writeln!(output, "- {}: {} records", point.day_label, point.records);
        }
    }

    let _ = writeln!(output, "### Monthly records");
    if summary.monthly_trend.is_empty() {
        let _ = writeln!(output, "No dated records for this selection.");
    } else {
        for point in &summary.monthly_trend {
            let _ = writeln!(output, "- {}: {} records", point.month, point.records);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Enumerator Performance");
    let _ = writeln!(output, "### Records per user");
    if summary.per_user.is_empty() {
        let _ = writeln!(output, "No records for this selection.");
    } else {
        let _ = writeln!(output, "| Username | Records |");
        let _ = writeln!(output, "|---|---|");
        for row in &summary.per_user {
            let _ = writeln!(output, "| {} | {} |", label(&row.username), row.records);
        }
    }

    let _ = writeln!(output, "### Daily entries per user");
    if summary.daily_per_user.is_empty() {
        let _ = writeln!(output, "No dated records for this selection.");
    } else {
        let _ = writeln!(output, "| Date | Username | Records |");
        let _ = writeln!(output, "|---|---|---|");
        for row in &summary.daily_per_user {
            let _ = writeln!(
                output,
                "| {} | {} | {} |",
                row.date,
                label(&row.username),
                row.records
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Event & Geographic Coverage");
    let _ = writeln!(output, "### Records by event ID");
    if summary.events.is_empty() {
        let _ = writeln!(output, "No records for this selection.");
    } else {
        let _ = writeln!(output, "| Event ID | Records |");
        let _ = writeln!(output, "|---|---|");
        for row in &summary.events {
            let _ = writeln!(output, "| {} | {} |", label(&row.event_id), row.records);
        }
    }

    let _ = writeln!(output, "### Geographic coverage");
    if summary.geo.is_empty() {
        let _ = writeln!(output, "No records for this selection.");
    } else {
        let _ = writeln!(output, "| Region | Woreda | Records |");
        let _ = writeln!(output, "|---|---|---|");
        for row in &summary.geo {
            let _ = writeln!(
                output,
                "| {} | {} | {} |",
                label(&row.region_name),
                label(&row.woreda_name),
                row.records
            );
        }
    }

    output
}

pub fn to_json(summary: &DashboardSummary) -> serde_json::Result<String> {
    serde_json::to_string_pretty(summary)
}

pub fn build_options(options: &FilterOptions) -> String {
    let mut output = String::new();
    let sections = [
        ("Regions", &options.regions),
        ("Woredas", &options.woredas),
        ("Event organizers", &options.organizers),
        ("Event IDs", &options.event_ids),
        ("Users", &options.usernames),
    ];

    for (name, values) in sections {
        if name == "Users" && values.is_empty() {
            continue;
        }
        let _ = writeln!(output, "{name} ({}):", values.len());
        for value in values {
            let _ = writeln!(output, "  {value}");
        }
    }

    match options.date_bounds {
        Some((first, last)) => {
            let _ = writeln!(output, "Dates: {first} to {last}");
        }
        None => {
            let _ = writeln!(output, "Dates: no valid received_on values");
        }
    }
    output
}
