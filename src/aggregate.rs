use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};

use crate::filter::FilteredViews;
use crate::models::{
    month_label, DailyCount, DailyUserCount, Dataset, DashboardSummary, EventCount, Field,
    FilterSelection, GeoCount, Identity, Kpis, MonthlyCount, Record, UserCount,
};

fn group_counts<K, F>(data: &Dataset, mut key: F) -> BTreeMap<K, usize>
where
    K: Ord,
    F: FnMut(&Record) -> Option<K>,
{
    let mut counts = BTreeMap::new();
    for record in data {
        if let Some(k) = key(record) {
            *counts.entry(k).or_insert(0) += 1;
        }
    }
    counts
}

pub fn count_total(data: &Dataset) -> usize {
    data.len()
}

pub fn count_distinct(data: &Dataset, field: Field) -> usize {
    data.iter()
        .filter_map(|record| record.value(field))
        .collect::<BTreeSet<_>>()
        .len()
}

pub fn count_today(dated: &Dataset, today: NaiveDate) -> usize {
    dated.iter().filter(|r| r.date() == Some(today)).count()
}

pub fn count_this_month(dated: &Dataset, today: NaiveDate) -> usize {
    let current = month_label(today);
    dated
        .iter()
        .filter(|r| r.month().as_deref() == Some(current.as_str()))
        .count()
}

/// Per-day counts for the `window_days` days ending `today`. Days without
/// rows are absent rather than zero.
pub fn daily_trend(dated: &Dataset, today: NaiveDate, window_days: u32) -> Vec<DailyCount> {
    if window_days == 0 {
        return Vec::new();
    }
    let first_day = today
        .checked_sub_signed(Duration::days(i64::from(window_days) - 1))
        .unwrap_or(NaiveDate::MIN);

    group_counts(dated, |r| r.date().filter(|d| *d >= first_day && *d <= today))
        .into_iter()
        .map(|(date, records)| DailyCount {
            date,
            day_label: date.format("%b %d").to_string(),
            records,
        })
        .collect()
}

pub fn monthly_trend(dated: &Dataset) -> Vec<MonthlyCount> {
    group_counts(dated, |r| r.month())
        .into_iter()
        .map(|(month, records)| MonthlyCount { month, records })
        .collect()
}

pub fn per_user_summary(data: &Dataset) -> Vec<UserCount> {
    let mut summaries: Vec<UserCount> = group_counts(data, |r| Some(r.username.clone()))
        .into_iter()
        .map(|(username, records)| UserCount { username, records })
        .collect();

    summaries.sort_by(|a, b| b.records.cmp(&a.records));
    summaries
}

pub fn daily_per_user(dated: &Dataset) -> Vec<DailyUserCount> {
    group_counts(dated, |r| r.date().map(|date| (date, r.username.clone())))
        .into_iter()
        .map(|((date, username), records)| DailyUserCount {
            date,
            username,
            records,
        })
        .collect()
}

pub fn geo_summary(data: &Dataset) -> Vec<GeoCount> {
    group_counts(data, |r| Some((r.region_name.clone(), r.woreda_name.clone())))
        .into_iter()
        .map(|((region_name, woreda_name), records)| GeoCount {
            region_name,
            woreda_name,
            records,
        })
        .collect()
}

pub fn event_summary(data: &Dataset) -> Vec<EventCount> {
    let mut summaries: Vec<EventCount> = group_counts(data, |r| Some(r.event_id.clone()))
        .into_iter()
        .map(|(event_id, records)| EventCount { event_id, records })
        .collect();

    summaries.sort_by(|a, b| b.records.cmp(&a.records));
    summaries
}

/// Headline counts. Totals and distinct counts ignore the date range; the
/// today and this-month cards honour it.
pub fn kpis(views: &FilteredViews, today: NaiveDate) -> Kpis {
    Kpis {
        total_records: count_total(&views.overall),
        users: count_distinct(&views.overall, Field::Username),
        regions: count_distinct(&views.overall, Field::Region),
        woredas: count_distinct(&views.overall, Field::Woreda),
        organizers: count_distinct(&views.overall, Field::Organizer),
        today: count_today(&views.dated, today),
        this_month: count_this_month(&views.dated, today),
    }
}

pub fn summarize(
    views: &FilteredViews,
    identity: &Identity,
    selection: &FilterSelection,
    today: NaiveDate,
    window_days: u32,
) -> DashboardSummary {
    DashboardSummary {
        identity: identity.clone(),
        generated_on: today,
        selection: selection.clone(),
        kpis: kpis(views, today),
        daily_trend: daily_trend(&views.dated, today, window_days),
        monthly_trend: monthly_trend(&views.dated),
        per_user: per_user_summary(&views.overall),
        daily_per_user: daily_per_user(&views.dated),
        geo: geo_summary(&views.overall),
        events: event_summary(&views.overall),
    }
}
