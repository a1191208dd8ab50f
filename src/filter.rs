use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::debug;

use crate::models::{Dataset, DateRange, Field, FilterOptions, FilterSelection, Identity, Record};

const SELECTABLE_FIELDS: [Field; 5] = [
    Field::Region,
    Field::Woreda,
    Field::Organizer,
    Field::EventId,
    Field::Username,
];

/// The two views every render cycle works from. `overall` keeps undated rows
/// and ignores the date range; `dated` only holds rows with a valid date that
/// falls inside it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilteredViews {
    pub overall: Dataset,
    pub dated: Dataset,
}

fn matches_selection(record: &Record, selection: &FilterSelection) -> bool {
    SELECTABLE_FIELDS.iter().all(|&field| {
        let wanted = selection.values(field);
        wanted.is_empty()
            || record
                .value(field)
                .is_some_and(|value| wanted.contains(value))
    })
}

pub fn apply_non_date_filters(data: &Dataset, selection: &FilterSelection) -> Dataset {
    data.filtered(|record| matches_selection(record, selection))
}

pub fn apply_date_range(data: &Dataset, range: Option<&DateRange>) -> Dataset {
    data.filtered(|record| match (record.date(), range) {
        (Some(date), Some(range)) => range.contains(date),
        (Some(_), None) => true,
        (None, _) => false,
    })
}

pub fn build_views(data: &Dataset, selection: &FilterSelection) -> FilteredViews {
    let overall = apply_non_date_filters(data, selection);

    if let Some(range) = selection.date_range.as_ref().filter(|r| r.is_inverted()) {
        debug!(start = ?range.start, end = ?range.end, "date range start is after its end");
    }
    let dated = apply_date_range(&overall, selection.date_range.as_ref());

    debug!(
        input = data.len(),
        overall = overall.len(),
        dated = dated.len(),
        "applied filters"
    );
    FilteredViews { overall, dated }
}

pub fn date_bounds(data: &Dataset) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = data.iter().filter_map(Record::date);
    let first = dates.next()?;
    Some(dates.fold((first, first), |(min, max), date| {
        (min.min(date), max.max(date))
    }))
}

fn distinct_sorted(data: &Dataset, field: Field) -> Vec<String> {
    data.iter()
        .filter_map(|record| record.value(field))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn filter_options(data: &Dataset, identity: &Identity) -> FilterOptions {
    FilterOptions {
        regions: distinct_sorted(data, Field::Region),
        woredas: distinct_sorted(data, Field::Woreda),
        organizers: distinct_sorted(data, Field::Organizer),
        event_ids: distinct_sorted(data, Field::EventId),
        usernames: if identity.is_admin() {
            distinct_sorted(data, Field::Username)
        } else {
            Vec::new()
        },
        date_bounds: date_bounds(data),
    }
}
