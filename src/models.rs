use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

pub const BLANK_LABEL: &str = "(blank)";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    pub username: Option<String>,
    pub region_name: Option<String>,
    pub woreda_name: Option<String>,
    pub event_organizer_name: Option<String>,
    pub event_id: Option<String>,
    pub received_on: Option<NaiveDateTime>,
}

impl Record {
    pub fn date(&self) -> Option<NaiveDate> {
        self.received_on.map(|ts| ts.date())
    }

    pub fn month(&self) -> Option<String> {
        self.received_on.map(|ts| month_label(ts.date()))
    }

    pub fn value(&self, field: Field) -> Option<&str> {
        match field {
            Field::Username => self.username.as_deref(),
            Field::Region => self.region_name.as_deref(),
            Field::Woreda => self.woreda_name.as_deref(),
            Field::Organizer => self.event_organizer_name.as_deref(),
            Field::EventId => self.event_id.as_deref(),
        }
    }
}

/// `YYYY-MM` label; lexicographic order on these labels is chronological.
pub fn month_label(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Username,
    Region,
    Woreda,
    Organizer,
    EventId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn filtered<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&Record) -> bool,
    {
        Dataset::new(self.records.iter().filter(|r| keep(r)).cloned().collect())
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Standard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }

    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start > end)
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FilterSelection {
    pub regions: BTreeSet<String>,
    pub woredas: BTreeSet<String>,
    pub organizers: BTreeSet<String>,
    pub event_ids: BTreeSet<String>,
    pub usernames: BTreeSet<String>,
    pub date_range: Option<DateRange>,
}

impl FilterSelection {
    pub fn values(&self, field: Field) -> &BTreeSet<String> {
        match field {
            Field::Username => &self.usernames,
            Field::Region => &self.regions,
            Field::Woreda => &self.woredas,
            Field::Organizer => &self.organizers,
            Field::EventId => &self.event_ids,
        }
    }

    pub fn scoped_to(mut self, identity: &Identity) -> Self {
        if !identity.is_admin() {
            self.usernames = BTreeSet::from([identity.username.clone()]);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Kpis {
    pub total_records: usize,
    pub users: usize,
    pub regions: usize,
    pub woredas: usize,
    pub organizers: usize,
    pub today: usize,
    pub this_month: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub day_label: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    pub month: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserCount {
    pub username: Option<String>,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyUserCount {
    pub date: NaiveDate,
    pub username: Option<String>,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeoCount {
    pub region_name: Option<String>,
    pub woreda_name: Option<String>,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventCount {
    pub event_id: Option<String>,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub identity: Identity,
    pub generated_on: NaiveDate,
    pub selection: FilterSelection,
    pub kpis: Kpis,
    pub daily_trend: Vec<DailyCount>,
    pub monthly_trend: Vec<MonthlyCount>,
    pub per_user: Vec<UserCount>,
    pub daily_per_user: Vec<DailyUserCount>,
    pub geo: Vec<GeoCount>,
    pub events: Vec<EventCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FilterOptions {
    pub regions: Vec<String>,
    pub woredas: Vec<String>,
    pub organizers: Vec<String>,
    pub event_ids: Vec<String>,
    pub usernames: Vec<String>,
    pub date_bounds: Option<(NaiveDate, NaiveDate)>,
}
