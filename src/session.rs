use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::access::restrict_to_identity;
use crate::aggregate;
use crate::cache::DatasetCache;
use crate::error::DashboardError;
use crate::filter::{build_views, filter_options};
use crate::loader;
use crate::models::{DashboardSummary, FilterOptions, FilterSelection, Identity};

#[derive(Debug)]
pub struct DashboardState {
    identity: Identity,
    selection: FilterSelection,
    cache: DatasetCache,
}

impl DashboardState {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            selection: FilterSelection::default(),
            cache: DatasetCache::new(),
        }
    }

    pub fn reset(identity: Identity) -> Self {
        Self::new(identity)
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[cfg(test)]
    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn select(&mut self, selection: FilterSelection) {
        self.selection = selection.scoped_to(&self.identity);
    }

    pub fn render(
        &mut self,
        data_path: &Path,
        today: NaiveDate,
        window_days: u32,
    ) -> Result<DashboardSummary, DashboardError> {
        let dataset = self.cache.get_or_load(data_path)?;
        let visible = restrict_to_identity(dataset, &self.identity);
        let views = build_views(&visible, &self.selection);
        let summary = aggregate::summarize(
            &views,
            &self.identity,
            &self.selection,
            today,
            window_days,
        );

        info!(
            total = summary.kpis.total_records,
            dated = views.dated.len(),
            "rendered dashboard"
        );
        Ok(summary)
    }

    pub fn options(&mut self, data_path: &Path) -> Result<FilterOptions, DashboardError> {
        let dataset = self.cache.get_or_load(data_path)?;
        let visible = restrict_to_identity(dataset, &self.identity);
        Ok(filter_options(&visible, &self.identity))
    }

    /// Replaces the data file with `source` and hands back a reset state.
    /// The current file is left alone unless `source` loads cleanly; the
    /// stored copy is read back by content, so any spreadsheet kind may
    /// replace a spreadsheet data file.
    pub fn upload(mut self, source: &Path, data_path: &Path) -> Result<Self, DashboardError> {
        if !self.identity.is_admin() {
            warn!("rejected upload from non-admin user");
            return Err(DashboardError::UploadForbidden {
                username: self.identity.username.clone(),
            });
        }

        if loader::source_format(source)? != loader::source_format(data_path)? {
            return Err(DashboardError::UploadFormatMismatch {
                upload: source.to_path_buf(),
                data_path: data_path.to_path_buf(),
            });
        }

        let incoming = loader::load_dataset(source)?;

        let store_error = |err: std::io::Error| DashboardError::Store {
            path: data_path.to_path_buf(),
            source: err,
        };
        if let Some(parent) = data_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(store_error)?;
        }
        fs::copy(source, data_path).map_err(store_error)?;

        self.cache.invalidate();
        info!(
            path = %data_path.display(),
            rows = incoming.len(),
            "stored new data file"
        );
        Ok(Self::reset(self.identity))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::error::LoadError;
    use crate::models::{DateRange, Role};

    const HEADER: &str = "Username,Region Name,Woreda Name,Event Organizer Name,Event ID,Received On\n";

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn write_csv(path: &Path, rows: &str) {
        fs::write(path, format!("{HEADER}{rows}")).unwrap();
    }

    fn sample_rows() -> &'static str {
        "alice,R1,W1,OrgA,E1,2024-01-05\n\
         bob,R1,W2,OrgA,E2,2024-01-05\n\
         alice,R2,W3,OrgB,E1,2024-02-01\n\
         bob,R2,W3,OrgB,E3,not-a-date\n"
    }

    #[test]
    fn admin_render_covers_all_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.csv");
        write_csv(&path, sample_rows());

        let mut state = DashboardState::new(Identity::new("root", Role::Admin));
        let summary = state.render(&path, day(2024, 2, 1), 7).unwrap();

        assert_eq!(summary.kpis.total_records, 4);
        assert_eq!(summary.kpis.users, 2);
        assert_eq!(summary.kpis.today, 1);
        assert_eq!(summary.kpis.this_month, 1);
        assert_eq!(
            summary.events.iter().map(|e| e.records).sum::<usize>(),
            summary.kpis.total_records
        );
    }

    #[test]
    fn standard_user_cannot_select_other_users() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.csv");
        write_csv(&path, sample_rows());

        let mut state = DashboardState::new(Identity::new("alice", Role::Standard));
        state.select(FilterSelection {
            usernames: BTreeSet::from(["bob".to_string()]),
            ..FilterSelection::default()
        });
        let summary = state.render(&path, day(2024, 2, 1), 7).unwrap();

        assert_eq!(summary.kpis.total_records, 2);
        assert!(summary
            .per_user
            .iter()
            .all(|u| u.username.as_deref() == Some("alice")));
    }

    #[test]
    fn date_range_leaves_totals_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.csv");
        write_csv(&path, sample_rows());

        let mut state = DashboardState::new(Identity::new("root", Role::Admin));
        state.select(FilterSelection {
            date_range: Some(DateRange::new(Some(day(2024, 3, 1)), Some(day(2024, 1, 1)))),
            ..FilterSelection::default()
        });
        let summary = state.render(&path, day(2024, 2, 1), 7).unwrap();

        assert_eq!(summary.kpis.total_records, 4);
        assert!(summary.monthly_trend.is_empty());
        assert!(summary.daily_per_user.is_empty());
    }

    #[test]
    fn render_fails_without_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = DashboardState::new(Identity::new("root", Role::Admin));
        let err = state
            .render(&dir.path().join("latest.csv"), day(2024, 2, 1), 7)
            .unwrap_err();
        assert!(matches!(err, DashboardError::Load(LoadError::NotFound { .. })));
    }

    #[test]
    fn upload_overwrites_data_and_resets_selection() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("uploads").join("latest.csv");
        let first = dir.path().join("first.csv");
        let second = dir.path().join("second.csv");
        write_csv(&first, sample_rows());
        write_csv(&second, "carol,R9,W9,OrgZ,E9,2024-02-01\n");

        let admin = Identity::new("root", Role::Admin);
        let mut state = DashboardState::new(admin.clone()).upload(&first, &data_path).unwrap();
        assert_eq!(state.render(&data_path, day(2024, 2, 1), 7).unwrap().kpis.total_records, 4);

        state.select(FilterSelection {
            regions: BTreeSet::from(["R1".to_string()]),
            ..FilterSelection::default()
        });
        let mut state = state.upload(&second, &data_path).unwrap();
        assert_eq!(state.identity(), &admin);
        assert_eq!(state.selection(), &FilterSelection::default());

        let summary = state.render(&data_path, day(2024, 2, 1), 7).unwrap();
        assert_eq!(summary.kpis.total_records, 1);
        assert_eq!(summary.per_user[0].username.as_deref(), Some("carol"));
    }

    #[test]
    fn non_admin_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("new.csv");
        write_csv(&source, sample_rows());

        let state = DashboardState::new(Identity::new("alice", Role::Standard));
        let err = state
            .upload(&source, &dir.path().join("latest.csv"))
            .unwrap_err();
        assert!(matches!(err, DashboardError::UploadForbidden { .. }));
        assert!(!dir.path().join("latest.csv").exists());
    }

    #[test]
    fn broken_upload_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("latest.csv");
        write_csv(&data_path, sample_rows());
        let broken = dir.path().join("broken.csv");
        fs::write(&broken, "username,region_name\nalice,R1\n").unwrap();

        let state = DashboardState::new(Identity::new("root", Role::Admin));
        let err = state.upload(&broken, &data_path).unwrap_err();
        assert!(matches!(err, DashboardError::Schema(_)));

        let mut state = DashboardState::new(Identity::new("root", Role::Admin));
        let summary = state.render(&data_path, day(2024, 2, 1), 7).unwrap();
        assert_eq!(summary.kpis.total_records, 4);
    }

    #[test]
    fn upload_must_match_data_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("new.csv");
        write_csv(&source, sample_rows());

        let state = DashboardState::new(Identity::new("root", Role::Admin));
        let err = state
            .upload(&source, &dir.path().join("latest_uploaded.xlsx"))
            .unwrap_err();
        assert!(matches!(err, DashboardError::UploadFormatMismatch { .. }));
    }

    #[test]
    fn spreadsheet_upload_loads_back_under_data_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("new.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in HEADER.trim_end().split(',').enumerate() {
            sheet.write_string(0, col as u16, header).unwrap();
        }
        for (col, value) in ["alice", "R1", "W1", "OrgA", "E1", "2024-02-01"].iter().enumerate() {
            sheet.write_string(1, col as u16, *value).unwrap();
        }
        workbook.save(&source).unwrap();

        let data_path = dir.path().join("latest_uploaded.xls");
        let state = DashboardState::new(Identity::new("root", Role::Admin));
        let mut state = state.upload(&source, &data_path).unwrap();

        let summary = state.render(&data_path, day(2024, 2, 1), 7).unwrap();
        assert_eq!(summary.kpis.total_records, 1);
        assert_eq!(summary.kpis.today, 1);
    }

    #[test]
    fn options_follow_access_control() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.csv");
        write_csv(&path, sample_rows());

        let mut state = DashboardState::new(Identity::new("bob", Role::Standard));
        let options = state.options(&path).unwrap();
        assert_eq!(options.regions, vec!["R1", "R2"]);
        assert_eq!(options.event_ids, vec!["E2", "E3"]);
        assert!(options.usernames.is_empty());
        assert_eq!(options.date_bounds, Some((day(2024, 1, 5), day(2024, 1, 5))));
    }
}
