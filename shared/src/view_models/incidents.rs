use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Months, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::model::{IncidentEntity, IncidentStatus};
use crate::navigation::AppCoordinator;
use crate::observable::Observable;
use crate::use_cases::{ChangeIncidentStatusUseCase, GetIncidentsUseCase};
use crate::{Clock, CUSTOM_RANGE_DEFAULT_DAYS};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum DateFilter {
    #[default]
    All,
    Today,
    ThisWeek,
    ThisMonth,
    Custom,
}

impl DateFilter {
    pub const ALL: [Self; 5] = [
        Self::All,
        Self::Today,
        Self::ThisWeek,
        Self::ThisMonth,
        Self::Custom,
    ];

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Today => "Today",
            Self::ThisWeek => "This Week",
            Self::ThisMonth => "This Month",
            Self::Custom => "Custom Range",
        }
    }

    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::All => "calendar",
            Self::Today => "calendar.day.timeline.left",
            Self::ThisWeek => "calendar.badge.clock",
            Self::ThisMonth => "calendar.circle",
            Self::Custom => "calendar.badge.plus",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IncidentListState {
    pub incidents: Vec<IncidentEntity>,
    pub filtered_incidents: Vec<IncidentEntity>,
    pub selected_status: Option<IncidentStatus>,
    pub date_filter: DateFilter,
    pub custom_start_date: NaiveDate,
    pub custom_end_date: NaiveDate,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl IncidentListState {
    /// Empty list with the custom range covering the last week up to `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            incidents: Vec::new(),
            filtered_incidents: Vec::new(),
            selected_status: None,
            date_filter: DateFilter::All,
            custom_start_date: today - ChronoDuration::days(CUSTOM_RANGE_DEFAULT_DAYS),
            custom_end_date: today,
            is_loading: false,
            error_message: None,
        }
    }

    pub fn has_active_filters(&self) -> bool {
        self.selected_status.is_some() || self.date_filter != DateFilter::All
    }

    pub fn date_range_text(&self) -> String {
        format!(
            "{} - {}",
            self.custom_start_date.format("%b %-d, %Y"),
            self.custom_end_date.format("%b %-d, %Y")
        )
    }

    fn refilter(&mut self, now: DateTime<FixedOffset>) {
        self.filtered_incidents = filter_incidents(
            &self.incidents,
            self.selected_status,
            self.date_filter,
            (self.custom_start_date, self.custom_end_date),
            now,
        );
    }
}

fn in_window(
    incident: &IncidentEntity,
    filter: DateFilter,
    (start, end): (NaiveDate, NaiveDate),
    now: DateTime<FixedOffset>,
) -> bool {
    let created = incident.created_at.with_timezone(now.offset());
    match filter {
        DateFilter::All => true,
        DateFilter::Today => created.date_naive() == now.date_naive(),
        DateFilter::ThisWeek => created >= now - ChronoDuration::days(7),
        DateFilter::ThisMonth => now
            .checked_sub_months(Months::new(1))
            .map_or(true, |cutoff| created >= cutoff),
        DateFilter::Custom => {
            let day = created.date_naive();
            start <= day && day <= end
        }
    }
}

/// Status match, then date window, newest first. Dates are compared in the
/// offset of `now`.
pub fn filter_incidents(
    incidents: &[IncidentEntity],
    status: Option<IncidentStatus>,
    date_filter: DateFilter,
    custom_range: (NaiveDate, NaiveDate),
    now: DateTime<FixedOffset>,
) -> Vec<IncidentEntity> {
    let mut filtered: Vec<IncidentEntity> = incidents
        .iter()
        .filter(|i| status.map_or(true, |s| i.status == s.raw()))
        .filter(|i| in_window(i, date_filter, custom_range, now))
        .cloned()
        .collect();
    filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    filtered
}

pub struct IncidentListViewModel {
    state: Observable<IncidentListState>,
    get_incidents: GetIncidentsUseCase,
    change_status: ChangeIncidentStatusUseCase,
    coordinator: Arc<AppCoordinator>,
    clock: Arc<dyn Clock>,
}

impl IncidentListViewModel {
    pub fn new(
        get_incidents: GetIncidentsUseCase,
        change_status: ChangeIncidentStatusUseCase,
        coordinator: Arc<AppCoordinator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let today = clock.now().date_naive();
        Self {
            state: Observable::new(IncidentListState::new(today)),
            get_incidents,
            change_status,
            coordinator,
            clock,
        }
    }

    pub fn state(&self) -> IncidentListState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<IncidentListState> {
        self.state.subscribe()
    }

    #[instrument(skip(self))]
    pub async fn load_incidents(&self) {
        self.state.update(|s| {
            s.is_loading = true;
            s.error_message = None;
        });

        match self.get_incidents.execute().await {
            Ok(incidents) => {
                info!(count = incidents.len(), "incidents loaded");
                self.state.update(|s| {
                    s.incidents = incidents;
                    s.is_loading = false;
                });
            }
            Err(e) => self.state.update(|s| {
                s.error_message = Some(e.to_string());
                s.is_loading = false;
            }),
        }
        self.apply_filters();
    }

    pub async fn refresh(&self) {
        self.load_incidents().await;
    }

    pub fn apply_filters(&self) {
        let now = self.clock.now();
        self.state.update(|s| s.refilter(now));
    }

    pub fn update_status_filter(&self, status: Option<IncidentStatus>) {
        self.state.update(|s| s.selected_status = status);
        self.apply_filters();
    }

    pub fn update_date_filter(&self, filter: DateFilter) {
        self.state.update(|s| s.date_filter = filter);
        self.apply_filters();
    }

    pub fn update_custom_start_date(&self, date: NaiveDate) {
        self.state.update(|s| s.custom_start_date = date);
        self.apply_filters();
    }

    pub fn update_custom_end_date(&self, date: NaiveDate) {
        self.state.update(|s| s.custom_end_date = date);
        self.apply_filters();
    }

    pub fn clear_filters(&self) {
        self.state.update(|s| {
            s.selected_status = None;
            s.date_filter = DateFilter::All;
        });
        self.apply_filters();
    }

    pub fn has_active_filters(&self) -> bool {
        self.state.with(IncidentListState::has_active_filters)
    }

    pub fn date_range_text(&self) -> String {
        self.state.with(IncidentListState::date_range_text)
    }

    /// Replaces the incident with the server's copy once the change is
    /// confirmed. Incidents are untouched on failure.
    #[instrument(skip(self, incident), fields(incident_id = %incident.id))]
    pub async fn update_incident_status(&self, incident: &IncidentEntity, new_status: IncidentStatus) {
        self.state.update(|s| {
            s.is_loading = true;
            s.error_message = None;
        });

        match self.change_status.execute(&incident.id, new_status).await {
            Ok(mut updated) => {
                if updated.id.is_empty() {
                    updated.id = incident.id.clone();
                }
                debug!(status = %updated.status_enum(), "status change confirmed");
                self.state.update(|s| {
                    if let Some(slot) = s.incidents.iter_mut().find(|i| i.id == updated.id) {
                        *slot = updated;
                    }
                    s.is_loading = false;
                });
            }
            Err(e) => {
                warn!(error = %e, "status change failed");
                self.state.update(|s| {
                    s.error_message = Some(e.to_string());
                    s.is_loading = false;
                });
            }
        }
        self.apply_filters();
    }

    pub fn current_user(&self) -> Option<String> {
        self.coordinator.current_user()
    }

    pub fn logout(&self) {
        self.coordinator.logout();
    }

    pub fn navigate_to_dashboard(&self) {
        self.coordinator.navigate_to_dashboard();
    }

    pub fn navigate_to_submit_incident(&self) {
        self.coordinator.navigate_to_submit_incident();
    }
}
