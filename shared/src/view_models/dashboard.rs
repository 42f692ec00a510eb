use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::model::DashboardEntity;
use crate::navigation::AppCoordinator;
use crate::observable::Observable;
use crate::use_cases::DashboardUseCase;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DashboardState {
    pub dashboard_entities: Vec<DashboardEntity>,
    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl DashboardState {
    pub fn total_incidents(&self) -> i64 {
        DashboardEntity::total(&self.dashboard_entities)
    }

    /// Share of the total in percent; 0 when there is nothing to count.
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self, entity: &DashboardEntity) -> f64 {
        let total = self.total_incidents();
        if total <= 0 {
            return 0.0;
        }
        entity.count as f64 / total as f64 * 100.0
    }

    pub fn formatted_percentage(&self, entity: &DashboardEntity) -> String {
        format!("{:.1}%", self.percentage(entity))
    }
}

pub struct DashboardViewModel {
    state: Observable<DashboardState>,
    dashboard: DashboardUseCase,
    coordinator: Arc<AppCoordinator>,
}

impl DashboardViewModel {
    pub fn new(dashboard: DashboardUseCase, coordinator: Arc<AppCoordinator>) -> Self {
        Self {
            state: Observable::default(),
            dashboard,
            coordinator,
        }
    }

    pub fn state(&self) -> DashboardState {
        self.state.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<String> {
        self.coordinator.current_user()
    }

    pub fn total_incidents(&self) -> i64 {
        self.state.with(DashboardState::total_incidents)
    }

    pub fn percentage(&self, entity: &DashboardEntity) -> f64 {
        self.state.with(|s| s.percentage(entity))
    }

    pub fn formatted_percentage(&self, entity: &DashboardEntity) -> String {
        self.state.with(|s| s.formatted_percentage(entity))
    }

    #[instrument(skip(self))]
    pub async fn load_dashboard(&self) {
        self.state.update(|s| {
            s.is_loading = true;
            s.error_message = None;
        });

        match self.dashboard.execute().await {
            Ok(entities) => {
                info!(buckets = entities.len(), "dashboard loaded");
                self.state.update(|s| {
                    s.dashboard_entities = entities;
                    s.is_loading = false;
                });
            }
            Err(e) => self.state.update(|s| {
                s.error_message = Some(e.to_string());
                s.is_loading = false;
            }),
        }
    }

    pub async fn refresh(&self) {
        self.load_dashboard().await;
    }
}
