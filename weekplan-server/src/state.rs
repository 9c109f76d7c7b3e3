use std::sync::Arc;

use weekplan_core::storage::Storage;
use weekplan_core::sync::CalendarService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<CalendarService>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_service(CalendarService::new(storage))
    }

    pub fn with_service(service: CalendarService) -> Self {
        AppState {
            service: Arc::new(service),
        }
    }

    pub fn service(&self) -> &CalendarService {
        &self.service
    }
}
