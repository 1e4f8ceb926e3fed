use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::delivery::DeliveryEngine;
use crate::notification::NotificationService;
use crate::postgres::PostgresPool;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub service: NotificationService,
    pub delivery: DeliveryEngine,
    pub postgres_pool: Option<PostgresPool>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        service: NotificationService,
        postgres_pool: Option<PostgresPool>,
    ) -> Self {
        let delivery = service.delivery().clone();

        Self {
            settings: Arc::new(settings),
            service,
            delivery,
            postgres_pool,
            start_time: Instant::now(),
        }
    }
}
