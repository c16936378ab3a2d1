use std::sync::Arc;

use crate::infra::store::Store;
use crate::security::config::SecurityConfig;
use crate::security::jwt::JwtManager;
use crate::services::{bookings::BookingService, directory::UserDirectory, payments::PaymentService};

#[derive(Clone)]
pub struct AppState {
    pub directory: UserDirectory,
    pub bookings: BookingService,
    pub payments: PaymentService,
    pub jwt: JwtManager,
    pub security: SecurityConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, security: SecurityConfig) -> Arc<Self> {
        Arc::new(Self {
            directory: UserDirectory::new(store.clone()),
            bookings: BookingService::new(store.clone()),
            payments: PaymentService::new(store),
            jwt: JwtManager::new(&security),
            security,
        })
    }
}
