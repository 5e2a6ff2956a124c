use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::{broadcast, mpsc};

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::BookingEvent;
use crate::services::events;
use crate::services::notify::Notifier;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub events_tx: broadcast::Sender<BookingEvent>,
    pub notify_tx: mpsc::Sender<BookingEvent>,
}

impl AppState {
    /// Must be called inside a Tokio runtime: the notifier relay is spawned here.
    pub fn new(conn: Connection, config: AppConfig, notifier: Box<dyn Notifier>) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(256);
        let (notify_tx, notify_rx) = mpsc::channel(1024);
        tokio::spawn(events::relay(notify_rx, notifier));

        Arc::new(Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            events_tx,
            notify_tx,
        })
    }

    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database lock poisoned")))
    }
}
