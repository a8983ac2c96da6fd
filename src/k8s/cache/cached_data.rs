use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CachedData<T> {
    pub data: T,
    pub last_updated: Instant,
    pub ttl: Duration,
    pub fetch_status: FetchStatus,
    pub version: u64, // bumped on every refresh
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Fresh,
    Stale,
    Error(String),
}

impl<T> CachedData<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            last_updated: Instant::now(),
            ttl,
            fetch_status: FetchStatus::Fresh,
            version: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.last_updated.elapsed() > self.ttl
    }

    pub fn is_fresh(&self) -> bool {
        !self.is_expired() && matches!(self.fetch_status, FetchStatus::Fresh)
    }

    pub fn update(&mut self, data: T) {
        self.data = data;
        self.last_updated = Instant::now();
        self.fetch_status = FetchStatus::Fresh;
        self.version += 1;
    }

    pub fn mark_stale(&mut self) {
        self.fetch_status = FetchStatus::Stale;
    }

    pub fn mark_error(&mut self, error: String) {
        self.fetch_status = FetchStatus::Error(error);
    }
}
