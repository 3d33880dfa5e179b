//! Sinks for fetched weather payloads and their provenance events.
//!
//! Backends are picked from [`DataStoreConfig`] / [`EventStoreConfig`] at startup.

use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    Event, WeatherError,
    config::{DataStoreConfig, EventStoreConfig},
};

pub mod local;
pub mod memory;

pub use local::{LocalEventStore, LocalFileDataStore};
pub use memory::{InMemoryDataStore, InMemoryEventStore};

/// Object sink for serialized weather payloads.
#[async_trait]
pub trait DataStore: Send + Sync + Debug {
    /// Store `data` under `object_name` and return a url that locates it.
    async fn put_object(&self, object_name: &str, data: Vec<u8>) -> Result<String, WeatherError>;
}

/// Append-only sink for provenance events.
#[async_trait]
pub trait EventStore: Send + Sync + Debug {
    async fn put_event(&self, event: &Event) -> Result<(), WeatherError>;
}

pub fn data_store_from_config(config: &DataStoreConfig) -> Result<Arc<dyn DataStore>, WeatherError> {
    let store: Arc<dyn DataStore> = match config {
        DataStoreConfig::Local { directory } => Arc::new(LocalFileDataStore::new(directory)?),
        DataStoreConfig::Memory => Arc::new(InMemoryDataStore::new()),
    };

    Ok(store)
}

pub fn event_store_from_config(config: &EventStoreConfig) -> Result<Arc<dyn EventStore>, WeatherError> {
    let store: Arc<dyn EventStore> = match config {
        EventStoreConfig::Local { file_path } => Arc::new(LocalEventStore::new(file_path)?),
        EventStoreConfig::Memory => Arc::new(InMemoryEventStore::new()),
    };

    Ok(store)
}
