use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::{DataStore, EventStore};
use crate::{Event, WeatherError};

pub const MEMORY_URL_SCHEME: &str = "memory://";

/// Process-local object sink; nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, object_name: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(object_name).cloned()
    }

    pub async fn object_names(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn put_object(&self, object_name: &str, data: Vec<u8>) -> Result<String, WeatherError> {
        self.objects.lock().await.insert(object_name.to_string(), data);
        Ok(format!("{MEMORY_URL_SCHEME}{object_name}"))
    }
}

/// Process-local event log.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: Mutex<Vec<Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn put_event(&self, event: &Event) -> Result<(), WeatherError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn data_store_keeps_objects_by_name() {
        let store = InMemoryDataStore::new();

        let url = store.put_object("x.json", b"1".to_vec()).await.unwrap();
        store.put_object("x.json", b"2".to_vec()).await.unwrap();

        assert_eq!(url, "memory://x.json");
        assert_eq!(store.get("x.json").await, Some(b"2".to_vec()));
        assert_eq!(store.object_names().await, vec!["x.json".to_string()]);
    }

    #[tokio::test]
    async fn event_store_appends_duplicates() {
        let store = InMemoryEventStore::new();
        let event = Event {
            timestamp: Utc::now(),
            city: "London".into(),
            country_code: "GB".into(),
            state: None,
            url: "memory://x.json".into(),
        };

        store.put_event(&event).await.unwrap();
        store.put_event(&event).await.unwrap();

        assert_eq!(store.events().await.len(), 2);
    }
}
