//! Gallery state store
//!
//! Current image, gallery list and border settings, persisted through a
//! [`KeyValueStorage`] and published to subscribers on every change.

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;

use super::storage::{KeyValueStorage, StorageError};
use crate::border::{BorderSettings, BorderSettingsUpdate};

/// Storage key for the gallery array
pub const GALLERY_KEY: &str = "border-maker-gallery";

/// Storage key for the currently selected image
pub const CURRENT_IMAGE_KEY: &str = "border-maker-current-image";

/// Capacity of the change broadcast channel
const EVENT_CAPACITY: usize = 64;

/// Point-in-time copy of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub current_image: Option<String>,
    pub gallery: Vec<String>,
    pub settings: BorderSettings,
}

/// Change notifications published by the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum StateEvent {
    #[serde(rename = "current_image")]
    CurrentImage { image: Option<String> },
    #[serde(rename = "gallery")]
    Gallery { images: Vec<String> },
    #[serde(rename = "settings")]
    Settings(BorderSettings),
}

/// Thread-safe gallery store
pub struct GalleryStore {
    state: RwLock<StateSnapshot>,
    storage: Arc<dyn KeyValueStorage>,
    events: broadcast::Sender<StateEvent>,
}

impl GalleryStore {
    /// Restore state from `storage`. Unreadable or malformed entries start empty.
    pub fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
        let gallery: Vec<String> = read_json(storage.as_ref(), GALLERY_KEY).unwrap_or_default();
        let current_image: Option<String> = read_json(storage.as_ref(), CURRENT_IMAGE_KEY).flatten();
        tracing::debug!(count = gallery.len(), "Gallery restored");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(StateSnapshot {
                current_image,
                gallery,
                settings: BorderSettings::default(),
            }),
            storage,
            events,
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn current_image(&self) -> Option<String> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).current_image.clone()
    }

    pub fn gallery(&self) -> Vec<String> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).gallery.clone()
    }

    pub fn settings(&self) -> BorderSettings {
        self.state.read().unwrap_or_else(|e| e.into_inner()).settings.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: StateEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Make `image` current; a new image is also appended to the gallery.
    ///
    /// Returns whether the gallery grew. On a storage error the in-memory
    /// state is left as it was, so a retry performs the same writes.
    pub fn set_uploaded_image(&self, image: Option<String>) -> Result<bool, StorageError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let grown = match &image {
            Some(img) if !state.gallery.contains(img) => {
                let mut gallery = state.gallery.clone();
                gallery.push(img.clone());
                Some(gallery)
            }
            _ => None,
        };

        if let Some(gallery) = &grown {
            write_json(self.storage.as_ref(), GALLERY_KEY, gallery)?;
        }
        write_json(self.storage.as_ref(), CURRENT_IMAGE_KEY, &image)?;

        state.current_image = image.clone();
        let added = grown.is_some();
        if let Some(gallery) = grown {
            state.gallery = gallery;
        }
        let gallery = state.gallery.clone();
        drop(state);

        self.publish(StateEvent::CurrentImage { image });
        if added {
            tracing::info!(count = gallery.len(), "Image added to gallery");
            self.publish(StateEvent::Gallery { images: gallery });
        }
        Ok(added)
    }

    /// Make `image` current without adding it to the gallery
    pub fn select_image(&self, image: Option<String>) -> Result<(), StorageError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        write_json(self.storage.as_ref(), CURRENT_IMAGE_KEY, &image)?;
        state.current_image = image.clone();
        drop(state);

        self.publish(StateEvent::CurrentImage { image });
        Ok(())
    }

    /// Append `image` to the gallery unless already present
    pub fn add_to_gallery(&self, image: &str) -> Result<bool, StorageError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.gallery.iter().any(|g| g == image) {
            return Ok(false);
        }
        let mut gallery = state.gallery.clone();
        gallery.push(image.to_string());
        write_json(self.storage.as_ref(), GALLERY_KEY, &gallery)?;
        state.gallery = gallery.clone();
        drop(state);

        self.publish(StateEvent::Gallery { images: gallery });
        Ok(true)
    }

    /// Remove `image` by exact match. Clears the current image if it was the one removed.
    ///
    /// Returns whether anything was removed.
    pub fn delete_image(&self, image: &str) -> Result<bool, StorageError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let gallery: Vec<String> = state.gallery.iter().filter(|g| *g != image).cloned().collect();
        let removed = gallery.len() != state.gallery.len();
        let cleared_current = state.current_image.as_deref() == Some(image);

        if removed {
            write_json(self.storage.as_ref(), GALLERY_KEY, &gallery)?;
        }
        if cleared_current {
            write_json(self.storage.as_ref(), CURRENT_IMAGE_KEY, &None::<String>)?;
            state.current_image = None;
        }
        if removed {
            state.gallery = gallery.clone();
        }
        drop(state);

        if removed {
            tracing::info!(count = gallery.len(), "Image removed from gallery");
            self.publish(StateEvent::Gallery { images: gallery });
        }
        if cleared_current {
            self.publish(StateEvent::CurrentImage { image: None });
        }
        Ok(removed)
    }

    /// Merge a partial settings update and return the result
    pub fn update_settings(&self, update: &BorderSettingsUpdate) -> BorderSettings {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.settings.apply(update);
        let settings = state.settings.clone();
        drop(state);

        self.publish(StateEvent::Settings(settings.clone()));
        settings
    }
}

fn read_json<T: serde::de::DeserializeOwned>(storage: &dyn KeyValueStorage, key: &str) -> Option<T> {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(key, "Failed to read stored state: {}", e);
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, "Discarding malformed stored state: {}", e);
            None
        }
    }
}

fn write_json<T: Serialize>(storage: &dyn KeyValueStorage, key: &str, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string(value).map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
    storage.set_item(key, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::storage::{DirStorage, MemoryStorage};

    fn memory_store() -> (Arc<MemoryStorage>, GalleryStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = GalleryStore::load(storage.clone());
        (storage, store)
    }

    #[test]
    fn test_same_image_twice_is_one_entry() {
        let (_, store) = memory_store();
        assert!(store.set_uploaded_image(Some("data:image/png;base64,AAAA".into())).unwrap());
        assert!(!store.set_uploaded_image(Some("data:image/png;base64,AAAA".into())).unwrap());
        assert_eq!(store.gallery().len(), 1);
        assert_eq!(store.current_image().as_deref(), Some("data:image/png;base64,AAAA"));
    }

    #[test]
    fn test_gallery_appends_in_order() {
        let (_, store) = memory_store();
        store.set_uploaded_image(Some("/uploads/a.png".into())).unwrap();
        store.set_uploaded_image(Some("/uploads/b.png".into())).unwrap();
        assert_eq!(store.gallery(), vec!["/uploads/a.png", "/uploads/b.png"]);
    }

    #[test]
    fn test_every_mutation_persists() {
        let (storage, store) = memory_store();
        store.set_uploaded_image(Some("/uploads/a.png".into())).unwrap();
        assert_eq!(storage.get_item(GALLERY_KEY).unwrap().as_deref(), Some(r#"["/uploads/a.png"]"#));
        assert_eq!(storage.get_item(CURRENT_IMAGE_KEY).unwrap().as_deref(), Some(r#""/uploads/a.png""#));

        store.delete_image("/uploads/a.png").unwrap();
        assert_eq!(storage.get_item(GALLERY_KEY).unwrap().as_deref(), Some("[]"));
        assert_eq!(storage.get_item(CURRENT_IMAGE_KEY).unwrap().as_deref(), Some("null"));
    }

    #[test]
    fn test_delete_is_exact_match() {
        let (_, store) = memory_store();
        store.add_to_gallery("/uploads/a.png").unwrap();
        assert!(!store.delete_image("/uploads/A.png").unwrap());
        assert!(!store.delete_image("/uploads/a.pn").unwrap());
        assert!(store.delete_image("/uploads/a.png").unwrap());
        assert!(store.gallery().is_empty());
    }

    #[test]
    fn test_select_does_not_touch_gallery() {
        let (_, store) = memory_store();
        store.select_image(Some("/uploads/x.png".into())).unwrap();
        assert!(store.gallery().is_empty());
        assert_eq!(store.current_image().as_deref(), Some("/uploads/x.png"));
    }

    #[test]
    fn test_reload_from_dir_storage() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let store = GalleryStore::load(Arc::new(DirStorage::new(tmp.path())));
            store.set_uploaded_image(Some("/uploads/a.png".into())).unwrap();
            store.add_to_gallery("/uploads/b.png").unwrap();
        }
        let store = GalleryStore::load(Arc::new(DirStorage::new(tmp.path())));
        let snapshot = store.snapshot();
        assert_eq!(snapshot.gallery, vec!["/uploads/a.png", "/uploads/b.png"]);
        assert_eq!(snapshot.current_image.as_deref(), Some("/uploads/a.png"));
    }

    #[test]
    fn test_malformed_storage_starts_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(GALLERY_KEY, "{not json").unwrap();
        let store = GalleryStore::load(storage);
        assert!(store.gallery().is_empty());
    }

    #[test]
    fn test_settings_update_publishes() {
        let (_, store) = memory_store();
        let mut rx = store.subscribe();
        let settings = store.update_settings(&BorderSettingsUpdate {
            grid_size: Some(80),
            ..Default::default()
        });
        assert_eq!(settings.grid_size, 80);
        assert_eq!(rx.try_recv().unwrap(), StateEvent::Settings(settings));
    }

    #[test]
    fn test_upload_publishes_current_then_gallery() {
        let (_, store) = memory_store();
        let mut rx = store.subscribe();
        store.set_uploaded_image(Some("/uploads/a.png".into())).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            StateEvent::CurrentImage { image: Some("/uploads/a.png".into()) }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            StateEvent::Gallery { images: vec!["/uploads/a.png".into()] }
        );
    }

    /// Rejects writes to one key until `healthy` is set
    struct FlakyStorage {
        inner: MemoryStorage,
        failing_key: &'static str,
        healthy: std::sync::atomic::AtomicBool,
    }

    impl FlakyStorage {
        fn new(failing_key: &'static str) -> Self {
            Self {
                inner: MemoryStorage::new(),
                failing_key,
                healthy: std::sync::atomic::AtomicBool::new(false),
            }
        }

        fn recover(&self) {
            self.healthy.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl KeyValueStorage for FlakyStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.failing_key && !self.healthy.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove_item(key)
        }
    }

    #[test]
    fn test_failed_gallery_write_leaves_state_unchanged() {
        let storage = Arc::new(FlakyStorage::new(GALLERY_KEY));
        let store = GalleryStore::load(storage.clone());
        let mut rx = store.subscribe();

        assert!(store.set_uploaded_image(Some("/uploads/a.png".into())).is_err());
        assert!(store.gallery().is_empty());
        assert_eq!(store.current_image(), None);
        assert!(rx.try_recv().is_err());

        storage.recover();
        assert!(store.set_uploaded_image(Some("/uploads/a.png".into())).unwrap());
        assert_eq!(storage.get_item(GALLERY_KEY).unwrap().as_deref(), Some(r#"["/uploads/a.png"]"#));
        assert_eq!(store.gallery(), vec!["/uploads/a.png"]);
    }

    #[test]
    fn test_failed_delete_keeps_entry() {
        let storage = Arc::new(FlakyStorage::new(CURRENT_IMAGE_KEY));
        storage.inner.set_item(GALLERY_KEY, r#"["/uploads/a.png"]"#).unwrap();
        storage.inner.set_item(CURRENT_IMAGE_KEY, r#""/uploads/a.png""#).unwrap();
        let store = GalleryStore::load(storage.clone());

        assert!(store.delete_image("/uploads/a.png").is_err());
        assert_eq!(store.current_image().as_deref(), Some("/uploads/a.png"));
        assert_eq!(store.gallery(), vec!["/uploads/a.png"]);

        storage.recover();
        assert!(store.delete_image("/uploads/a.png").unwrap());
        assert!(store.gallery().is_empty());
        assert_eq!(store.current_image(), None);
        assert_eq!(storage.get_item(GALLERY_KEY).unwrap().as_deref(), Some("[]"));
    }
}
