//! Gallery and current-image state with pluggable persistence

pub mod storage;
pub mod store;

pub use storage::{DirStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use store::{GalleryStore, StateEvent, StateSnapshot, CURRENT_IMAGE_KEY, GALLERY_KEY};
