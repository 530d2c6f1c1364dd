//! Border Maker Library
//!
//! Image upload service and renderer for decorative image borders: stores
//! uploaded pictures, keeps a gallery with the current selection, and renders
//! grid and border previews.

pub mod api;
pub mod border;
pub mod compositor;
pub mod config;
pub mod gallery;
pub mod grid;
pub mod media;
pub mod telemetry;
pub mod uploads;

pub use border::{BorderSettings, BorderSettingsUpdate};
pub use compositor::{composite_border, remove_background, BorderPreviewSettings};
pub use config::{ConfigError, ServerConfig};
pub use gallery::{GalleryStore, StateEvent, StateSnapshot};
pub use grid::{CellKind, GridLayout};
pub use uploads::{ImageEntry, UploadStore};
