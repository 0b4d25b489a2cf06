//! Two-tier presentation persistence, debounced autosave, and the
//! application state store.

pub mod autosave;
pub mod config;
pub mod local;
pub mod session;
pub mod tiered;

pub use autosave::Autosaver;
pub use config::StoreConfig;
pub use local::{LocalCache, SessionRecord};
pub use session::{Session, SessionState};
pub use tiered::{LoadSource, TieredStore};
