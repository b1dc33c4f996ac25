//! Persistence: sessions, settings and photos.

pub mod images;
pub mod session;
pub mod settings;

pub use images::{ImageArena, ImageHandle, ImageId};
pub use session::{index_after_delete, Message, Sender, Session, SessionStore};
pub use settings::{Settings, DEFAULT_ENDPOINT};
