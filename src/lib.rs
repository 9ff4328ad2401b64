pub mod breakpoints;
pub mod config;
pub mod definitions;
pub mod document;
pub mod error;
pub mod host;
pub mod json;
pub mod markdown;
pub mod notify;
pub mod projection;
pub mod stack_frames;
pub mod text;
pub mod tracking;
pub mod vfs;

pub use config::{Settings, SettingsStore, load_settings};
pub use document::DocumentStore;
pub use error::{LensError, LensResult};
pub use host::{DocumentChangeEvent, DocumentEdit, DocumentHost};
pub use markdown::MarkdownProjection;
pub use tracking::{RenameController, SessionRegistry, TextChangeTracker};
pub use vfs::{DiskFileStore, VirtualFileSystem};
