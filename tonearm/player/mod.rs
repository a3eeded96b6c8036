pub mod backend;
pub mod facade;
pub mod gst_backend;
pub mod types;

pub use self::backend::{BackendEvent, BackendEventKind, Generation, MediaBackend};
pub use self::facade::{FacadeEvent, FacadeHandle, FacadeOptions, PlaybackFacade, PlaybackSnapshot};
pub use self::gst_backend::GstBackend;
pub use self::types::{MediaSource, PlaybackState, Volume};
