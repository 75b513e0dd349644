use std::sync::Arc;

use service::EventSink;

pub mod model;
pub mod service;

pub use model::{MessageSent, Subject};

/// Receiver of "message sent" events. Publishing never fails from the
/// caller's point of view.
pub type Sink = Arc<dyn EventSink + Send + Sync>;
