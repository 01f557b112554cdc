//! Headless testing support: a recording host and snapshot helpers.
//!
//! Use [`RecordingHost`] to mount a [`LayoutTree`](crate::node::LayoutTree)
//! without a real view layer and inspect every call the engine made into it.
//! Use [`frames_to_string`] to capture a laid-out tree as plain text for
//! snapshot-style assertions.

pub mod recording;
pub mod snapshot;

pub use recording::{HostCall, RecordingHost};
pub use snapshot::{errors_to_string, frames_to_string};
