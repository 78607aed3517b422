//! Chunked transfer engine.
//!
//! Sends the bytes of one upload session part by part and exposes a
//! resumable snapshot of its progress.

mod parts;
mod source;
mod state;
mod status;
mod uploader;

pub use parts::{expected_part_count, generate_parts, PartInfo};
pub use source::{BytesSource, FileSource, PartSource};
pub use state::{InstanceState, PartState, INSTANCE_STATE_VERSION};
pub use status::{NoOpObserver, StatusObserver, TransferStatus};
pub use uploader::{MultiUploader, MultiUploaderConfig};
