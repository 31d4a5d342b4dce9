//! Media relay between the cloud media store and the room-side media store.

pub mod relay;
pub mod sniff;

pub use relay::{MediaDescriptor, MediaRelay, MediaSource, RelayDirection};
pub use sniff::{category_for, detect_type, extension_for, OCTET_STREAM};
