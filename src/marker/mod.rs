//! Element markers.
//!
//! While a node body is captured its child elements cannot be rendered yet,
//! so a marker carrying the child's substitution key is written in their
//! place. [`MarkerWriter`] swaps the markers for rendered content when the
//! body is finally streamed out.

mod codec;
mod writer;

pub use codec::{
    ElementKey, KEY_LEN, MARKER_LEN, MARKER_PREFIX, MARKER_SUFFIX, decode_marker, encode_marker,
    marker_string, push_marker, write_marker,
};
pub use writer::{MarkerWriter, ScanConfig};
