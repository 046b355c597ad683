//! Wire codecs driven by the descriptor model.
//!
//! Both codecs are pure transformations over in-memory buffers: the message
//! store never touches the wire format itself, and nothing here performs
//! I/O, blocks, or retries. A parse either yields a complete message or the
//! first error encountered; no partial state escapes.

pub mod binary;
pub mod json;
