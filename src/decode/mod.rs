//! Response decoder module
//!
//! Turns a JSON page response into an `Envelope` of items plus the cursor
//! for the next page.
//!
//! # Overview
//!
//! Items are located with a dot path (`data.items`), an index
//! (`results[0]`), or a JSONPath wildcard (`$.pages[*].entries`). The cursor
//! is read either from a body path or from the `Link` header.

mod decoders;
mod types;

pub use decoders::{extract_string, extract_value, parse_link_header, JsonEnvelopeDecoder};
pub use types::{CursorSource, DecoderConfig, EnvelopeDecoder};
