//! Per-URL processing state
//!
//! Every URL in a run walks the same path through [`UrlState`]; the
//! [`UrlLifecycle`] tracker refuses transitions the pipeline never makes.

mod url_state;

pub use url_state::{UrlLifecycle, UrlState};
