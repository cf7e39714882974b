//! resources
//!
//! Resource shapes handed to the transport layer.
//!
//! All of them serialize to the camelCase JSON the protocol expects and
//! render timestamps in the canonical six-digit UTC form.

mod bundle;
mod collection;
mod manifest;

pub use bundle::{Bundle, BUNDLE_TYPE};
pub use collection::{Collection, Collections};
pub use manifest::{Manifest, ManifestEntry};
