mod error;
mod id;
mod traits;

pub mod filesystem;

pub use error::UploadError;
pub use id::UploadId;
pub use traits::{BoxReader, UploadEngine, UploadInfo};

/// Path prefix under which uploads are addressed.
pub const UPLOAD_PATH: &str = "/upload";

/// Recover the opaque object locator from an upload `Location`.
///
/// The locator is the last non-empty path segment, so both absolute URLs and
/// bare paths are accepted.
pub fn locator_from_location(location: &str) -> Option<&str> {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/').find(|s| !s.is_empty())
}
