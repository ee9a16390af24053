pub mod config;
pub mod search;
pub mod track;
pub mod upload;

pub use track::{TrackDescriptor, TrackDocument, TrackId};
