//! Document store: descriptive track metadata.

pub mod track_descriptor;
