pub mod auth;
pub mod search;
pub mod shared;
pub mod track;
pub mod upload;
