pub mod auth;
pub mod search;
pub mod tracks;
pub mod uploads;
pub mod users;
