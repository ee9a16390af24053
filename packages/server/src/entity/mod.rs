//! Relational store: accounts and track ownership.

pub mod track;
pub mod user;
