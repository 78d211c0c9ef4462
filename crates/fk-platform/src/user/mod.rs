//! User aggregate - platform accounts.

pub mod api;
pub mod entity;
pub mod repository;
