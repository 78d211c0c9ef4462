//! Menu aggregate - the role-filtered navigation tree.

pub mod api;
pub mod entity;
pub mod repository;
