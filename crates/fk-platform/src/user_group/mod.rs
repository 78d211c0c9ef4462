//! User Group aggregate - role definitions with permission sets.

pub mod api;
pub mod entity;
pub mod repository;
