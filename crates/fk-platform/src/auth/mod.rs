//! Authentication: password hashing, JWT issuance, refresh tokens.

pub mod api;
pub mod auth_service;
pub mod password_service;
pub mod refresh_token;
pub mod refresh_token_repository;
