//! Bootstrap and Seeding

pub mod api;
pub mod catalog;
pub mod seeder;
