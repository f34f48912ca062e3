pub mod api;
pub mod cascade;
pub mod chapter_service;
pub mod config;
pub mod database;
pub mod draft;
pub mod errors;
pub mod grading_service;
pub mod logging;
pub mod models;
pub mod question_service;

#[cfg(test)]
mod tests {
    mod draft_workflow_test;
}

pub use chapter_service::ChapterService;
pub use database::Database;
pub use draft::{collapse, Versioned};
pub use errors::*;
pub use grading_service::GradingService;
pub use models::*;
pub use question_service::QuestionService;
