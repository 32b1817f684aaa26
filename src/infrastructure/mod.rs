pub mod activity_log;
pub mod config;
pub mod cycle_repository;
pub mod error;
pub mod feedback;
pub mod storage;
pub mod subject_catalog;
