pub mod file_store;
pub mod notifier;
pub mod queue;
pub mod recovery;
pub mod scanner;
pub mod storage;
pub mod upload_service;
pub mod worker;
