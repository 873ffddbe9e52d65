pub mod database;
pub mod notifier;
pub mod scanner;
pub mod storage;
