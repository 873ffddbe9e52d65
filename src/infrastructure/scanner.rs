use crate::services::scanner::{ContentScanner, PatternScanner, PatternTable};
use std::sync::Arc;
use tracing::info;

pub fn setup_scanner() -> Arc<dyn ContentScanner> {
    let table = PatternTable::default();
    info!("🦠 Pattern scanner loaded with {} patterns", table.len());
    Arc::new(PatternScanner::new(table))
}
