pub mod file_processor;
pub mod queue;
pub mod spreadsheet;
pub mod storage;
pub mod transform;
pub mod worker;
