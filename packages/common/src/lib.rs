pub mod retry;
pub mod storage;
