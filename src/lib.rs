pub mod storage;
pub mod training;
