pub mod filter;
pub mod history;
pub mod import;
pub mod topics;
pub mod train;
