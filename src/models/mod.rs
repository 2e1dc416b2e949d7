pub mod collection;
pub mod daily_log;
