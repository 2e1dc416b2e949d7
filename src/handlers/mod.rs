pub mod daily_logs;
pub mod data;
pub mod health;
pub mod history;
pub mod insights;
