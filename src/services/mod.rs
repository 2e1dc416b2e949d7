pub mod insights;
pub mod journal;
pub mod policy;
pub mod window;
