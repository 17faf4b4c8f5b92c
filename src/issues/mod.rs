pub mod service;
pub mod uploads;
