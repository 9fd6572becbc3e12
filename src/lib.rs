pub mod cache;
pub mod classify;
pub mod config;
pub mod fetch;
pub mod holiday;
pub mod jp_calendar;
pub mod long_holiday;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod scanner;
