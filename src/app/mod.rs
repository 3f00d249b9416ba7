mod config;
mod dashboard;
mod dispatch;
mod error;
mod input;
mod page;
mod pagination;
mod push;
mod runtime;
mod state;
mod table;
mod tui;
mod types;
mod ui_utils;
mod validate;

pub use runtime::run;
