pub mod api;
pub mod app;
pub mod config;
pub mod debounce;
pub mod error;
pub mod fixtures;
pub mod forms;
pub mod models;
pub mod notify;
pub mod parser;
pub mod services;
pub mod store;
pub mod tag_input;
pub mod ui;
pub mod view;
