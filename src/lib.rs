pub mod api;
pub mod autosave;
pub mod config;
pub mod form;
pub mod interaction;
pub mod model;
pub mod notify;
pub mod storage;
pub mod ui;
pub mod util;
pub mod validation;
