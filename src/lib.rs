//! Flowtime: a terminal focus timer. Work for as long as the task needs,
//! stop when you are done, then take a break that ends with an alarm.
//! Every session and the break that followed it are kept in a local history.

pub mod alarm;
pub mod app;
pub mod assets;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod session;
pub mod storage;
pub mod ticker;
pub mod time;
pub mod ui;
