pub mod app;
pub mod availability;
pub mod calendar;
pub mod config;
pub mod db;
pub mod flow;
pub mod model;
pub mod persistence;
pub mod remote;
pub mod state;

pub mod error;
pub mod logger;
pub mod time;
