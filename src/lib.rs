pub mod api;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod device;
pub mod dmi;
pub mod drivers;
pub mod hid;
pub mod input;
pub mod power;
pub mod uhid;
pub mod watcher;
