#![allow(dead_code)]

pub mod plugin;
pub mod release;

pub use plugin::{create_data_dir, create_plugin, run_checker};
pub use release::FakeRelease;
