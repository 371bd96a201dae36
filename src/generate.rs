use std::fs::{self, File};
use std::io::Write;

use hhd::config::Config;
use schemars::schema_for;

const SCHEMA_DIR: &str = "./rootfs/usr/share/hhd/schema";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_schema = schema_for!(Config);
    fs::create_dir_all(SCHEMA_DIR)?;
    let mut file = File::create(format!("{SCHEMA_DIR}/config_v1.json"))?;
    write!(file, "{}", serde_json::to_string_pretty(&config_schema)?)?;
    Ok(())
}
