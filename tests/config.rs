use std::error::Error;

use hhd::config::{state::State, Config, Emulation, FanMode};

#[test]
fn test_load_partial_config() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("hhd.yaml");
    std::fs::write(
        &path,
        "controller:\n  emulation: xbox\n  theme: xbox_one\nfan:\n  mode: manual\n",
    )?;

    let config = Config::load(&path)?;
    assert_eq!(config.controller.emulation, Emulation::Xbox);
    assert_eq!(config.fan.mode, FanMode::Manual);
    assert_eq!(config.fan.points, [0, 40, 49, 58, 67, 75]);
    assert_eq!(config.http.port, 5335);
    Ok(())
}

#[test]
fn test_state_survives_save() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("hhd.yaml");

    let state = State::new(Config::default());
    let config = state.merge(&serde_json::json!({
        "battery": {"charge_limit": 80},
        "tdp": {"enabled": true, "mode": "custom", "spl": 12}
    }))?;
    config.save(&path)?;

    assert_eq!(Config::load(&path)?, config);
    Ok(())
}
