#![allow(clippy::unwrap_used)]
// File and environment loading.

use std::path::Path;
use std::time::Duration;

use figment::Jail;
use pretty_assertions::assert_eq;

use liftdeck_config::{
    Config, FloorsSection, load_config_from, save_config_to, to_controller_config,
};

#[test]
fn missing_file_yields_defaults() {
    Jail::expect_with(|_jail| {
        let cfg = load_config_from(Path::new("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        Ok(())
    });
}

#[test]
fn file_values_override_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "liftdeck.toml",
            r#"
                controller = "https://lifts.example.com"
                reconnect_delay_ms = 2500

                [floors]
                lowest = -2
                highest = 14

                [destinations]
                fleet_topic = "/topic/tower-b"
                call = "/app/tower-b/call"
                goto = "/app/tower-b/goto"
            "#,
        )?;

        let cfg = load_config_from(Path::new("liftdeck.toml")).unwrap();
        assert_eq!(cfg.floors, FloorsSection { lowest: -2, highest: 14 });
        assert_eq!(cfg.timeout, None);

        let controller = to_controller_config(&cfg).unwrap();
        assert_eq!(
            controller.websocket_url().unwrap().as_str(),
            "wss://lifts.example.com/ws/websocket"
        );
        assert_eq!(controller.reconnect_delay, Duration::from_millis(2500));
        assert_eq!(controller.destinations.fleet_topic, "/topic/tower-b");
        assert!(controller.floors.contains(-2));
        Ok(())
    });
}

#[test]
fn environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "liftdeck.toml",
            r#"
                controller = "http://localhost:8080"
                reconnect_delay_ms = 2500
            "#,
        )?;
        jail.set_env("LIFTDECK_CONTROLLER", "http://lifts.internal:9000");
        jail.set_env("LIFTDECK_RECONNECT_DELAY_MS", "750");
        jail.set_env("LIFTDECK_FLOORS__HIGHEST", "20");
        jail.set_env("LIFTDECK_HEART_BEAT__OUTGOING_MS", "0");

        let cfg = load_config_from(Path::new("liftdeck.toml")).unwrap();
        assert_eq!(cfg.controller, "http://lifts.internal:9000");
        assert_eq!(cfg.reconnect_delay_ms, 750);
        assert_eq!(cfg.floors.highest, 20);
        assert_eq!(cfg.floors.lowest, 0);
        assert_eq!(cfg.heart_beat.outgoing_ms, 0);
        assert_eq!(cfg.heart_beat.incoming_ms, 10_000);
        Ok(())
    });
}

#[test]
fn saved_config_is_readable_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let cfg = Config {
        controller: "https://lifts.example.com".into(),
        timeout: Some(12),
        ..Config::default()
    };

    save_config_to(&path, &cfg).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("controller = \"https://lifts.example.com\""));
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed, cfg);
}

#[test]
fn unset_timeout_is_left_out_of_saved_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    save_config_to(&path, &Config::default()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("timeout"));
    let parsed: Config = toml::from_str(&text).unwrap();
    assert_eq!(parsed.timeout, None);
}
