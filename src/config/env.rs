use super::ReplayConfig;
use tracing::warn;

/// Path of the TOML config file.
pub const CONFIG_PATH_ENV: &str = "TRAFFIC_REPLAY_CONFIG";

const BIND_ENV: &str = "TRAFFIC_REPLAY_BIND";
const API_BIND_ENV: &str = "TRAFFIC_REPLAY_API_BIND";
const TICK_INTERVAL_ENV: &str = "TRAFFIC_REPLAY_TICK_INTERVAL";

/// Overlay environment variables on a loaded config.
///
/// `lookup` is `std::env::var` in production. Unparseable values are
/// ignored with a warning.
pub fn apply_env_overrides<F>(config: &mut ReplayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(BIND_ENV) {
        config.ingest.bind_addr = v;
    }
    if let Some(v) = lookup(API_BIND_ENV) {
        config.api.bind_addr = v;
    }
    if let Some(v) = lookup(TICK_INTERVAL_ENV) {
        match v.parse::<f64>() {
            Ok(seconds) if seconds.is_finite() && seconds > 0.0 => {
                config.playback.tick_interval_seconds = seconds;
            }
            _ => warn!(var = TICK_INTERVAL_ENV, value = %v, "Ignoring invalid tick interval"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut config = ReplayConfig::default();
        apply_env_overrides(&mut config, lookup(&[]));
        assert_eq!(config.ingest.bind_addr, "127.0.0.1:1101");
        assert_eq!(config.playback.tick_interval_seconds, 0.5);
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = ReplayConfig::default();
        apply_env_overrides(
            &mut config,
            lookup(&[
                ("TRAFFIC_REPLAY_BIND", "0.0.0.0:1101"),
                ("TRAFFIC_REPLAY_API_BIND", "0.0.0.0:3100"),
                ("TRAFFIC_REPLAY_TICK_INTERVAL", "0.25"),
            ]),
        );
        assert_eq!(config.ingest.bind_addr, "0.0.0.0:1101");
        assert_eq!(config.api.bind_addr, "0.0.0.0:3100");
        assert_eq!(config.playback.tick_interval_seconds, 0.25);
    }

    #[test]
    fn test_invalid_tick_interval_ignored() {
        for bad in ["fast", "-1", "0", "NaN"] {
            let mut config = ReplayConfig::default();
            apply_env_overrides(&mut config, lookup(&[("TRAFFIC_REPLAY_TICK_INTERVAL", bad)]));
            assert_eq!(config.playback.tick_interval_seconds, 0.5);
        }
    }
}
