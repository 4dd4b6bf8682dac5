//! Per-command handling logic.
//!
//! Each handler validates parameters against the capability bounds and
//! applies the state delta. Out-of-range numeric values are clamped and
//! reported as success; malformed values (color format, unknown mode)
//! fail without mutating state. Missing parameters fall back to
//! documented defaults instead of failing.

use rand::Rng;
use serde_json::{Map, Value};

use crate::capability::{Bounds, Capability, ThermostatMode};
use crate::device::state::{DeviceState, PowerState};

/// Result of applying one command to device state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

impl CommandOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Apply a command that has already passed the accepted-commands check
pub fn dispatch(
    state: &mut DeviceState,
    capability: &Capability,
    command: &str,
    params: &Map<String, Value>,
    rng: &mut impl Rng,
) -> CommandOutcome {
    match command {
        "status" => CommandOutcome::ok("Status retrieved successfully"),
        "power" => power(state, params, rng),
        "set_brightness" => set_brightness(state, &capability.bounds, params),
        "set_color" => set_color(state, params),
        "set_temperature" => set_temperature(state, &capability.bounds, params),
        "set_mode" => set_mode(state, capability, params),
        "calibrate" => calibrate(state, params),
        other => {
            CommandOutcome::rejected(format!("Command '{}' not supported by this device", other))
        }
    }
}

fn power(state: &mut DeviceState, params: &Map<String, Value>, rng: &mut impl Rng) -> CommandOutcome {
    let requested = param_str(params, "state").unwrap_or("toggle");

    let current = match state.power_state() {
        Some(power_state) => power_state,
        None => return CommandOutcome::rejected("Device has no power switch"),
    };

    let new_state = match requested {
        "on" => PowerState::On,
        "off" => PowerState::Off,
        "toggle" => current.toggled(),
        other => return CommandOutcome::rejected(format!("Invalid power state '{}'", other)),
    };

    match state {
        DeviceState::Light(light) => {
            light.power_state = new_state;
            light.power_usage = match new_state {
                PowerState::On => round2(0.1 * light.brightness as f64 / 100.0),
                PowerState::Off => 0.0,
            };
        }
        DeviceState::Switch(switch) => {
            switch.power_state = new_state;
            switch.power_usage = match new_state {
                PowerState::On => round2(rng.gen_range(0.5..=2.0)),
                PowerState::Off => 0.0,
            };
        }
        DeviceState::Thermostat(thermostat) => {
            thermostat.power_state = new_state;
            match new_state {
                // Draws power only while actively heating or cooling
                PowerState::On if thermostat.mode != ThermostatMode::Off => {
                    thermostat.power_usage = round2(rng.gen_range(1.0..=3.0));
                }
                PowerState::On => {}
                PowerState::Off => thermostat.power_usage = 0.0,
            }
        }
        DeviceState::Sensor(_) => {
            return CommandOutcome::rejected("Device has no power switch");
        }
    }

    CommandOutcome::ok(format!("Power set to {}", new_state))
}

fn set_brightness(
    state: &mut DeviceState,
    bounds: &Bounds,
    params: &Map<String, Value>,
) -> CommandOutcome {
    let light = match state {
        DeviceState::Light(light) => light,
        _ => return CommandOutcome::rejected("Device does not support brightness"),
    };

    let (min, max) = bounds.brightness.unwrap_or((0, 100));
    let brightness = param_i64(params, "brightness", 50).clamp(min, max);

    light.brightness = brightness;
    if light.power_state == PowerState::On {
        light.power_usage = round2(0.1 * brightness as f64 / 100.0);
    }

    CommandOutcome::ok(format!("Brightness set to {}", brightness))
}

fn set_color(state: &mut DeviceState, params: &Map<String, Value>) -> CommandOutcome {
    let light = match state {
        DeviceState::Light(light) => light,
        _ => return CommandOutcome::rejected("Device does not support color"),
    };

    let color = param_str(params, "color").unwrap_or("#ffffff");

    // Accepts #RGB and #RRGGBB forms only
    if !color.starts_with('#') || !matches!(color.len(), 4 | 7) {
        return CommandOutcome::rejected("Invalid color format");
    }

    light.color = color.to_string();
    CommandOutcome::ok(format!("Color set to {}", color))
}

fn set_temperature(
    state: &mut DeviceState,
    bounds: &Bounds,
    params: &Map<String, Value>,
) -> CommandOutcome {
    let thermostat = match state {
        DeviceState::Thermostat(thermostat) => thermostat,
        _ => return CommandOutcome::rejected("Device does not support temperature control"),
    };

    let (min, max) = bounds.temperature.unwrap_or((16.0, 30.0));
    let temperature = param_f64(params, "temperature", 22.0).clamp(min, max);

    // Convergence of current_temperature happens in the drift model
    thermostat.target_temperature = temperature;

    CommandOutcome::ok(format!("Temperature set to {}", temperature))
}

fn set_mode(
    state: &mut DeviceState,
    capability: &Capability,
    params: &Map<String, Value>,
) -> CommandOutcome {
    let thermostat = match state {
        DeviceState::Thermostat(thermostat) => thermostat,
        _ => return CommandOutcome::rejected("Device does not support modes"),
    };

    let requested = param_str(params, "mode").unwrap_or("auto");
    let mode = match requested.parse::<ThermostatMode>() {
        Ok(mode) if capability.supports_mode(mode) => mode,
        _ => return CommandOutcome::rejected(format!("Mode {} not supported", requested)),
    };

    thermostat.mode = mode;
    CommandOutcome::ok(format!("Mode set to {}", mode))
}

fn calibrate(state: &mut DeviceState, params: &Map<String, Value>) -> CommandOutcome {
    let sensor = match state {
        DeviceState::Sensor(sensor) => sensor,
        _ => return CommandOutcome::rejected("Device does not support calibration"),
    };

    let offset = param_f64(params, "offset", 0.0);
    sensor.temperature += offset;

    CommandOutcome::ok(format!("Sensor calibrated with offset {}", offset))
}

fn param_str<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn param_i64(params: &Map<String, Value>, key: &str, default: i64) -> i64 {
    match params.get(key) {
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .unwrap_or(default),
        None => default,
    }
}

fn param_f64(params: &Map<String, Value>, key: &str, default: f64) -> f64 {
    params.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{capability, DeviceType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn params(entries: &[(&str, Value)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_status_command_leaves_state_untouched() {
        let mut state = DeviceState::new(DeviceType::Light);
        let before = serde_json::to_value(&state).unwrap();

        let outcome = dispatch(
            &mut state,
            capability(DeviceType::Light),
            "status",
            &Map::new(),
            &mut rng(),
        );

        assert!(outcome.success);
        assert_eq!(serde_json::to_value(&state).unwrap(), before);
    }

    #[test]
    fn test_power_defaults_to_toggle() {
        let mut state = DeviceState::new(DeviceType::Light);
        let cap = capability(DeviceType::Light);

        let outcome = dispatch(&mut state, cap, "power", &Map::new(), &mut rng());
        assert!(outcome.success);
        assert_eq!(state.power_state(), Some(PowerState::On));

        let outcome = dispatch(&mut state, cap, "power", &Map::new(), &mut rng());
        assert!(outcome.success);
        assert_eq!(state.power_state(), Some(PowerState::Off));
    }

    #[test]
    fn test_power_off_is_idempotent() {
        let mut state = DeviceState::new(DeviceType::Switch);
        let cap = capability(DeviceType::Switch);
        let off = params(&[("state", json!("off"))]);
        let mut rng = rng();

        let first = dispatch(&mut state, cap, "power", &off, &mut rng);
        assert!(first.success);
        assert_eq!(state.reading("power_usage").unwrap(), 0.0);

        let second = dispatch(&mut state, cap, "power", &off, &mut rng);
        assert!(second.success);
        assert_eq!(state.reading("power_usage").unwrap(), 0.0);
    }

    #[test]
    fn test_switch_power_usage_in_range_when_on() {
        let mut state = DeviceState::new(DeviceType::Switch);
        let cap = capability(DeviceType::Switch);
        let on = params(&[("state", json!("on"))]);

        dispatch(&mut state, cap, "power", &on, &mut rng());

        let usage = state.reading("power_usage").unwrap().as_f64().unwrap();
        assert!((0.5..=2.0).contains(&usage));
    }

    #[test]
    fn test_light_power_usage_tracks_brightness() {
        let mut state = DeviceState::new(DeviceType::Light);
        let cap = capability(DeviceType::Light);
        let mut rng = rng();

        dispatch(&mut state, cap, "power", &params(&[("state", json!("on"))]), &mut rng);
        dispatch(
            &mut state,
            cap,
            "set_brightness",
            &params(&[("brightness", json!(80))]),
            &mut rng,
        );

        assert_eq!(state.reading("brightness").unwrap(), 80);
        assert_eq!(state.reading("power_usage").unwrap(), 0.08);
    }

    #[test]
    fn test_invalid_power_state_rejected_without_mutation() {
        let mut state = DeviceState::new(DeviceType::Switch);
        let cap = capability(DeviceType::Switch);

        let outcome = dispatch(
            &mut state,
            cap,
            "power",
            &params(&[("state", json!("sideways"))]),
            &mut rng(),
        );

        assert!(!outcome.success);
        assert_eq!(state.power_state(), Some(PowerState::Off));
    }

    #[test]
    fn test_brightness_clamped_at_both_ends() {
        let mut state = DeviceState::new(DeviceType::Light);
        let cap = capability(DeviceType::Light);
        let mut rng = rng();

        let outcome = dispatch(
            &mut state,
            cap,
            "set_brightness",
            &params(&[("brightness", json!(250))]),
            &mut rng,
        );
        assert!(outcome.success);
        assert_eq!(state.reading("brightness").unwrap(), 100);

        let outcome = dispatch(
            &mut state,
            cap,
            "set_brightness",
            &params(&[("brightness", json!(-10))]),
            &mut rng,
        );
        assert!(outcome.success);
        assert_eq!(state.reading("brightness").unwrap(), 0);
    }

    #[test]
    fn test_brightness_defaults_to_50() {
        let mut state = DeviceState::new(DeviceType::Light);
        if let DeviceState::Light(light) = &mut state {
            light.brightness = 10;
        }

        let outcome = dispatch(
            &mut state,
            capability(DeviceType::Light),
            "set_brightness",
            &Map::new(),
            &mut rng(),
        );

        assert!(outcome.success);
        assert_eq!(state.reading("brightness").unwrap(), 50);
    }

    #[test]
    fn test_set_color_accepts_short_and_long_forms() {
        let mut state = DeviceState::new(DeviceType::Light);
        let cap = capability(DeviceType::Light);
        let mut rng = rng();

        for color in ["#abc", "#11aaff"] {
            let outcome = dispatch(
                &mut state,
                cap,
                "set_color",
                &params(&[("color", json!(color))]),
                &mut rng,
            );
            assert!(outcome.success);
            assert_eq!(state.reading("color").unwrap(), color);
        }
    }

    #[test]
    fn test_set_color_rejects_bad_format_without_mutation() {
        let mut state = DeviceState::new(DeviceType::Light);
        let cap = capability(DeviceType::Light);
        let mut rng = rng();

        for color in ["red", "#12345", "ffffff", "#"] {
            let outcome = dispatch(
                &mut state,
                cap,
                "set_color",
                &params(&[("color", json!(color))]),
                &mut rng,
            );
            assert!(!outcome.success);
            assert_eq!(outcome.message, "Invalid color format");
            assert_eq!(state.reading("color").unwrap(), "#ffffff");
        }
    }

    #[test]
    fn test_set_temperature_clamps_and_reports_clamped_value() {
        let mut state = DeviceState::new(DeviceType::Thermostat);
        let cap = capability(DeviceType::Thermostat);

        let outcome = dispatch(
            &mut state,
            cap,
            "set_temperature",
            &params(&[("temperature", json!(40))]),
            &mut rng(),
        );

        assert!(outcome.success);
        assert!(outcome.message.contains("30"));
        assert_eq!(state.reading("target_temperature").unwrap(), 30.0);
        // Current temperature converges via drift, not here
        assert_eq!(state.reading("current_temperature").unwrap(), 22.0);
    }

    #[test]
    fn test_set_mode_rejects_unsupported_mode() {
        let mut state = DeviceState::new(DeviceType::Thermostat);
        let cap = capability(DeviceType::Thermostat);

        let outcome = dispatch(
            &mut state,
            cap,
            "set_mode",
            &params(&[("mode", json!("turbo"))]),
            &mut rng(),
        );

        assert!(!outcome.success);
        assert_eq!(state.reading("mode").unwrap(), "off");
    }

    #[test]
    fn test_set_mode_accepts_supported_mode() {
        let mut state = DeviceState::new(DeviceType::Thermostat);
        let cap = capability(DeviceType::Thermostat);

        let outcome = dispatch(
            &mut state,
            cap,
            "set_mode",
            &params(&[("mode", json!("heat"))]),
            &mut rng(),
        );

        assert!(outcome.success);
        assert_eq!(state.reading("mode").unwrap(), "heat");
    }

    #[test]
    fn test_calibrate_applies_additive_offset() {
        let mut state = DeviceState::new(DeviceType::Sensor);
        let cap = capability(DeviceType::Sensor);

        let outcome = dispatch(
            &mut state,
            cap,
            "calibrate",
            &params(&[("offset", json!(1.5))]),
            &mut rng(),
        );

        assert!(outcome.success);
        assert_eq!(state.reading("temperature").unwrap(), 23.5);
    }
}
