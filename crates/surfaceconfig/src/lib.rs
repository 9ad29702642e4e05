use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackdropConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub appearance: Appearance,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Appearance {
    #[serde(deserialize_with = "deserialize_color")]
    pub color: [f32; 3],
    pub speed: f32,
    pub amplitude: f32,
    pub mouse_reactive: bool,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            speed: 1.0,
            amplitude: 0.1,
            mouse_reactive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Timing {
    pub target_fps: f32,
    pub render_scale: f32,
    pub pixel_ratio_cap: f32,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub resize_debounce: Duration,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub pointer_throttle: Duration,
    pub pointer_smoothing: f32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            render_scale: 0.5,
            pixel_ratio_cap: 1.5,
            resize_debounce: Duration::from_millis(100),
            pointer_throttle: Duration::from_millis(50),
            pointer_smoothing: 0.1,
        }
    }
}

impl Default for BackdropConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            appearance: Appearance::default(),
            timing: Timing::default(),
            attributes: BTreeMap::new(),
        }
    }
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() || v.is_infinite() {
                return Err(E::custom("duration must be a finite non-negative number"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_color<'de, D>(deserializer: D) -> Result<[f32; 3], D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Triple([f32; 3]),
    }

    match Helper::deserialize(deserializer)? {
        Helper::Triple(rgb) => Ok(rgb),
        Helper::Str(raw) => parse_color(&raw).map_err(de::Error::custom),
    }
}

/// Parses `#rrggbb`, `rrggbb`, or a comma separated `r,g,b` float triple.
///
/// Float components are taken as-is; values outside `[0, 1]` are not clamped.
pub fn parse_color(raw: &str) -> Result<[f32; 3], String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("color must not be empty".to_string());
    }

    if trimmed.contains(',') {
        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!(
                "color '{trimmed}' must have exactly three components"
            ));
        }
        let mut rgb = [0.0_f32; 3];
        for (slot, part) in rgb.iter_mut().zip(&parts) {
            *slot = part
                .parse::<f32>()
                .map_err(|_| format!("invalid color component '{part}'"))?;
        }
        return Ok(rgb);
    }

    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if hex.len() != 6 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(format!(
            "invalid color '{trimmed}'; expected #rrggbb or r,g,b"
        ));
    }
    let mut rgb = [0.0_f32; 3];
    for (index, slot) in rgb.iter_mut().enumerate() {
        let byte = u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16)
            .map_err(|err| format!("invalid color '{trimmed}': {err}"))?;
        *slot = f32::from(byte) / 255.0;
    }
    Ok(rgb)
}

impl BackdropConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: BackdropConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        let appearance = &self.appearance;
        if appearance.color.iter().any(|component| !component.is_finite()) {
            return Err(ConfigError::Invalid(
                "appearance.color components must be finite".into(),
            ));
        }
        if !appearance.speed.is_finite() {
            return Err(ConfigError::Invalid(
                "appearance.speed must be finite".into(),
            ));
        }
        if !appearance.amplitude.is_finite() {
            return Err(ConfigError::Invalid(
                "appearance.amplitude must be finite".into(),
            ));
        }

        let timing = &self.timing;
        if !timing.target_fps.is_finite() || timing.target_fps < 0.0 {
            return Err(ConfigError::Invalid(
                "timing.target_fps must be >= 0 (0 = uncapped)".into(),
            ));
        }
        if !(timing.render_scale > 0.0 && timing.render_scale <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "timing.render_scale must be in (0, 1], got {}",
                timing.render_scale
            )));
        }
        if !(timing.pixel_ratio_cap.is_finite() && timing.pixel_ratio_cap > 0.0) {
            return Err(ConfigError::Invalid(
                "timing.pixel_ratio_cap must be greater than zero".into(),
            ));
        }
        if !(timing.pointer_smoothing > 0.0 && timing.pointer_smoothing <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "timing.pointer_smoothing must be in (0, 1], got {}",
                timing.pointer_smoothing
            )));
        }

        for name in self.attributes.keys() {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "attribute names may not be empty".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
version = 1

[appearance]
color = "#ff8000"
speed = 0.5
amplitude = 0.2
mouse_reactive = false

[timing]
target_fps = 24
resize_debounce = "250ms"
pointer_throttle = 0.1

[attributes]
title = "lobby"
"##;

    #[test]
    fn parses_sample_config() {
        let config = BackdropConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.appearance.color, [1.0, 128.0 / 255.0, 0.0]);
        assert_eq!(config.appearance.speed, 0.5);
        assert!(!config.appearance.mouse_reactive);
        assert_eq!(config.timing.target_fps, 24.0);
        assert_eq!(config.timing.resize_debounce, Duration::from_millis(250));
        assert_eq!(config.timing.pointer_throttle, Duration::from_millis(100));
        assert_eq!(config.timing.render_scale, 0.5);
        assert_eq!(config.attributes.get("title").map(String::as_str), Some("lobby"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = BackdropConfig::from_toml_str("").expect("parse empty config");
        assert_eq!(config, BackdropConfig::default());
        assert_eq!(config.appearance.amplitude, 0.1);
        assert!(config.appearance.mouse_reactive);
    }

    #[test]
    fn out_of_range_appearance_is_kept() {
        let config = BackdropConfig::from_toml_str(
            r#"
[appearance]
color = [2.0, -1.0, 0.5]
speed = -3.0
"#,
        )
        .expect("parse config");
        assert_eq!(config.appearance.color, [2.0, -1.0, 0.5]);
        assert_eq!(config.appearance.speed, -3.0);
    }

    #[test]
    fn rejects_bad_timing() {
        let err = BackdropConfig::from_toml_str(
            r#"
[timing]
render_scale = 0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = BackdropConfig::from_toml_str(
            r#"
[timing]
target_fps = -5
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = BackdropConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut config = BackdropConfig::default();
        config.timing.resize_debounce = Duration::from_millis(150);
        config.attributes.insert("title".into(), "demo".into());
        let text = config.to_toml_string().expect("serialize");
        assert!(text.contains("resize_debounce = \"150ms\""));
        let parsed = BackdropConfig::from_toml_str(&text).expect("reparse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn parses_color_forms() {
        assert_eq!(parse_color("0.1, 0.2,0.3").unwrap(), [0.1, 0.2, 0.3]);
        assert_eq!(parse_color("#000000").unwrap(), [0.0, 0.0, 0.0]);
        assert_eq!(parse_color("FFFFFF").unwrap(), [1.0, 1.0, 1.0]);
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("1,2").is_err());
    }
}
