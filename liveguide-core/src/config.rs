use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::Error;

pub fn load<P: AsRef<Path>>(config_path: P) -> Arc<Config> {
    let config_path = config_path.as_ref();
    let config = try_load(config_path).unwrap_or_else(|err| {
        panic!("Failed to load {}: {}", config_path.display(), err);
    });
    config.validate();
    Arc::new(config)
}

fn try_load(config_path: &Path) -> Result<Config, Error> {
    let reader = File::open(config_path)?;
    Ok(serde_yaml::from_reader(reader)?)
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub guide: GuideConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl Config {
    fn validate(&self) {
        self.server.validate();
        self.guide.validate();
        self.layout.validate();
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub base_url: Url,
    pub user_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "ServerConfig::default_timeout")]
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "ServerConfig::default_image_max_width")]
    pub image_max_width: u32,
}

impl ServerConfig {
    fn default_timeout() -> Duration {
        Duration::from_secs(30)
    }

    fn default_image_max_width() -> u32 {
        80
    }

    fn validate(&self) {
        assert!(
            matches!(self.base_url.scheme(), "http" | "https"),
            "config.server: `base-url` must be an http or https URL"
        );
        assert!(
            !self.user_id.is_empty(),
            "config.server: `user-id` must be a non-empty string"
        );
        if let Some(ref token) = self.access_token {
            assert!(
                !token.is_empty(),
                "config.server: `access-token` must be a non-empty string"
            );
        }
        assert!(
            !self.timeout.is_zero(),
            "config.server: `timeout` must be larger than 0"
        );
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct GuideConfig {
    #[serde(default = "GuideConfig::default_past")]
    #[serde(with = "humantime_serde")]
    pub past: Duration,
    #[serde(default = "GuideConfig::default_future")]
    #[serde(with = "humantime_serde")]
    pub future: Duration,
    #[serde(default = "GuideConfig::default_refresh_interval")]
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
}

impl GuideConfig {
    const MAX_OFFSET: Duration = Duration::from_secs(7 * 24 * 60 * 60); // 7d

    fn default_past() -> Duration {
        Duration::from_secs(60 * 60) // 1h
    }

    fn default_future() -> Duration {
        Duration::from_secs(12 * 60 * 60) // 12h
    }

    fn default_refresh_interval() -> Duration {
        Duration::from_secs(5 * 60) // 5m
    }

    fn validate(&self) {
        assert!(
            !self.refresh_interval.is_zero(),
            "config.guide: `refresh-interval` must be larger than 0"
        );
        assert!(
            !(self.past + self.future).is_zero(),
            "config.guide: `past` + `future` must be larger than 0"
        );
        assert!(
            self.past <= Self::MAX_OFFSET,
            "config.guide: `past` must be shorter than or equal to 7d"
        );
        assert!(
            self.future <= Self::MAX_OFFSET,
            "config.guide: `future` must be shorter than or equal to 7d"
        );
    }
}

impl Default for GuideConfig {
    fn default() -> Self {
        GuideConfig {
            past: Self::default_past(),
            future: Self::default_future(),
            refresh_interval: Self::default_refresh_interval(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct LayoutConfig {
    #[serde(default = "LayoutConfig::default_pixels_per_minute")]
    pub pixels_per_minute: f64,
    #[serde(default = "LayoutConfig::default_min_cell_width")]
    pub min_cell_width: f64,
    #[serde(default = "LayoutConfig::default_channel_column_width")]
    pub channel_column_width: f64,
    #[serde(default = "LayoutConfig::default_time_slot_interval")]
    #[serde(with = "humantime_serde")]
    pub time_slot_interval: Duration,
}

impl LayoutConfig {
    fn default_pixels_per_minute() -> f64 {
        3.0
    }

    fn default_min_cell_width() -> f64 {
        150.0
    }

    fn default_channel_column_width() -> f64 {
        200.0
    }

    fn default_time_slot_interval() -> Duration {
        Duration::from_secs(30 * 60) // 30m
    }

    fn validate(&self) {
        assert!(
            self.pixels_per_minute > 0.0,
            "config.layout: `pixels-per-minute` must be larger than 0"
        );
        assert!(
            self.min_cell_width >= 0.0,
            "config.layout: `min-cell-width` must be larger than or equal to 0"
        );
        assert!(
            self.channel_column_width >= 0.0,
            "config.layout: `channel-column-width` must be larger than or equal to 0"
        );
        assert!(
            !self.time_slot_interval.is_zero(),
            "config.layout: `time-slot-interval` must be larger than 0"
        );
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            pixels_per_minute: Self::default_pixels_per_minute(),
            min_cell_width: Self::default_min_cell_width(),
            channel_column_width: Self::default_channel_column_width(),
            time_slot_interval: Self::default_time_slot_interval(),
        }
    }
}

// <coverage:exclude>
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config() {
        assert!(serde_yaml::from_str::<Config>("{}").is_err());

        assert_eq!(
            serde_yaml::from_str::<Config>(
                r#"
                server:
                  base-url: http://localhost:8096
                  user-id: user
            "#
            )
            .unwrap(),
            config!()
        );

        let result = serde_yaml::from_str::<Config>(
            r#"
            server:
              base-url: http://localhost:8096
              user-id: user
            unknown:
              property: value
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validate() {
        config!().validate();
    }

    #[test]
    fn test_load() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  base-url: http://localhost:8096
  user-id: user
guide:
  refresh-interval: 1m
"#
        )
        .unwrap();
        let config = load(file.path());
        assert_eq!(config.guide.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.guide.past, GuideConfig::default_past());
    }

    #[test]
    #[should_panic]
    fn test_load_missing_file() {
        load("/path/to/missing/config.yml");
    }

    #[test]
    fn test_server_config() {
        assert_eq!(
            serde_yaml::from_str::<ServerConfig>(
                r#"
                base-url: https://media.example/jellyfin/
                user-id: user
                access-token: token
                timeout: 5s
                image-max-width: 120
            "#
            )
            .unwrap(),
            ServerConfig {
                base_url: "https://media.example/jellyfin/".parse().unwrap(),
                user_id: "user".to_string(),
                access_token: Some("token".to_string()),
                timeout: Duration::from_secs(5),
                image_max_width: 120,
            }
        );

        assert!(serde_yaml::from_str::<ServerConfig>("user-id: user").is_err());
        assert!(
            serde_yaml::from_str::<ServerConfig>(
                r#"
                base-url: not a url
                user-id: user
            "#
            )
            .is_err()
        );
    }

    #[test]
    #[should_panic]
    fn test_server_config_validate_scheme() {
        let mut config = config!().server;
        config.base_url = "ftp://localhost/".parse().unwrap();
        config.validate();
    }

    #[test]
    #[should_panic]
    fn test_server_config_validate_user_id() {
        let mut config = config!().server;
        config.user_id = "".to_string();
        config.validate();
    }

    #[test]
    #[should_panic]
    fn test_server_config_validate_access_token() {
        let mut config = config!().server;
        config.access_token = Some("".to_string());
        config.validate();
    }

    #[test]
    fn test_guide_config() {
        assert_eq!(
            serde_yaml::from_str::<GuideConfig>("{}").unwrap(),
            GuideConfig::default()
        );

        assert_eq!(
            serde_yaml::from_str::<GuideConfig>(
                r#"
                past: 30m
                future: 1day
                refresh-interval: 10m
            "#
            )
            .unwrap(),
            GuideConfig {
                past: Duration::from_secs(30 * 60),
                future: Duration::from_secs(24 * 60 * 60),
                refresh_interval: Duration::from_secs(10 * 60),
            }
        );

        let result = serde_yaml::from_str::<GuideConfig>(
            r#"
            unknown:
              property: value
        "#,
        );
        assert!(result.is_err());
    }

    #[test]
    #[should_panic]
    fn test_guide_config_validate_refresh_interval() {
        let mut config = GuideConfig::default();
        config.refresh_interval = Duration::ZERO;
        config.validate();
    }

    #[test]
    #[should_panic]
    fn test_guide_config_validate_empty_window() {
        let mut config = GuideConfig::default();
        config.past = Duration::ZERO;
        config.future = Duration::ZERO;
        config.validate();
    }

    #[test]
    #[should_panic]
    fn test_guide_config_validate_too_long_future() {
        let mut config = GuideConfig::default();
        config.future = Duration::from_secs(8 * 24 * 60 * 60);
        config.validate();
    }

    #[test]
    fn test_layout_config() {
        assert_eq!(
            serde_yaml::from_str::<LayoutConfig>("{}").unwrap(),
            LayoutConfig::default()
        );

        assert_eq!(
            serde_yaml::from_str::<LayoutConfig>(
                r#"
                pixels-per-minute: 4.5
                min-cell-width: 100
                channel-column-width: 0
                time-slot-interval: 15m
            "#
            )
            .unwrap(),
            LayoutConfig {
                pixels_per_minute: 4.5,
                min_cell_width: 100.0,
                channel_column_width: 0.0,
                time_slot_interval: Duration::from_secs(15 * 60),
            }
        );
    }

    #[test]
    fn test_layout_config_validate() {
        LayoutConfig::default().validate();
    }

    #[test]
    #[should_panic]
    fn test_layout_config_validate_pixels_per_minute() {
        let mut config = LayoutConfig::default();
        config.pixels_per_minute = 0.0;
        config.validate();
    }

    #[test]
    #[should_panic]
    fn test_layout_config_validate_time_slot_interval() {
        let mut config = LayoutConfig::default();
        config.time_slot_interval = Duration::ZERO;
        config.validate();
    }
}
// </coverage:exclude>
