// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Application configuration.
//!
//! This module manages the application configuration file. Values stored
//! there are defaults; anything given on the command line wins.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{client::Quality, tasks::DownloadSettings};

const CONFIG_NAME: &str = "chooget";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub version: u32,
    /// Number of concurrent track downloads.
    pub workers: usize,
    pub history_file: PathBuf,
    pub download_dir: PathBuf,
    /// Maximum number of artists to resolve per run.
    pub artist_limit: Option<usize>,
    pub quality: Quality,
    pub unit_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub skip_completed_artists: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            workers: 8,
            history_file: PathBuf::from("history.json"),
            download_dir: PathBuf::from("music"),
            artist_limit: None,
            quality: Quality::default(),
            unit_timeout_secs: 600,
            request_timeout_secs: 60,
            skip_completed_artists: false,
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub(crate) fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            download_dir: self.download_dir.clone(),
            workers: self.workers.max(1),
            quality: self.quality,
            unit_timeout: Duration::from_secs(self.unit_timeout_secs),
            artist_limit: self.artist_limit,
            skip_completed_artists: self.skip_completed_artists,
        }
    }
}

pub fn load_config() -> AppConfig {
    match confy::load(CONFIG_NAME, None) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load configuration, using defaults: {}", e);
            AppConfig::default()
        }
    }
}

pub fn save_config(cfg: &AppConfig) -> Result<(), confy::ConfyError> {
    confy::store(CONFIG_NAME, None, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_configuration() {
        let config = AppConfig {
            workers: 3,
            artist_limit: Some(10),
            unit_timeout_secs: 5,
            ..Default::default()
        };

        let settings = config.download_settings();
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.artist_limit, Some(10));
        assert_eq!(settings.unit_timeout, Duration::from_secs(5));
        assert_eq!(settings.download_dir, PathBuf::from("music"));
    }

    #[test]
    fn worker_count_is_at_least_one() {
        let config = AppConfig {
            workers: 0,
            ..Default::default()
        };
        assert_eq!(config.download_settings().workers, 1);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "workers": 2, "quality": "mp3-320" }"#).unwrap();

        assert_eq!(config.workers, 2);
        assert_eq!(config.quality, Quality::Mp3_320);
        assert_eq!(config.history_file, PathBuf::from("history.json"));
    }
}
