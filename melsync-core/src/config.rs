//! Flat key-value pipeline configuration.
//!
//! All numeric parameters of the pipeline live in one `PipelineConfig`,
//! read once at startup from a JSON object, a list of `(key, value)` string
//! pairs, or `MELSYNC_<KEY>` environment variables. Missing keys fall back to
//! the canonical lip-sync settings (16 kHz, 20 ms frames, 80×4 tiles).

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{MelsyncError, Result};
use crate::features::MelParams;

/// Resampler quality preset used by the normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleQuality {
    /// Shorter sinc kernel, roughly twice as fast.
    Normal,
    /// Long sinc kernel with heavy oversampling.
    #[default]
    High,
}

/// Configuration for `Pipeline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Sample rate of normalized audio (Hz). Default: 16000.
    pub target_sample_rate: u32,
    /// Duration of one audio frame in milliseconds. Default: 20.
    pub frame_duration_ms: u32,
    /// Mel bands per tile. Default: 80.
    pub mel_bands: usize,
    /// FFT size. Default: 800.
    pub fft_size: usize,
    /// Analysis window length, at most `fft_size`. Default: 800.
    pub window_length: usize,
    /// STFT hop. `None` means half a frame (160 at the defaults).
    pub hop_length: Option<usize>,
    /// Lower edge of the mel filterbank (Hz). Default: 55.
    pub min_freq: f32,
    /// Upper edge of the mel filterbank (Hz). Default: 7600.
    pub max_freq: f32,
    /// Time steps per tile. Default: 4.
    pub target_time_steps: usize,
    /// Additive floor before the natural log. Default: 1e-8.
    pub log_epsilon: f32,
    /// Featurizer worker threads. `1` runs in the calling thread.
    pub workers: usize,
    pub resample_quality: ResampleQuality,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            frame_duration_ms: 20,
            mel_bands: 80,
            fft_size: 800,
            window_length: 800,
            hop_length: None,
            min_freq: 55.0,
            max_freq: 7_600.0,
            target_time_steps: 4,
            log_epsilon: 1e-8,
            workers: 1,
            resample_quality: ResampleQuality::High,
        }
    }
}

/// Environment variable prefix for overrides, e.g. `MELSYNC_MEL_BANDS=64`.
pub const ENV_PREFIX: &str = "MELSYNC_";

impl PipelineConfig {
    /// Parse a flat JSON object. Missing keys take their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), "pipeline config loaded");
        Ok(config)
    }

    /// Build a config from string key-value pairs (YAML/INI/env style sources).
    ///
    /// Values are interpreted as JSON scalars where possible (`"80"` becomes
    /// a number, `"high"` stays a string).
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let config = Self::default().overlay(pairs)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MELSYNC_<KEY>` environment overrides on top of `self`.
    ///
    /// Only variables naming a config key are used; other `MELSYNC_*`
    /// variables (e.g. `MELSYNC_LOG`) are skipped.
    pub fn apply_env_overrides(self) -> Result<Self> {
        self.apply_overrides_from(std::env::vars())
    }

    fn apply_overrides_from<I>(self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let known = self.keys()?;
        let pairs: Vec<(String, String)> = vars
            .into_iter()
            .filter_map(|(k, v)| {
                let key = k.strip_prefix(ENV_PREFIX)?.to_ascii_lowercase();
                if known.contains(&key) {
                    Some((key, v))
                } else {
                    debug!(var = %k, "ignoring env var that names no config key");
                    None
                }
            })
            .collect();
        if pairs.is_empty() {
            return Ok(self);
        }
        debug!(count = pairs.len(), "applying environment overrides");
        let config = self.overlay(pairs)?;
        config.validate()?;
        Ok(config)
    }

    /// Config key names, as accepted by `from_pairs` and the environment.
    pub fn keys(&self) -> Result<Vec<String>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map.into_iter().map(|(k, _)| k).collect()),
            _ => Ok(Vec::new()),
        }
    }

    fn overlay<I, K, V>(&self, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, raw) in pairs {
            let raw = raw.as_ref().trim();
            let value = serde_json::from_str::<Value>(raw)
                .unwrap_or_else(|_| Value::String(raw.to_string()));
            map.insert(key.as_ref().trim().to_string(), value);
        }
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Samples per audio frame at the target rate (320 at the defaults).
    pub fn frame_length(&self) -> usize {
        (self.target_sample_rate as u64 * self.frame_duration_ms as u64 / 1000) as usize
    }

    pub fn effective_hop_length(&self) -> usize {
        self.hop_length.unwrap_or(self.frame_length() / 2)
    }

    /// Featurizer parameters derived from this config.
    pub fn mel_params(&self) -> MelParams {
        MelParams {
            sample_rate: self.target_sample_rate,
            frame_length: self.frame_length(),
            mel_bands: self.mel_bands,
            fft_size: self.fft_size,
            hop_length: self.effective_hop_length(),
            window_length: self.window_length,
            min_freq: self.min_freq,
            max_freq: self.max_freq,
            target_time_steps: self.target_time_steps,
            log_epsilon: self.log_epsilon,
        }
    }

    /// Reject parameter combinations that can never produce valid tiles.
    pub fn validate(&self) -> Result<()> {
        if self.target_sample_rate == 0 {
            return Err(invalid("target_sample_rate must be > 0"));
        }
        if self.frame_length() == 0 {
            return Err(invalid("frame_duration_ms yields an empty frame"));
        }
        if self.workers == 0 {
            return Err(invalid("workers must be >= 1"));
        }
        self.mel_params().validate()
    }
}

fn invalid(msg: &str) -> MelsyncError {
    MelsyncError::InvalidConfig(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_give_canonical_frame() {
        let c = PipelineConfig::default();
        c.validate().unwrap();
        assert_eq!(c.frame_length(), 320);
        assert_eq!(c.effective_hop_length(), 160);
    }

    #[test]
    fn json_missing_keys_use_defaults() {
        let c = PipelineConfig::from_json_str(r#"{ "mel_bands": 64, "workers": 4 }"#).unwrap();
        assert_eq!(c.mel_bands, 64);
        assert_eq!(c.workers, 4);
        assert_eq!(c.target_sample_rate, 16_000);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = PipelineConfig::from_json_str(r#"{ "mel_band": 64 }"#).unwrap_err();
        assert!(matches!(err, MelsyncError::Json(_)));
    }

    #[test]
    fn pairs_parse_scalars() {
        let c = PipelineConfig::from_pairs([
            ("target_sample_rate", "22050"),
            ("hop_length", "200"),
            ("resample_quality", "normal"),
            ("max_freq", "8000"),
        ])
        .unwrap();
        assert_eq!(c.target_sample_rate, 22_050);
        assert_eq!(c.effective_hop_length(), 200);
        assert_eq!(c.resample_quality, ResampleQuality::Normal);
        assert_eq!(c.max_freq, 8000.0);
    }

    #[test]
    fn max_freq_above_nyquist_rejected() {
        let err = PipelineConfig::from_pairs([("max_freq", "9000")]).unwrap_err();
        assert!(matches!(err, MelsyncError::InvalidConfig(_)));
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_overrides_skip_unrelated_vars() {
        let c = PipelineConfig::default()
            .apply_overrides_from(vars(&[
                ("MELSYNC_LOG", "debug"),
                ("MELSYNC_MEL_BANDS", "64"),
                ("MELSYNC_WORKERS", "2"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();
        assert_eq!(c.mel_bands, 64);
        assert_eq!(c.workers, 2);
    }

    #[test]
    fn env_overrides_with_no_known_keys_leave_config_alone() {
        let c = PipelineConfig::default()
            .apply_overrides_from(vars(&[("MELSYNC_LOG", "trace")]))
            .unwrap();
        assert_eq!(c, PipelineConfig::default());
    }

    #[test]
    fn env_override_values_are_still_validated() {
        let err = PipelineConfig::default()
            .apply_overrides_from(vars(&[("MELSYNC_WORKERS", "0")]))
            .unwrap_err();
        assert!(matches!(err, MelsyncError::InvalidConfig(_)));
    }

    #[test]
    fn keys_cover_every_field() {
        let keys = PipelineConfig::default().keys().unwrap();
        assert!(keys.iter().any(|k| k == "hop_length"));
        assert!(keys.iter().any(|k| k == "resample_quality"));
        assert_eq!(keys.len(), 12);
    }

    #[test]
    fn zero_workers_rejected() {
        let err = PipelineConfig::from_pairs([("workers", "0")]).unwrap_err();
        assert!(matches!(err, MelsyncError::InvalidConfig(_)));
    }
}
