use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ScopeError};
use crate::generator::{
    DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE, GeneratorConfig, Waveform, WaveformGenerator,
};
use crate::queue::{OverflowPolicy, SampleQueue};

pub const DEFAULT_RING_CAPACITY: usize = 2048;

#[derive(Clone, Debug, PartialEq)]
pub struct ScopeSettings {
    pub sample_rate: u32,
    pub block_size: usize,
    pub ring_capacity: usize,
    /// `None` keeps the queue unbounded.
    pub queue_capacity: Option<usize>,
    pub overflow: OverflowPolicy,
    pub frequency: f32,
    pub amplitude: f32,
    pub waveform: Waveform,
    pub frame_interval_ms: u64,
    pub diagnostics: bool,
}

impl Default for ScopeSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            ring_capacity: DEFAULT_RING_CAPACITY,
            queue_capacity: Some(DEFAULT_SAMPLE_RATE as usize),
            overflow: OverflowPolicy::DropOldest,
            frequency: 100.0,
            amplitude: 0.5,
            waveform: Waveform::Sine,
            frame_interval_ms: 33,
            diagnostics: false,
        }
    }
}

impl ScopeSettings {
    /// Reads `key=value` lines from `path`. A missing file or a malformed
    /// value leaves the corresponding default in place.
    pub fn load(path: &Path) -> Self {
        let mut settings = ScopeSettings::default();
        match fs::read_to_string(path) {
            Ok(raw) => {
                settings.apply_str(&raw);
                log::info!("loaded settings from {}", path.display());
            }
            Err(err) => log::debug!("no settings at {}: {err}", path.display()),
        }
        settings
    }

    pub fn parse(raw: &str) -> Self {
        let mut settings = ScopeSettings::default();
        settings.apply_str(raw);
        settings
    }

    fn apply_str(&mut self, raw: &str) {
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                apply_kv(key.trim(), value.trim(), self);
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| ScopeError::Settings(format!("{}: {err}", parent.display())))?;
        }
        fs::write(path, self.to_string_lines())
            .map_err(|err| ScopeError::Settings(format!("{}: {err}", path.display())))
    }

    pub fn to_string_lines(&self) -> String {
        let mut buf = String::new();
        buf.push_str(&format!("sample_rate={}\n", self.sample_rate));
        buf.push_str(&format!("block_size={}\n", self.block_size));
        buf.push_str(&format!("ring_capacity={}\n", self.ring_capacity));
        buf.push_str(&format!(
            "queue_capacity={}\n",
            self.queue_capacity.unwrap_or(0)
        ));
        buf.push_str(&format!("overflow={}\n", self.overflow.as_key()));
        buf.push_str(&format!("frequency={}\n", self.frequency));
        buf.push_str(&format!("amplitude={}\n", self.amplitude));
        buf.push_str(&format!("waveform={}\n", self.waveform.as_key()));
        buf.push_str(&format!("frame_interval_ms={}\n", self.frame_interval_ms));
        buf.push_str(&format!("diagnostics={}\n", self.diagnostics));
        buf
    }

    pub fn generator_config(&self) -> Result<GeneratorConfig> {
        let config = GeneratorConfig {
            sample_rate: self.sample_rate,
            block_size: self.block_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn build_queue(&self) -> Result<SampleQueue> {
        SampleQueue::new(self.queue_capacity, self.overflow)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Pushes the signal settings into `generator`.
    ///
    /// A rejected frequency or amplitude falls back to its default. Afterwards
    /// both fields hold what the generator actually uses.
    pub fn apply_to(&mut self, generator: &WaveformGenerator) {
        let defaults = Self::default();
        if let Err(err) = generator.set_frequency(self.frequency) {
            log::warn!("{err}, using {} Hz", defaults.frequency);
            let _ = generator.set_frequency(defaults.frequency);
        }
        if let Err(err) = generator.set_amplitude(self.amplitude) {
            log::warn!("{err}, using {}", defaults.amplitude);
            let _ = generator.set_amplitude(defaults.amplitude);
        }
        generator.set_waveform(self.waveform);

        self.frequency = generator.frequency();
        self.amplitude = generator.amplitude();
    }
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join("wavescope.cfg")
}

fn apply_kv(key: &str, value: &str, settings: &mut ScopeSettings) {
    match key {
        "sample_rate" => parse_into(value, &mut settings.sample_rate),
        "block_size" => parse_into(value, &mut settings.block_size),
        "ring_capacity" => parse_into(value, &mut settings.ring_capacity),
        "queue_capacity" => {
            if let Ok(capacity) = value.parse::<usize>() {
                settings.queue_capacity = (capacity > 0).then_some(capacity);
            }
        }
        "overflow" => {
            if let Some(policy) = OverflowPolicy::from_key(value) {
                settings.overflow = policy;
            }
        }
        "frequency" => parse_into(value, &mut settings.frequency),
        "amplitude" => parse_into(value, &mut settings.amplitude),
        "waveform" => {
            if let Some(waveform) = Waveform::from_key(value) {
                settings.waveform = waveform;
            }
        }
        "frame_interval_ms" => parse_into(value, &mut settings.frame_interval_ms),
        "diagnostics" => parse_into(value, &mut settings.diagnostics),
        _ => log::debug!("ignoring unknown settings key '{key}'"),
    }
}

fn parse_into<T: std::str::FromStr>(value: &str, target: &mut T) {
    match value.parse::<T>() {
        Ok(v) => *target = v,
        Err(_) => log::warn!("ignoring malformed settings value '{value}'"),
    }
}

fn config_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(roaming) = std::env::var("APPDATA") {
            return PathBuf::from(roaming).join("Wavescope");
        }
        if let Ok(local) = std::env::var("LOCALAPPDATA") {
            return PathBuf::from(local).join("Wavescope");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = home_dir() {
            return home
                .join("Library")
                .join("Application Support")
                .join("Wavescope");
        }
    }

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("wavescope");
    }

    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("wavescope")
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from).or_else(|| {
        #[cfg(target_os = "windows")]
        {
            std::env::var("USERPROFILE").ok().map(PathBuf::from)
        }
        #[cfg(not(target_os = "windows"))]
        {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn parses_known_keys_and_skips_the_rest() {
        let settings = ScopeSettings::parse(
            "# scope\n\
             sample_rate=44100\n\
             block_size = 512\n\
             queue_capacity=0\n\
             overflow=block\n\
             waveform=square\n\
             amplitude=0.25\n\
             diagnostics=true\n\
             colour=green\n",
        );
        assert_eq!(settings.sample_rate, 44_100);
        assert_eq!(settings.block_size, 512);
        assert_eq!(settings.queue_capacity, None);
        assert_eq!(settings.overflow, OverflowPolicy::Block);
        assert_eq!(settings.waveform, Waveform::Square);
        assert_eq!(settings.amplitude, 0.25);
        assert!(settings.diagnostics);
        assert_eq!(settings.ring_capacity, DEFAULT_RING_CAPACITY);
    }

    #[test]
    fn malformed_values_keep_defaults() {
        let settings = ScopeSettings::parse("sample_rate=fast\nwaveform=noise\nfrequency=\n");
        let defaults = ScopeSettings::default();
        assert_eq!(settings.sample_rate, defaults.sample_rate);
        assert_eq!(settings.waveform, defaults.waveform);
        assert_eq!(settings.frequency, defaults.frequency);
    }

    #[test]
    fn serialized_settings_parse_back() {
        let settings = ScopeSettings {
            queue_capacity: None,
            overflow: OverflowPolicy::DropNewest,
            waveform: Waveform::SawUp,
            frequency: 330.5,
            ..ScopeSettings::default()
        };
        assert_eq!(ScopeSettings::parse(&settings.to_string_lines()), settings);
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("wavescope-settings-{}", std::process::id()));
        let path = dir.join("nested").join("wavescope.cfg");
        let settings = ScopeSettings {
            diagnostics: true,
            ..ScopeSettings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(ScopeSettings::load(&path), settings);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn generator_config_is_validated() {
        let settings = ScopeSettings {
            block_size: 0,
            ..ScopeSettings::default()
        };
        assert!(settings.generator_config().is_err());
        assert!(ScopeSettings::default().generator_config().is_ok());
    }

    #[test]
    fn rejected_signal_values_fall_back_and_stay_in_sync() {
        let mut settings = ScopeSettings {
            frequency: 1.0e6,
            amplitude: 3.0,
            waveform: Waveform::Triangle,
            ..ScopeSettings::default()
        };
        let queue = Arc::new(settings.build_queue().unwrap());
        let generator =
            WaveformGenerator::new(settings.generator_config().unwrap(), queue).unwrap();
        settings.apply_to(&generator);

        let defaults = ScopeSettings::default();
        assert_eq!(settings.frequency, defaults.frequency);
        assert_eq!(settings.amplitude, defaults.amplitude);
        assert_eq!(generator.frequency(), settings.frequency);
        assert_eq!(generator.amplitude(), settings.amplitude);
        assert_eq!(generator.waveform(), Waveform::Triangle);
    }

    #[test]
    fn accepted_signal_values_reach_the_generator() {
        let mut settings = ScopeSettings {
            frequency: 880.0,
            amplitude: 0.9,
            ..ScopeSettings::default()
        };
        let queue = Arc::new(settings.build_queue().unwrap());
        let generator =
            WaveformGenerator::new(settings.generator_config().unwrap(), queue).unwrap();
        settings.apply_to(&generator);
        assert_eq!(generator.frequency(), 880.0);
        assert_eq!(generator.amplitude(), 0.9);
        assert_eq!(settings.frequency, 880.0);
    }

    #[test]
    fn queue_follows_the_capacity_setting() {
        let queue = ScopeSettings::default().build_queue().unwrap();
        assert_eq!(queue.capacity(), Some(DEFAULT_SAMPLE_RATE as usize));
        assert_eq!(queue.policy(), Some(OverflowPolicy::DropOldest));

        let unbounded = ScopeSettings {
            queue_capacity: None,
            ..ScopeSettings::default()
        };
        assert_eq!(unbounded.build_queue().unwrap().capacity(), None);
    }
}
