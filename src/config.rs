//! Fixture configuration file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dut::DEFAULT_HOST;
use crate::error::DutError;
use crate::library::DEFAULT_LIBRARY;
use crate::sequence::DemuraPlan;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to DemuraDLL
    #[serde(default = "default_library")]
    pub library: PathBuf,

    /// Fixture address (192.168.21.x)
    #[serde(default = "default_host")]
    pub host: String,

    /// Use the emulator built into the library
    #[serde(default)]
    pub emulator: bool,

    #[serde(default)]
    pub demura: DemuraConfig,
}

/// Defaults for Demura writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemuraConfig {
    #[serde(default = "default_demura_mode")]
    pub mode: u8,

    #[serde(default)]
    pub otp: bool,

    #[serde(default = "default_grey")]
    pub grey: u8,

    /// Seconds each check colour stays on screen
    #[serde(default = "default_hold")]
    pub hold: u64,

    #[serde(default = "default_verify")]
    pub verify: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: default_library(),
            host: default_host(),
            emulator: false,
            demura: DemuraConfig::default(),
        }
    }
}

impl Default for DemuraConfig {
    fn default() -> Self {
        Self {
            mode: default_demura_mode(),
            otp: false,
            grey: default_grey(),
            hold: default_hold(),
            verify: default_verify(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, DutError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DutError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Config::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Config, DutError> {
        Ok(toml::from_str(content)?)
    }
}

impl DemuraConfig {
    pub fn plan<P: Into<PathBuf>>(&self, file: P, crc: u16) -> DemuraPlan {
        DemuraPlan {
            mode: self.mode,
            otp: self.otp,
            grey: self.grey,
            hold: Duration::from_secs(self.hold),
            verify: self.verify,
            ..DemuraPlan::new(file, crc)
        }
    }
}

fn default_library() -> PathBuf {
    PathBuf::from(DEFAULT_LIBRARY)
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_demura_mode() -> u8 {
    2
}

fn default_grey() -> u8 {
    127
}

fn default_hold() -> u64 {
    5
}

fn default_verify() -> bool {
    true
}

#[test]
fn test_empty_config() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.library, PathBuf::from("DemuraDLL.dll"));
    assert_eq!(config.host, "192.168.21.132");
    assert!(!config.emulator);
    assert_eq!(config.demura.mode, 2);
    assert_eq!(config.demura.hold, 5);
    assert!(config.demura.verify);
}

#[test]
fn test_partial_config() {
    let config = Config::parse(
        r#"
        host = "192.168.21.134"
        emulator = true

        [demura]
        otp = true
        grey = 64
        "#,
    )
    .unwrap();
    assert_eq!(config.host, "192.168.21.134");
    assert!(config.emulator);
    assert_eq!(config.library, PathBuf::from("DemuraDLL.dll"));

    let plan = config.demura.plan("lut.bin", 0x4bde);
    assert_eq!(plan.crc, 0x4bde);
    assert_eq!(plan.mode, 2);
    assert!(plan.otp);
    assert_eq!(plan.grey, 64);
    assert_eq!(plan.hold, Duration::from_secs(5));
}

#[test]
fn test_bad_config() {
    match Config::parse("emulator = \"yes\"") {
        Err(DutError::Config { .. }) => {}
        _ => panic!("expected a config error"),
    }
    match Config::load("/nonexistent/demura.toml") {
        Err(DutError::ConfigRead { path, .. }) => assert_eq!(path, "/nonexistent/demura.toml"),
        _ => panic!("expected a read error"),
    }
}
