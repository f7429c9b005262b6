use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// DSC mode the panel is powered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DscMode {
    Dsc10P = 0,
    Dsc100P = 1,
}

impl Default for DscMode {
    fn default() -> DscMode {
        DscMode::Dsc10P
    }
}

impl DscMode {
    pub fn from_index(index: u8) -> Option<DscMode> {
        match index {
            0 => Some(DscMode::Dsc10P),
            1 => Some(DscMode::Dsc100P),
            _ => None,
        }
    }
}

/// Image stored on the fixture eMMC, picked by position or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmmcImage {
    Index(u32),
    Name(String),
}

impl From<u32> for EmmcImage {
    fn from(index: u32) -> EmmcImage {
        EmmcImage::Index(index)
    }
}

impl From<&str> for EmmcImage {
    fn from(name: &str) -> EmmcImage {
        EmmcImage::Name(name.to_string())
    }
}

impl From<String> for EmmcImage {
    fn from(name: String) -> EmmcImage {
        EmmcImage::Name(name)
    }
}

impl fmt::Display for EmmcImage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EmmcImage::Index(index) => write!(f, "{}", index),
            EmmcImage::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Transform applied to pictures while they are flashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None = 0,
    Rotate180 = 1,
    MirrorX = 2,
    MirrorY = 3,
    MirrorXY = 4,
}

/// Where the picture sits when padded out to the tailor size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tailor {
    None = 0,
    Right = 1,
    Middle = 2,
    Left = 3,
}

/// Pictures to burn into the fixture eMMC and how to convert them.
#[derive(Debug, Clone)]
pub struct ImageWrite {
    pub files: Vec<PathBuf>,
    /// Swap the default BGR channel order to RGB.
    pub to_rgb: bool,
    pub rotation: Rotation,
    pub tailor: Tailor,
    /// Ignored when `tailor` is `Tailor::None`.
    pub tailor_width: u32,
    pub tailor_height: u32,
    pub timeout: Duration,
}

impl ImageWrite {
    pub fn new<I, P>(files: I) -> ImageWrite
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        ImageWrite {
            files: files.into_iter().map(Into::into).collect(),
            to_rgb: false,
            rotation: Rotation::None,
            tailor: Tailor::None,
            tailor_width: 0,
            tailor_height: 0,
            timeout: Duration::from_millis(6000),
        }
    }

    pub fn rotation(mut self, rotation: Rotation) -> ImageWrite {
        self.rotation = rotation;
        self
    }

    pub fn to_rgb(mut self, to_rgb: bool) -> ImageWrite {
        self.to_rgb = to_rgb;
        self
    }

    pub fn tailor(mut self, tailor: Tailor, width: u32, height: u32) -> ImageWrite {
        self.tailor = tailor;
        self.tailor_width = width;
        self.tailor_height = height;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> ImageWrite {
        self.timeout = timeout;
        self
    }
}

#[test]
fn test_image_write_defaults() {
    let write = ImageWrite::new(vec!["b255.bmp", "g255.bmp"]);
    assert_eq!(write.files.len(), 2);
    assert_eq!(write.rotation, Rotation::None);
    assert_eq!(write.tailor, Tailor::None);
    assert_eq!(write.timeout, Duration::from_millis(6000));
    assert!(!write.to_rgb);
}

#[test]
fn test_emmc_image_display() {
    assert_eq!(EmmcImage::from(3).to_string(), "3");
    assert_eq!(EmmcImage::from("w255").to_string(), "w255");
}

#[test]
fn test_dsc_mode_from_index() {
    assert_eq!(DscMode::from_index(0), Some(DscMode::Dsc10P));
    assert_eq!(DscMode::from_index(1), Some(DscMode::Dsc100P));
    assert_eq!(DscMode::from_index(2), None);
}
