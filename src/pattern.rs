use image::{ImageError, Rgb, RgbImage};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::error::DutError;

/// Native resolution of the panels on the fixture.
pub const PANEL_WIDTH: u32 = 2160;
pub const PANEL_HEIGHT: u32 = 2312;

/// Full-screen colour written out as `<name>.bmp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolidColor {
    pub name: String,
    pub rgb: [u8; 3],
}

impl SolidColor {
    pub fn new(name: &str, rgb: [u8; 3]) -> SolidColor {
        SolidColor {
            name: name.to_string(),
            rgb,
        }
    }

    /// Red, green, blue and white at full level.
    pub fn primaries() -> Vec<SolidColor> {
        vec![
            SolidColor::new("r255", [255, 0, 0]),
            SolidColor::new("g255", [0, 255, 0]),
            SolidColor::new("b255", [0, 0, 255]),
            SolidColor::new("w255", [255, 255, 255]),
        ]
    }
}

// name=r,g,b
impl FromStr for SolidColor {
    type Err = DutError;

    fn from_str(spec: &str) -> Result<SolidColor, DutError> {
        let invalid = || DutError::Color {
            spec: spec.to_string(),
        };
        let mut parts = spec.splitn(2, '=');
        let name = parts.next().map(str::trim).unwrap_or("");
        let levels = parts.next().ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }

        let levels = levels
            .split(',')
            .map(|level| level.trim().parse::<u8>())
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| invalid())?;
        match levels.as_slice() {
            [r, g, b] => Ok(SolidColor::new(name, [*r, *g, *b])),
            _ => Err(invalid()),
        }
    }
}

/// Writes one BMP per colour into `dir` and returns their paths, in the
/// order of `colors`. Ready to be passed to `Dut::write_image_to_emmc`.
pub fn write_solid_patterns(
    dir: &Path,
    width: u32,
    height: u32,
    colors: &[SolidColor],
) -> Result<Vec<PathBuf>, DutError> {
    fs::create_dir_all(dir).map_err(ImageError::from)?;

    colors
        .par_iter()
        .map(|color| -> Result<PathBuf, DutError> {
            let path = dir.join(format!("{}.bmp", color.name));
            let image = RgbImage::from_pixel(width, height, Rgb(color.rgb));
            image.save(&path)?;
            debug!("wrote {} ({}x{})", path.display(), width, height);
            Ok(path)
        })
        .collect()
}

#[test]
fn test_parse_solid_color() {
    let color: SolidColor = "grey127 = 127, 127,127".parse().unwrap();
    assert_eq!(color, SolidColor::new("grey127", [127, 127, 127]));

    for bad in ["b255", "=0,0,255", "b255=0,0", "b255=0,0,256", "b255=0,0,255,1"].iter() {
        match bad.parse::<SolidColor>() {
            Err(DutError::Color { spec }) => assert_eq!(&spec, bad),
            _ => panic!("{} should not parse", bad),
        }
    }
}

#[test]
fn test_write_solid_patterns() {
    let dir = std::env::temp_dir().join(format!("demura-patterns-{}", std::process::id()));
    let colors = vec![
        SolidColor::new("b255", [0, 0, 255]),
        SolidColor::new("g255", [0, 255, 0]),
    ];

    let paths = write_solid_patterns(&dir, 16, 8, &colors).unwrap();
    assert_eq!(paths, vec![dir.join("b255.bmp"), dir.join("g255.bmp")]);

    let blue = image::open(&paths[0]).unwrap().to_rgb8();
    assert_eq!(blue.dimensions(), (16, 8));
    assert_eq!(blue.get_pixel(0, 0).0, [0, 0, 255]);
    assert_eq!(blue.get_pixel(15, 7).0, [0, 0, 255]);

    let green = image::open(&paths[1]).unwrap().to_rgb8();
    assert_eq!(green.get_pixel(3, 4).0, [0, 255, 0]);

    fs::remove_dir_all(&dir).unwrap();
}
