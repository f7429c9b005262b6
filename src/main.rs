extern crate clap;

use clap::{App, AppSettings, ArgMatches, SubCommand};
use std::error::Error;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use demura_dut::pattern::{self, SolidColor};
use demura_dut::{errcode, Config, DscMode, Dut, EmmcImage, ImageWrite, Rotation, Tailor};

fn main() {
    let matches = App::new("demura")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Drives Demura display-panel test fixtures through DemuraDLL")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .args_from_usage(
            "-c, --config=[FILE] 'TOML configuration file'
             -l, --library=[PATH] 'path to DemuraDLL'
             -H, --host=[HOST] 'fixture address, 192.168.21.x'
             -e, --emulator 'run the library emulator instead of a fixture'
             -v, --verbose 'debug logging'
             --log-file=[FILE] 'append logs to FILE'",
        )
        .subcommand(SubCommand::with_name("info").about("print firmware and DLL versions"))
        .subcommand(SubCommand::with_name("images").about("list images stored on the eMMC"))
        .subcommand(
            SubCommand::with_name("show")
                .about("show an eMMC image by index or name")
                .args_from_usage("<IMAGE> 'image index or name'"),
        )
        .subcommand(
            SubCommand::with_name("rgb")
                .about("power the panel and fill it with one colour")
                .args_from_usage(
                    "<R> 'red level'
                     <G> 'green level'
                     <B> 'blue level'
                     -m, --mode=[MODE] 'DSC mode, 0 = 10P, 1 = 100P'",
                ),
        )
        .subcommand(
            SubCommand::with_name("power")
                .about("switch the panel on or off")
                .args_from_usage(
                    "<STATE> 'on or off'
                     -m, --mode=[MODE] 'DSC mode, 0 = 10P, 1 = 100P'",
                ),
        )
        .subcommand(
            SubCommand::with_name("set-ip")
                .about("move the fixture to 192.168.21.ADDR")
                .args_from_usage("<ADDR> 'last address byte, not 1 or 255'"),
        )
        .subcommand(
            SubCommand::with_name("write-demura")
                .about("write Demura compensation data to the panel")
                .args_from_usage(
                    "<FILE> 'Demura data file'
                     --crc=<CRC> 'CRC16 of the data, hex'
                     -m, --mode=[MODE] 'Demura mode, 0, 1 or 2'
                     --otp 'burn the data into OTP'
                     --no-verify 'skip the power cycle check'",
                ),
        )
        .subcommand(
            SubCommand::with_name("read-demura")
                .about("read the Demura data back into a file")
                .args_from_usage("<FILE> 'output file'"),
        )
        .subcommand(
            SubCommand::with_name("flash")
                .about("burn pictures into the eMMC")
                .args_from_usage(
                    "<FILES>... 'pictures to burn'
                     --rgb 'convert BGR pictures to RGB'
                     -r, --rotate=[ROTATION] '1 = 180, 2 = mirror X, 3 = mirror Y, 4 = both'
                     --tailor=[TAILOR] '1 = right, 2 = middle, 3 = left'
                     --tailor-size=[SIZE] 'WxH size the pictures are padded to'
                     -t, --timeout=[MS] 'timeout in milliseconds'",
                ),
        )
        .subcommand(
            SubCommand::with_name("patterns")
                .about("generate solid colour pictures")
                .args_from_usage(
                    "<DIR> 'output directory'
                     -s, --size=[SIZE] 'WxH picture size, defaults to the panel size'
                     --color=[COLOR]... 'name=r,g,b colours, defaults to r255 g255 b255 w255'",
                ),
        )
        .get_matches();

    if let Err(e) = init_logging(&matches) {
        eprintln!("could not set up logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = run(&matches) {
        eprintln!("Fail to run all seq. {}", e);
        process::exit(1);
    }
}

fn init_logging(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let level = if matches.is_present("verbose") {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match matches.value_of("log-file") {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

fn load_config(matches: &ArgMatches) -> Result<Config, Box<dyn Error>> {
    let mut config = match matches.value_of("config") {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(library) = matches.value_of("library") {
        config.library = PathBuf::from(library);
    }
    if let Some(host) = matches.value_of("host") {
        config.host = host.to_string();
    }
    if matches.is_present("emulator") {
        config.emulator = true;
    }
    Ok(config)
}

fn run(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let config = load_config(matches)?;

    // patterns never talks to the fixture
    if let ("patterns", Some(sub)) = matches.subcommand() {
        return patterns(sub);
    }

    let mut dut = Dut::load(&config.library)?;
    dut.enable_emulator(config.emulator);
    dut.open_device(&config.host)?;

    match matches.subcommand() {
        ("info", _) => {
            println!("FW version:  {}", dut.read_version()?);
            println!("DLL version: {}", dut.read_dll_version()?);
            let code = dut.get_error_code();
            println!(
                "last error:  {} ({})",
                code,
                errcode::description(&code).unwrap_or("unknown")
            );
        }
        ("images", _) => {
            for (index, name) in dut.get_emmc_image_name()?.iter().enumerate() {
                println!("{:3}  {}", index, name);
            }
        }
        ("show", Some(sub)) => {
            let image = sub.value_of("IMAGE").unwrap_or_default();
            let image = match image.parse::<u32>() {
                Ok(index) => EmmcImage::Index(index),
                Err(_) => EmmcImage::from(image),
            };
            dut.power_on(DscMode::Dsc10P)?;
            dut.show_emmc_image(image)?;
        }
        ("rgb", Some(sub)) => {
            dut.power_on(dsc_mode(sub)?)?;
            dut.set_rgb(
                number(sub, "R")?,
                number(sub, "G")?,
                number(sub, "B")?,
            )?;
        }
        ("power", Some(sub)) => match sub.value_of("STATE") {
            Some("on") => dut.power_on(dsc_mode(sub)?)?,
            Some("off") => dut.power_off()?,
            other => return Err(format!("unknown power state {:?}", other).into()),
        },
        ("set-ip", Some(sub)) => {
            dut.set_device_ip_address(number(sub, "ADDR")?)?;
            dut.close_device();
            info!(
                "fixture restarts on {}, reconnect once it is back",
                dut.current_host().unwrap_or_default()
            );
        }
        ("write-demura", Some(sub)) => {
            let crc = parse_crc(sub.value_of("crc").unwrap_or_default())?;
            let mut plan = config
                .demura
                .plan(sub.value_of("FILE").unwrap_or_default(), crc);
            if sub.is_present("mode") {
                plan.mode = number(sub, "mode")?;
            }
            plan.otp |= sub.is_present("otp");
            plan.verify &= !sub.is_present("no-verify");
            demura_dut::write_demura(&mut dut, &plan)?;
        }
        ("read-demura", Some(sub)) => {
            dut.demura_read(sub.value_of("FILE").unwrap_or_default())?;
        }
        ("flash", Some(sub)) => {
            let files: Vec<&str> = sub.values_of("FILES").map(|v| v.collect()).unwrap_or_default();
            let mut write = ImageWrite::new(files).to_rgb(sub.is_present("rgb"));
            if sub.is_present("rotate") {
                write = write.rotation(rotation(number(sub, "rotate")?)?);
            }
            if sub.is_present("tailor") {
                let (width, height) = size(sub.value_of("tailor-size").unwrap_or("0x0"))?;
                write = write.tailor(tailor(number(sub, "tailor")?)?, width, height);
            }
            if sub.is_present("timeout") {
                write = write.timeout(Duration::from_millis(number(sub, "timeout")?));
            }
            dut.write_image_to_emmc(&write)?;
            for name in dut.get_emmc_image_name()? {
                println!("{}", name);
            }
        }
        _ => {}
    }
    Ok(())
}

fn patterns(sub: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let (width, height) = match sub.value_of("size") {
        Some(spec) => size(spec)?,
        None => (pattern::PANEL_WIDTH, pattern::PANEL_HEIGHT),
    };
    let colors = match sub.values_of("color") {
        Some(specs) => specs
            .map(|spec| spec.parse::<SolidColor>())
            .collect::<Result<Vec<_>, _>>()?,
        None => SolidColor::primaries(),
    };
    let dir = Path::new(sub.value_of("DIR").unwrap_or("."));
    for path in pattern::write_solid_patterns(dir, width, height, &colors)? {
        println!("{}", path.display());
    }
    Ok(())
}

fn number<T>(matches: &ArgMatches, name: &str) -> Result<T, Box<dyn Error>>
where
    T: std::str::FromStr,
    T::Err: Error + 'static,
{
    let value = matches.value_of(name).unwrap_or_default();
    value
        .parse::<T>()
        .map_err(|e| format!("invalid {} '{}': {}", name, value, e).into())
}

fn dsc_mode(matches: &ArgMatches) -> Result<DscMode, Box<dyn Error>> {
    if !matches.is_present("mode") {
        return Ok(DscMode::default());
    }
    let index: u8 = number(matches, "mode")?;
    DscMode::from_index(index).ok_or_else(|| format!("unknown DSC mode {}", index).into())
}

fn rotation(index: u8) -> Result<Rotation, Box<dyn Error>> {
    match index {
        0 => Ok(Rotation::None),
        1 => Ok(Rotation::Rotate180),
        2 => Ok(Rotation::MirrorX),
        3 => Ok(Rotation::MirrorY),
        4 => Ok(Rotation::MirrorXY),
        _ => Err(format!("unknown rotation {}", index).into()),
    }
}

fn tailor(index: u8) -> Result<Tailor, Box<dyn Error>> {
    match index {
        0 => Ok(Tailor::None),
        1 => Ok(Tailor::Right),
        2 => Ok(Tailor::Middle),
        3 => Ok(Tailor::Left),
        _ => Err(format!("unknown tailor position {}", index).into()),
    }
}

// hex, with or without a 0x / 0X prefix
fn parse_crc(text: &str) -> Result<u16, Box<dyn Error>> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid crc '{}': {}", text, e).into())
}

fn size(spec: &str) -> Result<(u32, u32), Box<dyn Error>> {
    let mut parts = spec.splitn(2, |c| c == 'x' || c == 'X');
    match (parts.next(), parts.next()) {
        (Some(width), Some(height)) => Ok((width.trim().parse()?, height.trim().parse()?)),
        _ => Err(format!("invalid size '{}', expected WxH", spec).into()),
    }
}

#[test]
fn test_size() {
    assert_eq!(size("2160x2312").unwrap(), (2160, 2312));
    assert_eq!(size("16X8").unwrap(), (16, 8));
    assert!(size("2160").is_err());
    assert!(size("axb").is_err());
}

#[test]
fn test_rotation_and_tailor() {
    assert_eq!(rotation(4).unwrap(), Rotation::MirrorXY);
    assert!(rotation(5).is_err());
    assert_eq!(tailor(2).unwrap(), Tailor::Middle);
    assert!(tailor(4).is_err());
}

#[test]
fn test_parse_crc() {
    assert_eq!(parse_crc("0x4bde").unwrap(), 0x4bde);
    assert_eq!(parse_crc("0X4BDE").unwrap(), 0x4bde);
    assert_eq!(parse_crc("4bde").unwrap(), 0x4bde);
    assert!(parse_crc("0x14bde").is_err());
    assert!(parse_crc("0xg").is_err());
}
