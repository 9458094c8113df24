use clap::{Arg, ArgAction, ArgMatches, Command, value_parser, ValueEnum};
use log::{info, LevelFilter};
use simplelog::{ConfigBuilder, LevelPadding, WriteLogger};
use std::fs::{self, File};

use ti990_hdc::registers::*;
use ti990_hdc::{DiskFile, DiskImageHeader, HardDiskController, NoInterrupt, Ram,
                COMMAND_READ_DATA, COMMAND_RESTORE, MAX_SECTOR_SIZE};
use ti990_utils::hexprint::pretty_print_hex_words_zero;

const LOG_PATH: &str = "LOG_PATH";
const LOG_LEVEL: &str = "LOG_LEVEL";
const IMAGE_PATH: &str = "IMAGE_PATH";
const CYLINDERS: &str = "cylinders";
const HEADS: &str = "heads";
const SECTORS: &str = "sectors";
const SECTOR_SIZE: &str = "sector-size";
const CYLINDER: &str = "cylinder";
const HEAD: &str = "head";
const SECTOR: &str = "sector";
const COUNT: &str = "count";

/// Possible log levels.
#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
}

fn image_arg() -> Arg {
    Arg::new(IMAGE_PATH)
        .help("The path to the disk image.")
        .action(ArgAction::Set)
        .required(true)
}

fn cli() -> Command {
    // Hack to make the build dirty when the toml changes.
    include_str!("../../Cargo.toml");

    clap::command!()
        .max_term_width(100)
        .subcommand_required(true)
        .after_help("\
Disk images start with a 16-byte header giving the cylinder, head, sector \
and sector size counts as big-endian 32-bit words, followed by the sectors \
in cylinder, head, sector order.")
        .arg(Arg::new(LOG_PATH)
            .help("If set, a debug log will be written to the given path.")
            .short('l')
            .long("log")
            .action(ArgAction::Set)
            .global(true))
        .arg(Arg::new(LOG_LEVEL)
            .help("Set the log level. Has no effect without \
                   specifying --log as well. Case insensitive.")
            .short('L')
            .long("log-level")
            .action(ArgAction::Set)
            .default_value("TRACE")
            .value_parser(value_parser!(LogLevel))
            .ignore_case(true)
            .global(true))
        .subcommand(Command::new("create")
            .about("Create a blank disk image.")
            .arg(image_arg())
            .arg(Arg::new(CYLINDERS)
                .help("Number of cylinders.")
                .short('c')
                .long(CYLINDERS)
                .action(ArgAction::Set)
                .required(true)
                .value_parser(value_parser!(u32).range(1..=0x07FF)))
            .arg(Arg::new(HEADS)
                .help("Number of heads.")
                .short('H')
                .long(HEADS)
                .action(ArgAction::Set)
                .required(true)
                .value_parser(value_parser!(u32).range(1..=0x1F)))
            .arg(Arg::new(SECTORS)
                .help("Number of sectors per track.")
                .short('s')
                .long(SECTORS)
                .action(ArgAction::Set)
                .required(true)
                .value_parser(value_parser!(u32).range(1..=0xFF)))
            .arg(Arg::new(SECTOR_SIZE)
                .help("Bytes per sector.")
                .short('b')
                .long(SECTOR_SIZE)
                .action(ArgAction::Set)
                .default_value("256")
                .value_parser(value_parser!(u32).range(2..=MAX_SECTOR_SIZE as i64))))
        .subcommand(Command::new("info")
            .about("Print the geometry of a disk image.")
            .arg(image_arg()))
        .subcommand(Command::new("dump")
            .about("Read sectors through an emulated controller and hex dump them.")
            .arg(image_arg())
            .arg(Arg::new(CYLINDER)
                .help("The cylinder to start from.")
                .short('c')
                .long(CYLINDER)
                .action(ArgAction::Set)
                .default_value("0")
                .value_parser(value_parser!(u16)))
            .arg(Arg::new(HEAD)
                .help("The head to start from.")
                .short('H')
                .long(HEAD)
                .action(ArgAction::Set)
                .default_value("0")
                .value_parser(value_parser!(u16).range(..=W1_HEAD_ADDRESS as i64)))
            .arg(Arg::new(SECTOR)
                .help("The sector to start from.")
                .short('s')
                .long(SECTOR)
                .action(ArgAction::Set)
                .default_value("0")
                .value_parser(value_parser!(u16).range(..=0xFF)))
            .arg(Arg::new(COUNT)
                .help("How many sectors to read.")
                .short('n')
                .long(COUNT)
                .action(ArgAction::Set)
                .default_value("1")
                .value_parser(value_parser!(u32).range(1..))))
}

/// Initialise logging to the given file.
fn init_logging(logfile: File, level: LevelFilter) -> Result<(), String> {
    let config = ConfigBuilder::new()
        .set_level_padding(LevelPadding::Right)
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_time_format_custom(time::macros::format_description!(
            "[hour]:[minute]:[second].[subsecond digits:6]"))
        .build();

    WriteLogger::init(level, config, logfile)
        .map_err(|e| format!("Failed to initialise logging: {}", e))
}

fn read_header(path: &str) -> Result<(DiskImageHeader, u64), String> {
    let mut file = File::open(path)
        .map_err(|e| format!("Couldn't open image '{}': {}", path, e))?;
    let header = DiskImageHeader::parse(&mut file)
        .map_err(|e| format!("Couldn't read header of '{}': {}", path, e))?;
    let len = fs::metadata(path)
        .map_err(|e| format!("Couldn't access '{}': {}", path, e))?
        .len();
    Ok((header, len))
}

fn create(args: &ArgMatches) -> Result<(), String> {
    let path = args.get_one::<String>(IMAGE_PATH).unwrap();
    let header = DiskImageHeader {
        cylinders: *args.get_one(CYLINDERS).unwrap(),
        heads: *args.get_one(HEADS).unwrap(),
        sectors_per_track: *args.get_one(SECTORS).unwrap(),
        bytes_per_sector: *args.get_one(SECTOR_SIZE).unwrap(),
    };
    DiskFile::create(path, &header)
        .map_err(|e| format!("Failed to create image '{}': {}", path, e))?;
    info!("Created '{}': {:?}.", path, header);
    println!("Created '{}' ({} bytes).", path, header.image_len());
    Ok(())
}

fn print_info(args: &ArgMatches) -> Result<(), String> {
    let path = args.get_one::<String>(IMAGE_PATH).unwrap();
    let (header, len) = read_header(path)?;
    println!("Cylinders:         {}", header.cylinders);
    println!("Heads:             {}", header.heads);
    println!("Sectors per track: {}", header.sectors_per_track);
    println!("Bytes per sector:  {}", header.bytes_per_sector);
    println!("Capacity:          {} bytes", header.payload_len());
    if len < header.image_len() {
        println!("Warning: the file is {} bytes short of its declared size.",
                 header.image_len() - len);
    }
    Ok(())
}

/// Check a finished command, describing the registers if it failed.
fn check_outcome(hdc: &HardDiskController<Ram, NoInterrupt>, name: &str) -> Result<(), String> {
    let w7 = hdc.read(7);
    if w7 & W7_ERROR != 0 {
        Err(format!("{} failed: w0={:04X} w7={:04X}", name, hdc.read(0), w7))
    } else {
        Ok(())
    }
}

/// Read `count` sectors from the image at `path` through a controller, as a
/// host program would, returning the words DMAed to memory.
fn read_sectors(path: &str, cylinder: u16, head: u16, sector: u16,
                count: u32) -> Result<Vec<u16>, String> {
    let (header, _) = read_header(path)?;
    let byte_count = count as u64 * header.bytes_per_sector as u64;
    if byte_count > 0xFFFE {
        return Err(format!("Can't read more than {} bytes in one command.", 0xFFFE));
    }

    let store = DiskFile::open_read_only(path)
        .map_err(|e| format!("Couldn't open image '{}': {}", path, e))?;
    let mut hdc = HardDiskController::new(Ram::new(), NoInterrupt);
    hdc.attach(0, store)
        .map_err(|e| format!("Couldn't attach '{}': {}", path, e))?;

    hdc.write(6, W6_UNIT0_SELECT, 0);
    hdc.write(1, COMMAND_RESTORE << 8, 0);
    hdc.write(7, 0, 0);
    check_outcome(&hdc, "Restore")?;

    hdc.write(1, (COMMAND_READ_DATA << 8) | head, 0);
    hdc.write(2, sector, 0);
    hdc.write(3, cylinder, 0);
    hdc.write(4, byte_count as u16, 0);
    hdc.write(5, 0, 0);
    hdc.write(7, 0, 0);
    check_outcome(&hdc, "Read Data")?;

    Ok(hdc.memory().dump(0, (byte_count / 2) as usize))
}

fn dump(args: &ArgMatches) -> Result<(), String> {
    let path = args.get_one::<String>(IMAGE_PATH).unwrap();
    let words = read_sectors(path,
                             *args.get_one(CYLINDER).unwrap(),
                             *args.get_one(HEAD).unwrap(),
                             *args.get_one(SECTOR).unwrap(),
                             *args.get_one(COUNT).unwrap())?;
    println!("{}", pretty_print_hex_words_zero(&words));
    Ok(())
}

/// Main run function; returns an exit code.
fn run(args: ArgMatches) -> u8 {
    return match _run(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    fn _run(args: ArgMatches) -> Result<(), String> {
        // Initialise logging if configured.
        if let Some(log_path) = args.get_one::<String>(LOG_PATH) {
            let logfile = File::create(log_path)
                .map_err(|e| format!("Failed to create log file: {}", e))?;
            let level = match args.get_one::<LogLevel>(LOG_LEVEL).unwrap() {
                LogLevel::TRACE => LevelFilter::Trace,
                LogLevel::DEBUG => LevelFilter::Debug,
                LogLevel::INFO => LevelFilter::Info,
            };
            init_logging(logfile, level)?;
        }

        match args.subcommand() {
            Some(("create", sub_args)) => create(sub_args),
            Some(("info", sub_args)) => print_info(sub_args),
            Some(("dump", sub_args)) => dump(sub_args),
            _ => unreachable!(),  // Subcommand is required.
        }
    }
}

fn main() {
    let args = cli().get_matches();
    std::process::exit(run(args).into());
}
