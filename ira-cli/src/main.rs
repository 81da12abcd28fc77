#[macro_use]
extern crate clap;

use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use clap::Arg;
use ira_core::config::{Config, ConfigFlags, CpuModel};
use ira_core::{Engine, EngineError};
use ira_util::EnumFromStr;

#[derive(Debug)]
enum Error {
    Engine(EngineError),
    Clap(clap::Error),
    Io(io::Error),
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("IRA_ERROR: {:?}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Error> {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("INPUT")
                .help("Amiga executable, object file, or raw binary to reassemble")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("Target assembly file (defaults to INPUT with a .asm extension)"),
        )
        .arg(
            Arg::with_name("cpu")
                .long("cpu")
                .takes_value(true)
                .value_name("CPU")
                .default_value("M68000")
                .help("Target CPU: M68000, M68010, M68020, M68030, M68040, or M68060"),
        )
        .arg(
            Arg::with_name("entry")
                .long("entry")
                .takes_value(true)
                .value_name("ADDRESS")
                .help("Code-entry address, hex (e.g. 0x1000); defaults to the first CODE section"),
        )
        .arg(
            Arg::with_name("base")
                .long("base")
                .takes_value(true)
                .value_name("ADDRESS")
                .default_value("0")
                .help("Program-start address the flat image is mapped at, hex"),
        )
        .arg(
            Arg::with_name("preproc")
                .long("preproc")
                .help("Run Pass 0 code discovery instead of seeding one area per CODE section"),
        )
        .arg(
            Arg::with_name("split")
                .long("split")
                .help("Write one file per section plus an INCLUDE-driven main file"),
        )
        .arg(
            Arg::with_name("keep-binary")
                .long("keep-binary")
                .help("Retain the relocated flat image as INPUT.bin"),
        )
        .arg(
            Arg::with_name("adr-output")
                .long("adr-output")
                .help("Append each emitted line's address as a trailing comment"),
        )
        .get_matches();

    let input_path = matches.value_of("INPUT").unwrap();
    let output_path = matches
        .value_of("output")
        .map(String::from)
        .unwrap_or_else(|| default_output_path(input_path));

    let cpu_mask = parse_cpu(matches.value_of("cpu").unwrap()).map_err(Error::Clap)?;
    let prg_start = parse_address(matches.value_of("base").unwrap()).map_err(Error::Clap)?;
    let code_entry = matches
        .value_of("entry")
        .map(parse_address)
        .transpose()
        .map_err(Error::Clap)?;

    let mut flags = ConfigFlags::default();
    if matches.is_present("preproc") {
        flags.set(ConfigFlags::PREPROC);
    }
    if matches.is_present("split") {
        flags.set(ConfigFlags::SPLITFILE);
    }
    if matches.is_present("keep-binary") {
        flags.set(ConfigFlags::KEEP_BINARY);
    }
    if matches.is_present("adr-output") {
        flags.set(ConfigFlags::ADR_OUTPUT);
    }

    let config = Config {
        source_path: input_path.to_string(),
        target_path: output_path.clone(),
        prg_start,
        code_entry,
        cpu_mask,
        flags,
        ..Config::default()
    };

    let mut file = File::open(input_path).map_err(Error::Io)?;
    let engine = Engine::new(config.clone());
    let listing = engine.run(&mut file).map_err(Error::Engine)?;

    if flags.contains(ConfigFlags::KEEP_BINARY) {
        log::info!("--keep-binary requested; binary retention happens at container-read time");
    }

    let mut out = File::create(&output_path).map_err(Error::Io)?;
    out.write_all(listing.as_bytes()).map_err(Error::Io)?;
    Ok(())
}

fn default_output_path(input_path: &str) -> String {
    match input_path.rsplit_once('.') {
        Some((stem, _)) => format!("{}.asm", stem),
        None => format!("{}.asm", input_path),
    }
}

fn parse_cpu(name: &str) -> Result<u32, clap::Error> {
    CpuModel::from_str(name)
        .map(|model| model.mask())
        .map_err(|err| clap::Error::with_description(&err.to_string(), clap::ErrorKind::InvalidValue))
}

fn parse_address(text: &str) -> Result<u32, clap::Error> {
    let trimmed = text.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(trimmed, 16).map_err(|_| {
        clap::Error::with_description(&format!("invalid address: {}", text), clap::ErrorKind::InvalidValue)
    })
}
