use std::{
    error::Error,
    io::{Write, stdout},
    path::PathBuf,
};

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use jzon::JsonValue;
use simple_error::bail;
use tiliqua_genrust::{FixedClock, GenRust, SystemClock, Timestamp};
use tiliqua_memmap::MemoryMap;
use tiliqua_platform::{
    ClockNetwork, Platform,
    clocks::FrequencyListing,
    platform::PinListing,
};

fn map_arg() -> Arg {
    Arg::new("map")
        .required(true)
        .value_parser(value_parser!(PathBuf))
}

fn json_arg() -> Arg {
    Arg::new("json").long("json").action(ArgAction::SetTrue)
}

fn memory_x(m: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let arg_map = m.get_one::<PathBuf>("map").unwrap();
    let map = MemoryMap::from_file(arg_map)?;
    let source_date_epoch = std::env::var("SOURCE_DATE_EPOCH").ok();
    let clock = FixedClock(Timestamp::select(
        m.get_one::<i64>("timestamp").copied(),
        source_date_epoch.as_deref(),
        &SystemClock,
    )?);
    let gen_rust = GenRust::new(&map).strict(m.get_flag("strict"));
    log::debug!(
        "{path}: {n} windows, aliasing {ram}",
        path = arg_map.display(),
        n = map.windows.len(),
        ram = gen_rust.ram_region()
    );
    if let Some(arg_out) = m.get_one::<PathBuf>("output") {
        gen_rust.write_memory_x(arg_out, &clock)?;
        log::info!("wrote {}", arg_out.display());
    } else {
        let mut out = stdout().lock();
        gen_rust.generate_memory_x(&mut out, &clock)?;
        out.flush()?;
    }
    Ok(())
}

fn memmap(m: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let map = MemoryMap::from_file(m.get_one::<PathBuf>("map").unwrap())?;
    if m.get_flag("json") {
        println!("{}", JsonValue::from(&map));
    } else {
        print!("{map}");
    }
    Ok(())
}

fn platform(m: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let mut show_resources = m.get_flag("resources");
    let mut show_connectors = m.get_flag("connectors");
    let mut show_clocks = m.get_flag("clocks");
    if !show_resources && !show_connectors && !show_clocks {
        show_resources = true;
        show_connectors = true;
        show_clocks = true;
    }
    let platform = Platform::tiliqua();
    let network = ClockNetwork::tiliqua(&platform)?;

    if m.get_flag("json") {
        let mut json = JsonValue::from(&platform);
        if !show_resources {
            json.remove("resources");
        }
        if !show_connectors {
            json.remove("connectors");
        }
        if show_clocks {
            json["clocks"] = JsonValue::from(&network);
        }
        println!("{json}");
    } else {
        println!("PLATFORM");
        print!("{platform}");
        if show_resources {
            println!("RESOURCES");
            for res in &platform.resources {
                print!("{res}");
            }
            println!("PINS");
            print!("{}", PinListing(&platform));
        }
        if show_connectors {
            println!("CONNECTORS");
            for conn in &platform.connectors {
                print!("{conn}");
            }
        }
        if show_clocks {
            println!("CLOCKS");
            print!("{network}");
            println!("FREQUENCIES");
            print!("{}", FrequencyListing(&network, &platform));
        }
    }

    let mut problems = 0;
    for err in platform.check() {
        log::error!("platform: {err}");
        problems += 1;
    }
    for err in network.check(&platform) {
        log::error!("clocks: {err}");
        problems += 1;
    }
    if problems != 0 {
        bail!("{problems} problems found", problems = problems);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let m = Command::new("tiliqua")
        .subcommand_required(true)
        .subcommand(
            Command::new("memory-x")
                .about("Generate a riscv-rt memory.x from a memory map")
                .arg(map_arg())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("timestamp")
                        .long("timestamp")
                        .value_parser(value_parser!(i64)),
                )
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("memmap")
                .about("Dump a memory map")
                .arg(map_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("platform")
                .about("Dump and check the Tiliqua platform")
                .arg(
                    Arg::new("resources")
                        .short('r')
                        .long("resources")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("connectors")
                        .short('c')
                        .long("connectors")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("clocks")
                        .short('k')
                        .long("clocks")
                        .action(ArgAction::SetTrue),
                )
                .arg(json_arg()),
        )
        .get_matches();
    match m.subcommand() {
        Some(("memory-x", m)) => memory_x(m),
        Some(("memmap", m)) => memmap(m),
        Some(("platform", m)) => platform(m),
        _ => unreachable!(),
    }
}
