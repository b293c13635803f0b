use clap::{Arg, ArgAction, Command};
use scanlink_driver::{
    Connect, Controller, HokuyoSerialController, HokuyoSocketController, Log,
    NeatoController, NeatoSerialController, NeatoSocketController, ScanSource, SharedLog,
    TimeResolution, TimedLog, TimedReplay,
};
use std::error::Error;
use std::sync::Arc;

struct Options {
    device: String,
    endpoint: Option<String>,
    serial: bool,
    replay: Option<String>,
    record: Option<String>,
    timed: bool,
    sync: bool,
    count: usize,
    json: bool,
}

fn get_options() -> Options {
    let matches = Command::new("Scan reader")
        .about("Reads scans from a Hokuyo or Neato scanner, or replays them from a log.")
        .disable_version_flag(true)
        .arg(
            Arg::new("device")
                .help("Scanner type")
                .value_parser(["hokuyo", "neato"])
                .required(true),
        )
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .help("host:port of a socket or the device path of a serial port"),
        )
        .arg(
            Arg::new("serial")
                .long("serial")
                .help("Connect through a serial port instead of a socket")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("replay")
                .long("replay")
                .help("Read the scans from this log instead of the device")
                .conflicts_with("record"),
        )
        .arg(
            Arg::new("record")
                .long("record")
                .help("Record every exchange into this log"),
        )
        .arg(
            Arg::new("timed")
                .long("timed")
                .help("The log stores timestamps")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("sync")
                .long("sync")
                .help("Replay a timed log at the recorded pace")
                .requires("timed")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("count")
                .long("count")
                .help("Number of scans to read")
                .value_parser(clap::value_parser!(usize))
                .default_value("1"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print scans as JSON")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    Options {
        device: matches.get_one::<String>("device").cloned().unwrap_or_default(),
        endpoint: matches.get_one::<String>("endpoint").cloned(),
        serial: matches.get_flag("serial"),
        replay: matches.get_one::<String>("replay").cloned(),
        record: matches.get_one::<String>("record").cloned(),
        timed: matches.get_flag("timed"),
        sync: matches.get_flag("sync"),
        count: matches.get_one::<usize>("count").copied().unwrap_or(1),
        json: matches.get_flag("json"),
    }
}

fn open_log(options: &Options) -> Result<Option<SharedLog>, Box<dyn Error>> {
    let resolution = TimeResolution::MILLISECONDS;
    let log: SharedLog = match (&options.replay, &options.record, options.timed) {
        (Some(path), _, true) => {
            let log = TimedLog::open(path, resolution)?;
            log.sync_time(options.sync);
            Arc::new(log)
        }
        (Some(path), _, false) => Arc::new(Log::open(path)?),
        (None, Some(path), true) => Arc::new(TimedLog::create(path, resolution)?),
        (None, Some(path), false) => Arc::new(Log::create(path)?),
        (None, None, _) => return Ok(None),
    };
    Ok(Some(log))
}

/// Attaches the log and, unless replaying, connects to the device.
fn prepare(scanner: &mut dyn ScanSource, options: &Options) -> Result<(), Box<dyn Error>> {
    scanner.set_log(open_log(options)?);
    if options.replay.is_none() {
        let endpoint = options
            .endpoint
            .as_deref()
            .ok_or("--endpoint is required to read from a device")?;
        scanner.connect(endpoint)?;
        log::info!("Connected to {}", scanner.endpoint());
    }
    Ok(())
}

fn print_scans(scanner: &mut dyn ScanSource, options: &Options) -> Result<(), Box<dyn Error>> {
    let from_device = options.replay.is_none();
    for _ in 0..options.count {
        let scan = scanner.get_scan(from_device)?;
        if scan.is_empty() && !from_device {
            log::info!("No scan left in the log");
            break;
        }
        match options.json {
            true => println!("{}", serde_json::to_string(&scan)?),
            false => print!("{}", scan),
        }
    }
    Ok(())
}

fn run(scanner: &mut dyn ScanSource, options: &Options) -> Result<(), Box<dyn Error>> {
    prepare(scanner, options)?;
    print_scans(scanner, options)
}

fn run_neato<T: Connect>(
    mut scanner: NeatoController<T>,
    options: &Options,
) -> Result<(), Box<dyn Error>> {
    prepare(&mut scanner, options)?;
    let live = options.replay.is_none();
    if live {
        scanner.start_scanner()?;
    }
    let result = print_scans(&mut scanner, options);
    if live {
        scanner.stop_scanner()?;
    }
    if let Some(log) = scanner.log() {
        log.close()?;
    }
    result
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let options = get_options();

    match (options.device.as_str(), options.serial) {
        ("hokuyo", false) => run(&mut HokuyoSocketController::new(), &options),
        ("hokuyo", true) => run(&mut HokuyoSerialController::new(), &options),
        (_, false) => run_neato(NeatoSocketController::new(), &options),
        (_, true) => run_neato(NeatoSerialController::new(), &options),
    }
}
