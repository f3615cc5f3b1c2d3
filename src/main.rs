
mod compose;
mod application;
mod error;
#[cfg(feature = "service")]
mod service;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Arg;
use clap::ArgMatches;
use clap::Command;

use application::Application;
use application::FrameOptions;
use compose::anchor::EyeAnchor;
use compose::anchor::Point;
use error::FrameError;
use error::FrameResult;


const VERSION: &'static str = env!("CARGO_PKG_VERSION");


fn frame_args(cmd: Command) -> Command {
    cmd
    .arg(
        Arg::new("config")
        .long("config")
        .help("json file with frame geometry: height_ratio, width_ratio, offset_ratio, filter")
    )
    .arg(
        Arg::new("filter")
        .long("filter")
        .help("filter used to resize the frame, can be \"nearest\", \"triangle\", \"gaussian\", \"catmullrom\", \"lanczos3\"; default is \"triangle\"")
    )
    .arg(
        Arg::new("quality")
        .short('q')
        .long("quality")
        .help("jpeg quality, from 1 to 100, default is 95")
    )
}

fn frame_options(args: &ArgMatches) -> FrameResult<FrameOptions> {
    let mut options = FrameOptions::default();
    if let Some(path) = args.get_one::<String>("config") {
        let geometry = compose::de::load_geometry(BufReader::new(File::open(path)?))?;
        options.set_geometry(geometry);
    }
    if let Some(value) = args.get_one::<String>("filter") {
        if !options.geometry_mut().set_filter(value) {
            log::warn!("unknown filter `{}`, keep default", value);
        }
    }
    if let Some(quality) = args.get_one::<String>("quality") {
        match quality.parse() {
            Ok(quality) => options.set_quality(quality),
            Err(_) => log::warn!("invalid quality `{}`, keep default", quality),
        }
    }
    Ok(options)
}

fn cli() -> Command {

    let serve = Command::new("serve")
        .about("serve POST /apply_frame")
        .arg(
            Arg::new("host")
            .long("host")
            .help("listen address, default is 0.0.0.0:8080")
        )
        .arg(
            Arg::new("workers")
            .short('w')
            .long("workers")
            .help("http worker number, default is the cpu count")
        )
        .arg(
            Arg::new("max_tasks")
            .long("max_tasks")
            .help("requests processed at the same time before answering 429, default is 128")
        )
        .arg(
            Arg::new("max_upload")
            .long("max_upload")
            .help("largest accepted upload in bytes, default is 16MiB")
        )
        .arg(
            Arg::new("frame_root")
            .long("frame_root")
            .help("only frames inside this folder may be used")
        );

    let apply = Command::new("apply")
        .about("put a frame onto one photo")
        .arg(
            Arg::new("image")
            .short('i')
            .long("image")
            .help("input photo")
            .required(true)
        )
        .arg(
            Arg::new("frame")
            .short('f')
            .long("frame")
            .help("frame image, must have an alpha channel")
            .required(true)
        )
        .arg(
            Arg::new("output")
            .short('o')
            .long("output")
            .help("output jpeg")
            .required(true)
        )
        .arg(
            Arg::new("left_eye")
            .long("left_eye")
            .help("outer corner of the left eye as \"x,y\"; with --right_eye the frame follows the eyes")
            .requires("right_eye")
        )
        .arg(
            Arg::new("right_eye")
            .long("right_eye")
            .help("outer corner of the right eye as \"x,y\"")
            .requires("left_eye")
        );

    Command::new("photo frame compositor")
        .version(VERSION)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(frame_args(serve))
        .subcommand(frame_args(apply))
}

fn main() {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let r = match matches.subcommand() {
        Some(("serve", args)) => serve_command(args),
        Some(("apply", args)) => apply_command(args),
        _ => Ok(()),
    };
    if let Err(e) = r {
        log::error!("{}", e);
        process::exit(1);
    }
}

fn apply_command(args: &ArgMatches) -> FrameResult<()> {
    let options = frame_options(args)?;
    let src = PathBuf::from(args.get_one::<String>("image").map(String::as_str).unwrap_or_default());
    let frame = args.get_one::<String>("frame").map(String::as_str).unwrap_or_default();
    let tgt = PathBuf::from(args.get_one::<String>("output").map(String::as_str).unwrap_or_default());
    let anchor = match (args.get_one::<String>("left_eye"), args.get_one::<String>("right_eye")) {
        (Some(left), Some(right)) => {
            let left: Point = left.parse().map_err(FrameError::Argument)?;
            let right: Point = right.parse().map_err(FrameError::Argument)?;
            Some(EyeAnchor::new(left, right))
        },
        _ => None,
    };

    let time = Instant::now();
    Application::new(options).apply_file(src.as_path(), frame, anchor.as_ref(), tgt.as_path())?;
    log::info!("> {} written, used {}ms", tgt.display(), time.elapsed().as_millis());
    Ok(())
}

#[cfg(feature = "service")]
fn serve_command(args: &ArgMatches) -> FrameResult<()> {
    use service::FrameServerOptions;
    use service::FrameService;

    let mut frame_options = frame_options(args)?;
    if let Some(root) = args.get_one::<String>("frame_root") {
        frame_options.set_frame_root(root);
    }
    let mut options = FrameServerOptions::default();
    if let Some(host) = args.get_one::<String>("host") {
        options.set_host(host);
    }
    if let Some(num) = args.get_one::<String>("workers").and_then(|v| v.parse().ok()) {
        options.set_workers(num);
    }
    if let Some(num) = args.get_one::<String>("max_tasks").and_then(|v| v.parse().ok()) {
        options.set_max_tasks(num);
    }
    if let Some(num) = args.get_one::<String>("max_upload").and_then(|v| v.parse().ok()) {
        options.set_max_upload(num);
    }
    FrameService::new(options, frame_options).start()?;
    Ok(())
}

#[cfg(not(feature = "service"))]
fn serve_command(_args: &ArgMatches) -> FrameResult<()> {
    Err(FrameError::MissingFeature("service"))
}
