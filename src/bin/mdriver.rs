use std::{env, process, time::Instant};

use anyhow::{Context, bail};
use log::{debug, error, info};
use tagalloc::{Config, Grower, ReplayOptions, ReplayStats, Trace, replay};

const USAGE: &str = "usage: mdriver [-s next|best|random|weighted] [--seed N] [-c] [-m] [-v] <trace>...";

struct Args {
  config: Config,
  check_heap: bool,
  mmap: bool,
  verbose: bool,
  traces: Vec<String>,
}

fn parse_args() -> anyhow::Result<Args> {
  let mut args = Args {
    config: Config::default(),
    check_heap: false,
    mmap: false,
    verbose: false,
    traces: Vec::new(),
  };

  let mut argv = env::args().skip(1);
  while let Some(arg) = argv.next() {
    match arg.as_str() {
      "-s" | "--strategy" => {
        let value = argv.next().context("missing value for --strategy")?;
        args.config.strategy = value.parse()?;
      }
      "--seed" => {
        let value = argv.next().context("missing value for --seed")?;
        args.config.seed = value
          .parse()
          .with_context(|| format!("invalid seed `{}`", value))?;
      }
      "-c" | "--check" => args.check_heap = true,
      "-m" | "--mmap" => args.mmap = true,
      "-v" | "--verbose" => args.verbose = true,
      "-h" | "--help" => bail!(USAGE),
      flag if flag.starts_with('-') => bail!("unknown flag `{}`\n{}", flag, USAGE),
      path => args.traces.push(path.to_string()),
    }
  }

  if args.traces.is_empty() {
    bail!(USAGE);
  }

  Ok(args)
}

fn setup_logging(verbose: bool) -> Result<(), log::SetLoggerError> {
  let level = if verbose {
    log::LevelFilter::Debug
  } else {
    log::LevelFilter::Info
  };

  fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{}[{}][{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
        record.level(),
        record.target(),
        message
      ))
    })
    .level(level)
    .chain(std::io::stderr())
    .apply()
}

fn run_with<G: Grower>(
  config: &Config,
  grower: G,
  trace: &Trace,
  options: ReplayOptions,
) -> anyhow::Result<ReplayStats> {
  let mut allocator = config
    .build_with(grower)
    .context("failed to initialize the allocator")?;
  let stats = replay(&mut allocator, trace, options).context("replay failed")?;

  Ok(stats)
}

fn run_trace(
  args: &Args,
  path: &str,
) -> anyhow::Result<ReplayStats> {
  let trace = Trace::from_path(path).with_context(|| format!("failed to read trace {}", path))?;
  let options = ReplayOptions {
    check_heap: args.check_heap,
  };

  debug!(
    "{}: {} ops over {} ids, suggested heap {}",
    path,
    trace.ops.len(),
    trace.num_ids,
    trace.suggested_heap_size
  );

  #[cfg(unix)]
  if args.mmap {
    let grower = tagalloc::MmapGrower::new(args.config.max_heap)?;
    return run_with(&args.config, grower, &trace, options);
  }

  run_with(
    &args.config,
    tagalloc::VecGrower::new(args.config.max_heap),
    &trace,
    options,
  )
}

fn main() {
  let args = match parse_args() {
    Ok(args) => args,
    Err(e) => {
      eprintln!("{:#}", e);
      process::exit(2);
    }
  };

  if let Err(e) = setup_logging(args.verbose) {
    eprintln!("Failed to initialize logging: {}", e);
  }

  info!(
    "Replaying {} trace(s) with {} fit, seed {}",
    args.traces.len(),
    args.config.strategy,
    args.config.seed
  );

  let mut failed = 0;
  let mut total_utilization = 0.0;

  println!("{:<40} {:>8} {:>7} {:>10} {:>10}", "trace", "ops", "util", "heap", "secs");

  for path in &args.traces {
    let now = Instant::now();

    match run_trace(&args, path) {
      Ok(stats) => {
        total_utilization += stats.utilization;
        println!(
          "{:<40} {:>8} {:>6.1}% {:>10} {:>10.6}",
          path,
          stats.ops,
          stats.utilization * 100.0,
          stats.heap_size,
          now.elapsed().as_secs_f64()
        );
      }
      Err(e) => {
        failed += 1;
        error!("{}: {:#}", path, e);
        println!("{:<40} {:>8}", path, "FAILED");
      }
    }
  }

  let passed = args.traces.len() - failed;
  if passed > 0 {
    println!("average utilization: {:.1}%", total_utilization / passed as f64 * 100.0);
  }

  if failed > 0 {
    process::exit(1);
  }
}
