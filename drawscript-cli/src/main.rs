use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use drawscript::{
    CallInfo, ConfigEntry, FrameState, LoadReport, ProfileReport, Session, SessionOpts, SoftDevice,
};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "drawscript", version)]
struct Cli {
    /// Log debug events to stderr.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a script, run it for every frame it lists and print a JSON summary.
    Run(RunArgs),
    /// Print the parsed command tree of one section.
    Dump(DumpArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Input script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Write the summary here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Skip the command list optimizer.
    #[arg(long, default_value_t = false)]
    no_optimize: bool,
}

#[derive(Parser, Debug)]
struct DumpArgs {
    /// Input script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Section to print, e.g. `commandlistfoo`.
    #[arg(long)]
    section: String,

    /// Namespace the section was declared in.
    #[arg(long, default_value = "")]
    namespace: String,

    /// Print the post list instead of the pre list.
    #[arg(long, default_value_t = false)]
    post: bool,

    /// Run the optimizer before printing.
    #[arg(long, default_value_t = false)]
    optimize: bool,
}

/// Script file: session options, configuration entries and the frames to simulate.
#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default)]
    opts: SessionOpts,
    entries: Vec<ConfigEntry>,
    #[serde(default)]
    frames: Vec<FrameState>,
    /// Globals to include in the summary.
    #[serde(default)]
    watch: Vec<String>,
    /// Persisted globals are loaded from and saved to this file, relative to the script.
    #[serde(default)]
    persist: Option<PathBuf>,
    /// Give the device an active stereo driver.
    #[serde(default)]
    stereo: bool,
}

impl Script {
    fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read script '{}'", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse script '{}'", path.display()))
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    load: LoadReport,
    optimized: usize,
    commands: usize,
    frames: usize,
    draws: usize,
    vars: BTreeMap<String, Vec<f32>>,
    profile: ProfileReport,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .init();

    match cli.cmd {
        Command::Run(args) => cmd_run(args),
        Command::Dump(args) => cmd_dump(args),
    }
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let script = Script::from_path(&args.in_path)?;
    let mut session = Session::new(script.opts.clone());
    let load = session.load(&script.entries);

    let persist_path = script.persist.as_ref().map(|p| {
        args.in_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(p)
    });
    if let Some(path) = persist_path.as_deref().filter(|p| p.exists()) {
        session
            .load_persisted(path)
            .with_context(|| format!("load persisted globals '{}'", path.display()))?;
    }

    let optimized = if args.no_optimize {
        0
    } else {
        session.optimize_command_lists()
    };

    let mut device = if script.stereo {
        SoftDevice::with_stereo()
    } else {
        SoftDevice::new()
    };
    session.run_constants(&mut device);

    let present = session.section("present", "");
    for frame in &script.frames {
        session.begin_frame(*frame);
        if let Some(present) = present {
            session.run_command_list(&mut device, present, &CallInfo::default(), false);
            session.run_command_list(&mut device, present, &CallInfo::default(), true);
        }
    }

    if let Some(path) = &persist_path {
        session
            .save_persisted(path)
            .with_context(|| format!("save persisted globals '{}'", path.display()))?;
    }

    let mut vars = BTreeMap::new();
    for name in &script.watch {
        let values = session
            .var(name)
            .with_context(|| format!("watched global '{name}' is not declared"))?;
        vars.insert(name.clone(), values.to_vec());
    }

    let summary = Summary {
        load,
        optimized,
        commands: session.command_count(),
        frames: script.frames.len(),
        draws: device.draws().len(),
        vars,
        profile: session.profile_report(),
    };
    session.release_resources(&mut device);

    let json = serde_json::to_string_pretty(&summary)?;
    match &args.out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(out, json).with_context(|| format!("write '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_dump(args: DumpArgs) -> anyhow::Result<()> {
    let script = Script::from_path(&args.in_path)?;
    let mut session = Session::new(script.opts);
    session.load(&script.entries);
    if args.optimize {
        session.optimize_command_lists();
    }
    let id = session
        .section(&args.section, &args.namespace)
        .with_context(|| format!("no section named '{}'", args.section))?;
    print!("{}", session.dump(id, args.post));
    Ok(())
}
