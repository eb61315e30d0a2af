// SPDX-License-Identifier: MIT
// rimprobe/src/main.rs

mod device;
mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rimio::prelude::*;
use rimpart::{DEFAULT_SECTOR_SIZE, PartitionMap, PartitionScanOptions};
use rimzfs::constant::ZFS_SIGNATURE_SIZE;
use rimzfs::prelude::*;

use crate::device::{Target, partition_window};

#[derive(Parser)]
#[command(name = "rimprobe", version, about = "ZFS label probe and wiper", long_about = None)]
struct Cli {
    /// Print decisions and library diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Disk image or block device
    path: PathBuf,

    /// Probe inside partition N of the partition table (0-based slot)
    #[arg(short, long)]
    partition: Option<usize>,

    /// Logical sector size used to read the partition table
    #[arg(long, default_value_t = DEFAULT_SECTOR_SIZE)]
    sector_size: u64,

    /// Do not skip labels covered by a partition
    #[arg(long)]
    no_pt_check: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Look for a ZFS vdev label and print what it identifies
    Probe {
        #[command(flatten)]
        target: TargetArgs,

        /// Read the whole label list instead of stopping at the wanted fields
        #[arg(long)]
        full_scan: bool,
    },
    /// Zero the signature region of every live ZFS label
    Wipe {
        #[command(flatten)]
        target: TargetArgs,

        /// Only list what would be erased
        #[arg(long)]
        dry_run: bool,
    },
}

/// Where on the target the probe runs.
struct ProbeScope {
    map: PartitionMap,
    offset: u64,
    size: u64,
    kind: DeviceKind,
}

impl ProbeScope {
    fn resolve(target: &mut Target, args: &TargetArgs) -> anyhow::Result<Self> {
        let scan_opts = PartitionScanOptions::new().with_sector_size(args.sector_size);
        let map = target.partition_map(scan_opts);

        let (offset, size, kind) = match args.partition {
            Some(index) => {
                let (start, size) = partition_window(&map, index)?;
                log_verbose!("probing partition {index}: {size} bytes at {start:#x}");
                (start, size, DeviceKind::Partition)
            }
            None => (0, target.disk_size, target.kind),
        };
        Ok(Self {
            map,
            offset,
            size,
            kind,
        })
    }
}

fn probe_options(args: &TargetArgs) -> ZfsProbeOptions {
    let mut opts = ZfsProbeOptions::new();
    if args.no_pt_check {
        opts = opts.no_pt_check();
    }
    opts
}

fn print_match(m: &ZfsMatch, values: &ProbeValues, base: u64) {
    log_normal!(
        "{} ZFS label {} found",
        "✔".green(),
        m.label_index.to_string().bold()
    );
    if let Some(label) = &values.label {
        log_normal!("  LABEL={label}");
    }
    if let Some((_, uuid)) = &values.primary_id {
        log_normal!("  UUID={uuid}");
    }
    if let Some(sub) = &values.secondary_id {
        log_normal!("  UUID_SUB={sub}");
    }
    if let Some(version) = &values.version {
        log_normal!("  VERSION={version}");
    }
    if let Some(bs) = values.block_size {
        log_normal!("  BLOCK_SIZE={bs}");
    }
    match m.state() {
        Some(state) => log_normal!("  STATE={state}"),
        None => log_normal!("  STATE=?"),
    }
    log_normal!("  TXG={}", m.vitals.txg);
    if let Some((offset, magic)) = &values.signature {
        let hex: String = magic.iter().map(|b| format!("{b:02x}")).collect();
        log_normal!("  SBMAGIC_OFFSET={:#x}", base + offset);
        log_normal!("  SBMAGIC={hex}");
    }
}

fn run_probe(args: TargetArgs, full_scan: bool) -> anyhow::Result<()> {
    let mut target = Target::open(&args.path, false)?;
    let scope = ProbeScope::resolve(&mut target, &args)?;

    let mut opts = probe_options(&args);
    if full_scan {
        opts = opts.full_scan();
    }

    let mut io = StdRimIO::new_with_offset(&mut target.file, scope.offset);
    let mut dev = DeviceView::new(&mut io, scope.size, scope.kind).with_partitions(&scope.map);
    let mut values = ProbeValues::default();

    match probe_zfs(&mut dev, &mut values, &opts) {
        Some(m) => print_match(&m, &values, scope.offset),
        None => log_normal!("{} no ZFS label on {}", "✘".red(), args.path.display()),
    }
    Ok(())
}

fn run_wipe(args: TargetArgs, dry_run: bool) -> anyhow::Result<()> {
    let mut target = Target::open(&args.path, !dry_run)?;
    let scope = ProbeScope::resolve(&mut target, &args)?;
    let opts = probe_options(&args);

    let mut io = StdRimIO::new_with_offset(&mut target.file, scope.offset);
    let mut dev = DeviceView::new(&mut io, scope.size, scope.kind).with_partitions(&scope.map);

    if dry_run {
        log_normal!("Dry run mode: no data will be written.");
        let labels = confirmed_labels(&mut dev, &opts);
        if labels.is_empty() {
            log_normal!("{} nothing to wipe", "✘".red());
        }
        for m in labels {
            log_normal!(
                "would wipe {} bytes at {:#x} (label {}, {})",
                ZFS_SIGNATURE_SIZE,
                scope.offset + m.window_offset,
                m.label_index,
                m.state().map(PoolState::as_str).unwrap_or("?")
            );
        }
        return Ok(());
    }

    let wiped = wipe_signatures(&mut dev, &opts)
        .with_context(|| format!("Failed to wipe {}", args.path.display()))?;
    for offset in &wiped {
        log_verbose!("wiped {} bytes at {:#x}", ZFS_SIGNATURE_SIZE, scope.offset + offset);
    }
    if wiped.is_empty() {
        log_normal!("{} nothing to wipe", "✘".red());
    } else {
        log_normal!(
            "{} {} ZFS signature(s) erased on {}",
            "✔".green(),
            wiped.len(),
            args.path.display()
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Probe { target, full_scan } => run_probe(target, full_scan),
        Commands::Wipe { target, dry_run } => run_wipe(target, dry_run),
    }
}
