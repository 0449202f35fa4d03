// SPDX-License-Identifier: AGPL-3.0-only

//! Run a lattice from a JSON spec and print observables as JSON.
//!
//! Reads a `RuntimeSpec` (path argument or stdin), runs the β schedule on
//! the CPU, adds checkerboard sweeps on the GPU when one is available, then
//! measures the Wilson grid, Creutz ratios, the Polyakov loop and an
//! optional temperature scan.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release --bin lattice_scan -- run.json
//! echo '{"lattice":{"width":6,"height":6},"update":{"betaSchedule":[1.65]}}' \
//!   | cargo run --release --bin lattice_scan -- --checkerboard=2 --cpu-only
//! ```

use std::io::Read;
use std::process;

use log::{error, info, warn};
use serde::Serialize;

use su3_lattice::config::RuntimeSpec;
use su3_lattice::error::LatticeResult;
use su3_lattice::lattice::gauge::Axis;
use su3_lattice::lattice::gpu_checkerboard::GpuCheckerboard;
use su3_lattice::lattice::observables::{
    average_plaquette, creutz_ratio, measure_polyakov_loop, measure_wilson_loop_grid,
    PolyakovMeasurement, WilsonLoopTable,
};
use su3_lattice::lattice::runtime::{
    initialize_qcd_runtime, AccumulatorSnapshot, ScanPoint, ScanSchedule, SweepBackendReport,
};
use su3_lattice::lattice::update::UpdateSummary;

struct CliArgs {
    spec_path: Option<String>,
    checkerboard_sweeps: usize,
    cpu_only: bool,
}

fn parse_args() -> CliArgs {
    let mut args = CliArgs {
        spec_path: None,
        checkerboard_sweeps: 1,
        cpu_only: false,
    };
    for arg in std::env::args().skip(1) {
        if let Some(val) = arg.strip_prefix("--checkerboard=") {
            match val.parse() {
                Ok(n) => args.checkerboard_sweeps = n,
                Err(_) => warn!("ignoring --checkerboard={val}"),
            }
        } else if arg == "--cpu-only" {
            args.cpu_only = true;
        } else if arg.starts_with("--") {
            warn!("unknown flag {arg}");
        } else {
            args.spec_path = Some(arg);
        }
    }
    args
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreutzEntry {
    first: Axis,
    second: Axis,
    extent: usize,
    value: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanOutput {
    adapter: Option<String>,
    summary: UpdateSummary,
    checkerboard: Vec<SweepBackendReport>,
    plaquette: f64,
    polyakov: Option<PolyakovMeasurement>,
    wilson: WilsonLoopTable,
    creutz: Vec<CreutzEntry>,
    scan: Vec<ScanPoint>,
    accumulator: AccumulatorSnapshot,
}

fn read_spec(path: Option<&str>) -> LatticeResult<RuntimeSpec> {
    match path {
        Some(p) => RuntimeSpec::from_path(p),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            RuntimeSpec::from_json_str(&text)
        }
    }
}

fn run(args: &CliArgs) -> LatticeResult<ScanOutput> {
    let spec = read_spec(args.spec_path.as_deref())?;
    let mut runtime = initialize_qcd_runtime(&spec)?;
    let summary = runtime.advance()?;
    info!(
        "schedule done: {} sweeps, final β = {:.4}",
        summary.total_sweeps, summary.final_beta
    );

    let mut checkerboard = Vec::new();
    let mut adapter = None;
    if args.checkerboard_sweeps > 0 {
        let rt = tokio::runtime::Runtime::new()?;
        let kernel = if args.cpu_only {
            None
        } else {
            rt.block_on(GpuCheckerboard::acquire())
        };
        match &kernel {
            Some(k) => {
                info!("checkerboard sweeps on {}", k.adapter_name());
                adapter = Some(k.adapter_name().to_string());
            }
            None => info!("checkerboard sweeps on CPU"),
        }
        for _ in 0..args.checkerboard_sweeps {
            let report =
                rt.block_on(runtime.checkerboard_sweep(kernel.as_ref(), summary.final_beta));
            checkerboard.push(report);
        }
    }

    let scan = match &spec.scan {
        Some(opts) => {
            let schedule = ScanSchedule::from_options(opts);
            runtime.run_temperature_scan(&schedule, opts.axis.unwrap_or(Axis::T))?
        }
        None => Vec::new(),
    };

    let lattice = runtime.lattice();
    let max_extent = spec.max_loop_extent();
    let wilson = measure_wilson_loop_grid(lattice, max_extent, max_extent, &[])?;
    let mut creutz = Vec::new();
    for entry in wilson.entries() {
        if entry.extent_x == entry.extent_y && entry.extent_x > 0 {
            creutz.push(CreutzEntry {
                first: entry.plane.first,
                second: entry.plane.second,
                extent: entry.extent_x,
                value: creutz_ratio(&wilson, entry.extent_x, entry.extent_y, entry.plane),
            });
        }
    }

    Ok(ScanOutput {
        adapter,
        summary,
        checkerboard,
        plaquette: average_plaquette(lattice),
        polyakov: measure_polyakov_loop(lattice, Axis::T).ok(),
        wilson,
        creutz,
        scan,
        accumulator: runtime.accumulator().snapshot(),
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = parse_args();
    let output = match run(&args) {
        Ok(output) => output,
        Err(e) => {
            error!("lattice_scan: {e}");
            process::exit(1);
        }
    };
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!("lattice_scan: {e}");
            process::exit(1);
        }
    }
}
