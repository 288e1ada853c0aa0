//! `rsim-cli`: replays a command-stream fixture through
//! [`rsim_orchestrator::PipelineOrchestrator`] and reports per-stage
//! counters, mirroring `gs-twin-cli`'s role for its own digital twin
//! (load a fixture, drive the core, print what happened).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rsim_orchestrator::config::OrchestratorConfig;
use rsim_orchestrator::{ExitSignal, PipelineOrchestrator};
use rsim_registers::Command;
use serde::Deserialize;

/// Replay a GPU front-end command stream and print fragment/cycle counters.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a JSON command-stream fixture.
    stream: PathBuf,

    /// Display width in pixels, used to size the pixel mapper and HZ buffer.
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Display height in pixels.
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Upper bound on cycles advanced per command, so a malformed stream
    /// can't hang the CLI.
    #[arg(long, default_value_t = 1_000_000)]
    max_cycles_per_command: u64,
}

/// One named memory region bound before the command stream runs, in the
/// manner the out-of-scope GAL/HAL layer would have placed vertex/index
/// buffers (spec GLOSSARY "Memory descriptor").
#[derive(Debug, Deserialize)]
struct MemoryBinding {
    address: u32,
    bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct CommandStreamFile {
    #[serde(default)]
    memory: Vec<MemoryBinding>,
    commands: Vec<Command>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let raw = fs::read_to_string(&args.stream)
        .with_context(|| format!("reading command stream {}", args.stream.display()))?;
    let fixture: CommandStreamFile =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", args.stream.display()))?;

    let mut orch = PipelineOrchestrator::new(OrchestratorConfig::defaults(args.width, args.height))
        .context("constructing orchestrator")?;
    for binding in fixture.memory {
        orch.bind_memory(binding.address, binding.bytes);
    }

    let mut total_cycles = 0u64;
    let mut total_fragments = 0usize;
    let mut draws = 0u32;

    for (index, command) in fixture.commands.into_iter().enumerate() {
        let is_draw = matches!(command, Command::Draw);
        orch.submit_command(command).with_context(|| format!("command #{index}"))?;

        let mut spun = 0u64;
        while orch.state() != rsim_orchestrator::PipelineState::Ready && spun < args.max_cycles_per_command {
            orch.advance();
            spun += 1;
            total_cycles += 1;
            for signal in orch.take_exit_signals() {
                if signal == ExitSignal::RastEnd {
                    info!("command #{index}: RAST_END after {spun} cycles");
                }
            }
        }
        let fragments = orch
            .take_output()
            .iter()
            .flat_map(|s| s.fragments.iter().zip(s.culled.iter()))
            .filter(|(f, culled)| f.inside && !**culled)
            .count();
        total_fragments += fragments;
        if is_draw {
            draws += 1;
            info!("draw #{draws}: {fragments} fragments in {spun} cycles");
        }
    }

    println!(
        "{draws} draws, {total_fragments} fragments, {total_cycles} cycles (orchestrator cycle counter: {})",
        orch.cycle()
    );
    Ok(())
}
