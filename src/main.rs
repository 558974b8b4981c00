// Copyright 2026 cest-mrf-seq Contributors
// SPDX-License-Identifier: Apache-2.0

//! CEST-MRF sequence generator CLI
//!
//! # Usage
//!
//! ```bash
//! # Write a Pulseq protocol from a definition set
//! cest-mrf-seq generate --definitions defs.yaml --output acq_protocol.seq
//!
//! # Same, from a ParaVision schedule file
//! cest-mrf-seq generate --schedule fp_schedule.txt --b0 9.4 --output acq_protocol.seq
//!
//! # Check definitions without writing anything
//! cest-mrf-seq validate --definitions defs.yaml
//!
//! # Per-measurement overview
//! cest-mrf-seq summary --definitions defs.yaml
//!
//! # Show effective configuration
//! cest-mrf-seq config
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cest_mrf_seq::config::{Config, OutputFormat};
use cest_mrf_seq::emit::emitter_for;
use cest_mrf_seq::schedule::{MrfSchedule, ScheduleParams};
use cest_mrf_seq::{
    BlockSequenceAssembler, Error, GeneratedSequence, Result, SequenceDefinitionSet,
    SequenceDefinitions, VERSION,
};

/// CEST-MRF spin-lock sequence generator
#[derive(Parser)]
#[command(name = "cest-mrf-seq")]
#[command(author = "cest-mrf-seq Contributors")]
#[command(version = VERSION)]
#[command(about = "Generate CEST-MRF saturation and spin-lock pulse sequences")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a protocol file
    Generate {
        #[command(flatten)]
        input: InputArgs,

        /// Output protocol file
        #[arg(short, long)]
        output: PathBuf,

        /// Output format (pulseq, json); defaults to the file extension
        #[arg(long)]
        format: Option<String>,
    },

    /// Validate definitions by assembling without writing
    Validate {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Print a per-measurement summary
    Summary {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Show effective configuration
    Config,
}

#[derive(Args)]
struct InputArgs {
    /// Definition set (YAML, or JSON by extension)
    #[arg(short, long, conflicts_with = "schedule", required_unless_present = "schedule")]
    definitions: Option<PathBuf>,

    /// ParaVision MRF schedule file
    #[arg(long)]
    schedule: Option<PathBuf>,

    /// Main field in tesla (schedule input)
    #[arg(long)]
    b0: Option<f64>,

    /// Sub-pulses per saturation period (schedule input)
    #[arg(long, default_value_t = 1)]
    n_pulses: usize,

    /// Inter-pulse delay in seconds (schedule input)
    #[arg(long, default_value_t = 0.0)]
    td: f64,

    /// Derive zero spin-lock tip angles from B1 and offset (schedule input)
    #[arg(long)]
    auto_sl_tip: bool,

    /// Sequence identifier; derived from the definitions when omitted
    #[arg(long)]
    seq_id: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    // Initialize logging
    init_logging(&config.logging.level, &config.logging.format);

    match cli.command {
        Commands::Generate {
            input,
            output,
            format,
        } => {
            if input.auto_sl_tip {
                config.generation.auto_spin_lock_tip = true;
            }
            config.validate()?;

            let format = match format {
                Some(f) => f.parse()?,
                None => OutputFormat::from_path(&output).unwrap_or(config.output.format),
            };

            let definitions = load_definitions(&input, &config)?;
            let sequence = BlockSequenceAssembler::from_config(&config).assemble(&definitions)?;

            emitter_for(format, &config.output).emit_to_path(&sequence, &output)?;

            info!(
                version = VERSION,
                seq_id = %sequence.seq_id(),
                output = %output.display(),
                %format,
                "Protocol generated"
            );
            println!(
                "Wrote {} blocks ({} measurements, {:.3} s) to {}",
                sequence.len(),
                sequence.num_measurements(),
                sequence.total_duration_s(),
                output.display()
            );
        }

        Commands::Validate { input } => {
            if input.auto_sl_tip {
                config.generation.auto_spin_lock_tip = true;
            }
            let result = config.validate().and_then(|()| {
                let definitions = load_definitions(&input, &config)?;
                BlockSequenceAssembler::from_config(&config).assemble(&definitions)
            });
            match result {
                Ok(sequence) => {
                    println!(
                        "Definitions are valid: {} measurements, {} blocks",
                        sequence.num_measurements(),
                        sequence.len()
                    );
                }
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Summary { input } => {
            if input.auto_sl_tip {
                config.generation.auto_spin_lock_tip = true;
            }
            config.validate()?;
            let definitions = load_definitions(&input, &config)?;
            let sequence = BlockSequenceAssembler::from_config(&config).assemble(&definitions)?;
            print_summary(&definitions, &sequence);
        }

        Commands::Config => {
            // Show effective configuration
            println!("{}", serde_yaml::to_string(&config)?);
        }
    }

    Ok(())
}

/// Initialize logging with tracing.
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

/// Read definitions from a definition set or a schedule file and validate them.
fn load_definitions(input: &InputArgs, config: &Config) -> Result<SequenceDefinitions> {
    let mut set = match (&input.definitions, &input.schedule) {
        (Some(path), _) => {
            debug!(path = %path.display(), "Loading definition set");
            SequenceDefinitionSet::from_path(path)?
        }
        (None, Some(path)) => {
            let b0_t = input
                .b0
                .ok_or_else(|| Error::Config("--b0 is required with --schedule".into()))?;
            debug!(path = %path.display(), b0_t, "Loading MRF schedule");
            let mut schedule = MrfSchedule::from_path(path)?;
            if config.generation.auto_spin_lock_tip {
                schedule = schedule.with_auto_spin_lock_tip(b0_t, config.scan.gamma_hz);
            }
            schedule.into_definition_set(&ScheduleParams {
                n_pulses: input.n_pulses,
                td_s: input.td,
                b0_t,
            })
        }
        (None, None) => {
            return Err(Error::Config(
                "either --definitions or --schedule is required".into(),
            ))
        }
    };

    if let Some(id) = &input.seq_id {
        set.seq_id = Some(id.clone());
    }

    SequenceDefinitions::from_set(set, &config.scan)
}

fn print_summary(definitions: &SequenceDefinitions, sequence: &GeneratedSequence) {
    println!("Sequence {}", sequence.seq_id());
    println!(
        "  B0 {} T, gamma {} Hz/uT, {} measurements, {} blocks, {} RF pulses, {:.3} s",
        sequence.b0_t(),
        sequence.gamma_hz(),
        sequence.num_measurements(),
        sequence.len(),
        sequence.rf_count(),
        sequence.total_duration_s()
    );
    println!();
    println!(
        "{:>5}  {:<16} {:>9} {:>8} {:>9} {:>7}",
        "meas", "scheme", "offset", "B1", "tp", "blocks"
    );
    for (m, scheme) in definitions.measurements().iter().zip(sequence.schemes()) {
        println!(
            "{:>5}  {:<16} {:>9.3} {:>8.3} {:>9.4} {:>7}",
            m.index,
            format!("{:?}", scheme),
            m.offset_ppm,
            m.b1_ut,
            m.tp_s,
            sequence.measurement_blocks(m.index).len()
        );
    }
}
