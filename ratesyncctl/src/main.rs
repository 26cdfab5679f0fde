use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use ratesync_config::RuntimeConfig;
use ratesync_contracts::events::KeyPress;
use ratesync_core::{agent::hotkeys, protocol::StateSnapshot};
use ratesync_model::{PlaybackState, display_combo, format_speed};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::simulate::{SimulationPlan, SimulationReport, Step};

mod simulate;

#[derive(Parser)]
#[command(
    name = "ratesyncctl",
    version,
    about = "Inspect and exercise ratesync playback speed synchronization"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the settings and state records written on first run
    Defaults,

    /// Canonicalize a key press and show the action it is bound to
    Combo {
        /// Physical key identifier, e.g. KeyS or ArrowUp
        code: String,
        #[arg(long)]
        ctrl: bool,
        #[arg(long)]
        meta: bool,
        #[arg(long)]
        alt: bool,
        #[arg(long)]
        shift: bool,
    },

    /// Run a broker and several contexts in-process and drive the first one
    Simulate {
        /// Number of contexts
        #[arg(long, default_value_t = 3)]
        contexts: usize,

        /// Media elements per context
        #[arg(long, default_value_t = 2)]
        videos: usize,

        /// Comma separated steps: increase, decrease, toggle, set:<speed>
        #[arg(long, value_delimiter = ',', default_value = "increase")]
        actions: Vec<Step>,

        /// Seconds to wait for every context to converge on each step
        #[arg(long, default_value_t = 5)]
        timeout: u64,

        /// Print every message the hub delivered, in wire form
        #[arg(long)]
        trace: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, source) = RuntimeConfig::load_from_env()
        .context("failed to load ratesync configuration")?;
    config.validate().context("invalid ratesync configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded from {:?}", source);

    match cli.command {
        Command::Defaults => print_defaults(&config),
        Command::Combo {
            code,
            ctrl,
            meta,
            alt,
            shift,
        } => {
            let press = KeyPress {
                code,
                ctrl,
                meta,
                alt,
                shift,
                ..KeyPress::default()
            };
            print_combo(&config, &press);
            Ok(())
        }
        Command::Simulate {
            contexts,
            videos,
            actions,
            timeout,
            trace,
        } => {
            let plan = SimulationPlan {
                contexts,
                videos,
                steps: actions,
                timeout: Duration::from_secs(timeout),
            };
            let report = simulate::run(&config, &plan).await?;
            print_report(&report, trace)
        }
    }
}

fn print_defaults(config: &RuntimeConfig) -> Result<()> {
    let snapshot = StateSnapshot {
        settings: config.settings.clone(),
        state: PlaybackState::default(),
    };
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn print_combo(config: &RuntimeConfig, press: &KeyPress) {
    let combo = press.combo();
    println!("combo:   {}", combo.canonical());
    println!("display: {}", display_combo(&combo.canonical()));
    if combo.is_modifier_only() {
        println!("action:  none (modifier only)");
        return;
    }
    match hotkeys::decode(press, &config.settings.hotkeys) {
        Some(action) => println!("action:  {action}"),
        None => println!("action:  none"),
    }
}

fn print_report(report: &SimulationReport, trace: bool) -> Result<()> {
    if trace {
        for (context, message) in &report.deliveries {
            println!("{context} <- {message}");
        }
    }

    for context in &report.contexts {
        let rates: Vec<String> = context
            .media_rates
            .iter()
            .map(|rate| format_speed(*rate))
            .collect();
        println!(
            "{}  speed {}  last {}  media [{}]",
            context.id,
            format_speed(context.state.current_speed),
            format_speed(context.state.last_speed),
            rates.join(", ")
        );
    }
    println!(
        "broker        speed {}  last {}",
        format_speed(report.broker_state.current_speed),
        format_speed(report.broker_state.last_speed)
    );

    if !report.converged() {
        return Err(anyhow!(
            "contexts did not converge on {}",
            format_speed(report.expected.current_speed)
        ));
    }
    println!("converged on {}", format_speed(report.expected.current_speed));
    Ok(())
}
