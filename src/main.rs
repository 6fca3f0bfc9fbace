//! `daikin-cli`: control a Daikin BRP069B41 adapter from the shell.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use daikin_legacy::{
    ControlCommand, DaikinClient, Error, FanDirection, FanRate, Fields, MessageLogMode, Mode,
    Power, Result, Settings, ShutdownOutcome, ShutdownPolicy, ShutdownState, StatusSnapshot,
    UnreachablePolicy, VerifiedShutdown, acknowledgement, is_acknowledged,
    new_installation_uuid,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXAMPLES: &str = "\
EXAMPLES:
  Set Fan Speed:        daikin-cli speed auto (Options: auto, eco, 1, 2, 3, 4, 5)
  Set Airflow:          daikin-cli dir 3d     (Options: off, vertical, horizontal, 3d)
  Verified Shutdown:    daikin-cli force-off  (Retries until OFF)";

/// CLI for Daikin BRP069B41 matching official app terminology.
#[derive(Parser, Debug)]
#[command(name = "daikin-cli", after_help = EXAMPLES)]
struct Cli {
    /// Path to settings file (default: daikin.conf beside the executable).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Status output format.
    #[arg(long, short = 'o', global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Fail on unreachable device or unacknowledged writes.
    #[arg(long, global = true)]
    strict: bool,

    /// Append every device exchange to this NDJSON file.
    #[arg(long, global = true)]
    message_log: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = MessageLogMode::Full)]
    message_log_mode: MessageLogMode,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show all current settings
    Status,
    /// Power ON
    On,
    /// Power OFF (standard)
    Off,
    /// Attempt shutdown with verification and retries
    ForceOff,
    /// Set fan speed
    Speed {
        #[arg(value_enum)]
        val: FanRate,
    },
    /// Set airflow swing
    Dir {
        #[arg(value_enum)]
        val: FanDirection,
    },
    /// Set to COOL mode
    Cool {
        /// Target temperature
        temp: Option<String>,
    },
    /// Set to HEAT mode
    Heat {
        /// Target temperature
        temp: Option<String>,
    },
    /// Set to DRY mode
    Dry {
        /// Target temperature
        temp: Option<String>,
    },
    /// Set to FAN mode
    Fan {
        /// Target temperature
        temp: Option<String>,
    },
    /// Print a new installation UUID for MY_UUID
    Uuid,
}

#[derive(Debug, PartialEq)]
enum Action {
    Status,
    Write(ControlCommand),
    ForceOff,
    NewUuid,
}

impl Command {
    fn action(&self) -> Action {
        let mode_change = |mode: Mode, temp: &Option<String>| {
            let change = ControlCommand::new().mode(mode);
            match temp {
                Some(t) => change.target_temperature(t.as_str()),
                None => change,
            }
        };

        match self {
            Command::Status => Action::Status,
            Command::On => Action::Write(ControlCommand::new().power(Power::On)),
            Command::Off => Action::Write(ControlCommand::new().power(Power::Off)),
            Command::ForceOff => Action::ForceOff,
            Command::Speed { val } => Action::Write(ControlCommand::new().fan_rate(*val)),
            Command::Dir { val } => Action::Write(ControlCommand::new().fan_direction(*val)),
            Command::Cool { temp } => Action::Write(mode_change(Mode::Cool, temp)),
            Command::Heat { temp } => Action::Write(mode_change(Mode::Heat, temp)),
            Command::Dry { temp } => Action::Write(mode_change(Mode::Dry, temp)),
            Command::Fan { temp } => Action::Write(mode_change(Mode::Fan, temp)),
            Command::Uuid => Action::NewUuid,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let Some(command) = &cli.command else {
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    // Setup helper; runs before a config exists.
    let action = command.action();
    if action == Action::NewUuid {
        return print_new_uuid();
    }

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("ERROR: {e}");
            if e.is_config() {
                eprintln!("Setup REQUIRED: create 'daikin.conf' with IP_ADDRESS and MY_UUID.");
            }
            return ExitCode::FAILURE;
        }
    };

    let result = match build_client(&cli, &settings) {
        Ok(client) => run(&cli, action, &client).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_client(cli: &Cli, settings: &Settings) -> Result<DaikinClient> {
    let policy = if cli.strict {
        UnreachablePolicy::Surface
    } else {
        UnreachablePolicy::Empty
    };
    let mut builder = DaikinClient::builder(&settings.ip_address, &settings.uuid)
        .legacy_device_tls(true)
        .unreachable_policy(policy);
    if let Some(path) = &cli.message_log {
        builder = builder.message_log(cli.message_log_mode, path);
    }
    let client = builder.build()?;
    debug!(device = client.base_url(), strict = cli.strict, "client ready");
    Ok(client)
}

async fn run(cli: &Cli, action: Action, client: &DaikinClient) -> Result<ExitCode> {
    match action {
        Action::Status => {}
        Action::Write(change) => {
            let reply = client.write_control_info(&change).await?;
            check_write(&reply, cli.strict)?;
        }
        Action::ForceOff => return force_off(client).await,
        Action::NewUuid => return Ok(print_new_uuid()),
    }

    let status = client.status().await?;
    print_status(&status, cli.output)?;
    Ok(ExitCode::SUCCESS)
}

async fn force_off(client: &DaikinClient) -> Result<ExitCode> {
    let outcome = VerifiedShutdown::new(ShutdownPolicy::default())
        .on_transition(|state| match state {
            ShutdownState::Attempting { attempt } => {
                if *attempt > 1 {
                    println!("--- [RETRYING] Unit still reports ON ---");
                }
                println!("Shutdown Attempt {attempt}...");
            }
            ShutdownState::Verifying { .. } => {}
            ShutdownState::Succeeded { .. } => println!("--- [SUCCESS] Shutdown Verified ---"),
            ShutdownState::Failed { .. } => {
                println!("--- [RETRYING] Unit still reports ON ---");
                println!("--- [FAILURE] Could not verify shutdown ---");
            }
        })
        .run(client)
        .await?;

    Ok(ExitCode::from(shutdown_exit_status(outcome)))
}

fn shutdown_exit_status(outcome: ShutdownOutcome) -> u8 {
    match outcome {
        ShutdownOutcome::Verified { .. } => 0,
        ShutdownOutcome::Unverified { .. } => 1,
    }
}

/// A write without `ret=OK` is a warning, or an error under `--strict`.
fn check_write(reply: &Fields, strict: bool) -> Result<()> {
    if is_acknowledged(reply) {
        return Ok(());
    }
    let ret = acknowledgement(reply).unwrap_or("none").to_string();
    if strict {
        return Err(Error::NotAcknowledged(ret));
    }
    eprintln!("Warning: device did not acknowledge the write (ret={ret}); showing current status.");
    Ok(())
}

fn print_new_uuid() -> ExitCode {
    println!("{}", new_installation_uuid());
    ExitCode::SUCCESS
}

fn print_status(status: &StatusSnapshot, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Table => println!("\n{status}\n"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(status)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("daikin-cli").chain(args.iter().copied())).unwrap()
    }

    fn action(args: &[&str]) -> Action {
        parse(args).command.expect("subcommand").action()
    }

    #[test]
    fn no_subcommand_is_allowed() {
        assert!(parse(&[]).command.is_none());
    }

    #[test]
    fn power_commands() {
        assert_eq!(action(&["on"]), Action::Write(ControlCommand::new().power(Power::On)));
        assert_eq!(action(&["off"]), Action::Write(ControlCommand::new().power(Power::Off)));
        assert_eq!(action(&["force-off"]), Action::ForceOff);
        assert_eq!(action(&["status"]), Action::Status);
    }

    #[test]
    fn speed_names_map_to_rates() {
        assert_eq!(
            action(&["speed", "eco"]),
            Action::Write(ControlCommand::new().fan_rate(FanRate::Eco))
        );
        assert_eq!(
            action(&["speed", "3"]),
            Action::Write(ControlCommand::new().fan_rate(FanRate::Level3))
        );
        assert!(Cli::try_parse_from(["daikin-cli", "speed", "6"]).is_err());
    }

    #[test]
    fn dir_names_map_to_directions() {
        assert_eq!(
            action(&["dir", "3d"]),
            Action::Write(ControlCommand::new().fan_direction(FanDirection::ThreeD))
        );
        assert!(Cli::try_parse_from(["daikin-cli", "dir", "diagonal"]).is_err());
    }

    #[test]
    fn mode_with_and_without_temperature() {
        assert_eq!(
            action(&["cool", "23"]),
            Action::Write(ControlCommand::new().mode(Mode::Cool).target_temperature("23"))
        );
        assert_eq!(
            action(&["fan"]),
            Action::Write(ControlCommand::new().mode(Mode::Fan))
        );
    }

    #[test]
    fn global_flags() {
        let cli = parse(&["status", "--strict", "-o", "json", "--config", "/tmp/daikin.conf"]);
        assert!(cli.strict);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/daikin.conf")));
        assert_eq!(cli.message_log_mode, MessageLogMode::Full);
    }

    fn reply(body: &str) -> Fields {
        daikin_legacy::parse_response(body)
    }

    #[test]
    fn acknowledged_write_passes_in_any_mode() {
        assert!(check_write(&reply("ret=OK"), false).is_ok());
        assert!(check_write(&reply("ret=OK"), true).is_ok());
    }

    #[test]
    fn unacknowledged_write_warns_by_default() {
        assert!(check_write(&reply("ret=PARAM NG"), false).is_ok());
        assert!(check_write(&Fields::new(), false).is_ok());
    }

    #[test]
    fn unacknowledged_write_fails_under_strict() {
        let err = check_write(&reply("ret=PARAM NG"), true).unwrap_err();
        assert!(matches!(&err, Error::NotAcknowledged(ret) if ret == "PARAM NG"));
        assert!(err.to_string().contains("ret=PARAM NG"));

        let err = check_write(&Fields::new(), true).unwrap_err();
        assert!(matches!(&err, Error::NotAcknowledged(ret) if ret == "none"));
    }

    #[test]
    fn shutdown_outcome_sets_exit_status() {
        assert_eq!(shutdown_exit_status(ShutdownOutcome::Verified { attempts: 3 }), 0);
        assert_eq!(shutdown_exit_status(ShutdownOutcome::Unverified { attempts: 5 }), 1);
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
