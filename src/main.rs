//! fwdctl - iptables port forwarding manager
//!
//! Forwards traffic arriving on a host port to an internal address, for
//! example a VM behind a hypervisor:
//!
//! ```text
//!    +----------------------------+
//!    |              +-----------+ |
//!    |              |           | |
//!    |        +-----+:80  VM    | |
//!    |        |     |           | |
//!    =:3000<--+     +-----------+ |
//!    |         Hypervisor         |
//!    +----------------------------+
//! ```
//!
//! # Usage
//!
//! ```bash
//! fwdctl create -d 3000 -s 192.168.199.105 -p 80   # Forward lo:3000/tcp to the VM
//! fwdctl list                                      # Show managed forwards
//! fwdctl list -o json                              # Same, as JSON
//! fwdctl delete --id 1                             # Remove by list position
//! fwdctl apply -f rules.json                       # Create every rule in a file
//! fwdctl generate -o rules.json                    # Write a rules file template
//! ```

use clap::{Parser, Subcommand};
use fwdctl::config::{self, Config, OutputFormat};
use fwdctl::core::error::IptablesErrorPattern;
use fwdctl::core::forward::{Forward, ForwardManager};
use fwdctl::core::iptables::IptablesRunner;
use fwdctl::core::rules_file::{self, RulesFile};
use fwdctl::{Error, Result, Rule, audit, utils, validators};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

shadow_rs::shadow!(build);

#[derive(Parser)]
#[command(name = "fwdctl", version)]
#[command(about = "Manage iptables DNAT port forwards", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// iptables binary to run (overrides config and FWDCTL_IPTABLES_COMMAND)
    #[arg(long, global = true, value_name = "PATH")]
    iptables: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a forward
    #[command(visible_alias = "add")]
    Create {
        /// Interface the traffic arrives on
        #[arg(short = 'i', long = "interface", default_value = "lo")]
        iface: String,
        /// Protocol
        #[arg(short = 'P', long = "proto", default_value = "tcp")]
        proto: String,
        /// Port exposed on the host
        #[arg(short = 'd', long = "destination-port")]
        dport: u32,
        /// Internal address traffic is forwarded to
        #[arg(short = 's', long = "source-address")]
        saddr: String,
        /// Internal port traffic is forwarded to
        #[arg(short = 'p', long = "source-port")]
        sport: u32,
    },
    /// Delete a forward by id or by its fields
    #[command(visible_alias = "rm")]
    Delete {
        /// Id shown by `fwdctl list`
        #[arg(long, conflicts_with_all = ["dport", "saddr", "sport"])]
        id: Option<usize>,
        /// Interface the traffic arrives on
        #[arg(short = 'i', long = "interface", default_value = "lo")]
        iface: String,
        /// Protocol
        #[arg(short = 'P', long = "proto", default_value = "tcp")]
        proto: String,
        /// Port exposed on the host
        #[arg(short = 'd', long = "destination-port", required_unless_present = "id")]
        dport: Option<u32>,
        /// Internal address traffic is forwarded to
        #[arg(short = 's', long = "source-address", required_unless_present = "id")]
        saddr: Option<String>,
        /// Internal port traffic is forwarded to
        #[arg(short = 'p', long = "source-port", required_unless_present = "id")]
        sport: Option<u32>,
    },
    /// List forwards created by fwdctl
    #[command(visible_alias = "ls")]
    List {
        /// Output format (table or json)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Create every forward listed in a rules file
    Apply {
        /// Rules file (defaults to the configured rules file)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Print or write a rules file template
    Generate {
        /// Write the template here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show recent audit log entries
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Show or initialize the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show build information
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init,
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = utils::ensure_dirs() {
        tracing::warn!("Cannot create fwdctl directories: {e}");
    }

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    match runtime.block_on(handle_cli(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_error(error: &Error) {
    eprintln!("Error: {error}");
    if let Error::Iptables { message, .. } = error {
        let translation = IptablesErrorPattern::match_error(message);
        eprintln!("{}", translation.user_message);
        for suggestion in translation.suggestions {
            eprintln!("  • {suggestion}");
        }
    }
}

async fn resolve_config(cli: &Cli) -> Config {
    let mut config = config::load_config().await.with_env_overrides();
    if let Some(command) = &cli.iptables {
        config.iptables_command.clone_from(command);
    }
    config
}

async fn handle_cli(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli).await;
    tracing::debug!(?config, "resolved configuration");
    let manager = ForwardManager::new(IptablesRunner::new(&config.iptables_command));

    match cli.command {
        Commands::Create {
            iface,
            proto,
            dport,
            saddr,
            sport,
        } => {
            let rule = Rule::new(iface, proto, dport, saddr, sport);
            if config.check_interface {
                validators::validate_interface_exists(&rule.iface)?;
            }
            let result = manager.create(&rule).await;
            if config.audit_log {
                audit::log_create(&rule, &result).await;
            }
            println!("✓ Created forward {}", result?);
        }
        Commands::Delete {
            id,
            iface,
            proto,
            dport,
            saddr,
            sport,
        } => {
            let (target, result) = if let Some(id) = id {
                (serde_json::json!({ "id": id }), manager.delete_by_id(id).await)
            } else {
                let (Some(dport), Some(saddr), Some(sport)) = (dport, saddr, sport) else {
                    return Err(Error::validation(
                        "delete",
                        "either --id or --destination-port, --source-address and --source-port are required",
                    ));
                };
                let rule = Rule::new(iface, proto, dport, saddr, sport);
                (serde_json::json!({ "rule": rule }), manager.delete(&rule).await)
            };
            if config.audit_log {
                audit::log_delete(target, &result).await;
            }
            println!("✓ Deleted forward {}", result?);
        }
        Commands::List { output } => {
            let format = match output {
                Some(name) => OutputFormat::from_str(&name).map_err(|_| {
                    Error::validation(
                        "output",
                        format!("unknown format '{name}' (use table or json)"),
                    )
                })?,
                None => config.output_format,
            };
            let forwards = manager.list().await?;
            match format {
                OutputFormat::Table => print_table(&forwards),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&forwards)?),
            }
        }
        Commands::Apply { file } => {
            let path = file.or_else(|| config.rules_path()).ok_or_else(|| {
                Error::RulesFile("no rules file given and no data directory available".into())
            })?;
            let rules = rules_file::load_rules_file(&path).await?.rules;
            let result = manager.apply(&rules).await;
            if config.audit_log {
                let created = result.as_ref().ok().map(|s| s.created);
                let error = result.as_ref().err().map(ToString::to_string);
                audit::log_apply(rules.len(), created, error).await;
            }
            let summary = result?;
            println!(
                "✓ Applied {}: {} created, {} already present",
                path.display(),
                summary.created,
                summary.skipped
            );
        }
        Commands::Generate { output } => {
            let template = RulesFile::template();
            if let Some(path) = output {
                rules_file::save_rules_file(&path, &template)?;
                println!("✓ Wrote rules template to {}", path.display());
            } else {
                println!("{}", template.to_json()?);
            }
        }
        Commands::History { count } => {
            let audit = audit::AuditLog::new()?;
            let events = match audit.read_recent(count).await {
                Ok(events) => events,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            if events.is_empty() {
                println!("No audit events in {}", audit.path().display());
            }
            for event in events {
                println!(
                    "{}  {:<14}  {:<6}  {}{}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    event.event_type,
                    if event.success { "ok" } else { "FAILED" },
                    event.details,
                    event.error.map(|e| format!("  ({e})")).unwrap_or_default()
                );
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => println!("{}", serde_json::to_string_pretty(&config)?),
            ConfigAction::Init => {
                let path = config::save_config(&Config::default()).await?;
                println!("✓ Wrote default configuration to {}", path.display());
            }
        },
        Commands::Version => {
            println!("fwdctl {}", build::PKG_VERSION);
            println!(
                "commit: {}{}",
                build::SHORT_COMMIT,
                if build::GIT_CLEAN { "" } else { " (dirty)" }
            );
            println!("built: {}", build::BUILD_TIME);
            println!("rustc: {}", build::RUST_VERSION);
        }
    }
    Ok(())
}

fn print_table(forwards: &[Forward]) {
    if forwards.is_empty() {
        println!("No forwards managed by fwdctl.");
        return;
    }
    println!(
        "{:<4} {:<16} {:<6} {:<9} {:<39} {}",
        "ID", "INTERFACE", "PROTO", "EXT PORT", "ADDRESS", "PORT"
    );
    for Forward { id, rule } in forwards {
        println!(
            "{:<4} {:<16} {:<6} {:<9} {:<39} {}",
            id, rule.iface, rule.proto, rule.dport, rule.saddr, rule.sport
        );
    }
}
