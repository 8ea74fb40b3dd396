use std::io::IsTerminal;

use clap::Parser;
use color_eyre::eyre::{eyre, Report};
use color_eyre::Section;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};
use tokio_util::sync::CancellationToken;

use dl_cli::cli::{Cli, Commands, DownArgs, StatusArgs, UpArgs};
use dl_cli::output;
use dl_core::models::{DevConfig, SessionPolicy};
use dl_core::services::config_loader;
use dl_core::services::orchestrator::{Collaborators, Orchestrator};
use dl_core::services::status::StatusReporter;
use dl_core::OrchestratorError;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Held for the whole run so buffered log lines are flushed on exit.
    let _guard = setup_logging(&cli);

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config_loader::find_config(&std::env::current_dir()?),
    };
    let config = config_loader::load(&config_path).map_err(into_report)?;
    tracing::debug!(path = %config_path.display(), session = %config.session, "config_loaded");

    match cli.command {
        Commands::Up(args) => up(config, args).await,
        Commands::Down(args) => down(config, args).await,
        Commands::Status(args) => status(config, args).await,
    }
}

/// `--debug` sends everything to `.devloop-debug.log` in the current
/// directory; otherwise warnings (more with `-v`) go to stderr.
fn setup_logging(cli: &Cli) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    if cli.debug {
        let file_appender = tracing_appender::rolling::never(".", ".devloop-debug.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .with_ansi(false)
            .init();
        return Some(guard);
    }

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
    None
}

/// Attach the remediation hint so the operator sees what to do next.
fn into_report(error: OrchestratorError) -> Report {
    let hint = error.remediation();
    let report = Report::new(error);
    match hint {
        Some(hint) => report.suggestion(hint),
        None => report,
    }
}

fn interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

async fn session_policy(
    orchestrator: &Orchestrator,
    args: &UpArgs,
) -> color_eyre::Result<SessionPolicy> {
    if args.reuse {
        return Ok(SessionPolicy::Reuse);
    }
    if !orchestrator.session_exists().await.map_err(into_report)? {
        return Ok(SessionPolicy::Fail);
    }

    let session = &orchestrator.config().session;
    if args.recreate {
        if args.yes || !interactive() {
            return Ok(SessionPolicy::Recreate);
        }
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Destroy session '{session}' and start again?"))
            .default(false)
            .interact()?;
        return Ok(if confirmed {
            SessionPolicy::Recreate
        } else {
            SessionPolicy::Fail
        });
    }
    if !interactive() {
        return Ok(SessionPolicy::Fail);
    }

    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Session '{session}' is already running"))
        .items(&["Reuse it", "Recreate it", "Abort"])
        .default(0)
        .interact()?;
    Ok(match choice {
        0 => SessionPolicy::Reuse,
        1 => SessionPolicy::Recreate,
        _ => SessionPolicy::Fail,
    })
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt_received");
            token.cancel();
        }
    });
}

async fn up(config: DevConfig, args: UpArgs) -> color_eyre::Result<()> {
    let mut orchestrator = Orchestrator::new(config, Collaborators::live()).map_err(into_report)?;
    let policy = session_policy(&orchestrator, &args).await?;

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let report = orchestrator
        .up(policy, &cancel)
        .await
        .map_err(into_report)?;
    print!("{}", output::render_up(&report, orchestrator.config()));

    if args.attach {
        orchestrator.attach().await.map_err(into_report)?;
    }
    Ok(())
}

async fn down(config: DevConfig, args: DownArgs) -> color_eyre::Result<()> {
    let session = config.session.clone();
    let mut cleanup = args.cleanup;
    if cleanup && !args.yes {
        if !interactive() {
            return Err(eyre!("--cleanup needs confirmation")
                .suggestion("re-run with --yes to clean up without a prompt"));
        }
        cleanup = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Also remove cluster-side objects and leftover tool processes?")
            .default(false)
            .interact()?;
    }

    let mut orchestrator = Orchestrator::new(config, Collaborators::live()).map_err(into_report)?;
    let report = orchestrator.down(cleanup).await.map_err(into_report)?;
    print!("{}", output::render_down(&report, &session));
    Ok(())
}

async fn status(config: DevConfig, args: StatusArgs) -> color_eyre::Result<()> {
    let reporter = StatusReporter::new(config, Collaborators::live()).map_err(into_report)?;
    let snapshot = reporter.report().await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", output::render_status(&snapshot));
    }
    Ok(())
}
