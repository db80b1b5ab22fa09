use std::io;

use anyhow::anyhow;
use clap::Parser;
use prompt_grader::{config::load_config, BatchSummary, GraderBuilder};
use tokio_util::sync::CancellationToken;

use crate::args::CliArgs;
use crate::input::read_prompts;
use crate::logging::init_logging;
use crate::output::{write_rows, write_summary};

pub async fn run() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let loaded = load_config(args.config.clone())?;
    let mut config = loaded.config;
    args.apply_overrides(&mut config);
    config.validate()?;
    let _logger = init_logging(&config.logging)?;
    if !loaded.config_exists {
        log::debug!("no config at {}, using defaults", loaded.path.display());
    }

    let prompts = read_prompts(args.input.as_deref())?;
    if prompts.is_empty() {
        log::warn!("no prompts to grade");
        return Ok(());
    }

    let api_key = args.api_key(&config).ok_or_else(|| {
        anyhow!(
            "no API key: pass --api-key or set {}",
            config.provider.api_key_env
        )
    })?;

    let cancel = CancellationToken::new();
    watch_interrupt(cancel.clone());

    let evaluator = GraderBuilder::from_config(&config)
        .api_key(api_key)
        .cancellation(cancel)
        .build()?;

    log::info!(
        "grading {} prompts with {} ({} mode)",
        prompts.len(),
        evaluator.invoker().model(),
        if args.batched { "batched" } else { "parallel" }
    );
    let grades = if args.batched {
        evaluator.evaluate_batched(&prompts).await
    } else {
        evaluator.evaluate(&prompts).await
    };

    write_rows(&mut io::stdout().lock(), &prompts, &grades)?;
    if args.summary {
        let summary = BatchSummary::from_grades(&grades);
        write_summary(
            &mut io::stderr().lock(),
            &summary,
            evaluator.invoker().cache().stats(),
        )?;
    }
    Ok(())
}

/// Exit status used when a second Ctrl-C aborts the run.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// Stop submitting rows and let running ones finish
    Drain,
    Abort,
}

fn on_interrupt(cancel: &CancellationToken) -> Interrupt {
    if cancel.is_cancelled() {
        return Interrupt::Abort;
    }
    cancel.cancel();
    Interrupt::Drain
}

/// First Ctrl-C stops submitting rows; running rows still finish. A second
/// Ctrl-C exits immediately.
fn watch_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match on_interrupt(&cancel) {
                Interrupt::Drain => log::warn!(
                    "interrupted, finishing rows already in flight (Ctrl-C again to abort)"
                ),
                Interrupt::Abort => {
                    log::error!("interrupted again, aborting");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        }
    });
}
