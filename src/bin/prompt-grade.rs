#[path = "prompt-grade/app.rs"]
mod app;
#[path = "prompt-grade/args.rs"]
mod args;
#[path = "prompt-grade/input.rs"]
mod input;
#[path = "prompt-grade/logging.rs"]
mod logging;
#[path = "prompt-grade/output.rs"]
mod output;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await
}
