use anyhow::{Context, Result, bail};
use chunked_downloader::{
    Args, BarObserver, ConsoleObserver, DownloadConfig, DownloadTask, ProgressObserver,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chunked_downloader=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    println!(
        "URL:\t\t\t{}\nThreads:\t\t{}\nProgress:\t\t{}",
        args.url, args.threads, args.progress
    );

    let config = DownloadConfig::from_args(&args).context("Invalid configuration")?;
    let output = config.output.clone();
    let mut task = DownloadTask::setup(config)
        .await
        .with_context(|| format!("Could not start download of {}", args.url))?;
    println!("The response length is: {}", task.total_size());

    let signal_token = task.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl+C. Stopping chunk downloads...");
            signal_token.cancel();
        }
    });

    let observer: Box<dyn ProgressObserver> = if args.progress {
        Box::new(BarObserver::new(task.total_size()))
    } else {
        Box::new(ConsoleObserver)
    };

    println!("Launching Threads:");
    let summary = task.run(observer.as_ref()).await?;

    if !summary.is_clean() {
        bail!(
            "{} is incomplete: {} chunk(s) stopped early",
            output.display(),
            summary.truncated.len()
        );
    }

    Ok(())
}
