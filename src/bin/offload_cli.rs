//! offload-cli: issue offload-decided requests from the command line
//!
//! Usage:
//!   offload-cli decide --quality <q> [--threshold <t>]
//!   offload-cli request <service> [--quality <q>] [--count <n>] [--path <p>]
//!                                 [--method <m>] [--host <url>]

use anyhow::{bail, Context};
use edge_offload::config::{build_router, OffloadConfig};
use edge_offload::controller::InMemoryTelemetry;
use edge_offload::routing::{HostRouter, Router};
use edge_offload::{AppParameters, OffloadPolicy, ThresholdPolicy};
use futures::future::join_all;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "decide" => cmd_decide(&args[2..]),
        "request" => cmd_request(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("offload-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"offload-cli: edge offloading probe

USAGE:
    offload-cli <COMMAND> [OPTIONS]

COMMANDS:
    decide --quality <q> [--threshold <t>]
                                Print the offload verdict for a quality reading
    request <service> [OPTIONS] Decide and dispatch requests to <service>
        --quality <q>           Signal quality fed to the controller (default: none recorded)
        --count <n>             Number of concurrent requests (default 1)
        --path <p>              Request path (default /)
        --method <m>            HTTP method (default get)
        --host <url>            Host every offloaded request goes to (default OFFLOAD_STATIC_HOST)
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    OFFLOAD_*                   Router configuration, see edge_offload::config
    RUST_LOG                    Log filter (e.g. edge_offload=debug)"#
    );
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn cmd_decide(args: &[String]) -> anyhow::Result<()> {
    let quality: f64 = flag(args, "--quality")
        .context("--quality is required")?
        .parse()
        .context("--quality must be a number")?;
    let policy = match flag(args, "--threshold") {
        Some(t) => ThresholdPolicy::new(t.parse().context("--threshold must be a number")?),
        None => ThresholdPolicy::default(),
    };
    let verdict = if policy.should_offload(quality) {
        "offload"
    } else {
        "local"
    };
    println!("quality {quality} (threshold {}): {verdict}", policy.threshold());
    Ok(())
}

async fn cmd_request(args: &[String]) -> anyhow::Result<()> {
    let Some(service) = args.first().filter(|s| !s.starts_with("--")) else {
        bail!("request needs a <service> argument");
    };
    let mut config = OffloadConfig::from_env()?;
    if let Some(host) = flag(args, "--host") {
        config.static_host = host.to_string();
    }
    let count: usize = flag(args, "--count")
        .map(str::parse::<usize>)
        .transpose()
        .context("--count must be a positive integer")?
        .unwrap_or(1)
        .max(1);

    let telemetry = Arc::new(InMemoryTelemetry::default());
    if let Some(q) = flag(args, "--quality") {
        let metric = config.signal.default_metric();
        telemetry.record(&config.node, metric, q.parse().context("--quality must be a number")?)?;
    }

    let params = AppParameters {
        method: flag(args, "--method").unwrap_or("get").to_string(),
        path: flag(args, "--path").unwrap_or("/").to_string(),
        kwargs: None,
    };
    let client = config.app_client(telemetry, Some(params));
    let host_router: Arc<dyn HostRouter> = Arc::new(config.static_router()?);
    let router = build_router(&config, host_router).await?;

    let mut requests = Vec::with_capacity(count);
    for _ in 0..count {
        requests.push(client.next_service_request(service.as_str()).await?);
    }

    let router = &router;
    let results = join_all(requests.into_iter().map(|mut req| async move {
        let result = router.request(&mut req).await;
        (req, result)
    }))
    .await;

    let mut failed = 0;
    for (req, result) in &results {
        let where_ = if req.offload() { "remote" } else { "local" };
        let elapsed = req.timings().elapsed().unwrap_or_default();
        match result {
            Ok(resp) => println!(
                "{} {where_} {} {} -> {} ({:.1} ms)",
                req.request_id(),
                req.method().to_uppercase(),
                resp.url,
                resp.status,
                elapsed * 1000.0
            ),
            Err(e) => {
                failed += 1;
                println!("{} {where_} failed: {e} ({:.1} ms)", req.request_id(), elapsed * 1000.0);
            }
        }
    }

    let snapshot = router.throughput().snapshot();
    println!(
        "{} requests, {} failed, {} pending in throughput window",
        results.len(),
        failed,
        snapshot.pending
    );
    if failed > 0 {
        std::process::exit(2);
    }
    Ok(())
}
