use anyhow::{Context, bail};
use dsm_cluster::api::handlers::router;
use dsm_cluster::api::types::render_bytes;
use dsm_cluster::{DsmError, DsmNode, ProcessDescriptor, ProcessDirectory, SystemConfig};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_PROCESSES: usize = 4;
const DEFAULT_BASE_PORT: u16 = 8080;
const DEFAULT_WAIT_SECS: u64 = 10;
const AUTO_LINGER: Duration = Duration::from_secs(15);
const MAX_INTERACTIVE_READ: usize = 1024;
const GREETING: &[u8] = b"Hello DSM World!\0";

struct Options {
    id: usize,
    directory: ProcessDirectory,
    http: Option<SocketAddr>,
    auto: bool,
    wait: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!(
            "Usage: {} --id <n> [--processes <n>] [--base-port <port>] [--peers <host:port,...>] [--http <addr:port>] [--wait <secs>] [--auto]",
            args[0]
        );
        eprintln!("Example: {} --id 0", args[0]);
        eprintln!(
            "Example: {} --id 1 --peers 127.0.0.1:8080,127.0.0.1:8081 --http 127.0.0.1:9081 --auto",
            args[0]
        );

        std::process::exit(1);
    }

    let options = parse_args(&args)?;
    let id = options.id;

    tracing::info!(
        "Starting DSM process {} of {}",
        id,
        options.directory.len()
    );

    // 1. DSM node (block server starts listening here):
    let node = Arc::new(DsmNode::initialize(id, options.directory, SystemConfig::default()).await?);

    let owned = node.owned_blocks();
    let preview: Vec<String> = owned.iter().take(12).map(|b| b.to_string()).collect();
    tracing::info!(
        "This process owns blocks: {}{}",
        preview.join(" "),
        if owned.len() > preview.len() { " ..." } else { "" }
    );

    // 2. Optional HTTP debug surface:
    if let Some(http_addr) = options.http {
        let app = router(node.clone());
        let listener = tokio::net::TcpListener::bind(http_addr)
            .await
            .with_context(|| format!("binding HTTP debug surface on {}", http_addr))?;
        tracing::info!("HTTP server listening on {}", http_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("HTTP server failed: {}", e);
            }
        });
    }

    // 3. Give the other processes time to come up:
    tracing::info!("Waiting {:?} for other processes", options.wait);
    tokio::select! {
        _ = tokio::time::sleep(options.wait) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received interrupt, shutting down");
            node.shutdown().await?;
            return Ok(());
        }
    }

    // 4. Scenario, then either linger or go interactive:
    run_basic_scenario(&node).await;

    if options.auto {
        // Peers may still be fetching from us.
        tokio::select! {
            _ = tokio::time::sleep(AUTO_LINGER) => {}
            _ = tokio::signal::ctrl_c() => tracing::info!("Received interrupt, shutting down"),
        }
    } else {
        tracing::info!("Press Ctrl+C to shutdown");
        tokio::select! {
            result = run_interactive(&node) => result?,
            _ = tokio::signal::ctrl_c() => tracing::info!("Received interrupt, shutting down"),
        }
    }

    println!("\nFinal statistics - process {}", id);
    println!("{}", node.stats());

    node.shutdown().await?;
    tracing::info!("Process {} finished", id);

    Ok(())
}

fn parse_args(args: &[String]) -> anyhow::Result<Options> {
    let mut id: Option<usize> = None;
    let mut processes = DEFAULT_PROCESSES;
    let mut base_port = DEFAULT_BASE_PORT;
    let mut peers: Vec<String> = vec![];
    let mut http: Option<SocketAddr> = None;
    let mut auto = false;
    let mut wait = Duration::from_secs(DEFAULT_WAIT_SECS);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--id" => {
                id = Some(arg_value(args, i)?.parse()?);
                i += 2;
            }
            "--processes" => {
                processes = arg_value(args, i)?.parse()?;
                i += 2;
            }
            "--base-port" => {
                base_port = arg_value(args, i)?.parse()?;
                i += 2;
            }
            "--peers" => {
                peers = arg_value(args, i)?
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
                i += 2;
            }
            "--http" => {
                http = Some(arg_value(args, i)?.parse()?);
                i += 2;
            }
            "--wait" => {
                wait = Duration::from_secs(arg_value(args, i)?.parse()?);
                i += 2;
            }
            "--auto" => {
                auto = true;
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }

    let id = id.context("--id is required")?;

    let directory = if peers.is_empty() {
        ProcessDirectory::localhost(processes, base_port)?
    } else {
        let mut descriptors = Vec::with_capacity(peers.len());
        for (pid, peer) in peers.iter().enumerate() {
            let (host, port) = peer
                .rsplit_once(':')
                .with_context(|| format!("peer '{}' is not host:port", peer))?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            descriptors.push(ProcessDescriptor::new(pid, host, port.parse()?));
        }
        ProcessDirectory::new(descriptors)?
    };

    if id >= directory.len() {
        bail!("--id must be between 0 and {}", directory.len() - 1);
    }

    Ok(Options {
        id,
        directory,
        http,
        auto,
        wait,
    })
}

fn arg_value(args: &[String], i: usize) -> anyhow::Result<&str> {
    args.get(i + 1)
        .map(String::as_str)
        .with_context(|| format!("{} needs a value", args[i]))
}

/// Local write and read, two remote reads (miss then hit), then a write the owner
/// check must refuse.
async fn run_basic_scenario(node: &DsmNode) {
    let id = node.local_id();
    let block_size = node.config().block_size as u64;
    let processes = node.num_processes();

    println!("\nBasic DSM scenario - process {}", id);

    let position = id as u64 * block_size;
    println!("1. Writing to local block {}", id);
    match node.write(position, GREETING).await {
        Ok(report) => {
            println!(
                "   write ok, invalidations sent to {} of {} processes",
                report.notified, report.attempted
            );
            println!("2. Reading local block {}", id);
            match node.read(position, GREETING.len()).await {
                Ok(data) => println!("   read ok: '{}'", render_bytes(&data)),
                Err(e) => println!("   local read failed: {}", e),
            }
        }
        Err(e) => println!("   local write failed: {}", e),
    }

    if processes < 2 {
        println!("3. Single process, no remote block to test");
        return;
    }

    let remote_block = (id + 1) % processes;
    let remote_position = remote_block as u64 * block_size;

    println!("3. Reading remote block {}", remote_block);
    match node.read(remote_position, 16).await {
        Ok(_) => {
            println!("   remote read ok (cache miss)");
            if node.read(remote_position, 16).await.is_ok() {
                println!("   second remote read ok (cache hit)");
            }
        }
        Err(e) => println!("   remote read failed: {}", e),
    }

    println!("4. Writing to remote block {} (must be rejected)", remote_block);
    match node.write(remote_position, GREETING).await {
        Err(DsmError::NotOwner { owner, .. }) => {
            println!("   rejected, block belongs to process {}", owner)
        }
        Err(e) => println!("   rejected with unexpected error: {}", e),
        Ok(_) => println!("   remote write was accepted"),
    }
}

async fn run_interactive(node: &DsmNode) -> anyhow::Result<()> {
    let id = node.local_id();
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("DSM[{}]> ", id);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.splitn(3, char::is_whitespace);
        let command = parts.next().unwrap_or_default();

        match command {
            "q" | "quit" => break,
            "help" => print_help(),
            "r" => {
                let parsed = parts
                    .next()
                    .and_then(|p| p.parse::<u64>().ok())
                    .zip(parts.next().and_then(|l| l.trim().parse::<usize>().ok()));
                let Some((position, length)) = parsed else {
                    println!("Usage: r <position> <length>");
                    continue;
                };
                if length == 0 || length > MAX_INTERACTIVE_READ {
                    println!("Invalid length (1..={})", MAX_INTERACTIVE_READ);
                    continue;
                }
                match node.read(position, length).await {
                    Ok(data) => println!("Read ok: {}", render_bytes(&data)),
                    Err(e) => println!("Read failed: {}", e),
                }
            }
            "w" => {
                let parsed = parts
                    .next()
                    .and_then(|p| p.parse::<u64>().ok())
                    .zip(parts.next().map(str::trim).filter(|t| !t.is_empty()));
                let Some((position, text)) = parsed else {
                    println!("Usage: w <position> <text>");
                    continue;
                };
                let mut bytes = text.as_bytes().to_vec();
                bytes.push(0);
                match node.write(position, &bytes).await {
                    Ok(report) => println!(
                        "Write ok, invalidations sent to {} of {} processes",
                        report.notified, report.attempted
                    ),
                    Err(e) => println!("Write failed: {}", e),
                }
            }
            "s" => println!("{}", node.stats()),
            "c" => {
                let valid = node.valid_cache_blocks().await;
                println!("[P{}] Cache state", id);
                for block_id in &valid {
                    println!("[P{}] Block {}: VALID", id, block_id);
                }
                println!("[P{}] Total cached blocks: {}", id, valid.len());
            }
            other => println!("Unknown command: {}", other),
        }
    }

    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  r <position> <length>  - read bytes");
    println!("  w <position> <text>    - write text (NUL-terminated)");
    println!("  s                      - show statistics");
    println!("  c                      - show cache state");
    println!("  q                      - quit");
}
