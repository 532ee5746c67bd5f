//! tridance-ctl — command-line interface for the TriDance hub.

mod cmd;

use anyhow::{Context, Result};

use cmd::http::Hub;
use cmd::simulate::SimulateOptions;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8443;

fn print_usage() {
    println!("Usage: tridance-ctl [--host <host>] [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status              Show hub status");
    println!("  peers               List connected phones");
    println!("  peer <id>           Show one phone's session");
    println!("  drop <id>           Disconnect a phone");
    println!("  watch               Live dashboard of every phone's latest sample");
    println!("  simulate [options]  Stream synthetic samples as a phone would");
    println!("      --label <name>    Device label (default: simulator)");
    println!("      --rate <hz>       Samples per second (default: 60)");
    println!("      --count <n>       Stop after n samples");
    println!("  shutdown            Stop the hub");
    println!();
    println!("Options:");
    println!("  --host <host>   Hub host (default: {})", DEFAULT_HOST);
    println!("  --port <port>   Hub port (default: {})", DEFAULT_PORT);
}

fn parse_simulate(args: &[&str]) -> Result<SimulateOptions> {
    let mut opts = SimulateOptions::default();
    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1).copied();
        match args[i] {
            "--label" => opts.label = value.context("--label requires a value")?.to_string(),
            "--rate" => {
                opts.rate_hz = value
                    .context("--rate requires a value")?
                    .parse()
                    .context("--rate must be a number")?
            }
            "--count" => {
                opts.limit = Some(
                    value
                        .context("--count requires a value")?
                        .parse()
                        .context("--count must be a number")?,
                )
            }
            other => anyhow::bail!("unknown simulate option: {}", other),
        }
        i += 2;
    }
    Ok(opts)
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --host / --port
    let mut hub = Hub {
        host: DEFAULT_HOST.to_string(),
        port: DEFAULT_PORT,
    };
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                hub.port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--host" => {
                i += 1;
                hub.host = args.get(i).context("--host requires a value")?.clone();
            }
            _ => remaining.push(&args[i]),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(&hub).await,
        ["peers"] => cmd::peers::cmd_peers(&hub).await,
        ["peer", id] => cmd::peers::cmd_peer_inspect(&hub, id).await,
        ["drop", id] => cmd::peers::cmd_peer_drop(&hub, id).await,
        ["watch"] => cmd::watch::cmd_watch(&hub.viewer_url()).await,
        ["simulate", rest @ ..] => {
            let opts = parse_simulate(rest)?;
            cmd::simulate::cmd_simulate(&hub, opts).await
        }
        ["shutdown"] => cmd::status::cmd_shutdown(&hub).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            print_usage();
            std::process::exit(1);
        }
    }
}
