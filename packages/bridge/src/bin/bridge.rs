use std::path::PathBuf;
use std::sync::Arc;
use uniview_bridge::{app, SessionRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let mut port: u16 = 8080;
    let mut bundle_dir: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().expect("Invalid port number");
                    i += 2;
                } else {
                    eprintln!("--port requires a value");
                    std::process::exit(1);
                }
            }
            "--bundle-dir" => {
                if i + 1 < args.len() {
                    bundle_dir = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("--bundle-dir requires a value");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                println!("Usage: uniview-bridge [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --port <PORT>      Port to listen on (default: 8080)");
                println!("  --bundle-dir <DIR>     Serve plugin bundles from this directory");
                println!("  -h, --help             Show this help message");
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                std::process::exit(1);
            }
        }
    }

    let registry = Arc::new(SessionRegistry::new());
    let addr = format!("127.0.0.1:{}", port);
    tracing::info!("bridge listening on {}", addr);
    if let Some(dir) = &bundle_dir {
        tracing::info!("serving bundles from {:?}", dir);
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(registry, bundle_dir)).await?;
    Ok(())
}
