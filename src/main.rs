use clap::Parser;
use nocturne::{syscalls, Config, Server};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "nocturne")]
#[command(about = "Evented HTTP/1.0 file server with a long-poll broadcast service")]
#[command(version)]
struct Cli {
    /// Port number or service name to listen on
    #[arg(short = 'p', long = "port")]
    port: Option<String>,

    /// Directory served for GET requests
    #[arg(long, default_value = "./htdocs")]
    root: PathBuf,

    /// Directory holding error bodies such as 404.html
    #[arg(long = "error-documents", default_value = "./error_documents")]
    error_documents: PathBuf,

    /// Directory for the access/error logs and the chat log
    #[arg(long = "logs", default_value = "./logs")]
    logs: PathBuf,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let Some(port_arg) = cli.port else {
        eprintln!("ERROR: no port given");
        process::exit(1);
    };
    let port = match syscalls::resolve_port(&port_arg) {
        Ok(port) => port,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let mut cfg = Config::new(port);
    cfg.document_root = cli.root;
    cfg.error_documents = cli.error_documents;
    cfg.logs_dir = cli.logs;

    let mut server = match Server::bind(cfg) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("startup failed: {}", e);
            process::exit(1);
        }
    };

    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::Release);
    }) {
        eprintln!("failed to install the signal handler: {}", e);
        process::exit(1);
    }

    if let Err(e) = server.run() {
        tracing::error!("server loop failed: {}", e);
        process::exit(1);
    }
}
