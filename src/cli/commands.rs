use super::cli::{Cli, Commands};
use crate::config::{AuthConfig, ServerConfig};
use crate::hot_reload::{watch_spec, Reloader, ServingState};
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer};
use crate::spec::load_spec;
use arc_swap::ArcSwap;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn run() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            spec,
            config,
            addr,
            watch,
        } => serve(&spec, config.as_deref(), addr, watch),
        Commands::Check { spec } => check(&spec),
        Commands::Keygen { name } => keygen(&name),
    }
}

fn serve(
    spec_path: &Path,
    config_path: Option<&Path>,
    addr: Option<String>,
    watch: bool,
) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    RuntimeConfig::from_env().apply();

    // Startup-time spec or config failures abort before serving begins.
    let state = Arc::new(ArcSwap::from_pointee(ServingState::from_file(spec_path)?));
    let service = AppService::new(Arc::clone(&state), config.clone())?;

    let reloader = Arc::new(Reloader::new(
        Arc::clone(&state),
        Arc::clone(&service.cache),
        spec_path.to_path_buf(),
    ));
    // Bound to this scope so the watcher outlives every reload.
    let _watcher = if watch {
        Some(watch_spec(spec_path, Arc::clone(&reloader))?)
    } else {
        None
    };

    if config.server.tls.is_some() {
        warn!("TLS termination is handled by the fronting listener; serving plaintext locally");
    }

    let addr = addr.unwrap_or_else(|| config.listen_addr());
    let handle = HttpServer(service).start(&addr)?;
    info!(addr = %addr, spec = %spec_path.display(), watch, "mimicd serving");
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server exited abnormally: {e:?}"))
}

fn check(spec_path: &PathBuf) -> anyhow::Result<()> {
    let doc = load_spec(spec_path)?;
    println!("spec: {} ({} routes)", doc.slug, doc.routes.len());
    let mut routes = doc.routes;
    routes.sort_by(|a, b| a.path.cmp(&b.path).then(a.method.as_str().cmp(b.method.as_str())));
    for route in &routes {
        let statuses = route
            .declared_statuses()
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "  {:7} {}  -> {} [{}]",
            route.method.as_str(),
            route.path,
            route.operation_id,
            statuses
        );
    }
    Ok(())
}

fn keygen(name: &str) -> anyhow::Result<()> {
    let gate = crate::auth::AuthGate::new(&AuthConfig::default());
    let key = gate.generate_key(name);
    println!("# add under auth.keys in your config file:");
    println!("- key: {}", key.key);
    println!("  name: {}", key.name);
    println!("  enabled: true");
    Ok(())
}
