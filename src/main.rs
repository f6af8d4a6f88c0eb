//! # Service Balancer - Interactive Driver
//!
//! Loads a configuration (first CLI argument, or `BALANCER_CONFIG`, or the built-in
//! example wiring), then lets an operator pick a strategy and route requests by id.
//! Every routed request goes through the full select → accept → complete cycle.

use std::io::{self, BufRead, Write};
use tracing::{error, info};

use service_balancer::observability::init_logging;
use service_balancer::{
    BalancerConfig, BalancerResult, LoadBalancerManager, Request, StrategyKind,
    DEFAULT_REQUEST_TYPE,
};

#[tokio::main]
async fn main() -> BalancerResult<()> {
    let config = load_config().await?;
    init_logging(&config.logging)?;

    info!("Starting service balancer");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let manager = config.build_manager()?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(e) = run_menu(&manager, stdin.lock(), stdout.lock()) {
        error!(error = %e, "Interactive session ended with an I/O error");
        return Err(e.into());
    }

    info!(stats = ?manager.all_stats(), "Service balancer shutdown complete");
    Ok(())
}

async fn load_config() -> BalancerResult<BalancerConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("BALANCER_CONFIG").ok());

    match path {
        Some(path) => BalancerConfig::load(path).await,
        None => {
            let mut config = BalancerConfig::default();
            config.apply_env_overrides()?;
            config.validate()?;
            Ok(config)
        }
    }
}

fn run_menu<R: BufRead, W: Write>(
    manager: &LoadBalancerManager,
    mut input: R,
    mut output: W,
) -> io::Result<()> {
    let mut line = String::new();

    loop {
        write!(
            output,
            "\nChoose load balancing algorithm (1: Least Connection, 2: Routed, 3: Round Robin, 4: Exit): "
        )?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        let choice = line.trim().parse::<u32>().ok();
        if choice == Some(4) {
            break;
        }
        let Some(strategy) = choice.and_then(StrategyKind::from_menu_choice) else {
            writeln!(output, "Invalid choice. Try again.")?;
            continue;
        };

        let Some(id) = read_request_id(&mut input, &mut output)? else {
            break;
        };

        let request = Request::new(format!("REQ{}", id), DEFAULT_REQUEST_TYPE);
        route(manager, strategy, &request, &mut output)?;
    }

    Ok(())
}

/// Prompt until a non-blank line arrives and take its first word
///
/// Returns `None` on end of input.
fn read_request_id<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Option<String>> {
    let mut line = String::new();

    loop {
        write!(output, "Enter request ID: ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if let Some(id) = line.split_whitespace().next() {
            return Ok(Some(id.to_string()));
        }
    }
}

fn route<W: Write>(
    manager: &LoadBalancerManager,
    strategy: StrategyKind,
    request: &Request,
    output: &mut W,
) -> io::Result<()> {
    let destination = match manager.select(strategy, request) {
        Ok(destination) => destination,
        Err(e) => return writeln!(output, "Error: {}", e),
    };

    writeln!(output, "Request routed to: {}", destination.address())?;

    match destination.try_admit() {
        Some(admission) => {
            writeln!(
                output,
                "Request accepted by {}. Currently serving: {} requests.",
                destination.address(),
                destination.current_load()
            )?;

            // The request is served synchronously here, so it completes right away
            admission.finish();
            writeln!(
                output,
                "Request completed by {}. Currently serving: {} requests.",
                destination.address(),
                destination.current_load()
            )
        }
        None => writeln!(
            output,
            "Request rejected by {} (overloaded).",
            destination.address()
        ),
    }
}
