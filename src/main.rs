use spk_pricer::config::AppConfig;
use spk_pricer::report::build_report;

fn main() {
    // Logs go to stderr; stdout carries only the JSON report.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("spk-pricer starting");

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        steps = cfg.lattice_steps,
        paths = cfg.simulation_paths,
        seed = ?cfg.seed,
        payoff = %cfg.payoff,
        "pricing configured contract"
    );

    let report = match build_report(&cfg).and_then(|r| r.to_json()) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "pricing failed");
            std::process::exit(1);
        }
    };

    println!("{report}");
}
