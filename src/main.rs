use tracing::{debug, error};
use cfme_log::cli::{build_cli, parse_settings, run};
use cfme_log::internal::logger::{init_logger, install_panic_hook, LogContext, DEFAULT_LOGGER};

fn main() -> anyhow::Result<()> {
    // Parse command line arguments first
    let matches = build_cli().get_matches();
    let settings = match parse_settings(&matches) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let diagnostics = settings.diagnostics.clone();
    let ctx = LogContext::new(settings);

    // Initialize logging, bridging project warnings into the main logger
    let bridge = match ctx.warning_bridge() {
        Ok(bridge) => Some(bridge),
        Err(e) => {
            eprintln!("Failed to open {} logger: {}", DEFAULT_LOGGER, e);
            None
        }
    };
    if let Err(e) = init_logger(&diagnostics, bridge) {
        eprintln!("Failed to initialize logger: {}", e);
        std::process::exit(1);
    }
    if let Some(logger) = ctx.get(DEFAULT_LOGGER) {
        install_panic_hook(&logger);
    }

    debug!("Version: {}", cfme_log::internal::config::get_version_info());
    debug!("Log directory: {}", ctx.log_dir().display());

    let code = match run(&ctx, &matches, &mut std::io::stdout()) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    };

    ctx.shutdown();
    std::process::exit(code);
}
