use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;

use crate::internal::config::{LogSettings, LoggerConfig, SyslogSettings};
use crate::internal::logger::{
    format_marker, Collector, Extra, JsonLinesCollector, Level, LogContext, Logger, DEFAULT_LOGGER,
};

pub fn build_cli() -> Command {
    // Leak the version string to get a 'static lifetime
    let version: &'static str = Box::leak(
        crate::internal::config::get_version_info().into_boxed_str()
    );

    Command::new("cfme-log")
        .version(version)
        .about("Project logging front end: named loggers, markers and timing")
        .subcommand_required(true)
        .arg(
            Arg::new("config-dir")
                .long("config-dir")
                .global(true)
                .default_value("conf")
                .help("Directory holding env.yaml and env.local.yaml")
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .global(true)
                .help("Directory for log files (default: <project root>/log)")
        )
        .arg(
            Arg::new("project-root")
                .long("project-root")
                .global(true)
                .help("Root used to relativize source paths (default: current directory)")
        )
        .arg(
            Arg::new("syslog")
                .long("syslog")
                .global(true)
                .help("Also send records to a syslog collector at HOST:PORT")
        )
        .arg(
            Arg::new("artifacts")
                .long("artifacts")
                .global(true)
                .help("Also forward records as JSON lines to this file")
        )
        .arg(
            Arg::new("worker-id")
                .long("worker-id")
                .global(true)
                .help("Worker id reported with forwarded records")
        )
        .subcommand(
            Command::new("emit")
                .about("Write one message to a named logger")
                .arg(
                    Arg::new("logger")
                        .long("logger")
                        .short('l')
                        .default_value(DEFAULT_LOGGER)
                        .help("Logger name")
                )
                .arg(
                    Arg::new("level")
                        .long("level")
                        .default_value("INFO")
                        .help("TRACE, DEBUG, INFO, WARNING, ERROR or CRITICAL")
                )
                .arg(
                    Arg::new("sub")
                        .long("sub")
                        .help("Prefix the message with (SUB)")
                )
                .arg(
                    Arg::new("origin")
                        .long("origin")
                        .help("Attribute the message to FILE[:LINE] instead of the caller")
                )
                .arg(
                    Arg::new("message")
                        .required(true)
                        .num_args(1..)
                        .help("Message words")
                )
        )
        .subcommand(
            Command::new("marker")
                .about("Print a text centered in an 80 column marker line")
                .arg(
                    Arg::new("mark")
                        .long("mark")
                        .short('m')
                        .value_parser(clap::value_parser!(char))
                        .default_value("=")
                        .help("Padding character")
                )
                .arg(
                    Arg::new("log")
                        .long("log")
                        .action(ArgAction::SetTrue)
                        .help("Also write the marker to the main logger")
                )
                .arg(Arg::new("text").required(true).num_args(1..))
        )
        .subcommand(
            Command::new("config")
                .about("Print the resolved logging configuration as YAML")
                .arg(
                    Arg::new("logger")
                        .long("logger")
                        .short('l')
                        .action(ArgAction::Append)
                        .help("Logger to resolve (repeatable, default: cfme)")
                )
        )
        .subcommand(
            Command::new("perf")
                .about("Run a command and log how long it took to the perf logger")
                .arg(
                    Arg::new("event")
                        .long("event")
                        .help("Event name (default: the command line)")
                )
                .arg(
                    Arg::new("command")
                        .required(true)
                        .num_args(1..)
                        .trailing_var_arg(true)
                        .allow_hyphen_values(true)
                )
        )
}

/// Settings from the config directory, with command-line overrides.
pub fn parse_settings(matches: &ArgMatches) -> anyhow::Result<LogSettings> {
    let conf_dir = matches
        .get_one::<String>("config-dir")
        .map(String::as_str)
        .unwrap_or("conf");

    let mut settings = LogSettings::load(conf_dir)
        .with_context(|| format!("failed to load configuration from {}", conf_dir))?;

    if let Some(dir) = matches.get_one::<String>("log-dir") {
        settings = settings.with_log_dir(dir);
    }
    if let Some(root) = matches.get_one::<String>("project-root") {
        settings.project_root = Some(PathBuf::from(root));
    }
    if let Some(endpoint) = matches.get_one::<String>("syslog") {
        settings = settings.with_syslog(Some(parse_syslog(endpoint)?));
    }
    Ok(settings)
}

fn parse_syslog(endpoint: &str) -> anyhow::Result<SyslogSettings> {
    let (address, port) = endpoint
        .rsplit_once(':')
        .with_context(|| format!("syslog endpoint {} is not HOST:PORT", endpoint))?;
    let port = port
        .parse::<u16>()
        .with_context(|| format!("invalid syslog port in {}", endpoint))?;
    Ok(SyslogSettings {
        address: address.to_string(),
        port,
    })
}

#[derive(Serialize)]
struct ResolvedConfig {
    log_dir: PathBuf,
    project_root: PathBuf,
    syslog: Option<SyslogSettings>,
    loggers: BTreeMap<String, LoggerConfig>,
}

fn parse_origin(value: &str) -> Extra {
    match value.rsplit_once(':') {
        Some((file, line)) => match line.parse::<u32>() {
            Ok(n) => Extra::new().origin(file, Some(n)),
            Err(_) => Extra::new().origin(value, None),
        },
        None => Extra::new().origin(value, None),
    }
}

fn words(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

/// Logger for `name`, wrapped in an artifact forwarder when `--artifacts`
/// was given.
fn target_logger(ctx: &LogContext, matches: &ArgMatches, name: &str) -> anyhow::Result<Logger> {
    let Some(path) = matches.get_one::<String>("artifacts") else {
        return Ok(ctx.logger(name)?);
    };
    if name != DEFAULT_LOGGER {
        anyhow::bail!("--artifacts only applies to the {} logger", DEFAULT_LOGGER);
    }

    let collector: Arc<dyn Collector> = Arc::new(
        JsonLinesCollector::open(path)
            .with_context(|| format!("failed to open artifact file {}", path))?,
    );
    let worker_id = matches.get_one::<String>("worker-id").cloned();
    Ok(ctx.artifact_logger(move || Arc::clone(&collector), move || worker_id.clone())?)
}

/// Runs the selected subcommand. Returns the process exit code.
pub fn run(ctx: &LogContext, matches: &ArgMatches, out: &mut dyn Write) -> anyhow::Result<i32> {
    match matches.subcommand() {
        Some(("emit", sub)) => {
            let name = sub
                .get_one::<String>("logger")
                .map(String::as_str)
                .unwrap_or(DEFAULT_LOGGER);
            let level: Level = sub
                .get_one::<String>("level")
                .map(String::as_str)
                .unwrap_or("INFO")
                .parse()?;

            let mut logger = target_logger(ctx, matches, name)?;
            if let Some(prefix) = sub.get_one::<String>("sub") {
                logger = logger.sub(prefix);
            }
            let extra = sub
                .get_one::<String>("origin")
                .map(String::as_str)
                .map(parse_origin)
                .unwrap_or_default();

            logger.log_with(level, words(sub, "message").join(" "), extra)?;
            Ok(0)
        }
        Some(("marker", sub)) => {
            let mark = sub.get_one::<char>("mark").copied().unwrap_or('=');
            let marker = format_marker(&words(sub, "text").join(" "), mark);
            writeln!(out, "{}", marker)?;
            if sub.get_flag("log") {
                target_logger(ctx, matches, DEFAULT_LOGGER)?.log(Level::Info, marker)?;
            }
            Ok(0)
        }
        Some(("config", sub)) => {
            let mut names = words(sub, "logger");
            if names.is_empty() {
                names.push(DEFAULT_LOGGER.to_string());
            }

            let settings = ctx.settings();
            let resolved = ResolvedConfig {
                log_dir: ctx.log_dir().to_path_buf(),
                project_root: ctx.paths().root().to_path_buf(),
                syslog: settings.syslog.clone(),
                loggers: names
                    .into_iter()
                    .map(|name| {
                        let conf = settings.logger_config(&name);
                        (name, conf)
                    })
                    .collect(),
            };
            write!(out, "{}", serde_yaml::to_string(&resolved)?)?;
            Ok(0)
        }
        Some(("perf", sub)) => {
            let command = words(sub, "command");
            let event = sub
                .get_one::<String>("event")
                .cloned()
                .unwrap_or_else(|| command.join(" "));
            let (program, args) = command
                .split_first()
                .context("no command given")?;

            let perf = ctx.perflog()?;
            perf.start(&event);
            let status = process::Command::new(program)
                .args(args)
                .status()
                .with_context(|| format!("failed to run {}", program));
            let taken = perf.stop(&event);

            let status = status?;
            if let Some(taken) = taken {
                writeln!(out, "{} took {:.3}s", event, taken.as_secs_f64())?;
            }
            Ok(status.code().unwrap_or(1))
        }
        _ => anyhow::bail!("no subcommand given"),
    }
}
