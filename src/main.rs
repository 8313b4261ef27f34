use clap::{Parser, Subcommand};
use std::error::Error;
use std::process::ExitCode;

use wxmon_service::analysis::summarize;
use wxmon_service::config::{Config, Secrets, DEFAULT_CONFIG_PATH};
use wxmon_service::ingest::openweather::icon_url;
use wxmon_service::ingest::OpenWeatherClient;
use wxmon_service::logging::{self, DataSource};
use wxmon_service::model::{Alert, Identity, Location, PreferenceDraft, StoredObservation};
use wxmon_service::monitor::{self, CheckOutcome, MonitorError};
use wxmon_service::store::{AlertFilter, MemoryStore, PgStore, WeatherStore};

#[derive(Parser)]
#[command(name = "wxmon_service")]
#[command(about = "Personal weather monitoring with threshold alerts")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// User whose preference and alerts to act on
    #[arg(long, global = true, env = "WXMON_USER")]
    user: Option<String>,

    /// Keep everything in memory instead of PostgreSQL (nothing is saved)
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update the monitored location and thresholds
    Setup {
        /// Display name of the location
        #[arg(long)]
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
        /// High temperature threshold (°C)
        #[arg(long, allow_hyphen_values = true)]
        high: Option<f64>,
        /// Low temperature threshold (°C)
        #[arg(long, allow_hyphen_values = true)]
        low: Option<f64>,
        /// Wind speed threshold (m/s)
        #[arg(long)]
        wind: Option<f64>,
        /// Humidity threshold (%)
        #[arg(long)]
        humidity: Option<f64>,
        /// Record observations but raise no alerts
        #[arg(long)]
        disabled: bool,
    },
    /// Fetch the current weather once and evaluate it
    Check,
    /// Check repeatedly at the configured interval
    Watch {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// Show the latest weather and unread alerts, refetching if stale
    Status,
    /// List alerts, newest first
    Alerts {
        #[arg(long)]
        unread: bool,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark an alert (or all alerts) as read
    Ack {
        /// Alert id
        id: Option<i64>,
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logger(config.logging.level, config.logging.file.as_deref()) {
        eprintln!("✗ could not open log file: {}", e);
        return ExitCode::FAILURE;
    }

    let secrets = Secrets::from_env();
    let result = if cli.memory {
        run(&cli, &config, &secrets, &mut MemoryStore::new())
    } else {
        match secrets
            .require_database_url()
            .map_err(|e| Box::new(e) as Box<dyn Error>)
            .and_then(|url| PgStore::connect(url).map_err(Into::into))
        {
            Ok(mut store) => run(&cli, &config, &secrets, &mut store),
            Err(e) => Err(e),
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(DataSource::System, None, &e.to_string());
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run<S: WeatherStore>(
    cli: &Cli,
    config: &Config,
    secrets: &Secrets,
    store: &mut S,
) -> Result<(), Box<dyn Error>> {
    let identity = cli.user.as_deref().and_then(Identity::parse);
    let provider = || -> Result<OpenWeatherClient, MonitorError> {
        let key = secrets.require_api_key()?;
        Ok(OpenWeatherClient::new(
            &config.provider.base_url,
            key,
            config.provider.timeout(),
        )?)
    };

    match &cli.command {
        Command::Setup {
            name,
            lat,
            lon,
            high,
            low,
            wind,
            humidity,
            disabled,
        } => {
            let owner = identity.as_ref().ok_or(MonitorError::Unauthorized)?;
            let defaults = config.defaults;
            let mut thresholds = store
                .active_preference(owner)?
                .map(|p| p.thresholds)
                .unwrap_or(defaults);
            thresholds.temp_threshold_high = high.unwrap_or(thresholds.temp_threshold_high);
            thresholds.temp_threshold_low = low.unwrap_or(thresholds.temp_threshold_low);
            thresholds.wind_speed_threshold = wind.unwrap_or(thresholds.wind_speed_threshold);
            thresholds.humidity_threshold = humidity.unwrap_or(thresholds.humidity_threshold);

            let draft = PreferenceDraft {
                location: Location {
                    name: name.clone(),
                    latitude: *lat,
                    longitude: *lon,
                },
                thresholds,
                alerts_enabled: !disabled,
            };
            let saved = store.save_preference(owner, &draft)?;
            logging::info(DataSource::Database, Some(&saved.location.name), "Preference saved");
            println!("✓ Monitoring '{}' (preference #{})", saved.location.name, saved.id);
            println!(
                "  high {:.1}°C · low {:.1}°C · wind {:.1} m/s · humidity {:.0}% · alerts {}",
                saved.thresholds.temp_threshold_high,
                saved.thresholds.temp_threshold_low,
                saved.thresholds.wind_speed_threshold,
                saved.thresholds.humidity_threshold,
                if saved.alerts_enabled { "on" } else { "off" }
            );
        }
        Command::Check => {
            let outcome = monitor::run_check(store, &provider()?, identity.as_ref())?;
            print_outcome(&outcome);
        }
        Command::Watch { cycles } => {
            let owner = identity.as_ref().ok_or(MonitorError::Unauthorized)?;
            let client = provider()?;
            let stats = monitor::watch(
                store,
                &client,
                owner,
                config.service.poll_interval(),
                *cycles,
                |result| match result {
                    Ok(outcome) => print_outcome(outcome),
                    Err(e) => eprintln!("✗ {}", e),
                },
            );
            println!(
                "{} cycle(s): {} ok, {} failed, {} alert(s) raised",
                stats.cycles, stats.successful, stats.failed, stats.alerts_raised
            );
        }
        Command::Status => {
            let snapshot = monitor::dashboard(
                store,
                provider,
                identity.as_ref(),
                config.service.stale_after_minutes,
                chrono::Utc::now(),
            )?;
            println!("📍 {}", snapshot.preference.location.name);
            print_observation(&snapshot.observation);
            if !snapshot.refreshed {
                let fetched_at = snapshot.observation.observation.fetched_at;
                println!("  (cached, fetched {})", fetched_at.format("%Y-%m-%d %H:%M UTC"));
            }
            let summary = &snapshot.summary;
            match summary.highest_unread {
                Some(severity) => println!(
                    "\n{} unread of {} recent alert(s), most urgent: {}",
                    summary.unread, summary.total, severity
                ),
                None => println!("\nNo unread alerts"),
            }
            for alert in &snapshot.unread_alerts {
                print_alert(alert);
            }
        }
        Command::Alerts { unread, limit, json } => {
            let owner = identity.as_ref().ok_or(MonitorError::Unauthorized)?;
            let alerts = store.alerts(
                owner,
                AlertFilter {
                    unread_only: *unread,
                    limit: *limit,
                },
            )?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&alerts)?);
            } else {
                let summary = summarize(&alerts);
                println!("{} alert(s), {} unread", summary.total, summary.unread);
                for alert in &alerts {
                    print_alert(alert);
                }
            }
        }
        Command::Ack { id, all } => {
            let owner = identity.as_ref().ok_or(MonitorError::Unauthorized)?;
            if *all {
                let changed = store.mark_all_read(owner)?;
                println!("✓ Marked {} alert(s) as read", changed);
            } else if let Some(id) = id {
                if store.mark_alert_read(owner, *id)? {
                    println!("✓ Alert #{} marked as read", id);
                } else {
                    return Err(format!("alert #{} not found", id).into());
                }
            } else {
                return Err("give an alert id or --all".into());
            }
        }
    }

    Ok(())
}

fn print_observation(stored: &StoredObservation) {
    let obs = &stored.observation;
    println!(
        "  {} · {:.1}°C (feels like {:.1}°C)",
        obs.condition, obs.temperature, obs.feels_like
    );
    println!(
        "  humidity {:.0}% · wind {:.1} m/s @ {:.0}° · pressure {:.0} hPa",
        obs.humidity, obs.wind_speed, obs.wind_direction, obs.pressure
    );
    if !obs.icon.is_empty() {
        println!("  icon: {}", icon_url(&obs.icon));
    }
}

fn print_alert(alert: &Alert) {
    let marker = if alert.is_read { " " } else { "•" };
    println!(
        "{} #{:<5} [{:<7}] {} ({})",
        marker,
        alert.id,
        alert.severity,
        alert.title,
        alert.created_at.format("%Y-%m-%d %H:%M")
    );
    println!("          {}", alert.message);
}

fn print_outcome(outcome: &CheckOutcome) {
    println!(
        "📍 {} ({})",
        outcome.preference.location.name, outcome.observation.observation.location_name
    );
    print_observation(&outcome.observation);
    if outcome.alerts.is_empty() {
        println!("  ✓ No thresholds crossed");
    } else {
        for alert in &outcome.alerts {
            print_alert(alert);
        }
    }
}
