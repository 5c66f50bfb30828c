//! `floodwatch` command-line entry point.
//!
//! ```text
//! floodwatch run                     poll the gateway and publish alerts
//! floodwatch replay <csv>            replay historical readings offline
//! floodwatch stats <site> [days]     summary statistics (default 30 days)
//! floodwatch export <site> <csv>     write a site's history as CSV
//! floodwatch alerts                  list unacknowledged tier changes
//! floodwatch ack <id> <operator>     acknowledge one alert log entry
//! floodwatch summary                 service-wide counts
//! floodwatch verify                  run the startup preflight only
//! ```

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::env;
use std::error::Error;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use floodwatch_service::analysis;
use floodwatch_service::config::Config;
use floodwatch_service::db::PgStore;
use floodwatch_service::dispatch::{self, Dispatcher, WorkerEvent};
use floodwatch_service::ingest::GatewayClient;
use floodwatch_service::logging::{self, Component};
use floodwatch_service::model::FloodError;
use floodwatch_service::pipeline::Orchestrator;
use floodwatch_service::publish::{self, AlertSink, HttpSink, LogSink};
use floodwatch_service::replay;
use floodwatch_service::scoring;
use floodwatch_service::store::{AlertLog, MemoryStore, StateStore};
use floodwatch_service::validate;
use floodwatch_service::verify;

const USAGE: &str = "usage: floodwatch <run | replay <csv> | stats <site> [days] | export <site> <csv> | \
                     alerts | ack <id> <operator> | summary | verify>";

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let config = match Config::load_from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };
    logging::init_logger(
        config.logging.min_level(),
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    );

    let result = match args.first().map(String::as_str) {
        Some("run") => run(&config),
        Some("replay") => match args.get(1) {
            Some(path) => replay_cmd(&config, Path::new(path)),
            None => Err(USAGE.into()),
        },
        Some("stats") => match args.get(1) {
            Some(site) => {
                let days = args.get(2).and_then(|d| d.parse().ok()).unwrap_or(30);
                stats_cmd(site, days)
            }
            None => Err(USAGE.into()),
        },
        Some("export") => match (args.get(1), args.get(2)) {
            (Some(site), Some(path)) => export_cmd(site, Path::new(path)),
            _ => Err(USAGE.into()),
        },
        Some("alerts") => alerts_cmd(),
        Some("ack") => match (args.get(1).and_then(|id| id.parse::<i64>().ok()), args.get(2)) {
            (Some(id), Some(operator)) => ack_cmd(id, operator),
            _ => Err(USAGE.into()),
        },
        Some("summary") => summary_cmd(),
        Some("verify") => verify_cmd(&config),
        _ => Err(USAGE.into()),
    };

    if let Err(e) = result {
        logging::error(Component::System, None, &e.to_string());
        eprintln!("{}", e);
        process::exit(1);
    }
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise an in-process store.
fn database_configured() -> bool {
    dotenv::dotenv().ok();
    env::var("DATABASE_URL").is_ok()
}

fn open_store(shared: &MemoryStore) -> Result<Box<dyn StateStore>, Box<dyn Error>> {
    if database_configured() {
        Ok(Box::new(PgStore::from_env()?))
    } else {
        Ok(Box::new(shared.clone()))
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn run(config: &Config) -> Result<(), Box<dyn Error>> {
    let memory = MemoryStore::new();
    if !database_configured() {
        logging::warn(
            Component::Store,
            None,
            "DATABASE_URL not set; state will not survive a restart",
        );
    }

    let mut probe = open_store(&memory)?;
    let report = verify::preflight(config, probe.as_mut());
    let (model, registry) = report.into_startup()?;
    let registry = Arc::new(registry);

    // Gateway cursor per site, seeded from persisted state.
    let mut cursors: HashMap<String, Option<DateTime<Utc>>> = HashMap::new();
    for id in registry.all_site_ids() {
        cursors.insert(id.to_string(), probe.load_site(id)?.last_accepted);
    }
    drop(probe);

    let workers = config.pipeline.workers;
    let dispatcher = Dispatcher::start(workers, |worker| {
        let store = open_store(&memory).map_err(|e| FloodError::Storage(e.to_string()))?;
        let mut orchestrator =
            Orchestrator::new(config, Arc::clone(&registry), Arc::clone(&model), store);
        for id in registry.all_site_ids() {
            if dispatch::shard_for(id, workers) == worker {
                orchestrator.restore_site(id)?;
            }
        }
        Ok(orchestrator)
    })?;

    let gateway = GatewayClient::from_config(&config.gateway)?;
    let mut sink: Box<dyn AlertSink> = if config.gateway.dashboard_url.is_empty() {
        Box::new(LogSink)
    } else {
        Box::new(HttpSink::new(
            &config.gateway.dashboard_url,
            Duration::from_secs(config.gateway.timeout_secs),
        )?)
    };

    logging::info(
        Component::System,
        None,
        &format!(
            "polling {} every {}s with model '{}'",
            gateway.base_url(),
            config.gateway.poll_interval_secs,
            model.name()
        ),
    );

    loop {
        let mut fetched = 0;
        for (site_id, cursor) in cursors.iter_mut() {
            match gateway.fetch_pending(site_id, *cursor) {
                Ok(readings) => {
                    for raw in readings {
                        if let Some(ts) = validate::parse_timestamp(&raw.timestamp) {
                            if cursor.is_none_or(|c| ts > c) {
                                *cursor = Some(ts);
                            }
                        }
                        fetched += 1;
                        dispatcher.submit(raw)?;
                    }
                }
                Err(e) => logging::log_failure("fetch readings", &e),
            }
        }
        dispatcher.sweep(Utc::now())?;

        // Let the workers finish this round before publishing.
        thread::sleep(Duration::from_millis(200));
        publish_events(dispatcher.drain(), sink.as_mut());
        logging::debug(
            Component::Gateway,
            None,
            &format!("poll round fetched {} readings", fetched),
        );

        thread::sleep(Duration::from_secs(config.gateway.poll_interval_secs));
    }
}

fn publish_events(events: Vec<WorkerEvent>, sink: &mut dyn AlertSink) {
    for event in events {
        match event {
            WorkerEvent::Ingested { result: Ok(outcome), .. } => {
                if let Some(record) = outcome.alert {
                    publish::deliver(sink, &record);
                }
            }
            // Already logged by the orchestrator.
            WorkerEvent::Ingested { result: Err(_), .. } => {}
            WorkerEvent::Swept { records, .. } => {
                for record in &records {
                    publish::deliver(sink, record);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Offline commands
// ---------------------------------------------------------------------------

fn replay_cmd(config: &Config, path: &Path) -> Result<(), Box<dyn Error>> {
    let model = scoring::load_model(&config.model)?;
    let report = replay::replay_file(config, model, path)?;
    for err in &report.parse_errors {
        eprintln!("line {}: {}", err.line, err.message);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn stats_cmd(site_id: &str, days: i64) -> Result<(), Box<dyn Error>> {
    let mut store = PgStore::from_env()?;
    match analysis::site_statistics(&mut store, site_id, days, Utc::now())? {
        Some(stats) => println!("{}", serde_json::to_string_pretty(&stats)?),
        None => println!("no readings for {} in the last {} days", site_id, days),
    }
    Ok(())
}

fn export_cmd(site_id: &str, path: &Path) -> Result<(), Box<dyn Error>> {
    let mut store = PgStore::from_env()?;
    let rows = analysis::export_to_file(&mut store, site_id, None, path)?;
    println!("exported {} readings for {} to {}", rows, site_id, path.display());
    Ok(())
}

fn alerts_cmd() -> Result<(), Box<dyn Error>> {
    let mut store = PgStore::from_env()?;
    let active = store.active_alerts()?;
    if active.is_empty() {
        println!("no unacknowledged alerts");
    }
    for alert in &active {
        println!("#{:<6} {}  {}", alert.id, alert.event.raised_at.to_rfc3339(), alert.event);
    }
    Ok(())
}

fn ack_cmd(id: i64, operator: &str) -> Result<(), Box<dyn Error>> {
    let operator = operator.trim();
    if operator.is_empty() {
        return Err("operator name must not be empty".into());
    }
    let mut store = PgStore::from_env()?;
    if store.acknowledge_alert(id, operator, Utc::now())? {
        logging::info(
            Component::Store,
            None,
            &format!("alert #{} acknowledged by {}", id, operator),
        );
        println!("alert #{} acknowledged", id);
        Ok(())
    } else {
        Err(format!("no unacknowledged alert #{}", id).into())
    }
}

fn summary_cmd() -> Result<(), Box<dyn Error>> {
    let mut store = PgStore::from_env()?;
    let summary = store.system_summary(Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn verify_cmd(config: &Config) -> Result<(), Box<dyn Error>> {
    let mut store = open_store(&MemoryStore::new())?;
    let report = verify::preflight(config, store.as_mut());
    verify::print_summary(&report);
    if report.all_passed() {
        Ok(())
    } else {
        Err(format!("{} preflight checks failed", report.failures().len()).into())
    }
}
