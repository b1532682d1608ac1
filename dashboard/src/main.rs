//! APT Atlas CLI
//!
//! Usage:
//!   apt-atlas globe --output globe.geojson --top 10
//!   apt-atlas timeline --group APT28 --from 2015-01-01 --sort date_asc
//!   apt-atlas serve --port 18701

use anyhow::{Context, Result};
use apt_atlas::{
    router, AppState, DashboardConfig, GeoJsonRenderer, MemoryRenderer, Pipeline,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use country_resolver::Aggregator;
use std::path::PathBuf;
use std::sync::Arc;
use threat_timeline::{HttpDataSource, SortOrder, ThreatDataSource, TimelineQuery};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "apt-atlas", about = "Threat-actor campaigns on a globe", version)]
struct Args {
    /// Timeline API base URL (overrides APT_ATLAS_API_BASE)
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Gazetteer URL or GeoJSON file (overrides APT_ATLAS_GAZETTEER)
    #[arg(long, global = true)]
    gazetteer: Option<String>,

    /// ISO2 table URL or JSON file (overrides APT_ATLAS_ISO2)
    #[arg(long, global = true)]
    iso2: Option<String>,

    /// Fetch timeout in seconds (overrides APT_ATLAS_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Magnitude scale factor (overrides APT_ATLAS_SCALE)
    #[arg(long, global = true)]
    scale: Option<f64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, resolve and write the globe as GeoJSON
    Globe {
        #[arg(short, long, default_value = "globe.geojson")]
        output: PathBuf,

        /// Length of the ranked country list
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Fixed jitter seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print filtered timeline events
    Timeline {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print raw JSON instead of one line per event
        #[arg(long)]
        json: bool,
    },
    /// Load once and serve the read-only display API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    #[arg(long)]
    group: Option<String>,

    #[arg(long)]
    country: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    from: Option<NaiveDate>,

    /// YYYY-MM-DD
    #[arg(long)]
    to: Option<NaiveDate>,

    #[arg(long)]
    limit: Option<usize>,

    /// date_asc or date_desc
    #[arg(long, default_value = "date_desc")]
    sort: SortOrder,

    #[arg(long)]
    exclude_unknown_groups: bool,
}

impl FilterArgs {
    fn to_query(&self) -> TimelineQuery {
        let mut query = TimelineQuery::new().between(self.from, self.to).sorted(self.sort);
        if let Some(group) = &self.group {
            query = query.with_group(group.clone());
        }
        if let Some(country) = &self.country {
            query = query.with_country(country.clone());
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if self.exclude_unknown_groups {
            query = query.exclude_unknown_groups();
        }
        query
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "apt_atlas=trace,country_resolver=debug,threat_timeline=debug,info" } else { "apt_atlas=debug,info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(args: &Args) -> Result<DashboardConfig> {
    let mut config = DashboardConfig::from_env().context("Invalid environment configuration")?;
    if let Some(base) = &args.api_base {
        config.api_base = base.clone();
    }
    if let Some(gazetteer) = &args.gazetteer {
        config.gazetteer = Some(gazetteer.clone());
    }
    if let Some(iso2) = &args.iso2 {
        config.iso2 = Some(iso2.clone());
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout_secs = Some(secs);
    }
    if let Some(scale) = args.scale {
        anyhow::ensure!(scale.is_finite() && scale > 0.0, "--scale must be positive, got {}", scale);
        config.magnitude.scale_factor = scale;
    }
    if let Command::Serve { port: Some(port) } = args.command {
        config.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    info!("Timeline API: {}", config.api_base);

    let source: Arc<dyn ThreatDataSource> = Arc::new(HttpDataSource::new(config.source_config())?);
    let aggregator = Aggregator {
        magnitude: config.magnitude,
        ..Aggregator::default()
    };

    match args.command {
        Command::Globe { output, top, seed } => {
            let mut pipeline = Pipeline::new(source).with_aggregator(aggregator).with_top(top);
            if let Some(seed) = seed {
                pipeline = pipeline.with_seed(seed);
            }
            let mut renderer = GeoJsonRenderer::new(&output);
            let (snapshot, handle) = pipeline.run(&mut renderer).await?;

            if handle.sentinel {
                tracing::warn!("No country resolved; {:?} holds sentinel points only", output);
            }
            info!("{}", "=".repeat(60));
            info!(
                "Countries: {}  Incidents: {}  Events: {}  Groups: {}",
                snapshot.counters.countries,
                snapshot.counters.incidents,
                snapshot.counters.events,
                snapshot.counters.groups
            );
            for (rank, entry) in snapshot.top_countries.iter().enumerate() {
                info!("  {:>2}. {:30} {}", rank + 1, entry.country, entry.incidents);
            }
        }
        Command::Timeline { filter, json } => {
            let events = source.fetch_timeline(&filter.to_query()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else {
                for e in &events {
                    println!(
                        "{:10}  {:20}  {:20}  {}",
                        e.date.as_deref().unwrap_or("-"),
                        e.group_name,
                        e.country.as_deref().unwrap_or("-"),
                        e.campaign
                    );
                }
            }
            info!("{} events", events.len());
        }
        Command::Serve { .. } => {
            let (snapshot, _) = Pipeline::new(source.clone())
                .with_aggregator(aggregator)
                .run(&mut MemoryRenderer::new())
                .await?;

            let app = router(AppState {
                snapshot: Arc::new(snapshot),
                source,
            });

            let addr = format!("0.0.0.0:{}", config.port);
            info!("APT Atlas display API starting on {}", addr);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
