mod config;

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use quotefeed_market_data::{
    CacheStore, CsvFetcher, DataSource, FallbackResolver, FetcherExt, Freshness, HistoryQuery,
    Interval, Quote, RedisCacheStore, ResolveOptions, VciFetcher, YahooFetcher,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LogFormat, Secondary};

#[derive(Parser)]
#[command(name = "quotefeed", version, about = "Resolve historical quotes through VCI, a fallback provider and a two-tier cache")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print resolved bars as JSON
    History {
        #[command(flatten)]
        query: QueryArgs,
        /// Bypass the fresh cache tier
        #[arg(long)]
        refresh: bool,
        /// Fail instead of serving stale cache
        #[arg(long)]
        no_stale: bool,
    },
    /// Drop both cache tiers for a query
    Invalidate {
        #[command(flatten)]
        query: QueryArgs,
    },
}

#[derive(Args)]
struct QueryArgs {
    symbol: String,
    #[arg(long)]
    start: NaiveDate,
    #[arg(long)]
    end: NaiveDate,
    /// 1m, 1h or 1d
    #[arg(long, default_value = "1d")]
    interval: Interval,
}

impl QueryArgs {
    fn to_query(&self) -> anyhow::Result<HistoryQuery> {
        Ok(HistoryQuery::new(
            &self.symbol,
            self.start,
            self.end,
            self.interval,
        )?)
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn build_cache(config: &Config) -> Option<Arc<dyn CacheStore>> {
    let url = config.redis_url.as_deref()?;
    match RedisCacheStore::connect(url).await {
        Ok(store) => {
            tracing::info!("Cache store: redis");
            Some(Arc::new(store))
        }
        Err(e) => {
            tracing::warn!("Redis unavailable, running without cache: {}", e);
            None
        }
    }
}

async fn build_resolver(config: &Config) -> anyhow::Result<FallbackResolver<HistoryQuery, Quote>> {
    let resilience = &config.resilience;

    let vci = VciFetcher::new(resilience.vci.clone()).context("Failed to build VCI client")?;
    let primary: Arc<dyn DataSource<HistoryQuery, Quote>> = Arc::new(
        vci.with_retry(resilience.retry_policy())
            .with_breaker(resilience.breaker_for("VCI"))
            .graceful(),
    );

    let secondary: Option<Arc<dyn DataSource<HistoryQuery, Quote>>> = match config.secondary {
        Secondary::Yahoo => {
            let yahoo = YahooFetcher::new(config.yahoo.clone())
                .context("Failed to build Yahoo client")?;
            Some(Arc::new(
                yahoo
                    .with_retry(resilience.retry_policy())
                    .with_breaker(resilience.breaker_for("YAHOO"))
                    .graceful(),
            ))
        }
        Secondary::Csv => Some(Arc::new(
            CsvFetcher::new(config.csv.clone())
                .with_retry(resilience.retry_policy())
                .with_breaker(resilience.breaker_for("CSV"))
                .graceful(),
        )),
        Secondary::None => None,
    };

    let mut builder =
        FallbackResolver::builder(primary).cache_config(resilience.cache.clone());
    if let Some(secondary) = secondary {
        builder = builder.secondary(secondary);
    }
    if let Some(store) = build_cache(config).await {
        builder = builder.cache(store);
    }
    Ok(builder.build())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_tracing(config.log_format);

    let resolver = build_resolver(&config).await?;

    match cli.command {
        Command::History {
            query,
            refresh,
            no_stale,
        } => {
            let query = query.to_query()?;
            let options = ResolveOptions {
                skip_cache: refresh,
                allow_stale: !no_stale,
            };

            let (result, trace) = resolver.resolve_traced(&query, options).await;
            tracing::info!("{}: {}", query, trace);
            let resolved = result?;

            let freshness = match resolved.freshness {
                Freshness::Fresh => serde_json::json!({ "status": "fresh" }),
                Freshness::Stale { cached_at } => {
                    serde_json::json!({ "status": "stale", "cached_at": cached_at })
                }
            };
            let output = serde_json::json!({
                "query": query.to_string(),
                "source": resolved.source.to_string(),
                "freshness": freshness,
                "results": resolved.results,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Invalidate { query } => {
            let query = query.to_query()?;
            if !resolver.has_cache() {
                anyhow::bail!("No cache store configured (set QF_REDIS_URL)");
            }
            let removed = resolver.invalidate(&query).await;
            println!("{}", serde_json::json!({ "query": query.to_string(), "removed": removed }));
        }
    }

    Ok(())
}
