use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{debug, info};

use sporhund_alarm::{Alarm, AlarmAggregate, Granularity};
use sporhund_config::SporhundConfig;
use sporhund_detection::{LogInput, MatchingEngine, PrefilterCache};
use sporhund_signatures::{ScanFilter, SignatureSet};
use sporhund_store::{AggregateStore, AlarmStore, SignatureStore};
use sporhund_telemetry::MetricsRecorder;

/// Scan log data against IP, CIDR, IP-range, domain, and fixed-string
/// signatures.
///
/// With no signature file or store, the first positional argument is the
/// signature list itself (one signature per line). Remaining arguments are
/// input files; standard input is scanned when none are given.
#[derive(Parser, Debug)]
#[command(name = "sporhund", version, about)]
pub struct Cli {
    /// Configuration file.
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Signature file, one signature per line (`;`/`#` start comments).
    #[arg(short = 'b', long, value_name = "FILE")]
    pub signature_file: Option<PathBuf>,

    /// JSON-lines signature document store.
    #[arg(long, value_name = "FILE")]
    pub signature_store: Option<PathBuf>,

    /// Asset signature file for victim lookup.
    #[arg(short = 'a', long, value_name = "FILE")]
    pub asset_file: Option<PathBuf>,

    /// JSON-lines asset document store.
    #[arg(long, value_name = "FILE")]
    pub asset_store: Option<PathBuf>,

    /// Persist alarms to the alarm store.
    #[arg(short = 's', long)]
    pub save_alarms: bool,

    /// Alarm store path override.
    #[arg(long, value_name = "FILE")]
    pub alarm_store: Option<PathBuf>,

    /// Minimum prefilter length; shorter signatures are refused.
    #[arg(long, value_name = "NUM")]
    pub min_prefilter_len: Option<usize>,

    /// Do not print matching lines.
    #[arg(short, long)]
    pub quiet: bool,

    /// Roll persisted alarms up into hour/day aggregates instead of
    /// scanning.
    #[arg(long)]
    pub aggregate: bool,

    /// With --aggregate: rebuild from every alarm, not only new ones.
    #[arg(long)]
    pub all: bool,

    /// Signatures (when no file or store is given), then input files.
    pub args: Vec<String>,
}

pub fn load_config(cli: &Cli) -> anyhow::Result<SporhundConfig> {
    let mut config = match &cli.config {
        Some(path) => SporhundConfig::load_from_path(path)?,
        None => SporhundConfig::load()?,
    };

    // Command-line flags override file and environment configuration.
    if let Some(path) = &cli.signature_file {
        config.signatures.file = Some(path.clone());
        config.signatures.store = None;
        config.signatures.inline = None;
    } else if let Some(path) = &cli.signature_store {
        config.signatures.store = Some(path.clone());
        config.signatures.file = None;
        config.signatures.inline = None;
    }
    if let Some(path) = &cli.asset_file {
        config.assets.file = Some(path.clone());
        config.assets.store = None;
    } else if let Some(path) = &cli.asset_store {
        config.assets.store = Some(path.clone());
        config.assets.file = None;
    }
    if let Some(min) = cli.min_prefilter_len {
        config.scan.min_prefilter_len = min;
    }
    if cli.save_alarms {
        config.alarms.save = true;
    }
    if let Some(path) = &cli.alarm_store {
        config.alarms.store = path.clone();
    }
    Ok(config)
}

/// Resolve the scanned signature set and the input list from configuration
/// and positional arguments.
fn signature_set_and_inputs(
    cli: &Cli,
    config: &SporhundConfig,
) -> anyhow::Result<(SignatureSet, Vec<LogInput>)> {
    let mut args = cli.args.clone();

    let set = if let Some(path) = &config.signatures.file {
        SignatureSet::from_file(path)
            .with_context(|| format!("reading signature file {}", path.display()))?
    } else if let Some(path) = &config.signatures.store {
        SignatureStore::open(path)
            .load_set()
            .with_context(|| format!("reading signature store {}", path.display()))?
    } else if let Some(inline) = &config.signatures.inline {
        SignatureSet::from_text(inline)
    } else if !args.is_empty() {
        SignatureSet::from_text(&args.remove(0))
    } else {
        bail!("missing signatures; pass a pattern, --signature-file, or --signature-store");
    };

    if set.is_empty() {
        bail!("signature set is empty");
    }

    let inputs = if args.is_empty() {
        vec![LogInput::Stdin]
    } else {
        args.into_iter()
            .map(|path| LogInput::Path(PathBuf::from(path)))
            .collect()
    };
    Ok((set, inputs))
}

fn asset_engine(config: &SporhundConfig) -> anyhow::Result<Option<MatchingEngine>> {
    let set = if let Some(path) = &config.assets.file {
        SignatureSet::from_file(path)
            .with_context(|| format!("reading asset file {}", path.display()))?
    } else if let Some(path) = &config.assets.store {
        SignatureStore::open(path)
            .load_set()
            .with_context(|| format!("reading asset store {}", path.display()))?
    } else {
        return Ok(None);
    };
    Ok(Some(MatchingEngine::new(Arc::new(set))?))
}

pub fn run_scan(cli: &Cli, config: &SporhundConfig) -> anyhow::Result<()> {
    let metrics = MetricsRecorder::new();
    let (set, inputs) = signature_set_and_inputs(cli, config)?;
    let set = Arc::new(set);

    let cache = PrefilterCache::new(&config.scan.cache_dir);
    let engine = MatchingEngine::with_cache(
        Arc::clone(&set),
        ScanFilter::default(),
        config.scan.min_prefilter_len,
        &cache,
    )?
    .with_metrics(metrics.clone());
    let assets = asset_engine(config)?;
    let alarm_store = config.alarms.save.then(|| AlarmStore::open(&config.alarms.store));

    info!(
        signatures = set.len(),
        refused = engine.refused_prefilters().len(),
        inputs = inputs.len(),
        "starting scan"
    );

    for input in inputs {
        let started = Instant::now();
        let reader = input
            .open()
            .with_context(|| format!("opening {}", input.name()))?;
        for batch in engine.scan_stream(reader) {
            let batch = batch.with_context(|| format!("reading {}", input.name()))?;
            let alarm = Alarm::assemble(batch, &set, assets.as_ref(), Utc::now());
            metrics.alarms_total.inc();
            if !cli.quiet {
                println!("{}", alarm.line);
            }
            if let Some(store) = &alarm_store {
                store
                    .append(&alarm.to_doc())
                    .context("persisting alarm")?;
            }
        }
        debug!(input = %input.name(), elapsed = ?started.elapsed(), "input scanned");
    }

    debug!(metrics = %metrics.gather().unwrap_or_default(), "scan metrics");
    Ok(())
}

pub fn run_aggregation(cli: &Cli, config: &SporhundConfig) -> anyhow::Result<()> {
    let (set, _) = signature_set_and_inputs(cli, config)?;
    let alarm_store = AlarmStore::open(&config.alarms.store);

    let since = if cli.all {
        DateTime::<Utc>::MIN_UTC
    } else {
        alarm_store
            .last_agg_update()?
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    };
    let now = Utc::now();
    let alarms = alarm_store.load_since(since)?;
    info!(alarms = alarms.len(), %since, "updating aggregate collections");

    for (granularity, path) in [
        (Granularity::Hour, &config.alarms.aggregates_hour),
        (Granularity::Day, &config.alarms.aggregates_day),
    ] {
        let store = AggregateStore::open(path);
        let mut agg = AlarmAggregate::from_docs(granularity, store.load()?);
        for doc in &alarms {
            agg.update(doc);
        }
        agg.scores_recompute(|id| set.get_by_id(id).map(|sig| sig.score()));
        store.save_all(&agg.docs())?;
        debug!(buckets = agg.len(), ?granularity, "aggregate store updated");
    }

    alarm_store.set_last_agg_update(now)?;
    Ok(())
}
