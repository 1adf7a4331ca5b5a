use anyhow::Context;
use clap::{Parser, ValueEnum};
use embassy_executor::{Executor, Spawner};
use env_logger::Builder;
use log::{LevelFilter, error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread;

use crate::collaborators::{HttpChannelModel, HttpMobilityModel, ResolvedService, ServiceRegistry, build_http_client};
use crate::config::SimConfig;
use crate::error::{TickError, WorkerError};
use crate::simulation::controller::TickSummary;
use crate::simulation::node_table::NodeTable;
use crate::simulation::{Broker, MAX_WORKERS, RedisBroker, TickController, TickWorker, Transport, WorkerConfig, generate_nodes};

mod collaborators;
mod config;
mod error;
mod simulation;

type Registry = Arc<dyn ServiceRegistry + Send + Sync>;
type Controller = TickController<HttpMobilityModel>;
type Worker = TickWorker<HttpChannelModel>;

/// Which part of the pipeline this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Role {
    /// Controller and every worker in one process
    All,
    /// Controller only; workers are reached through Redis
    Controller,
    /// One worker, selected by --worker-index, fed through Redis
    Worker,
}

#[derive(Parser, Debug)]
#[clap(name = "meshtick", about = "Runs one tick of the wireless network simulation")]
struct Args {
    /// TOML configuration file
    #[clap(long, default_value = "meshtick.toml")]
    config: PathBuf,

    /// Log level for this program; RUST_LOG overrides it
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,

    #[clap(long, value_enum, default_value = "all")]
    role: Role,

    /// Worker to run with --role worker, counted from zero
    #[clap(long)]
    worker_index: Option<usize>,
}

async fn tick<T: Transport>(transport: &T, mut controller: Controller, done: Sender<Result<TickSummary, TickError>>) {
    let result = controller.run_tick(transport).await;
    if done.send(result).is_err() {
        error!("Tick result dropped: main thread is gone");
    }
}

async fn serve<T: Transport>(transport: &T, worker: Worker) -> WorkerError {
    let index = worker.config().index;
    let err = worker.run(transport).await;
    error!("Worker {} stopped: {}", index, err);
    err
}

#[embassy_executor::task]
async fn local_controller_task(broker: &'static Broker, controller: Controller, done: Sender<Result<TickSummary, TickError>>) {
    tick(broker, controller, done).await;
}

#[embassy_executor::task]
async fn redis_controller_task(
    broker: &'static RedisBroker,
    controller: Controller,
    done: Sender<Result<TickSummary, TickError>>,
) {
    tick(broker, controller, done).await;
}

#[embassy_executor::task(pool_size = MAX_WORKERS)]
async fn local_worker_task(broker: &'static Broker, worker: Worker) {
    serve(broker, worker).await;
}

#[embassy_executor::task]
async fn redis_worker_task(broker: &'static RedisBroker, worker: Worker, stopped: Sender<WorkerError>) {
    let err = serve(broker, worker).await;
    let _ = stopped.send(err);
}

/// Run an executor on its own named thread, started with `init`.
fn spawn_executor<F>(name: String, init: F) -> anyhow::Result<()>
where
    F: FnOnce(Spawner) + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
            executor.run(init);
        })
        .with_context(|| format!("spawning {}", name))?;
    Ok(())
}

fn build_worker(config: &SimConfig, client: &reqwest::blocking::Client, registry: &Registry, table: NodeTable, index: usize) -> anyhow::Result<Worker> {
    let service = ResolvedService::new(registry.clone(), config.services.channel.clone());
    service.prime();
    let channel = HttpChannelModel::new(client.clone(), service);
    TickWorker::new(
        WorkerConfig {
            index,
            count: config.worker_count,
        },
        table,
        channel,
        config.link_models.clone(),
    )
    .with_context(|| format!("configuring worker {}", index))
}

fn build_controller(config: &SimConfig, client: reqwest::blocking::Client, registry: Registry, table: NodeTable) -> Controller {
    let service = ResolvedService::new(registry, config.services.mobility.clone());
    service.prime();
    let mobility = HttpMobilityModel::new(client, service);
    TickController::new(table, mobility, config.worker_count)
}

/// Start every worker and the controller in this process, joined by an
/// in-process `Broker`. The tick result is sent on `done`.
fn start_in_process(
    config: &SimConfig,
    client: reqwest::blocking::Client,
    registry: Registry,
    table: NodeTable,
    done: Sender<Result<TickSummary, TickError>>,
) -> anyhow::Result<()> {
    let broker: &'static Broker = Box::leak(Box::new(Broker::new(config.worker_count)));
    for index in 0..config.worker_count {
        let worker = build_worker(config, &client, &registry, table.clone(), index)?;
        // One executor per worker thread; workers share nothing but the broker
        spawn_executor(format!("worker-{}", index), move |spawner| {
            if let Err(err) = spawner.spawn(local_worker_task(broker, worker)) {
                error!("Failed to spawn worker {}: {:?}", index, err);
            }
        })?;
    }

    let controller = build_controller(config, client, registry, table);
    spawn_executor("controller".to_string(), move |spawner| {
        if let Err(err) = spawner.spawn(local_controller_task(broker, controller, done)) {
            error!("Failed to spawn controller: {:?}", err);
        }
    })
}

fn open_redis(config: &SimConfig) -> anyhow::Result<&'static RedisBroker> {
    let broker = RedisBroker::open(&config.broker.redis_url, config.worker_count)
        .with_context(|| format!("opening Redis at {}", config.broker.redis_url))?;
    info!("Using Redis broker at {}", config.broker.redis_url);
    Ok(Box::leak(Box::new(broker)))
}

fn log_summary(summary: &TickSummary) {
    info!(
        "Tick {} done: {} nodes, {} mobility failures, {} queues, {} signals ({} ignored, {} lost), {} pairs",
        summary.tick,
        summary.nodes,
        summary.mobility_failures,
        summary.dispatched,
        summary.signals.counted,
        summary.signals.ignored,
        summary.signals.lagged,
        summary.signals.pairs
    );
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter(Some("meshtick"), args.log_level)
        .parse_default_env()
        .init();

    info!("Starting up as {:?}", args.role);

    let config = SimConfig::load(&args.config)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("loading {}", args.config.display()))?;
    info!(
        "{} nodes across {} workers, seed {}",
        config.node_count, config.worker_count, config.seed
    );

    let client = build_http_client(config.http_timeout()).context("building HTTP client")?;
    let registry = config.registry.build(client.clone());
    // Every process derives the same initial table from the shared seed.
    let table = generate_nodes(config.node_count, &config.node_defaults, config.seed).context("generating nodes")?;

    if args.role == Role::Worker {
        let index = args.worker_index.context("--role worker needs --worker-index")?;
        let broker = open_redis(&config)?;
        let worker = build_worker(&config, &client, &registry, table, index)?;
        let (stopped_tx, stopped_rx) = mpsc::channel();
        spawn_executor(format!("worker-{}", index), move |spawner| {
            if let Err(err) = spawner.spawn(redis_worker_task(broker, worker, stopped_tx)) {
                error!("Failed to spawn worker {}: {:?}", index, err);
            }
        })?;
        let err = stopped_rx.recv().context("worker thread exited")?;
        return Err(anyhow::Error::new(err).context(format!("worker {}", index)));
    }

    let (done_tx, done_rx) = mpsc::channel();
    if args.role == Role::Controller {
        let broker = open_redis(&config)?;
        let controller = build_controller(&config, client, registry, table);
        spawn_executor("controller".to_string(), move |spawner| {
            if let Err(err) = spawner.spawn(redis_controller_task(broker, controller, done_tx)) {
                error!("Failed to spawn controller: {:?}", err);
            }
        })?;
    } else {
        start_in_process(&config, client, registry, table, done_tx)?;
    }

    let summary = done_rx
        .recv()
        .context("controller thread exited")?
        .context("running tick")?;
    log_summary(&summary);

    Ok(())
}
