use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::Result;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use msg_transfer::application::{
    AggregatorRegistry, ChatFanoutDispatcher, DeliveryService, ReadFanoutDispatcher,
    ReadPushOutlet,
};
use msg_transfer::domain::{EventConsumerPort, PushSenderPort};
use msg_transfer::infrastructure::{
    AppConfig, CliArgs, ConfigStore, ConsumerLoop, LineEventSource, LogPushSender,
    MemoryChatLogStore, StaticMembership, Topic, TopicRouter, WsPushSender,
};

const STDIN_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn load_config(args: CliArgs) -> Result<AppConfig> {
    let override_path = args.config.clone();
    let mut config = match (ConfigStore::new(), override_path.as_deref()) {
        (Ok(store), path) => store.load_config(path)?,
        (Err(_), Some(path)) => {
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            ConfigStore::with_dir(dir).load_config(Some(path))?
        }
        (Err(_), None) => AppConfig::default(),
    };
    config.merge_with_args(args);
    Ok(config)
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn push_sender(config: &AppConfig) -> Arc<dyn PushSenderPort> {
    match &config.push.endpoint {
        Some(endpoint) => Arc::new(WsPushSender::new(endpoint.clone(), config.push.token.clone())),
        None => {
            warn!("No push endpoint configured, push frames will only be logged");
            Arc::new(LogPushSender::new())
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let config = load_config(CliArgs::parse())?;
    init_logging(&config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(config));
    // A pending blocking stdin read would otherwise hold the runtime open.
    runtime.shutdown_timeout(STDIN_SHUTDOWN_GRACE);
    result
}

async fn run(config: AppConfig) -> Result<()> {
    info!(
        version = msg_transfer::VERSION,
        read_mode = %config.read_receipt.mode,
        "Starting {}",
        msg_transfer::NAME
    );

    let store = Arc::new(MemoryChatLogStore::new());
    let membership = Arc::new(StaticMembership::new(config.groups.clone()));
    let delivery = DeliveryService::new(
        membership,
        push_sender(&config),
        config.push.system_id.clone(),
    );

    let (push_tx, push_rx) = mpsc::channel(config.push_channel_capacity());
    let registry = Arc::new(AggregatorRegistry::new(
        config.read_receipt.aggregator_config(),
        &push_tx,
    ));
    let outlet = tokio::spawn(ReadPushOutlet::new(delivery.clone(), registry.clone()).run(push_rx));

    let chat: Arc<dyn EventConsumerPort> =
        Arc::new(ChatFanoutDispatcher::new(store.clone(), delivery));
    let read: Arc<dyn EventConsumerPort> = Arc::new(ReadFanoutDispatcher::new(
        store,
        registry.clone(),
        push_tx.clone(),
        config.read_receipt.mode,
    ));

    let (router, receivers) = TopicRouter::new(config.topic_capacity());
    let chat_loop = tokio::spawn(ConsumerLoop::new(Topic::ChatTransfer, chat).run(receivers.chat));
    let read_loop = tokio::spawn(ConsumerLoop::new(Topic::ReadTransfer, read).run(receivers.read));

    let cancel = CancellationToken::new();
    let mut source = tokio::spawn(
        LineEventSource::new(BufReader::new(tokio::io::stdin())).run(router, cancel.clone()),
    );

    let source_stats = tokio::select! {
        stats = &mut source => stats,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupt received, shutting down");
            cancel.cancel();
            source.await
        }
    }??;
    info!(
        routed = source_stats.routed,
        skipped = source_stats.skipped,
        "Event source stopped"
    );

    let chat_stats = chat_loop.await?;
    let read_stats = read_loop.await?;
    info!(
        chat_processed = chat_stats.processed,
        chat_failed = chat_stats.failed,
        read_processed = read_stats.processed,
        read_failed = read_stats.failed,
        "Consumers drained"
    );

    for payload in registry.drain() {
        if push_tx.send(payload).await.is_err() {
            warn!("Read receipt outlet gone, dropping pending receipts");
            break;
        }
    }
    drop(push_tx);
    outlet.await?;

    info!("Shutdown complete");
    Ok(())
}
