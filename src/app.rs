use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::{routing::get, Json, Router};
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::eia::EiaClient;
use crate::metrics::gather_metrics;
use crate::notifier::{NotifierService, StdoutSink};
use crate::redis_client::RedisClient;
use crate::summarizer::Summarizer;

/// One aggregation run: fetch, summarise, publish, flush.
pub async fn run_summarizer(settings: Settings) -> Result<()> {
    let Some(api_key) = settings.eia_api_key.as_deref() else {
        bail!("EIA_API_KEY must be set to fetch generation data");
    };

    let redis = RedisClient::new(&settings.redis_url)
        .await
        .context("connect to Redis")?;
    redis.ensure_connection().await.context("Redis PING failed")?;

    let eia = EiaClient::new(&settings.eia_url, api_key, settings.eia_page_length, settings.eia_timeout)
        .context("build EIA client")?;
    let summarizer = Summarizer::new(eia, Arc::new(redis), settings.flush_timeout);

    let report = summarizer.run_once().await.context("aggregation run failed")?;
    info!(
        published = report.published,
        skipped = report.skipped.len(),
        delivered = report.flush.delivered,
        failed = report.flush.failed,
        pending = report.flush.pending,
        "Aggregation run complete"
    );
    if !report.flush.is_clean() {
        warn!("Some notifications were not delivered");
    }
    Ok(())
}

/// Consume one classification topic until interrupted or the broker fails.
pub async fn run_notifier(settings: Settings) -> Result<()> {
    let settings = Arc::new(settings);
    let redis = RedisClient::new(&settings.redis_url)
        .await
        .context("connect to Redis")?;
    redis.ensure_connection().await.context("Redis PING failed")?;

    let consumer = redis.subscribe(vec![settings.notify_topic.clone()]);
    let service = NotifierService::new(consumer, StdoutSink, settings.poll_timeout, settings.consumer_id.clone());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut notifier_loop = tokio::spawn(service.run(shutdown_tx.subscribe()));
    let metrics_server = serve_metrics(settings.clone(), shutdown_tx.subscribe());

    info!(
        topic = %settings.notify_topic,
        metrics_port = settings.prometheus_port,
        "Notifier started"
    );

    let outcome = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
            (&mut notifier_loop).await
        }
        res = &mut notifier_loop => {
            let _ = shutdown_tx.send(());
            res
        }
    };

    metrics_server.await.ok();

    match outcome {
        Ok(Ok(())) => {
            info!("Notifier shutdown complete");
            Ok(())
        }
        Ok(Err(err)) => Err(err).context("notifier stopped on broker error"),
        Err(err) => {
            error!(error = %err, "Notifier task crashed");
            Err(err.into())
        }
    }
}

fn serve_metrics(settings: Arc<Settings>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
    let topic = settings.notify_topic.clone();
    let consumer_id = settings.consumer_id.clone();
    let router = Router::new()
        .route(
            "/health",
            get(move || {
                let topic = topic.clone();
                let consumer_id = consumer_id.clone();
                async move { Json(serde_json::json!({ "status": "ok", "consumerId": consumer_id, "topic": topic })) }
            }),
        )
        .route(
            "/metrics",
            get(|| async {
                (
                    [(axum::http::header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
                    gather_metrics(),
                )
            }),
        );
    spawn_server(router, settings.prometheus_port, shutdown)
}

fn spawn_server(app: Router, port: u16, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(error = %err, port, "Metrics listener unavailable");
                return;
            }
        };
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .ok();
    })
}
