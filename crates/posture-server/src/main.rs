use posture_base::log;
use posture_base::log_fatal;
use posture_base::logging::{default_level, init_file_logger, init_stdout_logger};
use posture_com::WsListener;
use posture_image::JpegEncoder;
use posture_server::{ControlApi, ServerConfig, build_detector};
use posture_stream::{AnnotationStep, StreamController, StreamPump};
use posture_video::DefaultOpener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match ServerConfig::load(std::env::args().nth(1).map(PathBuf::from)) {
        Ok(config) => config,
        Err(e) => {
            init_stdout_logger(default_level());
            log_fatal!("{e}");
        }
    };

    match &config.log_dir {
        Some(dir) => init_file_logger(dir, config.log_level)?,
        None => init_stdout_logger(config.log_level),
    }

    log::info!("Posture server");
    log::info!("Source: {}", config.source);
    log::info!("Model: {}", config.model_path.display());

    let (detector, not_ready) = build_detector(&config);
    let encoder = Arc::new(JpegEncoder::new(config.stream.jpeg_quality()));
    let annotator = Arc::new(AnnotationStep::new(detector, encoder));
    let controller = Arc::new(StreamController::new(Arc::new(DefaultOpener), config.source.clone()));

    let api = ControlApi::new(
        controller.clone(),
        annotator.clone(),
        config.stream.confidence_threshold(),
    )
    .with_not_ready(not_ready);
    let http_listener = TcpListener::bind(config.control_addr).await?;
    log::info!("Control API on http://{}", http_listener.local_addr()?);

    let listener = WsListener::bind(config.stream_addr).await?;
    log::info!("Stream socket on ws://{}", listener.local_addr());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut http_shutdown = shutdown_rx.clone();
    let http = tokio::spawn(async move {
        axum::serve(http_listener, api.router())
            .with_graceful_shutdown(async move {
                let _ = http_shutdown.wait_for(|stop| *stop).await;
            })
            .await
    });
    let mut pumps = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(mut transport) => {
                    let mut pump = StreamPump::new(controller.clone(), annotator.clone(), config.stream.clone())
                        .with_shutdown(shutdown_rx.clone());
                    pumps.spawn(async move {
                        let exit = pump.run(&mut transport).await;
                        log::debug!("pump for {} exited: {exit:?}", transport.peer_addr());
                        transport.shutdown().await;
                    });
                }
                Err(e) => {
                    log::error!("stream listener stopped: {e}");
                    break;
                }
            },
            Some(result) = pumps.join_next(), if !pumps.is_empty() => {
                if let Err(e) = result {
                    log::error!("stream pump task failed: {e}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
        }
    }

    shutdown_tx.send_replace(true);
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while pumps.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        log::warn!("stream pumps did not exit within {SHUTDOWN_GRACE:?}, aborting them");
        pumps.abort_all();
    }

    match tokio::time::timeout(SHUTDOWN_GRACE, http).await {
        Ok(Ok(Err(e))) => log::warn!("control API stopped with an error: {e}"),
        Ok(Err(e)) => log::error!("control API task failed: {e}"),
        Err(_) => log::warn!("control API did not drain within {SHUTDOWN_GRACE:?}"),
        Ok(Ok(Ok(()))) => {}
    }

    controller.stop();
    log::info!("Stopped");
    Ok(())
}
