//! # telemon-app
//!
//! 텔레메트리 모니터 클라이언트 바이너리 진입점.
//! 설정 로드, 어댑터 와이어링, 콘솔 입출력, 종료 처리.

mod console;
mod lifecycle;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use telemon_client::runtime::{ClientDeps, ClientRuntime};
use telemon_core::config::AppConfig;
use telemon_network::control_client::HttpControlClient;
use telemon_network::hub_transport::HubTransport;
use telemon_storage::postgres::PgTelemetryStore;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::LifecycleManager;

/// 텔레메트리 모니터 클라이언트
///
/// 텔레메트리 서버에 연결해 패킷 생성을 제어하고 실시간 패킷과 세션 기록을 표시한다.
#[derive(Parser, Debug)]
#[command(name = "telemon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (JSON/TOML/YAML)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 서버 호스트 (설정/환경변수보다 우선)
    #[arg(long)]
    server_host: Option<String>,

    /// 서버 포트
    #[arg(long)]
    server_port: Option<u16>,

    /// DB 호스트
    #[arg(long)]
    db_host: Option<String>,

    /// 로그 레벨 (trace, debug, info, warn, error). RUST_LOG가 있으면 그쪽이 우선.
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.server_host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.server_port {
            config.server.port = port;
        }
        if let Some(host) = &self.db_host {
            config.database.host = host.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "telemon={0},telemon_app={0},telemon_client={0},telemon_core={0},telemon_network={0},telemon_storage={0}",
        args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load(args.config.as_deref(), None)?;
    args.apply(&mut config);
    config.validate()?;

    info!(
        "텔레메트리 모니터 시작: 서버 {}, DB {}:{}/{}",
        config.server.base_url(),
        config.database.host,
        config.database.port,
        config.database.name
    );

    let deps = ClientDeps {
        control: Arc::new(HttpControlClient::from_config(&config.server)?),
        transport: Arc::new(HubTransport::from_config(&config.server, &config.push)),
        store: Arc::new(PgTelemetryStore::connect_lazy(&config.database)),
    };

    let runtime = ClientRuntime::new(deps, &config);
    let ui_events = runtime.handle().subscribe();
    let (handle, task) = runtime.spawn();

    let (latest_tx, latest_rx) = watch::channel(None);
    let printer = tokio::spawn(console::print_events(ui_events, latest_tx));

    let lifecycle = LifecycleManager::new();
    tokio::select! {
        result = lifecycle.wait_for_signal() => {
            if let Err(e) = result {
                error!("시그널 대기 실패: {e:#}");
            }
        }
        result = console::read_commands(handle.clone(), latest_rx) => {
            if let Err(e) = result {
                error!("콘솔 입력 실패: {e:#}");
            }
            lifecycle.shutdown();
        }
    }

    if lifecycle.is_shutting_down() {
        info!("종료 처리 중...");
    }
    handle.shutdown();
    handle.wait_finished().await;
    if let Err(e) = task.await {
        error!("런타임 태스크 비정상 종료: {e}");
    }
    printer.abort();

    info!("텔레메트리 모니터 종료");
    Ok(())
}
