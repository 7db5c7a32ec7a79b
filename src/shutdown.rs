use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

/// 优雅停机协调器
///
/// 收到 SIGINT/SIGTERM 后向所有组件广播关闭信号，组件各自
/// 结束在途工作后退出。
#[derive(Clone)]
pub struct ShutdownManager {
    tx: broadcast::Sender<()>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(4);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// 监听进程信号并广播关闭
    pub async fn listen_for_signals(&self) {
        let ctrl_c = async {
            let _ = signal::ctrl_c().await;
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(_) => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("收到 SIGINT，开始优雅停机"),
            _ = terminate => info!("收到 SIGTERM，开始优雅停机"),
        }
        let _ = self.tx.send(());
    }
}
