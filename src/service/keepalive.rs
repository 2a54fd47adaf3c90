//! Self-ping, чтобы хостинг не усыплял сервис.

use std::time::Duration;

use log::{info, warn};
use tokio::task::JoinHandle;

const EMERGENCY_PING_TIMEOUT: Duration = Duration::from_secs(60);
const SELF_PING_TIMEOUT: Duration = Duration::from_secs(30);

fn health_url(app_url: &str) -> String {
    format!("{}/health", app_url.trim_end_matches('/'))
}

async fn ping(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<(), reqwest::Error> {
    client
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

/// Разовый ping при старте; таймаут означает, что приложение еще просыпается
pub async fn emergency_ping(client: &reqwest::Client, app_url: &str) {
    match ping(client, &health_url(app_url), EMERGENCY_PING_TIMEOUT).await {
        Ok(()) => info!("🚀 Emergency ping done"),
        Err(e) if e.is_timeout() => info!("⚠️ Application is still waking up"),
        Err(e) => warn!("❌ Emergency ping failed: {}", e),
    }
}

/// Запустить фоновый ping `{app_url}/health` каждые `interval`
pub fn spawn_keepalive(client: reqwest::Client, app_url: String, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        emergency_ping(&client, &app_url).await;

        let url = health_url(&app_url);
        let mut ticker = tokio::time::interval(interval);
        // Первый тик срабатывает сразу
        ticker.tick().await;
        info!("⏰ Keepalive started (every {:?})", interval);

        loop {
            ticker.tick().await;
            match ping(&client, &url, SELF_PING_TIMEOUT).await {
                Ok(()) => info!("🟢 Self-ping successful"),
                Err(e) => warn!("⚠️ Self-ping failed: {}", e),
            }
        }
    })
}
