//! Presence heartbeat: periodic foreground/settings publishes while
//! connected.

use std::time::Duration;

use ec_protocol::{topics, ClientSettings, ForegroundState, QoS};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::transport::{ConnectOptions, LinkPublisher};
use crate::types::RealtimeError;

/// Publish the presence snapshot once: client settings, then foreground
/// state. Also used right after the queue bootstrap.
pub async fn publish_presence(
    publisher: &LinkPublisher,
    options: &ConnectOptions,
) -> Result<(), RealtimeError> {
    let settings = ClientSettings {
        make_user_available_when_in_foreground: options.chat_on,
    };
    publisher
        .publish(
            topics::CLIENT_SETTINGS,
            serde_json::to_vec(&settings).map_err(ec_protocol::WireError::from)?,
            QoS::AtMostOnce,
        )
        .await?;

    let foreground = ForegroundState {
        foreground: options.foreground,
    };
    publisher
        .publish(
            topics::FOREGROUND_STATE,
            serde_json::to_vec(&foreground).map_err(ec_protocol::WireError::from)?,
            QoS::AtMostOnce,
        )
        .await
}

/// Spawn the heartbeat for one link. The first publish happens one full
/// interval after spawning.
///
/// Failures are logged and retried on the next tick; the heartbeat never
/// triggers a reconnect. It ends when `cancel` fires.
pub fn spawn_heartbeat(
    publisher: LinkPublisher,
    interval: Duration,
    options: ConnectOptions,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match publish_presence(&publisher, &options).await {
                        Ok(()) => tracing::trace!("presence heartbeat sent"),
                        Err(e) => tracing::warn!(error = %e, "presence heartbeat failed"),
                    }
                }
            }
        }
        tracing::debug!("presence heartbeat stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Outbound;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn publishes_each_interval_until_cancelled() {
        let (tx, mut rx) = mpsc::channel::<Outbound>(16);
        let cancel = CancellationToken::new();
        let handle = spawn_heartbeat(
            LinkPublisher::new(tx),
            Duration::from_secs(50),
            ConnectOptions::default(),
            cancel.clone(),
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(first.topic, "/set_client_settings");
        assert_eq!(&first.payload[..], br#"{"make_user_available_when_in_foreground":true}"#);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.topic, "/foreground_state");
        assert_eq!(&second.payload[..], br#"{"foreground":true}"#);

        // Next tick.
        assert_eq!(rx.recv().await.unwrap().topic, "/set_client_settings");
        assert_eq!(rx.recv().await.unwrap().topic, "/foreground_state");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn closed_link_does_not_stop_heartbeat() {
        let (tx, rx) = mpsc::channel::<Outbound>(1);
        drop(rx);
        let cancel = CancellationToken::new();
        let handle = spawn_heartbeat(
            LinkPublisher::new(tx),
            Duration::from_secs(1),
            ConnectOptions::default(),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!handle.is_finished());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn offline_presence_payload() {
        let (tx, mut rx) = mpsc::channel::<Outbound>(4);
        let options = ConnectOptions {
            chat_on: false,
            foreground: false,
        };
        publish_presence(&LinkPublisher::new(tx), &options).await.unwrap();
        let settings = rx.recv().await.unwrap();
        assert_eq!(
            &settings.payload[..],
            br#"{"make_user_available_when_in_foreground":false}"#
        );
        assert_eq!(&rx.recv().await.unwrap().payload[..], br#"{"foreground":false}"#);
    }
}
