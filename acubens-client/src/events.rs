use acubens_common::prelude::*;
use acubens_common::LockEvent;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::reconciler::ReconcilerHandle;

/// Pumps the coordinator's push channel into the reconciler.
///
/// The first frame after connecting is a full `lock_status_update`
/// snapshot, so a cold or stale cache heals as soon as the pump is up.
/// When the socket drops the pump ends; the session keeps running on its
/// last-known cache and direct RPC replies.
pub struct EventPump;

impl EventPump {
    pub fn spawn(events_url: String, handle: ReconcilerHandle) -> JoinHandle<()> {
        tokio::spawn(async move {
            let (stream, _) = match connect_async(events_url.as_str()).await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("event channel connect failed: {}", e);
                    return;
                }
            };
            info!("event channel connected");

            let (_, mut frames) = stream.split();
            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<LockEvent>(&text) {
                        Ok(event) => {
                            trace!("lock event received, code: {:?}", event.resource_code());
                            if handle.server_event(event).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("undecodable lock event dropped: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {} // ping/pong/binary are not lock events
                    Err(e) => {
                        warn!("event channel error: {}", e);
                        break;
                    }
                }
            }
            info!("event channel closed");
        })
    }
}
