use art_domain::error::{Error, Result};
use futures_util::StreamExt;
use redis::aio::PubSub;

/// A live pattern-subscription handle. Dropping it closes the underlying
/// connection.
pub struct Subscription {
    pubsub: PubSub,
}

impl Subscription {
    /// Await the next message on the subscribed pattern, `(channel, payload)`.
    pub async fn next(&mut self) -> Result<(String, String)> {
        let mut stream = self.pubsub.on_message();
        match stream.next().await {
            Some(msg) => {
                let channel = msg.get_channel_name().to_string();
                let payload: String = msg
                    .get_payload()
                    .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
                Ok((channel, payload))
            }
            None => Err(Error::StorageUnavailable("pub/sub connection closed".into())),
        }
    }
}

pub async fn psubscribe(url: &str, pattern: &str) -> Result<Subscription> {
    let client = redis::Client::open(url).map_err(|e| Error::StorageUnavailable(e.to_string()))?;
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
    pubsub
        .psubscribe(pattern)
        .await
        .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
    Ok(Subscription { pubsub })
}
