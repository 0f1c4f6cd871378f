use super::channel::NotificationChannel;
use super::target::{mask_key, DispatchTarget};
use crate::config::NotifyConfig;
use crate::error::DispatchError;
use crate::recovery::RecoveryConfig;
use crate::router::ActivityRecord;
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

/// `{base}/{key}/{title}/{message}?group={group}&isArchive=1`, every path
/// segment percent-encoded
pub fn build_push_url(
    base_url: &Url,
    key: &str,
    title: &str,
    message: &str,
    group: &str,
) -> Result<Url, DispatchError> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|_| DispatchError::Network {
            details: format!("push URL {} cannot carry a path", base_url),
        })?
        .pop_if_empty()
        .extend([key, title, message]);
    url.query_pairs_mut()
        .append_pair("group", group)
        .append_pair("isArchive", "1");
    Ok(url)
}

/// Build the HTTP client shared by every push target
pub fn build_client(config: &NotifyConfig) -> Result<Client, DispatchError> {
    Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("babycam/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DispatchError::from)
}

/// Push notifications to one Bark device
pub struct BarkChannel {
    client: Client,
    base_url: Url,
    key: String,
    title: String,
    group: String,
    retry: RecoveryConfig,
}

impl BarkChannel {
    pub fn new(config: &NotifyConfig, key: String, client: Client) -> Result<Self, DispatchError> {
        let base_url = Url::parse(&config.bark_url).map_err(|e| DispatchError::Network {
            details: format!("invalid push URL {}: {}", config.bark_url, e),
        })?;

        Ok(Self {
            client,
            base_url,
            key,
            title: config.title.clone(),
            group: config.group.clone(),
            retry: config.retry_policy(),
        })
    }
}

#[async_trait]
impl NotificationChannel for BarkChannel {
    fn target(&self) -> DispatchTarget {
        DispatchTarget::Remote {
            key: self.key.clone(),
        }
    }

    fn retry_policy(&self) -> RecoveryConfig {
        self.retry.clone()
    }

    async fn deliver(&self, record: &ActivityRecord) -> Result<(), DispatchError> {
        let url = build_push_url(
            &self.base_url,
            &self.key,
            &self.title,
            &record.message,
            &self.group,
        )?;
        debug!("Requesting push for {}", mask_key(&self.key));

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DispatchError::Status {
                status: status.as_u16(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_url_encodes_segments() {
        let base = Url::parse("https://api.day.app").unwrap();
        let url = build_push_url(
            &base,
            "key123",
            "Baby Care Record",
            "2026-01-22 15:30 🍼Feeding",
            "BabyMonitor",
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://api.day.app/key123/Baby%20Care%20Record/2026-01-22%2015:30%20%F0%9F%8D%BCFeeding?group=BabyMonitor&isArchive=1"
        );
    }

    #[test]
    fn test_push_url_escapes_slashes_in_message() {
        let base = Url::parse("http://bark.local:8080/push/").unwrap();
        let url = build_push_url(&base, "k", "t", "a/b", "g").unwrap();
        assert_eq!(url.path(), "/push/k/t/a%2Fb");
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        assert!(build_push_url(&base, "k", "t", "m", "g").is_err());
    }
}
