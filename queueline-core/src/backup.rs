//! HTTP client for the Queueline backup server.
//!
//! Every call maps to one endpoint of queueline-server. Callers treat
//! failures as "use the local copy only"; nothing here retries.

use crate::credential::CredentialCollection;
use crate::queue::QueueState;
use crate::{Result, TicketingError};
use reqwest::StatusCode;

/// Client for the backup/document server.
#[derive(Clone)]
pub struct BackupClient {
    client: reqwest::Client,
    base_url: String,
}

impl BackupClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| TicketingError::Remote(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch the entire credential collection; `None` when the server
    /// has no collection file.
    pub async fn fetch_auth(&self) -> Result<Option<CredentialCollection>> {
        let response = self
            .client
            .get(self.url("/queue-auth.json"))
            .send()
            .await
            .map_err(|e| TicketingError::Remote(e.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let collection = response
            .error_for_status()
            .map_err(|e| TicketingError::Remote(e.to_string()))?
            .json()
            .await
            .map_err(|e| TicketingError::Remote(format!("Invalid auth response: {}", e)))?;
        Ok(Some(collection))
    }

    /// Overwrite the entire credential collection.
    pub async fn save_auth(&self, collection: &CredentialCollection) -> Result<()> {
        self.client
            .post(self.url("/api/save-auth"))
            .json(collection)
            .send()
            .await
            .map_err(|e| TicketingError::Remote(e.to_string()))?
            .error_for_status()
            .map_err(|e| TicketingError::Remote(e.to_string()))?;
        Ok(())
    }

    /// Remove one queue's credential record.
    pub async fn delete_queue_auth(&self, queue_name: &str) -> Result<()> {
        self.client
            .delete(self.url("/api/delete-queue-auth"))
            .json(&serde_json::json!({ "queueName": queue_name }))
            .send()
            .await
            .map_err(|e| TicketingError::Remote(e.to_string()))?
            .error_for_status()
            .map_err(|e| TicketingError::Remote(e.to_string()))?;
        Ok(())
    }

    /// Delete the entire credential collection.
    pub async fn delete_auth(&self) -> Result<()> {
        self.client
            .delete(self.url("/api/delete-auth"))
            .send()
            .await
            .map_err(|e| TicketingError::Remote(e.to_string()))?
            .error_for_status()
            .map_err(|e| TicketingError::Remote(e.to_string()))?;
        Ok(())
    }

    /// Overwrite one queue's state document.
    pub async fn save_queue_backup(&self, queue_name: &str, state: &QueueState) -> Result<()> {
        self.client
            .post(self.url("/api/save-queue-backup"))
            .json(&serde_json::json!({ "queueName": queue_name, "data": state }))
            .send()
            .await
            .map_err(|e| TicketingError::Remote(e.to_string()))?
            .error_for_status()
            .map_err(|e| TicketingError::Remote(e.to_string()))?;
        Ok(())
    }

    /// Fetch one queue's state document; `None` when the server has no
    /// backup for it.
    pub async fn get_queue_backup(&self, queue_name: &str) -> Result<Option<QueueState>> {
        let response = self
            .client
            .get(self.url(&format!("/api/get-queue-backup/{}", queue_name)))
            .send()
            .await
            .map_err(|e| TicketingError::Remote(e.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let state = response
            .error_for_status()
            .map_err(|e| TicketingError::Remote(e.to_string()))?
            .json()
            .await
            .map_err(|e| TicketingError::Remote(format!("Invalid backup response: {}", e)))?;
        Ok(Some(state))
    }

    /// Delete one queue's state document.
    pub async fn delete_queue_backup(&self, queue_name: &str) -> Result<()> {
        self.client
            .delete(self.url(&format!("/api/delete-queue-backup/{}", queue_name)))
            .send()
            .await
            .map_err(|e| TicketingError::Remote(e.to_string()))?
            .error_for_status()
            .map_err(|e| TicketingError::Remote(e.to_string()))?;
        Ok(())
    }

    /// Trigger the server's inactivity sweep immediately.
    pub async fn manual_cleanup(&self) -> Result<serde_json::Value> {
        self.client
            .post(self.url("/api/manual-cleanup"))
            .send()
            .await
            .map_err(|e| TicketingError::Remote(e.to_string()))?
            .error_for_status()
            .map_err(|e| TicketingError::Remote(e.to_string()))?
            .json()
            .await
            .map_err(|e| TicketingError::Remote(format!("Invalid cleanup response: {}", e)))
    }
}
