//! Contact form service
//!
//! Public submissions are validated, rate limited per hashed client IP,
//! stored, and then announced by email. Email delivery is best effort: a
//! failure is logged and the submission still succeeds.

use crate::db::repositories::ContactRepository;
use crate::models::{
    non_blank, ContactFilter, ContactStatus, ContactSubmission, CreateContactInput, ListParams,
    PagedResult,
};
use crate::services::email::{is_valid_email, EmailService};
use crate::services::rate_limiter::RateLimiter;
use anyhow::Context;
use chrono::{Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_MESSAGE_LENGTH: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum ContactServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Too many messages, please try again later")]
    RateLimited,

    #[error("Submission not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Request metadata stored alongside a submission
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Submission counts for the inbox badges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactCounts {
    pub total: i64,
    pub new: i64,
    pub read: i64,
    pub replied: i64,
    pub archived: i64,
}

/// Hex SHA-256 of the client IP; raw addresses are never stored
pub fn hash_ip(ip: &str) -> String {
    let digest = Sha256::digest(ip.trim().as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub struct ContactService {
    repo: Arc<dyn ContactRepository>,
    email: Arc<EmailService>,
    limiter: RateLimiter,
    max_per_hour: usize,
}

impl ContactService {
    /// `max_per_hour == 0` disables rate limiting
    pub fn new(
        repo: Arc<dyn ContactRepository>,
        email: Arc<EmailService>,
        max_per_hour: usize,
    ) -> Self {
        Self {
            repo,
            email,
            limiter: RateLimiter::per_hour(max_per_hour),
            max_per_hour,
        }
    }

    /// Validate, rate limit, store and announce a submission
    pub async fn submit(
        &self,
        input: CreateContactInput,
        client: ClientInfo,
    ) -> Result<ContactSubmission, ContactServiceError> {
        let name = input.name.trim().to_string();
        if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
            return Err(ContactServiceError::ValidationError(format!(
                "Name is required and must be at most {} characters",
                MAX_NAME_LENGTH
            )));
        }
        let email = input.email.trim().to_string();
        if !is_valid_email(&email) {
            return Err(ContactServiceError::ValidationError(
                "A valid email address is required".to_string(),
            ));
        }
        let message = input.message.trim().to_string();
        if message.is_empty() || message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ContactServiceError::ValidationError(format!(
                "Message is required and must be at most {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let ip_hash = client.ip.as_deref().map(hash_ip);
        if let Some(ip_hash) = &ip_hash {
            self.check_rate_limit(ip_hash).await?;
        }

        let now = Utc::now();
        let submission = ContactSubmission {
            id: 0,
            name,
            email,
            phone: non_blank(input.phone),
            company: non_blank(input.company),
            subject: non_blank(input.subject),
            message,
            service_interest: non_blank(input.service_interest),
            status: ContactStatus::New,
            ip_hash,
            user_agent: non_blank(client.user_agent),
            created_at: now,
            updated_at: now,
        };
        let stored = self
            .repo
            .create(&submission)
            .await
            .context("Failed to store contact submission")?;
        tracing::info!("Contact submission {} received", stored.id);

        if let Err(e) = self.email.send_contact_notification(&stored).await {
            tracing::warn!("Failed to send contact notification for {}: {:#}", stored.id, e);
        }
        if let Err(e) = self.email.send_contact_confirmation(&stored).await {
            tracing::warn!("Failed to send contact confirmation for {}: {:#}", stored.id, e);
        }

        Ok(stored)
    }

    /// Stored submissions cover restarts; the in-memory limiter covers bursts
    async fn check_rate_limit(&self, ip_hash: &str) -> Result<(), ContactServiceError> {
        if self.max_per_hour == 0 {
            return Ok(());
        }
        let recent = self
            .repo
            .count_recent_from(ip_hash, Utc::now() - Duration::hours(1))
            .await
            .context("Failed to count recent submissions")?;
        if recent >= self.max_per_hour as i64 || !self.limiter.check_and_record(ip_hash).await {
            tracing::warn!("Contact rate limit hit");
            return Err(ContactServiceError::RateLimited);
        }
        Ok(())
    }

    /// Fetch a submission, marking it read if it was new
    pub async fn get(&self, id: i64) -> Result<ContactSubmission, ContactServiceError> {
        let mut submission = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get submission")?
            .ok_or_else(|| {
                ContactServiceError::NotFound(format!("Submission with ID {} not found", id))
            })?;

        if submission.status == ContactStatus::New {
            self.repo
                .update_status(id, ContactStatus::Read)
                .await
                .context("Failed to mark submission read")?;
            submission.status = ContactStatus::Read;
        }
        Ok(submission)
    }

    pub async fn list(
        &self,
        filter: &ContactFilter,
        params: &ListParams,
    ) -> Result<PagedResult<ContactSubmission>, ContactServiceError> {
        let (items, total) = self
            .repo
            .list(filter, params)
            .await
            .context("Failed to list submissions")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn update_status(
        &self,
        id: i64,
        status: ContactStatus,
    ) -> Result<ContactSubmission, ContactServiceError> {
        let updated = self
            .repo
            .update_status(id, status)
            .await
            .context("Failed to update submission status")?;
        if !updated {
            return Err(ContactServiceError::NotFound(format!(
                "Submission with ID {} not found",
                id
            )));
        }
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get submission")?
            .ok_or_else(|| {
                ContactServiceError::NotFound(format!("Submission with ID {} not found", id))
            })
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContactServiceError> {
        if !self
            .repo
            .delete(id)
            .await
            .context("Failed to delete submission")?
        {
            return Err(ContactServiceError::NotFound(format!(
                "Submission with ID {} not found",
                id
            )));
        }
        Ok(())
    }

    pub async fn counts(&self) -> Result<ContactCounts, ContactServiceError> {
        let mut counts = ContactCounts {
            total: self
                .repo
                .count_by_status(None)
                .await
                .context("Failed to count submissions")?,
            ..Default::default()
        };
        for status in ContactStatus::ALL {
            let n = self
                .repo
                .count_by_status(Some(status))
                .await
                .context("Failed to count submissions")?;
            match status {
                ContactStatus::New => counts.new = n,
                ContactStatus::Read => counts.read = n,
                ContactStatus::Replied => counts.replied = n,
                ContactStatus::Archived => counts.archived = n,
            }
        }
        Ok(counts)
    }

    /// Drop stale rate-limit entries
    pub async fn cleanup(&self) {
        self.limiter.cleanup().await;
    }
}
