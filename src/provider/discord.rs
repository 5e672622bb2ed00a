//! Attachments of a Discord message
//!
//! The message is looked up with a bot token; its first attachment is then
//! fetched like a plain URL, including the archive check.

use crate::error::{RunTaskError, RunTaskResult};
use crate::manifest::{bucket_key, sanitize_segment, Namespace};
use crate::provider::fetch::{self, FetchPlan};
use crate::provider::{join_url, ResolveContext};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub filename: String,
}

pub(crate) async fn resolve(
    ctx: &ResolveContext<'_>,
    channel_id: &str,
    message_id: &str,
    token: &str,
) -> RunTaskResult<PathBuf> {
    let namespace = Namespace::new(&["discord"])?;
    let mut txn = fetch::open(ctx, &namespace).await?;
    let bucket = bucket_key(&[message_id])?;
    let label = format!("Discord message {} attachment", message_id);
    let policy = ctx.policy();

    // Attachments never change once posted
    if !policy.refresh || policy.offline {
        let keys: Vec<String> = txn
            .manifest()
            .bucket(&bucket)
            .map(|b| b.entries.keys().cloned().collect())
            .unwrap_or_default();
        for key in keys {
            if let Some(cached) = fetch::verified_entry(&mut txn, &bucket, &key).await? {
                info!("Located {} in local cache.", label);
                return Ok(cached.path);
            }
        }
    }

    if policy.offline {
        return Err(RunTaskError::OfflineNotCached(label));
    }

    let url = join_url(
        &ctx.config.endpoints.discord,
        &["channels", channel_id, "messages", message_id],
    )?;
    let headers = vec![("Authorization".to_string(), format!("Bot {}", token))];
    let message: Message = ctx.client.get_json(&url, &headers).await?;

    let attachment = message
        .attachments
        .first()
        .ok_or_else(|| RunTaskError::metadata(&url, "message has no attachments"))?;
    let file_name = sanitize_segment(&attachment.filename)?;

    let mut plan = FetchPlan::new(
        bucket,
        file_name.clone(),
        file_name,
        attachment.url.clone(),
        format!("{} ({})", label, attachment.filename),
    );
    plan.check_archive = true;
    fetch::fetch_into(ctx, &mut txn, &plan, None).await
}
