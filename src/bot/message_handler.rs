//! Request handler: routes each inbound message through the conversation state machine

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::BotConfig;
use crate::detector::{DetectionResult, Detector};
use crate::localization::t_lang;
use crate::session::{ConversationState, SenderId, SessionStore};

use super::commands::MenuCommand;
use super::delivery::Delivery;
use super::inbound::{largest_variant, InboundMessage, MessageContent, PhotoVariant};
use super::ui_builder::{
    format_caption, information_message, main_menu_keyboard, upload_keyboard, welcome_message,
};

/// Limits and paths used by the photo flow
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Directory for downloaded photos
    pub scratch_dir: PathBuf,
    /// Keep annotated images after sending them
    pub keep_annotated: bool,
    /// Bound on the whole download, retries included
    pub download_timeout: Duration,
    /// Bound on one detector call, including a worker restart
    pub inference_timeout: Duration,
}

impl HandlerSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        let recovery = &config.detector.recovery;
        Self {
            scratch_dir: config.scratch_dir.clone(),
            keep_annotated: config.keep_annotated,
            download_timeout: config.delivery.download_budget(),
            inference_timeout: recovery
                .load_timeout()
                .saturating_add(recovery.operation_timeout().saturating_mul(2)),
        }
    }
}

pub struct RequestHandler {
    delivery: Arc<dyn Delivery>,
    detector: Arc<dyn Detector>,
    sessions: Arc<SessionStore>,
    settings: HandlerSettings,
}

impl RequestHandler {
    pub fn new(
        delivery: Arc<dyn Delivery>,
        detector: Arc<dyn Detector>,
        sessions: Arc<SessionStore>,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            delivery,
            detector,
            sessions,
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle one inbound message
    ///
    /// Never fails: any error is logged with the sender, the sender gets the
    /// generic failure text and the conversation goes back to `Idle`.
    pub async fn handle(&self, msg: InboundMessage) {
        let sender = msg.sender;
        let language_code = msg.language_code.clone();

        if let Err(e) = self.dispatch(msg).await {
            error!(user_id = %sender, error = %format!("{e:#}"), "Failed to handle message");
            self.sessions.clear(sender).await;
            self.send_failure(sender, language_code.as_deref()).await;
        }
    }

    async fn dispatch(&self, msg: InboundMessage) -> Result<()> {
        let state = self.sessions.get(msg.sender).await;
        let language_code = msg.language();

        match &msg.content {
            MessageContent::Text(text) => {
                debug!(user_id = %msg.sender, ?state, message_length = text.len(), "Received text message");
                self.handle_text(msg.sender, text, state, language_code).await
            }
            MessageContent::Photo(variants) => match state {
                ConversationState::AwaitingPhoto => {
                    self.handle_photo(msg.sender, variants, language_code).await
                }
                ConversationState::Idle => {
                    debug!(user_id = %msg.sender, "Ignoring photo outside the upload flow");
                    Ok(())
                }
            },
            MessageContent::Other => self.handle_unsupported(msg.sender, state, language_code).await,
        }
    }

    async fn handle_text(
        &self,
        sender: SenderId,
        text: &str,
        state: ConversationState,
        language_code: Option<&str>,
    ) -> Result<()> {
        match (MenuCommand::parse(text), state) {
            (Some(MenuCommand::Start), _) => {
                info!(user_id = %sender, "Sending welcome message");
                self.delivery
                    .send_text(
                        sender,
                        &welcome_message(language_code),
                        Some(&main_menu_keyboard(language_code)),
                    )
                    .await
            }
            (Some(MenuCommand::Help), _) => {
                self.delivery
                    .send_text(
                        sender,
                        &t_lang("help-text", language_code),
                        Some(&main_menu_keyboard(language_code)),
                    )
                    .await
            }
            (Some(MenuCommand::Information), _) => {
                self.delivery
                    .send_text(sender, &information_message(language_code), None)
                    .await
            }
            (Some(MenuCommand::AnalyzeSkin), _) => {
                self.sessions
                    .set(sender, ConversationState::AwaitingPhoto)
                    .await;
                debug!(user_id = %sender, "Waiting for a photo");
                self.delivery
                    .send_text(
                        sender,
                        &t_lang("upload-prompt", language_code),
                        Some(&upload_keyboard(language_code)),
                    )
                    .await
            }
            (Some(MenuCommand::Back), ConversationState::AwaitingPhoto) => {
                self.sessions.clear(sender).await;
                self.delivery
                    .send_text(
                        sender,
                        &t_lang("main-menu", language_code),
                        Some(&main_menu_keyboard(language_code)),
                    )
                    .await
            }
            (Some(MenuCommand::UploadPhoto), ConversationState::AwaitingPhoto) => {
                self.delivery
                    .send_text(sender, &t_lang("upload-hint", language_code), None)
                    .await
            }
            (_, ConversationState::AwaitingPhoto) => self.send_reminder(sender, language_code).await,
            (_, ConversationState::Idle) => {
                debug!(user_id = %sender, "Ignoring text outside any flow");
                Ok(())
            }
        }
    }

    async fn handle_unsupported(
        &self,
        sender: SenderId,
        state: ConversationState,
        language_code: Option<&str>,
    ) -> Result<()> {
        match state {
            ConversationState::AwaitingPhoto => self.send_reminder(sender, language_code).await,
            ConversationState::Idle => {
                debug!(user_id = %sender, "Ignoring unsupported message");
                Ok(())
            }
        }
    }

    async fn send_reminder(&self, sender: SenderId, language_code: Option<&str>) -> Result<()> {
        self.delivery
            .send_text(sender, &t_lang("awaiting-photo-reminder", language_code), None)
            .await
    }

    async fn send_failure(&self, sender: SenderId, language_code: Option<&str>) {
        if let Err(e) = self
            .delivery
            .send_text(
                sender,
                &t_lang("error-analysis-failed", language_code),
                Some(&main_menu_keyboard(language_code)),
            )
            .await
        {
            error!(user_id = %sender, error = %format!("{e:#}"), "Failed to send error message");
        }
    }

    async fn handle_photo(
        &self,
        sender: SenderId,
        variants: &[PhotoVariant],
        language_code: Option<&str>,
    ) -> Result<()> {
        debug!(user_id = %sender, variants = variants.len(), "Received photo");

        let outcome = self.analyze_photo(sender, variants, language_code).await;
        self.sessions.clear(sender).await;

        let result = outcome?;
        let caption = format_caption(&result.detections, language_code);
        let sent = self
            .delivery
            .send_photo(
                sender,
                &result.annotated_image,
                &caption,
                Some(&main_menu_keyboard(language_code)),
            )
            .await;

        if !self.settings.keep_annotated {
            remove_artifact(&result.annotated_image).await;
        }

        sent.context("failed to send annotated photo")?;
        info!(
            user_id = %sender,
            detections = result.detections.len(),
            "Analysis result sent"
        );
        Ok(())
    }

    async fn analyze_photo(
        &self,
        sender: SenderId,
        variants: &[PhotoVariant],
        language_code: Option<&str>,
    ) -> Result<DetectionResult> {
        self.delivery
            .send_text(sender, &t_lang("processing-photo", language_code), None)
            .await?;

        let variant =
            largest_variant(variants).ok_or_else(|| anyhow!("photo message without variants"))?;

        // Random name inside the scratch directory; removed when dropped
        let scratch = tempfile::Builder::new()
            .prefix("photo-")
            .suffix(".jpg")
            .tempfile_in(&self.settings.scratch_dir)
            .context("failed to create scratch file")?
            .into_temp_path();

        let bytes = timeout(
            self.settings.download_timeout,
            self.delivery.fetch_file(&variant.file_id, &scratch),
        )
        .await
        .map_err(|_| anyhow!("download timed out"))??;
        debug!(
            user_id = %sender,
            photo = %variant.unique_id,
            width = variant.width,
            height = variant.height,
            bytes,
            "Photo downloaded"
        );

        let result = timeout(self.settings.inference_timeout, self.detector.infer(&scratch))
            .await
            .map_err(|_| anyhow!("detector timed out"))??;

        if let Err(e) = scratch.close() {
            warn!(error = %e, "Failed to remove scratch file");
        }

        Ok(result)
    }
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Annotated image removed"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove annotated image"),
    }
}
