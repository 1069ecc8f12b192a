//! Shared video polling loop.
//!
//! A single background task serves every pending video job. It runs while at
//! least one video is `Generating` with an unfinished handle and exits on the
//! first tick that finds none; requesting a new video starts it again.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;

use crate::error::{StudioError, StudioResult};
use crate::session::{GeneratedVideo, VideoOperation, VideoStatus};
use crate::workflow::orchestrator::Inner;
use crate::workflow::Workflow;

/// Whether a video is still waiting on the job `sent` was taken from.
/// `None` matches a video whose job of that attempt has not been started yet.
fn is_current(video: &GeneratedVideo, attempt: u32, sent: Option<&VideoOperation>) -> bool {
    if video.status != VideoStatus::Generating || video.attempt != attempt {
        return false;
    }
    match (sent, video.operation.as_ref()) {
        (Some(sent), Some(stored)) => stored.same_job(sent),
        (None, None) => true,
        _ => false,
    }
}

async fn poll_loop(inner: Weak<Inner>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let workflow = Workflow { inner };
        let polled = workflow.poll_videos_once().await;
        tracing::debug!(polled, "video poll tick");

        let idle = {
            let mut slot = workflow.inner.poller.lock();
            let idle = !workflow.read(|s| s.has_pollable_videos());
            if idle {
                *slot = None;
            }
            idle
        };
        if idle {
            tracing::debug!("no pending videos, poller stopped");
            break;
        }
    }
}

impl Workflow {
    /// Starts the polling task unless one is already running.
    pub(crate) fn ensure_poller(&self) {
        let mut slot = self.inner.poller.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let interval = self.inner.config.poll_interval;
        tracing::debug!(?interval, "starting video poller");
        *slot = Some(tokio::spawn(poll_loop(
            Arc::downgrade(&self.inner),
            interval,
        )));
    }

    pub(crate) fn stop_poller(&self) {
        if let Some(handle) = self.inner.poller.lock().take() {
            handle.abort();
        }
    }

    /// Whether the background polling task is alive.
    pub fn is_polling(&self) -> bool {
        self.inner
            .poller
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Runs one poll over every pollable video. Returns how many were polled.
    ///
    /// Videos whose handle already reports done are not polled again.
    pub async fn poll_videos_once(&self) -> usize {
        let pending = self.read(|s| s.pollable_videos());
        let count = pending.len();
        join_all(
            pending
                .into_iter()
                .map(|(video_id, attempt, sent)| self.poll_video(video_id, attempt, sent)),
        )
        .await;
        count
    }

    async fn poll_video(&self, video_id: String, attempt: u32, sent: VideoOperation) {
        match self.inner.gateway.poll_video_operation(&sent).await {
            Ok(updated) => self.resolve_video(&video_id, attempt, &sent, updated).await,
            Err(e) => self.fail_video(&video_id, attempt, Some(&sent), &e),
        }
    }

    /// Applies a refreshed job handle to the video it was polled for.
    pub(crate) async fn resolve_video(
        &self,
        video_id: &str,
        attempt: u32,
        sent: &VideoOperation,
        updated: VideoOperation,
    ) {
        if !updated.done {
            self.write(|s| {
                s.update_video_if(
                    video_id,
                    |v| is_current(v, attempt, Some(sent)),
                    |v| v.operation = Some(updated),
                )
            });
            return;
        }

        let outcome = match updated.response.as_ref() {
            Some(result) => match result.download_uri() {
                Some(uri) => self
                    .download(uri)
                    .await
                    .map(|blob_url| (uri.to_string(), blob_url)),
                None => Err(StudioError::generation_failed(
                    "Operation completed but no video link found",
                )),
            },
            None => {
                let reason = updated
                    .error
                    .as_ref()
                    .map(|e| e.message.as_str())
                    .filter(|m| !m.is_empty())
                    .unwrap_or("unknown error");
                Err(StudioError::generation_failed(format!(
                    "Generation failed: {reason}"
                )))
            }
        };

        match outcome {
            Ok((download_url, blob_url)) => {
                let applied = self.write(|s| {
                    s.update_video_if(
                        video_id,
                        |v| is_current(v, attempt, Some(sent)),
                        |v| {
                            v.status = VideoStatus::Completed;
                            v.operation = Some(updated);
                            v.download_url = Some(download_url);
                            v.blob_url = Some(blob_url.clone());
                            v.error_message = None;
                        },
                    )
                });
                if applied {
                    tracing::info!(video_id, "video ready");
                } else {
                    self.inner.blobs.revoke(&blob_url);
                    tracing::warn!(video_id, "dropping stale video result");
                }
            }
            Err(e) => self.fail_video(video_id, attempt, Some(sent), &e),
        }
    }

    async fn download(&self, uri: &str) -> StudioResult<String> {
        let payload = self.inner.gateway.download_video_payload(uri).await?;
        self.inner.blobs.materialize(&payload)
    }

    pub(crate) fn fail_video(
        &self,
        video_id: &str,
        attempt: u32,
        sent: Option<&VideoOperation>,
        err: &StudioError,
    ) {
        tracing::warn!(video_id, error = %err, "video generation failed");
        let message = err.user_message();
        self.write(|s| {
            s.update_video_if(
                video_id,
                |v| is_current(v, attempt, sent),
                |v| {
                    v.status = VideoStatus::Failed;
                    v.error_message = Some(message);
                },
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_current_matches_job() {
        let mut video = GeneratedVideo::for_image("img-1");
        assert!(is_current(&video, 1, None));
        assert!(!is_current(&video, 0, None));

        video.operation = Some(VideoOperation::pending("operations/1"));
        assert!(!is_current(&video, 1, None));
        assert!(is_current(&video, 1, Some(&VideoOperation::pending("operations/1"))));
        assert!(!is_current(&video, 1, Some(&VideoOperation::pending("operations/2"))));

        video.attempt = 2;
        assert!(!is_current(&video, 1, Some(&VideoOperation::pending("operations/1"))));

        video.attempt = 1;
        video.status = VideoStatus::Failed;
        assert!(!is_current(&video, 1, Some(&VideoOperation::pending("operations/1"))));
    }
}
