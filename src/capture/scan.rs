//! Continuous scanning as an explicit cancellable task.
//!
//! A [`ScanSession`] owns a [`FrameSource`] (a camera, in practice) and moves
//! through `Idle -> Scanning -> {Decoded, Stopped, Errored}` exactly once.
//! The source is released on every exit path: stop, successful decode, error,
//! and the session handle being dropped.

use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    codec::{self, GrayFrame},
    content::ContentKind,
    CaptureError,
};
use crate::qrcodes::dto::CreateQrRequest;

#[async_trait]
pub trait FrameSource: Send {
    /// `Ok(None)` means no frame is ready yet.
    async fn next_frame(&mut self) -> Result<Option<GrayFrame>, CaptureError>;

    /// Stops the device. Called exactly once by the session.
    fn release(&mut self);
}

/// A successfully decoded code plus the frame it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scanned {
    pub text: String,
    pub kind: ContentKind,
    /// PNG data URI of the frame.
    pub image: String,
}

impl Scanned {
    fn from_frame(text: String, frame: &GrayFrame) -> Result<Self, CaptureError> {
        Ok(Self {
            kind: ContentKind::classify(&text),
            image: codec::png_data_uri(&frame.to_png()?),
            text,
        })
    }

    pub fn to_request(&self) -> CreateQrRequest {
        CreateQrRequest {
            title: Some(self.kind.scan_title().to_string()),
            content: self.text.clone(),
            image: self.image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Decoded(Scanned),
    Stopped,
    Errored(String),
}

impl ScanState {
    pub fn label(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Decoded(_) => "decoded",
            ScanState::Stopped => "stopped",
            ScanState::Errored(_) => "errored",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanState::Decoded(_) | ScanState::Stopped | ScanState::Errored(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Pause between frame polls, roughly one display refresh by default.
    pub frame_interval: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
        }
    }
}

pub struct ScanSession {
    cancel: CancellationToken,
    state: watch::Receiver<ScanState>,
    task: Option<JoinHandle<ScanState>>,
}

impl ScanSession {
    /// Spawns the scan loop on the current tokio runtime.
    pub fn start<S>(source: S, opts: ScanOptions) -> Self
    where
        S: FrameSource + 'static,
    {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(ScanState::Idle);
        let task = tokio::spawn(run(source, opts, cancel.clone(), tx));
        Self {
            cancel,
            state: rx,
            task: Some(task),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state.borrow().clone()
    }

    /// Requests a stop; the loop releases the source and ends in `Stopped`
    /// unless it already reached another terminal state.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits for the terminal state.
    pub async fn finish(mut self) -> ScanState {
        let Some(task) = self.task.take() else {
            return self.state();
        };
        match task.await {
            Ok(state) => state,
            Err(e) => ScanState::Errored(format!("scan task failed: {e}")),
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct SourceGuard<S: FrameSource> {
    source: S,
    released: bool,
}

impl<S: FrameSource> SourceGuard<S> {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.source.release();
            debug!("frame source released");
        }
    }
}

impl<S: FrameSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}

async fn run<S: FrameSource>(
    source: S,
    opts: ScanOptions,
    cancel: CancellationToken,
    tx: watch::Sender<ScanState>,
) -> ScanState {
    let mut guard = SourceGuard {
        source,
        released: false,
    };
    tx.send_replace(ScanState::Scanning);
    info!("scan started");

    let terminal = loop {
        let polled = tokio::select! {
            biased;
            _ = cancel.cancelled() => break ScanState::Stopped,
            f = guard.source.next_frame() => f,
        };

        match polled {
            Err(e) => {
                warn!(error = %e, "frame source failed");
                break ScanState::Errored(e.to_string());
            }
            Ok(Some(frame)) => match decode_off_thread(frame).await {
                Ok(Some(scanned)) => break ScanState::Decoded(scanned),
                Ok(None) => {}
                Err(e) => break ScanState::Errored(e.to_string()),
            },
            Ok(None) => {}
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break ScanState::Stopped,
            _ = tokio::time::sleep(opts.frame_interval) => {}
        }
    };

    guard.release();
    info!(state = terminal.label(), "scan finished");
    tx.send_replace(terminal.clone());
    terminal
}

async fn decode_off_thread(frame: GrayFrame) -> Result<Option<Scanned>, CaptureError> {
    tokio::task::spawn_blocking(move || match codec::decode(&frame) {
        Some(text) => Scanned::from_frame(text, &frame).map(Some),
        None => Ok(None),
    })
    .await
    .map_err(|e| CaptureError::Decoder(e.to_string()))?
}

/// Single-shot path for an uploaded image. `Ok(None)` means no code was found.
pub async fn scan_image(bytes: Vec<u8>) -> Result<Option<Scanned>, CaptureError> {
    let frame = tokio::task::spawn_blocking(move || GrayFrame::from_image_bytes(&bytes))
        .await
        .map_err(|e| CaptureError::Decoder(e.to_string()))??;
    decode_off_thread(frame).await
}
