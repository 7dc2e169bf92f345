#![allow(dead_code)] // embedded by the capture frontends, exercised here by tests

//! Audio recording session state machine: `Idle -> Recording <-> Paused -> Idle`.
//!
//! The capture device is behind the [`CaptureSource`] seam; chunks arrive on
//! an event-driven channel and are accumulated by a drain task, the way a
//! browser recorder pushes chunks from its data callback. Elapsed duration is
//! driven by an owned 1-second tick task that only runs while the state is
//! `Recording`, and every exit path (stop, drop, error) aborts the tick and
//! releases the device.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("microphone access denied")]
    PermissionDenied,

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
}

impl RecorderError {
    /// User-facing message, in the language of the product. Permission
    /// denials are recoverable: the user can grant access and retry.
    pub fn user_message(&self) -> &'static str {
        match self {
            RecorderError::PermissionDenied => {
                "Accès au microphone refusé. Veuillez autoriser l'accès dans les paramètres de votre navigateur."
            }
            RecorderError::DeviceUnavailable(_) => "Impossible d'accéder au microphone.",
        }
    }
}

/// An open capture device. Dropping the handle releases the device and closes
/// the chunk channel.
pub trait DeviceHandle: Send {
    fn pause(&mut self) {}
    fn resume(&mut self) {}
}

/// Opens the microphone and returns a device handle plus the channel on which
/// captured chunks arrive.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn open(&self) -> Result<(Box<dyn DeviceHandle>, mpsc::Receiver<Bytes>), RecorderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderPhase {
    Idle,
    Recording,
    Paused,
}

struct ActiveSession {
    device: Box<dyn DeviceHandle>,
    chunks: Arc<Mutex<Vec<Bytes>>>,
    drain: JoinHandle<()>,
    tick: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn stop_tick(&mut self) {
        if let Some(tick) = self.tick.take() {
            tick.abort();
        }
    }
}

/// A single-session recorder. Starting while a session is active is a no-op
/// guard, not an error.
pub struct Recorder<S: CaptureSource> {
    source: S,
    phase: RecorderPhase,
    elapsed_seconds: Arc<AtomicU64>,
    session: Option<ActiveSession>,
}

impl<S: CaptureSource> Recorder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            phase: RecorderPhase::Idle,
            elapsed_seconds: Arc::new(AtomicU64::new(0)),
            session: None,
        }
    }

    pub fn phase(&self) -> RecorderPhase {
        self.phase
    }

    /// Elapsed recording time in whole seconds, excluding paused intervals.
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds.load(Ordering::SeqCst)
    }

    /// Requests the device and enters `Recording`. No-op when a session is
    /// already active.
    pub async fn start(&mut self) -> Result<(), RecorderError> {
        if self.session.is_some() {
            return Ok(());
        }

        self.elapsed_seconds.store(0, Ordering::SeqCst);
        let (device, mut receiver) = self.source.open().await?;

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let drain_chunks = Arc::clone(&chunks);
        let drain = tokio::spawn(async move {
            while let Some(chunk) = receiver.recv().await {
                if !chunk.is_empty() {
                    drain_chunks.lock().unwrap().push(chunk);
                }
            }
        });

        let mut session = ActiveSession {
            device,
            chunks,
            drain,
            tick: None,
        };
        session.tick = Some(self.spawn_tick());
        self.session = Some(session);
        self.phase = RecorderPhase::Recording;
        Ok(())
    }

    /// Stops the tick and keeps captured chunks. Only valid from `Recording`.
    pub fn pause(&mut self) {
        if self.phase != RecorderPhase::Recording {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.stop_tick();
            session.device.pause();
            self.phase = RecorderPhase::Paused;
        }
    }

    /// Restarts the tick. Only valid from `Paused`.
    pub fn resume(&mut self) {
        if self.phase != RecorderPhase::Paused {
            return;
        }
        let tick = self.spawn_tick();
        if let Some(session) = self.session.as_mut() {
            session.device.resume();
            session.tick = Some(tick);
            self.phase = RecorderPhase::Recording;
        }
    }

    /// Finalizes the session: releases the device, concatenates captured
    /// chunks into one blob and returns it with the elapsed duration.
    /// Returns `None` when no session is active.
    pub async fn stop(&mut self) -> Option<(Bytes, u64)> {
        let mut session = self.session.take()?;
        session.stop_tick();

        let ActiveSession {
            device,
            chunks,
            drain,
            ..
        } = session;

        // Dropping the device handle releases the microphone and closes the
        // chunk channel, letting the drain task run to completion.
        drop(device);
        let _ = drain.await;

        let collected = {
            let mut guard = chunks.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        let blob: Bytes = collected.concat().into();

        self.phase = RecorderPhase::Idle;
        Some((blob, self.elapsed_seconds()))
    }

    fn spawn_tick(&self) -> JoinHandle<()> {
        let elapsed = Arc::clone(&self.elapsed_seconds);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                elapsed.fetch_add(1, Ordering::SeqCst);
            }
        })
    }
}

/// Abnormal teardown (component unmount, panic unwind) must still cancel the
/// tick and release the device; dropping the session's handles does both.
impl<S: CaptureSource> Drop for Recorder<S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.stop_tick();
            session.drain.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::yield_now;
    use tokio::time::advance;

    struct FakeDevice {
        sender: Option<mpsc::Sender<Bytes>>,
    }

    impl DeviceHandle for FakeDevice {}

    // Holds only a weak sender so the device handle owns the channel's
    // lifetime; stop() relies on the channel closing when the device drops.
    struct FakeSource {
        fail_with: Option<fn() -> RecorderError>,
        chunk_sender: std::sync::Mutex<Option<mpsc::WeakSender<Bytes>>>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                fail_with: None,
                chunk_sender: std::sync::Mutex::new(None),
            }
        }

        fn failing(err: fn() -> RecorderError) -> Self {
            Self {
                fail_with: Some(err),
                chunk_sender: std::sync::Mutex::new(None),
            }
        }

        fn sender(&self) -> mpsc::Sender<Bytes> {
            self.chunk_sender
                .lock()
                .unwrap()
                .as_ref()
                .and_then(mpsc::WeakSender::upgrade)
                .unwrap()
        }
    }

    #[async_trait]
    impl CaptureSource for &FakeSource {
        async fn open(
            &self,
        ) -> Result<(Box<dyn DeviceHandle>, mpsc::Receiver<Bytes>), RecorderError> {
            if let Some(err) = self.fail_with {
                return Err(err());
            }
            let (tx, rx) = mpsc::channel(16);
            *self.chunk_sender.lock().unwrap() = Some(tx.downgrade());
            Ok((Box::new(FakeDevice { sender: Some(tx) }), rx))
        }
    }

    async fn tick_seconds(n: u64) {
        // Let a freshly spawned tick task register its timer before the
        // clock jumps; `advance` does not poll unstarted tasks first.
        yield_now().await;
        for _ in 0..n {
            advance(Duration::from_secs(1)).await;
            yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn duration_counts_only_recording_time() {
        let source = FakeSource::new();
        let mut recorder = Recorder::new(&source);

        recorder.start().await.unwrap();
        tick_seconds(3).await;

        recorder.pause();
        tick_seconds(5).await; // paused time must not count

        recorder.resume();
        tick_seconds(2).await;

        let (_, duration) = recorder.stop().await.unwrap();
        assert_eq!(duration, 5);
        assert_eq!(recorder.phase(), RecorderPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_idle_yields_no_blob() {
        let source = FakeSource::new();
        let mut recorder = Recorder::new(&source);

        assert!(recorder.stop().await.is_none());
        assert_eq!(recorder.phase(), RecorderPhase::Idle);
        assert_eq!(recorder.elapsed_seconds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_concatenates_captured_chunks() {
        let source = FakeSource::new();
        let mut recorder = Recorder::new(&source);

        recorder.start().await.unwrap();
        let sender = source.sender();
        sender.send(Bytes::from_static(b"abc")).await.unwrap();
        sender.send(Bytes::from_static(b"")).await.unwrap(); // empty chunks dropped
        sender.send(Bytes::from_static(b"def")).await.unwrap();
        drop(sender);
        yield_now().await;

        let (blob, _) = recorder.stop().await.unwrap();
        assert_eq!(&blob[..], b"abcdef");
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_recording_is_a_noop() {
        let source = FakeSource::new();
        let mut recorder = Recorder::new(&source);

        recorder.start().await.unwrap();
        tick_seconds(2).await;

        // Second start must not reset the session or the elapsed counter.
        recorder.start().await.unwrap();
        assert_eq!(recorder.elapsed_seconds(), 2);
        assert_eq!(recorder.phase(), RecorderPhase::Recording);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_outside_recording_and_resume_outside_paused_are_noops() {
        let source = FakeSource::new();
        let mut recorder = Recorder::new(&source);

        recorder.pause();
        assert_eq!(recorder.phase(), RecorderPhase::Idle);
        recorder.resume();
        assert_eq!(recorder.phase(), RecorderPhase::Idle);

        recorder.start().await.unwrap();
        recorder.resume(); // not paused
        assert_eq!(recorder.phase(), RecorderPhase::Recording);
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_is_surfaced_with_user_message() {
        let source = FakeSource::failing(|| RecorderError::PermissionDenied);
        let mut recorder = Recorder::new(&source);

        let err = recorder.start().await.unwrap_err();
        assert!(err.user_message().contains("microphone"));
        assert_eq!(recorder.phase(), RecorderPhase::Idle);
    }

    // Silence the unused-field lint on the fake: the sender is held so the
    // channel stays open for exactly as long as the device handle lives.
    impl Drop for FakeDevice {
        fn drop(&mut self) {
            self.sender.take();
        }
    }
}
