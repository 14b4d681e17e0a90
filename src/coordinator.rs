//! The session actor.
//!
//! One task owns the dispatcher, voice gate and intent synchronizer and
//! handles commands, staged voice and server events one at a time, so every
//! check-then-act runs without interleaving.

use crate::avatar::readiness::{self, ReadinessHandle, ReadinessState};
use crate::avatar::{HostDocument, IntentSynchronizer, WidgetHandle};
use crate::client::{self, Client, ServerRx, Transport};
use crate::config::SessionConfig;
use crate::dispatch::Dispatcher;
use crate::session::SessionState;
use crate::types::avatar::{AvatarIntent, Mood};
use crate::types::{Message, ServerEvent};
use crate::utils::volume::VolumeMeter;
use crate::voice::{StagedVoice, VoiceGate};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetInput(String),
    Submit(String),
    SubmitVoice(String),
    StartListening,
    StopListening,
    SetMood(Mood),
    SetMuted(bool),
    Volume(f32),
    Shutdown,
}

/// Output of the speech recognizer.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// A complete utterance.
    Transcript(String),
    Volume(f32),
}

/// Snapshot published after every handled input.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub transcript: Vec<Message>,
    pub state: SessionState,
    /// Mood, mute and listening as chosen locally.
    pub intent: AvatarIntent,
    /// What the widget last accepted; lags `intent` while the widget is
    /// missing or lacks a method.
    pub applied_intent: AvatarIntent,
    pub input: String,
    pub input_level: f32,
    pub processing_voice: bool,
}

pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<SessionView>,
    readiness: ReadinessHandle,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn send(&self, command: Command) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("session has shut down"))
    }

    pub async fn set_input(&self, text: &str) -> anyhow::Result<()> {
        self.send(Command::SetInput(text.to_string())).await
    }

    pub async fn submit(&self, text: &str) -> anyhow::Result<()> {
        self.send(Command::Submit(text.to_string())).await
    }

    pub async fn submit_voice(&self, transcript: &str) -> anyhow::Result<()> {
        self.send(Command::SubmitVoice(transcript.to_string())).await
    }

    pub async fn start_listening(&self) -> anyhow::Result<()> {
        self.send(Command::StartListening).await
    }

    pub async fn stop_listening(&self) -> anyhow::Result<()> {
        self.send(Command::StopListening).await
    }

    pub async fn set_mood(&self, mood: Mood) -> anyhow::Result<()> {
        self.send(Command::SetMood(mood)).await
    }

    pub async fn set_muted(&self, muted: bool) -> anyhow::Result<()> {
        self.send(Command::SetMuted(muted)).await
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn readiness(&self) -> &ReadinessHandle {
        &self.readiness
    }

    /// Forwards a recognizer stream into the session until it ends or the
    /// session shuts down.
    pub fn attach_speech<S>(&self, speech: S) -> JoinHandle<()>
    where
        S: Stream<Item = SpeechEvent> + Send + 'static,
    {
        let commands = self.commands.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            tokio::pin!(speech);
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = speech.next() => event,
                };
                let Some(event) = event else {
                    tracing::debug!("speech input ended");
                    break;
                };
                let command = match event {
                    SpeechEvent::Transcript(text) => Command::SubmitVoice(text),
                    SpeechEvent::Volume(level) => Command::Volume(level),
                };
                if commands.send(command).await.is_err() {
                    break;
                }
            }
        })
    }

    /// Stops the actor, closes the transport and cancels every timer the
    /// session started.
    pub async fn shutdown(self) {
        // The actor may already be gone; cancellation covers that case.
        let _ = self.commands.send(Command::Shutdown).await;
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("session task failed: {}", e);
        }
        self.readiness.join().await;
    }
}

/// Connects to the backend and starts a session on top of the connection.
pub fn connect(
    client_config: client::Config,
    config: SessionConfig,
    widget: WidgetHandle,
    host: Arc<dyn HostDocument + Send + Sync>,
) -> anyhow::Result<SessionHandle> {
    let mut client = Client::new(client_config);
    let server_rx = client.server_events();
    client.connect()?;
    Ok(spawn(client, server_rx, widget, host, config))
}

/// Starts a session over any transport. `server_rx` must deliver the
/// transport's events, lifecycle included.
pub fn spawn<T>(
    transport: T,
    server_rx: ServerRx,
    widget: WidgetHandle,
    host: Arc<dyn HostDocument + Send + Sync>,
    config: SessionConfig,
) -> SessionHandle
where
    T: Transport + Send + 'static,
{
    let cancel = CancellationToken::new();
    let readiness = readiness::start(
        widget.clone(),
        host,
        config.readiness.clone(),
        cancel.child_token(),
    );

    let (commands_tx, commands_rx) = mpsc::channel(config.command_capacity.max(1));
    let (view_tx, view_rx) = watch::channel(SessionView::default());
    let (staged_tx, staged_rx) = mpsc::channel(1);
    let readiness_rx = readiness.subscribe();

    let coordinator = SessionCoordinator {
        dispatcher: Dispatcher::new(transport),
        synchronizer: IntentSynchronizer::new(
            widget,
            &config.speak_provider,
            config.speak_config.clone(),
        ),
        voice: VoiceGate::new(),
        meter: VolumeMeter::default(),
        intent: AvatarIntent::default(),
        base_mood: Mood::default(),
        readiness_rx,
        watching_readiness: true,
        server_rx,
        server_open: true,
        staged_tx,
        staged_rx,
        view_tx,
        cancel: cancel.clone(),
        config,
    };
    let task = tokio::spawn(coordinator.run(commands_rx));

    SessionHandle {
        commands: commands_tx,
        view: view_rx,
        readiness,
        cancel,
        task,
    }
}

struct SessionCoordinator<T> {
    dispatcher: Dispatcher<T>,
    synchronizer: IntentSynchronizer,
    voice: VoiceGate,
    meter: VolumeMeter,
    intent: AvatarIntent,
    /// Mood to return to once a pending request resolves.
    base_mood: Mood,
    readiness_rx: watch::Receiver<ReadinessState>,
    /// Cleared once the widget has been brought up to date.
    watching_readiness: bool,
    server_rx: ServerRx,
    server_open: bool,
    staged_tx: mpsc::Sender<StagedVoice>,
    staged_rx: mpsc::Receiver<StagedVoice>,
    view_tx: watch::Sender<SessionView>,
    cancel: CancellationToken,
    config: SessionConfig,
}

impl<T: Transport> SessionCoordinator<T> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.readiness_changed();
        self.publish();
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => self.handle_command(command),
                },
                Some(staged) = self.staged_rx.recv() => self.dispatch_voice(staged),
                changed = self.readiness_rx.changed(), if self.watching_readiness => match changed {
                    Ok(()) => self.readiness_changed(),
                    Err(_) => self.watching_readiness = false,
                },
                event = self.server_rx.recv(), if self.server_open => match event {
                    Ok(event) => self.handle_server_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("session lagged behind, {} server events skipped", skipped);
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("server event stream closed");
                        self.server_open = false;
                    }
                },
            }
            self.publish();
        }
        self.teardown();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetInput(text) => self.dispatcher.set_input(&text),
            Command::Submit(text) => self.submit(&text),
            Command::SubmitVoice(transcript) => self.submit_voice(&transcript),
            Command::StartListening => match self.dispatcher.start_listening() {
                Ok(()) => {
                    self.meter.reset();
                    self.intent.listening = true;
                    self.synchronizer.set_listening(true);
                }
                Err(e) => tracing::debug!("not starting to listen: {}", e),
            },
            Command::StopListening => self.stop_listening(),
            Command::SetMood(mood) => {
                self.base_mood = mood;
                self.show_mood(mood);
            }
            Command::SetMuted(muted) => {
                self.intent.muted = muted;
                self.synchronizer.set_muted(muted);
            }
            Command::Volume(level) => {
                self.meter.update(level);
            }
            Command::Shutdown => self.cancel.cancel(),
        }
    }

    fn submit(&mut self, text: &str) {
        match self.dispatcher.submit(text) {
            Ok(_) => self.show_mood(Mood::Thinking),
            Err(e) => tracing::debug!("submission not sent: {}", e),
        }
    }

    /// Stages a transcript and schedules its dispatch. The voice permit
    /// travels with the staged value and is released after dispatch.
    fn submit_voice(&mut self, transcript: &str) {
        let staged = match self.voice.stage(transcript) {
            Ok(staged) => staged,
            Err(e) => {
                tracing::debug!("voice transcript ignored: {}", e);
                return;
            }
        };
        // A final transcript ends the utterance.
        if self.dispatcher.state().listening() {
            self.stop_listening();
        }

        let staged_tx = self.staged_tx.clone();
        let delay = self.config.voice_staging_delay;
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if staged_tx.send(staged).await.is_err() {
                        tracing::debug!("session gone before staged voice was dispatched");
                    }
                }
            }
        });
    }

    fn dispatch_voice(&mut self, staged: StagedVoice) {
        self.submit(staged.text());
        drop(staged);
    }

    fn stop_listening(&mut self) {
        if self.dispatcher.state().listening() {
            self.dispatcher.stop_listening();
            self.meter.reset();
            self.intent.listening = false;
            self.synchronizer.set_listening(false);
        }
    }

    fn show_mood(&mut self, mood: Mood) {
        self.intent.mood = mood;
        self.synchronizer.set_mood(mood);
    }

    /// Once the widget loads, replays local choices it missed.
    fn readiness_changed(&mut self) {
        let ready = self.readiness_rx.borrow_and_update().widget_ready();
        if ready {
            self.watching_readiness = false;
            tracing::debug!("avatar widget ready, syncing {:?}", self.intent);
            self.synchronizer.sync(self.intent);
        }
    }

    fn handle_server_event(&mut self, event: ServerEvent) {
        let was_awaiting = self.dispatcher.state().awaiting_response();
        if let Some(text) = self.dispatcher.handle_event(event) {
            self.synchronizer.speak(&text);
        }
        if was_awaiting && !self.dispatcher.state().awaiting_response() {
            self.show_mood(self.base_mood);
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(SessionView {
            transcript: self.dispatcher.transcript().messages().to_vec(),
            state: self.dispatcher.state().clone(),
            intent: self.intent,
            applied_intent: self.synchronizer.applied(),
            input: self.dispatcher.input().to_string(),
            input_level: self.meter.level(),
            processing_voice: self.voice.is_processing(),
        });
    }

    fn teardown(&mut self) {
        tracing::info!("session shutting down");
        self.cancel.cancel();
        self.dispatcher.close();
        self.staged_rx.close();
    }
}
