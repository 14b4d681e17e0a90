//! Waits for the avatar widget to load while showing synthetic progress.
//!
//! A single task owns the progress ticker, the bounded load poll and the
//! one-shot host remediation, so cancelling its token stops all three.

use crate::avatar::host::{hostname_matches, HostDocument, HostError};
use crate::avatar::widget::WidgetHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const MAX_PROGRESS: u8 = 100;

/// Label shown next to the progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingStage {
    Initializing,
    LoadingAssets,
    ConnectingServices,
    PreparingAvatar,
    Finalizing,
}

const STAGE_THRESHOLDS: [(u8, LoadingStage); 5] = [
    (0, LoadingStage::Initializing),
    (20, LoadingStage::LoadingAssets),
    (40, LoadingStage::ConnectingServices),
    (60, LoadingStage::PreparingAvatar),
    (80, LoadingStage::Finalizing),
];

impl LoadingStage {
    pub fn for_progress(progress: u8) -> Self {
        STAGE_THRESHOLDS
            .iter()
            .rev()
            .find(|(threshold, _)| progress >= *threshold)
            .map(|(_, stage)| *stage)
            .unwrap_or(LoadingStage::Initializing)
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoadingStage::Initializing => "Initializing",
            LoadingStage::LoadingAssets => "Loading assets",
            LoadingStage::ConnectingServices => "Connecting services",
            LoadingStage::PreparingAvatar => "Preparing avatar",
            LoadingStage::Finalizing => "Almost ready",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessStatus {
    Initializing,
    Polling { attempt: u32 },
    Ready,
    /// The poll bound was exhausted without the widget loading.
    GaveUp,
    /// Host remediation failed. The session keeps working without an avatar.
    Degraded,
}

impl ReadinessStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReadinessStatus::Ready | ReadinessStatus::GaveUp | ReadinessStatus::Degraded
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Visible,
    Fading,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessState {
    progress: u8,
    stage: LoadingStage,
    widget_ready: bool,
    status: ReadinessStatus,
    overlay: OverlayState,
}

impl Default for ReadinessState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessState {
    pub fn new() -> Self {
        Self {
            progress: 0,
            stage: LoadingStage::Initializing,
            widget_ready: false,
            status: ReadinessStatus::Initializing,
            overlay: OverlayState::Visible,
        }
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn stage(&self) -> LoadingStage {
        self.stage
    }

    pub fn widget_ready(&self) -> bool {
        self.widget_ready
    }

    pub fn status(&self) -> ReadinessStatus {
        self.status
    }

    pub fn overlay(&self) -> OverlayState {
        self.overlay
    }

    /// One synthetic progress step. Returns `false` once pinned at the top.
    pub(crate) fn tick(&mut self) -> bool {
        if self.widget_ready || self.progress >= MAX_PROGRESS {
            return false;
        }
        self.progress += 1;
        self.stage = LoadingStage::for_progress(self.progress);
        true
    }

    pub(crate) fn polled(&mut self, attempt: u32) {
        if !self.status.is_terminal() {
            self.status = ReadinessStatus::Polling { attempt };
        }
    }

    /// Returns `true` only the first time.
    pub(crate) fn mark_ready(&mut self) -> bool {
        if self.widget_ready {
            return false;
        }
        self.widget_ready = true;
        self.progress = MAX_PROGRESS;
        self.stage = LoadingStage::for_progress(self.progress);
        self.status = ReadinessStatus::Ready;
        true
    }

    pub(crate) fn give_up(&mut self) {
        if !self.status.is_terminal() {
            self.status = ReadinessStatus::GaveUp;
        }
    }

    pub(crate) fn degrade(&mut self) {
        if !self.status.is_terminal() {
            self.status = ReadinessStatus::Degraded;
        }
    }

    /// Moves the overlay one step towards hidden. Returns `false` when
    /// already hidden.
    pub(crate) fn advance_overlay(&mut self) -> bool {
        self.overlay = match self.overlay {
            OverlayState::Visible => OverlayState::Fading,
            OverlayState::Fading => OverlayState::Hidden,
            OverlayState::Hidden => return false,
        };
        true
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    pub progress_tick: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub remediation_delay: Duration,
    /// Hostname patterns of deployments where the widget's host element may
    /// not materialize on its own.
    pub remediation_hosts: Vec<String>,
    pub host_element_id: String,
    pub ready_display_delay: Duration,
    pub fade_duration: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            progress_tick: Duration::from_millis(60),
            poll_interval: Duration::from_millis(500),
            max_poll_attempts: 120,
            remediation_delay: Duration::from_millis(1500),
            remediation_hosts: vec![".vercel.app".to_string(), ".netlify.app".to_string()],
            host_element_id: "avatar-widget-host".to_string(),
            ready_display_delay: Duration::from_millis(800),
            fade_duration: Duration::from_millis(500),
        }
    }
}

/// Outcome of the host check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remediation {
    NotNeeded,
    Present,
    Injected,
}

pub fn remediate(host: &dyn HostDocument, config: &ReadinessConfig) -> Result<Remediation, HostError> {
    let hostname = host.hostname();
    if !config
        .remediation_hosts
        .iter()
        .any(|pattern| hostname_matches(&hostname, pattern))
    {
        return Ok(Remediation::NotNeeded);
    }
    if host.has_element(&config.host_element_id) {
        return Ok(Remediation::Present);
    }
    host.insert_placeholder(&config.host_element_id)?;
    tracing::info!(
        "injected placeholder host element `{}` on {}",
        config.host_element_id,
        hostname
    );
    Ok(Remediation::Injected)
}

pub struct ReadinessHandle {
    state_rx: watch::Receiver<ReadinessState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReadinessHandle {
    pub fn state(&self) -> ReadinessState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.state_rx.clone()
    }

    /// Stops ticker, poll and remediation together.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the task to end, either on its own or after [`cancel`](Self::cancel).
    pub async fn join(self) -> ReadinessState {
        if let Err(e) = self.task.await {
            tracing::error!("readiness task failed: {}", e);
        }
        *self.state_rx.borrow()
    }
}

/// Spawns the readiness task. `cancel` is typically a child of the session's
/// token.
pub fn start(
    widget: WidgetHandle,
    host: Arc<dyn HostDocument + Send + Sync>,
    config: ReadinessConfig,
    cancel: CancellationToken,
) -> ReadinessHandle {
    let (state_tx, state_rx) = watch::channel(ReadinessState::new());
    let task = tokio::spawn(run(widget, host, config, state_tx, cancel.clone()));
    ReadinessHandle {
        state_rx,
        cancel,
        task,
    }
}

async fn run(
    widget: WidgetHandle,
    host: Arc<dyn HostDocument + Send + Sync>,
    config: ReadinessConfig,
    state_tx: watch::Sender<ReadinessState>,
    cancel: CancellationToken,
) {
    let mut state = ReadinessState::new();

    let mut ticker = tokio::time::interval(config.progress_tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let poll = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(poll);
    let remediation = tokio::time::sleep(config.remediation_delay);
    tokio::pin!(remediation);
    let mut remediation_pending = true;
    let mut attempt: u32 = 0;

    while !state.status().is_terminal() {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("readiness polling cancelled");
                return;
            }
            _ = ticker.tick(), if state.progress() < MAX_PROGRESS => {
                state.tick();
            }
            _ = &mut poll => {
                attempt += 1;
                if widget.is_loaded() {
                    state.mark_ready();
                    tracing::info!("avatar widget ready after {} polls", attempt);
                } else if attempt >= config.max_poll_attempts {
                    state.give_up();
                    tracing::warn!("avatar widget did not load after {} polls", attempt);
                } else {
                    state.polled(attempt);
                    poll.as_mut().reset(Instant::now() + config.poll_interval);
                }
            }
            _ = &mut remediation, if remediation_pending => {
                remediation_pending = false;
                if let Err(e) = remediate(host.as_ref(), &config) {
                    tracing::warn!("avatar host remediation failed: {}", e);
                    state.degrade();
                }
            }
        }
        state_tx.send_replace(state);
    }

    // Terminal: let the final state show, then fade the overlay out.
    let steps = [config.ready_display_delay, config.fade_duration];
    for delay in steps {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        if state.advance_overlay() {
            tracing::debug!("loading overlay {:?}", state.overlay());
            state_tx.send_replace(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::host::{MockHostDocument, StaticHost};
    use crate::avatar::widget::AvatarWidget;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn fast_config() -> ReadinessConfig {
        ReadinessConfig {
            progress_tick: Duration::from_millis(10),
            poll_interval: Duration::from_millis(100),
            max_poll_attempts: 50,
            remediation_delay: Duration::from_millis(50),
            remediation_hosts: vec![".vercel.app".to_string()],
            host_element_id: "avatar-host".to_string(),
            ready_display_delay: Duration::from_millis(200),
            fade_duration: Duration::from_millis(100),
        }
    }

    fn plain_host() -> Arc<dyn HostDocument + Send + Sync> {
        Arc::new(StaticHost::new("localhost"))
    }

    #[test]
    fn stage_is_a_step_function_of_progress() {
        assert_eq!(LoadingStage::for_progress(0), LoadingStage::Initializing);
        assert_eq!(LoadingStage::for_progress(19), LoadingStage::Initializing);
        assert_eq!(LoadingStage::for_progress(20), LoadingStage::LoadingAssets);
        assert_eq!(LoadingStage::for_progress(59), LoadingStage::ConnectingServices);
        assert_eq!(LoadingStage::for_progress(60), LoadingStage::PreparingAvatar);
        assert_eq!(LoadingStage::for_progress(100), LoadingStage::Finalizing);
    }

    #[test]
    fn progress_climbs_and_pins_once_ready() {
        let mut state = ReadinessState::new();
        let mut last = state.progress();
        for _ in 0..30 {
            assert!(state.tick());
            assert_eq!(state.progress(), last + 1);
            last = state.progress();
        }

        assert!(state.mark_ready());
        assert!(!state.mark_ready());
        assert_eq!(state.progress(), MAX_PROGRESS);
        assert!(!state.tick());
        assert_eq!(state.progress(), MAX_PROGRESS);
    }

    #[test]
    fn overlay_hides_exactly_once() {
        let mut state = ReadinessState::new();
        assert!(state.advance_overlay());
        assert_eq!(state.overlay(), OverlayState::Fading);
        assert!(state.advance_overlay());
        assert_eq!(state.overlay(), OverlayState::Hidden);
        assert!(!state.advance_overlay());
        assert_eq!(state.overlay(), OverlayState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn late_widget_becomes_ready_and_overlay_hides() {
        let widget = WidgetHandle::new();
        let handle = start(widget.clone(), plain_host(), fast_config(), CancellationToken::new());
        let mut rx = handle.subscribe();

        tokio::time::sleep(Duration::from_millis(350)).await;
        let before = handle.state();
        assert!(!before.widget_ready());
        assert!(matches!(before.status(), ReadinessStatus::Polling { .. }));
        assert!(before.progress() > 0 && before.progress() < MAX_PROGRESS);

        widget.install(AvatarWidget::new().with_is_loaded(|| true));

        let mut last_progress = before.progress();
        let mut hidden_seen = 0;
        while rx.changed().await.is_ok() {
            let state = *rx.borrow_and_update();
            assert!(state.progress() >= last_progress, "progress went backwards");
            last_progress = state.progress();
            if state.overlay() == OverlayState::Hidden {
                hidden_seen += 1;
            }
        }

        let finished = handle.join().await;
        assert_eq!(finished.status(), ReadinessStatus::Ready);
        assert!(finished.widget_ready());
        assert_eq!(finished.progress(), MAX_PROGRESS);
        assert_eq!(finished.overlay(), OverlayState::Hidden);
        assert_eq!(hidden_seen, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn polling_gives_up_after_the_bound() {
        let config = ReadinessConfig {
            max_poll_attempts: 3,
            ..fast_config()
        };
        let handle = start(WidgetHandle::new(), plain_host(), config, CancellationToken::new());

        let finished = handle.join().await;
        assert_eq!(finished.status(), ReadinessStatus::GaveUp);
        assert!(!finished.widget_ready());
        assert_eq!(finished.overlay(), OverlayState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn injects_placeholder_on_known_hosts() {
        let mut host = MockHostDocument::new();
        host.expect_hostname().return_const("demo.vercel.app".to_string());
        host.expect_has_element()
            .withf(|id| id == "avatar-host")
            .return_const(false);
        host.expect_insert_placeholder()
            .withf(|id| id == "avatar-host")
            .times(1)
            .returning(|_| Ok(()));

        let loaded = Arc::new(AtomicBool::new(false));
        let widget = WidgetHandle::new();
        let flag = loaded.clone();
        widget.install(AvatarWidget::new().with_is_loaded(move || flag.load(Ordering::SeqCst)));

        let handle = start(widget, Arc::new(host), fast_config(), CancellationToken::new());
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!handle.is_finished());

        loaded.store(true, Ordering::SeqCst);
        let finished = handle.join().await;
        assert_eq!(finished.status(), ReadinessStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_remediation_degrades() {
        let mut host = MockHostDocument::new();
        host.expect_hostname().return_const("demo.vercel.app".to_string());
        host.expect_has_element().return_const(false);
        host.expect_insert_placeholder().returning(|id| {
            Err(HostError::Placeholder {
                id: id.to_string(),
                reason: "document body missing".to_string(),
            })
        });

        let handle = start(WidgetHandle::new(), Arc::new(host), fast_config(), CancellationToken::new());
        let finished = handle.join().await;
        assert_eq!(finished.status(), ReadinessStatus::Degraded);
        assert_eq!(finished.overlay(), OverlayState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_everything() {
        let handle = start(WidgetHandle::new(), plain_host(), fast_config(), CancellationToken::new());
        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.cancel();

        let finished = handle.join().await;
        assert!(!finished.status().is_terminal());
        assert_eq!(finished.overlay(), OverlayState::Visible);
    }
}
