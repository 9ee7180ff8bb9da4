//! EngineHandle: the session actor and its command pipeline.
//!
//! A single actor task owns the `GameSession`. Every mutation (clock ticks,
//! pitch readings, hits, lifecycle calls) reaches it as a `SessionCommand`
//! over an unbounded channel and is applied in arrival order. After each
//! step the actor publishes the queued `GameEvent`s on the broadcast channel
//! and the latest `SessionSnapshot` on a watch channel.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use crate::analysis::{spawn_pitch_thread, PitchSample, SourceFactory};
use crate::audio::{CaptureConfig, CpalSource, SampleSource};
use crate::config::AppConfig;
use crate::engine::clock::{GameClock, SystemTimeSource, TimeSource};
use crate::error::{log_audio_error, log_session_error, AudioError, SessionError};
use crate::game::{clamp_difficulty, clamp_volume, GameEvent, GameSession, NoteId};
use crate::game::{SessionSnapshot, SessionStatus};
use crate::managers::BroadcastChannelManager;

/// Messages processed by the session actor, strictly in order
#[derive(Debug)]
pub enum SessionCommand {
    /// External clock value (used when the internal clock is off)
    Tick { clock_ms: u64 },
    /// Pitch reading tagged with the capture epoch it came from
    Pitch {
        epoch: u64,
        sample: Option<PitchSample>,
    },
    Hit { id: NoteId, accuracy: f32 },
    Miss { id: NoteId },
    Start,
    Pause,
    Resume,
    Reset,
    SetDifficulty(u8),
    SetVolume(f32),
    AddScore(u64),
    ResetCombo,
    /// Answered once every earlier command has been applied and published
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// How the actor measures time
pub struct EngineOptions {
    pub time_source: Arc<dyn TimeSource>,
    /// Drive `update_time` from a `tokio::time::interval` inside the actor.
    /// When `false`, the owner sends `tick` calls instead.
    pub internal_clock: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            time_source: Arc::new(SystemTimeSource::default()),
            internal_clock: true,
        }
    }
}

struct CaptureHandle {
    thread: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

/// Owner-facing handle to the session actor
///
/// All methods are synchronous except `flush`; commands are fire-and-forget
/// and observed through `snapshot()` or the event stream.
pub struct EngineHandle {
    config: AppConfig,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    broadcasts: BroadcastChannelManager,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    actor: Mutex<Option<JoinHandle<()>>>,
    capture: Mutex<Option<CaptureHandle>>,
    /// Set while a source is being opened outside the `capture` lock
    opening: AtomicBool,
    epoch: Arc<AtomicU64>,
}

impl EngineHandle {
    /// Spawn an engine with configuration from `assets/game_config.json`
    pub fn new() -> Self {
        Self::spawn(AppConfig::load(), EngineOptions::default())
    }

    /// Spawn the session actor on its own thread
    ///
    /// The thread runs a current-thread Tokio runtime so the engine works
    /// whether or not the caller has a runtime of its own.
    pub fn spawn(config: AppConfig, options: EngineOptions) -> Self {
        let session = GameSession::new(&config.game);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let broadcasts = BroadcastChannelManager::new();
        let events_tx = broadcasts.init_events();
        let epoch = Arc::new(AtomicU64::new(0));

        let actor = SessionActor {
            session,
            clock: GameClock::new(options.time_source),
            internal_clock: options.internal_clock,
            tick_interval: Duration::from_millis(config.game.tick_interval_ms.max(1)),
            epoch: Arc::clone(&epoch),
            command_rx,
            events_tx,
            snapshot_tx,
        };

        let thread = std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    log::error!("[SessionActor] Failed to create Tokio runtime: {}", err);
                    return;
                }
            };
            runtime.block_on(actor.run());
        });

        Self {
            config,
            command_tx,
            broadcasts,
            snapshot_rx,
            actor: Mutex::new(Some(thread)),
            capture: Mutex::new(None),
            opening: AtomicBool::new(false),
            epoch,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.command_tx
            .send(command)
            .map_err(|_| SessionError::ActorStopped)
    }

    // ========================================================================
    // SESSION COMMANDS
    // ========================================================================

    pub fn start_game(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Start)
    }

    pub fn pause_game(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Pause)
    }

    pub fn resume_game(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Resume)
    }

    pub fn reset_game(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Reset)
    }

    pub fn hit_note(&self, id: impl Into<NoteId>, accuracy: f32) -> Result<(), SessionError> {
        self.send(SessionCommand::Hit {
            id: id.into(),
            accuracy,
        })
    }

    pub fn miss_note(&self, id: impl Into<NoteId>) -> Result<(), SessionError> {
        self.send(SessionCommand::Miss { id: id.into() })
    }

    /// Feed an external clock value (only meaningful with `internal_clock: false`)
    pub fn tick(&self, clock_ms: u64) -> Result<(), SessionError> {
        self.send(SessionCommand::Tick { clock_ms })
    }

    /// Inject a pitch reading under the current capture epoch
    pub fn submit_pitch(&self, sample: Option<PitchSample>) -> Result<(), SessionError> {
        self.send(SessionCommand::Pitch {
            epoch: self.epoch.load(Ordering::SeqCst),
            sample,
        })
    }

    /// Returns the clamped difficulty the session will use
    pub fn set_difficulty(&self, difficulty: i32) -> Result<u8, SessionError> {
        let clamped = clamp_difficulty(difficulty);
        self.send(SessionCommand::SetDifficulty(clamped))?;
        Ok(clamped)
    }

    /// Returns the clamped volume the session will store
    pub fn set_volume(&self, volume: f32) -> Result<f32, SessionError> {
        let clamped = clamp_volume(volume);
        self.send(SessionCommand::SetVolume(clamped))?;
        Ok(clamped)
    }

    pub fn add_score(&self, points: u64) -> Result<(), SessionError> {
        self.send(SessionCommand::AddScore(points))
    }

    pub fn reset_combo(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::ResetCombo)
    }

    /// Wait until every command sent so far has been applied and published
    pub async fn flush(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Flush(tx))?;
        rx.await.map_err(|_| SessionError::ActorStopped)
    }

    /// `flush` for callers outside any async runtime
    ///
    /// Must not be called from within a Tokio runtime.
    pub fn flush_blocking(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionCommand::Flush(tx))?;
        rx.blocking_recv().map_err(|_| SessionError::ActorStopped)
    }

    // ========================================================================
    // READ SIDE
    // ========================================================================

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn watch_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Subscribe to game events published from now on
    pub fn subscribe_events(&self) -> Result<broadcast::Receiver<GameEvent>, SessionError> {
        self.broadcasts
            .subscribe_events()
            .ok_or(SessionError::ActorStopped)
    }

    // ========================================================================
    // CAPTURE
    // ========================================================================

    /// Start the capture worker with a source built on the capture thread
    ///
    /// Blocks until the source has opened (bounded by `audio.open_timeout_ms`).
    /// The capture lock is not held while waiting, so `is_recording` and
    /// `stop_recording` answer immediately; until the open completes they see
    /// no worker.
    ///
    /// # Errors
    /// * `AudioError::AlreadyRunning` - A capture worker is active or opening
    /// * Any open error of the source, surfaced unchanged
    pub fn start_recording(&self, factory: SourceFactory) -> Result<(), AudioError> {
        if self
            .opening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AudioError::AlreadyRunning);
        }
        let result = self.open_capture(factory);
        self.opening.store(false, Ordering::SeqCst);
        result
    }

    fn open_capture(&self, factory: SourceFactory) -> Result<(), AudioError> {
        let finished = {
            let mut guard = self.lock_capture()?;
            if guard
                .as_ref()
                .is_some_and(|existing| !existing.thread.is_finished())
            {
                return Err(AudioError::AlreadyRunning);
            }
            guard.take()
        };
        if let Some(finished) = finished {
            let _ = finished.thread.join();
        }

        self.config.audio.validate()?;
        let epoch = self.epoch.load(Ordering::SeqCst);
        let shutdown = Arc::new(AtomicBool::new(false));
        let tx = self.command_tx.clone();

        let thread = spawn_pitch_thread(
            factory,
            CaptureConfig::from(&self.config.audio),
            self.config.pitch.clone(),
            Arc::clone(&shutdown),
            move |sample| tx.send(SessionCommand::Pitch { epoch, sample }).is_ok(),
        )
        .inspect_err(|err| log_audio_error(err, "start_recording"))?;

        log::info!("[EngineHandle] Recording started (epoch {})", epoch);
        let mut guard = match self.lock_capture() {
            Ok(guard) => guard,
            Err(err) => {
                shutdown.store(true, Ordering::SeqCst);
                return Err(err);
            }
        };
        *guard = Some(CaptureHandle { thread, shutdown });
        Ok(())
    }

    fn lock_capture(&self) -> Result<MutexGuard<'_, Option<CaptureHandle>>, AudioError> {
        self.capture.lock().map_err(|_| AudioError::LockPoisoned {
            component: "capture".to_string(),
        })
    }

    /// Start capturing from the default microphone
    pub fn start_microphone(&self) -> Result<(), AudioError> {
        self.start_recording(Box::new(|| {
            Ok(Box::new(CpalSource::new()) as Box<dyn SampleSource>)
        }))
    }

    /// Stop the capture worker and clear the current pitch
    ///
    /// Readings still queued from the stopped worker are discarded by the
    /// actor. Returns once the worker has closed its source.
    pub fn stop_recording(&self) -> Result<(), AudioError> {
        let capture = self.lock_capture()?.take().ok_or(AudioError::NotRunning)?;

        let next_epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        capture.shutdown.store(true, Ordering::SeqCst);
        if capture.thread.join().is_err() {
            log_session_error(
                &SessionError::WorkerPanicked {
                    worker: "pitch-capture".to_string(),
                },
                "stop_recording",
            );
        }

        let _ = self.command_tx.send(SessionCommand::Pitch {
            epoch: next_epoch,
            sample: None,
        });
        log::info!("[EngineHandle] Recording stopped");
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.capture
            .lock()
            .map(|guard| {
                guard
                    .as_ref()
                    .is_some_and(|capture| !capture.thread.is_finished())
            })
            .unwrap_or(false)
    }

    // ========================================================================
    // TEARDOWN
    // ========================================================================

    /// Stop capture, stop the actor and wait for it
    ///
    /// Best-effort: capture errors are logged and do not prevent the actor
    /// from shutting down. Calling it again is harmless.
    pub fn shutdown(&self) -> Result<(), SessionError> {
        match self.stop_recording() {
            Ok(()) | Err(AudioError::NotRunning) => {}
            Err(err) => log_audio_error(&err, "shutdown"),
        }

        let _ = self.command_tx.send(SessionCommand::Shutdown);
        let thread = self.actor.lock().ok().and_then(|mut guard| guard.take());
        self.broadcasts.close_events();

        match thread {
            Some(thread) => thread.join().map_err(|_| SessionError::WorkerPanicked {
                worker: "session-actor".to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log_session_error(&err, "drop");
        }
    }
}

struct SessionActor {
    session: GameSession,
    clock: GameClock,
    internal_clock: bool,
    tick_interval: Duration,
    epoch: Arc<AtomicU64>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    events_tx: broadcast::Sender<GameEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionActor {
    async fn run(mut self) {
        log::info!(
            "[SessionActor] Started (internal clock: {}, tick {:?})",
            self.internal_clock,
            self.tick_interval
        );

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let dirty = tokio::select! {
                biased;
                command = self.command_rx.recv() => match command {
                    None | Some(SessionCommand::Shutdown) => break,
                    Some(command) => {
                        self.apply(command);
                        true
                    }
                },
                _ = ticker.tick(), if self.internal_clock => self.advance_clock(),
            };

            if dirty {
                self.publish();
            }
        }

        self.publish();
        log::info!("[SessionActor] Stopped");
    }

    fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Tick { clock_ms } => self.session.update_time(clock_ms),
            SessionCommand::Pitch { epoch, sample } => {
                let current = self.epoch.load(Ordering::SeqCst);
                if epoch != current {
                    log::debug!(
                        "[SessionActor] Dropping reading from stale epoch {} (current {})",
                        epoch,
                        current
                    );
                    return;
                }
                if self.internal_clock {
                    self.advance_clock();
                }
                self.session.update_pitch(sample);
            }
            SessionCommand::Hit { id, accuracy } => {
                self.session.hit_note(&id, accuracy);
            }
            SessionCommand::Miss { id } => {
                self.session.miss_note(&id);
            }
            SessionCommand::Start => {
                self.session.start_game();
                self.clock.start();
            }
            SessionCommand::Pause => {
                if self.session.pause_game() {
                    self.clock.pause();
                }
            }
            SessionCommand::Resume => {
                if self.session.resume_game() {
                    self.clock.resume();
                }
            }
            SessionCommand::Reset => {
                self.session.reset_game();
                self.clock.reset();
            }
            SessionCommand::SetDifficulty(difficulty) => {
                self.session.set_difficulty(difficulty as i32);
            }
            SessionCommand::SetVolume(volume) => {
                self.session.set_volume(volume);
            }
            SessionCommand::AddScore(points) => self.session.add_score(points),
            SessionCommand::ResetCombo => self.session.reset_combo(),
            SessionCommand::Flush(reply) => {
                // Everything before this command is already published
                let _ = reply.send(());
            }
            SessionCommand::Shutdown => {}
        }

        if self.session.status() == SessionStatus::Ended && self.clock.is_running() {
            self.clock.pause();
        }
    }

    /// Push the game clock into the session; returns whether anything moved
    fn advance_clock(&mut self) -> bool {
        if !self.clock.is_running() || self.session.status() != SessionStatus::Playing {
            return false;
        }
        self.session.update_time(self.clock.elapsed_ms());
        if self.session.status() == SessionStatus::Ended {
            self.clock.pause();
        }
        true
    }

    fn publish(&mut self) {
        for event in self.session.drain_events() {
            // No subscribers is not an error
            let _ = self.events_tx.send(event);
        }
        self.snapshot_tx.send_replace(self.session.snapshot());
    }
}
