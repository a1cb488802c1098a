//! Simulation session - one grid, one worker pool, one tick loop.
//!
//! A `Session` is the explicit context for a running simulation. Several
//! sessions can run side by side; nothing is global.
//!
//! Requests that edit the grid or reach the workers (painting, rule changes,
//! random patches, clearing) are queued while the pool is busy and applied
//! at the next barrier, so a command never overlaps a phase in flight.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{RecvError, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::compute::{Canvas, Frame, GridState, Partition, Surface, detect_worker_count};
use crate::pool::{
    Coordinator, Envelope, Notification, Order, PoolError, Ticker, Transition, WorkerEvent,
};
use crate::schema::{ConfigError, RuleSet, SimulationConfig};
use crate::snapshot::{SessionSnapshot, SnapshotError, Storage, StorageError};

/// Longest single wait inside `run_ticks` before re-checking the stop flag.
const RUN_SLICE: Duration = Duration::from_millis(50);

/// Cloneable flag controlling the tick loop, usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Stop the tick loop. In-flight commands still complete.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn start(&self) {
        self.running.store(true, Ordering::Release);
    }
}

/// Deferred user request.
#[derive(Debug, Clone)]
enum Request {
    Paint {
        x: usize,
        y: usize,
        /// `None` toggles.
        alive: Option<bool>,
    },
    ChangeRules(RuleSet),
    Random(u32),
    Clear,
    Redraw,
    Raw(Envelope),
}

/// Session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Worker {worker} faulted: {message}")]
    WorkerFault { worker: usize, message: String },
    #[error("Worker pool is stalled after a worker fault")]
    Stalled,
    #[error("All workers have disconnected")]
    Disconnected,
    #[error("Cell ({x}, {y}) is outside the grid")]
    OutOfBounds { x: usize, y: usize },
}

/// A running simulation.
pub struct Session<C: Canvas = Surface> {
    config: SimulationConfig,
    coordinator: Coordinator<C>,
    ticker: Ticker,
    stop: StopHandle,
    pending: VecDeque<Request>,
    needs_render: bool,
    stop_at: Option<u64>,
    generation: u64,
    alive: usize,
    revealed: bool,
    errors: Vec<String>,
    fault: Option<(usize, String)>,
}

impl<C: Canvas> Session<C> {
    /// Start a session on a fresh grid, painting `initial_passes` random
    /// patches if configured.
    pub fn start(config: SimulationConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let grid = GridState::new(config.width, config.height);
        let passes = config.initial_passes;

        let mut session = Self::with_grid(config, grid)?;
        if passes > 0 {
            session.randomize(passes)?;
            session.settle()?;
        }
        Ok(session)
    }

    /// Start a session on an existing grid. Grid dimensions take precedence
    /// over the configured ones.
    pub fn with_grid(mut config: SimulationConfig, grid: GridState) -> Result<Self, SessionError> {
        config.width = grid.width();
        config.height = grid.height();
        config.validate()?;

        let workers = config
            .workers
            .unwrap_or_else(|| detect_worker_count(grid.height()));
        let mut coordinator = Coordinator::spawn(Arc::new(grid), workers)?;
        coordinator.init(&config)?;

        let mut session = Self {
            ticker: Ticker::new(config.frequency),
            config,
            coordinator,
            stop: StopHandle::default(),
            pending: VecDeque::new(),
            needs_render: false,
            stop_at: None,
            generation: 0,
            alive: 0,
            revealed: false,
            errors: Vec::new(),
            fault: None,
        };
        session.settle()?;
        Ok(session)
    }

    /// Resume from `storage`, or start fresh from `config` when `key` is
    /// missing. Stored dimensions, rules, frequency and density override
    /// the config.
    pub fn restore<S: Storage + ?Sized>(
        storage: &S,
        key: &str,
        mut config: SimulationConfig,
    ) -> Result<Self, SessionError> {
        let Some(blob) = storage.load(key)? else {
            log::info!("no snapshot under {key:?}, starting fresh");
            return Self::start(config);
        };

        let snapshot = SessionSnapshot::decode(&blob)?;
        config.density = snapshot.density;
        config.frequency = snapshot.frequency;
        config.rules = snapshot.rules;
        let grid = GridState::from_cells(snapshot.width, snapshot.height, &snapshot.cells);
        log::info!(
            "restored {}x{} snapshot ({})",
            snapshot.width,
            snapshot.height,
            snapshot.rules
        );
        Self::with_grid(config, grid)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn grid(&self) -> &Arc<GridState> {
        self.coordinator.grid()
    }

    pub fn worker_count(&self) -> usize {
        self.coordinator.worker_count()
    }

    pub fn partitions(&self) -> &[Partition] {
        self.coordinator.partitions()
    }

    /// Completed generations.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Live cells as of the last barrier settled while the tick loop was
    /// stopped.
    pub fn alive_count(&self) -> usize {
        self.alive
    }

    /// True once every worker has drawn its initial frame.
    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn rules(&self) -> RuleSet {
        self.config.rules
    }

    pub fn frequency(&self) -> f64 {
        self.ticker.frequency()
    }

    pub fn is_running(&self) -> bool {
        self.stop.is_running()
    }

    /// True when no command is in flight and no request is queued.
    pub fn is_idle(&self) -> bool {
        self.coordinator.is_idle() && self.pending.is_empty() && !self.needs_render
    }

    /// Handle that stops the tick loop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Drain protocol errors reported by workers.
    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }

    /// Start the tick loop. Ticks fire from `pump`.
    pub fn play(&mut self) {
        self.stop.start();
        if self.coordinator.is_idle() && !self.ticker.is_armed() {
            self.ticker.arm(Instant::now());
        }
    }

    /// Stop the tick loop. In-flight commands complete normally.
    pub fn pause(&mut self) {
        self.stop.stop();
        self.ticker.disarm();
        if self.coordinator.is_idle() {
            self.refresh_alive();
        }
    }

    /// Change the target generations per second.
    pub fn set_frequency(&mut self, frequency: f64) -> Result<(), SessionError> {
        if frequency.is_nan() || frequency <= 0.0 {
            return Err(ConfigError::InvalidFrequency(frequency).into());
        }
        self.ticker.set_frequency(frequency);
        self.config.frequency = frequency;
        if self.ticker.is_armed() {
            self.ticker.arm(Instant::now());
        }
        Ok(())
    }

    /// Broadcast a new rule set.
    pub fn change_rules(&mut self, rules: RuleSet) -> Result<(), SessionError> {
        self.request(Request::ChangeRules(rules))
    }

    /// Paint `passes` random patches, split across the workers.
    pub fn randomize(&mut self, passes: u32) -> Result<(), SessionError> {
        self.request(Request::Random(passes))
    }

    /// Kill every cell.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.request(Request::Clear)
    }

    /// Set one cell.
    pub fn set_cell(&mut self, x: usize, y: usize, alive: bool) -> Result<(), SessionError> {
        self.check_bounds(x, y)?;
        self.request(Request::Paint {
            x,
            y,
            alive: Some(alive),
        })
    }

    /// Flip one cell.
    pub fn toggle_cell(&mut self, x: usize, y: usize) -> Result<(), SessionError> {
        self.check_bounds(x, y)?;
        self.request(Request::Paint { x, y, alive: None })
    }

    /// Redraw every cell on the next render.
    pub fn redraw(&mut self) -> Result<(), SessionError> {
        self.request(Request::Redraw)
    }

    /// Forward a raw envelope to every worker. Envelopes that fail to
    /// decode are still delivered, and each worker reports an error.
    pub fn send_raw(&mut self, envelope: Envelope) -> Result<(), SessionError> {
        self.request(Request::Raw(envelope))
    }

    /// Run one generation synchronously.
    pub fn step(&mut self) -> Result<(), SessionError> {
        self.settle()?;
        self.coordinator.dispatch(&Order::Evolve, None)?;
        self.settle()
    }

    /// Play until `ticks` more generations have completed, then pause.
    pub fn run_ticks(&mut self, ticks: u64) -> Result<(), SessionError> {
        let target = self.generation + ticks;
        self.stop_at = Some(target);
        self.play();

        let result = self.run_until(target);
        self.stop_at = None;
        self.pause();
        result?;
        self.settle()
    }

    fn run_until(&mut self, target: u64) -> Result<(), SessionError> {
        while self.generation < target && self.is_running() {
            self.pump(RUN_SLICE)?;
        }
        Ok(())
    }

    /// Run the event loop for up to `budget`: fire due ticks and process
    /// worker notifications.
    pub fn pump(&mut self, budget: Duration) -> Result<(), SessionError> {
        self.check_fault()?;
        let end = Instant::now() + budget;

        loop {
            if !self.stop.is_running() {
                self.ticker.disarm();
            }

            let now = Instant::now();
            if self.coordinator.is_idle() && self.ticker.fire_if_due(now) {
                self.tick()?;
            }
            if now >= end {
                return Ok(());
            }

            let wake = match self.ticker.deadline() {
                Some(deadline) if self.coordinator.is_idle() => deadline.min(end),
                _ => end,
            };
            match self
                .coordinator
                .recv_timeout(wake.saturating_duration_since(now))
            {
                Ok(note) => self.handle(note)?,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(SessionError::Disconnected),
            }
        }
    }

    /// Block until the pool is idle and every queued request is applied.
    /// Does not fire ticks.
    pub fn settle(&mut self) -> Result<(), SessionError> {
        while !self.is_idle() {
            self.check_fault()?;
            match self.coordinator.recv() {
                Ok(note) => self.handle(note)?,
                Err(RecvError) => return Err(SessionError::Disconnected),
            }
        }
        Ok(())
    }

    /// Capture dimensions, rules, frequency, density and cells.
    pub fn snapshot(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.settle()?;
        let grid = self.grid();
        Ok(SessionSnapshot {
            width: grid.width(),
            height: grid.height(),
            density: self.config.density,
            frequency: self.ticker.frequency(),
            rules: self.config.rules,
            cells: grid.current_bytes(),
        })
    }

    /// Save a snapshot under `key`.
    pub fn save<S: Storage + ?Sized>(
        &mut self,
        storage: &mut S,
        key: &str,
    ) -> Result<(), SessionError> {
        let blob = self.snapshot()?.encode();
        storage.save(key, &blob)?;
        log::info!("saved session snapshot {key:?} ({} bytes)", blob.len());
        Ok(())
    }

    /// Replace the grid with one of a new size, keeping the overlapping
    /// top-left cells. The worker pool is torn down and recreated.
    pub fn resize(mut self, width: usize, height: usize) -> Result<Self, SessionError> {
        self.settle()?;
        let grid = self.grid().resized(width, height);
        let running = self.is_running();
        let mut config = self.config.clone();
        config.width = width;
        config.height = height;
        self.coordinator.shutdown();

        let mut session = Self::with_grid(config, grid)?;
        if running {
            session.play();
        }
        Ok(session)
    }

    /// Stop the workers and hand back each partition's canvas.
    pub fn shutdown(self) -> Vec<(Partition, C)> {
        self.stop.stop();
        self.coordinator.shutdown()
    }

    fn refresh_alive(&mut self) {
        self.alive = self.grid().alive_count();
    }

    fn check_bounds(&self, x: usize, y: usize) -> Result<(), SessionError> {
        let grid = self.grid();
        if x >= grid.width() || y >= grid.height() {
            return Err(SessionError::OutOfBounds { x, y });
        }
        Ok(())
    }

    fn check_fault(&self) -> Result<(), SessionError> {
        match self.fault {
            Some(_) => Err(SessionError::Stalled),
            None => Ok(()),
        }
    }

    fn request(&mut self, request: Request) -> Result<(), SessionError> {
        self.pending.push_back(request);
        self.flush_pending()
    }

    fn tick(&mut self) -> Result<(), SessionError> {
        if self.stop_at.is_some_and(|target| self.generation >= target) {
            self.stop.stop();
            return Ok(());
        }
        self.coordinator.dispatch(&Order::Evolve, None)?;
        Ok(())
    }

    fn handle(&mut self, note: Notification) -> Result<(), SessionError> {
        match note.event {
            WorkerEvent::WaitingAfter(tag) => {
                let transition = self.coordinator.on_completion(tag)?;
                self.apply(transition)
            }
            WorkerEvent::Error(message) => {
                log::warn!("worker {}: {message}", note.worker);
                self.errors.push(message);
                Ok(())
            }
            WorkerEvent::Fault(message) => {
                log::error!("worker {} faulted, pool will stall: {message}", note.worker);
                self.fault = Some((note.worker, message.clone()));
                Err(SessionError::WorkerFault {
                    worker: note.worker,
                    message,
                })
            }
        }
    }

    fn apply(&mut self, transition: Transition) -> Result<(), SessionError> {
        match transition {
            Transition::Pending | Transition::Rendering => Ok(()),
            Transition::Swapped => {
                self.generation += 1;
                Ok(())
            }
            Transition::Revealed { alive } => {
                self.alive = alive;
                self.revealed = true;
                log::info!(
                    "session ready: {}x{}, {} workers, {} alive",
                    self.config.width,
                    self.config.height,
                    self.worker_count(),
                    alive
                );
                self.after_barrier()
            }
            Transition::Settled(_) => {
                // Counting is a full-grid scan, so skip it between ticks
                if !self.stop.is_running() {
                    self.refresh_alive();
                }
                self.after_barrier()
            }
        }
    }

    fn after_barrier(&mut self) -> Result<(), SessionError> {
        self.flush_pending()?;
        if self.coordinator.is_idle() && self.stop.is_running() {
            self.ticker.arm(Instant::now());
        }
        Ok(())
    }

    /// Apply queued requests while the pool stays idle.
    fn flush_pending(&mut self) -> Result<(), SessionError> {
        if !self.revealed {
            return Ok(());
        }
        while self.coordinator.is_idle() {
            let Some(request) = self.pending.pop_front() else {
                break;
            };
            self.apply_request(request)?;
        }
        if self.needs_render && self.coordinator.is_idle() {
            self.needs_render = false;
            self.coordinator.dispatch(&Order::Render, None)?;
        }
        Ok(())
    }

    fn apply_request(&mut self, request: Request) -> Result<(), SessionError> {
        log::debug!("applying {request:?}");
        match request {
            Request::Paint { x, y, alive } => {
                let grid = self.grid();
                match alive {
                    Some(alive) => grid.set(x, y, alive),
                    None => {
                        grid.toggle(x, y);
                    }
                }
                self.needs_render = true;
            }
            Request::Redraw => {
                self.grid().mark_all_stale();
                self.needs_render = true;
            }
            Request::ChangeRules(rules) => self.dispatch_order(Order::ChangeRules(rules))?,
            Request::Clear => self.dispatch_order(Order::Clear)?,
            Request::Random(passes) => {
                let workers = self.worker_count() as u32;
                let (base, extra) = (passes / workers, passes % workers);
                for index in 0..workers {
                    let share = base + u32::from(index < extra);
                    if share > 0 {
                        self.coordinator
                            .dispatch(&Order::Random(share), Some(index as usize))?;
                    }
                }
                if passes > 0 {
                    self.needs_render = false;
                }
            }
            Request::Raw(envelope) => {
                let order = Order::try_from(&envelope)
                    .unwrap_or_else(|err| Order::Unrecognized(err.to_string()));
                self.dispatch_order(order)?;
            }
        }
        Ok(())
    }

    fn dispatch_order(&mut self, order: Order) -> Result<(), SessionError> {
        match &order {
            Order::ChangeRules(rules) => self.config.rules = *rules,
            Order::Clear | Order::Random(_) => self.needs_render = false,
            Order::Evolve | Order::Render | Order::Unrecognized(_) => {}
        }
        self.coordinator.dispatch(&order, None)?;
        Ok(())
    }
}

impl Session<Surface> {
    /// Stop the workers and stitch their surfaces into one frame.
    pub fn into_frame(self) -> Frame {
        let surfaces = self.shutdown();
        Frame::compose(surfaces.iter().map(|(_, surface)| surface))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemoryStorage;
    use serde_json::json;

    fn config(width: usize, height: usize) -> SimulationConfig {
        SimulationConfig {
            width,
            height,
            density: 2,
            frequency: 1000.0,
            workers: Some(2),
            random_seed: Some(11),
            initial_passes: 0,
            ..SimulationConfig::default()
        }
    }

    fn paint(session: &mut Session, cells: &[(usize, usize)]) {
        for &(x, y) in cells {
            session.set_cell(x, y, true).unwrap();
        }
        session.settle().unwrap();
    }

    #[test]
    fn test_start_reveals() {
        let session: Session = Session::start(config(12, 9)).unwrap();
        assert!(session.is_revealed());
        assert!(session.is_idle());
        assert_eq!(session.worker_count(), 2);
        assert_eq!(session.alive_count(), 0);
        assert_eq!(session.generation(), 0);
    }

    #[test]
    fn test_block_survives_steps() {
        let mut session: Session = Session::start(config(8, 8)).unwrap();
        // Block straddles the partition boundary between rows 3 and 4
        paint(&mut session, &[(3, 3), (4, 3), (3, 4), (4, 4)]);
        let before = session.grid().current_bytes();

        for _ in 0..6 {
            session.step().unwrap();
        }
        assert_eq!(session.generation(), 6);
        assert_eq!(session.grid().current_bytes(), before);
        assert_eq!(session.alive_count(), 4);
    }

    #[test]
    fn test_run_ticks_blinker() {
        let mut session: Session = Session::start(config(7, 7)).unwrap();
        paint(&mut session, &[(2, 3), (3, 3), (4, 3)]);
        let horizontal = session.grid().current_bytes();

        session.run_ticks(1).unwrap();
        assert_eq!(session.generation(), 1);
        assert!(session.grid().is_alive(3, 2));
        assert!(!session.is_running());
        assert_eq!(session.alive_count(), 3);

        session.run_ticks(3).unwrap();
        assert_eq!(session.generation(), 4);
        assert_eq!(session.grid().current_bytes(), horizontal);
    }

    #[test]
    fn test_randomize_then_clear() {
        let mut session: Session = Session::start(config(30, 20)).unwrap();
        session.randomize(7).unwrap();
        session.settle().unwrap();
        assert!(session.alive_count() > 0);

        session.clear().unwrap();
        session.settle().unwrap();
        assert_eq!(session.alive_count(), 0);

        let frame = session.into_frame();
        assert_eq!((frame.width, frame.height), (60, 40));
        assert!(frame.pixels.iter().all(|p| p[3] == 0));
    }

    #[test]
    fn test_initial_passes() {
        let mut cfg = config(30, 20);
        cfg.initial_passes = 5;
        let session: Session = Session::start(cfg).unwrap();
        assert!(session.alive_count() > 0);
    }

    #[test]
    fn test_rule_change_while_running_is_queued() {
        let mut session: Session = Session::start(config(16, 16)).unwrap();
        session.randomize(4).unwrap();
        session.play();
        session.pump(Duration::from_millis(20)).unwrap();

        let highlife: RuleSet = "B36/S23".parse().unwrap();
        session.change_rules(highlife).unwrap();
        session.pump(Duration::from_millis(20)).unwrap();
        session.pause();
        session.settle().unwrap();

        assert_eq!(session.rules(), highlife);
        assert!(session.generation() > 0);
        assert!(session.is_idle());
    }

    #[test]
    fn test_raw_envelopes() {
        let mut session: Session = Session::start(config(10, 10)).unwrap();

        session.send_raw(Envelope::new("DANCE", None)).unwrap();
        session.settle().unwrap();
        let errors = session.take_errors();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("DANCE"));
        assert!(session.is_idle());

        session
            .send_raw(Envelope::new("RANDOM", Some(json!(3))))
            .unwrap();
        session.settle().unwrap();
        assert!(session.alive_count() > 0);

        session
            .send_raw(Envelope::new("CHANGE-RULES", Some(json!({"born": [2], "survive": []}))))
            .unwrap();
        session.settle().unwrap();
        assert_eq!(session.rules().to_string(), "B2/S");
        assert!(session.take_errors().is_empty());
    }

    #[test]
    fn test_save_and_restore() {
        let mut storage = MemoryStorage::new();
        let mut session: Session = Session::start(config(9, 6)).unwrap();
        paint(&mut session, &[(1, 1), (8, 5)]);
        session.change_rules("B36/S23".parse().unwrap()).unwrap();
        session.set_frequency(7.5).unwrap();
        session.save(&mut storage, "main").unwrap();
        let cells = session.grid().current_bytes();
        session.shutdown();

        let restored: Session = Session::restore(&storage, "main", config(3, 3)).unwrap();
        assert_eq!(restored.grid().width(), 9);
        assert_eq!(restored.grid().height(), 6);
        assert_eq!(restored.grid().current_bytes(), cells);
        assert_eq!(restored.rules().to_string(), "B36/S23");
        assert_eq!(restored.frequency(), 7.5);
        assert_eq!(restored.alive_count(), 2);

        let fresh: Session = Session::restore(&storage, "other", config(4, 4)).unwrap();
        assert_eq!(fresh.grid().width(), 4);
    }

    #[test]
    fn test_redraw_and_frame() {
        let mut session: Session = Session::start(config(4, 4)).unwrap();
        paint(&mut session, &[(0, 0)]);
        session.redraw().unwrap();
        session.settle().unwrap();

        let frame = session.into_frame();
        assert_eq!(frame.pixels[0][3], 0xFF);
        assert_eq!(frame.pixels[frame.pixels.len() - 1][3], 0);
    }

    #[test]
    fn test_resize_keeps_overlap() {
        let mut session: Session = Session::start(config(6, 6)).unwrap();
        paint(&mut session, &[(1, 1), (5, 5)]);

        let session = session.resize(4, 8).unwrap();
        assert_eq!(session.config().width, 4);
        assert!(session.grid().is_alive(1, 1));
        assert_eq!(session.alive_count(), 1);
    }

    #[test]
    fn test_bounds_and_frequency_errors() {
        let mut session: Session = Session::start(config(5, 5)).unwrap();
        assert!(matches!(
            session.toggle_cell(5, 0),
            Err(SessionError::OutOfBounds { x: 5, y: 0 })
        ));
        assert!(matches!(
            session.set_frequency(0.0),
            Err(SessionError::Config(ConfigError::InvalidFrequency(_)))
        ));
    }

    #[test]
    fn test_stop_handle_from_other_thread() {
        let mut session: Session = Session::start(config(10, 10)).unwrap();
        session.set_frequency(200.0).unwrap();
        let stop = session.stop_handle();

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            stop.stop();
        });
        // Would run for a very long time without the stop handle
        session.run_ticks(1_000_000).unwrap();
        stopper.join().unwrap();

        assert!(!session.is_running());
        assert!(session.generation() < 1_000_000);
    }

    #[test]
    fn test_independent_sessions() {
        let mut a: Session = Session::start(config(6, 6)).unwrap();
        let b: Session = Session::start(config(6, 6)).unwrap();
        paint(&mut a, &[(2, 2)]);
        a.step().unwrap();
        assert_eq!(a.generation(), 1);
        assert_eq!(b.generation(), 0);
        assert_eq!(b.alive_count(), 0);
    }

    #[test]
    fn test_alive_count_refreshed_when_stopped() {
        let mut session: Session = Session::start(config(8, 8)).unwrap();
        paint(&mut session, &[(1, 1), (2, 1), (3, 1), (6, 6)]);
        assert_eq!(session.alive_count(), 4);

        session.run_ticks(2).unwrap();
        // Blinker survives, the lone cell dies
        assert_eq!(session.alive_count(), 3);
        assert_eq!(session.alive_count(), session.grid().alive_count());
    }

    /// Canvas that panics as soon as a live cell is drawn.
    struct Exploding;

    impl Canvas for Exploding {
        fn allocate(_spec: &crate::compute::SurfaceSpec) -> Self {
            Exploding
        }

        fn stamp(&mut self, _x: u32, _y: u32, _stamp: &crate::compute::Stamp) {
            panic!("boom");
        }

        fn clear_rect(&mut self, _x: u32, _y: u32, _width: u32, _height: u32) {}
    }

    #[test]
    fn test_worker_fault_stalls_session() {
        let mut cfg = config(6, 6);
        cfg.workers = Some(1);
        let mut session: Session<Exploding> = Session::start(cfg).unwrap();
        assert!(session.is_revealed());

        session.set_cell(2, 2, true).unwrap();
        match session.settle() {
            Err(SessionError::WorkerFault { worker, message }) => {
                assert_eq!(worker, 0);
                assert_eq!(message, "boom");
            }
            other => panic!("expected a worker fault, got {other:?}"),
        }

        // The faulted worker never completes, so the barrier stays open
        assert!(!session.is_idle());
        assert!(matches!(session.settle(), Err(SessionError::Stalled)));
        assert!(matches!(
            session.pump(Duration::from_millis(10)),
            Err(SessionError::Stalled)
        ));
        assert!(matches!(session.step(), Err(SessionError::Stalled)));
    }
}
