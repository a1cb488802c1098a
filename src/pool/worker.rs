//! Worker unit - one thread bound to one grid partition.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::compute::{Canvas, EvolutionEngine, GridState, Partition, PartitionedRenderer};

use super::{Command, CommandTag, InitPayload, Notification, WorkerEvent};

/// Lifecycle of a worker unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Uninitialized,
    Ready,
    Evolving,
    Rendering,
    Randomizing,
    Clearing,
    RuleChanging,
    Terminated,
}

/// Non-fatal command failures, reported as `ERROR` notifications.
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("Worker {worker} received {tag} before INIT")]
    NotInitialized { worker: usize, tag: CommandTag },
    #[error("Worker {worker} is already initialized")]
    AlreadyInitialized { worker: usize },
    #[error("Worker {worker} cannot handle message: {message}")]
    Unrecognized { worker: usize, message: String },
}

/// State bound by INIT.
struct Binding<C: Canvas> {
    grid: Arc<GridState>,
    partition: Partition,
    engine: EvolutionEngine,
    renderer: PartitionedRenderer<C>,
}

/// Execution context of one worker thread.
pub struct WorkerUnit<C: Canvas> {
    index: usize,
    state: UnitState,
    binding: Option<Binding<C>>,
    outbox: Sender<Notification>,
}

impl<C: Canvas> WorkerUnit<C> {
    pub fn new(index: usize, outbox: Sender<Notification>) -> Self {
        Self {
            index,
            state: UnitState::Uninitialized,
            binding: None,
            outbox,
        }
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    /// Process commands until the inbox closes. Returns the canvas, if the
    /// unit was ever initialized.
    pub fn run(mut self, inbox: Receiver<Command>) -> Option<C> {
        while let Ok(command) = inbox.recv() {
            self.handle(command);
        }
        self.state = UnitState::Terminated;
        log::trace!("worker {} terminated", self.index);
        self.binding.map(|b| b.renderer.into_canvas())
    }

    /// Execute one command and emit its notifications.
    pub fn handle(&mut self, command: Command) {
        let tag = command.tag();
        match panic::catch_unwind(AssertUnwindSafe(|| self.execute(command))) {
            Ok(Ok(())) => self.notify(WorkerEvent::WaitingAfter(tag)),
            Ok(Err(err)) => {
                log::warn!("{err}");
                self.notify(WorkerEvent::Error(err.to_string()));
                self.notify(WorkerEvent::WaitingAfter(tag));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("worker {} faulted: {message}", self.index);
                self.notify(WorkerEvent::Fault(message));
            }
        }
    }

    fn notify(&self, event: WorkerEvent) {
        // The coordinator may already be gone during shutdown.
        let _ = self.outbox.send(Notification {
            worker: self.index,
            event,
        });
    }

    fn transition(&mut self, state: UnitState) {
        log::trace!("worker {}: {:?} -> {:?}", self.index, self.state, state);
        self.state = state;
    }

    fn execute(&mut self, command: Command) -> Result<(), UnitError> {
        let worker = self.index;
        match command {
            Command::Init(payload) => self.init(*payload),
            Command::Unrecognized(message) => Err(UnitError::Unrecognized { worker, message }),
            Command::Evolve(phase) => {
                self.run_bound(CommandTag::Evolve, UnitState::Evolving, |b| {
                    b.engine.evolve(&b.grid, b.partition, phase)
                })
            }
            Command::Render(phase) => {
                self.run_bound(CommandTag::Render, UnitState::Rendering, |b| {
                    let stats = b.renderer.draw(&b.grid, b.partition, phase);
                    log::trace!(
                        "worker {worker}: stamped {} cleared {}",
                        stats.stamped,
                        stats.cleared
                    );
                })
            }
            Command::ChangeRules(rules) => {
                self.run_bound(CommandTag::ChangeRules, UnitState::RuleChanging, |b| {
                    log::debug!("worker {worker}: rules -> {rules}");
                    b.engine.set_rules(rules);
                })
            }
            Command::Random { passes, phase } => {
                self.run_bound(CommandTag::Random, UnitState::Randomizing, |b| {
                    b.engine.randomize(&b.grid, passes, phase)
                })
            }
            Command::Clear(phase) => self.run_bound(CommandTag::Clear, UnitState::Clearing, |b| {
                b.engine.clear(&b.grid, b.partition, phase)
            }),
        }
    }

    /// Run `op` against the INIT binding, passing through `busy` and back to Ready.
    fn run_bound(
        &mut self,
        tag: CommandTag,
        busy: UnitState,
        op: impl FnOnce(&mut Binding<C>),
    ) -> Result<(), UnitError> {
        let worker = self.index;
        if self.binding.is_none() {
            return Err(UnitError::NotInitialized { worker, tag });
        }
        self.transition(busy);
        if let Some(binding) = self.binding.as_mut() {
            op(binding);
        }
        self.transition(UnitState::Ready);
        Ok(())
    }

    fn init(&mut self, payload: InitPayload) -> Result<(), UnitError> {
        if self.binding.is_some() {
            return Err(UnitError::AlreadyInitialized { worker: self.index });
        }

        let InitPayload {
            grid,
            partition,
            rules,
            cell_size,
            padding,
            color,
            seed,
            initial_frame,
        } = payload;

        let engine = match seed {
            Some(seed) => EvolutionEngine::new(rules, seed.wrapping_add(self.index as u64)),
            None => EvolutionEngine::from_entropy(rules),
        };
        let mut renderer = PartitionedRenderer::new(&grid, partition, cell_size, padding, color);

        renderer.invalidate(&grid, partition);
        renderer.draw(&grid, partition, initial_frame);

        self.binding = Some(Binding {
            grid,
            partition,
            engine,
            renderer,
        });
        self.transition(UnitState::Ready);
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Coordinator-side handle to a worker thread.
pub struct WorkerHandle<C: Canvas> {
    index: usize,
    inbox: Option<Sender<Command>>,
    thread: Option<JoinHandle<Option<C>>>,
}

impl<C: Canvas> WorkerHandle<C> {
    /// Spawn a worker thread reporting to `outbox`.
    pub fn spawn(index: usize, outbox: Sender<Notification>) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Command>();
        let thread = thread::Builder::new()
            .name(format!("life-worker-{index}"))
            .spawn(move || WorkerUnit::<C>::new(index, outbox).run(rx))?;

        Ok(Self {
            index,
            inbox: Some(tx),
            thread: Some(thread),
        })
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Fire-and-forget send. Returns `false` if the worker is gone.
    pub fn send(&self, command: Command) -> bool {
        self.inbox
            .as_ref()
            .is_some_and(|tx| tx.send(command).is_ok())
    }

    /// Drop the inbox without joining, as if the worker had gone away.
    #[cfg(test)]
    pub(crate) fn disconnect(&mut self) {
        self.inbox.take();
    }

    /// Close the inbox and wait for the thread to exit.
    pub fn join(mut self) -> Option<C> {
        self.inbox.take();
        self.thread.take().and_then(|t| t.join().ok()).flatten()
    }
}
