//! Coordinator - owns the worker pool and drives phase transitions.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvError, RecvTimeoutError};
use std::time::Duration;

use crate::compute::{
    Canvas, EditPhase, EvolvePhase, GridState, Partition, RenderPhase, SwapPermit,
    partition_rows,
};
use crate::schema::SimulationConfig;

use super::{
    Command, CommandTag, CompletionBarrier, InitPayload, Notification, Order, WorkerHandle,
};

/// What the coordinator did when a barrier was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Barrier not reached yet.
    Pending,
    /// Every worker finished INIT.
    Revealed { alive: usize },
    /// Evolution finished, buffers swapped, render broadcast.
    Swapped,
    /// Random/clear finished, render broadcast.
    Rendering,
    /// Render, rule change or an unrecognized command finished. The pool is
    /// idle and the tick loop may continue.
    Settled(Option<CommandTag>),
}

/// Worker pool failures.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
    #[error("Worker {0} is no longer running")]
    WorkerGone(usize),
    #[error("Worker {0} does not exist")]
    NoSuchWorker(usize),
}

/// Controls a pool of workers sharing one grid.
pub struct Coordinator<C: Canvas> {
    grid: Arc<GridState>,
    workers: Vec<WorkerHandle<C>>,
    partitions: Vec<Partition>,
    barrier: CompletionBarrier,
    notifications: Receiver<Notification>,
}

impl<C: Canvas> Coordinator<C> {
    /// Spawn `workers` threads and assign each a row partition.
    pub fn spawn(grid: Arc<GridState>, workers: usize) -> Result<Self, PoolError> {
        let workers = workers.clamp(1, grid.height().max(1));
        let partitions = partition_rows(grid.width(), grid.height(), workers);
        let (outbox, notifications) = mpsc::channel();

        let handles = (0..workers)
            .map(|index| WorkerHandle::spawn(index, outbox.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "spawned {} workers for a {}x{} grid",
            workers,
            grid.width(),
            grid.height()
        );

        Ok(Self {
            grid,
            workers: handles,
            partitions,
            barrier: CompletionBarrier::new(workers),
            notifications,
        })
    }

    #[inline]
    pub fn grid(&self) -> &Arc<GridState> {
        &self.grid
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    #[inline]
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.barrier.is_idle()
    }

    /// Commands still in flight.
    #[inline]
    pub fn busy(&self) -> usize {
        self.barrier.busy()
    }

    /// Bind every worker to its partition. Completes with `Revealed`.
    pub fn init(&mut self, config: &SimulationConfig) -> Result<(), PoolError> {
        for (index, worker) in self.workers.iter().enumerate() {
            let payload = InitPayload {
                grid: Arc::clone(&self.grid),
                partition: self.partitions[index],
                rules: config.rules,
                cell_size: config.density,
                padding: config.padding,
                color: config.color,
                seed: config.random_seed,
                initial_frame: RenderPhase::mint(),
            };
            self.barrier.dispatched(1);
            if !worker.send(Command::Init(Box::new(payload))) {
                self.barrier.cancelled(1);
                return Err(PoolError::WorkerGone(index));
            }
        }
        Ok(())
    }

    /// Send `order` to one worker, or to all of them when `target` is None.
    pub fn dispatch(&mut self, order: &Order, target: Option<usize>) -> Result<(), PoolError> {
        match target {
            Some(index) => {
                let worker = self
                    .workers
                    .get(index)
                    .ok_or(PoolError::NoSuchWorker(index))?;
                self.barrier.dispatched(1);
                if !worker.send(command_for(order)) {
                    self.barrier.cancelled(1);
                    return Err(PoolError::WorkerGone(index));
                }
            }
            None => {
                let total = self.workers.len();
                self.barrier.dispatched(total);
                for (sent, worker) in self.workers.iter().enumerate() {
                    if !worker.send(command_for(order)) {
                        // Only the first `sent` commands will ever complete
                        self.barrier.cancelled(total - sent);
                        return Err(PoolError::WorkerGone(worker.index()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Count one completion and run the phase policy if the barrier is met.
    pub fn on_completion(&mut self, tag: Option<CommandTag>) -> Result<Transition, PoolError> {
        let Some(done) = self.barrier.complete(tag) else {
            return Ok(Transition::Pending);
        };
        log::debug!(
            "barrier reached after {}",
            done.map_or("unrecognized command", CommandTag::as_str)
        );

        Ok(match done {
            Some(CommandTag::Init) => Transition::Revealed {
                alive: self.grid.alive_count(),
            },
            Some(CommandTag::Evolve) => {
                self.grid.swap(SwapPermit::mint());
                self.dispatch(&Order::Render, None)?;
                Transition::Swapped
            }
            Some(CommandTag::Random | CommandTag::Clear) => {
                self.dispatch(&Order::Render, None)?;
                Transition::Rendering
            }
            Some(CommandTag::Render | CommandTag::ChangeRules) | None => Transition::Settled(done),
        })
    }

    /// Block until a worker reports.
    pub fn recv(&self) -> Result<Notification, RecvError> {
        self.notifications.recv()
    }

    /// Wait up to `timeout` for a worker report.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Notification, RecvTimeoutError> {
        self.notifications.recv_timeout(timeout)
    }

    /// Close every inbox and join the workers. Returns each partition with
    /// the canvas its worker drew on.
    pub fn shutdown(self) -> Vec<(Partition, C)> {
        let partitions = self.partitions;
        let surfaces = self
            .workers
            .into_iter()
            .zip(partitions)
            .filter_map(|(worker, partition)| worker.join().map(|canvas| (partition, canvas)))
            .collect::<Vec<_>>();
        log::info!("worker pool shut down");
        surfaces
    }
}

/// Mint the phase token for one recipient of `order`.
fn command_for(order: &Order) -> Command {
    match order {
        Order::Evolve => Command::Evolve(EvolvePhase::mint()),
        Order::Render => Command::Render(RenderPhase::mint()),
        Order::ChangeRules(rules) => Command::ChangeRules(*rules),
        Order::Random(passes) => Command::Random {
            passes: *passes,
            phase: EditPhase::mint(),
        },
        Order::Clear => Command::Clear(EditPhase::mint()),
        Order::Unrecognized(message) => Command::Unrecognized(message.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Surface;
    use crate::pool::WorkerEvent;

    fn coordinator(width: usize, height: usize, workers: usize) -> Coordinator<Surface> {
        let grid = Arc::new(GridState::new(width, height));
        Coordinator::spawn(grid, workers).unwrap()
    }

    /// Feed completions until the barrier produces a transition.
    fn drive(coord: &mut Coordinator<Surface>) -> Transition {
        loop {
            let note = coord.recv_timeout(Duration::from_secs(5)).unwrap();
            if let WorkerEvent::WaitingAfter(tag) = note.event {
                match coord.on_completion(tag).unwrap() {
                    Transition::Pending => continue,
                    t => return t,
                }
            }
        }
    }

    #[test]
    fn test_partitions_follow_worker_count() {
        let coord = coordinator(8, 10, 3);
        assert_eq!(coord.worker_count(), 3);
        assert_eq!(coord.partitions()[0], Partition::rows(8, 0, 4));
        assert_eq!(coord.partitions()[2].end, 80);
        coord.shutdown();
    }

    #[test]
    fn test_workers_clamped_to_rows() {
        let coord = coordinator(4, 2, 8);
        assert_eq!(coord.worker_count(), 2);
        coord.shutdown();
    }

    #[test]
    fn test_tick_phase_order() {
        let mut coord = coordinator(6, 6, 3);
        let config = SimulationConfig {
            width: 6,
            height: 6,
            density: 2,
            ..SimulationConfig::default()
        };
        for (x, y) in [(1, 2), (2, 2), (3, 2)] {
            coord.grid().set(x, y, true);
        }

        coord.init(&config).unwrap();
        assert_eq!(drive(&mut coord), Transition::Revealed { alive: 3 });

        coord.dispatch(&Order::Evolve, None).unwrap();
        assert!(!coord.is_idle());
        assert_eq!(drive(&mut coord), Transition::Swapped);
        assert_eq!(coord.grid().active_buffer(), 1);
        // Blinker turned vertical
        assert!(coord.grid().is_alive(2, 1) && coord.grid().is_alive(2, 3));

        assert_eq!(
            drive(&mut coord),
            Transition::Settled(Some(CommandTag::Render))
        );
        assert!(coord.is_idle());

        let surfaces = coord.shutdown();
        assert_eq!(surfaces.len(), 3);
    }

    #[test]
    fn test_targeted_random_then_render() {
        let mut coord = coordinator(10, 10, 2);
        let config = SimulationConfig {
            width: 10,
            height: 10,
            random_seed: Some(9),
            ..SimulationConfig::default()
        };
        coord.init(&config).unwrap();
        drive(&mut coord);

        coord.dispatch(&Order::Random(5), Some(1)).unwrap();
        assert_eq!(coord.busy(), 1);
        assert_eq!(drive(&mut coord), Transition::Rendering);
        assert_eq!(
            drive(&mut coord),
            Transition::Settled(Some(CommandTag::Render))
        );
        assert!(coord.grid().alive_count() > 0);

        coord.dispatch(&Order::Clear, None).unwrap();
        assert_eq!(drive(&mut coord), Transition::Rendering);
        drive(&mut coord);
        assert_eq!(coord.grid().alive_count(), 0);

        assert!(matches!(
            coord.dispatch(&Order::Render, Some(7)),
            Err(PoolError::NoSuchWorker(7))
        ));
        coord.shutdown();
    }

    #[test]
    fn test_failed_broadcast_keeps_barrier_consistent() {
        let mut coord = coordinator(6, 6, 3);
        coord.init(&SimulationConfig::default()).unwrap();
        drive(&mut coord);

        coord.workers[1].disconnect();
        assert!(matches!(
            coord.dispatch(&Order::Render, None),
            Err(PoolError::WorkerGone(1))
        ));
        // Only worker 0 received the command
        assert_eq!(coord.busy(), 1);
        assert_eq!(
            drive(&mut coord),
            Transition::Settled(Some(CommandTag::Render))
        );
        assert!(coord.is_idle());

        assert!(matches!(
            coord.dispatch(&Order::Clear, Some(1)),
            Err(PoolError::WorkerGone(1))
        ));
        assert!(coord.is_idle());
        coord.shutdown();
    }

    #[test]
    fn test_unrecognized_still_settles() {
        let mut coord = coordinator(4, 4, 2);
        coord.init(&SimulationConfig::default()).unwrap();
        drive(&mut coord);

        coord
            .dispatch(&Order::Unrecognized("DANCE".into()), None)
            .unwrap();
        let mut errors = 0;
        let transition = loop {
            let note = coord.recv_timeout(Duration::from_secs(5)).unwrap();
            match note.event {
                WorkerEvent::Error(_) => errors += 1,
                WorkerEvent::WaitingAfter(tag) => match coord.on_completion(tag).unwrap() {
                    Transition::Pending => {}
                    t => break t,
                },
                WorkerEvent::Fault(msg) => panic!("unexpected fault: {msg}"),
            }
        };
        assert_eq!(errors, 2);
        assert_eq!(transition, Transition::Settled(None));
        coord.shutdown();
    }
}
