//! Device boundary and the background worker that owns it.
//!
//! The audio thread may never close the device it is running on. When the
//! hold expires the bench calls [`CloseRequester::request_close`], which
//! drops a unit token into a bounded channel and returns immediately. The
//! [`DeviceWorker`] thread owns the [`DeviceSession`], waits on that channel
//! and on its command queue, and performs every close / restart / snapshot
//! off the realtime path.

use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded, never, select, unbounded};

use crate::error::DeviceError;
use crate::hold::SnapshotController;
use crate::orchestrator::Bench;

/// Platform audio device as seen by the bench.
///
/// Sessions are built and used on one thread (the [`DeviceWorker`]); they
/// need not be `Send`, since platform stream handles often are not.
pub trait DeviceSession {
    /// Input channels of the running device, 0 when closed.
    fn current_active_input_channel_count(&self) -> u32;

    /// Output channels of the running device, 0 when closed.
    fn current_active_output_channel_count(&self) -> u32;

    /// Stop streaming. Closing a closed device succeeds.
    fn close_device(&mut self) -> Result<(), DeviceError>;

    /// Reopen the last device configuration, preparing every stage again.
    /// Restarting an open device succeeds without reopening it.
    fn restart_last_device(&mut self) -> Result<(), DeviceError>;

    /// Whether the device is streaming.
    fn is_open(&self) -> bool;

    /// The bench, reachable only while the device is closed.
    fn bench_mut(&mut self) -> Option<&mut Bench>;
}

/// Create the close request channel.
pub fn close_channel() -> (CloseRequester, CloseSignal) {
    let (tx, rx) = bounded(1);
    (CloseRequester(tx), CloseSignal(rx))
}

/// Realtime side of the close request channel.
#[derive(Debug, Clone)]
pub struct CloseRequester(Sender<()>);

impl CloseRequester {
    /// Ask for the device to be closed. Never waits for the worker.
    ///
    /// When the worker is parked in `select!` on the other end, the send
    /// wakes it through the channel's waker, which briefly takes a mutex and
    /// unparks a thread. The hold raises at most one request per window, so
    /// this happens once per snapshot, never per block.
    ///
    /// Returns `false` when a request is already pending or the worker is gone.
    #[inline]
    pub fn request_close(&self) -> bool {
        self.0.try_send(()).is_ok()
    }
}

/// Worker side of the close request channel.
#[derive(Debug)]
pub struct CloseSignal(Receiver<()>);

impl CloseSignal {
    /// Take a pending request, if any.
    pub fn try_take(&self) -> bool {
        self.0.try_recv().is_ok()
    }

    /// Discard any pending request.
    pub fn drain(&self) {
        while self.try_take() {}
    }

    /// Underlying receiver, for `select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.0
    }
}

type Reply<T = ()> = Sender<Result<T, DeviceError>>;

/// Request served by the [`DeviceWorker`].
#[derive(Debug)]
pub enum DeviceCommand {
    /// Close the device.
    Close(Reply),
    /// Reopen the last device.
    Restart(Reply),
    /// Run the snapshot procedure.
    Snapshot(Reply),
    /// Leave snapshot mode and reopen the device.
    Resume(Reply),
    /// Report (input, output) channel counts.
    ChannelCounts(Reply<(u32, u32)>),
    /// Close the device and stop the worker.
    Shutdown,
}

/// Background thread owning the device session.
#[derive(Debug)]
pub struct DeviceWorker {
    commands: Sender<DeviceCommand>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceWorker {
    /// Spawn the worker and build the session on it.
    ///
    /// Returns once `factory` has run; its error is returned unchanged.
    pub fn spawn<D, F>(
        factory: F,
        controller: SnapshotController,
        close_signal: CloseSignal,
    ) -> Result<Self, DeviceError>
    where
        D: DeviceSession + 'static,
        F: FnOnce() -> Result<D, DeviceError> + Send + 'static,
    {
        let (commands, command_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);

        let thread = std::thread::Builder::new()
            .name("benchtop-device".into())
            .spawn(move || {
                let mut session = match factory() {
                    Ok(session) => {
                        let _ = ready_tx.send(Ok(()));
                        session
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                serve(&mut session, &controller, &close_signal, &command_rx);
            })
            .map_err(DeviceError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::debug!("device worker started");
                Ok(Self {
                    commands,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(DeviceError::WorkerGone)
            }
        }
    }

    fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> DeviceCommand,
    ) -> Result<T, DeviceError> {
        let (tx, rx) = bounded(1);
        self.commands
            .send(command(tx))
            .map_err(|_| DeviceError::WorkerGone)?;
        rx.recv().map_err(|_| DeviceError::WorkerGone)?
    }

    /// Close the device.
    pub fn close(&self) -> Result<(), DeviceError> {
        self.request(DeviceCommand::Close)
    }

    /// Reopen the last device.
    pub fn restart(&self) -> Result<(), DeviceError> {
        self.request(DeviceCommand::Restart)
    }

    /// Reset every stage and start a capture window.
    pub fn take_snapshot(&self) -> Result<(), DeviceError> {
        self.request(DeviceCommand::Snapshot)
    }

    /// Leave snapshot mode and stream freely.
    pub fn resume_streaming(&self) -> Result<(), DeviceError> {
        self.request(DeviceCommand::Resume)
    }

    /// (input, output) channel counts of the running device.
    pub fn channel_counts(&self) -> Result<(u32, u32), DeviceError> {
        self.request(DeviceCommand::ChannelCounts)
    }

    /// Close the device and join the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.commands.send(DeviceCommand::Shutdown);
            if thread.join().is_err() {
                tracing::error!("device worker panicked");
            }
        }
    }
}

impl Drop for DeviceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn serve<D: DeviceSession>(
    session: &mut D,
    controller: &SnapshotController,
    close_signal: &CloseSignal,
    commands: &Receiver<DeviceCommand>,
) {
    let disconnected = never();
    let mut requesters_alive = true;
    loop {
        let close_rx = if requesters_alive {
            close_signal.receiver()
        } else {
            &disconnected
        };
        select! {
            recv(close_rx) -> msg => {
                if msg.is_err() {
                    requesters_alive = false;
                    continue;
                }
                match session.close_device() {
                    Ok(()) => tracing::info!(
                        samples = controller.hold().sample_counter(),
                        "hold expired, device closed"
                    ),
                    Err(e) => tracing::error!(error = %e, "failed to close device after hold"),
                }
            }
            recv(commands) -> command => {
                let Ok(command) = command else { break };
                match command {
                    DeviceCommand::Close(reply) => {
                        let _ = reply.send(session.close_device());
                    }
                    DeviceCommand::Restart(reply) => {
                        if !session.is_open() {
                            close_signal.drain();
                        }
                        let _ = reply.send(session.restart_last_device());
                    }
                    DeviceCommand::Snapshot(reply) => {
                        let result = session.close_device().and_then(|()| {
                            close_signal.drain();
                            controller.take_snapshot(session)
                        });
                        if let Err(e) = &result {
                            tracing::warn!(error = %e, "snapshot failed");
                        }
                        let _ = reply.send(result);
                    }
                    DeviceCommand::Resume(reply) => {
                        if !session.is_open() {
                            close_signal.drain();
                        }
                        let _ = reply.send(controller.resume_streaming(session));
                    }
                    DeviceCommand::ChannelCounts(reply) => {
                        let _ = reply.send(Ok((
                            session.current_active_input_channel_count(),
                            session.current_active_output_channel_count(),
                        )));
                    }
                    DeviceCommand::Shutdown => break,
                }
            }
        }
    }

    if let Err(e) = session.close_device() {
        tracing::warn!(error = %e, "failed to close device on shutdown");
    }
    tracing::debug!("device worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_request_is_single_slot() {
        let (requester, signal) = close_channel();
        assert!(requester.request_close());
        assert!(!requester.request_close());
        assert!(signal.try_take());
        assert!(!signal.try_take());
        assert!(requester.request_close());
    }

    #[test]
    fn test_close_request_without_worker() {
        let (requester, signal) = close_channel();
        drop(signal);
        assert!(!requester.request_close());
    }
}
