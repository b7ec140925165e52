#![forbid(unsafe_code)]

use std::ops::ControlFlow;

use tokio::sync::{mpsc, mpsc::error::TryRecvError, oneshot};
use tracing::{debug, trace};

use crate::{controller::Controller, error::StreamResult, source::Source};

/// Commands from stream/reader handles to the driver task, which is
/// the sole owner of the source.
pub(crate) enum DriverCmd {
    Cancel {
        reason: Option<String>,
        done: oneshot::Sender<StreamResult<()>>,
    },
    Seek {
        position: u64,
        done: oneshot::Sender<StreamResult<u64>>,
    },
}

/// Driver task: runs `start`, then services demand events and
/// commands, serializing every source callback on one logical
/// timeline.
///
/// Pull discipline: a pull is issued only after a demand event
/// (start completion, enqueue, dequeue, pending-read registration)
/// and only while `desired_size > 0`; a pull is re-issued immediately
/// only when a new demand event arrived while it was in flight.
pub(crate) async fn drive<S: Source>(
    mut source: S,
    controller: Controller<S::Item>,
    mut cmd_rx: mpsc::UnboundedReceiver<DriverCmd>,
    mut demand_rx: mpsc::UnboundedReceiver<()>,
) {
    trace!("stream driver started");

    match source.start(&controller).await {
        Ok(()) => controller.shared().mark_started(),
        Err(reason) => {
            debug!(%reason, "source start failed");
            controller.shared().error(reason);
            return;
        }
    }

    loop {
        tokio::select! {
            biased;
            cmd = cmd_rx.recv() => match cmd {
                None => {
                    trace!("all stream handles dropped; driver stopping");
                    return;
                }
                Some(cmd) => {
                    if handle_cmd(&mut source, &controller, cmd).await.is_break() {
                        return;
                    }
                }
            },
            event = demand_rx.recv() => {
                if event.is_none() {
                    return;
                }
            }
        }

        if controller.shared().is_terminal() {
            trace!("stream reached a terminal state; driver stopping");
            return;
        }

        while controller.shared().should_pull() {
            // Coalesce demand raised before this pull; only events
            // raised during the pull itself warrant another one.
            while demand_rx.try_recv().is_ok() {}

            controller.shared().begin_pull();
            let result = source.pull(&controller).await;
            controller.shared().end_pull();

            if let Err(reason) = result {
                debug!(%reason, "source pull failed");
                controller.shared().error(reason);
                break;
            }
            if !cmd_rx.is_empty() {
                break;
            }
            match demand_rx.try_recv() {
                Ok(()) => {}
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }
    }
}

async fn handle_cmd<S: Source>(
    source: &mut S,
    controller: &Controller<S::Item>,
    cmd: DriverCmd,
) -> ControlFlow<()> {
    match cmd {
        DriverCmd::Cancel { reason, done } => {
            debug!(?reason, "cancelling stream");
            let result = source.cancel(reason).await;
            controller.shared().finish_cancel();
            let _ = done.send(result);
            ControlFlow::Break(())
        }
        DriverCmd::Seek { position, done } => {
            trace!(position, "delegating seek to source");
            let result = source.seek(controller, position).await;
            if let Err(reason) = &result {
                // A seek rejection is a source failure like any other.
                controller.shared().error(reason.clone());
            }
            let _ = done.send(result);
            if controller.shared().is_terminal() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        }
    }
}
