use thiserror::Error;
use tracing::{error, info};

use crate::broker::{BrokerLink, ConnectionLost, DeclareOutcome, PassiveOutcome, QueueChannel};
use crate::config::QueueSpec;
use crate::report::{Outcome, RunSummary};

/// The connection died mid-run. `partial` holds the counts for everything
/// settled before the loss; `unattempted` names the queues never reached.
#[derive(Debug, Error)]
#[error("reconciliation halted, {} queue(s) never attempted", .unattempted.len())]
pub struct Halted {
    pub partial: RunSummary,
    pub unattempted: Vec<String>,
    #[source]
    pub cause: ConnectionLost,
}

impl Halted {
    fn new(partial: RunSummary, specs: &[QueueSpec], next: usize, cause: ConnectionLost) -> Self {
        Self {
            partial,
            unattempted: specs[next..].iter().map(|s| s.name.clone()).collect(),
            cause,
        }
    }
}

/// Bring every desired queue into existence, strictly in input order.
///
/// Each queue is probed first; an existing queue is re-declared with the
/// desired attributes to validate them, a missing one is created. Broker
/// refusals are counted and logged, never fatal: the channel the refusal
/// killed is replaced and the loop moves on. Only a dead connection stops
/// the run.
pub async fn reconcile<B: BrokerLink>(
    broker: &mut B,
    specs: &[QueueSpec],
) -> Result<RunSummary, Halted> {
    let mut summary = RunSummary::sized(specs.len());

    let mut chan = match broker.open_channel().await {
        Ok(chan) => chan,
        Err(cause) => return Err(Halted::new(summary, specs, 0, cause)),
    };

    for (index, spec) in specs.iter().enumerate() {
        match reconcile_one(broker, chan, spec).await {
            Ok((next, outcome)) => {
                summary.record(&outcome);
                chan = next;
            }
            Err(cause) => {
                error!("Queue {} lost the broker connection during recovery.", spec.name);
                summary.failed += 1;
                return Err(Halted::new(summary, specs, index + 1, cause));
            }
        }
    }

    Ok(summary)
}

/// One pass of the per-queue decision procedure. Returns the channel to use
/// for the next queue; every failure path acquires a fresh one before
/// returning, so the caller never holds an invalidated channel.
async fn reconcile_one<B: BrokerLink>(
    broker: &mut B,
    chan: B::Chan,
    spec: &QueueSpec,
) -> Result<(B::Chan, Outcome), ConnectionLost> {
    match chan.probe(&spec.name).await {
        // queue exists; re-declare with the desired attributes to validate
        PassiveOutcome::Exists { chan, .. } => match chan.declare(spec).await {
            DeclareOutcome::Declared {
                chan,
                message_count,
            } => {
                info!("Queue {} has {} message(s).", spec.name, message_count);
                Ok((chan, Outcome::Validated { message_count }))
            }
            DeclareOutcome::Refused(err) => {
                error!("Queue {} on validation got error: {}", spec.name, err);
                let chan = broker.open_channel().await?;
                Ok((chan, Outcome::Failed(err)))
            }
        },
        // the failed passive declare closed the channel; recover, then create
        PassiveOutcome::Missing => {
            let chan = broker.open_channel().await?;
            match chan.declare(spec).await {
                DeclareOutcome::Declared {
                    chan,
                    message_count,
                } => {
                    info!("Queue {} has {} message(s).", spec.name, message_count);
                    Ok((chan, Outcome::Created { message_count }))
                }
                DeclareOutcome::Refused(err) => {
                    error!("Queue {} on creation got error: {}", spec.name, err);
                    let chan = broker.open_channel().await?;
                    Ok((chan, Outcome::Failed(err)))
                }
            }
        }
        PassiveOutcome::Refused(err) => {
            error!("Queue {} on existence check got error: {}", spec.name, err);
            let chan = broker.open_channel().await?;
            Ok((chan, Outcome::Failed(err)))
        }
    }
}
