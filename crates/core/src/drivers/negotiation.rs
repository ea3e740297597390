//! Contract negotiation driver.
//!
//! Builds the offer from the dataset's first policy, starts the remote
//! negotiation, polls it to a terminal state and persists the result. On
//! terminal success the process moves to Negotiated and the caller chains
//! the transfer driver; on any failure the process is marked Failed with a
//! `negotiation-failed` journal entry.

use crate::drivers::DriverContext;
use crate::edc::PollOutcome;
use crate::state::transitions;
use anyhow::{anyhow, bail, Result};
use dpp_protocol::{Dataset, History, IdResponse, Negotiation, NegotiationRequest, Offer};
use tracing::{info, warn};

/// Step name recorded when this driver fails.
const FAILED_STEP: &str = "negotiation-failed";

/// Drive one contract negotiation for `process_id`.
///
/// Returns the terminal negotiation on success, `None` when the process
/// was cancelled or the negotiation failed (the journal and process state
/// carry the details).
pub async fn run(
    ctx: &DriverContext,
    process_id: &str,
    bpn: &str,
    dataset: &Dataset,
) -> Option<Negotiation> {
    match drive(ctx, process_id, bpn, dataset).await {
        Ok(outcome) => outcome,
        Err(error) => {
            warn!(%process_id, %error, "contract negotiation failed");
            transitions::fail_process(&ctx.store, &ctx.model, process_id, FAILED_STEP);
            None
        }
    }
}

async fn drive(
    ctx: &DriverContext,
    process_id: &str,
    bpn: &str,
    dataset: &Dataset,
) -> Result<Option<Negotiation>> {
    let process = ctx.store.get(process_id)?;
    let offer = Offer::from_dataset(dataset)
        .ok_or_else(|| anyhow!("dataset [{}] carries no usable policy", dataset.asset_id))?;
    let request = NegotiationRequest::new(&process.endpoint, bpn, offer);

    // Persist the outgoing request with a placeholder id first, so a crash
    // between here and the remote answer leaves a diagnosable journal.
    ctx.store
        .save_negotiation_request(process_id, &request, &IdResponse::placeholder(process_id), None)?;
    let response = ctx.edc.start_negotiation(&request).await?;
    info!(%process_id, negotiation_id = %response.id, "negotiation requested");
    ctx.store
        .save_negotiation_request(process_id, &request, &response, None)?;

    let outcome = ctx
        .edc
        .poll_negotiation(
            &response.id,
            || ctx.model.is_terminated(process_id),
            |state| {
                ctx.store
                    .set_status(process_id, "negotiation", History::new(&response.id, state))
                    .map(drop)
            },
        )
        .await?;

    let negotiation = match outcome {
        PollOutcome::Aborted => {
            info!(%process_id, "negotiation cancelled");
            return Ok(None);
        }
        PollOutcome::Terminal(negotiation) => negotiation,
    };

    ctx.store.save_negotiation(process_id, &negotiation, None)?;
    if !negotiation.is_successful() {
        bail!(
            "contract negotiation [{}] ended in state [{}]",
            negotiation.id,
            negotiation.state
        );
    }

    if ctx.model.is_terminated(process_id) {
        info!(%process_id, "terminated process stopped before transfer");
        return Ok(None);
    }
    transitions::mark_negotiated(&ctx.store, &ctx.model, process_id)?;
    info!(%process_id, state = %negotiation.state, "negotiation finished");
    Ok(Some(negotiation))
}
