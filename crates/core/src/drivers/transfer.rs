//! Data transfer driver.
//!
//! Runs after a terminal-success negotiation: builds the transfer request
//! against the agreed contract, starts the remote transfer, polls it to a
//! terminal state and persists the result. Terminal success completes the
//! process; anything else marks it Failed with a `transfer-failed` entry.

use crate::drivers::DriverContext;
use crate::edc::PollOutcome;
use crate::state::transitions;
use anyhow::{anyhow, bail, Result};
use dpp_protocol::{Dataset, History, IdResponse, Negotiation, Transfer, TransferRequest};
use tracing::{debug, info, warn};

const FAILED_STEP: &str = "transfer-failed";

/// Drive one data transfer for `process_id`.
pub async fn run(
    ctx: &DriverContext,
    process_id: &str,
    bpn: &str,
    dataset: &Dataset,
    negotiation: &Negotiation,
) -> Option<Transfer> {
    match drive(ctx, process_id, bpn, dataset, negotiation).await {
        Ok(outcome) => outcome,
        Err(error) => {
            warn!(%process_id, %error, "transfer process failed");
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
    negotiation: &Negotiation,
) -> Result<Option<Transfer>> {
    let process = ctx.store.get(process_id)?;
    let contract_id = negotiation
        .contract_agreement_id
        .as_deref()
        .ok_or_else(|| anyhow!("negotiation [{}] carries no contract agreement id", negotiation.id))?;

    // The process id in the receiver path identifies the session to the
    // callback handler.
    let receiver = format!("{}/{}", ctx.edc.config().edc.receiver_endpoint, process_id);
    let request = TransferRequest::new(
        &dataset.asset_id,
        &process.endpoint,
        bpn,
        contract_id,
        receiver,
    );

    ctx.store
        .save_transfer_request(process_id, &request, &IdResponse::placeholder(process_id), None)?;
    let response = ctx.edc.start_transfer(&request).await?;
    info!(%process_id, transfer_id = %response.id, "transfer requested");
    ctx.store
        .save_transfer_request(process_id, &request, &response, None)?;

    let outcome = ctx
        .edc
        .poll_transfer(
            &response.id,
            || ctx.model.is_terminated(process_id),
            |state| {
                ctx.store
                    .set_status(process_id, "transfer", History::new(&response.id, state))
                    .map(drop)
            },
        )
        .await?;

    let transfer = match outcome {
        PollOutcome::Aborted => {
            info!(%process_id, "transfer cancelled");
            return Ok(None);
        }
        PollOutcome::Terminal(transfer) => transfer,
    };

    ctx.store.save_transfer(process_id, &transfer, None)?;
    if !transfer.is_successful() {
        bail!(
            "transfer process [{}] ended in state [{}]",
            transfer.id,
            transfer.state
        );
    }

    if let Err(error) = transitions::complete_process(&ctx.store, &ctx.model, process_id) {
        // A concurrent terminate between the poll and here wins the race.
        debug!(%process_id, %error, "transfer finished but the process was already closed");
        return Ok(Some(transfer));
    }
    info!(%process_id, state = %transfer.state, "negotiation and transfer completed");
    Ok(Some(transfer))
}
