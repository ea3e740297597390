//! Digital-twin-registry transfer driver.
//!
//! Variant of the transfer driver used to fetch a counterparty's registry.
//! Several of these run in parallel for one process, one per discovered
//! registry endpoint, so every persisted step is endpoint-qualified and a
//! single failing endpoint never fails the process: other endpoints may
//! still succeed.

use crate::drivers::DriverContext;
use crate::edc::{data_endpoint, PollOutcome};
use anyhow::Result;
use dpp_protocol::{Dtr, History, IdResponse, Transfer, TransferRequest};
use tracing::{info, warn};

/// Drive the registry transfer for one endpoint of `process_id`.
pub async fn run(
    ctx: &DriverContext,
    process_id: &str,
    endpoint_id: &str,
    dtr: &Dtr,
) -> Option<Transfer> {
    match drive(ctx, process_id, endpoint_id, dtr).await {
        Ok(outcome) => outcome,
        Err(error) => {
            warn!(%process_id, endpoint_id, %error, "registry transfer failed");
            let step = format!("dtr-{endpoint_id}-transfer-failed");
            if let Err(error) = ctx
                .store
                .set_status(process_id, &step, History::new(endpoint_id, "FAILED"))
            {
                warn!(%process_id, endpoint_id, %error, "could not journal the registry failure");
            }
            None
        }
    }
}

async fn drive(
    ctx: &DriverContext,
    process_id: &str,
    endpoint_id: &str,
    dtr: &Dtr,
) -> Result<Option<Transfer>> {
    let edc_config = &ctx.edc.config().edc;
    // The extra endpoint-id segment lets the callback handler demultiplex
    // parallel registry fetches for the same process.
    let receiver = format!("{}/{}/{}", edc_config.receiver_endpoint, process_id, endpoint_id);
    let bpn = dtr.bpn.clone().unwrap_or_else(|| edc_config.participant_id.clone());
    let request = TransferRequest::new(
        &dtr.asset_id,
        data_endpoint(&dtr.endpoint),
        bpn,
        &dtr.contract_id,
        receiver,
    );

    ctx.store.save_transfer_request(
        process_id,
        &request,
        &IdResponse::placeholder(process_id),
        Some(endpoint_id),
    )?;
    let response = ctx.edc.start_transfer(&request).await?;
    info!(%process_id, endpoint_id, transfer_id = %response.id, "registry transfer requested");
    ctx.store
        .save_transfer_request(process_id, &request, &response, Some(endpoint_id))?;

    let step = format!("dtr-{endpoint_id}-transfer");
    let outcome = ctx
        .edc
        .poll_transfer(
            &response.id,
            || ctx.model.is_terminated(process_id),
            |state| {
                ctx.store
                    .set_status(process_id, &step, History::new(&response.id, state))
                    .map(drop)
            },
        )
        .await?;

    let transfer = match outcome {
        PollOutcome::Aborted => {
            info!(%process_id, endpoint_id, "registry transfer cancelled");
            return Ok(None);
        }
        PollOutcome::Terminal(transfer) => transfer,
    };

    // A terminated registry transfer is incomplete, not fatal: other
    // registry endpoints may still deliver.
    if transfer.state == "TERMINATED" {
        ctx.store.set_status(
            process_id,
            &format!("dtr-{endpoint_id}-transfer-incomplete"),
            History::new(endpoint_id, "INCOMPLETE"),
        )?;
    }

    ctx.store.save_transfer(process_id, &transfer, Some(endpoint_id))?;
    if transfer.is_successful() {
        ctx.store
            .set_status(process_id, &step, History::new(endpoint_id, "OK"))?;
        info!(%process_id, endpoint_id, "registry transfer completed");
    }
    Ok(Some(transfer))
}
