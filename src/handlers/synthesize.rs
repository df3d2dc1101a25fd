//! # Speech Synthesis
//!
//! `GET /synthesize?text=...&voice=...` returns playable WAV audio.
//!
//! ## Pipeline:
//! 1. Copy the query, forcing `accept=audio/wav`
//! 2. Call the synthesizer and buffer the full audio body
//! 3. Repair the RIFF and `data` size fields (see [`crate::audio::header`])
//! 4. Send the repaired buffer in one piece with `Content-Type: audio/wav`
//!
//! Every failure ends in a 5xx JSON error; the connection is never left open.

use crate::audio;
use crate::clients::synthesizer::{SynthesisParams, WAV_MIME};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

pub async fn synthesize(
    state: web::Data<AppState>,
    query: web::Query<BTreeMap<String, String>>,
) -> AppResult<HttpResponse> {
    let params = SynthesisParams::from_query(query.into_inner());

    let raw = state
        .clients
        .synthesizer
        .synthesize(&params)
        .await
        .map_err(|err| {
            error!(
                service = err.service(),
                upstream_status = ?err.status(),
                error = %err,
                voice = ?params.get("voice"),
                "Synthesize error"
            );
            AppError::synthesis_failed(err)
        })?;

    let repaired = audio::repair_header(raw.to_vec()).map_err(|err| {
        error!(error = %err, bytes = raw.len(), "Synthesized audio could not be repaired");
        AppError::from(err)
    })?;

    match audio::inspect(&repaired) {
        Ok(info) => debug!(
            sample_rate = info.sample_rate,
            channels = info.channels,
            bits_per_sample = info.bits_per_sample,
            frames = info.frame_count(),
            duration_ms = info.duration_ms(),
            "Sending synthesized audio"
        ),
        Err(err) => warn!(error = %err, "Repaired audio has no readable format chunk"),
    }

    Ok(HttpResponse::Ok().content_type(WAV_MIME).body(repaired))
}
