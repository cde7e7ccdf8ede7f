// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;

use agent_relayer_context::RelayerContext;
use agent_relayer_utils::HandlerError;

/// Handles the metrics request, in the prometheus text format.
pub async fn handle_metric_info(
    State(ctx): State<Arc<RelayerContext>>,
) -> Result<impl IntoResponse, HandlerError> {
    let metrics = ctx.metrics.gather_metrics().map_err(|e| {
        HandlerError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics,
    ))
}
