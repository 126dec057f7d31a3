/// Always answers 200: failures travel inside the `ActionResponse` so the
/// caller can still render a frame.
async fn post_action(
    State(state): State<AppState>,
    payload: Result<Json<ActionMessage>, JsonRejection>,
) -> Json<ActionResponse> {
    let message = match payload {
        Ok(Json(message)) => message,
        Err(rejection) => {
            return Json(ActionResponse::failure(ApiError::new(
                ErrorCode::ValidationFailure,
                "Invalid action message.",
                Some(rejection.body_text()),
            )));
        }
    };

    let engine = state.engine.clone();
    match tokio::task::spawn_blocking(move || engine.handle(&message)).await {
        Ok(response) => Json(response),
        Err(join_error) => {
            error!(error = %join_error, "action.handler_aborted");
            Json(ActionResponse::failure(ApiError::new(
                ErrorCode::InternalError,
                "Something went wrong. Please try again later.",
                None,
            )))
        }
    }
}
