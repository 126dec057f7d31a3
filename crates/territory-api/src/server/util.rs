fn apply_cors_headers(headers: &mut axum::http::HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-max-age"),
        HeaderValue::from_static("3600"),
    );
}

fn resolve_limit(requested: Option<usize>, default: usize) -> Result<usize, HttpApiError> {
    let limit = requested.unwrap_or(default);
    if limit == 0 || limit > MAX_LEADERBOARD_LIMIT {
        return Err(HttpApiError::invalid_query(
            format!("limit must be in [1, {MAX_LEADERBOARD_LIMIT}]"),
            Some(format!("limit={limit}")),
        ));
    }
    Ok(limit)
}

/// Store calls are synchronous and may wait on the connection lock.
async fn blocking<T, F>(query: F) -> Result<T, HttpApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    match tokio::task::spawn_blocking(query).await {
        Ok(result) => result.map_err(HttpApiError::from_store),
        Err(join_error) => Err(HttpApiError::internal(
            "query task aborted",
            Some(join_error.to_string()),
        )),
    }
}
