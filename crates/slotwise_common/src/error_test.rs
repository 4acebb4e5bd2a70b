#[cfg(test)]
mod tests {
    use crate::error::{HttpStatusCode, SlotwiseError};
    use crate::http::IntoHttpResponse;
    use crate::routes::routes;
    use crate::services::CalendarError;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_calendar_errors_map_to_http_codes() {
        let cases = [
            (CalendarError::Conflict, 409),
            (CalendarError::RateLimited("slow down".into()), 429),
            (CalendarError::AuthExpired("token".into()), 401),
            (CalendarError::Unavailable("503".into()), 502),
            (CalendarError::Ambiguous("timeout".into()), 502),
            (CalendarError::NotFound("evt".into()), 404),
            (CalendarError::InvalidEvent("end before start".into()), 400),
        ];
        for (err, code) in cases {
            let mapped: SlotwiseError = err.clone().into();
            assert_eq!(mapped.status_code(), code, "{err:?}");
        }
    }

    #[test]
    fn test_error_response_carries_status() {
        let response = SlotwiseError::ValidationError("bad time".into()).into_http_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_route_is_ok() {
        let response = routes()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
