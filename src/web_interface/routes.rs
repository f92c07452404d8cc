use log::error;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::{ApiError, SampleRequest, SampleResponse, SessionResponse};
use crate::controller::Controller;
use crate::error_handling::types::ControllerError;
use crate::session_management::SessionId;

const MAX_BODY_BYTES: u64 = 64 * 1024;

fn with_controller(
    controller: Arc<Controller>,
) -> impl Filter<Extract = (Arc<Controller>,), Error = Infallible> + Clone {
    warp::any().map(move || controller.clone())
}

fn error_reply(status: StatusCode, message: String) -> reply::Response {
    reply::with_status(reply::json(&ApiError { message }), status).into_response()
}

/// Every route of the agent.
pub fn routes(
    controller: Arc<Controller>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    dashboard_route()
        .or(list_sessions_route(controller.clone()))
        .or(get_session_route(controller.clone()))
        .or(active_sessions_command_route(controller.clone()))
        .or(record_sample_route(controller.clone()))
        .or(harvest_route(controller))
}

/// GET /
pub fn dashboard_route() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path::end().and(warp::get()).map(|| {
        reply::html(
            r#"<html><head><title>X-Ray Agent</title></head>
                <body><h1>X-Ray agent is running</h1><p>See /sessions for JSON.</p></body></html>"#,
        )
    })
}

/// GET /sessions
pub fn list_sessions_route(
    controller: Arc<Controller>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("sessions")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_controller(controller))
        .and_then(list_sessions)
}

/// GET /sessions/:id
pub fn get_session_route(
    controller: Arc<Controller>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("sessions" / u64)
        .and(warp::get())
        .and(with_controller(controller))
        .and_then(get_session)
}

/// POST /commands/active_xray_sessions
pub fn active_sessions_command_route(
    controller: Arc<Controller>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("commands" / "active_xray_sessions")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<Value>())
        .and(with_controller(controller))
        .and_then(apply_active_sessions)
}

/// POST /samples
pub fn record_sample_route(
    controller: Arc<Controller>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("samples")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json::<SampleRequest>())
        .and(with_controller(controller))
        .and_then(record_sample)
}

/// POST /harvest
pub fn harvest_route(
    controller: Arc<Controller>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path("harvest")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_controller(controller))
        .and_then(harvest)
}

pub async fn list_sessions(controller: Arc<Controller>) -> Result<reply::Response, Rejection> {
    let sessions: Vec<SessionResponse> = controller
        .registry()
        .active_sessions()
        .iter()
        .map(|session| SessionResponse::from(session.as_ref()))
        .collect();
    Ok(reply::json(&sessions).into_response())
}

pub async fn get_session(id: u64, controller: Arc<Controller>) -> Result<reply::Response, Rejection> {
    match controller.registry().lookup(SessionId(id)) {
        Some(session) => Ok(reply::json(&SessionResponse::from(session.as_ref())).into_response()),
        None => Ok(error_reply(
            StatusCode::NOT_FOUND,
            format!("Session {} is not active", id),
        )),
    }
}

pub async fn apply_active_sessions(
    body: Value,
    controller: Arc<Controller>,
) -> Result<reply::Response, Rejection> {
    let outcome =
        tokio::task::spawn_blocking(move || controller.handle_command_payload(body)).await;
    match outcome {
        Ok(Ok(())) => Ok(StatusCode::NO_CONTENT.into_response()),
        Ok(Err(e @ ControllerError::CommandError(_))) => {
            Ok(error_reply(StatusCode::BAD_REQUEST, e.to_string()))
        }
        Ok(Err(e)) => Ok(error_reply(StatusCode::BAD_GATEWAY, e.to_string())),
        Err(e) => {
            error!("Reconciliation task failed: {}", e);
            Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Reconciliation task failed".to_string(),
            ))
        }
    }
}

pub async fn record_sample(
    request: SampleRequest,
    controller: Arc<Controller>,
) -> Result<reply::Response, Rejection> {
    let response = match controller.record_sample(&request.transaction_name, request.stack) {
        Some((session_id, recorded)) => SampleResponse {
            session_id: Some(session_id),
            recorded,
        },
        None => SampleResponse {
            session_id: None,
            recorded: false,
        },
    };
    Ok(reply::json(&response).into_response())
}

pub async fn harvest(controller: Arc<Controller>) -> Result<reply::Response, Rejection> {
    match tokio::task::spawn_blocking(move || controller.harvest()).await {
        Ok(sets) => Ok(reply::json(&sets).into_response()),
        Err(e) => {
            error!("Harvest task failed: {}", e);
            Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Harvest task failed".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ActiveSessionsCommand;
    use crate::configuration::Config;
    use serde_json::json;
    use tokio_test::assert_ok;

    fn controller() -> Arc<Controller> {
        let config = Config::from_toml(
            r#"
[[sessions]]
x_ray_id = 123
key_transaction_name = "Controller/blogs/index"
sample_period = 0.000001
run_profiler = true
"#,
        )
        .unwrap();
        Arc::new(Controller::new(config).unwrap())
    }

    #[tokio::test]
    async fn test_command_activates_session() {
        let controller = controller();
        let response = assert_ok!(
            apply_active_sessions(json!({"xray_ids": [123]}), controller.clone()).await
        );
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(controller.registry().includes(SessionId(123)));

        let response = assert_ok!(get_session(123, controller.clone()).await);
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_command_is_bad_request() {
        let response = assert_ok!(
            apply_active_sessions(json!({"xray_ids": "everything"}), controller()).await
        );
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unresolvable_command_is_bad_gateway() {
        let controller = controller();
        let response = assert_ok!(
            apply_active_sessions(json!({"xray_ids": [555]}), controller.clone()).await
        );
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(controller.registry().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let response = assert_ok!(get_session(9, controller()).await);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sample_and_harvest() {
        let controller = controller();
        controller
            .handle_active_xray_sessions(&ActiveSessionsCommand::new(vec![SessionId(123)]))
            .unwrap();

        let request = SampleRequest {
            transaction_name: "Controller/blogs/index".into(),
            stack: vec!["BlogsController#index".into()],
        };
        let response = assert_ok!(record_sample(request, controller.clone()).await);
        assert_eq!(response.status(), StatusCode::OK);

        let response = assert_ok!(harvest(controller.clone()).await);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(controller.harvest()[0].is_empty());
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let response = assert_ok!(list_sessions(controller()).await);
        assert_eq!(response.status(), StatusCode::OK);
    }
}
