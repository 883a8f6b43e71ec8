use axum::{
    Router,
    extract::Request,
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as AxumError, Header},
};

use std::sync::Arc;

use crate::{approvals, financings, maintenance, schedules};
use engine::{Actor, Engine};

static ACTOR_ROLE_HEADER: axum::http::HeaderName =
    axum::http::HeaderName::from_static("x-actor-role");
static ACTOR_ID_HEADER: axum::http::HeaderName = axum::http::HeaderName::from_static("x-actor-id");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// The authenticated caller, as asserted by the gateway in front of us.
///
/// Handlers receive it as an `Extension` once `require_actor` has validated
/// the headers.
#[derive(Clone, Debug)]
pub struct Caller {
    pub role: Actor,
    pub id: String,
}

/// `TypedHeader` for the caller's role.
///
/// Requests must carry an "x-actor-role" entry holding one of the known
/// roles (`farmer`, `bank`, `admin`).
#[derive(Debug)]
struct ActorRoleHeader(Actor);

impl Header for ActorRoleHeader {
    fn name() -> &'static axum::http::HeaderName {
        &ACTOR_ROLE_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let Ok(actor) = Actor::try_from(value) else {
            return Err(AxumError::invalid());
        };

        Ok(ActorRoleHeader(actor))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        values.extend(std::iter::once(axum::http::HeaderValue::from_static(
            self.0.as_str(),
        )));
    }
}

/// `TypedHeader` for the caller's identifier ("x-actor-id").
#[derive(Debug)]
struct ActorIdHeader(String);

impl Header for ActorIdHeader {
    fn name() -> &'static axum::http::HeaderName {
        &ACTOR_ID_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let value = value.trim();
        if value.is_empty() {
            return Err(AxumError::invalid());
        }

        Ok(ActorIdHeader(value.to_string()))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        match axum::http::HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-actor-id header"),
        }
    }
}

async fn require_actor(
    role: Option<TypedHeader<ActorRoleHeader>>,
    id: Option<TypedHeader<ActorIdHeader>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(TypedHeader(ActorRoleHeader(role))) = role else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    let Some(TypedHeader(ActorIdHeader(id))) = id else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    request.extensions_mut().insert(Caller { role, id });
    Ok(next.run(request).await)
}

fn router(state: ServerState) -> Router {
    Router::new()
        .route(
            "/financings",
            post(financings::create).get(financings::list),
        )
        .route("/financings/{id}", get(financings::get))
        .route("/financings/{id}/transition", post(financings::transition))
        .route("/financings/{id}/overdue", get(financings::overdue))
        .route("/financings/{id}/summary", get(financings::summary))
        .route(
            "/financings/{id}/early-settlement",
            get(financings::early_settlement),
        )
        .route(
            "/financings/{id}/installments/{installment_id}/pay",
            post(financings::pay),
        )
        .route("/approvals", get(approvals::queue))
        .route("/approvals/{id}/decision", post(approvals::decision))
        .route(
            "/maintenance/overdue-sweep",
            post(maintenance::overdue_sweep),
        )
        .route("/schedule/preview", post(schedules::preview))
        .route_layer(middleware::from_fn(require_actor))
        .with_state(state)
}

pub async fn run_with_listener(
    engine: Arc<Engine>,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState { engine };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Arc<Engine>,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
