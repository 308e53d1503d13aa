use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use studyloop_core::{SessionInitializer, SessionKey, SessionPhase, StartRequest, StudySession};

use crate::api::dto::{
    parse_mode, parse_verdict, session_out, step_out, AnswerIn, NavigateIn, SessionOut, StartIn,
    StepOut,
};

/// Live sessions held by the server. `by_key` makes a repeated start
/// with the same set-up land on the running session instead of a new
/// one.
#[derive(Default)]
pub struct Registry {
    by_id: HashMap<Uuid, Arc<Mutex<StudySession>>>,
    by_key: HashMap<SessionKey, Uuid>,
}

pub struct AppState {
    pub init: SessionInitializer,
    pub sessions: Mutex<Registry>,
}

pub async fn start_session(
    State(st): State<Arc<AppState>>,
    Json(body): Json<StartIn>,
) -> Result<Json<SessionOut>, StatusCode> {
    let mode = parse_mode(&body.mode).ok_or(StatusCode::BAD_REQUEST)?;
    if body.cards.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let cards = body
        .cards
        .into_iter()
        .map(|c| c.into_flashcard(body.list_id))
        .collect();
    let req = StartRequest {
        user: body.user,
        list_id: body.list_id,
        mode,
        cards,
        use_all_cards: body.use_all_cards,
        favorites: body.starred.map(|v| v.into_iter().collect()),
    };
    let key = req.key();

    let mut reg = st.sessions.lock().await;
    if let Some(id) = reg.by_key.get(&key).copied() {
        if let Some(existing) = reg.by_id.get(&id).cloned() {
            let session = existing.lock().await;
            if session.phase() != SessionPhase::Finished {
                return Ok(Json(session_out(&session)));
            }
        }
        // A finished session stops blocking its key.
        reg.by_key.remove(&key);
        reg.by_id.remove(&id);
    }
    let session = st.init.start_or_resume(req).await;
    let id = session.id();
    let out = session_out(&session);
    reg.by_id.insert(id, Arc::new(Mutex::new(session)));
    reg.by_key.insert(key, id);
    Ok(Json(out))
}

pub async fn get_session(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionOut>, StatusCode> {
    let session = lookup(&st, id).await?;
    let session = session.lock().await;
    Ok(Json(session_out(&session)))
}

pub async fn answer(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<AnswerIn>,
) -> Result<Json<StepOut>, StatusCode> {
    let verdict = parse_verdict(&body.verdict).ok_or(StatusCode::BAD_REQUEST)?;
    let session = lookup(&st, id).await?;
    let mut session = session.lock().await;
    let step = session.submit(verdict).await;
    Ok(Json(step_out(&session, step)))
}

pub async fn navigate(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<NavigateIn>,
) -> Result<Json<SessionOut>, StatusCode> {
    let session = lookup(&st, id).await?;
    let mut session = session.lock().await;
    match body.direction.to_lowercase().as_str() {
        "forward" | "next" => {
            session.advance().await;
        }
        "back" | "prev" => {
            session.back();
        }
        _ => return Err(StatusCode::BAD_REQUEST),
    }
    Ok(Json(session_out(&session)))
}

/// The explicit continue decision after a completed round.
pub async fn continue_session(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StepOut>, StatusCode> {
    let session = lookup(&st, id).await?;
    let mut session = session.lock().await;
    let step = session.next_round().await;
    Ok(Json(step_out(&session, step)))
}

pub async fn delete_session(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let entry = {
        let mut reg = st.sessions.lock().await;
        let entry = reg.by_id.remove(&id).ok_or(StatusCode::NOT_FOUND)?;
        reg.by_key.retain(|_, v| *v != id);
        entry
    };
    // A racing request may still hold the session; its buffers flush
    // on drop either way.
    if let Ok(m) = Arc::try_unwrap(entry) {
        m.into_inner().dispose().await;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn lookup(st: &AppState, id: Uuid) -> Result<Arc<Mutex<StudySession>>, StatusCode> {
    let reg = st.sessions.lock().await;
    reg.by_id.get(&id).cloned().ok_or(StatusCode::NOT_FOUND)
}
