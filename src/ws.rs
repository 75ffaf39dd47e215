//! Live view projection over WebSocket.
//!
//! Each connection subscribes to the store's change channel. On connect, and
//! again after every committed change to the caller's patients, the current
//! patient list is re-read, projected into the home view, and pushed as one
//! JSON snapshot. Closing the socket drops the receiver, which releases the
//! subscription.

use actix_web::{web, HttpRequest, Responder};
use actix_ws::Message;
use chrono::Local;
use futures_util::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::auth::AuthedUser;
use crate::store::ChangeEvent;
use crate::{views, AppState};

pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
    user: AuthedUser,
) -> Result<impl Responder, actix_web::Error> {
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;
    let mut changes = data.store.subscribe();

    actix_rt::spawn(async move {
        // Initial snapshot so the client renders without waiting for a change.
        if push_snapshot(&data, &user.uid, &mut session).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                msg = msg_stream.next() => {
                    match msg {
                        Some(Ok(Message::Ping(bytes))) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => break,
                        None => break,
                        _ => {}
                    }
                }
                event = changes.recv() => {
                    match event {
                        Ok(ChangeEvent::Patients { user_id }) if user_id == user.uid => {
                            if push_snapshot(&data, &user.uid, &mut session).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            // Missed intermediate events; the next snapshot
                            // is still built from current state.
                            warn!(skipped, "live projection lagged behind change stream");
                            if push_snapshot(&data, &user.uid, &mut session).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }

        debug!(user = %user.uid, "live projection session closed");
        let _ = session.close(None).await;
    });

    Ok(response)
}

async fn push_snapshot(
    data: &web::Data<AppState>,
    uid: &str,
    session: &mut actix_ws::Session,
) -> Result<(), ()> {
    let patients = match data.store.list_patients(uid).await {
        Ok(patients) => patients,
        Err(err) => {
            warn!(user = %uid, %err, "failed to load patients for live projection");
            return Ok(());
        }
    };

    let view = views::home_view(&patients, Local::now().time());
    let payload = match serde_json::to_string(&view) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(user = %uid, %err, "failed to serialize live projection");
            return Ok(());
        }
    };

    session.text(payload).await.map_err(|_| ())
}
