//! Connection request lifecycle and connection listings.
//!
//! A relationship is stored as two list mutations: each side's `connections`
//! list and the embedded request on the receiver. Every operation holds the
//! database lock for its whole check-then-write sequence and only notifies
//! once the lock is released.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use devconnect_shared::constants::{MAX_BULK_REQUESTS, NETWORK_GROWTH_WINDOW_DAYS};
use devconnect_shared::protocol::{ConnectionRequestNotice, ServerEvent};
use devconnect_shared::types::{RequestStatus, UserId};
use devconnect_store::{ConnectionRequest, Database, User};

use crate::api::AppState;
use crate::error::ServerError;
use crate::profiles::ConnectionProfile;

pub async fn send_request(
    state: &AppState,
    requester: UserId,
    target: UserId,
) -> Result<(), ServerError> {
    let notice = {
        let db = state.db.lock().await;
        record_request(&db, requester, target)?
    };

    info!(from = %requester, to = %target, "Connection request sent");
    state
        .notifier
        .emit_to_user(&target, ServerEvent::ConnectionRequest(notice))
        .await;
    Ok(())
}

fn record_request(
    db: &Database,
    requester: UserId,
    target: UserId,
) -> Result<ConnectionRequestNotice, ServerError> {
    if requester == target {
        return Err(ServerError::InvalidTarget);
    }

    let mut target_user = db
        .find_user(&target)?
        .ok_or_else(|| ServerError::NotFound("User not found".into()))?;
    let requester_user = db.get_user(&requester)?;

    if requester_user.is_connected_to(&target) {
        return Err(ServerError::AlreadyConnected);
    }
    if db.find_pending_request(&requester, &target)?.is_some() {
        return Err(ServerError::DuplicateRequest(
            "Connection request already sent".into(),
        ));
    }
    if db.find_pending_request(&target, &requester)?.is_some() {
        return Err(ServerError::DuplicateRequest(
            "This user has already sent you a connection request".into(),
        ));
    }

    target_user
        .connection_requests
        .push(ConnectionRequest::pending(requester));
    db.save_user(&target_user)?;

    Ok(ConnectionRequestNotice::new_request(requester_user.summary()))
}

pub async fn accept_request(
    state: &AppState,
    accepter: UserId,
    requester: UserId,
) -> Result<(), ServerError> {
    let notice = {
        let db = state.db.lock().await;

        let mut accepter_user = db.get_user(&accepter)?;
        let request = accepter_user
            .pending_request_from_mut(&requester)
            .ok_or_else(request_not_found)?;
        request.status = RequestStatus::Accepted;
        accepter_user.add_connection(requester);
        db.save_user(&accepter_user)?;

        match db.find_user(&requester)? {
            Some(mut requester_user) => {
                requester_user.add_connection(accepter);
                // A crossing request in the other direction is settled too.
                if let Some(crossing) = requester_user.pending_request_from_mut(&accepter) {
                    crossing.status = RequestStatus::Accepted;
                    debug!(from = %accepter, to = %requester, "Resolved crossing request");
                }
                db.save_user(&requester_user)?;
            }
            None => warn!(user = %requester, "Accepted request from a missing user"),
        }

        ConnectionRequestNotice::request_accepted(accepter_user.summary())
    };

    info!(accepter = %accepter, requester = %requester, "Connection request accepted");
    state
        .notifier
        .emit_to_user(&requester, ServerEvent::ConnectionRequest(notice))
        .await;
    Ok(())
}

pub async fn reject_request(
    state: &AppState,
    rejecter: UserId,
    requester: UserId,
) -> Result<(), ServerError> {
    let db = state.db.lock().await;

    let mut user = db.get_user(&rejecter)?;
    let request = user
        .pending_request_from_mut(&requester)
        .ok_or_else(request_not_found)?;
    request.status = RequestStatus::Rejected;
    db.save_user(&user)?;

    info!(rejecter = %rejecter, requester = %requester, "Connection request rejected");
    Ok(())
}

pub async fn remove_connection(
    state: &AppState,
    user_id: UserId,
    other: UserId,
) -> Result<(), ServerError> {
    let db = state.db.lock().await;

    let mut user = db.get_user(&user_id)?;
    if user.remove_connection(&other) {
        db.save_user(&user)?;
    }

    match db.find_user(&other)? {
        Some(mut other_user) => {
            if other_user.remove_connection(&user_id) {
                db.save_user(&other_user)?;
            }
        }
        None => warn!(user = %other, "Removed connection to a missing user"),
    }

    info!(user = %user_id, other = %other, "Connection removed");
    Ok(())
}

fn request_not_found() -> ServerError {
    ServerError::NotFound("Connection request not found".into())
}

// ---------------------------------------------------------------------------
// Bulk requests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequestBody {
    #[serde(default)]
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequestResult {
    pub user_id: String,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BulkRequestResponse {
    pub results: Vec<BulkRequestResult>,
}

/// Send a request to each id independently. One target failing never stops
/// the others; results come back in input order.
pub async fn bulk_request(
    state: &AppState,
    requester: UserId,
    user_ids: &[String],
) -> Result<Vec<BulkRequestResult>, ServerError> {
    if user_ids.is_empty() {
        return Err(ServerError::Validation("User IDs array is required".into()));
    }
    if user_ids.len() > MAX_BULK_REQUESTS {
        return Err(ServerError::Validation(format!(
            "Maximum {MAX_BULK_REQUESTS} users allowed per bulk request"
        )));
    }

    let mut results = Vec::with_capacity(user_ids.len());
    for raw in user_ids {
        let outcome = match UserId::parse(raw) {
            Ok(target) => send_request(state, requester, target).await,
            Err(e) => Err(e.into()),
        };

        let result = match outcome {
            Ok(()) => BulkRequestResult {
                user_id: raw.clone(),
                success: true,
                message: "Connection request sent successfully".into(),
            },
            Err(e) => BulkRequestResult {
                user_id: raw.clone(),
                success: false,
                message: e.to_string(),
            },
        };
        results.push(result);
    }

    let sent = results.iter().filter(|r| r.success).count();
    info!(user = %requester, sent, total = results.len(), "Bulk connection request");
    Ok(results)
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

pub async fn my_connections(
    state: &AppState,
    user_id: UserId,
) -> Result<Vec<ConnectionProfile>, ServerError> {
    let db = state.db.lock().await;
    let user = db.get_user(&user_id)?;
    let connections = db.find_users_by_ids(&user.connections)?;
    Ok(connections.iter().map(ConnectionProfile::from).collect())
}

/// Profiles of the users whose request to `user_id` is still pending.
pub async fn pending_requests(
    state: &AppState,
    user_id: UserId,
) -> Result<Vec<ConnectionProfile>, ServerError> {
    let db = state.db.lock().await;
    let senders = db.pending_senders(&user_id)?;
    let users = db.find_users_by_ids(&senders)?;
    Ok(users.iter().map(ConnectionProfile::from).collect())
}

/// Connections whose own record was created within the trailing window.
pub(crate) fn network_growth(connections: &[User], now: DateTime<Utc>) -> usize {
    let since = now - Duration::days(NETWORK_GROWTH_WINDOW_DAYS);
    connections.iter().filter(|c| c.created_at > since).count()
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionsExport {
    pub export_date: DateTime<Utc>,
    pub user: ExportedUser,
    pub connections: ExportedConnections,
    pub connection_requests: ExportedRequests,
    pub network_stats: NetworkStats,
}

#[derive(Debug, Serialize)]
pub struct ExportedUser {
    pub name: String,
    pub email: String,
    pub bio: String,
    pub skills: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportedConnections {
    pub total: usize,
    pub list: Vec<ExportedConnection>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedConnection {
    pub name: String,
    pub email: String,
    pub bio: String,
    pub skills: Vec<String>,
    pub profile_picture: String,
    pub github: String,
    pub linkedin: String,
    pub connected_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ExportedRequests {
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub details: Vec<ExportedRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedRequest {
    pub from: ExportedSender,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSender {
    pub name: String,
    pub email: String,
    pub bio: String,
    pub skills: Vec<String>,
    pub profile_picture: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub total_connections: usize,
    pub pending_requests: usize,
    pub network_growth: NetworkGrowth,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkGrowth {
    pub this_month: usize,
}

pub async fn export(state: &AppState, user_id: UserId) -> Result<ConnectionsExport, ServerError> {
    let db = state.db.lock().await;
    let user = db.get_user(&user_id)?;
    let connections = db.find_users_by_ids(&user.connections)?;
    let now = Utc::now();

    let mut details = Vec::with_capacity(user.connection_requests.len());
    for request in &user.connection_requests {
        // Requests whose sender no longer resolves are left out of the details.
        let Some(sender) = db.find_user(&request.from)? else {
            continue;
        };
        details.push(ExportedRequest {
            from: ExportedSender {
                name: sender.name,
                email: sender.email,
                bio: sender.bio,
                skills: sender.skills,
                profile_picture: sender.profile_picture,
            },
            status: request.status,
            created_at: request.created_at,
        });
    }

    let pending = user.request_count(RequestStatus::Pending);
    let growth = NetworkGrowth {
        this_month: network_growth(&connections, now),
    };

    Ok(ConnectionsExport {
        export_date: now,
        connections: ExportedConnections {
            total: user.connections.len(),
            list: connections
                .iter()
                .map(|c| ExportedConnection {
                    name: c.name.clone(),
                    email: c.email.clone(),
                    bio: c.bio.clone(),
                    skills: c.skills.clone(),
                    profile_picture: c.profile_picture.clone(),
                    github: c.github.clone(),
                    linkedin: c.linkedin.clone(),
                    connected_at: c.created_at,
                })
                .collect(),
        },
        connection_requests: ExportedRequests {
            pending,
            accepted: user.request_count(RequestStatus::Accepted),
            rejected: user.request_count(RequestStatus::Rejected),
            details,
        },
        network_stats: NetworkStats {
            total_connections: user.connections.len(),
            pending_requests: pending,
            network_growth: growth,
        },
        user: ExportedUser {
            name: user.name,
            email: user.email,
            bio: user.bio,
            skills: user.skills,
        },
    })
}

/// Attachment filename for an export produced at `at`.
pub fn export_filename(at: DateTime<Utc>) -> String {
    format!("devconnect-connections-{}.json", at.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_user, connect, test_state};
    use devconnect_shared::protocol::NoticeType;

    #[tokio::test]
    async fn test_request_then_accept_links_both_sides() {
        let (state, notifier) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;

        send_request(&state, alice, bob).await.unwrap();
        let events = notifier.events_for(&bob);
        assert!(matches!(
            &events[..],
            [ServerEvent::ConnectionRequest(n)] if n.kind == NoticeType::NewRequest && n.from.id == alice
        ));

        accept_request(&state, bob, alice).await.unwrap();
        let events = notifier.events_for(&alice);
        assert!(matches!(
            &events[..],
            [ServerEvent::ConnectionRequest(n)] if n.kind == NoticeType::RequestAccepted && n.from.id == bob
        ));

        let db = state.db.lock().await;
        let a = db.get_user(&alice).unwrap();
        let b = db.get_user(&bob).unwrap();
        assert_eq!(a.connections, vec![bob]);
        assert_eq!(b.connections, vec![alice]);
        assert_eq!(b.connection_requests[0].status, RequestStatus::Accepted);
    }

    #[tokio::test]
    async fn test_duplicate_requests_conflict_both_directions() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;

        send_request(&state, alice, bob).await.unwrap();
        assert!(matches!(
            send_request(&state, alice, bob).await,
            Err(ServerError::DuplicateRequest(_))
        ));
        assert!(matches!(
            send_request(&state, bob, alice).await,
            Err(ServerError::DuplicateRequest(_))
        ));

        let db = state.db.lock().await;
        assert_eq!(db.get_user(&bob).unwrap().connection_requests.len(), 1);
        assert!(db.get_user(&alice).unwrap().connection_requests.is_empty());
    }

    #[tokio::test]
    async fn test_send_request_failures_write_nothing() {
        let (state, notifier) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;
        connect(&state, alice, bob).await;

        assert!(matches!(
            send_request(&state, alice, alice).await,
            Err(ServerError::InvalidTarget)
        ));
        assert!(matches!(
            send_request(&state, alice, UserId::new()).await,
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(
            send_request(&state, alice, bob).await,
            Err(ServerError::AlreadyConnected)
        ));
        assert!(notifier.events().is_empty());
    }

    #[tokio::test]
    async fn test_accept_resolves_crossing_request() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;

        // Simulate requests that crossed before either check could see the other.
        {
            let db = state.db.lock().await;
            let mut a = db.get_user(&alice).unwrap();
            let mut b = db.get_user(&bob).unwrap();
            a.connection_requests.push(ConnectionRequest::pending(bob));
            b.connection_requests.push(ConnectionRequest::pending(alice));
            db.save_user(&a).unwrap();
            db.save_user(&b).unwrap();
        }

        accept_request(&state, bob, alice).await.unwrap();

        let db = state.db.lock().await;
        assert!(!db.has_pending_between(&alice, &bob).unwrap());
        assert_eq!(db.get_user(&alice).unwrap().connections, vec![bob]);
        assert_eq!(db.get_user(&bob).unwrap().connections, vec![alice]);
    }

    #[tokio::test]
    async fn test_accept_or_reject_without_request() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;

        assert!(matches!(
            accept_request(&state, bob, alice).await,
            Err(ServerError::NotFound(_))
        ));
        assert!(matches!(
            reject_request(&state, bob, alice).await,
            Err(ServerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_is_final_and_silent() {
        let (state, notifier) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;

        send_request(&state, alice, bob).await.unwrap();
        notifier.clear();
        reject_request(&state, bob, alice).await.unwrap();
        assert!(notifier.events().is_empty());

        // A rejected request cannot be accepted afterwards.
        assert!(accept_request(&state, bob, alice).await.is_err());

        let db = state.db.lock().await;
        let b = db.get_user(&bob).unwrap();
        assert!(b.connections.is_empty());
        assert_eq!(b.request_count(RequestStatus::Rejected), 1);
    }

    #[tokio::test]
    async fn test_remove_connection_unlinks_both() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;
        connect(&state, alice, bob).await;

        remove_connection(&state, alice, bob).await.unwrap();

        let db = state.db.lock().await;
        assert!(db.get_user(&alice).unwrap().connections.is_empty());
        assert!(db.get_user(&bob).unwrap().connections.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_request_limits() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;

        assert!(matches!(
            bulk_request(&state, alice, &[]).await,
            Err(ServerError::Validation(_))
        ));

        let eleven: Vec<String> = (0..11).map(|_| UserId::new().to_string()).collect();
        assert!(matches!(
            bulk_request(&state, alice, &eleven).await,
            Err(ServerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_bulk_request_isolates_failures() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &[]).await;
        let bob = add_user(&state, "Bob", &[]).await;

        let ids = vec![
            alice.to_string(),
            "not-an-id".to_string(),
            bob.to_string(),
            bob.to_string(),
        ];
        let results = bulk_request(&state, alice, &ids).await.unwrap();

        let outcome: Vec<bool> = results.iter().map(|r| r.success).collect();
        assert_eq!(outcome, vec![false, false, true, false]);
        assert_eq!(results[0].message, "Cannot send connection request to yourself");
        assert_eq!(results[2].user_id, bob.to_string());
        assert_eq!(results[3].message, "Connection request already sent");
    }

    #[tokio::test]
    async fn test_listings_and_export() {
        let (state, _) = test_state();
        let alice = add_user(&state, "Alice", &["Rust"]).await;
        let bob = add_user(&state, "Bob", &["Go"]).await;
        let carol = add_user(&state, "Carol", &[]).await;
        connect(&state, alice, bob).await;
        send_request(&state, carol, alice).await.unwrap();

        let mine = my_connections(&state, alice).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Bob");

        let pending = pending_requests(&state, alice).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, carol);

        let export = export(&state, alice).await.unwrap();
        assert_eq!(export.user.name, "Alice");
        assert_eq!(export.connections.total, 1);
        assert_eq!(export.connections.list[0].name, "Bob");
        assert_eq!(export.connection_requests.pending, 1);
        assert_eq!(export.connection_requests.details[0].from.name, "Carol");
        assert_eq!(export.network_stats.network_growth.this_month, 1);
    }

    #[test]
    fn test_export_filename() {
        let at = DateTime::parse_from_rfc3339("2024-03-07T23:59:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(export_filename(at), "devconnect-connections-2024-03-07.json");
    }
}
