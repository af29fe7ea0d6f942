//! Suggestion ranking and user search.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use devconnect_shared::constants::{GOOD_SKILL_SCORE, MAX_SEARCH_RESULTS};
use devconnect_shared::scoring::{
    connection_strength_score, mutual_connections, recommendation_reason, round_score,
    skill_overlap_score,
};
use devconnect_shared::types::{ConnectionStatus, UserId};
use devconnect_store::User;

use crate::api::AppState;
use crate::error::ServerError;
use crate::profiles::PublicProfile;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MutualConnection {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub priority: u8,
    pub status: ConnectionStatus,
    pub mutual_connections_count: usize,
    pub mutual_connections: Vec<MutualConnection>,
    pub skill_score: f64,
    pub connection_strength_score: f64,
    pub total_score: f64,
    pub recommendation_reason: String,
}

/// The viewer's relationship to `candidate`, highest precedence first.
/// Mutual connections only matter when no direct state applies.
fn classify(viewer: &User, candidate: &User, mutual_count: usize) -> ConnectionStatus {
    if viewer.is_connected_to(&candidate.id) {
        ConnectionStatus::Connected
    } else if candidate.pending_request_from(&viewer.id).is_some() {
        ConnectionStatus::PendingSent
    } else if viewer.pending_request_from(&candidate.id).is_some() {
        ConnectionStatus::PendingReceived
    } else if mutual_count > 0 {
        ConnectionStatus::Mutual
    } else {
        ConnectionStatus::Connect
    }
}

fn suggestion_priority(status: ConnectionStatus, mutual_count: usize, skill_score: f64) -> u8 {
    if status == ConnectionStatus::Connected {
        1
    } else if mutual_count > 0 || skill_score > GOOD_SKILL_SCORE {
        2
    } else {
        3
    }
}

fn score_candidate(viewer: &User, candidate: &User, names: &HashMap<UserId, String>) -> Suggestion {
    let mutual = mutual_connections(&viewer.connections, &candidate.connections);
    let mutual_count = mutual.len();
    let skill = skill_overlap_score(&viewer.skills, &candidate.skills);
    let strength = connection_strength_score(mutual_count);

    let status = classify(viewer, candidate, mutual_count);
    let reason = match status {
        ConnectionStatus::Connected => "Already connected".to_string(),
        ConnectionStatus::PendingSent => "Request already sent".to_string(),
        ConnectionStatus::PendingReceived => "Has sent you a request".to_string(),
        ConnectionStatus::Mutual | ConnectionStatus::Connect => {
            recommendation_reason(mutual_count, skill)
        }
    };

    Suggestion {
        profile: PublicProfile::from(candidate),
        priority: suggestion_priority(status, mutual_count, skill),
        status,
        mutual_connections_count: mutual_count,
        mutual_connections: mutual
            .iter()
            .filter_map(|id| {
                names.get(id).map(|name| MutualConnection {
                    id: *id,
                    name: name.clone(),
                })
            })
            .collect(),
        skill_score: round_score(skill),
        connection_strength_score: strength,
        total_score: round_score(skill + strength),
        recommendation_reason: reason,
    }
}

fn rank(a: &Suggestion, b: &Suggestion) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| {
            if a.priority == 2 {
                b.mutual_connections_count.cmp(&a.mutual_connections_count)
            } else {
                Ordering::Equal
            }
        })
}

/// Every other user, scored and ranked for `viewer_id`.
pub async fn suggestions(state: &AppState, viewer_id: UserId) -> Result<Vec<Suggestion>, ServerError> {
    let db = state.db.lock().await;
    let viewer = db.get_user(&viewer_id)?;
    let candidates = db.list_users_except(&viewer_id)?;
    drop(db);

    Ok(rank_suggestions(&viewer, &candidates))
}

pub(crate) fn rank_suggestions(viewer: &User, candidates: &[User]) -> Vec<Suggestion> {
    let names: HashMap<UserId, String> = candidates
        .iter()
        .map(|c| (c.id, c.name.clone()))
        .collect();

    let mut ranked: Vec<Suggestion> = candidates
        .iter()
        .map(|candidate| score_candidate(viewer, candidate, &names))
        .collect();
    ranked.sort_by(rank);

    debug!(viewer = %viewer.id, candidates = ranked.len(), "Computed suggestions");
    ranked
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub skills: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub priority: u8,
    pub status: ConnectionStatus,
}

struct SearchFilter {
    text: Option<String>,
    skills: Vec<String>,
    location: Option<String>,
}

impl SearchFilter {
    fn new(params: &SearchParams) -> Self {
        let lowered = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_lowercase)
        };
        let skills = params
            .skills
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            text: lowered(&params.q),
            skills,
            location: lowered(&params.location),
        }
    }

    fn matches(&self, user: &User) -> bool {
        if let Some(text) = &self.text {
            let hit = [&user.name, &user.bio, &user.email]
                .iter()
                .any(|field| field.to_lowercase().contains(text.as_str()));
            if !hit {
                return false;
            }
        }
        if !self.skills.is_empty() && !user.skills.iter().any(|s| self.skills.contains(s)) {
            return false;
        }
        if let Some(location) = &self.location {
            if !user.bio.to_lowercase().contains(location.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Users other than the viewer matching every given filter, at most
/// [`MAX_SEARCH_RESULTS`], connected users first.
pub async fn search(
    state: &AppState,
    viewer_id: UserId,
    params: &SearchParams,
) -> Result<Vec<SearchResult>, ServerError> {
    let db = state.db.lock().await;
    let viewer = db.get_user(&viewer_id)?;
    let candidates = db.list_users_except(&viewer_id)?;
    drop(db);

    let filter = SearchFilter::new(params);
    let mut results: Vec<SearchResult> = candidates
        .iter()
        .filter(|user| filter.matches(user))
        .take(MAX_SEARCH_RESULTS)
        .map(|user| {
            // Mutual connections are not considered in search results.
            let status = classify(&viewer, user, 0);
            let priority = if status == ConnectionStatus::Connected { 1 } else { 3 };
            SearchResult {
                profile: PublicProfile::from(user),
                priority,
                status,
            }
        })
        .collect();
    results.sort_by_key(|r| r.priority);

    debug!(viewer = %viewer_id, results = results.len(), "Search finished");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::{remove_connection, send_request};
    use crate::test_support::{add_user, connect, test_state};

    fn find<'a>(list: &'a [Suggestion], id: &UserId) -> &'a Suggestion {
        list.iter().find(|s| s.profile.id == *id).unwrap()
    }

    #[tokio::test]
    async fn test_suggestion_statuses_and_order() {
        let (state, _) = test_state();
        let me = add_user(&state, "Me", &["rust", "go"]).await;
        let friend = add_user(&state, "Friend", &[]).await;
        let via_friend = add_user(&state, "Via Friend", &[]).await;
        let skilled = add_user(&state, "Skilled", &["Rust", "Go"]).await;
        let stranger = add_user(&state, "Stranger", &["cobol"]).await;
        let asked = add_user(&state, "Asked", &[]).await;

        connect(&state, me, friend).await;
        connect(&state, friend, via_friend).await;
        send_request(&state, me, asked).await.unwrap();

        let list = suggestions(&state, me).await.unwrap();
        assert_eq!(list.len(), 5);

        let first = &list[0];
        assert_eq!(first.profile.id, friend);
        assert_eq!(first.status, ConnectionStatus::Connected);
        assert_eq!(first.priority, 1);
        assert_eq!(first.recommendation_reason, "Already connected");

        // Skill 10 beats one mutual worth 2 inside priority 2.
        assert_eq!(list[1].profile.id, skilled);
        assert_eq!(list[1].total_score, 10.0);
        assert_eq!(list[1].recommendation_reason, "High skill compatibility");
        assert_eq!(list[2].profile.id, via_friend);
        assert_eq!(list[2].status, ConnectionStatus::Mutual);
        assert_eq!(list[2].mutual_connections_count, 1);
        assert_eq!(list[2].mutual_connections[0].name, "Friend");
        assert_eq!(list[2].recommendation_reason, "1 mutual connection");

        let pending = find(&list, &asked);
        assert_eq!(pending.status, ConnectionStatus::PendingSent);
        assert_eq!(pending.priority, 3);
        assert_eq!(pending.recommendation_reason, "Request already sent");

        let other = find(&list, &stranger);
        assert_eq!(other.status, ConnectionStatus::Connect);
        assert_eq!(other.recommendation_reason, "Suggested for you");
    }

    #[tokio::test]
    async fn test_pending_received_and_removal() {
        let (state, _) = test_state();
        let me = add_user(&state, "Me", &[]).await;
        let fan = add_user(&state, "Fan", &[]).await;
        let ex = add_user(&state, "Ex", &[]).await;

        send_request(&state, fan, me).await.unwrap();
        connect(&state, me, ex).await;
        remove_connection(&state, me, ex).await.unwrap();

        let list = suggestions(&state, me).await.unwrap();
        assert_eq!(find(&list, &fan).status, ConnectionStatus::PendingReceived);
        assert_eq!(find(&list, &fan).recommendation_reason, "Has sent you a request");
        assert_eq!(find(&list, &ex).status, ConnectionStatus::Connect);
    }

    #[tokio::test]
    async fn test_scores_are_rounded() {
        let (state, _) = test_state();
        let me = add_user(&state, "Me", &["a", "b", "c"]).await;
        let other = add_user(&state, "Other", &["a"]).await;

        let list = suggestions(&state, me).await.unwrap();
        let s = find(&list, &other);
        assert_eq!(s.skill_score, 3.3);
        assert_eq!(s.total_score, 3.3);
        assert_eq!(s.priority, 2);
        assert_eq!(s.recommendation_reason, "Good skill match");
    }

    #[tokio::test]
    async fn test_search_filters_combine() {
        let (state, _) = test_state();
        let me = add_user(&state, "Me", &[]).await;
        let ana = add_user(&state, "Ana Lisbon", &["Rust"]).await;
        let ben = add_user(&state, "Ben", &["Go"]).await;
        {
            let db = state.db.lock().await;
            for (id, bio) in [(ana, "Backend dev in Lisbon"), (ben, "Gopher from Berlin")] {
                let mut user = db.get_user(&id).unwrap();
                user.bio = bio.to_string();
                db.save_user(&user).unwrap();
            }
        }
        connect(&state, me, ben).await;

        let params = |q: Option<&str>, skills: Option<&str>, location: Option<&str>| SearchParams {
            q: q.map(String::from),
            skills: skills.map(String::from),
            location: location.map(String::from),
        };

        let all = search(&state, me, &SearchParams::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].profile.id, ben);
        assert_eq!(all[0].status, ConnectionStatus::Connected);
        assert_eq!(all[1].priority, 3);

        let by_text = search(&state, me, &params(Some("BACKEND"), None, None)).await.unwrap();
        assert_eq!(by_text.len(), 1);
        assert_eq!(by_text[0].profile.id, ana);

        let by_skill = search(&state, me, &params(None, Some("Python, Go"), None)).await.unwrap();
        assert_eq!(by_skill.len(), 1);
        assert_eq!(by_skill[0].profile.id, ben);

        // Skill matching is exact.
        let lowercase = search(&state, me, &params(None, Some("rust"), None)).await.unwrap();
        assert!(lowercase.is_empty());

        let none = search(&state, me, &params(Some("ana"), None, Some("berlin"))).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_search_caps_results() {
        let (state, _) = test_state();
        let me = add_user(&state, "Me", &[]).await;
        for i in 0..(MAX_SEARCH_RESULTS + 5) {
            add_user(&state, &format!("Dev {i}"), &[]).await;
        }

        let results = search(&state, me, &SearchParams::default()).await.unwrap();
        assert_eq!(results.len(), MAX_SEARCH_RESULTS);
        assert!(results.iter().all(|r| r.profile.id != me));
    }
}
