use chrono::Utc;
use serde::Serialize;

use devconnect_shared::constants::TOP_SKILLS_LIMIT;
use devconnect_shared::scoring::{mutual_connections, top_skills, SkillCount, Strength};
use devconnect_shared::types::{RequestStatus, UserId};

use crate::api::AppState;
use crate::error::ServerError;
use crate::relationships::{network_growth, NetworkGrowth};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStrength {
    pub user_id: UserId,
    pub name: String,
    pub mutual_connections: usize,
    pub strength: Strength,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAnalytics {
    pub total_connections: usize,
    pub pending_requests: usize,
    pub accepted_requests: usize,
    pub rejected_requests: usize,
    pub connection_strengths: Vec<ConnectionStrength>,
    pub top_skills: Vec<SkillCount>,
    pub network_growth: NetworkGrowth,
}

/// Summary of the viewer's network: request counts, per-connection
/// strength, the most common skills among connections and recent growth.
pub async fn analytics(state: &AppState, user_id: UserId) -> Result<NetworkAnalytics, ServerError> {
    let db = state.db.lock().await;
    let user = db.get_user(&user_id)?;
    let connections = db.find_users_by_ids(&user.connections)?;
    drop(db);

    let connection_strengths = connections
        .iter()
        .map(|connection| {
            let mutual = mutual_connections(&user.connections, &connection.connections).len();
            ConnectionStrength {
                user_id: connection.id,
                name: connection.name.clone(),
                mutual_connections: mutual,
                strength: Strength::from_mutual_count(mutual),
            }
        })
        .collect();

    let skills = connections
        .iter()
        .flat_map(|c| c.skills.iter().map(String::as_str));

    Ok(NetworkAnalytics {
        total_connections: user.connections.len(),
        pending_requests: user.request_count(RequestStatus::Pending),
        accepted_requests: user.request_count(RequestStatus::Accepted),
        rejected_requests: user.request_count(RequestStatus::Rejected),
        connection_strengths,
        top_skills: top_skills(skills, TOP_SKILLS_LIMIT),
        network_growth: NetworkGrowth {
            this_month: network_growth(&connections, Utc::now()),
        },
    })
}
