use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::state::{Player, PlayerId, Role, Team};

pub const MIN_PLAYERS: usize = 5;
pub const MAX_PLAYERS: usize = 10;

/// 小局（≤6 人）里主谋知道自己的特工；更大的局采用盲主谋变体。
const MASTERMIND_KNOWS_TEAM_THRESHOLD: usize = 6;

/// 规则书的人数分布表：(情报局人数, 辛迪加特工人数)，主谋恒为 1。
static ROLE_DISTRIBUTION: Lazy<HashMap<usize, (usize, usize)>> = Lazy::new(|| {
    HashMap::from([
        (5, (3, 1)),
        (6, (4, 1)),
        (7, (4, 2)),
        (8, (5, 2)),
        (9, (6, 2)),
        (10, (6, 3)),
    ])
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RoleError {
    UnsupportedPlayerCount { player_count: usize },
}

/// 一名玩家的开局分配结果。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleAssignment {
    pub player_id: PlayerId,
    pub role: Role,
    pub team: Team,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub known_teammate_ids: Vec<PlayerId>,
}

pub fn build_role_list(player_count: usize) -> Result<Vec<Role>, RoleError> {
    let (agency, agents) = ROLE_DISTRIBUTION
        .get(&player_count)
        .copied()
        .ok_or(RoleError::UnsupportedPlayerCount { player_count })?;

    let mut roles = vec![Role::Mastermind];
    roles.extend(std::iter::repeat(Role::SyndicateAgent).take(agents));
    roles.extend(std::iter::repeat(Role::Agency).take(agency));
    Ok(roles)
}

/// 洗乱角色表后按加入顺序逐一配对，并布好阵营知情关系：
/// 特工互相认识（但从不知道主谋是谁）；主谋只在小局里认识特工。
/// 知情关系由分配结果完全决定，不引入额外随机性。
pub fn assign<R: Rng>(roster: &[Player], rng: &mut R) -> Result<Vec<RoleAssignment>, RoleError> {
    let mut roles = build_role_list(roster.len())?;
    roles.shuffle(rng);

    let mut assignments: Vec<RoleAssignment> = roster
        .iter()
        .zip(roles)
        .map(|(player, role)| RoleAssignment {
            player_id: player.id.clone(),
            role,
            team: match role {
                Role::Agency => Team::Agency,
                Role::Mastermind | Role::SyndicateAgent => Team::Syndicate,
            },
            known_teammate_ids: Vec::new(),
        })
        .collect();

    let agent_ids: Vec<PlayerId> = assignments
        .iter()
        .filter(|assignment| assignment.role == Role::SyndicateAgent)
        .map(|assignment| assignment.player_id.clone())
        .collect();
    let mastermind_knows_team = roster.len() <= MASTERMIND_KNOWS_TEAM_THRESHOLD;

    for assignment in &mut assignments {
        match assignment.role {
            Role::Mastermind => {
                if mastermind_knows_team {
                    assignment.known_teammate_ids = agent_ids.clone();
                }
            }
            Role::SyndicateAgent => {
                assignment.known_teammate_ids = agent_ids
                    .iter()
                    .filter(|id| **id != assignment.player_id)
                    .cloned()
                    .collect();
            }
            Role::Agency => {}
        }
    }

    Ok(assignments)
}
