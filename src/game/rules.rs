use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::deck;
use super::powers;
use super::roles::{self, RoleError};
use super::state::{
    GameEvent, GameOutcome, GamePhase, GameStatus, IntegrityError, Player, PlayerId, PolicyCard,
    Role, Room, SyndicatePower, Team, VoteChoice, WinReason, AGENCY_TRACK_LENGTH, INSTABILITY_CAP,
    SYNDICATE_TRACK_LENGTH,
};

/// 长官每轮抽三张，留两张给副手。
const DIRECTOR_DRAW_COUNT: usize = 3;
const DEPUTY_HAND_SIZE: usize = 2;
const SURVEILLANCE_PEEK_COUNT: usize = 3;
/// 已颁布辛迪加政策达到该数后，主谋当选副手即辛迪加胜利。
const MASTERMIND_ELECTION_THRESHOLD: u8 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    Unauthorized {
        player_id: PlayerId,
    },
    InvalidPhase {
        expected: GamePhase,
        actual: GamePhase,
    },
    InvalidTarget,
    InsufficientCards {
        requested: usize,
        available: usize,
    },
    AlreadyResolved,
    ConfigurationError {
        player_count: usize,
    },
    RoomNotFound,
    TransactionConflict {
        attempts: u32,
    },
    IntegrityViolation {
        error: IntegrityError,
    },
}

/// 一次操作的结果：更新后的快照、触发的事件与（可能的）终局结果。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleResolution {
    pub room: Room,
    pub roster: Vec<Player>,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<GameOutcome>,
}

impl RuleResolution {
    pub fn new(room: Room, roster: Vec<Player>, mut events: Vec<GameEvent>) -> Self {
        let outcome = room.outcome.clone();
        if let Some(ref decided) = outcome {
            let has_event = events
                .iter()
                .any(|event| matches!(event, GameEvent::GameWon { .. }));
            if !has_event {
                events.push(GameEvent::GameWon {
                    winner: decided.winner,
                    reason: decided.reason.clone(),
                });
            }
        }

        Self {
            room,
            roster,
            events,
            outcome,
        }
    }
}

/// 规则引擎。每个操作都是 `(当前快照) -> 更新` 的纯函数：
/// 除入参外不触碰任何外部状态，因此可以放进事务重试循环里反复执行。
pub struct RuleEngine {
    rng: SmallRng,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    fn ensure_integrity(room: &Room, roster: &[Player]) -> Result<(), RuleError> {
        room.integrity_check(roster)
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn ensure_phase(room: &Room, expected: GamePhase) -> Result<(), RuleError> {
        if room.phase != expected {
            return Err(RuleError::InvalidPhase {
                expected,
                actual: room.phase,
            });
        }
        Ok(())
    }

    fn ensure_owner(room: &Room, actor: &str) -> Result<(), RuleError> {
        if room.owner_id != actor {
            return Err(RuleError::Unauthorized {
                player_id: actor.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_actor(expected: Option<&PlayerId>, actor: &str) -> Result<(), RuleError> {
        match expected {
            Some(id) if id.as_str() == actor => Ok(()),
            _ => Err(RuleError::Unauthorized {
                player_id: actor.to_string(),
            }),
        }
    }

    fn find_player<'a>(roster: &'a [Player], id: &str) -> Option<&'a Player> {
        roster.iter().find(|player| player.id == id)
    }

    fn find_player_mut<'a>(roster: &'a mut [Player], id: &str) -> Option<&'a mut Player> {
        roster.iter_mut().find(|player| player.id == id)
    }

    fn alive_count(roster: &[Player]) -> usize {
        roster.iter().filter(|player| player.alive).count()
    }

    /// 按加入顺序找下一位存活玩家（环绕，跳过出局者）。
    fn next_director_candidate(current: Option<&str>, roster: &[Player]) -> Option<PlayerId> {
        let start = current.and_then(|id| roster.iter().position(|player| player.id == id));
        match start {
            None => roster
                .iter()
                .find(|player| player.alive)
                .map(|player| player.id.clone()),
            Some(index) => (1..=roster.len())
                .map(|offset| &roster[(index + offset) % roster.len()])
                .find(|player| player.alive)
                .map(|player| player.id.clone()),
        }
    }

    fn emit(room: &mut Room, events: &mut Vec<GameEvent>, event: GameEvent) {
        room.record_event(event.clone());
        events.push(event);
    }

    fn apply_enacted_policy(room: &mut Room, card: PolicyCard) {
        match card {
            PolicyCard::Syndicate => room.syndicate_policies_enacted += 1,
            PolicyCard::Agency => room.agency_policies_enacted += 1,
        }
    }

    fn evaluate_policy_win(room: &mut Room) -> Option<GameOutcome> {
        if room.syndicate_policies_enacted >= SYNDICATE_TRACK_LENGTH {
            Some(room.declare_victory(
                Team::Syndicate,
                WinReason::PolicyTrack {
                    team: Team::Syndicate,
                },
            ))
        } else if room.agency_policies_enacted >= AGENCY_TRACK_LENGTH {
            Some(room.declare_victory(
                Team::Agency,
                WinReason::PolicyTrack { team: Team::Agency },
            ))
        } else {
            None
        }
    }

    /// 搭建下一个提名轮。特别选举指定只覆盖紧接着的这一次。
    fn begin_next_round(room: &mut Room, roster: &[Player], events: &mut Vec<GameEvent>) {
        let special = room.special_election_director_id.take().filter(|id| {
            Self::find_player(roster, id)
                .map(|player| player.alive)
                .unwrap_or(false)
        });
        let rotation_anchor = room
            .director_id
            .clone()
            .or_else(|| room.director_candidate_id.clone());
        let candidate = special
            .or_else(|| Self::next_director_candidate(rotation_anchor.as_deref(), roster));

        room.round += 1;
        room.phase = GamePhase::Nomination;
        room.previous_director_id = rotation_anchor;
        room.director_candidate_id = candidate.clone();
        room.deputy_candidate_id = None;
        room.director_id = None;
        room.deputy_id = None;
        room.vote_tallies.clear();
        room.auto_enactment = false;
        room.clear_hands();
        // surveillance_peek 保留到下次触碰牌库时再清

        if let Some(director_candidate_id) = candidate {
            Self::emit(
                room,
                events,
                GameEvent::RoundStarted {
                    round: room.round,
                    director_candidate_id,
                },
            );
        }
    }

    /// 房主开局：分配角色、建牌库、进入第一轮提名。
    pub fn start_game(
        &mut self,
        room: &mut Room,
        roster: &mut [Player],
        actor: &str,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if room.is_finished() {
            return Ok(Vec::new());
        }
        Self::ensure_owner(room, actor)?;
        Self::ensure_phase(room, GamePhase::Lobby)?;

        let assignments = roles::assign(roster, &mut self.rng).map_err(|error| match error {
            RoleError::UnsupportedPlayerCount { player_count } => {
                RuleError::ConfigurationError { player_count }
            }
        })?;
        for (player, assignment) in roster.iter_mut().zip(assignments) {
            player.role = Some(assignment.role);
            player.team = Some(assignment.team);
            player.known_teammate_ids = assignment.known_teammate_ids;
            player.alive = true;
        }

        room.status = GameStatus::InProgress;
        room.phase = GamePhase::Nomination;
        room.round = 1;
        room.director_candidate_id = Self::next_director_candidate(None, roster);
        room.deputy_candidate_id = None;
        room.director_id = None;
        room.deputy_id = None;
        room.previous_director_id = None;
        room.vote_tallies.clear();
        room.instability_count = 0;
        room.auto_enactment = false;
        room.policy_deck = deck::build_deck(&mut self.rng);
        room.policy_discard.clear();
        room.clear_hands();
        room.syndicate_policies_enacted = 0;
        room.agency_policies_enacted = 0;
        room.syndicate_powers_resolved.clear();
        room.investigation_results.clear();
        room.surveillance_peek.clear();
        room.special_election_director_id = None;

        let mut events = Vec::new();
        Self::emit(
            room,
            &mut events,
            GameEvent::GameStarted {
                player_count: roster.len(),
            },
        );
        if let Some(director_candidate_id) = room.director_candidate_id.clone() {
            Self::emit(
                room,
                &mut events,
                GameEvent::RoundStarted {
                    round: room.round,
                    director_candidate_id,
                },
            );
        }
        Ok(events)
    }

    /// 长官候选人提名副手：排除自己、上一任长官与出局者。
    pub fn nominate_deputy(
        &mut self,
        room: &mut Room,
        roster: &mut [Player],
        actor: &str,
        deputy_id: &str,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if room.is_finished() {
            return Ok(Vec::new());
        }
        Self::ensure_integrity(room, roster)?;
        Self::ensure_phase(room, GamePhase::Nomination)?;
        Self::ensure_actor(room.director_candidate_id.as_ref(), actor)?;

        let deputy = Self::find_player(roster, deputy_id).ok_or(RuleError::InvalidTarget)?;
        if !deputy.alive || deputy.id == actor {
            return Err(RuleError::InvalidTarget);
        }
        if room.previous_director_id.as_deref() == Some(deputy_id) {
            return Err(RuleError::InvalidTarget);
        }

        room.deputy_candidate_id = Some(deputy_id.to_string());
        room.vote_tallies.clear();
        room.phase = GamePhase::Voting;
        room.auto_enactment = false;

        let mut events = Vec::new();
        Self::emit(
            room,
            &mut events,
            GameEvent::DeputyNominated {
                director_candidate_id: actor.to_string(),
                deputy_candidate_id: deputy_id.to_string(),
            },
        );
        Ok(events)
    }

    /// 存活玩家投票，同一玩家重复投票覆盖旧票。
    /// 任一方过半或所有存活玩家投完即当场结算。
    pub fn submit_vote(
        &mut self,
        room: &mut Room,
        roster: &mut [Player],
        actor: &str,
        choice: VoteChoice,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if room.is_finished() {
            return Ok(Vec::new());
        }
        Self::ensure_integrity(room, roster)?;
        Self::ensure_phase(room, GamePhase::Voting)?;
        let voter = Self::find_player(roster, actor).ok_or(RuleError::Unauthorized {
            player_id: actor.to_string(),
        })?;
        if !voter.alive {
            return Err(RuleError::Unauthorized {
                player_id: actor.to_string(),
            });
        }

        room.vote_tallies.insert(actor.to_string(), choice);

        let mut events = Vec::new();
        Self::emit(
            room,
            &mut events,
            GameEvent::VoteRecorded {
                player_id: actor.to_string(),
            },
        );

        let alive = Self::alive_count(roster);
        let majority = alive / 2 + 1;
        let approvals = room
            .vote_tallies
            .values()
            .filter(|vote| **vote == VoteChoice::Approve)
            .count();
        let rejections = room
            .vote_tallies
            .values()
            .filter(|vote| **vote == VoteChoice::Reject)
            .count();

        if approvals >= majority {
            let (Some(director_id), Some(deputy_id)) = (
                room.director_candidate_id.clone(),
                room.deputy_candidate_id.clone(),
            ) else {
                return Ok(events);
            };

            room.director_id = Some(director_id.clone());
            room.deputy_id = Some(deputy_id.clone());
            room.previous_director_id = Some(director_id.clone());
            room.instability_count = 0;
            room.auto_enactment = false;
            room.clear_hands();
            room.phase = GamePhase::Enactment;
            Self::emit(
                room,
                &mut events,
                GameEvent::ElectionPassed {
                    director_id,
                    deputy_id: deputy_id.clone(),
                },
            );

            // 后期当选检查：主谋坐上副手位即辛迪加胜利，不再进入颁布。
            if room.syndicate_policies_enacted >= MASTERMIND_ELECTION_THRESHOLD {
                let elected_mastermind = Self::find_player(roster, &deputy_id)
                    .map(|player| player.role == Some(Role::Mastermind))
                    .unwrap_or(false);
                if elected_mastermind {
                    let outcome = room.declare_victory(
                        Team::Syndicate,
                        WinReason::MastermindElected {
                            player_id: deputy_id,
                        },
                    );
                    events.push(GameEvent::GameWon {
                        winner: outcome.winner,
                        reason: outcome.reason,
                    });
                }
            }
        } else if rejections >= majority || room.vote_tallies.len() >= alive {
            let failed_candidate = room.director_candidate_id.clone();
            room.instability_count += 1;
            Self::emit(
                room,
                &mut events,
                GameEvent::ElectionFailed {
                    instability_count: room.instability_count,
                },
            );

            room.director_candidate_id =
                Self::next_director_candidate(failed_candidate.as_deref(), roster);
            room.previous_director_id =
                failed_candidate.or_else(|| room.director_id.clone());
            room.deputy_candidate_id = None;
            room.director_id = None;
            room.deputy_id = None;
            room.vote_tallies.clear();
            room.clear_hands();

            if room.instability_count >= INSTABILITY_CAP {
                room.phase = GamePhase::Enactment;
                room.auto_enactment = true;
                room.instability_count = 0;
                Self::emit(room, &mut events, GameEvent::AutoEnactmentArmed);
            } else {
                room.phase = GamePhase::Nomination;
            }
        }

        Ok(events)
    }

    /// 长官抽三张。重复抽取是无操作（手牌未消耗前只发一次）。
    pub fn draw_policies(
        &mut self,
        room: &mut Room,
        roster: &mut [Player],
        actor: &str,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if room.is_finished() {
            return Ok(Vec::new());
        }
        Self::ensure_integrity(room, roster)?;
        Self::ensure_phase(room, GamePhase::Enactment)?;
        Self::ensure_actor(room.director_id.as_ref(), actor)?;
        if room.auto_enactment || !room.director_hand.is_empty() {
            return Ok(Vec::new());
        }

        let available = room.policy_deck.len() + room.policy_discard.len();
        let outcome = deck::draw(
            &room.policy_deck,
            &room.policy_discard,
            DIRECTOR_DRAW_COUNT,
            &mut self.rng,
        )
        .ok_or(RuleError::InsufficientCards {
            requested: DIRECTOR_DRAW_COUNT,
            available,
        })?;

        // 旧的侦察结果此刻过期
        room.surveillance_peek.clear();
        room.policy_deck = outcome.deck;
        room.policy_discard = outcome.discard;
        room.director_hand = outcome.drawn;
        room.deputy_hand.clear();

        let mut events = Vec::new();
        Self::emit(
            room,
            &mut events,
            GameEvent::PoliciesDrawn {
                count: DIRECTOR_DRAW_COUNT,
            },
        );
        Ok(events)
    }

    /// 长官弃一张，剩下两张交给副手。
    pub fn director_discard(
        &mut self,
        room: &mut Room,
        roster: &mut [Player],
        actor: &str,
        card_index: usize,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if room.is_finished() {
            return Ok(Vec::new());
        }
        Self::ensure_integrity(room, roster)?;
        Self::ensure_phase(room, GamePhase::Enactment)?;
        Self::ensure_actor(room.director_id.as_ref(), actor)?;
        if room.auto_enactment || room.director_hand.len() != DIRECTOR_DRAW_COUNT {
            return Ok(Vec::new());
        }
        if card_index >= room.director_hand.len() {
            return Err(RuleError::InvalidTarget);
        }

        let discarded = room.director_hand.remove(card_index);
        deck::discard(&mut room.policy_discard, discarded);
        room.deputy_hand = std::mem::take(&mut room.director_hand);

        let mut events = Vec::new();
        Self::emit(room, &mut events, GameEvent::PolicyDiscarded);
        Ok(events)
    }

    /// 副手二选一颁布。胜负判定先于任何待结算权力。
    pub fn deputy_enact(
        &mut self,
        room: &mut Room,
        roster: &mut [Player],
        actor: &str,
        card_index: usize,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if room.is_finished() {
            return Ok(Vec::new());
        }
        Self::ensure_integrity(room, roster)?;
        Self::ensure_phase(room, GamePhase::Enactment)?;
        Self::ensure_actor(room.deputy_id.as_ref(), actor)?;
        if room.auto_enactment || room.deputy_hand.len() != DEPUTY_HAND_SIZE {
            return Ok(Vec::new());
        }
        if card_index >= room.deputy_hand.len() {
            return Err(RuleError::InvalidTarget);
        }

        let enacted = room.deputy_hand.remove(card_index);
        while let Some(leftover) = room.deputy_hand.pop() {
            deck::discard(&mut room.policy_discard, leftover);
        }
        room.clear_hands();
        Self::apply_enacted_policy(room, enacted);

        let mut events = Vec::new();
        Self::emit(room, &mut events, GameEvent::PolicyEnacted { card: enacted });

        if let Some(outcome) = Self::evaluate_policy_win(room) {
            events.push(GameEvent::GameWon {
                winner: outcome.winner,
                reason: outcome.reason,
            });
            return Ok(events);
        }

        let pending = powers::pending_powers(
            room.syndicate_policies_enacted,
            &room.syndicate_powers_resolved,
            roster.len(),
        );
        if pending.is_empty() {
            Self::begin_next_round(room, roster, &mut events);
        }
        Ok(events)
    }

    /// 三次流选后的自动颁布：翻开牌顶一张直接生效，不触发任何权力。
    /// 任何房间成员都可以代为触发。
    pub fn auto_enact(
        &mut self,
        room: &mut Room,
        roster: &mut [Player],
        actor: &str,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if room.is_finished() {
            return Ok(Vec::new());
        }
        Self::ensure_integrity(room, roster)?;
        Self::ensure_phase(room, GamePhase::Enactment)?;
        if Self::find_player(roster, actor).is_none() {
            return Err(RuleError::Unauthorized {
                player_id: actor.to_string(),
            });
        }
        if !room.auto_enactment {
            return Ok(Vec::new());
        }

        let available = room.policy_deck.len() + room.policy_discard.len();
        let outcome = deck::draw(&room.policy_deck, &room.policy_discard, 1, &mut self.rng)
            .ok_or(RuleError::InsufficientCards {
                requested: 1,
                available,
            })?;
        let card = match outcome.drawn.first() {
            Some(card) => *card,
            None => {
                return Err(RuleError::InsufficientCards {
                    requested: 1,
                    available,
                })
            }
        };

        room.surveillance_peek.clear();
        room.policy_deck = outcome.deck;
        room.policy_discard = outcome.discard;
        room.auto_enactment = false;
        room.clear_hands();
        Self::apply_enacted_policy(room, card);

        let mut events = Vec::new();
        Self::emit(room, &mut events, GameEvent::PolicyAutoEnacted { card });

        if let Some(outcome) = Self::evaluate_policy_win(room) {
            events.push(GameEvent::GameWon {
                winner: outcome.winner,
                reason: outcome.reason,
            });
            return Ok(events);
        }

        Self::begin_next_round(room, roster, &mut events);
        Ok(events)
    }

    /// 现任长官结算一个待处理权力。只接受待处理队列里阈值最低的那个。
    pub fn resolve_power(
        &mut self,
        room: &mut Room,
        roster: &mut [Player],
        actor: &str,
        power: SyndicatePower,
        target_id: Option<&str>,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if room.is_finished() {
            return Ok(Vec::new());
        }
        Self::ensure_integrity(room, roster)?;
        Self::ensure_phase(room, GamePhase::Enactment)?;
        Self::ensure_actor(room.director_id.as_ref(), actor)?;
        if room.auto_enactment {
            return Ok(Vec::new());
        }
        if room.power_resolved(power) {
            return Err(RuleError::AlreadyResolved);
        }
        let pending = powers::pending_powers(
            room.syndicate_policies_enacted,
            &room.syndicate_powers_resolved,
            roster.len(),
        );
        if pending.first() != Some(&power) {
            return Err(RuleError::InvalidTarget);
        }

        let mut events = Vec::new();
        let mut purged: Option<(PlayerId, Option<Role>)> = None;

        match power {
            SyndicatePower::Investigate => {
                let target = target_id.ok_or(RuleError::InvalidTarget)?;
                let player = Self::find_player(roster, target).ok_or(RuleError::InvalidTarget)?;
                if !player.alive || player.id == actor {
                    return Err(RuleError::InvalidTarget);
                }
                let team = player.team.ok_or(RuleError::InvalidTarget)?;
                room.investigation_results.insert(target.to_string(), team);
            }
            SyndicatePower::Surveillance => {
                room.surveillance_peek = deck::peek_top(
                    &room.policy_deck,
                    &room.policy_discard,
                    SURVEILLANCE_PEEK_COUNT,
                );
            }
            SyndicatePower::SpecialElection => {
                let target = target_id.ok_or(RuleError::InvalidTarget)?;
                let player = Self::find_player(roster, target).ok_or(RuleError::InvalidTarget)?;
                if !player.alive || player.id == actor {
                    return Err(RuleError::InvalidTarget);
                }
                room.special_election_director_id = Some(target.to_string());
            }
            SyndicatePower::Purge => {
                let target = target_id.ok_or(RuleError::InvalidTarget)?;
                let player =
                    Self::find_player_mut(roster, target).ok_or(RuleError::InvalidTarget)?;
                if !player.alive || player.id == actor {
                    return Err(RuleError::InvalidTarget);
                }
                player.alive = false;
                purged = Some((player.id.clone(), player.role));
            }
        }

        room.mark_power_resolved(power);
        Self::emit(room, &mut events, GameEvent::PowerResolved { power });

        if let Some((player_id, role)) = purged {
            Self::emit(
                room,
                &mut events,
                GameEvent::PlayerPurged {
                    player_id: player_id.clone(),
                },
            );
            if role == Some(Role::Mastermind) {
                let outcome =
                    room.declare_victory(Team::Agency, WinReason::MastermindPurged { player_id });
                events.push(GameEvent::GameWon {
                    winner: outcome.winner,
                    reason: outcome.reason,
                });
                return Ok(events);
            }
        }

        let still_pending = powers::pending_powers(
            room.syndicate_policies_enacted,
            &room.syndicate_powers_resolved,
            roster.len(),
        );
        if still_pending.is_empty() {
            Self::begin_next_round(room, roster, &mut events);
        }
        Ok(events)
    }

    /// 房主手动调整存活状态（管理工具，不触发胜负判定）。
    pub fn toggle_alive(
        &mut self,
        room: &mut Room,
        roster: &mut [Player],
        actor: &str,
        player_id: &str,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if room.is_finished() {
            return Ok(Vec::new());
        }
        Self::ensure_integrity(room, roster)?;
        Self::ensure_owner(room, actor)?;

        let player = Self::find_player_mut(roster, player_id).ok_or(RuleError::InvalidTarget)?;
        player.alive = !player.alive;
        let alive = player.alive;

        let mut events = Vec::new();
        Self::emit(
            room,
            &mut events,
            GameEvent::PlayerAliveToggled {
                player_id: player_id.to_string(),
                alive,
            },
        );
        Ok(events)
    }

    /// 房主强制结束：终局、无胜方。
    pub fn end_game(
        &mut self,
        room: &mut Room,
        roster: &mut [Player],
        actor: &str,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if room.is_finished() {
            return Ok(Vec::new());
        }
        Self::ensure_integrity(room, roster)?;
        Self::ensure_owner(room, actor)?;

        room.force_finish();

        let mut events = Vec::new();
        Self::emit(room, &mut events, GameEvent::GameEnded);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_game(seed: u64) -> (RuleEngine, Room, Vec<Player>) {
        let mut roster = vec![
            Player::new("p1", "Avery"),
            Player::new("p2", "Blake"),
            Player::new("p3", "Casey"),
            Player::new("p4", "Drew"),
            Player::new("p5", "Emery"),
        ];
        let mut room = Room::create("room-1", "QX3KP7", "p1");
        let mut engine = RuleEngine::with_seed(seed);
        engine
            .start_game(&mut room, &mut roster, "p1")
            .expect("five players start cleanly");
        (engine, room, roster)
    }

    /// 测试需要可控的角色布局时直接覆写分配结果。
    fn script_roles(roster: &mut [Player], mastermind: &str, agents: &[&str]) {
        for player in roster.iter_mut() {
            let role = if player.id == mastermind {
                Role::Mastermind
            } else if agents.contains(&player.id.as_str()) {
                Role::SyndicateAgent
            } else {
                Role::Agency
            };
            player.role = Some(role);
            player.team = Some(match role {
                Role::Agency => Team::Agency,
                Role::Mastermind | Role::SyndicateAgent => Team::Syndicate,
            });
        }
    }

    /// 把若干张牌从牌库“搬”到轨道上，保持守恒。
    fn force_track(room: &mut Room, syndicate: u8, agency: u8) {
        remove_from_piles(room, PolicyCard::Syndicate, syndicate as usize);
        remove_from_piles(room, PolicyCard::Agency, agency as usize);
        room.syndicate_policies_enacted += syndicate;
        room.agency_policies_enacted += agency;
    }

    fn remove_from_piles(room: &mut Room, card: PolicyCard, count: usize) {
        for _ in 0..count {
            if let Some(pos) = room.policy_deck.iter().position(|held| *held == card) {
                room.policy_deck.remove(pos);
            } else if let Some(pos) = room.policy_discard.iter().position(|held| *held == card) {
                room.policy_discard.remove(pos);
            } else {
                panic!("test setup exhausted {card:?} cards");
            }
        }
    }

    /// 跳过抽牌环节，直接塞一手可控的副手牌（从牌库取牌保持守恒）。
    fn give_deputy_hand(room: &mut Room, cards: [PolicyCard; 2]) {
        for card in cards {
            remove_from_piles(room, card, 1);
            room.deputy_hand.push(card);
        }
    }

    fn eligible_deputy(room: &Room, roster: &[Player]) -> String {
        let candidate = room
            .director_candidate_id
            .clone()
            .expect("a nomination round has a candidate");
        roster
            .iter()
            .filter(|player| {
                player.alive
                    && player.id != candidate
                    && room.previous_director_id.as_ref() != Some(&player.id)
            })
            .map(|player| player.id.clone())
            .next()
            .expect("someone is eligible")
    }

    fn pass_election(engine: &mut RuleEngine, room: &mut Room, roster: &mut Vec<Player>, deputy: &str) {
        let candidate = room.director_candidate_id.clone().expect("candidate set");
        engine
            .nominate_deputy(room, roster, &candidate, deputy)
            .expect("nomination is valid");
        let voters: Vec<String> = roster
            .iter()
            .filter(|player| player.alive)
            .map(|player| player.id.clone())
            .collect();
        for voter in voters {
            if room.phase != GamePhase::Voting {
                break;
            }
            engine
                .submit_vote(room, roster, &voter, VoteChoice::Approve)
                .expect("vote accepted");
        }
    }

    fn fail_election(engine: &mut RuleEngine, room: &mut Room, roster: &mut Vec<Player>) {
        let deputy = eligible_deputy(room, roster);
        let candidate = room.director_candidate_id.clone().expect("candidate set");
        engine
            .nominate_deputy(room, roster, &candidate, &deputy)
            .expect("nomination is valid");
        let voters: Vec<String> = roster
            .iter()
            .filter(|player| player.alive)
            .map(|player| player.id.clone())
            .collect();
        for voter in voters {
            if room.phase != GamePhase::Voting {
                break;
            }
            engine
                .submit_vote(room, roster, &voter, VoteChoice::Reject)
                .expect("vote accepted");
        }
    }

    #[test]
    fn start_game_assigns_roles_and_builds_deck() {
        let (_, room, roster) = started_game(1);

        assert_eq!(room.status, GameStatus::InProgress);
        assert_eq!(room.phase, GamePhase::Nomination);
        assert_eq!(room.round, 1);
        assert_eq!(room.director_candidate_id.as_deref(), Some("p1"));
        assert_eq!(room.policy_deck.len(), 17);
        for player in &roster {
            assert!(player.role.is_some(), "no player is left without a role");
            assert!(player.team.is_some());
            assert!(player.alive);
        }
        room.integrity_check(&roster).expect("fresh game is valid");
    }

    #[test]
    fn start_game_requires_the_owner_and_the_lobby_phase() {
        let mut roster: Vec<Player> = (1..=5)
            .map(|index| Player::new(format!("p{index}"), format!("Player {index}")))
            .collect();
        let mut room = Room::create("room-1", "QX3KP7", "p1");
        let mut engine = RuleEngine::with_seed(2);

        assert!(matches!(
            engine.start_game(&mut room, &mut roster, "p2"),
            Err(RuleError::Unauthorized { .. })
        ));
        assert_eq!(room.status, GameStatus::Lobby);

        engine.start_game(&mut room, &mut roster, "p1").unwrap();
        assert!(matches!(
            engine.start_game(&mut room, &mut roster, "p1"),
            Err(RuleError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn start_game_rejects_unsupported_player_counts() {
        let mut roster = vec![
            Player::new("p1", "Avery"),
            Player::new("p2", "Blake"),
            Player::new("p3", "Casey"),
            Player::new("p4", "Drew"),
        ];
        let mut room = Room::create("room-1", "QX3KP7", "p1");
        let mut engine = RuleEngine::with_seed(3);

        assert_eq!(
            engine.start_game(&mut room, &mut roster, "p1"),
            Err(RuleError::ConfigurationError { player_count: 4 })
        );
        assert_eq!(room.status, GameStatus::Lobby);
        assert!(roster.iter().all(|player| player.role.is_none()));
    }

    #[test]
    fn nomination_rejects_ineligible_deputies() {
        let (mut engine, mut room, mut roster) = started_game(4);

        // 自己
        assert_eq!(
            engine.nominate_deputy(&mut room, &mut roster, "p1", "p1"),
            Err(RuleError::InvalidTarget)
        );
        // 上一任长官
        room.previous_director_id = Some("p2".into());
        assert_eq!(
            engine.nominate_deputy(&mut room, &mut roster, "p1", "p2"),
            Err(RuleError::InvalidTarget)
        );
        // 出局者
        room.previous_director_id = None;
        roster[2].alive = false;
        assert_eq!(
            engine.nominate_deputy(&mut room, &mut roster, "p1", "p3"),
            Err(RuleError::InvalidTarget)
        );
        // 非候选人发起
        assert!(matches!(
            engine.nominate_deputy(&mut room, &mut roster, "p4", "p5"),
            Err(RuleError::Unauthorized { .. })
        ));
        assert_eq!(room.phase, GamePhase::Nomination, "rejections change nothing");
    }

    #[test]
    fn nomination_moves_to_voting() {
        let (mut engine, mut room, mut roster) = started_game(5);
        room.vote_tallies.insert("p9".into(), VoteChoice::Approve);

        let events = engine
            .nominate_deputy(&mut room, &mut roster, "p1", "p3")
            .unwrap();

        assert_eq!(room.phase, GamePhase::Voting);
        assert_eq!(room.deputy_candidate_id.as_deref(), Some("p3"));
        assert!(room.vote_tallies.is_empty(), "stale tallies are cleared");
        assert!(matches!(
            events.as_slice(),
            [GameEvent::DeputyNominated { .. }]
        ));
    }

    #[test]
    fn votes_are_restricted_to_living_roster_members() {
        let (mut engine, mut room, mut roster) = started_game(6);
        engine
            .nominate_deputy(&mut room, &mut roster, "p1", "p2")
            .unwrap();
        roster[4].alive = false;

        assert!(matches!(
            engine.submit_vote(&mut room, &mut roster, "p5", VoteChoice::Approve),
            Err(RuleError::Unauthorized { .. })
        ));
        assert!(matches!(
            engine.submit_vote(&mut room, &mut roster, "ghost", VoteChoice::Approve),
            Err(RuleError::Unauthorized { .. })
        ));
        assert!(room.vote_tallies.is_empty());
    }

    #[test]
    fn approval_majority_resolves_the_election_immediately() {
        let (mut engine, mut room, mut roster) = started_game(7);
        engine
            .nominate_deputy(&mut room, &mut roster, "p1", "p2")
            .unwrap();

        engine
            .submit_vote(&mut room, &mut roster, "p1", VoteChoice::Approve)
            .unwrap();
        engine
            .submit_vote(&mut room, &mut roster, "p2", VoteChoice::Approve)
            .unwrap();
        assert_eq!(room.phase, GamePhase::Voting, "two of five is not a majority");

        let events = engine
            .submit_vote(&mut room, &mut roster, "p3", VoteChoice::Approve)
            .unwrap();

        assert_eq!(room.phase, GamePhase::Enactment);
        assert_eq!(room.director_id.as_deref(), Some("p1"));
        assert_eq!(room.deputy_id.as_deref(), Some("p2"));
        assert_eq!(room.previous_director_id.as_deref(), Some("p1"));
        assert_eq!(room.instability_count, 0);
        assert!(events
            .iter()
            .any(|event| matches!(event, GameEvent::ElectionPassed { .. })));

        // 结算后迟到的票吃到阶段错误
        assert!(matches!(
            engine.submit_vote(&mut room, &mut roster, "p4", VoteChoice::Approve),
            Err(RuleError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn revoting_overwrites_the_previous_ballot() {
        let (mut engine, mut room, mut roster) = started_game(8);
        engine
            .nominate_deputy(&mut room, &mut roster, "p1", "p2")
            .unwrap();

        engine
            .submit_vote(&mut room, &mut roster, "p1", VoteChoice::Approve)
            .unwrap();
        engine
            .submit_vote(&mut room, &mut roster, "p1", VoteChoice::Reject)
            .unwrap();

        assert_eq!(room.vote_tallies.len(), 1);
        assert_eq!(room.vote_tallies.get("p1"), Some(&VoteChoice::Reject));
    }

    #[test]
    fn rejection_majority_advances_instability_and_rotates_the_candidate() {
        let (mut engine, mut room, mut roster) = started_game(9);

        fail_election(&mut engine, &mut room, &mut roster);

        assert_eq!(room.phase, GamePhase::Nomination);
        assert_eq!(room.instability_count, 1);
        assert_eq!(room.director_candidate_id.as_deref(), Some("p2"));
        assert_eq!(room.previous_director_id.as_deref(), Some("p1"));
        assert!(room.vote_tallies.is_empty());
        assert!(!room.auto_enactment);
    }

    #[test]
    fn deadlocked_vote_fails_once_everyone_has_voted() {
        let (mut engine, mut room, mut roster) = started_game(10);
        // 四人存活：2 比 2 永远到不了多数
        engine
            .toggle_alive(&mut room, &mut roster, "p1", "p5")
            .unwrap();
        engine
            .nominate_deputy(&mut room, &mut roster, "p1", "p2")
            .unwrap();

        engine
            .submit_vote(&mut room, &mut roster, "p1", VoteChoice::Approve)
            .unwrap();
        engine
            .submit_vote(&mut room, &mut roster, "p2", VoteChoice::Approve)
            .unwrap();
        engine
            .submit_vote(&mut room, &mut roster, "p3", VoteChoice::Reject)
            .unwrap();
        assert_eq!(room.phase, GamePhase::Voting);

        engine
            .submit_vote(&mut room, &mut roster, "p4", VoteChoice::Reject)
            .unwrap();

        assert_eq!(room.phase, GamePhase::Nomination);
        assert_eq!(room.instability_count, 1);
    }

    #[test]
    fn three_failed_elections_arm_the_auto_enactment() {
        let (mut engine, mut room, mut roster) = started_game(11);

        fail_election(&mut engine, &mut room, &mut roster);
        fail_election(&mut engine, &mut room, &mut roster);
        assert_eq!(room.instability_count, 2);

        fail_election(&mut engine, &mut room, &mut roster);

        assert_eq!(room.phase, GamePhase::Enactment);
        assert!(room.auto_enactment);
        assert_eq!(room.instability_count, 0, "counter resets while armed");
        assert!(room
            .event_log
            .iter()
            .any(|event| matches!(event, GameEvent::AutoEnactmentArmed)));
    }

    #[test]
    fn auto_enact_draws_one_card_and_never_triggers_powers() {
        let (mut engine, mut room, mut roster) = started_game(12);
        for _ in 0..3 {
            fail_election(&mut engine, &mut room, &mut roster);
        }
        assert!(room.auto_enactment);

        let events = engine
            .auto_enact(&mut room, &mut roster, "p4")
            .expect("any roster member may trigger the fallback");

        assert!(!room.auto_enactment);
        assert_eq!(
            room.syndicate_policies_enacted + room.agency_policies_enacted,
            1
        );
        assert!(
            room.syndicate_powers_resolved.is_empty(),
            "the fallback card never opens power resolution"
        );
        assert!(events
            .iter()
            .any(|event| matches!(event, GameEvent::PolicyAutoEnacted { .. })));
        assert_eq!(room.phase, GamePhase::Nomination);
        assert_eq!(room.round, 2);
        room.integrity_check(&roster).expect("conservation holds");

        // 重复触发是无操作
        let repeat = engine.auto_enact(&mut room, &mut roster, "p5");
        assert!(matches!(repeat, Err(RuleError::InvalidPhase { .. })));
    }

    #[test]
    fn auto_enact_is_a_noop_when_not_armed() {
        let (mut engine, mut room, mut roster) = started_game(13);
        pass_election(&mut engine, &mut room, &mut roster, "p2");
        let before = room.clone();

        let events = engine.auto_enact(&mut room, &mut roster, "p3").unwrap();

        assert!(events.is_empty());
        assert_eq!(room, before);
    }

    #[test]
    fn draw_and_discard_hand_off_to_the_deputy() {
        let (mut engine, mut room, mut roster) = started_game(14);
        pass_election(&mut engine, &mut room, &mut roster, "p2");

        engine.draw_policies(&mut room, &mut roster, "p1").unwrap();
        assert_eq!(room.director_hand.len(), 3);
        assert_eq!(room.policy_deck.len(), 14);

        // 重复抽取是无操作
        let redraw = engine.draw_policies(&mut room, &mut roster, "p1").unwrap();
        assert!(redraw.is_empty());
        assert_eq!(room.director_hand.len(), 3);

        engine
            .director_discard(&mut room, &mut roster, "p1", 1)
            .unwrap();
        assert!(room.director_hand.is_empty());
        assert_eq!(room.deputy_hand.len(), 2);
        assert_eq!(room.policy_discard.len(), 1);
        room.integrity_check(&roster).expect("conservation holds");

        // 越界下标
        assert_eq!(
            engine.deputy_enact(&mut room, &mut roster, "p2", 5),
            Err(RuleError::InvalidTarget)
        );
        // 副手之外的人不能颁布
        assert!(matches!(
            engine.deputy_enact(&mut room, &mut roster, "p3", 0),
            Err(RuleError::Unauthorized { .. })
        ));
    }

    #[test]
    fn enacting_an_agency_card_advances_straight_to_the_next_round() {
        let (mut engine, mut room, mut roster) = started_game(15);
        pass_election(&mut engine, &mut room, &mut roster, "p2");
        give_deputy_hand(&mut room, [PolicyCard::Agency, PolicyCard::Syndicate]);

        let events = engine
            .deputy_enact(&mut room, &mut roster, "p2", 0)
            .unwrap();

        assert_eq!(room.agency_policies_enacted, 1);
        assert_eq!(room.syndicate_policies_enacted, 0);
        assert_eq!(room.phase, GamePhase::Nomination);
        assert_eq!(room.round, 2);
        assert_eq!(room.director_candidate_id.as_deref(), Some("p2"));
        assert_eq!(room.previous_director_id.as_deref(), Some("p1"));
        assert!(room.deputy_hand.is_empty());
        assert!(events
            .iter()
            .any(|event| matches!(event, GameEvent::RoundStarted { round: 2, .. })));
        room.integrity_check(&roster).expect("conservation holds");
    }

    #[test]
    fn syndicate_enactment_gates_the_round_on_pending_powers() {
        let (mut engine, mut room, mut roster) = started_game(16);
        pass_election(&mut engine, &mut room, &mut roster, "p2");
        give_deputy_hand(&mut room, [PolicyCard::Syndicate, PolicyCard::Agency]);

        engine
            .deputy_enact(&mut room, &mut roster, "p2", 0)
            .unwrap();

        // 五人局第一张辛迪加政策解锁调查，回合停在颁布阶段等待结算
        assert_eq!(room.syndicate_policies_enacted, 1);
        assert_eq!(room.phase, GamePhase::Enactment);
        assert_eq!(room.round, 1);

        let events = engine
            .resolve_power(
                &mut room,
                &mut roster,
                "p1",
                SyndicatePower::Investigate,
                Some("p3"),
            )
            .unwrap();

        let expected_team = roster[2].team;
        assert_eq!(
            room.investigation_results.get("p3").copied(),
            expected_team
        );
        assert!(room.power_resolved(SyndicatePower::Investigate));
        assert!(events
            .iter()
            .any(|event| matches!(event, GameEvent::PowerResolved { .. })));
        // 队列清空后引擎自己开启下一轮
        assert_eq!(room.phase, GamePhase::Nomination);
        assert_eq!(room.round, 2);
    }

    #[test]
    fn resolve_power_rejects_bad_callers_and_repeats() {
        let (mut engine, mut room, mut roster) = started_game(17);
        // 预置一张已颁布的辛迪加政策：本次颁布后队列里有两个权力，
        // 结算第一个之后回合不会立刻推进
        force_track(&mut room, 1, 0);
        pass_election(&mut engine, &mut room, &mut roster, "p2");
        give_deputy_hand(&mut room, [PolicyCard::Syndicate, PolicyCard::Agency]);
        engine
            .deputy_enact(&mut room, &mut roster, "p2", 0)
            .unwrap();

        // 非长官
        assert!(matches!(
            engine.resolve_power(
                &mut room,
                &mut roster,
                "p2",
                SyndicatePower::Investigate,
                Some("p3")
            ),
            Err(RuleError::Unauthorized { .. })
        ));
        // 未到阈值的权力不在队列里
        assert_eq!(
            engine.resolve_power(&mut room, &mut roster, "p1", SyndicatePower::Purge, Some("p3")),
            Err(RuleError::InvalidTarget)
        );
        // 自查与查死人都不行
        assert_eq!(
            engine.resolve_power(
                &mut room,
                &mut roster,
                "p1",
                SyndicatePower::Investigate,
                Some("p1")
            ),
            Err(RuleError::InvalidTarget)
        );

        engine
            .resolve_power(
                &mut room,
                &mut roster,
                "p1",
                SyndicatePower::Investigate,
                Some("p3"),
            )
            .unwrap();
        assert_eq!(room.phase, GamePhase::Enactment, "surveillance still pends");

        // 幂等：重复结算只生效一次
        assert_eq!(
            engine.resolve_power(
                &mut room,
                &mut roster,
                "p1",
                SyndicatePower::Investigate,
                Some("p4")
            ),
            Err(RuleError::AlreadyResolved)
        );
        assert_eq!(room.investigation_results.len(), 1);

        engine
            .resolve_power(&mut room, &mut roster, "p1", SyndicatePower::Surveillance, None)
            .unwrap();
        assert_eq!(room.phase, GamePhase::Nomination, "queue drained");
    }

    #[test]
    fn surveillance_peek_survives_until_the_deck_is_touched() {
        let (mut engine, mut room, mut roster) = started_game(18);
        force_track(&mut room, 1, 0);
        room.syndicate_powers_resolved = vec![SyndicatePower::Investigate];
        pass_election(&mut engine, &mut room, &mut roster, "p2");
        give_deputy_hand(&mut room, [PolicyCard::Syndicate, PolicyCard::Agency]);
        engine
            .deputy_enact(&mut room, &mut roster, "p2", 0)
            .unwrap();
        assert_eq!(room.phase, GamePhase::Enactment, "surveillance is pending");

        let expected = deck::peek_top(&room.policy_deck, &room.policy_discard, 3);
        engine
            .resolve_power(&mut room, &mut roster, "p1", SyndicatePower::Surveillance, None)
            .unwrap();

        assert_eq!(room.surveillance_peek, expected);
        assert_eq!(room.phase, GamePhase::Nomination, "queue drained, next round");
        assert!(
            !room.surveillance_peek.is_empty(),
            "peek stays readable through the next nomination"
        );

        pass_election(&mut engine, &mut room, &mut roster, "p3");
        engine.draw_policies(&mut room, &mut roster, "p2").unwrap();
        assert!(room.surveillance_peek.is_empty(), "stale peek is dropped");
    }

    #[test]
    fn special_election_overrides_exactly_one_nomination() {
        let (mut engine, mut room, mut roster) = started_game(19);
        force_track(&mut room, 2, 0);
        room.syndicate_powers_resolved =
            vec![SyndicatePower::Investigate, SyndicatePower::Surveillance];
        pass_election(&mut engine, &mut room, &mut roster, "p2");
        give_deputy_hand(&mut room, [PolicyCard::Syndicate, PolicyCard::Agency]);
        engine
            .deputy_enact(&mut room, &mut roster, "p2", 0)
            .unwrap();

        engine
            .resolve_power(
                &mut room,
                &mut roster,
                "p1",
                SyndicatePower::SpecialElection,
                Some("p4"),
            )
            .unwrap();

        assert_eq!(room.phase, GamePhase::Nomination);
        assert_eq!(
            room.director_candidate_id.as_deref(),
            Some("p4"),
            "special election overrides rotation"
        );
        assert_eq!(
            room.special_election_director_id, None,
            "the override is consumed by the round build"
        );
    }

    #[test]
    fn purging_an_agent_keeps_the_game_going() {
        let (mut engine, mut room, mut roster) = started_game(20);
        script_roles(&mut roster, "p4", &["p3"]);
        force_track(&mut room, 3, 0);
        room.syndicate_powers_resolved = vec![
            SyndicatePower::Investigate,
            SyndicatePower::Surveillance,
            SyndicatePower::SpecialElection,
        ];
        pass_election(&mut engine, &mut room, &mut roster, "p2");
        give_deputy_hand(&mut room, [PolicyCard::Syndicate, PolicyCard::Agency]);
        engine
            .deputy_enact(&mut room, &mut roster, "p2", 0)
            .unwrap();

        engine
            .resolve_power(&mut room, &mut roster, "p1", SyndicatePower::Purge, Some("p3"))
            .unwrap();

        assert!(!roster[2].alive);
        assert!(room.outcome.is_none());
        assert_eq!(room.phase, GamePhase::Nomination, "play continues");
    }

    #[test]
    fn purging_the_mastermind_wins_for_the_agency() {
        let (mut engine, mut room, mut roster) = started_game(21);
        script_roles(&mut roster, "p4", &["p3"]);
        force_track(&mut room, 3, 0);
        room.syndicate_powers_resolved = vec![
            SyndicatePower::Investigate,
            SyndicatePower::Surveillance,
            SyndicatePower::SpecialElection,
        ];
        pass_election(&mut engine, &mut room, &mut roster, "p2");
        give_deputy_hand(&mut room, [PolicyCard::Syndicate, PolicyCard::Agency]);
        engine
            .deputy_enact(&mut room, &mut roster, "p2", 0)
            .unwrap();

        let events = engine
            .resolve_power(&mut room, &mut roster, "p1", SyndicatePower::Purge, Some("p4"))
            .unwrap();

        assert!(room.is_finished());
        assert_eq!(
            room.outcome,
            Some(GameOutcome {
                winner: Team::Agency,
                reason: WinReason::MastermindPurged {
                    player_id: "p4".into()
                },
            })
        );
        assert!(!roster[3].alive);
        assert!(events
            .iter()
            .any(|event| matches!(event, GameEvent::GameWon { .. })));
    }

    #[test]
    fn mastermind_elected_late_game_ends_in_a_syndicate_win() {
        let (mut engine, mut room, mut roster) = started_game(22);
        script_roles(&mut roster, "p2", &["p3"]);
        force_track(&mut room, 3, 0);

        pass_election(&mut engine, &mut room, &mut roster, "p2");

        assert!(room.is_finished());
        assert_eq!(
            room.outcome,
            Some(GameOutcome {
                winner: Team::Syndicate,
                reason: WinReason::MastermindElected {
                    player_id: "p2".into()
                },
            })
        );
    }

    #[test]
    fn sixth_syndicate_policy_wins_even_with_a_power_pending() {
        let (mut engine, mut room, mut roster) = started_game(23);
        script_roles(&mut roster, "p4", &["p3"]);
        force_track(&mut room, 5, 0);
        // 留着一个没结算的权力，胜负判定必须越过它
        room.syndicate_powers_resolved = vec![
            SyndicatePower::Investigate,
            SyndicatePower::Surveillance,
            SyndicatePower::SpecialElection,
        ];
        pass_election(&mut engine, &mut room, &mut roster, "p2");
        give_deputy_hand(&mut room, [PolicyCard::Syndicate, PolicyCard::Agency]);

        engine
            .deputy_enact(&mut room, &mut roster, "p2", 0)
            .unwrap();

        assert!(room.is_finished());
        assert_eq!(
            room.outcome,
            Some(GameOutcome {
                winner: Team::Syndicate,
                reason: WinReason::PolicyTrack {
                    team: Team::Syndicate
                },
            })
        );
    }

    #[test]
    fn fifth_agency_policy_wins_for_the_agency() {
        let (mut engine, mut room, mut roster) = started_game(24);
        force_track(&mut room, 0, 4);
        pass_election(&mut engine, &mut room, &mut roster, "p2");
        give_deputy_hand(&mut room, [PolicyCard::Agency, PolicyCard::Syndicate]);

        engine
            .deputy_enact(&mut room, &mut roster, "p2", 0)
            .unwrap();

        assert!(room.is_finished());
        assert_eq!(
            room.outcome,
            Some(GameOutcome {
                winner: Team::Agency,
                reason: WinReason::PolicyTrack { team: Team::Agency },
            })
        );
    }

    #[test]
    fn rotation_skips_eliminated_players_in_join_order() {
        let (mut engine, mut room, mut roster) = started_game(25);
        engine
            .toggle_alive(&mut room, &mut roster, "p1", "p2")
            .unwrap();

        fail_election(&mut engine, &mut room, &mut roster);

        assert_eq!(
            room.director_candidate_id.as_deref(),
            Some("p3"),
            "p2 is dead, rotation lands on p3"
        );
    }

    #[test]
    fn toggle_alive_is_an_owner_override() {
        let (mut engine, mut room, mut roster) = started_game(26);

        assert!(matches!(
            engine.toggle_alive(&mut room, &mut roster, "p2", "p3"),
            Err(RuleError::Unauthorized { .. })
        ));

        engine
            .toggle_alive(&mut room, &mut roster, "p1", "p3")
            .unwrap();
        assert!(!roster[2].alive);
        engine
            .toggle_alive(&mut room, &mut roster, "p1", "p3")
            .unwrap();
        assert!(roster[2].alive);
    }

    #[test]
    fn owner_can_force_finish_without_a_winner() {
        let (mut engine, mut room, mut roster) = started_game(27);

        engine.end_game(&mut room, &mut roster, "p1").unwrap();

        assert!(room.is_finished());
        assert_eq!(room.outcome, None);
    }

    #[test]
    fn finished_rooms_ignore_every_operation() {
        let (mut engine, mut room, mut roster) = started_game(28);
        script_roles(&mut roster, "p4", &["p3"]);
        force_track(&mut room, 5, 0);
        room.syndicate_powers_resolved = vec![
            SyndicatePower::Investigate,
            SyndicatePower::Surveillance,
            SyndicatePower::SpecialElection,
            SyndicatePower::Purge,
        ];
        pass_election(&mut engine, &mut room, &mut roster, "p2");
        give_deputy_hand(&mut room, [PolicyCard::Syndicate, PolicyCard::Agency]);
        engine
            .deputy_enact(&mut room, &mut roster, "p2", 0)
            .unwrap();
        assert!(room.is_finished());

        let frozen_room = room.clone();
        let frozen_roster = roster.clone();

        assert_eq!(
            engine.submit_vote(&mut room, &mut roster, "p1", VoteChoice::Approve),
            Ok(Vec::new())
        );
        assert_eq!(engine.draw_policies(&mut room, &mut roster, "p1"), Ok(Vec::new()));
        assert_eq!(
            engine.nominate_deputy(&mut room, &mut roster, "p1", "p3"),
            Ok(Vec::new())
        );
        assert_eq!(engine.auto_enact(&mut room, &mut roster, "p1"), Ok(Vec::new()));
        assert_eq!(
            engine.toggle_alive(&mut room, &mut roster, "p1", "p3"),
            Ok(Vec::new())
        );
        assert_eq!(
            engine.resolve_power(&mut room, &mut roster, "p1", SyndicatePower::Purge, Some("p3")),
            Ok(Vec::new())
        );

        assert_eq!(room, frozen_room, "no operation mutates a finished room");
        assert_eq!(roster, frozen_roster);
    }
}
