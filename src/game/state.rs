use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// 不稳定计数上限，达到后进入自动颁布。
pub const INSTABILITY_CAP: u8 = 3;
/// 辛迪加政策轨道长度（填满即辛迪加胜利）。
pub const SYNDICATE_TRACK_LENGTH: u8 = 6;
/// 情报局政策轨道长度（填满即情报局胜利）。
pub const AGENCY_TRACK_LENGTH: u8 = 5;

/// 玩家标识（由外部存储层分配）。
pub type PlayerId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Lobby,
    InProgress,
    Finished,
}

impl Default for GameStatus {
    fn default() -> Self {
        GameStatus::Lobby
    }
}

/// 游戏阶段。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Lobby,
    Nomination,
    Voting,
    Enactment,
    Finished,
}

impl Default for GamePhase {
    fn default() -> Self {
        GamePhase::Lobby
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Mastermind,
    SyndicateAgent,
    Agency,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Syndicate,
    Agency,
}

/// 政策卡：纯值类型，没有身份。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PolicyCard {
    Syndicate,
    Agency,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Approve,
    Reject,
}

impl FromStr for VoteChoice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "approve" | "yes" => Ok(VoteChoice::Approve),
            "reject" | "no" => Ok(VoteChoice::Reject),
            _ => Err(()),
        }
    }
}

/// 辛迪加一次性长官权力。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SyndicatePower {
    Investigate,
    Surveillance,
    SpecialElection,
    Purge,
}

impl FromStr for SyndicatePower {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "investigate" => Ok(SyndicatePower::Investigate),
            "surveillance" => Ok(SyndicatePower::Surveillance),
            "special_election" => Ok(SyndicatePower::SpecialElection),
            "purge" => Ok(SyndicatePower::Purge),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum WinReason {
    PolicyTrack { team: Team },
    MastermindElected { player_id: PlayerId },
    MastermindPurged { player_id: PlayerId },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameOutcome {
    pub winner: Team,
    pub reason: WinReason,
}

/// 游戏事件流。事件是粗粒度的，绝不携带隐藏信息
/// （阵营、投票取向、侦察到的牌面都不进事件）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    GameStarted {
        player_count: usize,
    },
    RoundStarted {
        round: u32,
        director_candidate_id: PlayerId,
    },
    DeputyNominated {
        director_candidate_id: PlayerId,
        deputy_candidate_id: PlayerId,
    },
    VoteRecorded {
        player_id: PlayerId,
    },
    ElectionPassed {
        director_id: PlayerId,
        deputy_id: PlayerId,
    },
    ElectionFailed {
        instability_count: u8,
    },
    AutoEnactmentArmed,
    PoliciesDrawn {
        count: usize,
    },
    PolicyDiscarded,
    PolicyEnacted {
        card: PolicyCard,
    },
    PolicyAutoEnacted {
        card: PolicyCard,
    },
    PowerResolved {
        power: SyndicatePower,
    },
    PlayerPurged {
        player_id: PlayerId,
    },
    PlayerAliveToggled {
        player_id: PlayerId,
        alive: bool,
    },
    GameWon {
        winner: Team,
        reason: WinReason,
    },
    GameEnded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    DirectorHandSize {
        len: usize,
    },
    DeputyHandSize {
        len: usize,
    },
    PolicyConservation {
        card: PolicyCard,
        expected: usize,
        actual: usize,
    },
    DuplicateResolvedPower {
        power: SyndicatePower,
    },
    InstabilityOutOfRange {
        value: u8,
    },
    TrackOverflow {
        card: PolicyCard,
        value: u8,
    },
    UnknownPlayerReference {
        player_id: PlayerId,
    },
}

/// 玩家状态。角色与阵营在开局分配前为空。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub known_teammate_ids: Vec<PlayerId>,
    pub alive: bool,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role: None,
            team: None,
            known_teammate_ids: Vec::new(),
            alive: true,
        }
    }
}

/// 房间整体状态。所有字段只允许经由规则引擎的操作写入。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub id: String,
    pub code: String,
    pub owner_id: PlayerId,
    pub status: GameStatus,
    pub phase: GamePhase,
    pub round: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director_candidate_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deputy_candidate_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deputy_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_director_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vote_tallies: HashMap<PlayerId, VoteChoice>,
    #[serde(default)]
    pub instability_count: u8,
    #[serde(default)]
    pub auto_enactment: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_deck: Vec<PolicyCard>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_discard: Vec<PolicyCard>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub director_hand: Vec<PolicyCard>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deputy_hand: Vec<PolicyCard>,
    #[serde(default)]
    pub syndicate_policies_enacted: u8,
    #[serde(default)]
    pub agency_policies_enacted: u8,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub syndicate_powers_resolved: Vec<SyndicatePower>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub investigation_results: HashMap<PlayerId, Team>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub surveillance_peek: Vec<PolicyCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_election_director_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<GameOutcome>,
}

impl Room {
    pub fn create(
        id: impl Into<String>,
        code: impl Into<String>,
        owner_id: impl Into<PlayerId>,
    ) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            owner_id: owner_id.into(),
            ..Self::default()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished || self.phase == GamePhase::Finished
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn clear_hands(&mut self) {
        self.director_hand.clear();
        self.deputy_hand.clear();
    }

    pub fn power_resolved(&self, power: SyndicatePower) -> bool {
        self.syndicate_powers_resolved.contains(&power)
    }

    pub fn mark_power_resolved(&mut self, power: SyndicatePower) {
        if !self.power_resolved(power) {
            self.syndicate_powers_resolved.push(power);
        }
    }

    /// 宣告胜利。首次调用落盘结果并强制终局，之后的调用只返回既有结果。
    pub fn declare_victory(&mut self, winner: Team, reason: WinReason) -> GameOutcome {
        let outcome = GameOutcome { winner, reason };
        if self.outcome.is_none() {
            self.record_event(GameEvent::GameWon {
                winner: outcome.winner,
                reason: outcome.reason.clone(),
            });
            self.outcome = Some(outcome.clone());
        }
        self.status = GameStatus::Finished;
        self.phase = GamePhase::Finished;
        self.outcome.clone().unwrap_or(outcome)
    }

    /// 房主强制结束：终局但不产生胜负结果。
    pub fn force_finish(&mut self) {
        self.status = GameStatus::Finished;
        self.phase = GamePhase::Finished;
    }

    pub fn integrity_check(&self, roster: &[Player]) -> Result<(), IntegrityError> {
        if !matches!(self.director_hand.len(), 0 | 3) {
            return Err(IntegrityError::DirectorHandSize {
                len: self.director_hand.len(),
            });
        }
        if !matches!(self.deputy_hand.len(), 0 | 2) {
            return Err(IntegrityError::DeputyHandSize {
                len: self.deputy_hand.len(),
            });
        }
        if self.instability_count >= INSTABILITY_CAP {
            return Err(IntegrityError::InstabilityOutOfRange {
                value: self.instability_count,
            });
        }
        if self.syndicate_policies_enacted > SYNDICATE_TRACK_LENGTH {
            return Err(IntegrityError::TrackOverflow {
                card: PolicyCard::Syndicate,
                value: self.syndicate_policies_enacted,
            });
        }
        if self.agency_policies_enacted > AGENCY_TRACK_LENGTH {
            return Err(IntegrityError::TrackOverflow {
                card: PolicyCard::Agency,
                value: self.agency_policies_enacted,
            });
        }

        let mut seen = HashSet::new();
        for power in &self.syndicate_powers_resolved {
            if !seen.insert(*power) {
                return Err(IntegrityError::DuplicateResolvedPower { power: *power });
            }
        }

        // 守恒检查只对已开局的房间有意义（大厅阶段牌库为空）。
        if self.status != GameStatus::Lobby {
            self.check_conservation(PolicyCard::Syndicate, super::deck::SYNDICATE_POLICY_COUNT)?;
            self.check_conservation(PolicyCard::Agency, super::deck::AGENCY_POLICY_COUNT)?;
        }

        for reference in [
            &self.director_candidate_id,
            &self.deputy_candidate_id,
            &self.director_id,
            &self.deputy_id,
            &self.previous_director_id,
            &self.special_election_director_id,
        ]
        .into_iter()
        .flatten()
        {
            if !roster.iter().any(|player| &player.id == reference) {
                return Err(IntegrityError::UnknownPlayerReference {
                    player_id: reference.clone(),
                });
            }
        }

        Ok(())
    }

    fn check_conservation(&self, card: PolicyCard, expected: usize) -> Result<(), IntegrityError> {
        let enacted = match card {
            PolicyCard::Syndicate => self.syndicate_policies_enacted,
            PolicyCard::Agency => self.agency_policies_enacted,
        } as usize;
        let actual = self
            .policy_deck
            .iter()
            .chain(self.policy_discard.iter())
            .chain(self.director_hand.iter())
            .chain(self.deputy_hand.iter())
            .filter(|held| **held == card)
            .count()
            + enacted;
        if actual != expected {
            return Err(IntegrityError::PolicyConservation {
                card,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

impl Default for Room {
    fn default() -> Self {
        Self {
            id: String::new(),
            code: String::new(),
            owner_id: PlayerId::new(),
            status: GameStatus::default(),
            phase: GamePhase::default(),
            round: 0,
            director_candidate_id: None,
            deputy_candidate_id: None,
            director_id: None,
            deputy_id: None,
            previous_director_id: None,
            vote_tallies: HashMap::new(),
            instability_count: 0,
            auto_enactment: false,
            policy_deck: Vec::new(),
            policy_discard: Vec::new(),
            director_hand: Vec::new(),
            deputy_hand: Vec::new(),
            syndicate_policies_enacted: 0,
            agency_policies_enacted: 0,
            syndicate_powers_resolved: Vec::new(),
            investigation_results: HashMap::new(),
            surveillance_peek: Vec::new(),
            special_election_director_id: None,
            event_log: Vec::new(),
            outcome: None,
        }
    }
}

/// 房间快照与名单，一局游戏在外部存储中的完整记录。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomRecord {
    pub room: Room,
    pub roster: Vec<Player>,
}

impl RoomRecord {
    /// 返回一个已开局的五人示例房间，方便前端调试或初始化。
    pub fn sample() -> Self {
        let mut roster = vec![
            Player::new("p1", "Avery"),
            Player::new("p2", "Blake"),
            Player::new("p3", "Casey"),
            Player::new("p4", "Drew"),
            Player::new("p5", "Emery"),
        ];
        let mut room = Room::create("room-sample", "KJQ2M4", "p1");
        let mut engine = super::rules::RuleEngine::with_seed(7);
        let _ = engine.start_game(&mut room, &mut roster, "p1");
        Self { room, roster }
    }
}
