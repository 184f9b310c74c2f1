//! 游戏核心逻辑模块（状态机、规则引擎、事务门面等）。

pub mod deck;
pub mod powers;
pub mod roles;
pub mod rules;
pub mod state;
pub mod store;

pub use deck::{build_deck, discard, draw, peek_top, DrawOutcome};
pub use powers::{pending_powers, threshold_for, thresholds, POWER_ORDER};
pub use roles::{assign, build_role_list, RoleAssignment, RoleError};
pub use rules::{RuleEngine, RuleError, RuleResolution};
pub use state::{
    GameEvent,
    GameOutcome,
    GamePhase,
    GameStatus,
    IntegrityError,
    Player,
    PlayerId,
    PolicyCard,
    Role,
    Room,
    RoomRecord,
    SyndicatePower,
    Team,
    VoteChoice,
    WinReason,
};
pub use store::{update_room, MemoryStore, RoomStore, VersionedRoom, MAX_COMMIT_ATTEMPTS};
