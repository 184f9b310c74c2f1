pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use game::{
    GameEvent, GameOutcome, GamePhase, GameStatus, IntegrityError, MemoryStore, Player, PlayerId,
    PolicyCard, Role, RoleAssignment, RoleError, Room, RoomRecord, RoomStore, RuleEngine,
    RuleError, RuleResolution, SyndicatePower, Team, VersionedRoom, VoteChoice, WinReason,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    // 牌库穿底与人数配置错误属于不变量破坏，额外上报控制台
    if matches!(
        error,
        RuleError::InsufficientCards { .. } | RuleError::ConfigurationError { .. }
    ) {
        utils::report_engine_error("operation aborted", &format!("{error:?}"));
    }
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution(room: Room, roster: Vec<Player>, events: Vec<GameEvent>) -> RuleResolution {
    RuleResolution::new(room, roster, events)
}

fn resolution_from_events(
    room: &Room,
    roster: &[Player],
    events: Vec<GameEvent>,
) -> RuleResolution {
    RuleResolution::new(room.clone(), roster.to_vec(), events)
}

fn make_resolution_json(resolution: RuleResolution) -> Result<String, JsValue> {
    serde_json::to_string(&resolution).map_err(serde_to_js_error)
}

fn execute_with_engine<F>(
    room: &mut Room,
    roster: &mut Vec<Player>,
    action: F,
) -> Result<Vec<GameEvent>, JsValue>
where
    F: FnOnce(&mut RuleEngine, &mut Room, &mut Vec<Player>) -> Result<Vec<GameEvent>, RuleError>,
{
    let mut engine = RuleEngine::new();
    action(&mut engine, room, roster).map_err(to_js_error)
}

/// 持有一份房间快照的引擎封装。前端既可以用它在本地推演，
/// 也可以把单个操作函数放进外部存储的事务回调里执行。
#[wasm_bindgen]
pub struct RoomEngine {
    room: Room,
    roster: Vec<Player>,
}

#[wasm_bindgen]
impl RoomEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(
        room_json: Option<String>,
        roster_json: Option<String>,
    ) -> Result<RoomEngine, JsValue> {
        let sample = RoomRecord::sample();
        let room = match room_json {
            Some(json) => serde_json::from_str(&json).map_err(serde_to_js_error)?,
            None => sample.room,
        };
        let roster = match roster_json {
            Some(json) => serde_json::from_str(&json).map_err(serde_to_js_error)?,
            None => sample.roster,
        };
        Ok(RoomEngine { room, roster })
    }

    pub fn room_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.room).map_err(serde_to_js_error)
    }

    pub fn roster_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.roster).map_err(serde_to_js_error)
    }

    pub fn set_room_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.room = serde_json::from_str(json).map_err(serde_to_js_error)?;
        Ok(())
    }

    pub fn set_roster_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.roster = serde_json::from_str(json).map_err(serde_to_js_error)?;
        Ok(())
    }

    pub fn start_game(&mut self, owner_id: &str) -> Result<String, JsValue> {
        let events = execute_with_engine(&mut self.room, &mut self.roster, |engine, room, roster| {
            engine.start_game(room, roster, owner_id)
        })?;
        make_resolution_json(resolution_from_events(&self.room, &self.roster, events))
    }

    pub fn nominate_deputy(&mut self, actor_id: &str, deputy_id: &str) -> Result<String, JsValue> {
        let events = execute_with_engine(&mut self.room, &mut self.roster, |engine, room, roster| {
            engine.nominate_deputy(room, roster, actor_id, deputy_id)
        })?;
        make_resolution_json(resolution_from_events(&self.room, &self.roster, events))
    }

    pub fn submit_vote(&mut self, actor_id: &str, choice: &str) -> Result<String, JsValue> {
        let choice =
            VoteChoice::from_str(choice).map_err(|_| JsValue::from_str("unknown vote choice"))?;
        let events = execute_with_engine(&mut self.room, &mut self.roster, |engine, room, roster| {
            engine.submit_vote(room, roster, actor_id, choice)
        })?;
        make_resolution_json(resolution_from_events(&self.room, &self.roster, events))
    }

    pub fn draw_policies(&mut self, actor_id: &str) -> Result<String, JsValue> {
        let events = execute_with_engine(&mut self.room, &mut self.roster, |engine, room, roster| {
            engine.draw_policies(room, roster, actor_id)
        })?;
        make_resolution_json(resolution_from_events(&self.room, &self.roster, events))
    }

    pub fn director_discard(&mut self, actor_id: &str, card_index: usize) -> Result<String, JsValue> {
        let events = execute_with_engine(&mut self.room, &mut self.roster, |engine, room, roster| {
            engine.director_discard(room, roster, actor_id, card_index)
        })?;
        make_resolution_json(resolution_from_events(&self.room, &self.roster, events))
    }

    pub fn deputy_enact(&mut self, actor_id: &str, card_index: usize) -> Result<String, JsValue> {
        let events = execute_with_engine(&mut self.room, &mut self.roster, |engine, room, roster| {
            engine.deputy_enact(room, roster, actor_id, card_index)
        })?;
        make_resolution_json(resolution_from_events(&self.room, &self.roster, events))
    }

    pub fn auto_enact(&mut self, actor_id: &str) -> Result<String, JsValue> {
        let events = execute_with_engine(&mut self.room, &mut self.roster, |engine, room, roster| {
            engine.auto_enact(room, roster, actor_id)
        })?;
        make_resolution_json(resolution_from_events(&self.room, &self.roster, events))
    }

    pub fn resolve_power(
        &mut self,
        actor_id: &str,
        power: &str,
        target_id: Option<String>,
    ) -> Result<String, JsValue> {
        let power =
            SyndicatePower::from_str(power).map_err(|_| JsValue::from_str("unknown power"))?;
        let events = execute_with_engine(&mut self.room, &mut self.roster, |engine, room, roster| {
            engine.resolve_power(room, roster, actor_id, power, target_id.as_deref())
        })?;
        make_resolution_json(resolution_from_events(&self.room, &self.roster, events))
    }

    pub fn toggle_alive(&mut self, actor_id: &str, player_id: &str) -> Result<String, JsValue> {
        let events = execute_with_engine(&mut self.room, &mut self.roster, |engine, room, roster| {
            engine.toggle_alive(room, roster, actor_id, player_id)
        })?;
        make_resolution_json(resolution_from_events(&self.room, &self.roster, events))
    }

    pub fn end_game(&mut self, actor_id: &str) -> Result<String, JsValue> {
        let events = execute_with_engine(&mut self.room, &mut self.roster, |engine, room, roster| {
            engine.end_game(room, roster, actor_id)
        })?;
        make_resolution_json(resolution_from_events(&self.room, &self.roster, events))
    }
}

/// 创建一个新的大厅房间（房间码即席生成）。
#[wasm_bindgen(js_name = "createRoom")]
pub fn create_room(id: &str, owner_id: &str) -> Result<JsValue, JsValue> {
    let code = utils::generate_room_code(&mut SmallRng::from_entropy());
    to_value(&Room::create(id, code, owner_id)).map_err(JsValue::from)
}

/// 返回一个已开局的示例房间记录，方便前端调试或初始化。
#[wasm_bindgen(js_name = "sampleRoomRecord")]
pub fn sample_room_record() -> Result<JsValue, JsValue> {
    to_value(&RoomRecord::sample()).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "buildPolicyDeck")]
pub fn build_policy_deck() -> Result<JsValue, JsValue> {
    to_value(&game::deck::build_deck(&mut SmallRng::from_entropy())).map_err(JsValue::from)
}

/// 为整个名单做开局角色分配（纯函数，可放进外部事务）。
#[wasm_bindgen(js_name = "assignRoles")]
pub fn assign_roles(roster: JsValue) -> Result<JsValue, JsValue> {
    let roster: Vec<Player> = from_value(roster).map_err(JsValue::from)?;
    let assignments = game::roles::assign(&roster, &mut SmallRng::from_entropy())
        .map_err(|error| {
            to_value(&error).unwrap_or_else(|serialize_err| {
                JsValue::from_str(&serialize_err.to_string())
            })
        })?;
    to_value(&assignments).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "submitVote")]
pub fn submit_vote(
    room: JsValue,
    roster: JsValue,
    player_id: &str,
    choice: &str,
) -> Result<JsValue, JsValue> {
    let mut room: Room = from_value(room).map_err(JsValue::from)?;
    let mut roster: Vec<Player> = from_value(roster).map_err(JsValue::from)?;
    let choice =
        VoteChoice::from_str(choice).map_err(|_| JsValue::from_str("unknown vote choice"))?;
    let mut engine = RuleEngine::new();
    match engine.submit_vote(&mut room, &mut roster, player_id, choice) {
        Ok(events) => to_value(&make_resolution(room, roster, events)).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "deputyEnact")]
pub fn deputy_enact(
    room: JsValue,
    roster: JsValue,
    player_id: &str,
    card_index: usize,
) -> Result<JsValue, JsValue> {
    let mut room: Room = from_value(room).map_err(JsValue::from)?;
    let mut roster: Vec<Player> = from_value(roster).map_err(JsValue::from)?;
    let mut engine = RuleEngine::new();
    match engine.deputy_enact(&mut room, &mut roster, player_id, card_index) {
        Ok(events) => to_value(&make_resolution(room, roster, events)).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "validateRoom")]
pub fn validate_room(room: JsValue, roster: JsValue) -> Result<(), JsValue> {
    let room: Room = from_value(room).map_err(JsValue::from)?;
    let roster: Vec<Player> = from_value(roster).map_err(JsValue::from)?;
    room.integrity_check(&roster)
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(())
}

/// 房间内统一的座位展示顺序（以房间 id 为种子）。
#[wasm_bindgen(js_name = "displayOrder")]
pub fn display_order(roster: JsValue, seed: &str) -> Result<JsValue, JsValue> {
    let roster: Vec<Player> = from_value(roster).map_err(JsValue::from)?;
    to_value(&utils::seeded_display_order(&roster, seed)).map_err(JsValue::from)
}

/// 延迟触发自动颁布（给揭示动画留出时间）。
#[wasm_bindgen(js_name = "autoEnactAfter")]
pub fn auto_enact_after(
    room: JsValue,
    roster: JsValue,
    actor_id: String,
    delay_ms: Option<u32>,
) -> Promise {
    let delay = delay_ms.unwrap_or(0);

    future_to_promise(async move {
        if delay > 0 {
            TimeoutFuture::new(delay).await;
        }
        let mut room: Room = from_value(room).map_err(JsValue::from)?;
        let mut roster: Vec<Player> = from_value(roster).map_err(JsValue::from)?;
        let mut engine = RuleEngine::new();
        match engine.auto_enact(&mut room, &mut roster, &actor_id) {
            Ok(events) => to_value(&make_resolution(room, roster, events)).map_err(JsValue::from),
            Err(error) => Err(to_js_error(error)),
        }
    })
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
