use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::rules::{RuleEngine, RuleError, RuleResolution};
use super::state::{GameEvent, Player, Room, RoomRecord};

/// 写冲突重试上限，超过即放弃本次操作。
pub const MAX_COMMIT_ATTEMPTS: u32 = 8;

/// 带版本号的房间记录。版本号每次提交递增，用于比较交换。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionedRoom {
    pub version: u64,
    pub room: Room,
    pub roster: Vec<Player>,
}

/// 存储提供方的原子读写界面。实现方只需保证
/// `compare_and_store` 在版本号不匹配时拒绝写入。
pub trait RoomStore {
    fn load(&self, room_id: &str) -> Option<VersionedRoom>;
    fn compare_and_store(
        &self,
        room_id: &str,
        expected_version: u64,
        room: Room,
        roster: Vec<Player>,
    ) -> bool;
}

/// 事务门面：读取最新快照、在副本上执行纯操作、条件写回。
/// 写冲突时整体重来，处理器因此必须可重复执行且无外部副作用。
/// 操作返回错误时不产生任何写入。
pub fn update_room<S, F>(
    store: &S,
    engine: &mut RuleEngine,
    room_id: &str,
    op: F,
) -> Result<RuleResolution, RuleError>
where
    S: RoomStore,
    F: Fn(&mut RuleEngine, &mut Room, &mut Vec<Player>) -> Result<Vec<GameEvent>, RuleError>,
{
    for _ in 0..MAX_COMMIT_ATTEMPTS {
        let record = store.load(room_id).ok_or(RuleError::RoomNotFound)?;
        let mut room = record.room;
        let mut roster = record.roster;

        let events = op(engine, &mut room, &mut roster)?;

        if store.compare_and_store(room_id, record.version, room.clone(), roster.clone()) {
            return Ok(RuleResolution::new(room, roster, events));
        }
    }
    Err(RuleError::TransactionConflict {
        attempts: MAX_COMMIT_ATTEMPTS,
    })
}

/// 内存实现，供测试与本地预览使用。
#[derive(Default)]
pub struct MemoryStore {
    rooms: Mutex<HashMap<String, VersionedRoom>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: RoomRecord) {
        let mut rooms = self.lock_rooms();
        rooms.insert(
            record.room.id.clone(),
            VersionedRoom {
                version: 0,
                room: record.room,
                roster: record.roster,
            },
        );
    }

    fn lock_rooms(&self) -> std::sync::MutexGuard<'_, HashMap<String, VersionedRoom>> {
        match self.rooms.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl RoomStore for MemoryStore {
    fn load(&self, room_id: &str) -> Option<VersionedRoom> {
        self.lock_rooms().get(room_id).cloned()
    }

    fn compare_and_store(
        &self,
        room_id: &str,
        expected_version: u64,
        room: Room,
        roster: Vec<Player>,
    ) -> bool {
        let mut rooms = self.lock_rooms();
        match rooms.get_mut(room_id) {
            Some(record) if record.version == expected_version => {
                record.version += 1;
                record.room = room;
                record.roster = roster;
                true
            }
            _ => false,
        }
    }
}
