//! 通用工具（房间码、展示顺序、引擎错误上报）。

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::game::Player;

/// 去掉易混字符（I/O/0/1）的房间码字母表。
const ROOM_CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ROOM_CODE_LENGTH: usize = 6;

pub fn generate_room_code<R: Rng>(rng: &mut R) -> String {
    (0..ROOM_CODE_LENGTH)
        .map(|_| ROOM_CODE_CHARS[rng.gen_range(0..ROOM_CODE_CHARS.len())] as char)
        .collect()
}

/// 座位展示顺序：以房间 id 为种子的确定性洗牌，
/// 同一房间的所有客户端看到同一圈座位。
pub fn seeded_display_order(roster: &[Player], seed: &str) -> Vec<Player> {
    let seed_value = seed
        .bytes()
        .fold(0u64, |acc, byte| acc.wrapping_add(u64::from(byte)));
    let mut rng = SmallRng::seed_from_u64(seed_value);
    let mut ordered = roster.to_vec();
    ordered.shuffle(&mut rng);
    ordered
}

/// 引擎级的致命错误走控制台（牌库穿底、人数配置之类的不变量破坏）。
#[cfg(target_arch = "wasm32")]
pub fn report_engine_error(context: &str, detail: &str) {
    web_sys::console::error_1(&format!("[engine] {context}: {detail}").into());
}

#[cfg(not(target_arch = "wasm32"))]
pub fn report_engine_error(context: &str, detail: &str) {
    eprintln!("[engine] {context}: {detail}");
}
