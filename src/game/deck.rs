use rand::seq::SliceRandom;
use rand::Rng;

use super::state::PolicyCard;

/// 牌库构成：11 张辛迪加 + 6 张情报局。
pub const SYNDICATE_POLICY_COUNT: usize = 11;
pub const AGENCY_POLICY_COUNT: usize = 6;

/// 抽牌结果。不可变风格：返回新的牌库与弃牌堆，调用方整体替换。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawOutcome {
    pub drawn: Vec<PolicyCard>,
    pub deck: Vec<PolicyCard>,
    pub discard: Vec<PolicyCard>,
}

/// 构建一副均匀洗过的政策牌库。Vec 末尾视作牌顶。
pub fn build_deck<R: Rng>(rng: &mut R) -> Vec<PolicyCard> {
    let mut deck = Vec::with_capacity(SYNDICATE_POLICY_COUNT + AGENCY_POLICY_COUNT);
    deck.extend(std::iter::repeat(PolicyCard::Syndicate).take(SYNDICATE_POLICY_COUNT));
    deck.extend(std::iter::repeat(PolicyCard::Agency).take(AGENCY_POLICY_COUNT));
    deck.shuffle(rng);
    deck
}

/// 从牌顶抽 `count` 张。牌库不足时先把弃牌堆洗回牌库；
/// 连弃牌堆都不够则返回 `None`，调用方必须整体放弃该操作。
pub fn draw<R: Rng>(
    deck: &[PolicyCard],
    discard: &[PolicyCard],
    count: usize,
    rng: &mut R,
) -> Option<DrawOutcome> {
    let mut working = deck.to_vec();
    let mut remaining_discard = discard.to_vec();

    if working.len() < count {
        working.append(&mut remaining_discard);
        working.shuffle(rng);
    }
    if working.len() < count {
        return None;
    }

    let drawn = working.split_off(working.len() - count);
    Some(DrawOutcome {
        drawn,
        deck: working,
        discard: remaining_discard,
    })
}

/// 弃一张牌。弃牌堆内部顺序无意义，只在回洗时整体回到牌库。
pub fn discard(pile: &mut Vec<PolicyCard>, card: PolicyCard) {
    pile.push(card);
}

/// 只读窥视牌顶 `count` 张（牌顶在前）。牌库不足时顺延到弃牌堆顶，
/// 不洗牌也不移动任何卡。
pub fn peek_top(deck: &[PolicyCard], discard: &[PolicyCard], count: usize) -> Vec<PolicyCard> {
    let mut peek: Vec<PolicyCard> = deck.iter().rev().take(count).copied().collect();
    if peek.len() < count {
        peek.extend(discard.iter().rev().take(count - peek.len()));
    }
    peek
}
