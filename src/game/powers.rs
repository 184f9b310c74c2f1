use super::state::SyndicatePower;

/// 权力解锁顺序（阈值严格递增）。
pub const POWER_ORDER: [SyndicatePower; 4] = [
    SyndicatePower::Investigate,
    SyndicatePower::Surveillance,
    SyndicatePower::SpecialElection,
    SyndicatePower::Purge,
];

/// 人数达到该值时全部阈值顺延一张（大局延迟表）。
const LARGE_GROUP_THRESHOLD: usize = 7;

/// 每个权力对应的已颁布辛迪加政策数阈值。
pub fn thresholds(player_count: usize) -> [(SyndicatePower, u8); 4] {
    let base: u8 = if player_count >= LARGE_GROUP_THRESHOLD {
        2
    } else {
        1
    };
    [
        (SyndicatePower::Investigate, base),
        (SyndicatePower::Surveillance, base + 1),
        (SyndicatePower::SpecialElection, base + 2),
        (SyndicatePower::Purge, base + 3),
    ]
}

pub fn threshold_for(power: SyndicatePower, player_count: usize) -> u8 {
    thresholds(player_count)
        .iter()
        .find(|(candidate, _)| *candidate == power)
        .map(|(_, threshold)| *threshold)
        .unwrap_or(u8::MAX)
}

/// 阈值已达到且尚未使用的权力，按阈值升序排列。
/// 引擎总是先结算排在最前的那一个。
pub fn pending_powers(
    enacted: u8,
    resolved: &[SyndicatePower],
    player_count: usize,
) -> Vec<SyndicatePower> {
    thresholds(player_count)
        .iter()
        .filter(|(power, threshold)| *threshold <= enacted && !resolved.contains(power))
        .map(|(power, _)| *power)
        .collect()
}
