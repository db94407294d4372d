// Boards this crate has a BSP for; see `src/bsp`.
const BOARDS: &[&str] = &["k1x", "generic"];

fn main() {
    let boards: Vec<String> = std::env::vars()
        .filter_map(|(name, _)| {
            name.strip_prefix("CARGO_FEATURE_TARGET_BOARD_")
                .map(|suffix| suffix.to_ascii_lowercase().replace('_', "-"))
        })
        .collect();

    match boards.as_slice() {
        [_] => {}
        [] => panic!(
            "no board selected; enable one of: {}",
            feature_list(BOARDS.iter().copied())
        ),
        several => panic!(
            "only one board's TLV buffer can be built in, but {} are enabled",
            feature_list(several.iter().map(String::as_str))
        ),
    }
}

fn feature_list<'a>(boards: impl Iterator<Item = &'a str>) -> String {
    boards
        .map(|board| format!("target-board-{}", board))
        .collect::<Vec<_>>()
        .join(", ")
}
