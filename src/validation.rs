use rustrict::CensorStr;

/// Display-name length cap, matching the join form's maxlength.
pub const MAX_NAME_LEN: usize = 24;

/// Sanitize a requested display name: trim, collapse whitespace runs,
/// censor profanity, and cap the length. A name that ends up empty falls
/// back to `Player N` using the player's join sequence number.
pub fn sanitize_player_name(raw: &str, player_number: u32) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let censored: String = collapsed.censor();
    let capped: String = censored.chars().take(MAX_NAME_LEN).collect();
    let name = capped.trim().to_string();
    if name.is_empty() {
        format!("Player {}", player_number)
    } else {
        name
    }
}
