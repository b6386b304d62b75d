/// Minimum community name length.
pub const MIN_COMMUNITY_NAME_LENGTH: usize = 3;

/// Maximum community name length.
pub const MAX_COMMUNITY_NAME_LENGTH: usize = 21;

/// Maximum post title length.
pub const MAX_TITLE_LENGTH: usize = 300;

/// Maximum post body length (bytes).
pub const MAX_BODY_LENGTH: usize = 40_000;

/// Characters a community name may not contain.
const FORBIDDEN_NAME_CHARS: &str = " `!@#$%^&*()_+-=[]{};':\"\\|,.<>/?~";

/// Validate a community name. Must be 3-21 characters with no spaces or
/// punctuation; the name becomes the community's permanent identifier.
pub fn validate_community_name(name: &str) -> Result<(), String> {
    let len = name.chars().count();
    let has_special = name
        .chars()
        .any(|c| FORBIDDEN_NAME_CHARS.contains(c) || c.is_whitespace() || c.is_control());
    if has_special || !(MIN_COMMUNITY_NAME_LENGTH..=MAX_COMMUNITY_NAME_LENGTH).contains(&len) {
        return Err(format!(
            "Community name should be {}-{} characters long and should not contain special characters.",
            MIN_COMMUNITY_NAME_LENGTH, MAX_COMMUNITY_NAME_LENGTH
        ));
    }
    Ok(())
}

/// Validate a post title. Must be non-blank and under the length limit.
pub fn validate_post_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Post title cannot be empty".into());
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(format!(
            "Post title too long (max {} characters)",
            MAX_TITLE_LENGTH
        ));
    }
    Ok(())
}

/// Validate a post body. May be empty (title-only posts).
pub fn validate_post_body(body: &str) -> Result<(), String> {
    if body.len() > MAX_BODY_LENGTH {
        return Err(format!(
            "Post body too long (max {} characters)",
            MAX_BODY_LENGTH
        ));
    }
    Ok(())
}

/// Validate a vote value: +1 (up) or -1 (down).
pub fn validate_vote_value(value: i64) -> Result<(), String> {
    if value != 1 && value != -1 {
        return Err("Vote must be 1 or -1".into());
    }
    Ok(())
}
