/// Removes URLs (`http://`, `https://`, `www.`) so link text does not feed the scorer.
/// Whitespace between the remaining tokens is collapsed to single spaces.
pub fn strip_urls(text: &str) -> String {
    text.split_whitespace()
        .filter(|token| !is_url(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_url(token: &str) -> bool {
    let lower = token
        .trim_start_matches(|c: char| matches!(c, '(' | '[' | '"' | '\''))
        .to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.")
}
