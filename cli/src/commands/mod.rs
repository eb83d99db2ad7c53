//! CLI subcommands.

pub mod list;
pub mod run;
pub mod stop;
pub mod ui;

/// Shorten `s` to at most `max` characters.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("vite", 10), "vite");
        assert_eq!(truncate("npm run dev -- --port 5173", 10), "npm run d…");
        assert_eq!(truncate("héllo wörld", 4), "hél…");
    }
}
