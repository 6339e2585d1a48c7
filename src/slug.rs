use lazy_static::lazy_static;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;

/// URL-safe slug from a human-readable name: lowercase, non-alphanumeric
/// runs collapsed to single hyphens, trimmed.
pub fn slugify(input: &str) -> String {
    lazy_static! {
        static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
    }
    let lowered = input.to_lowercase();
    NON_ALNUM
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Slug with a short random suffix, for resolving uniqueness collisions.
pub fn with_suffix(base: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("{}-{}", base, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_hyphenates() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Press Release: Q3 2025  "), "press-release-q3-2025");
    }

    #[test]
    fn collapses_runs_and_trims_edges() {
        assert_eq!(slugify("--a///b--"), "a-b");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn suffix_preserves_base() {
        let slugged = with_suffix("my-post");
        assert!(slugged.starts_with("my-post-"));
        assert_eq!(slugged.len(), "my-post-".len() + 6);
    }
}
