//! Name normalization.
//!
//! Every surface form of a location name is reduced to a *normalization key*
//! before any comparison, dedup, or lookup happens. The key is the location's
//! identity everywhere downstream (aggregate ids, coordinate ids, containment
//! edges).

/// Normalize a raw extracted name into its key form.
///
/// Strips square brackets anywhere in the string (the extraction stage
/// sometimes wraps names in them), trims surrounding whitespace, and
/// lowercases. Pure and total; idempotent by construction.
pub fn normalize(raw: &str) -> String {
    raw.replace(['[', ']'], "").trim().to_lowercase()
}

/// Convert a normalized (lowercase) key to title case for display.
///
/// Uppercases the first character of every whitespace-separated word and
/// rejoins with single spaces. This does not attempt to recover any original
/// casing; it is presentation only. An empty key yields an empty name.
pub fn to_display_name(key: &str) -> String {
    key.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_brackets_whitespace_and_case() {
        assert_eq!(normalize("Liscor"), "liscor");
        assert_eq!(normalize("  The Wandering Inn  "), "the wandering inn");
        assert_eq!(normalize("IZRIL"), "izril");
        assert_eq!(normalize("[Garden of Sanctuary]"), "garden of sanctuary");
        assert_eq!(normalize("[Foo]"), "foo");
        assert_eq!(normalize("no brackets"), "no brackets");
        assert_eq!(normalize("  [Liscor]  "), normalize("LISCOR"));
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["[The High Passes]", "  Pallass ", "a'ctelios salash"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn display_name_title_cases_each_word() {
        assert_eq!(to_display_name("liscor"), "Liscor");
        assert_eq!(to_display_name("the wandering inn"), "The Wandering Inn");
        assert_eq!(to_display_name("garden of sanctuary"), "Garden Of Sanctuary");
        assert_eq!(to_display_name("a'ctelios salash"), "A'ctelios Salash");
        assert_eq!(to_display_name("blood fields"), "Blood Fields");
        assert_eq!(to_display_name(""), "");
    }
}
