//! Template-based query building.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::{BuiltQuery, QueryTemplates, SearchContext};

static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("valid bracket pattern"));

static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid year pattern"));

/// Builds search strings from a [`SearchContext`].
///
/// Stateless apart from its templates: identical inputs always give
/// identical queries.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    templates: QueryTemplates,
}

impl QueryBuilder {
    pub fn new(templates: QueryTemplates) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &QueryTemplates {
        &self.templates
    }

    /// Build the primary query and the ordered fallbacks.
    pub fn build(&self, context: &SearchContext) -> BuiltQuery {
        let exclusions = self.exclusions();
        let with_exclusions = |query: String| -> String {
            if exclusions.is_empty() || query.is_empty() {
                query
            } else {
                format!("{} {}", query, exclusions)
            }
        };

        let primary = render(self.templates.for_kind(context.kind), context);

        let mut seen = vec![primary.to_lowercase()];
        let mut fallbacks = Vec::new();
        for template in &self.templates.fallbacks {
            let rendered = render(template, context);
            if rendered.is_empty() {
                continue;
            }
            let key = rendered.to_lowercase();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            fallbacks.push(with_exclusions(rendered));
        }

        BuiltQuery {
            primary: with_exclusions(primary),
            fallbacks,
        }
    }

    /// Exclude terms as a `-a -b` suffix (lowercased, deduplicated).
    fn exclusions(&self) -> String {
        let mut terms: Vec<String> = Vec::new();
        for term in &self.templates.exclude_terms {
            let cleaned: String = term
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .trim_start_matches('-')
                .to_lowercase();
            if !cleaned.is_empty() && !terms.contains(&cleaned) {
                terms.push(cleaned);
            }
        }
        terms
            .iter()
            .map(|t| format!("-{}", t))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Fill placeholders, dropping those whose field is absent.
fn render(template: &str, context: &SearchContext) -> String {
    let year = context.year.map(|y| y.to_string());
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let value = match &after[..end] {
            "artist" => Some(context.artist.as_str()),
            "album" => context.album.as_deref(),
            "title" => context.title.as_deref(),
            "year" => year.as_deref(),
            // Unknown placeholders stay literal.
            _ => {
                out.push_str(&rest[start..start + end + 2]);
                rest = &after[end + 1..];
                continue;
            }
        };
        if let Some(value) = value {
            out.push_str(value.trim());
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    // Brackets left empty by dropped placeholders, e.g. "({year})".
    let out = out.replace("()", "").replace("[]", "");
    collapse_whitespace(&out)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip bracketed qualifiers, `-term` exclusions and years.
pub fn simplify(query: &str) -> String {
    let without_brackets = BRACKETED.replace_all(query, " ");
    let without_years = YEAR.replace_all(&without_brackets, " ");
    without_years
        .split_whitespace()
        .filter(|token| !(token.starts_with('-') && token.len() > 1))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Query to use for a given 1-based attempt number.
///
/// Attempt 1 always uses the primary. Later attempts walk the fallbacks,
/// reusing the primary once they run out, and simplify when enabled.
pub fn query_for_attempt(built: &BuiltQuery, attempt: u32, simplify_on_retry: bool) -> String {
    if attempt <= 1 {
        return built.primary.clone();
    }

    let base = built
        .fallbacks
        .get((attempt - 2) as usize)
        .unwrap_or(&built.primary);

    if simplify_on_retry {
        let simplified = simplify(base);
        if simplified.is_empty() {
            base.clone()
        } else {
            simplified
        }
    } else {
        base.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SearchKind;

    fn builder_with(fallbacks: &[&str], excludes: &[&str]) -> QueryBuilder {
        QueryBuilder::new(QueryTemplates {
            fallbacks: fallbacks.iter().map(|s| s.to_string()).collect(),
            exclude_terms: excludes.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn test_default_album_query() {
        let built = QueryBuilder::default().build(&SearchContext::album("Radiohead", "OK Computer"));
        assert_eq!(built.primary, "Radiohead OK Computer");
        assert!(built.fallbacks.is_empty());
    }

    #[test]
    fn test_default_track_and_artist_queries() {
        let builder = QueryBuilder::default();
        let track = builder.build(&SearchContext::track("Portishead", "Roads"));
        assert_eq!(track.primary, "Portishead Roads");

        let artist = builder.build(&SearchContext {
            artist: "Bjork".to_string(),
            album: None,
            title: None,
            year: None,
            kind: SearchKind::Artist,
        });
        assert_eq!(artist.primary, "Bjork");
    }

    #[test]
    fn test_absent_placeholders_are_dropped() {
        let builder = QueryBuilder::new(QueryTemplates {
            album: "{artist} {album} ({year})".to_string(),
            ..Default::default()
        });

        let without = builder.build(&SearchContext::album("Air", "Moon Safari"));
        assert_eq!(without.primary, "Air Moon Safari");

        let with = builder.build(&SearchContext::album("Air", "Moon Safari").with_year(1998));
        assert_eq!(with.primary, "Air Moon Safari (1998)");
    }

    #[test]
    fn test_fallbacks_rendered_in_order_and_deduplicated() {
        let builder = builder_with(&["{album}", "{ARTIST}", "{artist} {album}", "{title}"], &[]);
        let built = builder.build(&SearchContext::album("Air", "Moon Safari"));
        // "{artist} {album}" duplicates the primary; "{title}" renders empty;
        // "{ARTIST}" is an unknown placeholder and stays literal.
        assert_eq!(built.fallbacks, vec!["Moon Safari", "{ARTIST}"]);
    }

    #[test]
    fn test_fallback_dedup_is_case_insensitive() {
        let builder = builder_with(&["{artist} {album}", "{album}", "{album}"], &[]);
        let context = SearchContext::album("air", "air");
        let built = builder.build(&context);
        assert_eq!(built.primary, "air air");
        assert_eq!(built.fallbacks, vec!["air"]);
    }

    #[test]
    fn test_exclude_terms_appended() {
        let builder = builder_with(&["{album}"], &["Live", "live", "  karaoke ", "-remix", ""]);
        let built = builder.build(&SearchContext::album("Air", "Moon Safari"));
        assert_eq!(built.primary, "Air Moon Safari -live -karaoke -remix");
        assert_eq!(built.fallbacks, vec!["Moon Safari -live -karaoke -remix"]);
    }

    #[test]
    fn test_simplify() {
        assert_eq!(
            simplify("Artist Album (Deluxe Edition) [2011 Remaster] 1997 -live"),
            "Artist Album"
        );
        assert_eq!(simplify("Blink-182 Enema"), "Blink-182 Enema");
        assert_eq!(simplify("AC/DC - Back in Black"), "AC/DC - Back in Black");
        assert_eq!(simplify("Prince 1999"), "Prince");
        assert_eq!(simplify("Artist 12345"), "Artist 12345");
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = builder_with(&["{album}", "{artist}"], &["live"]);
        let context = SearchContext::album("Air", "Moon Safari").with_year(1998);
        assert_eq!(builder.build(&context), builder.build(&context));
    }

    #[test]
    fn test_query_for_attempt() {
        let built = BuiltQuery {
            primary: "Air Moon Safari (1998) -live".to_string(),
            fallbacks: vec!["Moon Safari [Remaster]".to_string()],
        };

        assert_eq!(query_for_attempt(&built, 1, true), built.primary);
        assert_eq!(query_for_attempt(&built, 2, true), "Moon Safari");
        assert_eq!(query_for_attempt(&built, 2, false), "Moon Safari [Remaster]");
        assert_eq!(query_for_attempt(&built, 3, true), "Air Moon Safari");
        assert_eq!(query_for_attempt(&built, 3, false), built.primary);
    }

    #[test]
    fn test_query_for_attempt_keeps_query_that_simplifies_to_nothing() {
        let built = BuiltQuery {
            primary: "1999".to_string(),
            fallbacks: vec![],
        };
        assert_eq!(query_for_attempt(&built, 2, true), "1999");
    }
}
