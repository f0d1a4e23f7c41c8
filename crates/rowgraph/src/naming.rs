//! Column-name candidates for a field.

use std::collections::BTreeSet;

/// Converts an identifier to snake_case, treating acronyms as single words
/// (`JSONData` -> `json_data`, `userID` -> `user_id`). Spaces and dashes become
/// underscores.
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.trim_matches(' ').chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        let case_changes = chars.get(i + 1).is_some_and(|&next| {
            (c.is_ascii_uppercase() && next.is_ascii_lowercase())
                || (c.is_ascii_lowercase() && next.is_ascii_uppercase())
        });
        if i > 0 && !out.ends_with('_') && case_changes {
            if c.is_ascii_uppercase() {
                out.push('_');
                out.push(c);
            } else {
                out.push(c);
                out.push('_');
            }
        } else if c == ' ' || c == '-' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out.to_lowercase()
}

/// All column names that map onto `field` of an entity reached through
/// `ancestors` (outermost first).
///
/// The base spellings are the name itself, its lower case and its snake_case.
/// Each ancestor, nearest first, is then prepended to every spelling produced
/// by the previous step, so `blog.author.name` also answers to `author_name`
/// and `blog_author_name`.
pub fn column_candidates(field: &str, ancestors: &[String]) -> BTreeSet<String> {
    let mut frontier: BTreeSet<String> = [field.to_string(), field.to_lowercase(), to_snake_case(field)]
        .into_iter()
        .collect();
    let mut candidates = frontier.clone();

    for ancestor in ancestors.iter().rev() {
        let prefixes: BTreeSet<String> = [
            ancestor.clone(),
            ancestor.to_lowercase(),
            to_snake_case(ancestor),
        ]
        .into_iter()
        .collect();

        let mut next = BTreeSet::new();
        for prefix in &prefixes {
            for suffix in &frontier {
                let joined = format!("{prefix}_{suffix}");
                next.insert(joined.to_lowercase());
                next.insert(joined);
            }
        }
        candidates.extend(next.iter().cloned());
        frontier = next;
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_handles_acronyms() {
        assert_eq!(to_snake_case("BlogId"), "blog_id");
        assert_eq!(to_snake_case("JSONData"), "json_data");
        assert_eq!(to_snake_case("userID"), "user_id");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("post-body text"), "post_body_text");
        assert_eq!(to_snake_case(" Title "), "title");
    }

    #[test]
    fn root_fields_have_base_spellings_only() {
        let c = column_candidates("BlogTitle", &[]);
        let expected: BTreeSet<String> = ["BlogTitle", "blogtitle", "blog_title"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(c, expected);
    }

    #[test]
    fn ancestors_prefix_nearest_first() {
        let ancestors = vec!["posts".to_string(), "Comments".to_string()];
        let c = column_candidates("id", &ancestors);
        assert!(c.contains("id"));
        assert!(c.contains("comments_id"));
        assert!(c.contains("Comments_id"));
        assert!(c.contains("posts_comments_id"));
        assert!(!c.contains("posts_id"));
    }
}
