use std::collections::HashSet;

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect, Select};

/// Lowercase ASCII slug. Accented latin letters fold to their base letter,
/// every other run of non-alphanumerics collapses into one `-`. May be empty.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        let ch = fold_accent(ch);
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// `slugify`, falling back to `fallback` when nothing survives.
pub fn base_slug(input: &str, fallback: &str) -> String {
    let slug = slugify(input);
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

/// Lowercase with accented latin letters folded, for case and accent
/// insensitive matching. SQLite's `LOWER` and `LIKE` only fold ASCII.
pub fn fold_search(input: &str) -> String {
    input
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_accent)
        .collect()
}

/// Stored search column of a post.
pub fn search_text(title: &str, body: &str) -> String {
    format!("{}\n{}", fold_search(title), fold_search(body))
}

fn fold_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

/// `base` if free, otherwise the first of `base-2`, `base-3`, ... not in `taken`.
pub fn first_free(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Picks a free slug for `base` among the rows selected by `scope`. Callers
/// exclude the row being renamed from `scope` so it doesn't collide with
/// itself.
pub async fn unique_slug<E, C>(
    conn: &C,
    scope: Select<E>,
    slug_column: E::Column,
    base: &str,
) -> Result<String, DbErr>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let taken: HashSet<String> = scope
        .select_only()
        .column(slug_column)
        .filter(slug_column.starts_with(base))
        .into_tuple::<String>()
        .all(conn)
        .await?
        .into_iter()
        .collect();

    Ok(first_free(base, &taken))
}
