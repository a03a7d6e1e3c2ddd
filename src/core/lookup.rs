//! Fuzzy resolution of short names to child keys.
//!
//! A key is matched in four tiers, stopping at the first tier that yields
//! anything:
//!
//! 1. exact, case-sensitive
//! 2. exact, case-insensitive
//! 3. fuzzy (extension stripped, basename, basename without extension,
//!    identifier form), case-sensitive
//! 4. the same fuzzy forms, case-insensitive
//!
//! Matches are counted by distinct key, so a stacked group of same-key
//! children resolves as one. More than one distinct key is ambiguous.

use crate::util::{basename, make_key, normalize_separators, split_extension, Error, Result};

#[derive(Clone, Copy)]
enum Tier {
    Exact,
    Fuzzy,
}

/// Resolve `query` against child keys. Returns the indices of the matched group.
pub(crate) fn resolve(keys: &[String], query: &str) -> Result<Vec<usize>> {
    let query = normalize_separators(query);
    let normalized: Vec<String> = keys.iter().map(|k| normalize_separators(k)).collect();

    for (tier, fold) in [
        (Tier::Exact, false),
        (Tier::Exact, true),
        (Tier::Fuzzy, false),
        (Tier::Fuzzy, true),
    ] {
        let hits: Vec<usize> = normalized
            .iter()
            .enumerate()
            .filter(|(_, key)| matches(tier, key, &query, fold))
            .map(|(i, _)| i)
            .collect();

        let mut distinct: Vec<&str> = hits.iter().map(|&i| keys[i].as_str()).collect();
        distinct.sort_unstable();
        distinct.dedup();

        match distinct.len() {
            0 => continue,
            1 => return Ok(hits),
            _ => {
                return Err(Error::Ambiguous {
                    key: query,
                    candidates: distinct.into_iter().map(String::from).collect(),
                })
            }
        }
    }
    Err(Error::NotFound(query))
}

fn matches(tier: Tier, key: &str, query: &str, fold: bool) -> bool {
    let eq = |a: &str| {
        if fold {
            a.to_lowercase() == query.to_lowercase()
        } else {
            a == query
        }
    };

    match tier {
        Tier::Exact => eq(key),
        Tier::Fuzzy => {
            let (stem, _) = split_extension(key);
            let base = basename(key);
            let (base_stem, _) = split_extension(base);
            eq(stem) || eq(base) || eq(base_stem) || eq(&make_key(key)) || eq(&make_key(base))
        }
    }
}
