//! Subject catalog and the rotation policy that picks the next subject.

use crate::store::{Table, TableStore};
use crate::{logi, logw};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const FALLBACK_NAME: &str = "Apple";

/// Decorative word written in front of subjects in the ledger ("Glass Mango").
pub const SUBJECT_PREFIX: &str = "Glass";

pub const CATALOG_HEADER: &[&str] = &["Fruit_Name", "Category", "Visual_Appeal_Score"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub category: String,
    pub appeal_score: u32,
}

impl Candidate {
    pub fn new(name: impl Into<String>, category: impl Into<String>, appeal_score: u32) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            appeal_score,
        }
    }

    pub fn normalized(&self) -> String {
        normalize_name(&self.name)
    }
}

pub fn fallback_candidate() -> Candidate {
    Candidate::new(FALLBACK_NAME, "Common", 0)
}

/// Comparison key for subjects: lower-cased with the decorative prefix removed.
pub fn normalize_name(name: &str) -> String {
    let prefix = SUBJECT_PREFIX.to_lowercase();
    let mut rest = name.trim().to_lowercase();
    loop {
        let stripped = rest
            .strip_prefix(&prefix)
            .filter(|tail| tail.starts_with(char::is_whitespace))
            .map(|tail| tail.trim_start().to_string());
        match stripped {
            Some(tail) if !tail.is_empty() => rest = tail,
            _ => return rest,
        }
    }
}

/// Picks the highest scoring candidate not in `recent_names`.
///
/// When every candidate is recent the whole catalog is eligible again, and an
/// empty catalog yields [`fallback_candidate`]. Ties go to the candidate that
/// appears first in `catalog`.
pub fn select_candidate(catalog: &[Candidate], recent_names: &HashSet<String>) -> Candidate {
    let eligible: Vec<&Candidate> = catalog
        .iter()
        .filter(|c| !recent_names.contains(&c.normalized()))
        .collect();

    let pool: Vec<&Candidate> = if eligible.is_empty() {
        catalog.iter().collect()
    } else {
        eligible
    };

    let mut best: Option<&Candidate> = None;
    for candidate in pool {
        match best {
            Some(b) if b.appeal_score >= candidate.appeal_score => {}
            _ => best = Some(candidate),
        }
    }

    best.cloned().unwrap_or_else(fallback_candidate)
}

/// Parses catalog rows, locating columns by header name.
pub fn load_catalog(table: &Table) -> Vec<Candidate> {
    let name_col = table.column(&["Fruit_Name", "Name"]);
    let category_col = table.column(&["Category"]);
    let score_col = table.column(&["Visual_Appeal_Score", "Appeal_Score"]);

    if name_col.is_none() {
        logw("Catalog has no Fruit_Name column; treating as empty");
        return Vec::new();
    }

    let mut out = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let name = Table::cell(row, name_col).trim();
        if name.is_empty() {
            continue;
        }
        let raw_score = Table::cell(row, score_col).trim();
        let appeal_score = match parse_score(raw_score) {
            Some(score) => score,
            None => {
                logw(format!("Bad appeal score '{}' for {}; using 0", raw_score, name));
                0
            }
        };
        out.push(Candidate::new(
            name,
            Table::cell(row, category_col).trim(),
            appeal_score,
        ));
    }
    out
}

fn parse_score(raw: &str) -> Option<u32> {
    if raw.is_empty() {
        return Some(0);
    }
    if let Ok(v) = raw.parse::<u32>() {
        return Some(v);
    }
    // Spreadsheets sometimes hand back "9.0".
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.trunc() as u32)
}

/// Reads the catalog; any storage failure degrades to an empty catalog.
pub async fn load_catalog_from(store: &dyn TableStore) -> Vec<Candidate> {
    match store.read_table().await {
        Ok(table) => {
            let catalog = load_catalog(&table);
            logi(format!("Loaded {} candidates from {}", catalog.len(), store.name()));
            catalog
        }
        Err(err) => {
            logw(format!("Catalog read failed ({}): {}; using empty catalog", store.name(), err));
            Vec::new()
        }
    }
}

/// The default fruit list used when provisioning a fresh catalog.
pub fn default_catalog() -> Vec<Candidate> {
    [
        ("Apple", "Common", 9),
        ("Orange", "Citrus", 8),
        ("Strawberry", "Berry", 10),
        ("Banana", "Tropical", 7),
        ("Grape", "Berry", 9),
        ("Kiwi", "Exotic", 8),
        ("Mango", "Tropical", 10),
        ("Pineapple", "Tropical", 9),
        ("Watermelon", "Melon", 8),
        ("Peach", "Stone", 9),
        ("Pear", "Common", 8),
        ("Cherry", "Berry", 10),
        ("Plum", "Stone", 8),
        ("Lemon", "Citrus", 7),
        ("Lime", "Citrus", 7),
        ("Dragon Fruit", "Exotic", 10),
        ("Passion Fruit", "Exotic", 8),
        ("Pomegranate", "Exotic", 9),
        ("Fig", "Exotic", 7),
        ("Blueberry", "Berry", 8),
    ]
    .into_iter()
    .map(|(n, c, s)| Candidate::new(n, c, s))
    .collect()
}
