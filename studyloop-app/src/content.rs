use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Result};
use serde::Deserialize;
use uuid::Uuid;

use studyloop_core::{CardId, Flashcard, ListId, UserId};

/// Stable list id derived from the list name, so the same list maps to
/// the same progress rows across runs.
pub fn list_id_from_name(name: &str) -> ListId {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("studyloop:list:{name}").as_bytes())
}

/// Stable profile id derived from the profile name.
pub fn profile_id(name: &str) -> UserId {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("studyloop:profile:{name}").as_bytes())
}

/// Stable card id derived from the card text, namespaced by the list
/// when one is known. Editing a card's text makes it a new card as far
/// as history goes.
pub fn derived_card_id(list: Option<ListId>, front: &str, back: &str) -> CardId {
    let ns = list.unwrap_or(Uuid::NAMESPACE_URL);
    // unit separator keeps "ab"+"c" apart from "a"+"bc"
    Uuid::new_v5(&ns, format!("{front}\u{1f}{back}").as_bytes())
}

/// A card as supplied by a list file or an API request.
#[derive(Debug, Clone, Deserialize)]
pub struct CardIn {
    #[serde(default)]
    pub id: Option<CardId>,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub variants: Vec<String>,
}

impl CardIn {
    pub fn into_flashcard(self, list: Option<ListId>) -> Flashcard {
        let id = self
            .id
            .unwrap_or_else(|| derived_card_id(list, &self.front, &self.back));
        Flashcard {
            id,
            front: self.front,
            back: self.back,
            hint: self.hint,
            variants: self.variants,
        }
    }
}

pub fn load_cards(path: &Path, list: ListId) -> Result<Vec<Flashcard>> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let cards = match ext.to_lowercase().as_str() {
        "json" => load_json(path)?,
        "csv" => load_csv(path)?,
        other => bail!("unsupported card file extension {other:?} (expected .json or .csv)"),
    };
    Ok(cards
        .into_iter()
        .map(|c| c.into_flashcard(Some(list)))
        .collect())
}

fn load_json(path: &Path) -> Result<Vec<CardIn>> {
    let data = std::fs::read_to_string(path)?;
    let cards: Vec<CardIn> = serde_json::from_str(&data)?;
    Ok(cards)
}

/// CSV columns: front, back, hint, variants (';'-separated). A header
/// row is expected and consumed.
fn load_csv(path: &Path) -> Result<Vec<CardIn>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let front = rec.get(0).unwrap_or("").to_string();
        if front.trim().is_empty() {
            continue;
        }
        let back = rec.get(1).unwrap_or("").to_string();
        let hint = rec.get(2).map(|s| s.to_string()).filter(|s| !s.is_empty());
        let variants = rec
            .get(3)
            .unwrap_or("")
            .split(';')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        out.push(CardIn { id: None, front, back, hint, variants });
    }
    Ok(out)
}

/// Starred file: one entry per line, either a card id or a card front.
pub fn load_starred(path: &Path, cards: &[Flashcard]) -> Result<HashSet<CardId>> {
    let data = std::fs::read_to_string(path)?;
    let mut ids = HashSet::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Ok(id) = Uuid::parse_str(line) {
            ids.insert(id);
            continue;
        }
        if let Some(c) = cards.iter().find(|c| c.front.eq_ignore_ascii_case(line)) {
            ids.insert(c.id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_are_stable() {
        let list = list_id_from_name("capitals");
        assert_eq!(list, list_id_from_name("capitals"));
        let a = derived_card_id(Some(list), "front", "back");
        assert_eq!(a, derived_card_id(Some(list), "front", "back"));
        assert_ne!(a, derived_card_id(Some(list), "front", "other"));
        assert_ne!(a, derived_card_id(None, "front", "back"));
    }

    #[test]
    fn boundary_shift_changes_the_id() {
        let list = list_id_from_name("capitals");
        assert_ne!(
            derived_card_id(Some(list), "ab", "c"),
            derived_card_id(Some(list), "a", "bc"),
        );
    }

    #[test]
    fn explicit_id_wins_over_derivation() {
        let id = Uuid::new_v4();
        let card = CardIn {
            id: Some(id),
            front: "f".into(),
            back: "b".into(),
            hint: None,
            variants: vec![],
        };
        assert_eq!(card.into_flashcard(None).id, id);
    }

    #[test]
    fn starred_lines_match_ids_and_fronts() {
        let list = list_id_from_name("capitals");
        let cards = vec![
            CardIn { id: None, front: "France".into(), back: "Paris".into(), hint: None, variants: vec![] }
                .into_flashcard(Some(list)),
            CardIn { id: None, front: "Peru".into(), back: "Lima".into(), hint: None, variants: vec![] }
                .into_flashcard(Some(list)),
        ];
        let dir = std::env::temp_dir();
        let path = dir.join(format!("starred-{}.txt", Uuid::new_v4()));
        std::fs::write(&path, format!("{}\nperu\nnot a card\n", cards[0].id)).unwrap();
        let ids = load_starred(&path, &cards).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&cards[0].id));
        assert!(ids.contains(&cards[1].id));
    }
}
