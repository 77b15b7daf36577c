//! YAML seed vocabulary import
//!
//! A seed document has the shape
//! ```yaml
//! topics:
//!   - { id: animals, name: Tiere, lang: en }
//! cards:
//!   - { id: c1, de: Hund, en: dog, lang: en, topic: animals }
//! ```
//! Records whose id already exists are left untouched.

use serde::Serialize;

use super::file_storage::FileRepository;
use super::models::Vocabulary;
use crate::training::repository::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub topics_added: usize,
    pub cards_added: usize,
    /// Already present or without an id
    pub skipped: usize,
}

/// Parse a seed document
pub fn parse_seed(yaml: &str) -> Result<Vocabulary> {
    if yaml.trim().is_empty() {
        return Ok(Vocabulary::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Merge `seed` into `target`
pub fn merge_seed(target: &mut Vocabulary, seed: Vocabulary) -> ImportCounts {
    let mut counts = ImportCounts::default();

    for topic in seed.topics {
        if topic.id.is_empty() {
            log::warn!("Skipping seed topic without id ({:?})", topic.name);
            counts.skipped += 1;
        } else if target.add_topic(topic) {
            counts.topics_added += 1;
        } else {
            counts.skipped += 1;
        }
    }

    for card in seed.cards {
        if card.id.is_empty() {
            log::warn!("Skipping seed card without id ({:?})", card.de);
            counts.skipped += 1;
        } else if target.add_card(card) {
            counts.cards_added += 1;
        } else {
            counts.skipped += 1;
        }
    }

    log::info!(
        "Seed import: {} topics, {} cards added, {} skipped",
        counts.topics_added,
        counts.cards_added,
        counts.skipped
    );
    counts
}

/// Import a seed document into the repository's vocabulary
pub fn import_seed(repo: &FileRepository, yaml: &str) -> Result<ImportCounts> {
    let seed = parse_seed(yaml)?;
    let mut vocab = repo.load_vocabulary()?;
    let counts = merge_seed(&mut vocab, seed);
    if counts.topics_added + counts.cards_added > 0 {
        repo.save_vocabulary(&vocab)?;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{Card, RepositoryError, VocabularyRepository};
    use tempfile::TempDir;

    const SEED: &str = r#"
topics:
  - id: animals
    name: Tiere
    lang: en
  - id: ""
    name: Broken
cards:
  - id: c1
    de: Hund
    en: dog
    topic: animals
    mnemonic: "d wie Dackel"
  - id: c2
    de: Katze
    en: cat
    lang: en
    topic: animals
  - id: ""
    de: Maus
    en: mouse
"#;

    #[test]
    fn test_parse_and_merge() {
        let seed = parse_seed(SEED).unwrap();
        assert_eq!(seed.cards[0].mnemonic, "d wie Dackel");
        assert_eq!(seed.cards[0].lang, "en");

        let mut vocab = Vocabulary::default();
        vocab.add_card(Card::new("c2", "Katze", "kitty", "en", "animals"));

        let counts = merge_seed(&mut vocab, seed);
        assert_eq!(counts.topics_added, 1);
        assert_eq!(counts.cards_added, 1);
        assert_eq!(counts.skipped, 3);
        // Existing ids are untouched
        assert_eq!(vocab.card("c2").unwrap().en, "kitty");
        assert_eq!(vocab.cards.len(), 2);
    }

    #[test]
    fn test_empty_document() {
        let seed = parse_seed("  \n").unwrap();
        assert!(seed.cards.is_empty());
        assert!(matches!(
            parse_seed("cards: [1, 2").unwrap_err(),
            RepositoryError::Yaml(_)
        ));
    }

    #[test]
    fn test_import_rejects_malformed_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileRepository::new(temp_dir.path().to_path_buf());

        let err = import_seed(&repo, "topics: {id: [").unwrap_err();
        assert!(matches!(err, RepositoryError::Yaml(_)));
        assert!(repo.list_cards().unwrap().is_empty());
    }

    #[test]
    fn test_import_into_file_repository_twice() {
        let temp_dir = TempDir::new().unwrap();
        let repo = FileRepository::new(temp_dir.path().to_path_buf());

        let first = import_seed(&repo, SEED).unwrap();
        assert_eq!(first.cards_added, 2);
        let second = import_seed(&repo, SEED).unwrap();
        assert_eq!(second.cards_added, 0);

        assert_eq!(repo.list_cards().unwrap().len(), 2);
        assert_eq!(repo.list_topics().unwrap()[0].name, "Tiere");
    }
}
