use serde::{Deserialize, Serialize};

use crate::training::{Card, Topic, TopicFilter};

/// Contents of `vocab.json`, also the shape of a YAML seed document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(default)]
    pub topics: Vec<Topic>,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl Vocabulary {
    pub fn topic(&self, topic_id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == topic_id)
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == card_id)
    }

    /// Add a topic unless its id is already taken. Returns whether it was added.
    pub fn add_topic(&mut self, topic: Topic) -> bool {
        if topic.id.is_empty() || self.topic(&topic.id).is_some() {
            return false;
        }
        self.topics.push(topic);
        true
    }

    /// Add a card unless its id is already taken. Returns whether it was added.
    pub fn add_card(&mut self, card: Card) -> bool {
        if card.id.is_empty() || self.card(&card.id).is_some() {
            return false;
        }
        self.cards.push(card);
        true
    }
}

/// Contents of `settings.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_filter: Option<TopicFilter>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_skips_duplicate_and_empty_ids() {
        let mut vocab = Vocabulary::default();
        assert!(vocab.add_card(Card::new("c1", "Hund", "dog", "en", "animals")));
        assert!(!vocab.add_card(Card::new("c1", "Katze", "cat", "en", "animals")));
        assert!(!vocab.add_card(Card::new("", "Maus", "mouse", "en", "animals")));

        assert_eq!(vocab.cards.len(), 1);
        assert_eq!(vocab.card("c1").unwrap().en, "dog");
    }
}
