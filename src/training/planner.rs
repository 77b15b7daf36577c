//! Session planning
//!
//! Turns a repository snapshot into the ordered drill list for one session.
//! Introduce sessions take never-seen cards of one focus topic in repository
//! order; review sessions draw from per-stage pools, favouring low stages,
//! then shuffle.

use std::collections::{BTreeMap, HashSet, VecDeque};

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use super::config::{StageWeights, TrainerConfig};
use super::models::{
    clamp_stage, Card, CardId, Direction, DrillItem, RepositorySnapshot, SessionMode, TopicFilter,
    TopicId, MAX_STAGE,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("No eligible cards for {mode} session ({direction})")]
    NoEligibleCards {
        mode: SessionMode,
        direction: Direction,
    },
}

/// What the caller asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub mode: SessionMode,
    pub direction: Direction,
    /// Restrict to one target language
    pub lang: Option<String>,
    /// Review only; empty means every topic
    pub topic_filter: TopicFilter,
    /// Introduce only: take new cards from this topic alone
    pub topic: Option<TopicId>,
}

impl PlanRequest {
    pub fn introduce(direction: Direction) -> Self {
        Self {
            mode: SessionMode::Introduce,
            direction,
            lang: None,
            topic_filter: TopicFilter::new(),
            topic: None,
        }
    }

    pub fn review(direction: Direction, topic_filter: TopicFilter) -> Self {
        Self {
            mode: SessionMode::Review,
            direction,
            lang: None,
            topic_filter,
            topic: None,
        }
    }

    pub fn with_lang(mut self, lang: Option<String>) -> Self {
        self.lang = lang;
        self
    }

    pub fn with_topic(mut self, topic: Option<TopicId>) -> Self {
        self.topic = topic;
        self
    }
}

/// The topic an introduce session works through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusTopic {
    pub topic: TopicId,
    /// Every card of the topic in the session's language
    pub cards: Vec<CardId>,
}

/// Planner output, fixed for the lifetime of the session
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub mode: SessionMode,
    pub direction: Direction,
    /// Introduce: the initial reveal batch. Review: the shuffled drill list.
    pub items: Vec<DrillItem>,
    /// Introduce only: further never-seen cards, unlocked one per 1→2 promotion
    pub reserve: VecDeque<Card>,
    pub focus: Option<FocusTopic>,
}

/// Keep only requested topics that have introduced cards.
///
/// An empty result means "no restriction", which is the same as selecting
/// every introduced topic.
pub fn restrict_topic_filter(requested: &TopicFilter, introduced: &TopicFilter) -> TopicFilter {
    let restricted: TopicFilter = requested.intersection(introduced).cloned().collect();
    if !requested.is_empty() && restricted.is_empty() {
        log::info!("Topic filter matches no introduced topic, reviewing all topics");
    }
    restricted
}

fn lang_matches(card: &Card, lang: Option<&str>) -> bool {
    lang.map_or(true, |lang| card.lang == lang)
}

/// Warn about progress entries whose card no longer exists
fn log_orphaned_progress(snapshot: &RepositorySnapshot, direction: Direction) -> usize {
    let mut orphaned = 0;
    for (card_id, entry_direction, _) in snapshot.progress.iter() {
        if entry_direction == direction && snapshot.card(card_id).is_none() {
            log::warn!(
                "Skipping progress entry for unknown card {} ({})",
                card_id,
                direction
            );
            orphaned += 1;
        }
    }
    orphaned
}

/// Cards never introduced in `direction`, in repository order
pub fn unseen_cards<'a>(
    snapshot: &'a RepositorySnapshot,
    direction: Direction,
    lang: Option<&'a str>,
) -> impl Iterator<Item = &'a Card> + 'a {
    snapshot.cards.iter().filter(move |card| {
        !card.id.is_empty()
            && lang_matches(card, lang)
            && !snapshot.progress.contains(&card.id, direction)
    })
}

/// The topic with the smallest share of introduced cards.
///
/// Fully introduced topics and cards without a topic are ignored; ties go to
/// the lowest topic id.
pub fn least_introduced_topic(
    snapshot: &RepositorySnapshot,
    direction: Direction,
    lang: Option<&str>,
) -> Option<TopicId> {
    let mut totals: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    let mut seen = HashSet::new();
    for card in &snapshot.cards {
        if card.id.is_empty() || card.topic.is_empty() || !lang_matches(card, lang) {
            continue;
        }
        if !seen.insert(card.id.as_str()) {
            continue;
        }
        let counts = totals.entry(card.topic.as_str()).or_default();
        counts.1 += 1;
        if snapshot.progress.contains(&card.id, direction) {
            counts.0 += 1;
        }
    }

    totals
        .into_iter()
        .filter(|(_, (done, total))| done < total)
        .min_by(|(_, (done_a, total_a)), (_, (done_b, total_b))| {
            (done_a * total_b).cmp(&(done_b * total_a))
        })
        .map(|(topic, _)| topic.to_string())
}

fn focus_topic(request: &PlanRequest, snapshot: &RepositorySnapshot) -> Option<FocusTopic> {
    let topic = request.topic.clone()?;
    let mut seen = HashSet::new();
    let cards = snapshot
        .cards
        .iter()
        .filter(|card| {
            !card.id.is_empty()
                && card.topic == topic
                && lang_matches(card, request.lang.as_deref())
        })
        .filter(|card| seen.insert(card.id.as_str()))
        .map(|card| card.id.clone())
        .collect();
    Some(FocusTopic { topic, cards })
}

/// Every never-seen card once, in repository order
fn introduce_pool(request: &PlanRequest, snapshot: &RepositorySnapshot) -> VecDeque<Card> {
    let mut seen = HashSet::new();
    unseen_cards(snapshot, request.direction, request.lang.as_deref())
        .filter(|card| request.topic.as_ref().map_or(true, |topic| card.topic == *topic))
        .filter(|card| seen.insert(card.id.clone()))
        .cloned()
        .collect()
}

/// Draw up to `cap` cards from the stage pools without replacement.
///
/// Each draw picks a stage with probability proportional to its weight among
/// the pools that still have cards, so an exhausted pool never contributes.
fn sample_pools<R: Rng>(
    pools: &mut [Vec<Card>],
    weights: &StageWeights,
    cap: usize,
    rng: &mut R,
) -> Vec<Card> {
    let mut picked = Vec::with_capacity(cap);
    while picked.len() < cap {
        let total: u32 = pools
            .iter()
            .enumerate()
            .filter(|(_, pool)| !pool.is_empty())
            .map(|(idx, _)| weights.weight(idx as u8 + 1))
            .sum();
        if total == 0 {
            break;
        }

        let mut roll = rng.gen_range(0..total);
        for (idx, pool) in pools.iter_mut().enumerate() {
            if pool.is_empty() {
                continue;
            }
            let weight = weights.weight(idx as u8 + 1);
            if roll < weight {
                if let Some(card) = pool.pop() {
                    picked.push(card);
                }
                break;
            }
            roll -= weight;
        }
    }
    picked
}

fn plan_review<R: Rng>(
    request: &PlanRequest,
    snapshot: &RepositorySnapshot,
    config: &TrainerConfig,
    rng: &mut R,
) -> Vec<DrillItem> {
    let mut pools: Vec<Vec<Card>> = vec![Vec::new(); MAX_STAGE as usize];
    let mut seen = HashSet::new();
    for card in &snapshot.cards {
        if card.id.is_empty() || !lang_matches(card, request.lang.as_deref()) {
            continue;
        }
        if !seen.insert(card.id.as_str()) {
            continue;
        }
        if !request.topic_filter.is_empty() && !request.topic_filter.contains(&card.topic) {
            continue;
        }
        if let Some(stage) = snapshot.progress.stage(&card.id, request.direction) {
            pools[clamp_stage(stage) as usize - 1].push(card.clone());
        }
    }
    for pool in pools.iter_mut() {
        pool.shuffle(rng);
    }

    let mut picked = sample_pools(
        &mut pools,
        &config.stage_weights,
        config.session_max_items,
        rng,
    );
    picked.shuffle(rng);

    picked
        .into_iter()
        .map(|card| DrillItem::new(card, request.direction, false))
        .collect()
}

/// Build the drill sequence for one session
pub fn plan<R: Rng>(
    request: &PlanRequest,
    snapshot: &RepositorySnapshot,
    config: &TrainerConfig,
    rng: &mut R,
) -> Result<SessionPlan, PlanError> {
    log_orphaned_progress(snapshot, request.direction);

    let (items, reserve) = match request.mode {
        SessionMode::Introduce => {
            let mut eligible = introduce_pool(request, snapshot);
            let batch = config.initial_reveal_count.min(eligible.len());
            let items: Vec<DrillItem> = eligible
                .drain(..batch)
                .map(|card| DrillItem::new(card, request.direction, true))
                .collect();
            (items, eligible)
        }
        SessionMode::Review => (
            plan_review(request, snapshot, config, rng),
            VecDeque::new(),
        ),
    };

    if items.is_empty() {
        return Err(PlanError::NoEligibleCards {
            mode: request.mode,
            direction: request.direction,
        });
    }

    let focus = match request.mode {
        SessionMode::Introduce => focus_topic(request, snapshot),
        SessionMode::Review => None,
    };

    log::debug!(
        "Planned {} session ({}): {} items, {} in reserve, topic {:?}",
        request.mode,
        request.direction,
        items.len(),
        reserve.len(),
        request.topic
    );

    Ok(SessionPlan {
        mode: request.mode,
        direction: request.direction,
        items,
        reserve,
        focus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::models::{ProgressEntry, ProgressMap};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn card(id: &str, topic: &str) -> Card {
        Card::new(id, format!("de_{}", id), format!("en_{}", id), "en", topic)
    }

    fn staged_snapshot(per_stage: usize) -> RepositorySnapshot {
        let mut cards = Vec::new();
        let mut progress = ProgressMap::new();
        for stage in 1..=4u8 {
            for i in 0..per_stage {
                let id = format!("s{}_{}", stage, i);
                cards.push(card(&id, "t1"));
                progress.insert(id, Direction::DeToEn, ProgressEntry::with_stage(stage));
            }
        }
        RepositorySnapshot::new(cards, progress)
    }

    #[test]
    fn test_introduce_takes_first_unseen_in_order() {
        let cards: Vec<Card> = (0..7).map(|i| card(&format!("c{}", i), "t1")).collect();
        let mut progress = ProgressMap::new();
        progress.insert("c1", Direction::DeToEn, ProgressEntry::introduced());
        let snapshot = RepositorySnapshot::new(cards, progress);
        let mut rng = StdRng::seed_from_u64(1);

        let plan = plan(
            &PlanRequest::introduce(Direction::DeToEn),
            &snapshot,
            &TrainerConfig::default(),
            &mut rng,
        )
        .unwrap();

        let ids: Vec<&str> = plan.items.iter().map(|i| i.card_id()).collect();
        assert_eq!(ids, vec!["c0", "c2", "c3", "c4"]);
        assert!(plan.items.iter().all(|i| i.is_new));
        let reserve: Vec<&str> = plan.reserve.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(reserve, vec!["c5", "c6"]);
    }

    #[test]
    fn test_introduce_never_repeats_a_card_in_the_batch() {
        let cards = vec![card("a", "t1"), card("a", "t1"), card("b", "t1")];
        let snapshot = RepositorySnapshot::new(cards, ProgressMap::new());
        let mut rng = StdRng::seed_from_u64(1);

        let plan = plan(
            &PlanRequest::introduce(Direction::DeToEn),
            &snapshot,
            &TrainerConfig::default(),
            &mut rng,
        )
        .unwrap();
        let ids: Vec<&str> = plan.items.iter().map(|i| i.card_id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_introduce_eligibility_is_per_direction() {
        let mut progress = ProgressMap::new();
        progress.insert("c1", Direction::DeToEn, ProgressEntry::with_stage(2));
        let snapshot = RepositorySnapshot::new(vec![card("c1", "t1")], progress);
        let mut rng = StdRng::seed_from_u64(1);
        let config = TrainerConfig::default();

        let en_to_de = plan(&PlanRequest::introduce(Direction::EnToDe), &snapshot, &config, &mut rng)
            .unwrap();
        assert_eq!(en_to_de.items[0].card_id(), "c1");

        let de_to_en = plan(&PlanRequest::introduce(Direction::DeToEn), &snapshot, &config, &mut rng);
        assert_eq!(
            de_to_en.unwrap_err(),
            PlanError::NoEligibleCards {
                mode: SessionMode::Introduce,
                direction: Direction::DeToEn,
            }
        );
    }

    #[test]
    fn test_introduce_respects_lang() {
        let mut fr = card("f1", "t1");
        fr.lang = "fr".to_string();
        let snapshot = RepositorySnapshot::new(vec![card("e1", "t1"), fr], ProgressMap::new());
        let mut rng = StdRng::seed_from_u64(1);

        let request = PlanRequest::introduce(Direction::DeToEn).with_lang(Some("fr".to_string()));
        let plan = plan(&request, &snapshot, &TrainerConfig::default(), &mut rng).unwrap();
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].card_id(), "f1");
    }

    #[test]
    fn test_introduce_stays_within_topic() {
        let cards = vec![
            card("a1", "t1"),
            card("b1", "t2"),
            card("a2", "t1"),
            card("b2", "t2"),
            card("a3", "t1"),
        ];
        let mut progress = ProgressMap::new();
        progress.insert("a1", Direction::DeToEn, ProgressEntry::introduced());
        let snapshot = RepositorySnapshot::new(cards, progress);
        let mut rng = StdRng::seed_from_u64(1);

        let request =
            PlanRequest::introduce(Direction::DeToEn).with_topic(Some("t1".to_string()));
        let plan = plan(&request, &snapshot, &TrainerConfig::default(), &mut rng).unwrap();
        let ids: Vec<&str> = plan.items.iter().map(|i| i.card_id()).collect();
        assert_eq!(ids, vec!["a2", "a3"]);
        assert!(plan.reserve.is_empty());

        let focus = plan.focus.unwrap();
        assert_eq!(focus.topic, "t1");
        assert_eq!(focus.cards, vec!["a1", "a2", "a3"]);
    }

    #[test]
    fn test_least_introduced_topic() {
        let cards = vec![
            card("a1", "t1"),
            card("a2", "t1"),
            card("b1", "t2"),
            card("b2", "t2"),
            card("b3", "t2"),
            card("c1", "t3"),
            card("n1", ""),
        ];
        let mut progress = ProgressMap::new();
        progress.insert("a1", Direction::DeToEn, ProgressEntry::introduced());
        progress.insert("b1", Direction::DeToEn, ProgressEntry::introduced());
        progress.insert("c1", Direction::DeToEn, ProgressEntry::introduced());
        let snapshot = RepositorySnapshot::new(cards, progress);

        // t2 is a third done, t1 half, t3 complete
        assert_eq!(
            least_introduced_topic(&snapshot, Direction::DeToEn, None).as_deref(),
            Some("t2")
        );
        // Nothing introduced the other way round; ties go to the lowest id
        assert_eq!(
            least_introduced_topic(&snapshot, Direction::EnToDe, None).as_deref(),
            Some("t1")
        );
        assert_eq!(
            least_introduced_topic(&snapshot, Direction::DeToEn, Some("fr")),
            None
        );
    }

    #[test]
    fn test_review_favours_low_stages() {
        let snapshot = staged_snapshot(10);
        let config = TrainerConfig::default();
        let request = PlanRequest::review(Direction::DeToEn, TopicFilter::new());
        let mut rng = StdRng::seed_from_u64(7);

        let mut per_stage = [0usize; 4];
        for _ in 0..300 {
            let plan = plan(&request, &snapshot, &config, &mut rng).unwrap();
            assert_eq!(plan.items.len(), 10);
            let mut ids: Vec<&str> = plan.items.iter().map(|i| i.card_id()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), 10, "a card was drawn twice");
            for item in &plan.items {
                let stage = snapshot.progress.stage(item.card_id(), Direction::DeToEn).unwrap();
                per_stage[stage as usize - 1] += 1;
            }
        }

        assert!(per_stage[0] > per_stage[1]);
        assert!(per_stage[1] > per_stage[2]);
        assert!(per_stage[2] > per_stage[3]);
        assert!(per_stage[0] > per_stage[3] * 2);
    }

    #[test]
    fn test_review_never_draws_from_empty_pool() {
        let mut cards = Vec::new();
        let mut progress = ProgressMap::new();
        for (id, stage) in [("a", 1u8), ("b", 4), ("c", 4)] {
            cards.push(card(id, "t1"));
            progress.insert(id, Direction::DeToEn, ProgressEntry::with_stage(stage));
        }
        let snapshot = RepositorySnapshot::new(cards, progress);
        let mut rng = StdRng::seed_from_u64(3);

        let plan = plan(
            &PlanRequest::review(Direction::DeToEn, TopicFilter::new()),
            &snapshot,
            &TrainerConfig::default(),
            &mut rng,
        )
        .unwrap();

        let mut ids: Vec<&str> = plan.items.iter().map(|i| i.card_id()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_review_is_reproducible_with_seed() {
        let snapshot = staged_snapshot(5);
        let config = TrainerConfig::default();
        let request = PlanRequest::review(Direction::DeToEn, TopicFilter::new());

        let first = plan(&request, &snapshot, &config, &mut StdRng::seed_from_u64(42)).unwrap();
        let second = plan(&request, &snapshot, &config, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(first.items, second.items);
    }

    #[test]
    fn test_review_topic_filter_and_orphans() {
        let cards = vec![card("a1", "t1"), card("a2", "t2")];
        let mut progress = ProgressMap::new();
        progress.insert("a1", Direction::DeToEn, ProgressEntry::with_stage(2));
        progress.insert("a2", Direction::DeToEn, ProgressEntry::with_stage(2));
        progress.insert("gone", Direction::DeToEn, ProgressEntry::with_stage(1));
        let snapshot = RepositorySnapshot::new(cards, progress);
        assert_eq!(log_orphaned_progress(&snapshot, Direction::DeToEn), 1);

        let filter: TopicFilter = ["t2".to_string()].into_iter().collect();
        let mut rng = StdRng::seed_from_u64(1);
        let plan = plan(
            &PlanRequest::review(Direction::DeToEn, filter),
            &snapshot,
            &TrainerConfig::default(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(plan.items.len(), 1);
        assert_eq!(plan.items[0].card_id(), "a2");
        assert!(!plan.items[0].is_new);
    }

    #[test]
    fn test_review_without_progress_is_error() {
        let snapshot = RepositorySnapshot::new(vec![card("a", "t1")], ProgressMap::new());
        let mut rng = StdRng::seed_from_u64(1);
        let result = plan(
            &PlanRequest::review(Direction::EnToDe, TopicFilter::new()),
            &snapshot,
            &TrainerConfig::default(),
            &mut rng,
        );
        assert!(matches!(result, Err(PlanError::NoEligibleCards { .. })));
    }

    #[test]
    fn test_restrict_topic_filter() {
        let introduced: TopicFilter = ["t1", "t2"].iter().map(|s| s.to_string()).collect();
        let requested: TopicFilter = ["t2", "t9"].iter().map(|s| s.to_string()).collect();
        let restricted = restrict_topic_filter(&requested, &introduced);
        assert_eq!(restricted.into_iter().collect::<Vec<_>>(), vec!["t2".to_string()]);

        let unknown: TopicFilter = ["t9".to_string()].into_iter().collect();
        assert!(restrict_topic_filter(&unknown, &introduced).is_empty());
    }
}
