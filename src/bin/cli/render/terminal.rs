use std::time::Duration;

use jonmem_lib::training::{
    Card, Direction, Evaluation, FinishReason, PresentedItem, SessionSummary, Verdict,
};

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const STRIKETHROUGH: &str = "\x1b[9m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

fn paint(text: &str, style: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", style, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// The "New Card!" dialog
pub fn render_reveal(card: &Card, direction: Direction, use_color: bool) -> String {
    let mut lines = vec![
        paint("New Card!", Color::YELLOW, use_color),
        format!(
            "  {}  =  {}",
            paint(card.prompt(direction), Color::BOLD, use_color),
            paint(card.answer(direction), Color::CYAN, use_color)
        ),
    ];

    let hint = card.directional_hint(direction);
    if !hint.is_empty() {
        lines.push(format!("  Hint: {}", hint));
    }
    let mnemonic = card.mnemonic.trim();
    if !mnemonic.is_empty() {
        lines.push(format!("  Mnemonic: {}", mnemonic));
    }
    lines.push(paint("  (Enter to continue, :q to quit)", Color::DIM, use_color));
    lines.join("\n")
}

pub fn render_prompt(item: &PresentedItem, use_color: bool) -> String {
    let stage = paint(&format!("[{}]", item.stage), Color::DIM, use_color);
    let retry = if item.second_chance { " (one more try)" } else { "" };
    format!("{} {}{}", stage, paint(&item.prompt, Color::BOLD, use_color), retry)
}

pub fn render_feedback(evaluation: &Evaluation, use_color: bool) -> String {
    match evaluation.verdict {
        Verdict::Correct => paint("Correct!", Color::GREEN, use_color),
        Verdict::SecondChance => {
            let mut lines = Vec::new();
            if let Some(title) = evaluation.title() {
                lines.push(paint(title, Color::YELLOW, use_color));
            }
            for hint in &evaluation.hints {
                lines.push(format!("  {}", hint));
            }
            lines.join("\n")
        }
        Verdict::Incorrect => {
            let typed = if evaluation.typed.trim().is_empty() {
                "(empty)".to_string()
            } else {
                paint(&evaluation.typed, Color::STRIKETHROUGH, use_color)
            };
            format!(
                "{} {} -> {}",
                paint("Wrong:", Color::RED, use_color),
                typed,
                paint(&evaluation.expected, Color::GREEN, use_color)
            )
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub fn render_summary(summary: &SessionSummary, use_color: bool) -> String {
    let reason = match summary.reason {
        FinishReason::ItemLimit => "item limit reached",
        FinishReason::TimeExpired => "time is up",
        FinishReason::QueueExhausted => "nothing left to review",
        FinishReason::Abandoned => "abandoned",
    };

    let mut lines = vec![
        String::new(),
        paint(&format!("Session finished ({})", reason), Color::BOLD, use_color),
        format!(
            "  {} of {} correct in {}",
            summary.correct,
            summary.items_answered,
            format_duration(summary.elapsed)
        ),
    ];

    if !summary.reset_cards.is_empty() {
        lines.push(format!(
            "  {} new card(s) not yet learned were put back",
            summary.reset_cards.len()
        ));
    }

    for level in &summary.pyramid {
        lines.push(format!(
            "  {} {}",
            paint(&format!("Stage {}:", level.stage), Color::CYAN, use_color),
            level.prompts.join(", ")
        ));
    }
    lines.join("\n")
}

pub fn render_topic_completed(topic_name: &str, use_color: bool) -> String {
    paint(
        &format!("Topic completed: {}", topic_name),
        Color::GREEN,
        use_color,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use jonmem_lib::training::evaluate;

    #[test]
    fn test_plain_feedback() {
        let wrong = evaluate("the dog", "a cat", 4);
        assert_eq!(render_feedback(&wrong, false), "Wrong: a cat -> the dog");

        let almost = evaluate("the dog", "The dog", 3);
        let text = render_feedback(&almost, false);
        assert!(text.starts_with("Almost right"));
        assert!(text.contains("upper and lower case"));
    }

    #[test]
    fn test_reveal_shows_hint_for_direction_only() {
        let mut card = Card::new("c1", "Hund", "dog", "en", "animals");
        card.set_directional_hint(Direction::EnToDe, "der ...");
        let text = render_reveal(&card, Direction::DeToEn, false);
        assert!(text.contains("Hund  =  dog"));
        assert!(!text.contains("Hint"));
    }

    #[test]
    fn test_topic_completed_line() {
        assert_eq!(render_topic_completed("Farben", false), "Topic completed: Farben");
        assert!(render_topic_completed("Farben", true).contains("Farben"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(300)), "5:00");
        assert_eq!(format_duration(Duration::from_secs(65)), "1:05");
    }
}
