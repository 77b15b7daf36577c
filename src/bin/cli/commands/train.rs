use std::io::{self, BufRead, Write};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use jonmem_lib::storage::FileRepository;
use jonmem_lib::training::{Direction, SessionEvent, SessionMode, Trainer, TrainingError};

use crate::app::App;
use crate::render::terminal;

const QUIT: &str = ":q";

pub fn run(
    app: &App,
    mode: SessionMode,
    direction: Direction,
    lang: Option<String>,
    topics: &[String],
    seed: Option<u64>,
    use_color: bool,
) -> Result<()> {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let repository = FileRepository::new(app.data_dir());
    let mut trainer = Trainer::with_rng(repository, app.config.clone(), rng);

    let started = match mode {
        SessionMode::Introduce => match topics {
            [] => trainer.start_introduce(direction, lang),
            [topic] => {
                let topic = app
                    .resolve_topics(std::slice::from_ref(topic))?
                    .into_iter()
                    .next()
                    .context("Topic lookup returned nothing")?;
                trainer.start_introduce_topic(direction, topic, lang)
            }
            _ => bail!("Introduce works on one topic at a time"),
        },
        SessionMode::Review => {
            let filter = if topics.is_empty() {
                None
            } else {
                Some(app.resolve_topics(topics)?)
            };
            trainer.start_review(direction, filter, lang)
        }
    };
    let mut events = match started {
        Ok(events) => events,
        Err(e @ TrainingError::NoEligibleCards { .. }) => {
            println!("Nothing to train: {}", e);
            return Ok(());
        }
        Err(e) => return Err(anyhow::Error::new(e).context("Failed to start session")),
    };

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let mut revealing = false;
        let mut finished = false;
        for event in &events {
            match event {
                SessionEvent::Reveal(card) => {
                    println!("\n{}", terminal::render_reveal(card, direction, use_color));
                    revealing = true;
                }
                SessionEvent::Present(item) => {
                    println!("\n{}", terminal::render_prompt(item, use_color));
                }
                SessionEvent::Feedback(evaluation) => {
                    println!("{}", terminal::render_feedback(evaluation, use_color));
                }
                SessionEvent::Finished(summary) => {
                    println!("{}", terminal::render_summary(summary, use_color));
                    if let Some(topic) = &summary.topic_completed {
                        let name = app.topic_name(&app.list_topics()?, topic);
                        println!("{}", terminal::render_topic_completed(&name, use_color));
                    }
                    finished = true;
                }
                // No audio in the terminal
                SessionEvent::Cue(_) | SessionEvent::Progress(_) => {}
            }
        }
        if finished {
            break;
        }

        if revealing {
            // The session clock is paused while a reveal is open
            let line = lines.next().transpose()?;
            events = match line.as_deref().map(str::trim) {
                None | Some(QUIT) => trainer.abandon_session()?,
                Some(_) => trainer.dismiss_reveal()?,
            };
            continue;
        }

        print!("> ");
        io::stdout().flush()?;
        let asked = Instant::now();
        let line = lines.next().transpose()?;
        let elapsed = asked.elapsed();

        let answer = match line {
            Some(line) if line.trim() != QUIT => line,
            _ => {
                events = trainer.abandon_session()?;
                continue;
            }
        };

        // An answer typed after the time ran out does not count
        events = trainer.tick(elapsed)?;
        if !trainer.session().is_some_and(|s| s.is_finished()) {
            events.extend(trainer.submit_answer(&answer)?);
        }
    }

    if trainer.pending_commits() > 0 {
        eprintln!(
            "warning: {} progress change(s) could not be saved to {}",
            trainer.pending_commits(),
            app.data_dir().display()
        );
    }

    Ok(())
}
