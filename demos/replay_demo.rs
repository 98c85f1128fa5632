//! Demonstration of a complete keystroke study without a live input surface.
//!
//! This example shows how to:
//! 1. Drive the study controller through both sessions
//! 2. Feed it synthetic key presses typed from the task prompts
//! 3. Let the countdown force the end of the stressed session
//! 4. Print the extracted features and the exported feature table
//!
//! Run with: cargo run --example replay_demo

use std::time::Duration;

use crossbeam_channel::unbounded;
use keystroke_study_agent::{
    collector::RawKeyInput,
    core::{to_csv_string, Condition, Extraction},
    study::{prompt, StudyController},
    transparency::create_shared_log,
    PARTICIPANT_NOTICE,
};

/// Type `text` starting at `start` ms, returning the time after the last key.
fn type_text(controller: &mut StudyController, text: &str, start: f64, pace_ms: f64) -> f64 {
    let mut t = start;
    for (i, c) in text.chars().enumerate() {
        let (key, code) = match c {
            ' ' => (" ".to_string(), "Space".to_string()),
            c if c.is_ascii_alphabetic() => {
                (c.to_string(), format!("Key{}", c.to_ascii_uppercase()))
            }
            c => (c.to_string(), format!("Symbol{}", c as u32)),
        };
        // A little jitter so the statistics are not flat
        let hold = 70.0 + (i % 7) as f64 * 9.0;
        let _ = controller.key(&RawKeyInput::down(&key, &code).at(t));
        let _ = controller.key(&RawKeyInput::up(&key, &code).at(t + hold));
        t += pace_ms + (i % 5) as f64 * 15.0;
    }
    t
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("Keystroke Study Agent - Replay Demo");
    println!("===================================");
    println!("{PARTICIPANT_NOTICE}");

    let (signals, receiver) = unbounded();
    let transparency = create_shared_log();
    let mut controller = StudyController::new(
        Duration::from_millis(300),
        signals,
        tokio::runtime::Handle::current(),
    )
    .with_transparency(transparency.clone());

    if let Err(e) = controller.advance() {
        eprintln!("Could not start the relaxed session: {e}");
        return;
    }
    type_text(&mut controller, prompt(Condition::Relaxed), 0.0, 220.0);

    if let Err(e) = controller.advance() {
        eprintln!("Could not start the stressed session: {e}");
        return;
    }
    // Fast typing with a couple of corrections
    let t = type_text(&mut controller, "The ambitious quarterbakc", 0.0, 140.0);
    let mut t = t;
    for _ in 0..3 {
        let _ = controller.key(&RawKeyInput::down("Backspace", "Backspace").at(t));
        let _ = controller.key(&RawKeyInput::up("Backspace", "Backspace").at(t + 60.0));
        t += 120.0;
    }
    type_text(&mut controller, "ack scrambled", t, 140.0);

    println!("Waiting for the countdown to end the stressed session...");
    while !controller.is_complete() {
        tokio::time::sleep(Duration::from_millis(20)).await;
        while let Ok(signal) = receiver.try_recv() {
            if let Err(e) = controller.handle(signal) {
                eprintln!("Signal rejected: {e}");
            }
        }
    }

    for condition in Condition::ALL {
        println!();
        println!("=== {condition} ===");
        match controller.extraction(condition) {
            Some(Extraction::Complete(features)) => {
                println!("  Keys pressed: {}", features.total_keys_pressed);
                println!("  Backspaces: {}", features.total_backspaces);
                println!(
                    "  Hold time: mean {:.1}ms, std {:.1}ms, median {:.1}ms",
                    features.hold_time_mean, features.hold_time_std, features.hold_time_median
                );
                println!(
                    "  Latency: mean {:.1}ms, std {:.1}ms, median {:.1}ms",
                    features.latency_mean, features.latency_std, features.latency_median
                );
                if let Some(wpm) = features.typing_speed_wpm {
                    println!("  Typing speed: {wpm:.1} wpm");
                }
            }
            Some(Extraction::InsufficientData { event_count }) => {
                println!("  Not enough data ({event_count} events)");
            }
            None => println!("  Not extracted"),
        }
    }

    println!();
    match to_csv_string(&controller.export_rows(), b',') {
        Ok(csv) => print!("{csv}"),
        Err(e) => eprintln!("Export failed: {e}"),
    }

    println!();
    println!("{}", transparency.summary());
}
