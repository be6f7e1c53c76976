//! Progress reporting for a running council session (§6.1, §6.7).
//!
//! Implements [`EventHandler`] and is meant to be subscribed to the
//! [`EventBus`](quorum_application::EventBus) for the duration of a
//! `RunCouncil` call; it has no knowledge of the pipeline beyond the trace
//! events it is handed.

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use quorum_application::ports::event_bus::EventHandler;
use quorum_domain::council::{EventType, TraceEvent};
use std::sync::Mutex;

/// Reports progress during a council run with fancy, per-stage progress bars.
pub struct ProgressReporter {
    multi: MultiProgress,
    stage_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self { multi: MultiProgress::new(), stage_bar: Mutex::new(None) }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner().template("{spinner:.green} {prefix:.bold.cyan} {msg}").unwrap()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for ProgressReporter {
    fn handle(&self, event: &TraceEvent) {
        match event.event_type {
            EventType::StageStart => {
                let label = event.stage.map(|s| s.to_string()).unwrap_or_else(|| "stage".to_string());
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::spinner_style());
                pb.set_prefix(label);
                pb.set_message("starting...");
                pb.enable_steady_tick(std::time::Duration::from_millis(100));
                *self.stage_bar.lock().unwrap() = Some(pb);
            }
            EventType::MemberResponse => {
                if let Some(pb) = self.stage_bar.lock().unwrap().as_ref() {
                    let name = event.member_name.as_deref().unwrap_or("member");
                    pb.set_message(format!("{} {}", "v".green(), name));
                }
            }
            EventType::Error => {
                if let Some(pb) = self.stage_bar.lock().unwrap().as_ref() {
                    let name = event.member_name.as_deref().unwrap_or("member");
                    pb.set_message(format!("{} {}", "x".red(), name));
                }
            }
            EventType::StageEnd => {
                if let Some(pb) = self.stage_bar.lock().unwrap().take() {
                    pb.finish_with_message("done".to_string());
                }
            }
            EventType::SessionEnd => {
                self.multi.clear().ok();
            }
            _ => {}
        }
    }
}

/// Simple text-based progress (no fancy UI), one line per event.
pub struct SimpleProgress;

impl EventHandler for SimpleProgress {
    fn handle(&self, event: &TraceEvent) {
        match event.event_type {
            EventType::StageStart => {
                let label = event.stage.map(|s| s.to_string()).unwrap_or_else(|| "stage".to_string());
                println!("{} {}", "->".cyan(), label.bold());
            }
            EventType::MemberResponse => {
                println!("  {} {}", "v".green(), event.member_name.as_deref().unwrap_or("member"));
            }
            EventType::Error => {
                println!("  {} {} (failed)", "x".red(), event.member_name.as_deref().unwrap_or("member"));
            }
            EventType::StageEnd => println!(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_domain::council::Stage;

    #[test]
    fn handles_full_stage_lifecycle_without_panicking() {
        let reporter = ProgressReporter::new();
        reporter.handle(&TraceEvent::new(1, "s1", EventType::StageStart, 0).with_stage(Stage::Opinions));
        reporter.handle(
            &TraceEvent::new(2, "s1", EventType::MemberResponse, 5).with_stage(Stage::Opinions).with_member("m1", "Claude"),
        );
        reporter.handle(&TraceEvent::new(3, "s1", EventType::StageEnd, 10).with_stage(Stage::Opinions));
        reporter.handle(&TraceEvent::new(4, "s1", EventType::SessionEnd, 11));
    }
}
