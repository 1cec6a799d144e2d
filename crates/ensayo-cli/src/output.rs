//! Terminal output for run progress and summaries

use console::style;
use ensayo::{RunStatus, StepStatus, TestRun};

/// Streams new narration lines as a shared run log grows.
///
/// The run log is append-only, so remembering how many bytes were
/// already printed is enough to emit only the new lines on each poll.
#[derive(Debug, Default)]
pub struct LogTail {
    printed: usize,
}

impl LogTail {
    /// Create a tail that has printed nothing yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Print any log content past the last drained position
    pub fn drain(&mut self, log: &str) {
        if log.len() <= self.printed {
            return;
        }
        for line in log[self.printed..].lines() {
            if !line.is_empty() {
                println!("{line}");
            }
        }
        self.printed = log.len();
    }
}

/// Print the per-step table and final verdict for a finished run.
pub fn print_summary(run: &TestRun) {
    println!();
    for result in &run.step_results {
        let mark = match result.status {
            StepStatus::Success => style("✓").green(),
            StepStatus::Failed => style("✗").red(),
            StepStatus::Skipped => style("-").yellow(),
        };
        println!(
            "{mark} [{}] {} {}",
            result.step_order, result.action, result.message
        );
    }

    let verdict = match run.status {
        RunStatus::Success => style("PASSED").green().bold(),
        RunStatus::Failed => style("FAILED").red().bold(),
        RunStatus::Pending | RunStatus::Running => style("INCOMPLETE").yellow().bold(),
    };
    let duration = run
        .duration()
        .map_or_else(String::new, |d| format!(" in {}ms", d.num_milliseconds()));
    println!(
        "\n{}: {} ({} steps{duration})",
        run.plan_name,
        verdict,
        run.step_results.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_tail_only_advances() {
        let mut tail = LogTail::new();
        tail.drain("line one\n");
        assert_eq!(tail.printed, 9);
        // shorter input never rewinds
        tail.drain("line");
        assert_eq!(tail.printed, 9);
        tail.drain("line one\nline two\n");
        assert_eq!(tail.printed, 18);
    }
}
