//! Run report rendering

use batchline_core::application::QueueStats;
use batchline_core::domain::{TaskCounts, TaskSnapshot, TaskStatus};
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

const PREVIEW_WIDTH: usize = 60;

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Task")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Requests")]
    requests: usize,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

impl From<&TaskSnapshot> for TaskRow {
    fn from(task: &TaskSnapshot) -> Self {
        let outcome = match (&task.error, &task.result) {
            (Some(error), _) => error.clone(),
            (None, Some(result)) => result.to_string(),
            (None, None) => String::new(),
        };
        Self {
            id: task.id.clone(),
            status: task.status.to_string(),
            requests: task.request_count,
            outcome: truncate(&outcome, PREVIEW_WIDTH),
        }
    }
}

/// Machine-readable summary printed to stdout
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub batch: String,
    pub stats: QueueStats,
    pub batch_stats: TaskCounts,
    pub results: Vec<Option<serde_json::Value>>,
    pub history_records: usize,
}

pub fn task_table(tasks: &[TaskSnapshot]) -> String {
    Table::new(tasks.iter().map(TaskRow::from)).to_string()
}

pub fn print_human(summary: &RunSummary, tasks: &[TaskSnapshot]) {
    if tasks.is_empty() {
        println!("No tasks in batch {}", summary.batch);
        return;
    }
    println!("{}", task_table(tasks));

    let counts = summary.batch_stats;
    let headline = format!(
        "Batch {}: {}/{} completed, {} failed",
        summary.batch, counts.completed, counts.total, counts.failed
    );
    if counts.failed == 0 {
        println!("{}", format!("✓ {}", headline).green().bold());
    } else {
        println!("{}", format!("✗ {}", headline).red().bold());
        for task in tasks.iter().filter(|t| t.status == TaskStatus::Failed) {
            println!(
                "  {} {}",
                task.id.yellow(),
                task.error.as_deref().unwrap_or_default()
            );
        }
    }
    println!("Request history: {} record(s)", summary.history_records);
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
