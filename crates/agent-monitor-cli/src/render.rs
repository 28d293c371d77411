//! Terminal rendering of session snapshots.

use std::io::Write;

use agent_monitor_core::{
    DisplayCategory, EventKind, EventRecord, LogEntry, SessionSnapshot, SessionStatus, Stage,
    StageProjection, classify,
};

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Starting => "Starting",
        Stage::Analyzing => "AI Analyzing",
        Stage::Decision => "Decision Made",
        Stage::Evaluating => "Evaluating",
        Stage::Learning => "AI Learning",
        Stage::Complete => "Complete",
    }
}

/// Fixed-width severity column for a log line.
fn severity(category: DisplayCategory) -> &'static str {
    match category {
        DisplayCategory::Success => "OK  ",
        DisplayCategory::Failure => "FAIL",
        DisplayCategory::Progress => "STEP",
        DisplayCategory::Informational => "INFO",
    }
}

/// Kind-specific icon where one exists, otherwise the category's.
pub fn icon(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::Error => "⚠",
        EventKind::Decision => "💡",
        EventKind::Evaluation | EventKind::EvaluationResult => "📊",
        EventKind::Countdown => "⏱",
        EventKind::PriceUpdate => "💰",
        EventKind::Complete => "🏁",
        _ => match classify(kind).category {
            DisplayCategory::Success => "✓",
            DisplayCategory::Failure => "✗",
            DisplayCategory::Progress => "🔄",
            DisplayCategory::Informational => "ℹ",
        },
    }
}

fn money(value: Option<f64>) -> String {
    value.map_or_else(|| "?".to_string(), |v| format!("${v:.2}"))
}

fn verdict(success: Option<bool>) -> &'static str {
    match success {
        Some(true) => "SUCCESS",
        Some(false) => "FAILURE",
        None => "UNKNOWN",
    }
}

fn text_or<'a>(record: &'a EventRecord, key: &str, fallback: &'a str) -> &'a str {
    record.str_field(key).unwrap_or(fallback)
}

fn count(record: &EventRecord, key: &str) -> String {
    record
        .u64_field(key)
        .map_or_else(|| "?".to_string(), |n| n.to_string())
}

/// One-line human summary of a record. Missing fields render as `?`.
pub fn summary(record: &EventRecord) -> String {
    match &record.kind {
        EventKind::Status => text_or(record, "message", "").to_string(),
        EventKind::AttemptStart => format!(
            "Starting attempt {}/{}",
            count(record, "attempt"),
            count(record, "max_retries")
        ),
        EventKind::Decision => {
            let decision = text_or(record, "decision", "?");
            match record.str_field("reason").filter(|r| !r.is_empty()) {
                Some(reason) => format!("Decision: {decision} - {reason}"),
                None => format!("Decision: {decision}"),
            }
        }
        EventKind::Evaluation | EventKind::EvaluationResult => format!(
            "Evaluation: {} - Profit: {} ({} → {})",
            verdict(record.bool_field("success")),
            money(record.f64_field("profit")),
            money(record.f64_field("price_before")),
            money(record.f64_field("price_after")),
        ),
        EventKind::PriceUpdate => format!(
            "{}: {}",
            text_or(record, "label", "Price"),
            money(record.f64_field("price"))
        ),
        EventKind::Countdown => format!(
            "Waiting... {}s remaining",
            count(record, "seconds_remaining")
        ),
        EventKind::PromptUpdated => {
            format!("Prompt updated: {}", text_or(record, "reason", "?"))
        }
        EventKind::Success => format!("SUCCESS: {}", text_or(record, "message", "")),
        EventKind::Failure => format!("FAILURE: {}", text_or(record, "message", "")),
        EventKind::Complete => format!(
            "Complete: {} after {} attempts",
            verdict(record.bool_field("success")),
            count(record, "attempts")
        ),
        EventKind::Error => format!("ERROR: {}", text_or(record, "message", "unknown error")),
        EventKind::Other(tag) => format!(
            "{tag}: {}",
            serde_json::to_string(&record.payload).unwrap_or_default()
        ),
    }
}

pub fn log_line(entry: &LogEntry) -> String {
    format!(
        "[{}] {} {} {}",
        entry.captured_at.format("%H:%M:%S"),
        severity(classify(entry.kind()).category),
        icon(entry.kind()),
        summary(&entry.record)
    )
}

/// Live "current status" line built from the latest record.
pub fn current_status(snapshot: &SessionSnapshot) -> Option<String> {
    let latest = snapshot.latest.as_ref()?;
    Some(format!(
        "   Now: {} {} ({})",
        icon(latest.kind()),
        latest.kind(),
        severity(classify(latest.kind()).category).trim_end()
    ))
}

/// `✓` for completed stages, `●` for the active one, `○` otherwise.
pub fn stage_tracker(projection: &StageProjection) -> String {
    Stage::ALL
        .iter()
        .map(|stage| {
            let marker = if *stage == projection.active && !projection.is_completed(*stage) {
                "●"
            } else if projection.is_completed(*stage) {
                "✓"
            } else {
                "○"
            };
            format!("{marker} {}", stage_label(*stage))
        })
        .collect::<Vec<_>>()
        .join("  →  ")
}

pub fn status_card(snapshot: &SessionSnapshot) -> String {
    let mut lines = vec![format!("Session: {:?}", snapshot.status)];
    if let Some(outcome) = snapshot.outcome() {
        lines.push(format!(
            "Outcome: {} after {} attempts",
            verdict(Some(outcome.success)),
            outcome
                .attempts
                .map_or_else(|| "?".to_string(), |n| n.to_string())
        ));
    }
    if let Some(latest) = &snapshot.latest {
        lines.push(format!("Latest: {}", summary(&latest.record)));
    }
    if let Some(fault) = &snapshot.fault {
        lines.push(format!("Error: {fault}"));
    }
    if snapshot.status == SessionStatus::Cancelled {
        lines.push("Stopped by user".to_string());
    }
    lines.push(format!(
        "Records: {}  Stage: {}",
        snapshot.log.len(),
        stage_label(snapshot.stage.active)
    ));
    if snapshot.malformed_frames > 0 {
        lines.push(format!("Skipped malformed frames: {}", snapshot.malformed_frames));
    }
    lines.join("\n")
}

/// Incremental renderer: prints entries it has not printed yet, the current
/// status whenever the latest kind changes and the stage tracker whenever the
/// active stage changes.
pub struct Renderer<W: Write> {
    out: W,
    json: bool,
    printed: usize,
    last_kind: Option<EventKind>,
    last_stage: Option<Stage>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self {
            out,
            json,
            printed: 0,
            last_kind: None,
            last_stage: None,
        }
    }

    pub fn render(&mut self, snapshot: &SessionSnapshot) -> std::io::Result<()> {
        for entry in snapshot.log.iter().skip(self.printed) {
            if self.json {
                let line = serde_json::to_string(&entry.record).map_err(std::io::Error::other)?;
                writeln!(self.out, "{line}")?;
            } else {
                writeln!(self.out, "{}", log_line(entry))?;
            }
        }
        self.printed = self.printed.max(snapshot.log.len());
        if self.json {
            return self.out.flush();
        }

        let latest_kind = snapshot.latest.as_ref().map(|e| e.kind().clone());
        if snapshot.running && latest_kind.is_some() && latest_kind != self.last_kind {
            if let Some(line) = current_status(snapshot) {
                writeln!(self.out, "{line}")?;
            }
            self.last_kind = latest_kind;
        }

        if snapshot.session_id.is_some() && self.last_stage != Some(snapshot.stage.active) {
            self.last_stage = Some(snapshot.stage.active);
            writeln!(self.out, "   {}", stage_tracker(&snapshot.stage))?;
        }
        self.out.flush()
    }

    pub fn finish(&mut self, snapshot: &SessionSnapshot) -> std::io::Result<()> {
        self.render(snapshot)?;
        if !self.json {
            writeln!(self.out)?;
            writeln!(self.out, "{}", status_card(snapshot))?;
        }
        self.out.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}
