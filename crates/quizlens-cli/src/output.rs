use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use owo_colors::OwoColorize;
use quizlens_core::{
    AnswerSource, DeliveredAnswer, FavoriteEntry, HistoryEntry, SearchOutcome, StatsSnapshot,
};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the recognition summary followed by every match.
pub fn print_search_outcome(
    w: &mut dyn Write,
    outcome: &SearchOutcome,
    color: ColorMode,
) -> std::io::Result<()> {
    let confidence = (outcome.ocr.confidence * 100.0).round() as u32;
    if outcome.ocr.text.is_empty() {
        writeln!(w, "Recognized: [no text recognized]")?;
    } else {
        writeln!(w, "Recognized ({confidence}%): {}", outcome.ocr.text)?;
    }
    if !outcome.ocr.knowledge_tags.is_empty() {
        let names: Vec<&str> = outcome
            .ocr
            .knowledge_tags
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        writeln!(w, "Tags: {}", names.join(", "))?;
    }
    if let Some(ref question_type) = outcome.ocr.question_type {
        writeln!(w, "Type: {}", question_type)?;
    }
    writeln!(w)?;

    if outcome.results.is_empty() {
        if color.enabled() {
            writeln!(w, "{}", "No matching questions found.".yellow())?;
        } else {
            writeln!(w, "No matching questions found.")?;
        }
        return Ok(());
    }

    for (index, result) in outcome.results.iter().enumerate() {
        let similarity = (result.similarity * 100.0).round() as u32;
        let label = match result.source {
            AnswerSource::Ai => {
                let model = result.ai_model.as_deref().unwrap_or("AI");
                format!("{model} answer")
            }
            AnswerSource::Database => format!("#{}", result.question_id),
        };
        if color.enabled() {
            writeln!(
                w,
                "[{}] {} ({}%)",
                index + 1,
                label.bold(),
                similarity
            )?;
        } else {
            writeln!(w, "[{}] {} ({}%)", index + 1, label, similarity)?;
        }
        if let Some(ref category) = result.category {
            writeln!(w, "    category: {}", category)?;
        }
        if let Some(ref difficulty) = result.difficulty {
            writeln!(
                w,
                "    difficulty: {} {}",
                difficulty.level,
                "*".repeat(difficulty.stars as usize)
            )?;
        }
        writeln!(w, "    {}", quizlens_core::render(&result.answer))?;
        writeln!(w)?;
    }
    Ok(())
}

/// Print a delivered AI follow-up answer.
pub fn print_ai_answer(
    w: &mut dyn Write,
    delivered: &DeliveredAnswer,
    color: ColorMode,
) -> std::io::Result<()> {
    let model = delivered.answer.ai_model.as_deref().unwrap_or("AI");
    let header = format!(
        "{} answer ({} / {})",
        model, delivered.subject, delivered.question_type
    );
    if color.enabled() {
        writeln!(w, "{}", header.bold())?;
    } else {
        writeln!(w, "{}", header)?;
    }
    writeln!(w, "{}", delivered.rendered)?;
    Ok(())
}

pub fn print_history(w: &mut dyn Write, history: &[HistoryEntry]) -> std::io::Result<()> {
    if history.is_empty() {
        writeln!(w, "No search history.")?;
        return Ok(());
    }
    for entry in history {
        let college = if entry.college.is_empty() {
            String::new()
        } else {
            format!(" · {}", entry.college)
        };
        writeln!(
            w,
            "{}  {}  {} result(s){}  ({})",
            entry.id,
            format_time_ago(entry.timestamp),
            entry.result_count,
            college,
            entry.source_label,
        )?;
    }
    Ok(())
}

pub fn print_favorites(w: &mut dyn Write, favorites: &[FavoriteEntry]) -> std::io::Result<()> {
    if favorites.is_empty() {
        writeln!(w, "No favorites.")?;
        return Ok(());
    }
    for entry in favorites {
        let snippet: String = entry.answer_snapshot.chars().take(60).collect();
        writeln!(
            w,
            "{}  [{}]  {}  {}",
            entry.question_id,
            entry.category,
            format_time_ago(entry.timestamp),
            snippet,
        )?;
    }
    Ok(())
}

pub fn print_stats(w: &mut dyn Write, snapshot: &StatsSnapshot) -> std::io::Result<()> {
    writeln!(w, "searches:  {}", snapshot.search_count)?;
    writeln!(w, "favorites: {}", snapshot.favorite_count)?;
    writeln!(w, "history:   {}", snapshot.history_count)?;
    Ok(())
}

/// "just now" / "5 min ago" style display for ms timestamps.
pub fn format_time_ago(timestamp_ms: u64) -> String {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let seconds = now_ms.saturating_sub(timestamp_ms) / 1000;

    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 3600 {
        format!("{} min ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} h ago", seconds / 3600)
    } else {
        format!("{} d ago", seconds / 86400)
    }
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
