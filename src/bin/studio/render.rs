//! Plain-text rendering of workflow snapshots.

use std::fmt::Write;

use contentstudio::view::step_label;
use contentstudio::{ImageAnalysis, ScriptScene, WorkflowSnapshot};

pub fn analysis(analysis: &ImageAnalysis) -> String {
    let mut out = format!("Product: {}\n  {}\n", analysis.product_name, analysis.description);
    for component in analysis.components() {
        let _ = writeln!(out, "  - {} ({})", component.name, component.scale);
    }
    out
}

pub fn script(scenes: &[ScriptScene]) -> String {
    let mut out = String::from("Script:\n");
    for scene in scenes {
        let _ = writeln!(out, "  {}. {}", scene.scene_number, scene.description);
        let _ = writeln!(out, "     prompt: {}", scene.prompt);
    }
    out
}

pub fn summary(snapshot: &WorkflowSnapshot) -> String {
    let mut out = String::new();
    out.push_str("\n========================================\n");
    out.push_str("Production Summary:\n");
    out.push_str("========================================\n");
    if let Some(label) = step_label(snapshot.phase) {
        let _ = writeln!(out, "  Step:  {label}");
    } else {
        let _ = writeln!(out, "  Phase: {}", snapshot.phase);
    }

    for card in snapshot.cards() {
        let scene = card
            .scene_number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        let _ = write!(out, "  Scene {scene}: {}", card.status);
        if let Some(score) = card.score {
            let _ = write!(out, " (score {score}/5)");
        }
        if card.regeneration_count > 0 {
            let _ = write!(out, " [regenerated {}x]", card.regeneration_count);
        }
        if let Some(status) = card.video_status {
            let _ = write!(out, " video: {status}");
        }
        out.push('\n');
        if let Some(error) = card.error_message.as_deref() {
            let _ = writeln!(out, "      error: {error}");
        }
        if let Some(reason) = card.reason.as_deref() {
            let _ = writeln!(out, "      review: {reason}");
        }
    }

    let videos_failed = snapshot
        .videos
        .iter()
        .filter_map(|v| v.error_message.as_deref())
        .collect::<Vec<_>>();
    for error in videos_failed {
        let _ = writeln!(out, "  Video failed: {error}");
    }
    out
}
