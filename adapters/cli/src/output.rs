//! Human-readable and JSON rendering of shell replies.

use std::collections::HashMap;

use anyhow::{Context, Result};
use ghost_defence_core::{
    DefenderKind, GridLocation, Rejection, TileKind, WavePhase, WorldSnapshot,
};
use ghost_defence_world::GridTopology;
use serde::Serialize;

/// Reply emitted for a single shell line or state change.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Reply<'a> {
    Ok { message: &'a str },
    Rejected { reason: Rejection, message: String },
    Error { message: String },
    State { snapshot: &'a WorldSnapshot },
    Progress { snapshot: &'a WorldSnapshot },
    Map { rows: Vec<String> },
    Route { route: &'a [GridLocation] },
    Help { text: &'a str },
}

/// Writes replies to standard output in the selected format.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Output {
    json: bool,
}

impl Output {
    pub(crate) const fn new(json: bool) -> Self {
        Self { json }
    }

    pub(crate) fn emit(self, reply: &Reply<'_>) -> Result<()> {
        let line = if self.json {
            serde_json::to_string(reply).context("failed to encode reply as json")?
        } else {
            render_text(reply)
        };
        println!("{line}");
        Ok(())
    }
}

fn render_text(reply: &Reply<'_>) -> String {
    match reply {
        Reply::Ok { message } => format!("ok: {message}"),
        Reply::Rejected { message, .. } => format!("rejected: {message}"),
        Reply::Error { message } => format!("error: {message}"),
        Reply::State { snapshot } => state_text(snapshot),
        Reply::Progress { snapshot } => status_line(snapshot),
        Reply::Map { rows } => rows.join("\n"),
        Reply::Route { route } => route
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> "),
        Reply::Help { text } => (*text).to_owned(),
    }
}

/// One-line summary used for per-turn progress.
pub(crate) fn status_line(snapshot: &WorldSnapshot) -> String {
    format!(
        "tick {} | wave {} {} | lives {} | balance {} | mobiles {} | defeated {}",
        snapshot.tick,
        snapshot.wave,
        phase_name(snapshot.phase),
        snapshot.lives,
        snapshot.balance,
        snapshot.mobiles.len(),
        snapshot.defeated,
    )
}

fn state_text(snapshot: &WorldSnapshot) -> String {
    let mut lines = vec![status_line(snapshot)];
    for defender in &snapshot.defenders {
        lines.push(format!(
            "  defender #{} {} L{} at {} power {} range {} upgrade {} refund {}",
            defender.id.get(),
            defender.kind,
            defender.level,
            defender.location,
            defender.stats.power,
            defender.stats.range,
            defender.stats.upgrade_cost,
            defender.stats.refund,
        ));
    }
    for mobile in &snapshot.mobiles {
        lines.push(format!(
            "  mobile #{} L{} at {} health {} movement {}",
            mobile.id.get(),
            mobile.level,
            mobile.location,
            mobile.health,
            mobile.movement,
        ));
    }
    lines.join("\n")
}

fn phase_name(phase: WavePhase) -> &'static str {
    match phase {
        WavePhase::Idle => "idle",
        WavePhase::WaveActive => "active",
        WavePhase::GameLost => "lost",
        WavePhase::GameWon => "won",
    }
}

/// Draws the grid one text row per tile row.
pub(crate) fn map_rows(topology: &GridTopology, snapshot: &WorldSnapshot) -> Vec<String> {
    let mut overlay: HashMap<GridLocation, char> = HashMap::new();
    for defender in &snapshot.defenders {
        let glyph = match defender.kind {
            DefenderKind::Basic => 'B',
            DefenderKind::Slowing => 'S',
            DefenderKind::Splash => 'P',
        };
        let _ = overlay.insert(defender.location, glyph);
    }
    for mobile in &snapshot.mobiles {
        let _ = overlay.insert(mobile.location, 'g');
    }

    (0..topology.rows())
        .map(|row| {
            (0..topology.columns())
                .map(|column| {
                    let location = GridLocation::new(row, column);
                    overlay
                        .get(&location)
                        .copied()
                        .unwrap_or_else(|| tile_glyph(topology.tile(location)))
                })
                .collect()
        })
        .collect()
}

fn tile_glyph(tile: Option<TileKind>) -> char {
    match tile {
        Some(TileKind::OpenBuildable) => '.',
        Some(TileKind::Blocked) => '#',
        Some(TileKind::Road) => '=',
        Some(TileKind::Entry) => 'E',
        Some(TileKind::Exit) => 'X',
        Some(TileKind::Empty) | None => ' ',
    }
}
