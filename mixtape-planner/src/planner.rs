//! Set planning state machine
//!
//! Drives a plan request through explicit stages, each logged and reported
//! on the event bus:
//!
//! VibeAnalyzing → CandidatesSelected → Evaluated → Ordered →
//! TransitionsPlanned → Timed → Done
//!
//! Oracle failures inside a stage either take a deterministic fallback
//! (vibe analysis, per-track evaluation, transitions, finalization) or
//! fail the request (too few candidates). Cancellation is cooperative and
//! checked at stage boundaries.

use crate::error::{PlanError, Result};
use crate::oracle::{OracleClient, PlaylistContextEntry, VibeAnalysis};
use crate::ordering::order_by_pattern;
use crate::selection::select_candidates;
use crate::timing::materialize;
use crate::transitions::{fallback_transition, validate_transition, PlannedTransition};
use mixtape_analysis::LibraryStore;
use mixtape_common::events::{EventBus, PipelineEvent};
use mixtape_common::set::{DJSet, EnergyPattern, KeyMoment, MixingStyle};
use mixtape_common::track::Track;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Defensive bounds on the oracle-decided track count
const MIN_TRACKS: usize = 4;
const MAX_TRACKS: usize = 40;

/// Fallback sizing: one track per this many minutes of requested set
const FALLBACK_MINUTES_PER_TRACK: u32 = 4;

/// A request to plan one set
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub vibe: String,
    pub duration_minutes: u32,
    pub energy_pattern: EnergyPattern,
    /// Optional cap on each track's playable segment, in seconds
    pub track_length_cap: Option<f64>,
    pub name: Option<String>,
}

/// Stages of the planning state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStage {
    VibeAnalyzing,
    CandidatesSelected,
    Evaluated,
    Ordered,
    TransitionsPlanned,
    Timed,
    Done,
}

impl PlanStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStage::VibeAnalyzing => "vibe_analyzing",
            PlanStage::CandidatesSelected => "candidates_selected",
            PlanStage::Evaluated => "evaluated",
            PlanStage::Ordered => "ordered",
            PlanStage::TransitionsPlanned => "transitions_planned",
            PlanStage::Timed => "timed",
            PlanStage::Done => "done",
        }
    }
}

/// Plans DJ sets from an analyzed library through the oracle.
pub struct SetPlanner<O: OracleClient> {
    oracle: O,
    store: Arc<LibraryStore>,
    event_bus: EventBus,
}

impl<O: OracleClient> SetPlanner<O> {
    pub fn new(oracle: O, store: Arc<LibraryStore>, event_bus: EventBus) -> Self {
        Self {
            oracle,
            store,
            event_bus,
        }
    }

    /// Plan a set without external cancellation.
    pub async fn plan(&self, request: &PlanRequest) -> Result<DJSet> {
        self.plan_cancellable(request, &CancellationToken::new())
            .await
    }

    /// Plan a set, checking the token at each stage boundary.
    pub async fn plan_cancellable(
        &self,
        request: &PlanRequest,
        cancel: &CancellationToken,
    ) -> Result<DJSet> {
        info!(
            vibe = %request.vibe,
            duration_minutes = request.duration_minutes,
            pattern = ?request.energy_pattern,
            "Planning set"
        );

        // Stage: vibe analysis (oracle failure takes the defaulted path)
        self.enter_stage(PlanStage::VibeAnalyzing, cancel)?;
        let vibe = match self
            .oracle
            .analyze_vibe(&request.vibe, request.duration_minutes, request.energy_pattern)
            .await
        {
            Ok(vibe) => vibe,
            Err(e) => {
                warn!(error = %e, "Vibe analysis failed, using defaults");
                VibeAnalysis::fallback(&request.vibe)
            }
        };

        let target = self.target_track_count(&vibe, request.duration_minutes);
        info!(
            target,
            bpm_min = vibe.bpm_range.min,
            bpm_max = vibe.bpm_range.max,
            "Vibe analyzed"
        );

        // Stage: candidate selection
        self.enter_stage(PlanStage::CandidatesSelected, cancel)?;
        let candidates = select_candidates(&self.store, &vibe, target).await?;
        if candidates.len() < 2 {
            return Err(PlanError::InsufficientLibrary {
                found: candidates.len(),
            });
        }

        // Stage: per-track evaluation (failures score the default)
        self.enter_stage(PlanStage::Evaluated, cancel)?;
        let chosen = self.evaluate_and_choose(candidates, &vibe, target).await;

        // Stage: energy-pattern ordering
        self.enter_stage(PlanStage::Ordered, cancel)?;
        let ordered = order_by_pattern(chosen, request.energy_pattern);

        // Stage: transition planning (failures take the deterministic plan)
        self.enter_stage(PlanStage::TransitionsPlanned, cancel)?;
        let mut planned: Vec<PlannedTransition> = Vec::with_capacity(ordered.len() - 1);
        for pair in ordered.windows(2) {
            let plan = match self
                .oracle
                .plan_transition(&pair[0], &pair[1], vibe.mixing_style)
                .await
            {
                Ok(raw) => validate_transition(raw),
                Err(e) => {
                    warn!(
                        from = %pair[0].filepath,
                        to = %pair[1].filepath,
                        error = %e,
                        "Transition planning failed, using smooth blend"
                    );
                    fallback_transition()
                }
            };
            planned.push(plan);
        }

        // Finalization feeds the energy graph and flow notes; its failure
        // never fails the request
        let finalization = match self
            .oracle
            .finalize_playlist(&ordered, &request.vibe)
            .await
        {
            Ok(finalization) => Some(finalization),
            Err(e) => {
                warn!(error = %e, "Playlist finalization failed, deriving defaults");
                None
            }
        };

        // Stage: timing materialization
        self.enter_stage(PlanStage::Timed, cancel)?;
        let mixing_notes: Vec<String> = match &finalization {
            Some(finalization) => ordered
                .iter()
                .map(|track| {
                    finalization
                        .tracks
                        .iter()
                        .find(|entry| entry.filepath == track.filepath)
                        .map(|entry| entry.mixing_note.clone())
                        .unwrap_or_default()
                })
                .collect(),
            None => vec![String::new(); ordered.len()],
        };
        let timed = materialize(
            &ordered,
            &mixing_notes,
            &planned,
            request.track_length_cap,
        );

        let energy_graph = finalization
            .as_ref()
            .filter(|f| f.energy_graph.len() == ordered.len())
            .map(|f| f.energy_graph.clone())
            .unwrap_or_else(|| ordered.iter().map(|t| t.energy_level).collect());

        let key_moments = finalization
            .as_ref()
            .map(|f| {
                f.key_moments
                    .iter()
                    .map(|m| KeyMoment {
                        position: m.position,
                        description: m.description.clone(),
                    })
                    .collect()
            })
            .unwrap_or_else(|| default_key_moments(ordered.len()));

        let mixing_style = finalization
            .as_ref()
            .map(|f| f.mixing_style)
            .unwrap_or(vibe.mixing_style);

        let set = DJSet {
            id: Uuid::new_v4(),
            name: request.name.clone().unwrap_or_else(|| {
                let summary: String = request.vibe.chars().take(30).collect();
                format!("DJ Set - {summary}")
            }),
            vibe: request.vibe.clone(),
            total_duration: timed.total_duration,
            energy_pattern: request.energy_pattern,
            tracks: timed.tracks,
            transitions: timed.transitions,
            energy_graph,
            key_moments,
            mixing_style,
        };

        set.validate().map_err(PlanError::Internal)?;

        self.enter_stage(PlanStage::Done, cancel)?;
        info!(
            set_id = %set.id,
            tracks = set.tracks.len(),
            duration = set.total_duration,
            "Set planned"
        );
        Ok(set)
    }

    /// Evaluate candidates through the oracle and keep the top scorers.
    async fn evaluate_and_choose(
        &self,
        candidates: Vec<Track>,
        vibe: &VibeAnalysis,
        target: usize,
    ) -> Vec<Track> {
        let mut context: Vec<PlaylistContextEntry> = Vec::new();
        let mut scored: Vec<(f64, Track)> = Vec::with_capacity(candidates.len());

        for track in candidates {
            let evaluation = match self.oracle.evaluate_track(&track, vibe, &context).await {
                Ok(evaluation) => evaluation,
                Err(e) => {
                    warn!(filepath = %track.filepath, error = %e, "Evaluation failed, using default score");
                    Default::default()
                }
            };
            context.push(PlaylistContextEntry {
                title: track.title.clone(),
                bpm: track.bpm,
                position: context.len() + 1,
            });
            scored.push((evaluation.score.clamp(0.0, 1.0), track));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(target)
            .map(|(_, track)| track)
            .collect()
    }

    /// The oracle decides the count; the planner only bounds it.
    fn target_track_count(&self, vibe: &VibeAnalysis, duration_minutes: u32) -> usize {
        let decided = vibe.track_count.map(|n| n as usize).unwrap_or_else(|| {
            (duration_minutes / FALLBACK_MINUTES_PER_TRACK).max(1) as usize
        });
        decided.clamp(MIN_TRACKS, MAX_TRACKS)
    }

    fn enter_stage(&self, stage: PlanStage, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(PlanError::Cancelled);
        }
        self.event_bus.emit(PipelineEvent::PlanStageChanged {
            stage: stage.as_str().to_string(),
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }
}

fn default_key_moments(track_count: usize) -> Vec<KeyMoment> {
    if track_count == 0 {
        return Vec::new();
    }
    vec![
        KeyMoment {
            position: 1,
            description: "Opening - set the mood".to_string(),
        },
        KeyMoment {
            position: (track_count / 2).max(1) as u32,
            description: "Peak time".to_string(),
        },
        KeyMoment {
            position: track_count as u32,
            description: "Closing".to_string(),
        },
    ]
}
