// crates/stage-gate-core/tests/scenarios.rs
// ============================================================================
// Test: End-to-End Scheduler Scenarios
// Description: Literal scenario tests covering the happy path, claim races,
// ordering rejection, failure propagation, ready-set ordering, and
// distribution at bigint scale.
// ============================================================================

#![allow(clippy::unwrap_used, reason = "test assertions are permitted to unwrap")]
#![allow(clippy::expect_used, reason = "test assertions are permitted to use expect for clarity")]
#![allow(clippy::panic, reason = "test assertions are permitted to panic via assert!")]

use stage_gate_core::AgentId;
use stage_gate_core::AgentName;
use stage_gate_core::AttributionEngine;
use stage_gate_core::InMemoryPipelineStore;
use stage_gate_core::OrchestratorError;
use stage_gate_core::PipelineId;
use stage_gate_core::PipelineScheduler;
use stage_gate_core::PipelineStatus;
use stage_gate_core::SchedulerConfig;
use stage_gate_core::StageName;
use stage_gate_core::StageStatus;
use stage_gate_core::Timestamp;
use stage_gate_core::core::output::PublishOutput;
use stage_gate_core::core::output::ResearchOutput;
use stage_gate_core::core::output::StageOutput;

fn scheduler() -> PipelineScheduler<InMemoryPipelineStore> {
    PipelineScheduler::new(InMemoryPipelineStore::new(), SchedulerConfig::default())
}

fn research_output() -> StageOutput {
    StageOutput::Research(ResearchOutput {
        topic: "Why cats purr".to_owned(),
        facts: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
        sources: vec!["wiki".to_owned()],
        hooks: vec!["hook1".to_owned(), "hook2".to_owned()],
        target_audience: "cat owners".to_owned(),
        estimated_duration: 60,
    })
}

fn publish_output() -> StageOutput {
    StageOutput::Publish(PublishOutput { platforms: vec![], published_at: 0 })
}

fn complete_as(
    scheduler: &PipelineScheduler<InMemoryPipelineStore>,
    pipeline_id: &PipelineId,
    stage_name: StageName,
    agent_id: &str,
    agent_name: &str,
    output: StageOutput,
    tick: u64,
) {
    let stage = scheduler
        .claim_stage(pipeline_id, stage_name, AgentId::new(agent_id), AgentName::new(agent_name), Timestamp::Logical(tick))
        .expect("claim succeeds");
    scheduler.start_stage(&stage.id, Timestamp::Logical(tick)).expect("start succeeds");
    scheduler.complete_stage(&stage.id, output, vec![], Timestamp::Logical(tick)).expect("complete succeeds");
}

// ============================================================================
// S1 — Happy path completes and attributes correctly.
// ============================================================================

#[test]
fn s1_happy_path_completes_and_attributes_correctly() {
    let scheduler = scheduler();
    let pipeline_id = PipelineId::new("s1");
    scheduler.create_pipeline(pipeline_id.clone(), "Why cats purr", "", Timestamp::Logical(0)).expect("create succeeds");
    scheduler.start_pipeline(&pipeline_id, Timestamp::Logical(1)).expect("start succeeds");

    complete_as(&scheduler, &pipeline_id, StageName::Research, "agent-1", "A1", research_output(), 2);
    complete_as(&scheduler, &pipeline_id, StageName::Script, "agent-1", "A1", scripted_output(), 3);
    complete_as(&scheduler, &pipeline_id, StageName::Voice, "agent-1", "A1", voice_output(), 4);
    complete_as(&scheduler, &pipeline_id, StageName::Music, "agent-2", "A2", music_output(), 5);
    complete_as(&scheduler, &pipeline_id, StageName::Visual, "agent-2", "A2", visual_output(), 6);
    complete_as(&scheduler, &pipeline_id, StageName::Editor, "agent-1", "A1", editor_output(), 7);
    complete_as(&scheduler, &pipeline_id, StageName::Publish, "agent-2", "A2", publish_output(), 8);

    let (pipeline, _stages) = scheduler.get_pipeline(&pipeline_id).expect("pipeline exists");
    assert_eq!(pipeline.status, PipelineStatus::Complete);

    let attributions = vec![
        (StageName::Research, AgentId::new("agent-1")),
        (StageName::Script, AgentId::new("agent-1")),
        (StageName::Voice, AgentId::new("agent-1")),
        (StageName::Music, AgentId::new("agent-2")),
        (StageName::Visual, AgentId::new("agent-2")),
        (StageName::Editor, AgentId::new("agent-1")),
        (StageName::Publish, AgentId::new("agent-2")),
    ];
    let shares = AttributionEngine::distribute(1_000_000, &attributions);
    assert_eq!(shares.get(&AgentId::new("agent-1")), Some(&700_000));
    assert_eq!(shares.get(&AgentId::new("agent-2")), Some(&300_000));
}

fn scripted_output() -> StageOutput {
    use stage_gate_core::core::output::ScriptOutput;
    StageOutput::Script(ScriptOutput {
        hook: "hook".to_owned(),
        body: vec![],
        cta: "subscribe".to_owned(),
        full_script: "full".to_owned(),
        estimated_duration: 60,
        speaker_notes: vec![],
    })
}

fn voice_output() -> StageOutput {
    use stage_gate_core::core::output::VoiceOutput;
    StageOutput::Voice(VoiceOutput { audio_url: "a".to_owned(), duration_s: 60.0, transcript: "t".to_owned(), timestamps: vec![] })
}

fn music_output() -> StageOutput {
    use stage_gate_core::core::output::MusicOutput;
    StageOutput::Music(MusicOutput { audio_url: "m".to_owned(), duration_s: 60.0, genre: "lofi".to_owned(), mood: "calm".to_owned() })
}

fn visual_output() -> StageOutput {
    use stage_gate_core::core::output::VisualOutput;
    StageOutput::Visual(VisualOutput { clips: vec![], overlays: vec![] })
}

fn editor_output() -> StageOutput {
    use stage_gate_core::core::output::EditorOutput;
    use stage_gate_core::core::output::VideoFormat;
    StageOutput::Editor(EditorOutput {
        video_url: "v".to_owned(),
        thumbnail_url: "t".to_owned(),
        duration_s: 60.0,
        format: VideoFormat { width: 1920, height: 1080, fps: 30, codec: "h264".to_owned() },
        render_time_s: 12.0,
    })
}

// ============================================================================
// S2 — Race on claim.
// ============================================================================

#[test]
fn s2_race_on_claim_exactly_one_winner() {
    let scheduler = scheduler();
    let pipeline_id = PipelineId::new("s2");
    scheduler.create_pipeline(pipeline_id.clone(), "topic", "", Timestamp::Logical(0)).expect("create succeeds");
    scheduler.start_pipeline(&pipeline_id, Timestamp::Logical(1)).expect("start succeeds");

    let w1 = scheduler.claim_stage(&pipeline_id, StageName::Research, AgentId::new("w1"), AgentName::new("W1"), Timestamp::Logical(2));
    let w2 = scheduler.claim_stage(&pipeline_id, StageName::Research, AgentId::new("w2"), AgentName::new("W2"), Timestamp::Logical(2));

    let outcomes = [w1.is_ok(), w2.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1, "exactly one claim must win");

    let (_pipeline, stages) = scheduler.get_pipeline(&pipeline_id).expect("pipeline exists");
    let research = stages.iter().find(|stage| stage.stage_name == StageName::Research).expect("research stage exists");
    assert_eq!(research.status, StageStatus::Claimed);
    assert!(research.agent_id == Some(AgentId::new("w1")) || research.agent_id == Some(AgentId::new("w2")));
}

// ============================================================================
// S3 — Out-of-order claim is rejected.
// ============================================================================

#[test]
fn s3_out_of_order_claim_is_rejected_then_succeeds() {
    let scheduler = scheduler();
    let pipeline_id = PipelineId::new("s3");
    scheduler.create_pipeline(pipeline_id.clone(), "topic", "", Timestamp::Logical(0)).expect("create succeeds");
    scheduler.start_pipeline(&pipeline_id, Timestamp::Logical(1)).expect("start succeeds");

    let premature = scheduler.claim_stage(&pipeline_id, StageName::Script, AgentId::new("a1"), AgentName::new("A1"), Timestamp::Logical(2));
    assert!(matches!(premature, Err(OrchestratorError::PreconditionFailed(_))));

    complete_as(&scheduler, &pipeline_id, StageName::Research, "a1", "A1", research_output(), 3);

    let after = scheduler.claim_stage(&pipeline_id, StageName::Script, AgentId::new("a1"), AgentName::new("A1"), Timestamp::Logical(4));
    assert!(after.is_ok());
}

// ============================================================================
// S4 — Failure stops progression.
// ============================================================================

#[test]
fn s4_failure_stops_progression() {
    let scheduler = scheduler();
    let pipeline_id = PipelineId::new("s4");
    scheduler.create_pipeline(pipeline_id.clone(), "topic", "", Timestamp::Logical(0)).expect("create succeeds");
    scheduler.start_pipeline(&pipeline_id, Timestamp::Logical(1)).expect("start succeeds");

    complete_as(&scheduler, &pipeline_id, StageName::Research, "a1", "A1", research_output(), 2);

    let script = scheduler
        .claim_stage(&pipeline_id, StageName::Script, AgentId::new("a1"), AgentName::new("A1"), Timestamp::Logical(3))
        .expect("claim succeeds");
    scheduler.fail_stage(&script.id, "llm_timeout", Timestamp::Logical(4)).expect("fail succeeds");

    let (pipeline, stages) = scheduler.get_pipeline(&pipeline_id).expect("pipeline exists");
    assert_eq!(pipeline.status, PipelineStatus::Failed);
    let script_stage = stages.iter().find(|stage| stage.stage_name == StageName::Script).expect("script stage exists");
    assert_eq!(script_stage.error.as_deref(), Some("llm_timeout"));

    let voice_claim = scheduler.claim_stage(&pipeline_id, StageName::Voice, AgentId::new("a1"), AgentName::new("A1"), Timestamp::Logical(5));
    assert!(matches!(voice_claim, Err(OrchestratorError::PreconditionFailed(_))));
}

// ============================================================================
// S5 — Ready set ordering.
// ============================================================================

#[test]
fn s5_ready_set_orders_by_stage_then_pipeline_age() {
    let scheduler = scheduler();

    let p1 = PipelineId::new("p1");
    let p2 = PipelineId::new("p2");
    let p3 = PipelineId::new("p3");

    scheduler.create_pipeline(p1.clone(), "p1", "", Timestamp::Logical(0)).expect("create succeeds");
    scheduler.start_pipeline(&p1, Timestamp::Logical(0)).expect("start succeeds");
    complete_as(&scheduler, &p1, StageName::Research, "a1", "A1", research_output(), 1);
    complete_as(&scheduler, &p1, StageName::Script, "a1", "A1", scripted_output(), 1);

    scheduler.create_pipeline(p2.clone(), "p2", "", Timestamp::Logical(1)).expect("create succeeds");
    scheduler.start_pipeline(&p2, Timestamp::Logical(1)).expect("start succeeds");

    scheduler.create_pipeline(p3.clone(), "p3", "", Timestamp::Logical(2)).expect("create succeeds");
    scheduler.start_pipeline(&p3, Timestamp::Logical(2)).expect("start succeeds");

    let ready = scheduler.ready_set(None).expect("ready set succeeds");
    let keys: Vec<(StageName, PipelineId)> = ready.iter().map(|entry| (entry.stage.stage_name, entry.pipeline.id.clone())).collect();
    assert_eq!(keys, vec![(StageName::Research, p2), (StageName::Research, p3), (StageName::Voice, p1)]);
}

// ============================================================================
// S6 — Attribution distribution with bigint totals.
// ============================================================================

#[test]
fn s6_distribution_with_bigint_scale_total_is_exact() {
    let agent = AgentId::new("X");
    let attributions: Vec<_> = StageName::ORDER.into_iter().map(|stage| (stage, agent.clone())).collect();
    let total: u128 = 1_000_000_000_000_000_000_000_000;
    let shares = AttributionEngine::distribute(total, &attributions);
    assert_eq!(shares.get(&agent), Some(&total));
}

// ============================================================================
// Additional round-trip and idempotence laws from the testable properties.
// ============================================================================

#[test]
fn creating_and_fetching_a_pipeline_round_trips() {
    let scheduler = scheduler();
    let pipeline_id = PipelineId::new("rt1");
    let created = scheduler.create_pipeline(pipeline_id.clone(), "topic", "desc", Timestamp::Logical(0)).expect("create succeeds");
    let (fetched, _stages) = scheduler.get_pipeline(&pipeline_id).expect("pipeline exists");
    assert_eq!(created, fetched);
}

#[test]
fn claiming_twice_yields_success_then_precondition_failed() {
    let scheduler = scheduler();
    let pipeline_id = PipelineId::new("rt2");
    scheduler.create_pipeline(pipeline_id.clone(), "topic", "", Timestamp::Logical(0)).expect("create succeeds");
    scheduler.start_pipeline(&pipeline_id, Timestamp::Logical(0)).expect("start succeeds");
    let first = scheduler.claim_stage(&pipeline_id, StageName::Research, AgentId::new("a1"), AgentName::new("A1"), Timestamp::Logical(1));
    assert!(first.is_ok());
    let second = scheduler.claim_stage(&pipeline_id, StageName::Research, AgentId::new("a1"), AgentName::new("A1"), Timestamp::Logical(2));
    assert!(matches!(second, Err(OrchestratorError::PreconditionFailed(_))));
}

#[test]
fn completing_twice_yields_success_then_invalid_state() {
    let scheduler = scheduler();
    let pipeline_id = PipelineId::new("rt3");
    scheduler.create_pipeline(pipeline_id.clone(), "topic", "", Timestamp::Logical(0)).expect("create succeeds");
    scheduler.start_pipeline(&pipeline_id, Timestamp::Logical(0)).expect("start succeeds");
    let stage = scheduler
        .claim_stage(&pipeline_id, StageName::Research, AgentId::new("a1"), AgentName::new("A1"), Timestamp::Logical(1))
        .expect("claim succeeds");
    scheduler.start_stage(&stage.id, Timestamp::Logical(2)).expect("start succeeds");
    let first = scheduler.complete_stage(&stage.id, research_output(), vec![], Timestamp::Logical(3));
    assert!(first.is_ok());
    let second = scheduler.complete_stage(&stage.id, research_output(), vec![], Timestamp::Logical(4));
    assert!(matches!(second, Err(OrchestratorError::InvalidState(_))));
}

#[test]
fn reaper_fails_a_stalled_claimed_stage() {
    let scheduler = PipelineScheduler::new(
        InMemoryPipelineStore::new(),
        SchedulerConfig { reaper_timeout_ms: 10, ..SchedulerConfig::default() },
    );
    let pipeline_id = PipelineId::new("reap1");
    scheduler.create_pipeline(pipeline_id.clone(), "topic", "", Timestamp::Logical(0)).expect("create succeeds");
    scheduler.start_pipeline(&pipeline_id, Timestamp::Logical(0)).expect("start succeeds");
    scheduler
        .claim_stage(&pipeline_id, StageName::Research, AgentId::new("a1"), AgentName::new("A1"), Timestamp::Logical(0))
        .expect("claim succeeds");

    let reaped = scheduler.reap_stalled(Timestamp::Logical(50)).expect("reap succeeds");
    assert_eq!(reaped.len(), 1);
    let (pipeline, _stages) = scheduler.get_pipeline(&pipeline_id).expect("pipeline exists");
    assert_eq!(pipeline.status, PipelineStatus::Failed);
}

#[test]
fn completing_a_stage_with_the_wrong_output_variant_is_rejected() {
    let scheduler = scheduler();
    let pipeline_id = PipelineId::new("rt4");
    scheduler.create_pipeline(pipeline_id.clone(), "topic", "", Timestamp::Logical(0)).expect("create succeeds");
    scheduler.start_pipeline(&pipeline_id, Timestamp::Logical(0)).expect("start succeeds");
    let stage = scheduler
        .claim_stage(&pipeline_id, StageName::Research, AgentId::new("a1"), AgentName::new("A1"), Timestamp::Logical(1))
        .expect("claim succeeds");
    scheduler.start_stage(&stage.id, Timestamp::Logical(2)).expect("start succeeds");

    let result = scheduler.complete_stage(&stage.id, publish_output(), vec![], Timestamp::Logical(3));
    assert!(matches!(result, Err(OrchestratorError::InvalidInput(_))));
}

