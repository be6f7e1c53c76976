//! Council Pipeline (C6, §4.6): the orchestrator tying together the meta-planner
//! (C5), the model adapters (C1), the voting tally (C2), the iteration
//! controller (C3) and the memory manager (C4) into one `RunCouncil` call.
//!
//! Generalizes the teacher's [`crate::use_cases::run_quorum::RunQuorumUseCase`]
//! from a fixed, non-iterating 3-phase flow into the iterative
//! opinions -> review -> voting -> synthesis loop with self-correction. The
//! parallel-dispatch-via-`JoinSet` idiom is carried over from
//! `run_quorum::RunQuorumUseCase::phase_initial`; the per-call cancellation
//! pattern from `crate::use_cases::shared::check_cancelled`.

use crate::ports::event_bus::EventBus;
use crate::ports::model_adapter::{AdapterError, CompletionOptions, CompletionResponse, ModelAdapter};
use crate::ports::session_repository::{RepositoryError, SessionRepository};
use crate::use_cases::iteration_controller::{IterationContext, IterationController};
use crate::use_cases::memory_manager::MemoryManager;
use crate::use_cases::meta_planner::{MetaPlanner, PlannerError};
use quorum_domain::council::{
    tally, CouncilPlan, CouncilSession, EventType, IterationConfig, IterationSnapshot, Member,
    MemberResponse, MemoryConfig, Message, Role, SessionConfig, Stage, StagePayload, StageResult,
    TraceEvent, Vote, VotingMethod, VotingResult,
};
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("planner error: {0}")]
    Planner(#[from] PlannerError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("no council member available to act as synthesizer")]
    NoSynthesizer,
}

/// `opts` to `RunCouncil` (§4.6, §6.1).
pub struct RunOptions {
    /// Bypasses the meta-planner entirely when present.
    pub plan: Option<CouncilPlan>,
    pub iteration_override: Option<IterationConfig>,
    pub memory_override: Option<MemoryConfig>,
    pub session_override: Option<SessionConfig>,
    pub cancellation: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            plan: None,
            iteration_override: None,
            memory_override: None,
            session_override: None,
            cancellation: CancellationToken::new(),
        }
    }
}

/// Wires C1 (adapters), C7 (event bus), and C8 (session repository) together
/// with C2-C5 to run one council deliberation end to end (§4.6).
pub struct CouncilPipeline {
    adapters: HashMap<String, Arc<dyn ModelAdapter>>,
    event_bus: Arc<dyn EventBus>,
    session_repo: Arc<dyn SessionRepository>,
    meta_planner: MetaPlanner,
    planner_adapter: Option<Arc<dyn ModelAdapter>>,
}

impl CouncilPipeline {
    pub fn new(
        adapters: HashMap<String, Arc<dyn ModelAdapter>>,
        event_bus: Arc<dyn EventBus>,
        session_repo: Arc<dyn SessionRepository>,
        meta_planner: MetaPlanner,
    ) -> Self {
        Self { adapters, event_bus, session_repo, meta_planner, planner_adapter: None }
    }

    pub fn with_planner_adapter(mut self, adapter: Arc<dyn ModelAdapter>) -> Self {
        self.planner_adapter = Some(adapter);
        self
    }

    /// Runs one full deliberation (§4.6 algorithm, steps 1-8). Component
    /// failures are captured as `session.status = failed` rather than
    /// returned as `Err` (§7) — `Err` is reserved for failures that prevent a
    /// session from ever being recorded (repository writes, planner errors
    /// when no fallback plan exists).
    pub async fn run_council(&self, question: &str, opts: RunOptions) -> Result<CouncilSession, PipelineError> {
        let start = Instant::now();
        let session_id = generate_session_id();
        let emitter = EventEmitter::new(self.event_bus.clone(), self.session_repo.clone(), session_id.clone(), start);

        emitter.emit(emitter.build(EventType::SessionStart)).await;

        let known_models: Vec<String> = self.adapters.keys().cloned().collect();
        let mut plan = match opts.plan {
            Some(p) => p,
            None => self.meta_planner.plan(question, self.planner_adapter.as_deref()).await?,
        };
        plan = plan.apply_safety_clamps(&known_models);
        emitter
            .emit(emitter.build(EventType::PlanReady).with_data(serde_json::to_value(&plan).unwrap_or_default()))
            .await;

        let members = realize_members(&plan, &self.adapters);
        let member_adapters: HashMap<String, Arc<dyn ModelAdapter>> = members
            .iter()
            .filter_map(|m| self.adapters.get(&m.model.id).cloned().map(|a| (m.id.clone(), a)))
            .collect();

        let mut session = CouncilSession::new(session_id.clone(), question, plan.clone(), 0).with_members(members);
        self.session_repo.create(session.clone()).await?;
        session.start_running(emitter.now_ms());

        if member_adapters.is_empty() {
            session.fail("no council member has a registered adapter", emitter.now_ms());
            return self.finish(&emitter, session).await;
        }

        let iteration_config = opts.iteration_override.unwrap_or_else(|| {
            let mut cfg = IterationConfig::default();
            cfg.enabled = plan.allow_iterations;
            cfg.max_iterations = if plan.allow_iterations { plan.max_iterations } else { 1 };
            cfg.strategy = plan.iteration_strategy;
            cfg
        });
        let memory_config = opts.memory_override.unwrap_or_default();
        let session_config = opts.session_override.unwrap_or_default();
        let call_timeout = Duration::from_millis(session_config.timeout_ms.max(1));

        let mut iteration_controller = IterationController::new(iteration_config);
        let mut memory_manager = MemoryManager::new(memory_config.max_context_tokens);
        let compressor = member_adapters.values().next().cloned();

        let mut final_voting: Option<VotingResult> = None;

        loop {
            if opts.cancellation.is_cancelled() {
                session.fail("cancelled", emitter.now_ms());
                break;
            }

            let iteration_number = iteration_controller.iteration_index() + 1;
            let iter_start = Instant::now();
            emitter
                .emit(emitter.build(EventType::IterationStart).with_data(serde_json::json!({ "iteration": iteration_number })))
                .await;

            let context_prompt = if iteration_number > 1 { memory_manager.get_context_prompt() } else { String::new() };
            let user_message =
                if context_prompt.is_empty() { question.to_string() } else { format!("{context_prompt}\n\n{question}") };

            // Opinions stage (§4.6.c)
            let opinion_prompts: Vec<(Member, Vec<Message>)> = session
                .members
                .iter()
                .filter(|m| m.is_active && m.role.is_opinion_giving())
                .map(|m| (m.clone(), vec![Message::system(m.system_prompt()), Message::user(user_message.clone())]))
                .collect();
            let stage_start = emitter.now_ms();
            let opinions = dispatch_stage(
                &emitter,
                &opts.cancellation,
                Stage::Opinions,
                &member_adapters,
                opinion_prompts,
                session_config.parallel_execution,
                call_timeout,
            )
            .await;
            if opinions.is_empty() {
                session.fail("all council members failed during the opinions stage", emitter.now_ms());
                break;
            }
            session.push_stage(
                StageResult::new(StagePayload::Opinions { responses: opinions.clone() }, stage_start, emitter.now_ms()),
                emitter.now_ms(),
            );

            // Review stage (§4.6.d)
            let opinions_digest = labelled_digest(&opinions);
            let review_prompts: Vec<(Member, Vec<Message>)> = session
                .members
                .iter()
                .filter(|m| m.is_active && m.role.is_reviewing())
                .map(|m| {
                    (
                        m.clone(),
                        vec![Message::system(m.system_prompt()), Message::user(format!("Opinions to review:\n\n{opinions_digest}"))],
                    )
                })
                .collect();
            let stage_start = emitter.now_ms();
            let reviews = dispatch_stage(
                &emitter,
                &opts.cancellation,
                Stage::Review,
                &member_adapters,
                review_prompts,
                session_config.parallel_execution,
                call_timeout,
            )
            .await;
            session.push_stage(
                StageResult::new(StagePayload::Review { responses: reviews.clone() }, stage_start, emitter.now_ms()),
                emitter.now_ms(),
            );

            // Voting stage (§4.6.e), with self-correction sub-loop (§4.6.f)
            let debate_digest = format!("{opinions_digest}\n\n{}", labelled_digest(&reviews));
            let mut active_voters: Vec<Member> =
                session.members.iter().filter(|m| m.is_active && !m.role.is_voting_excluded()).cloned().collect();

            let stage_start = emitter.now_ms();
            let (mut current_votes, mut current_tally) = run_voting_stage(
                &emitter,
                &opts.cancellation,
                &member_adapters,
                &active_voters,
                question,
                &debate_digest,
                plan.voting_method,
                &session.members,
                call_timeout,
            )
            .await;

            if current_votes.is_empty() {
                session.fail("voting stage produced zero votes", emitter.now_ms());
                break;
            }

            while session_config.self_correction_enabled
                && current_tally.confidence_avg < session_config.self_correction_threshold
                && session.correction_rounds < session_config.max_correction_rounds
            {
                let Some(backup) = session.members.iter_mut().find(|m| m.is_backup && !m.is_active) else { break };
                backup.activate();
                let activated = backup.clone();
                active_voters.push(activated.clone());

                emitter.emit(emitter.build(EventType::BackupActivated).with_member(&activated.id, &activated.name)).await;
                emitter.emit(emitter.build(EventType::CorrectionTriggered)).await;
                session.correction_rounds += 1;

                let (votes, result) = run_voting_stage(
                    &emitter,
                    &opts.cancellation,
                    &member_adapters,
                    &active_voters,
                    question,
                    &debate_digest,
                    plan.voting_method,
                    &session.members,
                    call_timeout,
                )
                .await;
                current_votes = votes;
                current_tally = result;
            }

            let voting_stage = StageResult::new(
                StagePayload::Voting { votes: current_votes.clone(), result: current_tally.clone() },
                stage_start,
                emitter.now_ms(),
            );
            session.push_stage(voting_stage.clone(), emitter.now_ms());
            emitter
                .emit(
                    emitter.build(EventType::VotingComplete).with_data(
                        serde_json::json!({ "winner": current_tally.winner, "confidenceAvg": current_tally.confidence_avg }),
                    ),
                )
                .await;

            let iteration_tokens: u64 =
                opinions.iter().chain(reviews.iter()).map(|r| r.token_usage.total as u64).sum();
            iteration_controller.record_iteration(
                current_tally.confidence_avg,
                iteration_tokens,
                iter_start.elapsed().as_millis() as u64,
            );

            memory_manager.update_from_stage_result(&voting_stage, session_config.self_correction_threshold);
            if memory_manager.is_over_limit()
                && let Some(compressor_adapter) = &compressor
            {
                let (before, after) = memory_manager.compress(compressor_adapter.as_ref()).await;
                emitter
                    .emit(emitter.build(EventType::MemoryCompressed).with_data(serde_json::json!({
                        "tokensBefore": before,
                        "tokensAfter": after,
                    })))
                    .await;
            }

            session.push_iteration(
                IterationSnapshot {
                    number: iteration_number,
                    confidence: current_tally.confidence_avg,
                    tokens_used: iteration_tokens,
                    duration_ms: iter_start.elapsed().as_millis() as u64,
                },
                emitter.now_ms(),
            );
            emitter
                .emit(emitter.build(EventType::IterationEnd).with_data(serde_json::json!({
                    "iteration": iteration_number,
                    "confidence": current_tally.confidence_avg,
                })))
                .await;

            final_voting = Some(current_tally);
            let _ = self.session_repo.update(session.clone()).await;

            let (should_continue, _stop_reason) = iteration_controller.should_continue();
            if !plan.allow_iterations || !should_continue {
                break;
            }
        }

        if !session.is_terminal() {
            match final_voting {
                Some(voting) => {
                    match run_synthesis_stage(&emitter, &opts.cancellation, &member_adapters, &session, &voting, call_timeout)
                        .await
                    {
                        Ok((content, stage)) => {
                            session.push_stage(stage, emitter.now_ms());
                            session.complete(content, voting.confidence_avg, emitter.now_ms());
                        }
                        Err(err) => session.fail(err.to_string(), emitter.now_ms()),
                    }
                }
                None => session.fail("no voting result reached before the iteration loop ended", emitter.now_ms()),
            }
        }

        self.finish(&emitter, session).await
    }

    async fn finish(&self, emitter: &EventEmitter, session: CouncilSession) -> Result<CouncilSession, PipelineError> {
        if let Some(error) = &session.error {
            emitter.emit(emitter.build(EventType::Error).with_data(serde_json::json!({ "error": error }))).await;
        }
        emitter.emit(emitter.build(EventType::SessionEnd)).await;
        self.session_repo.update(session.clone()).await?;
        Ok(session)
    }
}

/// Publishes trace events to the event bus and persists them to the session
/// repository, with a monotonic per-session id and a `createdAt`-relative
/// clock (§3 `TraceEvent.timestamp`, §4.7).
#[derive(Clone)]
struct EventEmitter {
    event_bus: Arc<dyn EventBus>,
    session_repo: Arc<dyn SessionRepository>,
    session_id: String,
    start: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventEmitter {
    fn new(event_bus: Arc<dyn EventBus>, session_repo: Arc<dyn SessionRepository>, session_id: String, start: Instant) -> Self {
        Self { event_bus, session_repo, session_id, start, next_id: Arc::new(AtomicU64::new(1)) }
    }

    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn build(&self, event_type: EventType) -> TraceEvent {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        TraceEvent::new(id, self.session_id.clone(), event_type, self.now_ms())
    }

    async fn emit(&self, event: TraceEvent) {
        self.event_bus.publish(event.clone()).await;
        if let Err(e) = self.session_repo.append_trace(&self.session_id, event).await {
            warn!(error = %e, "failed to persist trace event");
        }
    }
}

/// Builds live [`Member`]s from a plan's seats, binding each to its adapter's
/// [`ModelConfig`](quorum_domain::council::ModelConfig) (§4.6 step 3). Seats
/// naming a model with no registered adapter are dropped — the safety clamp
/// (§4.5) should already have done this given the real known-model set, this
/// is a defensive second pass.
fn realize_members(plan: &CouncilPlan, adapters: &HashMap<String, Arc<dyn ModelAdapter>>) -> Vec<Member> {
    plan.members
        .iter()
        .enumerate()
        .filter_map(|(idx, seat)| {
            let adapter = adapters.get(&seat.model)?;
            let mut member = Member::new(format!("m{idx}"), seat.model.clone(), seat.role, adapter.model().clone());
            if let Some(persona) = &seat.persona {
                member = member.with_persona(persona.clone());
            }
            if let Some(weight) = seat.weight {
                member = member.with_weight(weight);
            }
            if seat.role == Role::Backup {
                member = member.as_backup();
            }
            Some(member)
        })
        .collect()
}

fn completion_options_for(member: &Member) -> CompletionOptions {
    let mut opts = CompletionOptions::default().with_max_tokens(member.model.max_tokens);
    if !member.model.reasoning {
        opts = opts.with_temperature(member.model.default_temperature);
    }
    opts
}

fn to_member_response(member: &Member, completion: CompletionResponse, timestamp: u64) -> MemberResponse {
    MemberResponse {
        member_id: member.id.clone(),
        member_name: member.name.clone(),
        model_id: member.model.id.clone(),
        content: completion.content,
        token_usage: completion.usage,
        latency_ms: completion.latency.as_millis() as u64,
        timestamp,
    }
}

fn labelled_digest(responses: &[MemberResponse]) -> String {
    responses.iter().map(|r| format!("### {}\n{}\n", r.member_name, r.content)).collect::<Vec<_>>().join("\n")
}

/// Races one adapter call against the session's cancellation token and the
/// derived call deadline (§4.6 cancellation, §5).
async fn run_with_cancellation<F>(
    cancellation: &CancellationToken,
    timeout: Duration,
    future: F,
) -> Result<CompletionResponse, AdapterError>
where
    F: std::future::Future<Output = Result<CompletionResponse, AdapterError>>,
{
    tokio::select! {
        _ = cancellation.cancelled() => Err(AdapterError::Timeout),
        result = tokio::time::timeout(timeout, future) => {
            result.unwrap_or(Err(AdapterError::Timeout))
        }
    }
}

/// Dispatches one stage's member calls, in parallel or insertion order
/// (§4.6.c/d/e, §5), emitting `member-request`/`member-response`/`error`
/// around each call and `stage-start`/`stage-end` around the whole stage.
/// Non-critical per-member failures are dropped from the result, not
/// propagated — the pipeline decides stage-level failure from the resulting
/// response count.
async fn dispatch_stage(
    emitter: &EventEmitter,
    cancellation: &CancellationToken,
    stage: Stage,
    member_adapters: &HashMap<String, Arc<dyn ModelAdapter>>,
    prompts: Vec<(Member, Vec<Message>)>,
    parallel: bool,
    call_timeout: Duration,
) -> Vec<MemberResponse> {
    emitter.emit(emitter.build(EventType::StageStart).with_stage(stage)).await;
    let mut responses = Vec::new();

    if parallel {
        let mut join_set = JoinSet::new();
        for (member, messages) in prompts {
            let Some(adapter) = member_adapters.get(&member.id).cloned() else { continue };
            emitter.emit(emitter.build(EventType::MemberRequest).with_stage(stage).with_member(&member.id, &member.name)).await;
            let emitter = emitter.clone();
            let cancellation = cancellation.clone();
            join_set.spawn(async move {
                let opts = completion_options_for(&member);
                let result = run_with_cancellation(&cancellation, call_timeout, adapter.complete(&messages, &opts)).await;
                (member, emitter, result)
            });
        }
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((member, emitter, Ok(completion))) => {
                    let mr = to_member_response(&member, completion, emitter.now_ms());
                    emitter
                        .emit(
                            emitter
                                .build(EventType::MemberResponse)
                                .with_stage(stage)
                                .with_member(&member.id, &member.name)
                                .with_duration(mr.latency_ms),
                        )
                        .await;
                    responses.push(mr);
                }
                Ok((member, emitter, Err(err))) => {
                    warn!(member = %member.id, error = %err, "council member failed");
                    emitter
                        .emit(
                            emitter.build(EventType::Error).with_stage(stage).with_member(&member.id, &member.name).with_data(
                                serde_json::json!({ "error": err.to_string() }),
                            ),
                        )
                        .await;
                }
                Err(join_err) => warn!(error = %join_err, "council member task panicked"),
            }
        }
    } else {
        for (member, messages) in prompts {
            let Some(adapter) = member_adapters.get(&member.id).cloned() else { continue };
            emitter.emit(emitter.build(EventType::MemberRequest).with_stage(stage).with_member(&member.id, &member.name)).await;
            let opts = completion_options_for(&member);
            match run_with_cancellation(cancellation, call_timeout, adapter.complete(&messages, &opts)).await {
                Ok(completion) => {
                    let mr = to_member_response(&member, completion, emitter.now_ms());
                    emitter
                        .emit(
                            emitter
                                .build(EventType::MemberResponse)
                                .with_stage(stage)
                                .with_member(&member.id, &member.name)
                                .with_duration(mr.latency_ms),
                        )
                        .await;
                    responses.push(mr);
                }
                Err(err) => {
                    warn!(member = %member.id, error = %err, "council member failed");
                    emitter
                        .emit(
                            emitter.build(EventType::Error).with_stage(stage).with_member(&member.id, &member.name).with_data(
                                serde_json::json!({ "error": err.to_string() }),
                            ),
                        )
                        .await;
                }
            }
        }
    }

    emitter.emit(emitter.build(EventType::StageEnd).with_stage(stage)).await;
    responses
}

#[allow(clippy::too_many_arguments)]
async fn run_voting_stage(
    emitter: &EventEmitter,
    cancellation: &CancellationToken,
    member_adapters: &HashMap<String, Arc<dyn ModelAdapter>>,
    voters: &[Member],
    question: &str,
    debate_digest: &str,
    voting_method: VotingMethod,
    all_members: &[Member],
    call_timeout: Duration,
) -> (Vec<Vote>, VotingResult) {
    let prompt = format!(
        "The council has been discussing: \"{question}\"\n\n{debate_digest}\n\nRespond with exactly three \
         lines in this form:\nPOSITION: <your chosen position, one sentence>\nCONFIDENCE: <a number between 0 \
         and 1>\nREASONING: <one or two sentences>"
    );
    let voting_prompts: Vec<(Member, Vec<Message>)> = voters
        .iter()
        .map(|m| (m.clone(), vec![Message::system(m.system_prompt()), Message::user(prompt.clone())]))
        .collect();
    let responses =
        dispatch_stage(emitter, cancellation, Stage::Voting, member_adapters, voting_prompts, true, call_timeout).await;

    let votes: Vec<Vote> = responses.iter().map(|r| parse_vote(r, emitter.now_ms())).collect();
    for vote in &votes {
        emitter
            .emit(
                emitter
                    .build(EventType::VoteCast)
                    .with_member(&vote.member_id, &vote.member_name)
                    .with_data(serde_json::json!({ "position": vote.position, "confidence": vote.confidence })),
            )
            .await;
    }
    let result = tally(&votes, voting_method, all_members);
    (votes, result)
}

/// Parses one voting response into a [`Vote`] (§4.6.e): tolerant of missing
/// fields — confidence defaults to 0.7, position falls back to the response's
/// first 100 characters, reasoning falls back to empty.
fn parse_vote(response: &MemberResponse, timestamp: u64) -> Vote {
    static POSITION_RE: OnceLock<Regex> = OnceLock::new();
    static CONFIDENCE_RE: OnceLock<Regex> = OnceLock::new();
    static REASONING_RE: OnceLock<Regex> = OnceLock::new();

    let position_re = POSITION_RE.get_or_init(|| Regex::new(r"(?im)^\s*POSITION:\s*(.+?)\s*$").unwrap());
    let confidence_re = CONFIDENCE_RE.get_or_init(|| Regex::new(r"(?im)^\s*CONFIDENCE:\s*([0-9]*\.?[0-9]+)").unwrap());
    let reasoning_re = REASONING_RE.get_or_init(|| Regex::new(r"(?im)^\s*REASONING:\s*(.+?)\s*$").unwrap());

    let position = position_re
        .captures(&response.content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| response.content.chars().take(100).collect());

    let confidence = confidence_re
        .captures(&response.content)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.7);

    let reasoning =
        reasoning_re.captures(&response.content).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()).unwrap_or_default();

    Vote::new(response.member_id.clone(), response.member_name.clone(), position, confidence, reasoning, timestamp)
}

#[allow(clippy::too_many_arguments)]
async fn run_synthesis_stage(
    emitter: &EventEmitter,
    cancellation: &CancellationToken,
    member_adapters: &HashMap<String, Arc<dyn ModelAdapter>>,
    session: &CouncilSession,
    final_voting: &VotingResult,
    call_timeout: Duration,
) -> Result<(String, StageResult), PipelineError> {
    let synthesizer = session
        .members
        .iter()
        .find(|m| m.role == Role::Synthesizer)
        .or_else(|| session.members.first())
        .cloned()
        .ok_or(PipelineError::NoSynthesizer)?;
    let adapter = member_adapters.get(&synthesizer.id).cloned().ok_or(PipelineError::NoSynthesizer)?;

    let digest = build_synthesis_digest(session);
    let confidence_history: Vec<f64> = session.iterations.iter().map(|i| i.confidence).collect();
    let trend_summary =
        IterationContext { iteration_index: session.iterations.len(), confidence_history, last_improvement: None }
            .trend_summary();

    let prompt = format!(
        "Question: {}\n\nDebate digest (most recent stages):\n{digest}\n\nFinal vote: winner={:?}, \
         confidenceAvg={:.2}\nConfidence trend across iterations: {trend_summary}\n\nProduce the council's final \
         answer now.",
        session.question, final_voting.winner, final_voting.confidence_avg
    );

    let stage_start = emitter.now_ms();
    emitter.emit(emitter.build(EventType::StageStart).with_stage(Stage::Synthesis)).await;
    emitter
        .emit(emitter.build(EventType::MemberRequest).with_stage(Stage::Synthesis).with_member(&synthesizer.id, &synthesizer.name))
        .await;

    let opts = completion_options_for(&synthesizer);
    let messages = vec![Message::system(synthesizer.system_prompt()), Message::user(prompt)];
    let result = run_with_cancellation(cancellation, call_timeout, adapter.complete(&messages, &opts)).await;

    match result {
        Ok(completion) => {
            let response = to_member_response(&synthesizer, completion, emitter.now_ms());
            emitter
                .emit(
                    emitter
                        .build(EventType::MemberResponse)
                        .with_stage(Stage::Synthesis)
                        .with_member(&synthesizer.id, &synthesizer.name),
                )
                .await;
            emitter.emit(emitter.build(EventType::StageEnd).with_stage(Stage::Synthesis)).await;
            let content = response.content.clone();
            let stage = StageResult::new(StagePayload::Synthesis { response, digest }, stage_start, emitter.now_ms());
            Ok((content, stage))
        }
        Err(err) => {
            emitter
                .emit(
                    emitter
                        .build(EventType::Error)
                        .with_stage(Stage::Synthesis)
                        .with_member(&synthesizer.id, &synthesizer.name)
                        .with_data(serde_json::json!({ "error": err.to_string() })),
                )
                .await;
            emitter.emit(emitter.build(EventType::StageEnd).with_stage(Stage::Synthesis)).await;
            Err(PipelineError::SynthesisFailed(err.to_string()))
        }
    }
}

/// Caps the digest to the last six stages (§4.6 step 7), truncating each
/// response to 300 characters and appending the stage's vote tally when it
/// is a voting stage.
fn build_synthesis_digest(session: &CouncilSession) -> String {
    let recent: Vec<&StageResult> = session.stages.iter().rev().take(6).collect();
    let mut out = String::new();
    for stage in recent.into_iter().rev() {
        out.push_str(&format!("### {}\n", stage.stage()));
        for r in stage.responses() {
            let truncated: String = r.content.chars().take(300).collect();
            out.push_str(&format!("- **{}**: {truncated}\n", r.member_name));
        }
        if let Some(v) = stage.voting_result() {
            out.push_str(&format!("- Vote tally: winner={:?}, confidenceAvg={:.2}\n", v.winner, v.confidence_avg));
        }
    }
    out
}

fn generate_session_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    format!("council-{:08x}-{:04x}-{:012x}", (nanos >> 64) as u32, (nanos >> 48) as u16, (nanos & 0xffff_ffff_ffff) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::event_bus::EventHandler;
    use crate::use_cases::meta_planner::{MetaPlanner, PlannerMode};
    use async_trait::async_trait;
    use quorum_domain::council::{ModelConfig, ProviderKind, TokenUsage};
    use std::sync::Mutex;

    struct FixedAdapter {
        model: ModelConfig,
        content: String,
    }

    #[async_trait]
    impl ModelAdapter for FixedAdapter {
        fn model(&self) -> &ModelConfig {
            &self.model
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _opts: &CompletionOptions,
        ) -> Result<CompletionResponse, AdapterError> {
            Ok(CompletionResponse {
                content: self.content.clone(),
                usage: TokenUsage::new(20, 20),
                latency: Duration::from_millis(5),
                finish_reason: crate::ports::model_adapter::FinishReason::Stop,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    fn adapter(id: &str, content: &str) -> Arc<dyn ModelAdapter> {
        Arc::new(FixedAdapter {
            model: ModelConfig::new(id, ProviderKind::AZURE_CHAT, id),
            content: content.to_string(),
        })
    }

    struct InMemoryBus;

    #[async_trait]
    impl EventBus for InMemoryBus {
        async fn publish(&self, _event: TraceEvent) {}

        fn subscribe(&self, _event_type: Option<EventType>, _handler: Arc<dyn EventHandler>) -> u64 {
            0
        }

        fn unsubscribe(&self, _subscription_id: u64) {}
    }

    struct InMemoryRepo {
        sessions: Mutex<HashMap<String, CouncilSession>>,
    }

    impl InMemoryRepo {
        fn new() -> Self {
            Self { sessions: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
    impl SessionRepository for InMemoryRepo {
        async fn create(&self, session: CouncilSession) -> Result<(), RepositoryError> {
            self.sessions.lock().unwrap().insert(session.id.clone(), session);
            Ok(())
        }

        async fn get(&self, id: &str) -> Result<CouncilSession, RepositoryError> {
            self.sessions.lock().unwrap().get(id).cloned().ok_or_else(|| RepositoryError::NotFound(id.to_string()))
        }

        async fn update(&self, session: CouncilSession) -> Result<(), RepositoryError> {
            self.sessions.lock().unwrap().insert(session.id.clone(), session);
            Ok(())
        }

        async fn list(&self, _limit: usize) -> Vec<CouncilSession> {
            self.sessions.lock().unwrap().values().cloned().collect()
        }

        async fn append_trace(&self, _session_id: &str, _event: TraceEvent) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn get_traces(&self, _session_id: &str) -> Result<Vec<TraceEvent>, RepositoryError> {
            Ok(vec![])
        }
    }

    fn fixed_small_plan() -> CouncilPlan {
        use quorum_domain::council::{Complexity, IterationStrategy, PlannedMember};
        CouncilPlan {
            complexity: Complexity::Simple,
            domain: "general".into(),
            reasoning: "test".into(),
            council_size: 3,
            members: vec![
                PlannedMember::new("model-a", Role::OpinionGiver),
                PlannedMember::new("model-b", Role::Reviewer),
                PlannedMember::new("model-c", Role::Synthesizer),
            ],
            voting_method: VotingMethod::Majority,
            allow_iterations: false,
            max_iterations: 1,
            iteration_strategy: IterationStrategy::Refine,
        }
    }

    fn voting_response() -> &'static str {
        "POSITION: entropy measures disorder\nCONFIDENCE: 0.9\nREASONING: thermodynamic definition"
    }

    #[tokio::test]
    async fn completes_a_full_session_with_fixed_plan() {
        let mut adapters: HashMap<String, Arc<dyn ModelAdapter>> = HashMap::new();
        adapters.insert("model-a".into(), adapter("model-a", voting_response()));
        adapters.insert("model-b".into(), adapter("model-b", "Reviewed: looks solid."));
        adapters.insert("model-c".into(), adapter("model-c", "Final synthesized answer."));

        let pipeline = CouncilPipeline::new(
            adapters,
            Arc::new(InMemoryBus),
            Arc::new(InMemoryRepo::new()),
            MetaPlanner::new(PlannerMode::Static),
        );

        let opts = RunOptions { plan: Some(fixed_small_plan()), ..Default::default() };
        let session = pipeline.run_council("Define entropy in one sentence.", opts).await.unwrap();

        assert_eq!(session.status, quorum_domain::council::SessionStatus::Completed);
        assert!(session.final_answer.is_some());
        assert!(session.final_confidence.unwrap() > 0.0);
        assert!(!session.stages.is_empty());
    }

    #[tokio::test]
    async fn fails_session_when_all_opinion_givers_fail() {
        struct FailingAdapter {
            model: ModelConfig,
        }

        #[async_trait]
        impl ModelAdapter for FailingAdapter {
            fn model(&self) -> &ModelConfig {
                &self.model
            }

            async fn complete(
                &self,
                _messages: &[Message],
                _opts: &CompletionOptions,
            ) -> Result<CompletionResponse, AdapterError> {
                Err(AdapterError::Upstream("down".into()))
            }

            async fn health_check(&self) -> bool {
                false
            }
        }

        let mut adapters: HashMap<String, Arc<dyn ModelAdapter>> = HashMap::new();
        adapters.insert(
            "model-a".into(),
            Arc::new(FailingAdapter { model: ModelConfig::new("model-a", ProviderKind::AZURE_CHAT, "model-a") }),
        );
        adapters.insert("model-b".into(), adapter("model-b", "fine"));
        adapters.insert("model-c".into(), adapter("model-c", "fine"));

        let pipeline = CouncilPipeline::new(
            adapters,
            Arc::new(InMemoryBus),
            Arc::new(InMemoryRepo::new()),
            MetaPlanner::new(PlannerMode::Static),
        );

        let opts = RunOptions { plan: Some(fixed_small_plan()), ..Default::default() };
        let session = pipeline.run_council("Define entropy in one sentence.", opts).await.unwrap();

        assert_eq!(session.status, quorum_domain::council::SessionStatus::Failed);
        assert!(session.error.is_some());
    }

    #[test]
    fn parse_vote_falls_back_on_missing_fields() {
        let response = MemberResponse {
            member_id: "m1".into(),
            member_name: "m1".into(),
            model_id: "m".into(),
            content: "I think the answer is simply yes, for reasons of clarity.".into(),
            token_usage: TokenUsage::new(10, 10),
            latency_ms: 1,
            timestamp: 0,
        };
        let vote = parse_vote(&response, 0);
        assert_eq!(vote.confidence, 0.7);
        assert!(vote.position.starts_with("I think"));
        assert_eq!(vote.reasoning, "");
    }

    #[test]
    fn parse_vote_reads_structured_lines() {
        let response = MemberResponse {
            member_id: "m1".into(),
            member_name: "m1".into(),
            model_id: "m".into(),
            content: voting_response().to_string(),
            token_usage: TokenUsage::new(10, 10),
            latency_ms: 1,
            timestamp: 0,
        };
        let vote = parse_vote(&response, 0);
        assert_eq!(vote.position, "entropy measures disorder");
        assert_eq!(vote.confidence, 0.9);
        assert_eq!(vote.reasoning, "thermodynamic definition");
    }
}
