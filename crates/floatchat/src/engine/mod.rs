//! The query engine: a graduated cascade from deterministic rules down to a
//! terminal free-text fallback.
//!
//! Cheap, predictable states answer first. Each state either produces a
//! final envelope or declines, and control falls through in a fixed order:
//! conversational shortcut, rules only, reasoner entity completion, reasoner
//! intent detection, plan orchestration, structured store query, terminal
//! fallback. The terminal state cannot decline, so every query ends in an
//! envelope. The whole walk runs under one wall-clock budget.

pub mod conversational;
pub mod formatter;

pub use formatter::ResponseFormatter;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::entities::{Entities, Parameter};
use crate::error::EngineError;
use crate::intent::{Intent, IntentResolver};
use crate::plan::{Plan, PlanExecutor};
use crate::reasoner::{
    complete_with_timeout, parse_payload, prompts, IntentDetection, PlanPayload, Reasoner,
    ToolSelection,
};
use crate::regions::Region;
use crate::session::SessionStore;
use crate::tools::store::{schema_json, DataStore, StoreQuery};
use crate::tools::{ToolCall, ToolExecutor, ToolRegistry};
use crate::types::{Exchange, ProcessingSource, ResponseEnvelope, SessionHistory};

pub struct QueryEngine {
    config: EngineConfig,
    registry: Arc<ToolRegistry>,
    tools: ToolExecutor,
    store: Arc<dyn DataStore>,
    reasoner: Arc<dyn Reasoner>,
    sessions: SessionStore,
    resolver: IntentResolver,
    formatter: ResponseFormatter,
}

impl QueryEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn DataStore>,
        reasoner: Arc<dyn Reasoner>,
    ) -> Self {
        let registry = Arc::new(ToolRegistry::new());
        let reasoner_timeout = Duration::from_secs(config.reasoner.call_timeout_secs);
        Self {
            registry: registry.clone(),
            tools: ToolExecutor::new(registry, store.clone()),
            store,
            sessions: SessionStore::new(&config.session),
            resolver: IntentResolver::new(),
            formatter: ResponseFormatter::new(reasoner.clone(), reasoner_timeout),
            reasoner,
            config,
        }
    }

    /// Interpret and answer one query. Always returns an envelope; the
    /// cascade's terminal state and the budget handler cannot fail.
    pub async fn process_query(&self, text: &str, session_id: &str) -> ResponseEnvelope {
        let budget = Duration::from_secs(self.config.cascade.query_budget_secs);
        match tokio::time::timeout(budget, self.run_cascade(text, session_id)).await {
            Ok(envelope) => envelope,
            Err(_) => {
                let deadline = crate::error::BudgetError::QueryDeadline {
                    secs: self.config.cascade.query_budget_secs,
                };
                warn!(session_id, error = %deadline, "answering from terminal state");
                let envelope = ResponseFormatter::minimal_envelope(
                    "That took longer than I allow for a single query. Try a \
                     narrower question, for example one float or one region at \
                     a time.",
                    Intent::Unknown,
                    ProcessingSource::TerminalFallback,
                    self.config.cascade.terminal_confidence,
                    vec![
                        "Temperature profile of float 2902296".to_string(),
                        "Which floats are in the Indian Ocean?".to_string(),
                    ],
                    session_id,
                );
                self.record(session_id, text, Intent::Unknown, &Entities::default(), &envelope);
                envelope
            }
        }
    }

    pub fn history(&self, session_id: &str) -> SessionHistory {
        self.sessions.snapshot(session_id)
    }

    pub fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.clear(session_id)
    }

    pub fn tool_list(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    /// Fresh session id for callers that do not supply their own.
    pub fn new_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Approximate live session count, for health reporting.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// The tool catalog in the JSON shape served from the root endpoint.
    pub fn capabilities(&self) -> Value {
        self.registry.catalog_json()
    }

    async fn run_cascade(&self, text: &str, session_id: &str) -> ResponseEnvelope {
        let (intent, extracted) = self.resolver.resolve(text);
        debug!(intent = intent.as_str(), session_id, "rules resolved intent");

        // State 1: conversational shortcut.
        if let Some(envelope) = conversational::respond(intent, session_id) {
            self.record(session_id, text, intent, &extracted, &envelope);
            return envelope;
        }

        let context = self.sessions.context(session_id);
        let mut entities = extracted.clone();
        entities.fill_missing_from(&context);

        // State 2: rules produced a complete, executable call. Only the
        // entities this turn actually named are recorded; values filled
        // from context stay context-owned.
        if intent != Intent::Unknown {
            if let Some(call) = self.registry.call_for(intent, &entities) {
                match self.execute_and_format(text, session_id, intent, &extracted, &call).await {
                    Ok(envelope) => return envelope,
                    Err(e) => {
                        warn!(error = %e, intent = intent.as_str(), "rules state failed, falling through");
                        self.record_failure(
                            session_id,
                            text,
                            intent,
                            &extracted,
                            ProcessingSource::RulesOnly,
                            "The data request could not be completed.",
                        );
                    }
                }
            } else {
                // State 3: known intent, incomplete entities.
                if let Some(envelope) = self
                    .entity_assist(text, session_id, intent, &extracted, &entities, &context)
                    .await
                {
                    return envelope;
                }
            }
        }

        // State 4: the reasoner classifies from scratch, including when the
        // rules had a guess that earlier states could not complete.
        match self.detect_intent(text, session_id, &context).await {
            DetectionResult::Answered(envelope) => return envelope,
            DetectionResult::TooVague if extracted.is_empty() => {
                let envelope = ResponseFormatter::minimal_envelope(
                    "I'm not sure what you're asking about the float data. \
                     Could you name a float, a parameter like temperature \
                     or salinity, or a region?",
                    Intent::Unknown,
                    ProcessingSource::Guidance,
                    self.config.cascade.terminal_confidence,
                    vec![
                        "Show me all floats".to_string(),
                        "Temperature profile of float 2902296".to_string(),
                        "Which floats are in the Arabian Sea?".to_string(),
                    ],
                    session_id,
                );
                self.record(session_id, text, Intent::Unknown, &extracted, &envelope);
                return envelope;
            }
            DetectionResult::TooVague | DetectionResult::Declined => {}
        }

        // State 5: multi-step orchestration.
        if let Some(envelope) = self
            .orchestrate(text, session_id, intent, &entities, &extracted)
            .await
        {
            return envelope;
        }

        // State 6: constrained structured query.
        if let Some(envelope) = self
            .store_query(text, session_id, &entities, &extracted)
            .await
        {
            return envelope;
        }

        // State 7: terminal fallback. Never declines.
        self.terminal(text, session_id, &extracted).await
    }

    async fn execute_and_format(
        &self,
        text: &str,
        session_id: &str,
        intent: Intent,
        extracted: &Entities,
        call: &ToolCall,
    ) -> Result<ResponseEnvelope, EngineError> {
        match self.tools.run(call).await {
            Ok(outcome) => {
                let envelope = self
                    .formatter
                    .format(
                        text,
                        intent,
                        outcome.data,
                        ProcessingSource::RulesOnly,
                        self.config.cascade.rules_confidence,
                        session_id,
                    )
                    .await;
                self.record(session_id, text, intent, extracted, &envelope);
                Ok(envelope)
            }
            // A clean miss is a completed answer, not a reason to fall
            // further down the cascade.
            Err(e) if e.is_not_found() => {
                let envelope = ResponseFormatter::minimal_envelope(
                    &format!("No data found: {}", e),
                    intent,
                    ProcessingSource::RulesOnly,
                    self.config.cascade.rules_confidence,
                    vec!["Show me all floats".to_string()],
                    session_id,
                );
                self.record(session_id, text, intent, extracted, &envelope);
                Ok(envelope)
            }
            Err(e) => Err(e),
        }
    }

    /// State 3: the intent is known but required entities are missing from
    /// both the query and the session context. The reasoner gets one shot
    /// at completing them.
    async fn entity_assist(
        &self,
        text: &str,
        session_id: &str,
        intent: Intent,
        extracted: &Entities,
        entities: &Entities,
        context: &Entities,
    ) -> Option<ResponseEnvelope> {
        let missing = self.registry.missing_entities(intent, entities);
        let history = self.sessions.history(session_id, 3);
        let prompt = prompts::entity_completion_prompt(
            text,
            context,
            &history,
            &missing,
            &self.registry.catalog_json(),
        );

        let raw = match complete_with_timeout(
            self.reasoner.as_ref(),
            &prompt,
            self.reasoner_timeout(),
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "entity completion call failed");
                return None;
            }
        };
        let selection: ToolSelection = match parse_payload(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "entity completion payload rejected");
                return None;
            }
        };
        selection.tool.as_ref()?;

        // Only the entities are taken from the reasoner; the tool is still
        // the one the rules-resolved intent maps to, and the requirement
        // check is re-run on the merged set.
        let supplied = entities_from_map(&selection.parameters);
        let mut merged = entities.clone();
        merged.merge_from(&supplied);
        let call = self.registry.call_for(intent, &merged)?;

        let mut fresh = extracted.clone();
        fresh.merge_from(&supplied);

        match self.tools.run(&call).await {
            Ok(outcome) => {
                let envelope = self
                    .formatter
                    .format(
                        text,
                        intent,
                        outcome.data,
                        ProcessingSource::EntityAssist,
                        self.config.cascade.entity_assist_confidence,
                        session_id,
                    )
                    .await;
                self.record(session_id, text, intent, &fresh, &envelope);
                Some(envelope)
            }
            Err(e) => {
                warn!(error = %e, "entity-assisted call failed, falling through");
                self.record_failure(
                    session_id,
                    text,
                    intent,
                    &fresh,
                    ProcessingSource::EntityAssist,
                    "The data request could not be completed.",
                );
                None
            }
        }
    }

    /// State 4. Detection is accepted only strictly above the configured
    /// confidence threshold; anything else falls through.
    async fn detect_intent(
        &self,
        text: &str,
        session_id: &str,
        context: &Entities,
    ) -> DetectionResult {
        let history = self.sessions.history(session_id, 3);
        let prompt = prompts::intent_detection_prompt(text, context, &history);

        let raw = match complete_with_timeout(
            self.reasoner.as_ref(),
            &prompt,
            self.reasoner_timeout(),
        )
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "intent detection call failed");
                return DetectionResult::Declined;
            }
        };
        let detected: IntentDetection = match parse_payload(&raw) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "intent detection payload rejected");
                return DetectionResult::Declined;
            }
        };

        let intent = Intent::parse(&detected.intent).unwrap_or(Intent::Unknown);
        if intent == Intent::Unknown && detected.confidence == 0.0 {
            return DetectionResult::TooVague;
        }
        if detected.confidence <= self.config.cascade.intent_confidence_threshold
            || intent == Intent::Unknown
        {
            debug!(
                intent = intent.as_str(),
                confidence = detected.confidence,
                "detection below threshold"
            );
            return DetectionResult::Declined;
        }

        info!(intent = intent.as_str(), confidence = detected.confidence, "reasoner detected intent");

        if let Some(envelope) = conversational::respond(intent, session_id) {
            self.record(session_id, text, intent, &Entities::default(), &envelope);
            return DetectionResult::Answered(envelope);
        }

        let fresh = entities_from_map(&detected.entities);
        let mut entities = fresh.clone();
        entities.fill_missing_from(context);
        let Some(call) = self.registry.call_for(intent, &entities) else {
            return DetectionResult::Declined;
        };

        match self.tools.run(&call).await {
            Ok(outcome) => {
                let envelope = self
                    .formatter
                    .format(
                        text,
                        intent,
                        outcome.data,
                        ProcessingSource::ReasonerIntent,
                        // The envelope carries the detection's own confidence,
                        // not a fixed state weight.
                        detected.confidence.clamp(0.0, 1.0),
                        session_id,
                    )
                    .await;
                self.record(session_id, text, intent, &fresh, &envelope);
                DetectionResult::Answered(envelope)
            }
            Err(e) => {
                warn!(error = %e, "detected-intent call failed, falling through");
                self.record_failure(
                    session_id,
                    text,
                    intent,
                    &fresh,
                    ProcessingSource::ReasonerIntent,
                    "The data request could not be completed.",
                );
                DetectionResult::Declined
            }
        }
    }

    /// State 5.
    async fn orchestrate(
        &self,
        text: &str,
        session_id: &str,
        intent: Intent,
        entities: &Entities,
        extracted: &Entities,
    ) -> Option<ResponseEnvelope> {
        let prompt = prompts::plan_prompt(
            text,
            entities,
            &self.registry.catalog_json(),
            self.config.cascade.max_plan_steps,
        );
        let raw = complete_with_timeout(self.reasoner.as_ref(), &prompt, self.reasoner_timeout())
            .await
            .map_err(|e| warn!(error = %e, "plan call failed"))
            .ok()?;
        let payload: PlanPayload = parse_payload(&raw)
            .map_err(|e| warn!(error = %e, "plan payload rejected"))
            .ok()?;

        let plan = Plan::from_payload(payload);
        if plan.is_empty() {
            return None;
        }

        let executor = PlanExecutor::new(
            &self.tools,
            self.reasoner.as_ref(),
            self.reasoner_timeout(),
            self.config.cascade.max_plan_steps,
        );
        let result = executor.execute(plan).await;
        if !result.any_succeeded() {
            warn!("every plan step failed, falling through");
            self.record_failure(
                session_id,
                text,
                intent,
                extracted,
                ProcessingSource::Orchestration,
                "The planned data requests could not be completed.",
            );
            return None;
        }

        let envelope = self
            .formatter
            .format(
                text,
                intent,
                result.to_json(),
                ProcessingSource::Orchestration,
                self.config.cascade.plan_confidence,
                session_id,
            )
            .await;
        self.record(session_id, text, intent, extracted, &envelope);
        Some(envelope)
    }

    /// State 6. The reasoner emits a schema-constrained query instead of
    /// free query text; it is validated and row-capped before execution.
    async fn store_query(
        &self,
        text: &str,
        session_id: &str,
        entities: &Entities,
        extracted: &Entities,
    ) -> Option<ResponseEnvelope> {
        let prompt = prompts::store_query_prompt(text, entities, &schema_json());
        let raw = complete_with_timeout(self.reasoner.as_ref(), &prompt, self.reasoner_timeout())
            .await
            .map_err(|e| warn!(error = %e, "store query call failed"))
            .ok()?;
        let mut query: StoreQuery = parse_payload(&raw)
            .map_err(|e| warn!(error = %e, "store query payload rejected"))
            .ok()?;
        if let Err(e) = query.validate(self.config.cascade.max_store_rows) {
            warn!(error = %e, "store query failed validation");
            return None;
        }

        let rows = match self.store.query(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "store query execution failed");
                return None;
            }
        };

        let envelope = self
            .formatter
            .format(
                text,
                Intent::Unknown,
                Value::Array(rows),
                ProcessingSource::StoreQuery,
                self.config.cascade.store_query_confidence,
                session_id,
            )
            .await;
        self.record(session_id, text, Intent::Unknown, extracted, &envelope);
        Some(envelope)
    }

    /// State 7. Answers unconditionally; a reasoner failure here degrades to
    /// fixed text rather than an error.
    async fn terminal(&self, text: &str, session_id: &str, entities: &Entities) -> ResponseEnvelope {
        let answer = match complete_with_timeout(
            self.reasoner.as_ref(),
            &prompts::terminal_prompt(text),
            self.reasoner_timeout(),
        )
        .await
        {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) | Err(_) => "I couldn't match that to any float data operation. I can \
                 show float profiles, trajectories, timeseries and regional \
                 summaries."
                .to_string(),
        };

        let envelope = ResponseFormatter::minimal_envelope(
            &answer,
            Intent::Unknown,
            ProcessingSource::TerminalFallback,
            self.config.cascade.terminal_confidence,
            vec![
                "Show me all floats".to_string(),
                "Temperature profile of float 2902296".to_string(),
            ],
            session_id,
        );
        self.record(session_id, text, Intent::Unknown, entities, &envelope);
        envelope
    }

    fn record(
        &self,
        session_id: &str,
        query: &str,
        intent: Intent,
        entities: &Entities,
        envelope: &ResponseEnvelope,
    ) {
        self.sessions.record_exchange(
            session_id,
            Exchange {
                timestamp: Utc::now(),
                query: query.to_string(),
                intent: intent.as_str().to_string(),
                entities: entities.clone(),
                result: envelope.data.clone(),
                envelope: envelope.clone(),
            },
        );
    }

    // Failed attempts still land in conversational memory so context stays
    // consistent across a turn that ultimately answered from a later state.
    fn record_failure(
        &self,
        session_id: &str,
        query: &str,
        intent: Intent,
        entities: &Entities,
        source: ProcessingSource,
        message: &str,
    ) {
        let envelope = ResponseFormatter::minimal_envelope(
            message,
            intent,
            source,
            self.config.cascade.terminal_confidence,
            Vec::new(),
            session_id,
        );
        self.record(session_id, query, intent, entities, &envelope);
    }

    fn reasoner_timeout(&self) -> Duration {
        Duration::from_secs(self.config.reasoner.call_timeout_secs)
    }
}

enum DetectionResult {
    Answered(ResponseEnvelope),
    /// The reasoner itself could not place the query at all.
    TooVague,
    Declined,
}

/// Normalize a loose reasoner entity map into the typed struct. Values that
/// fail normalization are dropped rather than guessed at.
fn entities_from_map(map: &std::collections::BTreeMap<String, Value>) -> Entities {
    let mut entities = Entities::default();
    for (key, value) in map {
        match key.as_str() {
            "float_id" => entities.float_id = value_as_i64(value),
            "float_ids" => {
                entities.float_ids = value
                    .as_array()
                    .map(|a| a.iter().filter_map(value_as_i64).collect())
                    .filter(|ids: &Vec<i64>| !ids.is_empty());
            }
            "parameter" => {
                entities.parameter = value.as_str().and_then(Parameter::parse);
            }
            "region" => {
                entities.region = value.as_str().and_then(Region::parse);
            }
            "latitude" => entities.latitude = value.as_f64(),
            "longitude" => entities.longitude = value.as_f64(),
            "cycle_number" => entities.cycle_number = value_as_i64(value),
            _ => {}
        }
    }
    entities
}

// Models sometimes emit ids as strings.
fn value_as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}
