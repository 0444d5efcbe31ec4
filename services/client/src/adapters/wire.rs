//! services/client/src/adapters/wire.rs
//!
//! The backend's JSON shapes and their conversion into core domain types.
//!
//! The backend is loose about types (scores arrive as numbers or strings,
//! answers as text or structured values), so numeric and text fields are
//! read leniently instead of failing the whole response.

use chrono::{DateTime, NaiveDateTime};
use evaluation_core::domain::{
    Correctness, Credential, CriterionScore, DesignReview, DetailEntry, HistoryDetail,
    HistoryEntry, HistoryPage, HistoryResult, ModelStatus, RepositoryReport, RuleResult,
    ScoreRecord, SlideContentReview, UploadedFileHandle, User,
};
use evaluation_core::ports::{GenerateOutcome, GradeOutcome, ReevaluateOutcome, UploadOutcome};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

//=========================================================================================
// Lenient field readers
//=========================================================================================

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Renders an ISO-8601 timestamp as `YYYY-MM-DD HH:MM`, or returns it untouched.
pub fn display_timestamp(raw: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.format("%Y-%m-%d %H:%M").to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, pattern) {
            return parsed.format("%Y-%m-%d %H:%M").to_string();
        }
    }
    raw.to_string()
}

fn handles(ids: Vec<String>) -> Vec<UploadedFileHandle> {
    ids.into_iter().map(UploadedFileHandle::from).collect()
}

//=========================================================================================
// Evaluation
//=========================================================================================

#[derive(Deserialize, Debug)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub file_ids: Vec<String>,
    pub error: Option<String>,
}

impl UploadResponse {
    pub fn to_domain(self) -> UploadOutcome {
        UploadOutcome {
            success: self.success,
            handles: handles(self.file_ids),
            error: self.error,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct GeneratePayload<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub file_ids: Vec<&'a str>,
    pub github_url: Option<&'a str>,
    pub evaluate_design: bool,
}

#[derive(Deserialize, Debug)]
pub struct GenerateResponse {
    #[serde(default)]
    pub success: bool,
    /// Usually text; structured results are kept as their JSON rendering.
    #[serde(default, deserialize_with = "lenient_text")]
    pub result: Option<String>,
    pub summary: Option<String>,
    pub scores: Option<Vec<ScoreWire>>,
    pub file_ids: Option<Vec<String>>,
    pub error: Option<String>,
}

impl GenerateResponse {
    pub fn to_domain(self) -> GenerateOutcome {
        GenerateOutcome {
            success: self.success,
            result: self.result,
            summary: self.summary,
            scores: self
                .scores
                .map(|list| list.into_iter().map(ScoreWire::to_domain).collect()),
            handles: handles(self.file_ids.unwrap_or_default()),
            error: self.error,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ScoreWire {
    #[serde(default, deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    score_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    reasoning: Option<String>,
    #[serde(default)]
    details: Option<Vec<DetailWire>>,
    ppt_content: Option<SlideContentWire>,
    design_evaluation: Option<DesignWire>,
    formatted_result: Option<String>,
}

impl ScoreWire {
    pub fn to_domain(self) -> ScoreRecord {
        ScoreRecord {
            name: self.name,
            score_percent: self.score_percent,
            reasoning: self.reasoning,
            details: self
                .details
                .unwrap_or_default()
                .into_iter()
                .map(DetailWire::to_domain)
                .collect(),
            slide_content: self.ppt_content.map(SlideContentWire::to_domain),
            design_review: self.design_evaluation.map(DesignWire::to_domain),
            formatted_result: self.formatted_result,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct DetailWire {
    #[serde(default, deserialize_with = "lenient_text")]
    question: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    student_answer: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    correct_answer: Option<String>,
    is_correct: Option<bool>,
    #[serde(default, deserialize_with = "lenient_number")]
    partial_credit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    feedback: Option<String>,
}

impl DetailWire {
    fn to_domain(self) -> DetailEntry {
        DetailEntry {
            question: self.question,
            answer: self.student_answer,
            reference_answer: self.correct_answer,
            correctness: Correctness::from_flags(self.is_correct, self.partial_credit),
            feedback: self.feedback,
        }
    }
}

#[derive(Deserialize, Debug)]
struct CriterionWire {
    #[serde(default, deserialize_with = "lenient_number")]
    score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    feedback: Option<String>,
}

impl CriterionWire {
    fn to_domain(self) -> CriterionScore {
        CriterionScore {
            score: self.score.unwrap_or(0.0),
            feedback: self.feedback.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct SlideContentWire {
    content_quality: Option<CriterionWire>,
    structure: Option<CriterionWire>,
    alignment: Option<CriterionWire>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvements: Vec<String>,
}

impl SlideContentWire {
    fn to_domain(self) -> SlideContentReview {
        SlideContentReview {
            content_quality: self.content_quality.map(CriterionWire::to_domain),
            structure: self.structure.map(CriterionWire::to_domain),
            alignment: self.alignment.map(CriterionWire::to_domain),
            strengths: self.strengths,
            improvements: self.improvements,
        }
    }
}

#[derive(Deserialize, Debug)]
struct DesignWire {
    error: Option<String>,
    visual_appeal: Option<CriterionWire>,
    layout: Option<CriterionWire>,
    typography: Option<CriterionWire>,
    color_scheme: Option<CriterionWire>,
    overall_comment: Option<String>,
}

impl DesignWire {
    fn to_domain(self) -> DesignReview {
        DesignReview {
            error: self.error,
            visual_appeal: self.visual_appeal.map(CriterionWire::to_domain),
            layout: self.layout.map(CriterionWire::to_domain),
            typography: self.typography.map(CriterionWire::to_domain),
            color_scheme: self.color_scheme.map(CriterionWire::to_domain),
            overall_comment: self.overall_comment,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct GradePayload<'a> {
    pub github_url: &'a str,
    pub description: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct GradeResponse {
    #[serde(default)]
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl GradeResponse {
    /// Fails only when a successful response carries an unreadable report.
    pub fn to_domain(self) -> Result<GradeOutcome, serde_json::Error> {
        let report = match self.result {
            Some(result) if self.success => {
                let grading: GradingWire = serde_json::from_value(unwrap_grading(result))?;
                Some(grading.to_domain())
            }
            _ => None,
        };
        Ok(GradeOutcome { success: self.success, report, error: self.error })
    }
}

/// The grader sometimes wraps its report in a second `{success, result}` envelope.
pub fn unwrap_grading(result: Value) -> Value {
    match result {
        Value::Object(mut outer)
            if outer.get("success").and_then(Value::as_bool) == Some(true)
                && outer.get("result").map_or(false, Value::is_object) =>
        {
            outer.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[derive(Deserialize, Debug)]
pub struct GradingWire {
    #[serde(default)]
    rule_results: Vec<RuleWire>,
    #[serde(default, deserialize_with = "lenient_text")]
    conversational_response: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    overall_comment: Option<String>,
    detected_technology_stack: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_text")]
    rules_summary: Option<String>,
}

impl GradingWire {
    pub fn to_domain(self) -> RepositoryReport {
        RepositoryReport {
            rule_results: self.rule_results.into_iter().map(RuleWire::to_domain).collect(),
            conversational_response: self.conversational_response,
            overall_comment: self.overall_comment,
            detected_stack: self.detected_technology_stack,
            rules_summary: self.rules_summary,
        }
    }
}

#[derive(Deserialize, Debug)]
struct RuleWire {
    #[serde(default, deserialize_with = "lenient_text")]
    rule_text: Option<String>,
    #[serde(default)]
    is_satisfied: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    evidence: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    failure_reason: Option<String>,
}

impl RuleWire {
    fn to_domain(self) -> RuleResult {
        RuleResult {
            rule_text: self.rule_text,
            satisfied: self.is_satisfied,
            evidence: self.evidence,
            failure_reason: self.failure_reason,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ReevaluatePayload<'a> {
    pub file_id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct ReevaluateResponse {
    #[serde(default)]
    pub success: bool,
    pub result: Option<ScoreWire>,
    pub error: Option<String>,
}

impl ReevaluateResponse {
    pub fn to_domain(self) -> ReevaluateOutcome {
        ReevaluateOutcome {
            success: self.success,
            record: self.result.map(ScoreWire::to_domain),
            error: self.error,
        }
    }
}

//=========================================================================================
// History
//=========================================================================================

#[derive(Deserialize, Debug)]
pub struct HistoryListResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    data: Vec<HistoryEntryWire>,
    pagination: Option<PaginationWire>,
}

#[derive(Deserialize, Debug)]
struct PaginationWire {
    #[serde(default)]
    total: u64,
}

impl HistoryListResponse {
    pub fn to_domain(self) -> HistoryPage {
        let total = self
            .pagination
            .map(|p| p.total)
            .unwrap_or(self.data.len() as u64);
        HistoryPage {
            entries: self.data.into_iter().map(HistoryEntryWire::to_domain).collect(),
            total,
        }
    }
}

#[derive(Deserialize, Debug)]
struct HistoryEntryWire {
    id: i64,
    #[serde(default, deserialize_with = "lenient_text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    description: Option<String>,
    category: Option<String>,
    status: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    student_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    score: Option<f64>,
}

impl HistoryEntryWire {
    fn to_domain(self) -> HistoryEntry {
        HistoryEntry {
            id: self.id,
            title: self.title.unwrap_or_else(|| "Untitled".to_string()),
            description: self.description,
            category: self.category,
            status: self.status,
            created_at: self.created_at.as_deref().map(display_timestamp).unwrap_or_default(),
            subject_name: self.student_name,
            score: self.score,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct HistoryDetailResponse {
    #[serde(default)]
    pub success: bool,
    pub data: Option<HistoryDetailWire>,
}

#[derive(Deserialize, Debug)]
pub struct HistoryDetailWire {
    id: i64,
    #[serde(default, deserialize_with = "lenient_text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    description: Option<String>,
    category: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    created_at: Option<String>,
    #[serde(default)]
    results: Vec<HistoryResultWire>,
}

impl HistoryDetailWire {
    pub fn to_domain(self) -> HistoryDetail {
        HistoryDetail {
            id: self.id,
            title: self.title.unwrap_or_else(|| "Untitled".to_string()),
            description: self.description,
            category: self.category,
            created_at: self.created_at.as_deref().map(display_timestamp),
            results: self.results.into_iter().map(HistoryResultWire::to_domain).collect(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct HistoryResultWire {
    id: i64,
    #[serde(default, deserialize_with = "lenient_text")]
    student_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    score_percent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    reasoning: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    summary: Option<String>,
    evaluation_type: Option<String>,
    file_id: Option<String>,
    #[serde(default)]
    details: Vec<DetailWire>,
}

impl HistoryResultWire {
    fn to_domain(self) -> HistoryResult {
        HistoryResult {
            id: self.id,
            subject_name: self.student_name,
            score_percent: self.score_percent,
            reasoning: self.reasoning,
            summary: self.summary,
            evaluation_type: self.evaluation_type,
            file: self.file_id.map(UploadedFileHandle::from),
            details: self.details.into_iter().map(DetailWire::to_domain).collect(),
        }
    }
}

//=========================================================================================
// Accounts and system
//=========================================================================================

#[derive(Serialize, Debug)]
pub struct CredentialsPayload<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize, Debug)]
pub struct UserWire {
    id: i64,
    email: String,
}

impl UserWire {
    pub fn to_domain(self) -> User {
        User { id: self.id, email: self.email }
    }
}

#[derive(Deserialize, Debug)]
pub struct LoginResponse {
    token: String,
    user: UserWire,
}

impl LoginResponse {
    pub fn to_domain(self) -> Credential {
        Credential { token: self.token, user: self.user.to_domain() }
    }
}

#[derive(Deserialize, Debug)]
pub struct RegisterResponse {
    pub user: UserWire,
}

#[derive(Deserialize, Debug)]
pub struct ModelStatusWire {
    status: Option<String>,
    connected: Option<bool>,
    message: Option<String>,
}

impl ModelStatusWire {
    pub fn to_domain(self) -> ModelStatus {
        let connected = self
            .connected
            .unwrap_or_else(|| self.status.as_deref() == Some("connected"));
        ModelStatus { connected, detail: self.message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scores_tolerate_loose_types() {
        let wire: ScoreWire = serde_json::from_value(json!({
            "name": "Alice",
            "score_percent": "87.5%",
            "reasoning": "Solid",
            "details": [
                {"question": "Q1", "student_answer": {"code": "x = 1"}, "correct_answer": "x = 1",
                 "is_correct": false, "partial_credit": 0.5}
            ]
        }))
        .unwrap();
        let record = wire.to_domain();
        assert_eq!(record.score_percent, Some(87.5));
        assert_eq!(record.details[0].answer.as_deref(), Some(r#"{"code":"x = 1"}"#));
        assert_eq!(record.details[0].correctness, Correctness::PartialCredit(0.5));
    }

    #[test]
    fn slide_reviews_are_carried_over() {
        let wire: ScoreWire = serde_json::from_value(json!({
            "name": "deck.pptx",
            "score_percent": 70,
            "ppt_content": {"content_quality": {"score": 80, "feedback": "clear"}, "strengths": ["flow"]},
            "design_evaluation": {"error": "renderer unavailable"}
        }))
        .unwrap();
        let record = wire.to_domain();
        let content = record.slide_content.unwrap();
        assert_eq!(content.content_quality.unwrap().score, 80.0);
        assert_eq!(content.strengths, vec!["flow".to_string()]);
        assert_eq!(record.design_review.unwrap().error.as_deref(), Some("renderer unavailable"));
    }

    #[test]
    fn nested_grading_envelope_is_unwrapped() {
        let doubled = json!({"success": true, "result": {"rules_summary": "ok"}});
        let single = json!({"rules_summary": "ok", "success": true});
        assert_eq!(unwrap_grading(doubled), json!({"rules_summary": "ok"}));
        assert_eq!(unwrap_grading(single.clone()), single);
    }

    #[test]
    fn grading_maps_rule_results() {
        let wire: GradingWire = serde_json::from_value(json!({
            "rule_results": [{"rule_text": "Use tests", "is_satisfied": true, "evidence": "tests/ dir"}],
            "detected_technology_stack": ["Rust"]
        }))
        .unwrap();
        let report = wire.to_domain();
        assert!(report.rule_results[0].satisfied);
        assert_eq!(report.detected_stack, Some(vec!["Rust".to_string()]));
    }

    #[test]
    fn history_listing_uses_pagination_total() {
        let wire: HistoryListResponse = serde_json::from_value(json!({
            "success": true,
            "data": [{"id": 3, "title": "Quiz", "created_at": "2024-05-01T10:15:30.123456",
                      "student_name": "Unknown", "score": 0}],
            "pagination": {"total": 21, "page": 1, "limit": 10}
        }))
        .unwrap();
        let page = wire.to_domain();
        assert_eq!(page.total, 21);
        assert_eq!(page.entries[0].created_at, "2024-05-01 10:15");
        assert_eq!(page.entries[0].score, Some(0.0));
    }

    #[test]
    fn model_status_reads_either_shape() {
        let a: ModelStatusWire =
            serde_json::from_value(json!({"status": "connected", "message": "LLM service is available"})).unwrap();
        assert!(a.to_domain().connected);
        let b: ModelStatusWire = serde_json::from_value(json!({"connected": false})).unwrap();
        assert!(!b.to_domain().connected);
    }

    #[test]
    fn unparseable_timestamps_pass_through() {
        assert_eq!(display_timestamp("yesterday"), "yesterday");
        assert_eq!(display_timestamp("2024-05-01T10:15:30+00:00"), "2024-05-01 10:15");
    }
}
