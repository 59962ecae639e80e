//! Typed handles for the backend resources.
//!
//! Each handle borrows the `ApiClient` and maps one REST resource:
//! `client.raw_questions().list(&params)`, `client.versions().create("v2")`,
//! and so on. Payloads without a fixed shape come back as `serde_json::Value`.

use std::time::Duration;

use anyhow::Result;
use reqwest::Method;
use serde_json::{json, Value};

use crate::cache::{Clock, KeyValueStore, TimedCache};
use crate::models::{ListParams, Tag, UploadFile, Version};

use super::{ApiClient, Envelope, RequestOptions};

/// Cache key for the overall statistics payload.
pub const STATISTICS_CACHE_KEY: &str = "statistics_overall";

/// Overall statistics are served from cache for five minutes.
pub const STATISTICS_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

impl ApiClient {
    pub fn raw_questions(&self) -> RawQuestions<'_> {
        RawQuestions { client: self }
    }

    pub fn raw_answers(&self) -> RawAnswers<'_> {
        RawAnswers { client: self }
    }

    pub fn versions(&self) -> Versions<'_> {
        Versions { client: self }
    }

    pub fn tags(&self) -> Tags<'_> {
        Tags { client: self }
    }

    pub fn standard_questions(&self) -> StandardQuestions<'_> {
        StandardQuestions { client: self }
    }

    pub fn candidate_answers(&self) -> CandidateAnswers<'_> {
        CandidateAnswers { client: self }
    }

    pub fn standard_answers(&self) -> StandardAnswers<'_> {
        StandardAnswers { client: self }
    }

    pub fn evaluation_tags(&self) -> EvaluationTags<'_> {
        EvaluationTags { client: self }
    }

    pub fn evaluation_results(&self) -> EvaluationResults<'_> {
        EvaluationResults { client: self }
    }

    pub fn analysis_tags(&self) -> AnalysisTags<'_> {
        AnalysisTags { client: self }
    }

    pub fn evaluation_analysis(&self) -> EvaluationAnalysis<'_> {
        EvaluationAnalysis { client: self }
    }

    pub fn statistics(&self) -> Statistics<'_> {
        Statistics { client: self }
    }
}

fn no_params() -> ListParams {
    ListParams::new()
}

// ===== Raw Questions =====

pub struct RawQuestions<'a> {
    client: &'a ApiClient,
}

impl RawQuestions<'_> {
    pub async fn import(&self, file: &UploadFile, source_platform: &str) -> Result<Value> {
        let params = ListParams::new().filter("sourcePlatform", source_platform);
        self.client
            .upload(&["raw-questions", "import"], &params, file)
            .await
    }

    pub async fn list(&self, params: &ListParams) -> Result<Value> {
        self.client.get(&["raw-questions"], params).await
    }

    pub async fn get(&self, id: i64) -> Result<Value> {
        let id = id.to_string();
        self.client.get(&["raw-questions", &id], &no_params()).await
    }

    pub async fn update_status(&self, id: i64, status: &str) -> Result<Value> {
        let id = id.to_string();
        self.client
            .patch(&["raw-questions", &id, "status"], &json!({ "status": status }))
            .await
    }

    pub async fn answers(&self, question_id: i64, params: &ListParams) -> Result<Value> {
        let id = question_id.to_string();
        self.client
            .get(&["raw-questions", &id, "answers"], params)
            .await
    }

    /// Standard questions derived from a raw question.
    pub async fn standard_questions(&self, raw_question_id: i64, params: &ListParams) -> Result<Value> {
        let id = raw_question_id.to_string();
        self.client
            .get(&["raw-questions", &id, "std-questions"], params)
            .await
    }
}

// ===== Raw Answers =====

pub struct RawAnswers<'a> {
    client: &'a ApiClient,
}

impl RawAnswers<'_> {
    pub async fn import(&self, file: &UploadFile, source_platform: &str) -> Result<Value> {
        let params = ListParams::new().filter("sourcePlatform", source_platform);
        self.client
            .upload(&["raw-answers", "import"], &params, file)
            .await
    }

    pub async fn list(&self, params: &ListParams) -> Result<Value> {
        self.client.get(&["raw-answers"], params).await
    }

    pub async fn get(&self, id: i64) -> Result<Value> {
        let id = id.to_string();
        self.client.get(&["raw-answers", &id], &no_params()).await
    }

    pub async fn for_question(&self, question_id: i64, params: &ListParams) -> Result<Value> {
        let id = question_id.to_string();
        self.client
            .get(&["raw-questions", &id, "answers"], params)
            .await
    }
}

// ===== Versions =====

pub struct Versions<'a> {
    client: &'a ApiClient,
}

impl Versions<'_> {
    pub async fn create(&self, version: &str) -> Result<Version> {
        self.client
            .post(&["versions"], &json!({ "version": version }))
            .await
    }

    pub async fn list(&self) -> Result<Vec<Version>> {
        self.client.get(&["versions"], &no_params()).await
    }
}

// ===== Tags =====

pub struct Tags<'a> {
    client: &'a ApiClient,
}

impl Tags<'_> {
    pub async fn create(&self, tag: &str) -> Result<Tag> {
        self.client.post(&["tags"], &json!({ "tag": tag })).await
    }

    pub async fn list(&self) -> Result<Vec<Tag>> {
        self.client.get(&["tags"], &no_params()).await
    }
}

// ===== Standard Questions =====

pub struct StandardQuestions<'a> {
    client: &'a ApiClient,
}

impl StandardQuestions<'_> {
    pub async fn import(&self, questions: &Value) -> Result<Value> {
        self.client
            .post(&["std-questions", "import"], questions)
            .await
    }

    pub async fn list(&self, params: &ListParams) -> Result<Value> {
        self.client.get(&["std-questions"], params).await
    }

    pub async fn get(&self, id: i64) -> Result<Value> {
        let id = id.to_string();
        self.client.get(&["std-questions", &id], &no_params()).await
    }

    pub async fn add_tag(&self, id: i64, tag_name: &str) -> Result<Value> {
        let id = id.to_string();
        self.client
            .post(&["std-questions", &id, "tags"], &json!({ "tagName": tag_name }))
            .await
    }

    pub async fn remove_tag(&self, id: i64, tag_name: &str) -> Result<Value> {
        let id = id.to_string();
        self.client
            .delete(&["std-questions", &id, "tags", tag_name])
            .await
    }
}

// ===== Candidate Answers =====

pub struct CandidateAnswers<'a> {
    client: &'a ApiClient,
}

impl CandidateAnswers<'_> {
    /// `kind` is sent as the `type` query parameter.
    pub async fn import(&self, file: &UploadFile, kind: &str) -> Result<Value> {
        let params = ListParams::new().filter("type", kind);
        self.client
            .upload(&["candidate-answers", "import"], &params, file)
            .await
    }

    pub async fn list(&self, params: &ListParams) -> Result<Value> {
        self.client.get(&["candidate-answers"], params).await
    }

    pub async fn for_question(&self, question_id: i64, params: &ListParams) -> Result<Value> {
        let id = question_id.to_string();
        self.client
            .get(&["std-questions", &id, "candidate-answers"], params)
            .await
    }

    pub async fn update(&self, id: i64, changes: &Value) -> Result<Value> {
        let id = id.to_string();
        self.client
            .patch(&["candidate-answers", &id], changes)
            .await
    }
}

// ===== Standard Answers =====

pub struct StandardAnswers<'a> {
    client: &'a ApiClient,
}

impl StandardAnswers<'_> {
    pub async fn list(&self, params: &ListParams) -> Result<Value> {
        self.client.get(&["std-answers"], params).await
    }

    pub async fn for_question(&self, question_id: i64, params: &ListParams) -> Result<Value> {
        let id = question_id.to_string();
        self.client
            .get(&["std-questions", &id, "std-answers"], params)
            .await
    }

    pub async fn update(&self, id: i64, changes: &Value) -> Result<Value> {
        let id = id.to_string();
        self.client.patch(&["std-answers", &id], changes).await
    }
}

// ===== Evaluation Tags =====

pub struct EvaluationTags<'a> {
    client: &'a ApiClient,
}

impl EvaluationTags<'_> {
    pub async fn create(&self, tag: &Value) -> Result<Value> {
        self.client.post(&["evaluation-tags"], tag).await
    }

    pub async fn list(&self) -> Result<Value> {
        self.client.get(&["evaluation-tags"], &no_params()).await
    }
}

// ===== Evaluation Results =====

pub struct EvaluationResults<'a> {
    client: &'a ApiClient,
}

impl EvaluationResults<'_> {
    pub async fn import(&self, results: &Value) -> Result<Value> {
        self.client
            .post(&["evaluation-results", "import"], results)
            .await
    }

    pub async fn list(&self, params: &ListParams) -> Result<Value> {
        self.client.get(&["evaluation-results"], params).await
    }

    /// Raw export file contents.
    pub async fn export(&self, params: &ListParams) -> Result<Vec<u8>> {
        self.client
            .download(&["evaluation-results", "export"], params)
            .await
    }
}

// ===== Analysis Tags =====

pub struct AnalysisTags<'a> {
    client: &'a ApiClient,
}

impl AnalysisTags<'_> {
    pub async fn create(&self, tag: &Value) -> Result<Value> {
        self.client.post(&["analysis-tags"], tag).await
    }

    pub async fn list(&self) -> Result<Value> {
        self.client.get(&["analysis-tags"], &no_params()).await
    }
}

// ===== Evaluation Analysis =====

pub struct EvaluationAnalysis<'a> {
    client: &'a ApiClient,
}

impl EvaluationAnalysis<'_> {
    pub async fn import(&self, analysis: &Value) -> Result<Value> {
        self.client
            .post(&["evaluation-analysis", "import"], analysis)
            .await
    }

    pub async fn list(&self, params: &ListParams) -> Result<Value> {
        self.client.get(&["evaluation-analysis"], params).await
    }
}

// ===== Statistics =====

pub struct Statistics<'a> {
    client: &'a ApiClient,
}

impl Statistics<'_> {
    pub async fn overall(&self) -> Result<Value> {
        self.client
            .get(&["statistics", "overall"], &no_params())
            .await
    }

    /// Overall statistics through `cache`. Only the `data` of a
    /// `{ success: true }` envelope is stored; failed, rejected and
    /// unwrapped responses are not.
    pub async fn overall_cached<S, C>(&self, cache: &TimedCache<S, C>, ttl: Duration) -> Result<Value>
    where
        S: KeyValueStore,
        C: Clock,
    {
        cache
            .get(STATISTICS_CACHE_KEY, ttl, || self.overall_enveloped())
            .await
    }

    async fn overall_enveloped(&self) -> Result<Value> {
        let raw = self
            .client
            .request(Method::GET, &["statistics", "overall"], &RequestOptions::default())
            .await?;
        let data = Envelope::from_enveloped_body(raw.data)?.into_result()?;
        Ok(data)
    }

    pub fn clear_cache<S, C>(&self, cache: &TimedCache<S, C>)
    where
        S: KeyValueStore,
        C: Clock,
    {
        cache.invalidate(STATISTICS_CACHE_KEY);
    }
}
