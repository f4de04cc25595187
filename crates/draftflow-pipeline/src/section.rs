//! Reusable section-drafting stage
//!
//! [`SectionStage`] is the standard worker shape: query the retrieval
//! capability for relevant passages, hand the ranked context to the
//! generation capability with a section instruction, and fall back to a
//! canned section body when generation fails. The fallback path keeps the
//! pipeline moving: the stage completes at `Degraded` instead of stalling
//! the thread.

use crate::stage::{StageContext, StageId, StageOutcome, StageOutput, StageWorker};
use async_trait::async_trait;

/// How many top passages feed the generation context
const CONTEXT_PASSAGES: usize = 5;

/// A stage that drafts one named section of the assembled output
#[derive(Debug, Clone)]
pub struct SectionStage {
    id: StageId,
    title: String,
    instruction: String,
    fallback: String,
}

impl SectionStage {
    /// Create a section stage
    #[must_use]
    pub fn new(
        id: StageId,
        title: impl Into<String>,
        instruction: impl Into<String>,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            instruction: instruction.into(),
            fallback: fallback.into(),
        }
    }

    /// Section title used in composed output
    #[inline]
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    fn fallback_content(&self) -> String {
        format!(
            "## {}\n\n{}\n\n> Standing fallback content: the drafting service \
             was unavailable when this section was produced.",
            self.title, self.fallback
        )
    }
}

#[async_trait]
impl StageWorker for SectionStage {
    fn stage_id(&self) -> StageId {
        self.id.clone()
    }

    async fn produce(&self, ctx: &StageContext<'_>) -> StageOutcome {
        let query = format!("{} {}", self.instruction, ctx.request);
        let passages = ctx.retrieval.query(&query).await;
        let sources: Vec<String> = passages.iter().map(|p| p.source.clone()).collect();
        let context_text = passages
            .iter()
            .take(CONTEXT_PASSAGES)
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut instruction = format!("Draft the \"{}\" section. {}", self.title, self.instruction);
        for rejection in ctx.rejections_for(&self.id) {
            // A rejected mutation routes back here; surface the decision so
            // the stage can react instead of repeating itself.
            instruction.push_str(&format!(
                "\nA previous change was rejected ({})",
                rejection.description
            ));
            if let Some(comment) = &rejection.comment {
                instruction.push_str(&format!(": {comment}"));
            }
        }

        match ctx.generation.generate(&context_text, &instruction).await {
            Ok(content) => {
                tracing::debug!(stage = %self.id, sources = sources.len(), "section drafted");
                StageOutcome::Content(StageOutput::ok(self.id.clone(), content, sources))
            }
            Err(err) => {
                tracing::warn!(stage = %self.id, error = %err, "generation failed, using fallback");
                StageOutcome::Content(StageOutput::degraded(
                    self.id.clone(),
                    self.fallback_content(),
                    sources,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{
        GenerationCapability, GenerationError, Passage, RetrievalCapability,
    };
    use crate::stage::{StageOutputs, StageStatus};

    struct CannedRetrieval(Vec<Passage>);

    #[async_trait]
    impl RetrievalCapability for CannedRetrieval {
        async fn query(&self, _text: &str) -> Vec<Passage> {
            self.0.clone()
        }
    }

    struct EchoGeneration;

    #[async_trait]
    impl GenerationCapability for EchoGeneration {
        async fn generate(
            &self,
            context: &str,
            instruction: &str,
        ) -> Result<String, GenerationError> {
            Ok(format!("[{instruction}] {context}"))
        }
    }

    struct BrokenGeneration;

    #[async_trait]
    impl GenerationCapability for BrokenGeneration {
        async fn generate(&self, _c: &str, _i: &str) -> Result<String, GenerationError> {
            Err(GenerationError("model endpoint unreachable".into()))
        }
    }

    fn stage() -> SectionStage {
        SectionStage::new(
            StageId::from("technical"),
            "Technical Approach",
            "Cover architecture and implementation plan.",
            "Our standard delivery methodology applies.",
        )
    }

    fn ctx_parts() -> (StageOutputs, Vec<crate::stage::RejectionRecord>) {
        (StageOutputs::new(), Vec::new())
    }

    #[tokio::test]
    async fn drafts_with_retrieved_sources() {
        let retrieval = CannedRetrieval(vec![Passage {
            content: "prior deployment notes".into(),
            source: "kb/deployments.md".into(),
            score: 0.92,
        }]);
        let (outputs, rejections) = ctx_parts();
        let ctx = StageContext {
            request: "network overhaul rfp",
            outputs: &outputs,
            rejections: &rejections,
            outline: &[],
            retrieval: &retrieval,
            generation: &EchoGeneration,
        };

        match stage().produce(&ctx).await {
            StageOutcome::Content(out) => {
                assert_eq!(out.status, StageStatus::Ok);
                assert!(out.content.contains("prior deployment notes"));
                assert_eq!(out.metadata.sources, vec!["kb/deployments.md"]);
            }
            StageOutcome::Mutation(_) => panic!("expected content"),
        }
    }

    #[tokio::test]
    async fn generation_failure_yields_labeled_degraded_content() {
        let retrieval = CannedRetrieval(vec![]);
        let (outputs, rejections) = ctx_parts();
        let ctx = StageContext {
            request: "rfp",
            outputs: &outputs,
            rejections: &rejections,
            outline: &[],
            retrieval: &retrieval,
            generation: &BrokenGeneration,
        };

        match stage().produce(&ctx).await {
            StageOutcome::Content(out) => {
                assert_eq!(out.status, StageStatus::Degraded);
                assert!(!out.content.is_empty());
                assert!(out.content.contains("fallback"));
                assert!(out.content.contains("Technical Approach"));
            }
            StageOutcome::Mutation(_) => panic!("expected content"),
        }
    }
}
