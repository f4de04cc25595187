//! Final document composition
//!
//! Assembles the accumulated stage outputs into one markdown document once
//! the router terminates. Sections appear in stage registration order, not
//! completion order, so reruns of the same pipeline produce the same layout.
//! Degraded sections are labeled inline rather than dropped.

use draftflow_pipeline::{StageId, StageOutputs, StageStatus};

const DEGRADED_NOTICE: &str =
    "> Note: this section was produced from fallback content after a generation failure.";

/// Section heading derived from a stage id
fn headline(stage: &StageId) -> String {
    stage
        .as_str()
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Assemble the final markdown document
#[must_use]
pub fn compose_final(request: &str, order: &[StageId], outputs: &StageOutputs) -> String {
    let mut doc = String::new();
    doc.push_str("# Assembled Draft\n\n");
    doc.push_str(&format!("_Request: {request}_\n"));

    for stage in order {
        let Some(output) = outputs.get(stage) else {
            continue;
        };
        doc.push_str(&format!("\n## {}\n\n", headline(stage)));
        if output.status == StageStatus::Degraded {
            doc.push_str(DEGRADED_NOTICE);
            doc.push_str("\n\n");
        }
        doc.push_str(output.content.trim_end());
        doc.push('\n');
    }

    doc.push_str("\n---\n\n## Generation Summary\n\n");
    for stage in order {
        let Some(output) = outputs.get(stage) else {
            continue;
        };
        let status = match output.status {
            StageStatus::Ok => "ok",
            StageStatus::Degraded => "degraded",
        };
        doc.push_str(&format!(
            "- `{stage}`: {status}, {} source(s), {}\n",
            output.metadata.sources.len(),
            output.metadata.timestamp.format("%Y-%m-%d %H:%M UTC"),
        ));
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftflow_pipeline::StageOutput;

    #[test]
    fn sections_follow_registration_order() {
        let order = ["technical", "pricing", "legal"].map(StageId::from);
        let mut outputs = StageOutputs::new();
        // Completed out of order.
        outputs.insert(
            StageId::from("legal"),
            StageOutput::ok(StageId::from("legal"), "terms", vec![]),
        );
        outputs.insert(
            StageId::from("technical"),
            StageOutput::ok(StageId::from("technical"), "architecture", vec!["kb".into()]),
        );

        let doc = compose_final("build a bridge", &order, &outputs);
        let technical = doc.find("## Technical").unwrap();
        let legal = doc.find("## Legal").unwrap();
        assert!(technical < legal);
        // Missing stage contributes no section.
        assert!(!doc.contains("## Pricing"));
        assert!(doc.contains("_Request: build a bridge_"));
    }

    #[test]
    fn degraded_sections_are_labeled() {
        let order = ["quality_review"].map(StageId::from);
        let mut outputs = StageOutputs::new();
        outputs.insert(
            StageId::from("quality_review"),
            StageOutput::degraded(StageId::from("quality_review"), "fallback text", vec![]),
        );

        let doc = compose_final("r", &order, &outputs);
        assert!(doc.contains("## Quality Review"));
        assert!(doc.contains(DEGRADED_NOTICE));
        assert!(doc.contains("- `quality_review`: degraded, 0 source(s)"));
    }
}
