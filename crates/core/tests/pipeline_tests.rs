//! Pipeline behaviour against a scripted generator.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use texforge_core::{
    GenerationError, Generator, ImageData, OutputKind, Pipeline, RunPhase, SubmitError,
};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Base(String),
    Derived(OutputKind, ImageData),
}

/// Succeeds unless told otherwise; records every call in order.
#[derive(Default)]
struct ScriptedGenerator {
    calls: Mutex<Vec<Call>>,
    fail_base: bool,
    fail_kinds: HashSet<OutputKind>,
    empty_kinds: HashSet<OutputKind>,
    /// If set, the base call waits until notified.
    gate: Option<Arc<Notify>>,
}

impl ScriptedGenerator {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn derived_calls(&self) -> Vec<OutputKind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Derived(kind, _) => Some(kind),
                Call::Base(_) => None,
            })
            .collect()
    }
}

fn image_for(kind: OutputKind) -> ImageData {
    ImageData::from_bytes("image/png", kind.as_str().as_bytes())
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate_base(&self, prompt: &str) -> Result<ImageData, GenerationError> {
        self.calls.lock().unwrap().push(Call::Base(prompt.to_string()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_base {
            return Err(GenerationError::GenerationFailed("service unavailable".into()));
        }
        Ok(image_for(OutputKind::Albedo))
    }

    async fn generate_derived(
        &self,
        base: &ImageData,
        kind: OutputKind,
    ) -> Result<ImageData, GenerationError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Derived(kind, base.clone()));
        if self.fail_kinds.contains(&kind) {
            return Err(GenerationError::GenerationFailed(format!("{kind} exploded")));
        }
        if self.empty_kinds.contains(&kind) {
            return Err(GenerationError::NoImageProduced { kind });
        }
        Ok(image_for(kind))
    }
}

#[tokio::test]
async fn full_success_populates_every_kind() {
    let generator = Arc::new(ScriptedGenerator::default());
    let pipeline = Pipeline::new(generator.clone());

    let snap = pipeline.run("weathered basalt rock").await.unwrap();

    assert_eq!(snap.phase, RunPhase::Done);
    assert!(snap.pending.is_empty());
    assert!(snap.error.is_none());
    assert_eq!(snap.results.len(), 5);
    for kind in OutputKind::ALL {
        assert_eq!(snap.results[&kind], image_for(kind));
    }
    assert_eq!(
        generator.calls()[0],
        Call::Base("weathered basalt rock".to_string())
    );
}

#[tokio::test]
async fn derived_calls_receive_the_base_image_in_fixed_order() {
    let generator = Arc::new(ScriptedGenerator::default());
    let pipeline = Pipeline::new(generator.clone());

    pipeline.run("rusty metal plate").await.unwrap();
    pipeline.run("rusty metal plate").await.unwrap();

    let expected: Vec<OutputKind> = OutputKind::DERIVED
        .iter()
        .chain(OutputKind::DERIVED.iter())
        .copied()
        .collect();
    assert_eq!(generator.derived_calls(), expected);
    for call in generator.calls() {
        if let Call::Derived(_, base) = call {
            assert_eq!(base, image_for(OutputKind::Albedo));
        }
    }
}

#[tokio::test]
async fn base_failure_is_fatal_and_skips_derived() {
    let generator = Arc::new(ScriptedGenerator {
        fail_base: true,
        ..Default::default()
    });
    let pipeline = Pipeline::new(generator.clone());

    let snap = pipeline.run("lava").await.unwrap();

    assert_eq!(snap.phase, RunPhase::Idle);
    assert!(snap.results.is_empty());
    assert!(snap.pending.is_empty());
    assert_eq!(
        snap.error.as_deref(),
        Some("generation failed: service unavailable")
    );
    assert!(generator.derived_calls().is_empty());
    assert!(!pipeline.is_active().await);
}

#[tokio::test]
async fn one_failed_derived_map_does_not_stop_the_others() {
    let generator = Arc::new(ScriptedGenerator {
        fail_kinds: [OutputKind::Height].into_iter().collect(),
        ..Default::default()
    });
    let pipeline = Pipeline::new(generator.clone());

    let snap = pipeline.run("weathered basalt rock").await.unwrap();

    assert_eq!(snap.phase, RunPhase::Done);
    assert!(snap.pending.is_empty());
    assert!(snap.error.is_none());
    assert_eq!(
        snap.results.keys().copied().collect::<Vec<_>>(),
        vec![
            OutputKind::Albedo,
            OutputKind::Normal,
            OutputKind::Metallic,
            OutputKind::Ao
        ]
    );
    assert_eq!(
        snap.failures.get(&OutputKind::Height).map(String::as_str),
        Some("generation failed: height exploded")
    );
    assert_eq!(generator.derived_calls().len(), 4);
}

#[tokio::test]
async fn empty_response_counts_as_derived_failure() {
    let generator = Arc::new(ScriptedGenerator {
        empty_kinds: [OutputKind::Normal, OutputKind::Ao].into_iter().collect(),
        ..Default::default()
    });
    let pipeline = Pipeline::new(generator);

    let snap = pipeline.run("oak planks").await.unwrap();

    assert_eq!(snap.results.len(), 3);
    assert_eq!(
        snap.failures.get(&OutputKind::Ao).map(String::as_str),
        Some("no image produced for ao")
    );
}

#[tokio::test]
async fn blank_prompt_is_a_no_op() {
    let generator = Arc::new(ScriptedGenerator::default());
    let pipeline = Pipeline::new(generator.clone());

    assert_eq!(pipeline.run("   \t\n").await, Err(SubmitError::BlankPrompt));
    assert_eq!(pipeline.submit("").await, Err(SubmitError::BlankPrompt));
    assert!(generator.calls().is_empty());
    assert_eq!(pipeline.snapshot().await.run_id, None);
}

#[tokio::test]
async fn resubmission_during_active_run_is_rejected() {
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(ScriptedGenerator {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    let pipeline = Arc::new(Pipeline::new(generator.clone()));

    let ticket = pipeline.submit("cracked clay").await.unwrap();
    let driver = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.drive(ticket).await })
    };

    let before = pipeline.snapshot().await;
    assert!(before.phase.is_active());
    assert_eq!(pipeline.submit("something else").await, Err(SubmitError::RunActive));
    let after = pipeline.snapshot().await;
    assert_eq!(before.run_id, after.run_id);
    assert_eq!(after.prompt.as_deref(), Some("cracked clay"));

    gate.notify_one();
    let done = driver.await.unwrap();
    assert_eq!(done.phase, RunPhase::Done);
    assert_eq!(done.results.len(), 5);

    // Only the first prompt ever reached the generator.
    let bases: Vec<_> = generator
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Base(_)))
        .collect();
    assert_eq!(bases, vec![Call::Base("cracked clay".to_string())]);
}

#[tokio::test]
async fn new_run_replaces_previous_results() {
    let generator = Arc::new(ScriptedGenerator {
        fail_kinds: [OutputKind::Metallic].into_iter().collect(),
        ..Default::default()
    });
    let pipeline = Pipeline::new(generator);

    let first = pipeline.run("granite").await.unwrap();
    let second = pipeline.run("marble").await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(second.prompt.as_deref(), Some("marble"));
    assert_eq!(second.results.len(), 4);
    assert_eq!(second.failures.len(), 1);
}
