//! Stage-by-stage behaviour on representative inputs.

use std::sync::Arc;

use nltype::testing::ScriptedOracle;
use nltype::{
    grammar, AnnotationMode, Annotator, Decomposer, EntityType, Label, NlTypeError, Proposition,
    RelationType, ResponsivenessLevel, Stage, StageSettings, TypedText, Verifier,
};

fn settings() -> StageSettings {
    StageSettings::new("test-model", ResponsivenessLevel::Low)
}

fn typed(lines: &[&str]) -> TypedText {
    lines
        .iter()
        .map(|l| grammar::parse_line(Stage::Annotate, l).unwrap())
        .collect()
}

#[tokio::test]
async fn test_scenario_plausible_sentence() {
    let oracle = Arc::new(ScriptedOracle::new([
        "The boy is playing soccer in the park.",
        "The boy (human) is playing soccer (action) in (spatial) the park (location).",
        "The human is playing an action in (spatial) the location.",
        "TypeCheckPassed",
    ]));

    let decomposer = Decomposer::new(oracle.clone(), settings());
    let annotator = Annotator::new(oracle.clone(), settings());
    let verifier = Verifier::new(oracle.clone(), settings());

    let propositions = decomposer
        .decompose("The boy is playing soccer in the park.")
        .await
        .unwrap();
    assert_eq!(propositions.len(), 1);
    assert_eq!(propositions[0].text, "The boy is playing soccer in the park.");

    let typed = annotator.annotate_fresh(&propositions).await.unwrap();
    let p = &typed.propositions[0];
    assert_eq!(
        p.entity_types().collect::<Vec<_>>(),
        vec![EntityType::Human, EntityType::Action, EntityType::Location]
    );
    assert_eq!(p.relations[0].preposition, "in");
    assert_eq!(p.relations[0].relation_type, RelationType::Spatial);

    let (rewrite, verdict) = verifier.verify(&typed).await.unwrap();
    assert_eq!(
        rewrite.lines(),
        vec!["The human is playing an action in (spatial) the location."]
    );
    assert!(verdict.is_pass());
    assert_eq!(oracle.call_count(), 4);
}

#[tokio::test]
async fn test_scenario_sleeping_rock() {
    let oracle = Arc::new(ScriptedOracle::new([
        "The natural-object is sleeping on (spatial) the object.",
        "TypeError\n\
         The natural-object is sleeping on (spatial) the object.\n\
         Sleeping requires an animate agent, and a natural-object is not animate.",
    ]));
    let verifier = Verifier::new(oracle, settings());

    let typed = typed(&["The rock (natural-object) is sleeping on (spatial) the table (object)."]);
    let (rewrite, verdict) = verifier.verify(&typed).await.unwrap();

    assert_eq!(
        rewrite.propositions()[0].entity_types().collect::<Vec<_>>(),
        vec![EntityType::NaturalObject, EntityType::Object]
    );
    assert!(!verdict.is_pass());
    assert_eq!(verdict.diagnostics().len(), 1);
    assert_eq!(verdict.diagnostics()[0].index, 0);
    assert!(verdict.diagnostics()[0].explanation.contains("animate"));
}

#[tokio::test]
async fn test_scenario_revision_corrects_one_label() {
    let oracle = Arc::new(ScriptedOracle::new(["The dog (animal) is barking."]));
    let annotator = Annotator::new(oracle.clone(), settings());

    let before = typed(&["The dog (object) is barking."]);
    let after = annotator.revise(&before, None).await.unwrap();

    let changes = before.label_changes(&after);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].span, "dog");
    assert_eq!(changes[0].to, Some(Label::Entity(EntityType::Animal)));
    assert!(after.propositions[0].entities.iter().all(|e| e.span != "barking"));

    let prompt = oracle.requests()[0].prompt();
    assert!(prompt.contains("The dog (object) is barking."));
}

#[tokio::test]
async fn test_revision_labeling_new_token_is_rejected() {
    let oracle = Arc::new(ScriptedOracle::new(["The dog (animal) is barking (action)."]));
    let annotator = Annotator::new(oracle, settings());

    let err = annotator
        .revise(&typed(&["The dog (object) is barking."]), None)
        .await
        .unwrap_err();
    let violation = err.as_contract().expect("contract violation");
    assert_eq!(violation.stage, Stage::Annotate);
}

#[tokio::test]
async fn test_compound_sentence_distributes_clause() {
    let oracle = Arc::new(ScriptedOracle::new([
        "The cat jumps over the dog before the sun rises.\nThe bird sings before the sun rises.",
    ]));
    let decomposer = Decomposer::new(oracle.clone(), settings());

    let propositions = decomposer
        .decompose("Before the sun rises, the cat jumps over the dog and the bird sings.")
        .await
        .unwrap();

    assert_eq!(propositions.len(), 2);
    for p in &propositions {
        assert!(p.text.contains("before the sun rises"));
    }
    assert!(oracle.requests()[0]
        .prompt()
        .ends_with("Before the sun rises, the cat jumps over the dog and the bird sings.\n"));
}

#[tokio::test]
async fn test_nonsense_is_still_decomposed() {
    let oracle = Arc::new(ScriptedOracle::new(["Ideas sleep furiously.\nA rock plays trumpet."]));
    let decomposer = Decomposer::new(oracle, settings());

    let propositions = decomposer
        .decompose("Ideas sleep furiously and a rock plays trumpet.")
        .await
        .unwrap();
    assert_eq!(propositions.len(), 2);
}

#[tokio::test]
async fn test_fresh_annotation_outside_taxonomy_fails() {
    let oracle = Arc::new(ScriptedOracle::new(["The boy (person) is playing."]));
    let annotator = Annotator::new(oracle, settings());

    let err = annotator
        .annotate(&[Proposition::plain("The boy is playing.")], AnnotationMode::Fresh, None)
        .await
        .unwrap_err();
    assert!(err.as_contract().is_some_and(|v| v.is_taxonomy()));
}

#[tokio::test]
async fn test_malformed_verdict_is_not_guessed() {
    let oracle = Arc::new(ScriptedOracle::new([
        "The animal is barking.",
        "Everything looks plausible to me!",
    ]));
    let verifier = Verifier::new(oracle, settings());

    let err = verifier
        .verify(&typed(&["The dog (animal) is barking."]))
        .await
        .unwrap_err();
    assert_eq!(err.as_contract().map(|v| v.stage), Some(Stage::Judge));
}

#[tokio::test]
async fn test_generalization_must_preserve_labels() {
    let oracle = Arc::new(ScriptedOracle::new(["The animal is barking at the location."]));
    let verifier = Verifier::new(oracle.clone(), settings());

    let err = verifier
        .verify(&typed(&["The dog (animal) is barking."]))
        .await
        .unwrap_err();
    assert_eq!(err.as_contract().map(|v| v.stage), Some(Stage::Generalize));
    // Judgment never starts after a failed generalization
    assert_eq!(oracle.call_count(), 1);
}

#[tokio::test]
async fn test_oracle_failure_propagates() {
    let oracle = Arc::new(ScriptedOracle::new(Vec::<String>::new()));
    let decomposer = Decomposer::new(oracle, settings());

    let err = decomposer.decompose("A rock plays trumpet.").await.unwrap_err();
    assert!(matches!(err, NlTypeError::Oracle(_)));
}

#[tokio::test]
async fn test_identical_generalized_propositions_both_fail() {
    let oracle = Arc::new(ScriptedOracle::new([
        "The rock sleeps.\nThe stone sleeps.",
        "The rock (natural-object) sleeps.\nThe stone (natural-object) sleeps.",
        "The natural-object sleeps.\nThe natural-object sleeps.",
        "TypeError\nThe natural-object sleeps.\nA natural-object cannot sleep.\n\
         TypeError\nThe natural-object sleeps.\nA natural-object cannot sleep.",
    ]));
    let decomposer = Decomposer::new(oracle.clone(), settings());
    let annotator = Annotator::new(oracle.clone(), settings());
    let verifier = Verifier::new(oracle, settings());

    let propositions = decomposer.decompose("The rock and the stone sleep.").await.unwrap();
    let typed = annotator.annotate_fresh(&propositions).await.unwrap();
    let (_, verdict) = verifier.verify(&typed).await.unwrap();

    let indices: Vec<_> = verdict.diagnostics().iter().map(|d| d.index).collect();
    assert_eq!(indices, vec![0, 1]);
}

#[tokio::test]
async fn test_untyped_words_and_parentheticals_pass_through() {
    let oracle = Arc::new(ScriptedOracle::new([
        "The CEO (chief executive) arrived at the party on time.",
        "The CEO (human) (chief executive) arrived at (spatial) the party (event) on time.",
        "The human (chief executive) arrived at (spatial) the event on time.",
        "TypeCheckPassed",
    ]));
    let decomposer = Decomposer::new(oracle.clone(), settings());
    let annotator = Annotator::new(oracle.clone(), settings());
    let verifier = Verifier::new(oracle, settings());

    let propositions = decomposer
        .decompose("The CEO (chief executive) arrived at the party on time.")
        .await
        .unwrap();
    let typed = annotator.annotate_fresh(&propositions).await.unwrap();
    assert_eq!(
        typed.propositions[0].entity_types().collect::<Vec<_>>(),
        vec![EntityType::Human, EntityType::Event]
    );

    let (rewrite, verdict) = verifier.verify(&typed).await.unwrap();
    assert_eq!(
        rewrite.lines(),
        vec!["The human (chief executive) arrived at (spatial) the event on time."]
    );
    assert!(verdict.is_pass());
}
