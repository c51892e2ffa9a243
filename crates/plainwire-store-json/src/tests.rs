//! Integration tests for `JsonLedger`, in memory and against a temp directory.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use plainwire_core::{
  ValidationError,
  correction::{CorrectionFilter, CorrectionKind, CorrectionRecord},
  ledger::{PublishError, StoryFilter, StoryLedger},
  oracle::{ExtractedFact, Extraction},
  story::{StatusKind, StoryProposal, StorySource, StoryStatus},
};

use crate::{Error, JsonLedger};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

fn source(name: &str, owner: &str, trust: f32) -> StorySource {
  StorySource {
    source_name: name.into(),
    owner_group: owner.into(),
    trust_score: trust,
  }
}

fn answers(pairs: &[(&str, Option<&str>)]) -> BTreeMap<String, Extraction> {
  pairs
    .iter()
    .map(|(fingerprint, claim)| {
      let extraction = match claim {
        Some(claim) => Extraction::Fact(ExtractedFact {
          extracted_claim: (*claim).into(),
          cleaned_text:    format!("{claim}."),
          location_tag:    None,
          cluster_key:     None,
          confidence:      None,
          newsworthy:      None,
        }),
        None => Extraction::NoFact,
      };
      ((*fingerprint).to_owned(), extraction)
    })
    .collect()
}

fn proposal(text: &str, proposed_at: DateTime<Utc>) -> StoryProposal {
  StoryProposal {
    fact_text: text.into(),
    sources: vec![source("Wire A", "Acme", 90.0), source("Wire B", "Globex", 80.0)],
    location_tag: Some("europe".into()),
    claim_key: format!("key-{text}"),
    proposed_at,
  }
}

// ─── Publishing ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn publish_assigns_gap_free_sequence_per_date() {
  let ledger = JsonLedger::in_memory();

  let mut ids = Vec::new();
  for n in 0..3 {
    let story = ledger
      .publish(proposal(&format!("Fact {n}"), at(1, 8 + n)))
      .await
      .unwrap();
    ids.push(story.id.to_string());
  }
  let next_day = ledger.publish(proposal("Fact 4", at(2, 1))).await.unwrap();

  assert_eq!(ids, ["2026-03-01-001", "2026-03-01-002", "2026-03-01-003"]);
  assert_eq!(next_day.id.to_string(), "2026-03-02-001");
}

#[tokio::test]
async fn publish_then_get_round_trips() {
  let ledger = JsonLedger::in_memory();
  let input = proposal("Parliament passes budget bill.", at(1, 9));
  let story = ledger.publish(input.clone()).await.unwrap();

  let fetched = ledger.get(&story.id.to_string()).await.unwrap().unwrap();
  assert_eq!(fetched.fact_text, input.fact_text);
  assert_eq!(fetched.sources.as_slice(), input.sources.as_slice());
  assert_eq!(fetched.status, StoryStatus::Published);
  assert_eq!(fetched.published_at, input.proposed_at);
}

#[tokio::test]
async fn get_accepts_bracketed_id() {
  let ledger = JsonLedger::in_memory();
  let story = ledger.publish(proposal("Fact", at(1, 9))).await.unwrap();

  let fetched = ledger.get("[2026-03-01-001]").await.unwrap();
  assert_eq!(fetched.map(|s| s.id), Some(story.id));
  assert!(ledger.get("[2026-03-01-002]").await.unwrap().is_none());
  assert!(ledger.get("garbage").await.unwrap().is_none());
}

#[tokio::test]
async fn publish_rejects_shared_owner() {
  let ledger = JsonLedger::in_memory();
  let mut input = proposal("Fact", at(1, 9));
  input.sources = vec![source("Wire A", "Acme", 90.0), source("Wire C", "Acme", 70.0)];

  let err = ledger.publish(input).await.unwrap_err();
  assert!(matches!(
    err,
    PublishError::Validation(ValidationError::SharedOwnerGroup { .. })
  ));
  assert!(ledger.list(&StoryFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn publish_rejects_single_source_and_empty_text() {
  let ledger = JsonLedger::in_memory();

  let mut single = proposal("Fact", at(1, 9));
  single.sources.truncate(1);
  assert!(matches!(
    ledger.publish(single).await,
    Err(PublishError::Validation(ValidationError::TooFewSources(1)))
  ));

  let blank = proposal("   ", at(1, 9));
  assert!(matches!(
    ledger.publish(blank).await,
    Err(PublishError::Validation(ValidationError::EmptyFactText))
  ));

  // Rejections never consume a sequence number.
  let story = ledger.publish(proposal("Fact", at(1, 9))).await.unwrap();
  assert_eq!(story.id.seq, 1);
}

// ─── Transitions ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn correction_with_bracketed_target_transitions_story() {
  let ledger = JsonLedger::in_memory();
  let story = ledger.publish(proposal("Three injured.", at(1, 9))).await.unwrap();

  let record = CorrectionRecord {
    target_story_id: "[2026-03-01-001]".into(),
    ..CorrectionRecord::new("x", CorrectionKind::Correction, "Five injured.", at(1, 12))
  };
  assert!(ledger.apply_correction(&record).await.unwrap());

  let after = ledger.get("2026-03-01-001").await.unwrap().unwrap();
  assert_eq!(after.fact_text, story.fact_text);
  match &after.status {
    StoryStatus::Corrected { correction_note, .. } => {
      assert_eq!(correction_note, "Five injured.");
    }
    other => panic!("expected corrected, got {other:?}"),
  }
  // Resolution time is the detection time, not the wall clock.
  assert_eq!(after.status.resolved_at(), Some(at(1, 12)));
}

#[tokio::test]
async fn correction_for_unknown_story_returns_false() {
  let ledger = JsonLedger::in_memory();
  ledger.publish(proposal("Fact", at(1, 9))).await.unwrap();
  let before = ledger.list(&StoryFilter::default()).await.unwrap();

  let record =
    CorrectionRecord::new("[2026-03-01-009]", CorrectionKind::Correction, "x", at(1, 12));
  assert!(!ledger.apply_correction(&record).await.unwrap());

  let not_an_id = CorrectionRecord::new("the bridge story", CorrectionKind::Retraction, "x", at(1, 12));
  assert!(!ledger.apply_retraction(&not_an_id).await.unwrap());

  assert_eq!(ledger.list(&StoryFilter::default()).await.unwrap(), before);
}

#[tokio::test]
async fn reapplying_same_transition_is_a_no_op() {
  let ledger = JsonLedger::in_memory();
  ledger.publish(proposal("Fact", at(1, 9))).await.unwrap();
  let record =
    CorrectionRecord::new("2026-03-01-001", CorrectionKind::Retraction, "Hoax.", at(1, 12));

  assert!(ledger.apply_retraction(&record).await.unwrap());
  let first = ledger.get("2026-03-01-001").await.unwrap().unwrap();

  assert!(ledger.apply_retraction(&record).await.unwrap());
  let second = ledger.get("2026-03-01-001").await.unwrap().unwrap();
  assert_eq!(first, second);
}

#[tokio::test]
async fn terminal_states_do_not_change() {
  let ledger = JsonLedger::in_memory();
  ledger.publish(proposal("Fact", at(1, 9))).await.unwrap();

  let retraction =
    CorrectionRecord::new("2026-03-01-001", CorrectionKind::Retraction, "Hoax.", at(1, 12));
  assert!(ledger.apply_retraction(&retraction).await.unwrap());

  let correction =
    CorrectionRecord::new("2026-03-01-001", CorrectionKind::Correction, "Later.", at(1, 13));
  assert!(!ledger.apply_correction(&correction).await.unwrap());

  let story = ledger.get("2026-03-01-001").await.unwrap().unwrap();
  assert!(matches!(story.status, StoryStatus::Retracted { .. }));
}

#[tokio::test]
async fn corrected_story_can_still_be_retracted() {
  let ledger = JsonLedger::in_memory();
  ledger.publish(proposal("Three injured.", at(1, 9))).await.unwrap();

  let correction =
    CorrectionRecord::new("2026-03-01-001", CorrectionKind::Correction, "Five injured.", at(1, 12));
  assert!(ledger.apply_correction(&correction).await.unwrap());

  let second =
    CorrectionRecord::new("2026-03-01-001", CorrectionKind::Correction, "Six injured.", at(1, 13));
  assert!(ledger.apply_correction(&second).await.unwrap());
  assert!(matches!(
    &ledger.get("2026-03-01-001").await.unwrap().unwrap().status,
    StoryStatus::Corrected { correction_note, .. } if correction_note == "Five injured."
  ));

  let retraction =
    CorrectionRecord::new("2026-03-01-001", CorrectionKind::Retraction, "Staged.", at(2, 8));
  assert!(ledger.apply_retraction(&retraction).await.unwrap());

  let story = ledger.get("2026-03-01-001").await.unwrap().unwrap();
  assert_eq!(
    story.status,
    StoryStatus::Retracted { retraction_note: "Staged.".into(), resolved_at: at(2, 8) }
  );
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_filters_by_status_window_and_tag() {
  let ledger = JsonLedger::in_memory();
  ledger.publish(proposal("Old", at(1, 9))).await.unwrap();
  ledger.publish(proposal("New", at(5, 9))).await.unwrap();
  let mut untagged = proposal("Untagged", at(5, 10));
  untagged.location_tag = None;
  ledger.publish(untagged).await.unwrap();

  let record = CorrectionRecord::new("2026-03-05-001", CorrectionKind::Correction, "x", at(5, 11));
  ledger.apply_correction(&record).await.unwrap();

  let recent = ledger
    .list(&StoryFilter {
      published_after: Some(at(5, 9) - Duration::days(1)),
      ..StoryFilter::default()
    })
    .await
    .unwrap();
  assert_eq!(recent.len(), 2);

  let published = ledger
    .list(&StoryFilter { status: Some(StatusKind::Published), ..StoryFilter::default() })
    .await
    .unwrap();
  assert_eq!(
    published.iter().map(|s| s.fact_text.as_str()).collect::<Vec<_>>(),
    ["Old", "Untagged"]
  );

  let tagged = ledger
    .list(&StoryFilter {
      location_tag: Some("europe".into()),
      limit: Some(1),
      ..StoryFilter::default()
    })
    .await
    .unwrap();
  assert_eq!(tagged.len(), 1);
  assert_eq!(tagged[0].fact_text, "Old");
}

// ─── Correction log ──────────────────────────────────────────────────────────

#[tokio::test]
async fn correction_log_records_and_marks_applied() {
  let ledger = JsonLedger::in_memory();
  let record = ledger
    .record_correction(CorrectionRecord::new(
      "[2026-03-01-001]",
      CorrectionKind::Correction,
      "x",
      at(1, 12),
    ))
    .await
    .unwrap();
  assert_eq!(record.target_story_id, "2026-03-01-001");

  // Recording the same record twice does not duplicate it.
  ledger.record_correction(record.clone()).await.unwrap();
  assert_eq!(ledger.corrections(&CorrectionFilter::default()).await.unwrap().len(), 1);

  assert!(ledger.mark_applied(record.record_id, at(1, 13)).await.unwrap());
  assert!(!ledger.mark_applied(uuid::Uuid::new_v4(), at(1, 13)).await.unwrap());

  let pending = ledger.corrections(&CorrectionFilter::pending()).await.unwrap();
  assert!(pending.is_empty());
  let all = ledger.corrections(&CorrectionFilter::default()).await.unwrap();
  assert!(all[0].applied);
  assert_eq!(all[0].applied_at, Some(at(1, 13)));
}

// ─── Headline cache ──────────────────────────────────────────────────────────

#[tokio::test]
async fn processed_headlines_are_kept_per_day() {
  let ledger = JsonLedger::in_memory();
  let day = at(1, 9).date_naive();

  assert!(ledger.processed_headlines(day).await.unwrap().is_empty());
  ledger.mark_processed(day, &answers(&[("aa", Some("first")), ("bb", None)])).await.unwrap();
  ledger.mark_processed(day, &answers(&[("bb", Some("late")), ("cc", Some("third"))])).await.unwrap();

  let seen = ledger.processed_headlines(day).await.unwrap();
  assert_eq!(seen.keys().collect::<Vec<_>>(), ["aa", "bb", "cc"]);
  // First answer wins.
  assert_eq!(seen["bb"], Extraction::NoFact);
  assert!(ledger.processed_headlines(at(2, 9).date_naive()).await.unwrap().is_empty());
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn reopen_restores_stories_and_corrections() {
  let tmp = tempfile::tempdir().unwrap();
  let dir = tmp.path();
  {
    let ledger = JsonLedger::open(dir).await.unwrap();
    ledger.publish(proposal("First", at(1, 9))).await.unwrap();
    ledger.publish(proposal("Second", at(1, 10))).await.unwrap();
    let record = ledger
      .record_correction(CorrectionRecord::new(
        "2026-03-01-002",
        CorrectionKind::Retraction,
        "Withdrawn by both outlets.",
        at(1, 11),
      ))
      .await
      .unwrap();
    assert!(ledger.apply_retraction(&record).await.unwrap());
    assert!(ledger.mark_applied(record.record_id, at(1, 11)).await.unwrap());
  }

  let reopened = JsonLedger::open(dir).await.unwrap();
  let stories = reopened.list(&StoryFilter::default()).await.unwrap();
  assert_eq!(stories.len(), 2);
  assert!(matches!(stories[1].status, StoryStatus::Retracted { .. }));
  let records = reopened.corrections(&CorrectionFilter::default()).await.unwrap();
  assert_eq!(records.len(), 1);
  assert!(records[0].applied);

  // Sequence numbering continues after reopen.
  let third = reopened.publish(proposal("Third", at(1, 12))).await.unwrap();
  assert_eq!(third.id.to_string(), "2026-03-01-003");

  let raw: serde_json::Value =
    serde_json::from_slice(&std::fs::read(dir.join("stories.json")).unwrap()).unwrap();
  assert_eq!(raw["stories"].as_array().map(Vec::len), Some(3));
  assert_eq!(raw["stories"][1]["status"], "retracted");
  assert!(!dir.join("stories.json.tmp").exists());
}

#[tokio::test]
async fn reopen_restores_headline_cache() {
  let tmp = tempfile::tempdir().unwrap();
  let day = at(1, 9).date_naive();
  {
    let ledger = JsonLedger::open(tmp.path()).await.unwrap();
    let cached = answers(&[("b1", Some("bridge closes")), ("a1", None)]);
    ledger.mark_processed(day, &cached).await.unwrap();
  }

  let raw: serde_json::Value = serde_json::from_slice(
    &std::fs::read(tmp.path().join("processed_2026-03-01.json")).unwrap(),
  )
  .unwrap();
  assert_eq!(raw["a1"]["outcome"], "no_fact");
  assert_eq!(raw["b1"]["outcome"], "fact");
  assert_eq!(raw["b1"]["extracted_claim"], "bridge closes");

  let reopened = JsonLedger::open(tmp.path()).await.unwrap();
  let seen = reopened.processed_headlines(day).await.unwrap();
  assert_eq!(seen, answers(&[("a1", None), ("b1", Some("bridge closes"))]));
  assert!(!tmp.path().join("processed_2026-03-02.json").exists());
}

#[tokio::test]
async fn open_rejects_sequence_gap() {
  let tmp = tempfile::tempdir().unwrap();
  let dir = tmp.path();
  let doc = serde_json::json!({
    "stories": [{
      "id": "2026-03-01-002",
      "fact_text": "Orphan.",
      "sources": [
        { "source_name": "A", "owner_group": "x", "trust_score": 80.0 },
        { "source_name": "B", "owner_group": "y", "trust_score": 70.0 }
      ],
      "status": "published",
      "published_at": "2026-03-01T09:00:00Z",
      "claim_key": "k"
    }]
  });
  std::fs::write(dir.join("stories.json"), doc.to_string()).unwrap();

  let result = JsonLedger::open(dir).await;
  assert!(matches!(result, Err(Error::Corrupt(_))));
}

#[tokio::test]
async fn open_rejects_uncorroborated_story_on_disk() {
  let tmp = tempfile::tempdir().unwrap();
  let dir = tmp.path();
  let doc = serde_json::json!({
    "stories": [{
      "id": "2026-03-01-001",
      "fact_text": "Single source.",
      "sources": [{ "source_name": "A", "owner_group": "x", "trust_score": 80.0 }],
      "status": "published",
      "published_at": "2026-03-01T09:00:00Z",
      "claim_key": "k"
    }]
  });
  std::fs::write(dir.join("stories.json"), doc.to_string()).unwrap();

  assert!(matches!(JsonLedger::open(dir).await, Err(Error::Json(_))));
}
