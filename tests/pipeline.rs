mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use newsverify_rs::credibility::CredibilityTable;
use newsverify_rs::error::{LlmError, SearchError, VerifyError};
use newsverify_rs::synthesis::NO_CLAIMS_EXPLANATION;
use newsverify_rs::types::{OverallVerdict, RelationshipLabel, Verdict};
use newsverify_rs::verification::CacheState;
use newsverify_rs::Pipeline;
use support::*;

const BUDGET_ARTICLE: &str = "The city council approved a 2 billion dollar budget on Tuesday. \
    The mayor said the vote was unanimous.";
const BUDGET_CLAIM: &str = "The city council approved a 2 billion dollar budget on Tuesday";
const VOTE_CLAIM: &str = "The council vote on the budget was unanimous";

fn budget_hits() -> Vec<newsverify_rs::search::SearchHit> {
    vec![
        hit("https://www.reuters.com/world/budget", "The city council approved a 2 billion dollar budget on Tuesday, officials said."),
        hit("https://apnews.com/article/budget", "Council members voted unanimously for the 2 billion dollar budget."),
        hit("https://rumours.example/post", "The council budget vote never happened."),
    ]
}

#[tokio::test]
async fn supported_claims_give_likely_true() {
    let p = pipeline(
        test_settings(),
        FakeLlm::replying(&llm_claims(&[(BUDGET_CLAIM, 0.9), (VOTE_CLAIM, 0.6)])),
        FakeSearcher::returning(budget_hits()),
        FakeLoader::with(|_, _| ENTAILS.to_vec()),
        FakeFetcher { body: None },
    );
    let v = p.verify_article(BUDGET_ARTICLE).await.unwrap();

    assert_eq!(v.overall_verdict, OverallVerdict::LikelyTrue);
    assert_eq!(v.factual_accuracy_score, 100.0);
    assert_eq!(v.emotional_manipulation_score, 0.0);
    assert_eq!(v.claim_breakdown.len(), 2);
    assert_eq!(v.claim_breakdown[0].claim.text, BUDGET_CLAIM);
    for cv in &v.claim_breakdown {
        assert_eq!(cv.verdict(), Verdict::True);
        assert!(cv.confidence() > 95.0);
        // the low-credibility source is filtered out before NLI
        assert_eq!(cv.supporting_evidence.len(), 2);
        assert!(cv.supporting_evidence.iter().all(|e| e.source_domain != "rumours.example"));
    }
    assert_eq!(v.evidence_cards.len(), 2);
    assert!(v.evidence_cards.iter().all(|c| c.relationship == RelationshipLabel::Supports));
    assert!(v.explanation.starts_with("This article appears to be largely accurate"));
    assert_eq!(p.status().nli_state, CacheState::Loaded);
}

#[tokio::test]
async fn contradicted_claim_gives_likely_false_with_discrepancies() {
    let claim = "The infrastructure bill was passed in 2023";
    let p = pipeline(
        test_settings(),
        FakeLlm::replying(&llm_claims(&[(claim, 0.8)])),
        FakeSearcher::returning(vec![hit(
            "https://reuters.com/politics/bill",
            "The infrastructure bill was not passed in 2023, congressional records show.",
        )]),
        FakeLoader::with(|_, _| CONTRADICTS.to_vec()),
        FakeFetcher { body: None },
    );
    let v = p.verify_article("Reports say the infrastructure bill was passed in 2023 by congress.").await.unwrap();

    assert_eq!(v.overall_verdict, OverallVerdict::LikelyFalse);
    assert_eq!(v.factual_accuracy_score, 0.0);
    assert_eq!(v.claim_breakdown[0].verdict(), Verdict::False);
    assert_eq!(v.claim_breakdown[0].contradicting_evidence.len(), 1);
    let card = &v.evidence_cards[0];
    assert_eq!(card.relationship, RelationshipLabel::Refutes);
    assert_eq!(card.source_name, "reuters.com");
    assert!(card.highlighted_discrepancies.contains(&"Claim states 'was' but evidence shows 'was not'".to_string()));
}

#[tokio::test]
async fn claims_are_judged_independently_and_keep_order() {
    let p = pipeline(
        test_settings(),
        FakeLlm::replying(&llm_claims(&[(VOTE_CLAIM, 0.6), (BUDGET_CLAIM, 0.9)])),
        FakeSearcher::returning(budget_hits()),
        FakeLoader::with(|_, hypothesis| {
            if hypothesis.contains("unanimous") {
                CONTRADICTS.to_vec()
            } else {
                ENTAILS.to_vec()
            }
        }),
        FakeFetcher { body: None },
    );
    let v = p.verify_article(BUDGET_ARTICLE).await.unwrap();

    let verdicts: Vec<_> = v.claim_breakdown.iter().map(|c| (c.claim.text.as_str(), c.verdict())).collect();
    assert_eq!(verdicts, vec![(BUDGET_CLAIM, Verdict::True), (VOTE_CLAIM, Verdict::False)]);
    assert_eq!(v.factual_accuracy_score, 50.0);
    assert_eq!(v.overall_verdict, OverallVerdict::LikelyFalse);
}

#[tokio::test]
async fn search_failure_leaves_claims_unverified() {
    let searcher = FakeSearcher {
        handler: Box::new(|_| Err(SearchError::Api { provider: "fake".into(), reason: "503".into() })),
        delay: None,
    };
    let p = pipeline(
        test_settings(),
        FakeLlm::replying(&llm_claims(&[(BUDGET_CLAIM, 0.9), (VOTE_CLAIM, 0.6)])),
        searcher,
        FakeLoader::with(|_, _| ENTAILS.to_vec()),
        FakeFetcher { body: None },
    );
    let v = p.verify_article(BUDGET_ARTICLE).await.unwrap();

    assert!(v.claim_breakdown.iter().all(|c| c.verdict() == Verdict::Unverified && c.confidence() == 0.0));
    assert!(v.evidence_cards.is_empty());
    // no evidence: 0.2 * 50 (neutral credibility) + 0.2 * 100 (calm writing)
    assert!((v.confidence_score - 30.0).abs() < 1e-9);
    // the classifier is never needed
    assert_eq!(p.status().nli_state, CacheState::Unloaded);
}

#[tokio::test]
async fn article_without_claims_is_unverified() {
    let p = pipeline(
        test_settings(),
        FakeLlm::replying("Nothing to report."),
        FakeSearcher::returning(vec![]),
        FakeLoader::with(|_, _| ENTAILS.to_vec()),
        FakeFetcher { body: None },
    );
    let v = p.verify_article("Hi there. Nice day.").await.unwrap();

    assert_eq!(v.overall_verdict, OverallVerdict::Unverified);
    assert_eq!(v.confidence_score, 0.0);
    assert!(v.claim_breakdown.is_empty());
    assert_eq!(v.explanation, NO_CLAIMS_EXPLANATION);
}

#[tokio::test]
async fn llm_outage_falls_back_to_rules() {
    let llm = Arc::new(FakeLlm {
        handler: Box::new(|_| Err(LlmError::Request { reason: "connection refused".into() })),
        calls: Default::default(),
    });
    let p = Pipeline::builder(test_settings())
        .llm(llm.clone())
        .searcher(Arc::new(FakeSearcher::returning(vec![])))
        .nli_loader(Arc::new(FakeLoader::with(|_, _| ENTAILS.to_vec())))
        .credibility(Arc::new(CredibilityTable::from_json_str(SOURCES).unwrap()))
        .build()
        .unwrap();
    let article = "The ministry reported 4 million new jobs in 2023. Officials confirmed the figures on Monday.";
    let v = p.verify_article(article).await.unwrap();

    assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    assert_eq!(v.claim_breakdown.len(), 2);
    assert!(v.claim_breakdown.iter().any(|c| c.claim.text.contains("4 million new jobs")));
}

#[tokio::test]
async fn missing_model_uses_keyword_matching() {
    let p = pipeline(
        test_settings(),
        FakeLlm::replying(&llm_claims(&[(BUDGET_CLAIM, 0.9)])),
        FakeSearcher::returning(vec![
            hit("https://reuters.com/a", "The city council approved a 2 billion dollar budget on Tuesday."),
            hit("https://apnews.com/b", "On Tuesday the city council approved a 2 billion dollar budget."),
        ]),
        FakeLoader::broken(),
        FakeFetcher { body: None },
    );
    let v = p.verify_article(BUDGET_ARTICLE).await.unwrap();

    assert_eq!(p.status().nli_state, CacheState::Failed);
    let cv = &v.claim_breakdown[0];
    assert_eq!(cv.verdict(), Verdict::True);
    // keyword matching caps support at the fallback's 0.6 entailment
    assert!((cv.confidence() - 60.0).abs() < 1e-9);
}

#[tokio::test]
async fn urls_are_fetched_first() {
    let p = pipeline(
        test_settings(),
        FakeLlm::replying(&llm_claims(&[(BUDGET_CLAIM, 0.9)])),
        FakeSearcher::returning(budget_hits()),
        FakeLoader::with(|_, _| ENTAILS.to_vec()),
        FakeFetcher { body: Some(BUDGET_ARTICLE.to_string()) },
    );
    let v = p.verify_article("https://news.example/council-budget").await.unwrap();
    assert_eq!(v.claim_breakdown[0].claim.text, BUDGET_CLAIM);

    let unreachable = pipeline(
        test_settings(),
        FakeLlm::replying(""),
        FakeSearcher::returning(vec![]),
        FakeLoader::broken(),
        FakeFetcher { body: None },
    );
    let err = unreachable.verify_article("https://news.example/gone").await.unwrap_err();
    assert!(matches!(err, VerifyError::Fetch { .. }));
}

#[tokio::test]
async fn empty_input_is_rejected() {
    let p = pipeline(
        test_settings(),
        FakeLlm::replying(""),
        FakeSearcher::returning(vec![]),
        FakeLoader::broken(),
        FakeFetcher { body: None },
    );
    assert!(matches!(p.verify_article("   ").await, Err(VerifyError::InvalidInput(_))));
}

#[tokio::test(start_paused = true)]
async fn slow_search_is_cut_off_by_the_deadline() {
    let settings = newsverify_rs::Settings { pipeline_deadline_secs: 5, ..test_settings() };
    let mut searcher = FakeSearcher::returning(budget_hits());
    searcher.delay = Some(Duration::from_secs(3600));
    let p = pipeline(
        settings,
        FakeLlm::replying(&llm_claims(&[(BUDGET_CLAIM, 0.9), (VOTE_CLAIM, 0.6)])),
        searcher,
        FakeLoader::with(|_, _| ENTAILS.to_vec()),
        FakeFetcher { body: None },
    );
    let v = p.verify_article(BUDGET_ARTICLE).await.unwrap();

    assert_eq!(v.claim_breakdown.len(), 2);
    assert!(v.claim_breakdown.iter().all(|c| c.verdict() == Verdict::Unverified));
}
