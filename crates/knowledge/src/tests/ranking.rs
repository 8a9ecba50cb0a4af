//! Retrieval ordering, failure surfacing and the answer flow.

use super::{failing_index_pipeline, FailingProvider, Harness};
use crate::config::RetrievalConfig;
use crate::error::RagError;
use crate::rag::{MaterialSelection, Retriever, Tutor, NOT_FOUND_ANSWER};
use std::sync::{Arc, Mutex};
use tutor_core::{AppError, AppResult};
use tutor_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};

const TASKS: [(&str, &str); 6] = [
    ("s__Zadanie_1", "Oblicz stężenie molowe roztworu kwasu solnego."),
    ("s__Zadanie_2", "Narysuj wzór strukturalny etanolu i propanolu."),
    ("s__Zadanie_3", "Zapisz równanie reakcji spalania metanu w tlenie."),
    ("s__Zadanie_4", "Określ stopień utlenienia siarki w kwasie siarkowym."),
    ("s__Zadanie_5", "Wyjaśnij, na czym polega hydroliza soli."),
    ("s__Zadanie_6", "Podaj konfigurację elektronową atomu żelaza."),
];

async fn indexed() -> Harness {
    let h = Harness::new();
    h.write_source("sprawdzian.json", &TASKS);
    assert_eq!(h.builder.rebuild_all().await.unwrap(), TASKS.len());
    h
}

/// Records requests and answers with a fixed text.
struct StubLlm {
    requests: Mutex<Vec<LlmRequest>>,
    fail: bool,
}

impl StubLlm {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            fail,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for StubLlm {
    fn provider_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(AppError::Llm("rate limited".to_string()));
        }
        Ok(LlmResponse {
            content: "  Stężenie to n/V.  ".to_string(),
            model: request.model.clone(),
            usage: LlmUsage::new(10, 5),
        })
    }
}

fn tutor(h: &Harness, llm: Arc<StubLlm>) -> Tutor {
    let retriever = Retriever::new(h.engine.clone(), RetrievalConfig::default());
    Tutor::new(retriever, llm, "gpt-4.1-mini", 0.3).unwrap()
}

#[tokio::test]
async fn test_query_on_empty_index() {
    let h = Harness::new();
    assert!(h.engine.query("Co to jest mol?", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_exact_text_ranks_first() {
    let h = indexed().await;

    let matches = h.engine.query_matches(TASKS[3].1, 5).await.unwrap();
    assert_eq!(matches.len(), 5);
    assert_eq!(matches[0].text, TASKS[3].1);
    assert_eq!(matches[0].metadata.item_id, TASKS[3].0);
    assert!(matches[0].distance < 0.001);

    for pair in matches.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[tokio::test]
async fn test_related_question_ranks_matching_task_first() {
    let h = indexed().await;

    let texts = h
        .engine
        .query("stężenie molowe roztworu kwasu", 3)
        .await
        .unwrap();
    assert_eq!(texts.len(), 3);
    assert_eq!(texts[0], TASKS[0].1);
}

#[tokio::test]
async fn test_top_k_zero_and_overlarge() {
    let h = indexed().await;
    assert!(h.engine.query("metan", 0).await.unwrap().is_empty());
    assert_eq!(h.engine.query("metan", 50).await.unwrap().len(), TASKS.len());
}

#[tokio::test]
async fn test_embedding_failure_is_not_empty_result() {
    let h = Harness::with_embedder(Arc::new(FailingProvider));
    let err = h.engine.query("Co to jest mol?", 5).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingUnavailable(_)));

    let retriever = Retriever::new(h.engine.clone(), RetrievalConfig::default());
    assert!(matches!(
        retriever.retrieve("Co to jest mol?").await,
        Err(RagError::EmbeddingUnavailable(_))
    ));
}

#[tokio::test]
async fn test_index_failure_is_not_empty_result() {
    let temp = tempfile::TempDir::new().unwrap();
    let (_, engine) = failing_index_pipeline(temp.path());

    let err = engine.query("Co to jest mol?", 5).await.unwrap_err();
    assert!(matches!(err, RagError::IndexQueryFailed(_)));
    assert!(matches!(
        engine.stats().await,
        Err(RagError::IndexQueryFailed(_))
    ));

    let retriever = Retriever::new(Arc::new(engine), RetrievalConfig::default());
    assert!(matches!(
        retriever.retrieve("Co to jest mol?").await,
        Err(RagError::IndexQueryFailed(_))
    ));
}

#[tokio::test]
async fn test_retriever_keeps_four_of_five() {
    let h = indexed().await;
    let retriever = Retriever::new(h.engine.clone(), RetrievalConfig::default());

    let chunks = retriever.retrieve(TASKS[1].1).await.unwrap();
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[0], TASKS[1].1);
}

#[tokio::test]
async fn test_ask_requires_active_material() {
    let h = indexed().await;
    let llm = StubLlm::new(false);
    let tutor = tutor(&h, llm.clone());

    let err = tutor
        .ask(&MaterialSelection::new(), "Co to jest mol?")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::NoActiveMaterial));
    assert!(llm.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ask_with_empty_index_skips_llm() {
    let h = Harness::new();
    let llm = StubLlm::new(false);
    let tutor = tutor(&h, llm.clone());

    let answer = tutor
        .ask(&MaterialSelection::with_material("arkusz.pdf"), "Co to jest mol?")
        .await
        .unwrap();
    assert_eq!(answer.answer, NOT_FOUND_ANSWER);
    assert!(answer.sources.is_empty());
    assert!(llm.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ask_grounds_answer_in_sources() {
    let h = indexed().await;
    let llm = StubLlm::new(false);
    let tutor = tutor(&h, llm.clone());

    let answer = tutor
        .ask(
            &MaterialSelection::with_material("sprawdzian.pdf"),
            TASKS[0].1,
        )
        .await
        .unwrap();

    assert_eq!(answer.answer, "Stężenie to n/V.");
    assert_eq!(answer.sources.len(), 4);
    assert_eq!(answer.sources[0], TASKS[0].1);

    let requests = llm.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "gpt-4.1-mini");
    assert_eq!(requests[0].temperature, Some(0.3));
    assert!(requests[0].system.is_some());
    assert!(requests[0]
        .prompt
        .contains(&answer.sources.join("\n\n---\n\n")));
}

#[tokio::test]
async fn test_llm_failure_is_answer_generation_failed() {
    let h = indexed().await;
    let tutor = tutor(&h, StubLlm::new(true));

    let err = tutor
        .ask(&MaterialSelection::with_material("sprawdzian.pdf"), "metan")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::AnswerGenerationFailed(_)));
}
