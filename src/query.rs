//! Question answering over the ingested corpus.
//!
//! `ask` answers one question; `chat` keeps a conversation going with the
//! history replayed to the model each turn. Both run the same path:
//! embed the question, rank index entries by cosine similarity, build a
//! grounding prompt from the top hits, and hand it to the completion
//! provider. When nothing has been ingested yet there is nothing to ground
//! an answer in, so [`FALLBACK_ANSWER`] is returned without any provider
//! call.

use std::io::Write;

use crate::completion::{complete, expand_question, ChatMessage};
use crate::context::AppContext;
use crate::embedding::{create_provider, embed_query, EmbeddingProvider};
use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::{Answer, Conversation, Role, SearchHit};

/// Returned verbatim when the index is absent or empty.
pub const FALLBACK_ANSWER: &str =
    "I could not find anything relevant in the ingested documents to answer that.";

const SYSTEM_PROMPT: &str = "You answer questions about the user's ingested documents. \
     Ground every answer in the provided excerpts and say so when they do not \
     contain the answer.";

/// Answer a single question and print it with its sources.
pub async fn run_ask(ctx: &AppContext, question: &str) -> anyhow::Result<()> {
    let index = VectorIndex::load(&ctx.config.storage.index_dir)?;
    let mut conversation = Conversation::new();

    if let Some(answer) = answer_question(ctx, index.as_ref(), &mut conversation, question).await? {
        print_answer(&answer);
    }

    Ok(())
}

/// Interactive loop over stdin. `exit` quits, `reset` clears the history.
///
/// A failed question is reported on stderr and leaves the conversation as
/// it was; the loop continues.
pub async fn run_chat(ctx: &AppContext) -> anyhow::Result<()> {
    let index = VectorIndex::load(&ctx.config.storage.index_dir)?;
    let mut conversation = Conversation::new();

    println!("Ask questions about the ingested documents. Type 'exit' to quit, 'reset' to start over.");

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }
        if input == "reset" {
            conversation.reset();
            println!("Conversation cleared.");
            continue;
        }

        match answer_question(ctx, index.as_ref(), &mut conversation, input).await {
            Ok(Some(answer)) => {
                print_answer(&answer);
                println!();
            }
            Ok(None) => {}
            Err(e) => eprintln!("error: {}", e),
        }
    }

    Ok(())
}

/// Core question-answering flow shared by `ask` and `chat`.
///
/// Returns `Ok(None)` for a blank question. On success the exchange is
/// appended to `conversation`; on a provider error nothing is appended.
pub async fn answer_question(
    ctx: &AppContext,
    index: Option<&VectorIndex>,
    conversation: &mut Conversation,
    question: &str,
) -> Result<Option<Answer>> {
    let question = question.trim();
    if question.is_empty() {
        return Ok(None);
    }

    let index = match index {
        Some(idx) if !idx.is_empty() => idx,
        _ => {
            let answer = Answer {
                text: FALLBACK_ANSWER.to_string(),
                sources: Vec::new(),
            };
            conversation.record(question, &answer.text);
            return Ok(Some(answer));
        }
    };

    let provider = create_provider(&ctx.config.embedding)?;

    let mut queries = vec![question.to_string()];
    if ctx.config.retrieval.expand_query {
        match expand_question(&ctx.http, &ctx.config.completion, question).await {
            Ok(expansions) => queries.extend(expansions),
            Err(e) => {
                tracing::warn!(error = %e, "query expansion failed; retrieving with the original question");
            }
        }
    }

    let hits = retrieve(ctx, provider.as_ref(), index, &queries, ctx.config.retrieval.top_k).await?;

    let messages = build_messages(conversation, question, &hits);
    let text = complete(&ctx.http, &ctx.config.completion, &messages).await?;

    let answer = Answer {
        text,
        sources: dedup_sources(&hits),
    };

    conversation.record(question, &answer.text);
    Ok(Some(answer))
}

/// Search the index with every phrasing of the question and merge the
/// results: duplicates collapse, the rest re-rank by score, at most `k`
/// hits survive. With expansion off this is a single plain search.
async fn retrieve(
    ctx: &AppContext,
    provider: &dyn EmbeddingProvider,
    index: &VectorIndex,
    queries: &[String],
    k: usize,
) -> Result<Vec<SearchHit>> {
    let mut merged: Vec<SearchHit> = Vec::new();

    for query in queries {
        let vector = embed_query(&ctx.http, provider, &ctx.config.embedding, query).await?;
        for hit in index.search(&vector, k) {
            if !merged
                .iter()
                .any(|h| h.source == hit.source && h.text == hit.text)
            {
                merged.push(hit);
            }
        }
    }

    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged.truncate(k);
    Ok(merged)
}

fn build_messages(
    conversation: &Conversation,
    question: &str,
    hits: &[SearchHit],
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];

    for turn in conversation.turns() {
        match turn.role {
            Role::User => messages.push(ChatMessage::user(turn.content.clone())),
            Role::Assistant => messages.push(ChatMessage::assistant(turn.content.clone())),
        }
    }

    messages.push(ChatMessage::user(grounding_prompt(question, hits)));
    messages
}

/// The prompt the model answers: tagged excerpts, then the question.
/// The question goes in verbatim even when retrieval used expansions.
fn grounding_prompt(question: &str, hits: &[SearchHit]) -> String {
    let mut excerpts = String::new();
    for hit in hits {
        excerpts.push_str(&format!("[{}]\n{}\n\n", hit.source, hit.text));
    }

    format!(
        "Answer the question using only the excerpts below. Each excerpt is \
         tagged with the source it came from. If the excerpts do not contain \
         the answer, say that you do not know.\n\n{}Question: {}",
        excerpts, question
    )
}

/// Distinct sources in first-retrieved order.
fn dedup_sources(hits: &[SearchHit]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for hit in hits {
        if !sources.iter().any(|s| s == &hit.source) {
            sources.push(hit.source.clone());
        }
    }
    sources
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, source) in answer.sources.iter().enumerate() {
            println!("  {}. {}", i + 1, source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::embedding::hash_embed;
    use crate::index::IndexEntry;
    use tempfile::TempDir;

    async fn test_ctx(dir: &TempDir) -> AppContext {
        let mut config = Config::default();
        config.storage.db_path = dir.path().join("data/docqa.db");
        config.storage.index_dir = dir.path().join("data/index");
        config.embedding.provider = "hash".to_string();
        config.embedding.dims = Some(64);
        AppContext::init(config).await.unwrap()
    }

    fn hash_entry(text: &str, source: &str) -> IndexEntry {
        IndexEntry {
            text: text.to_string(),
            source: source.to_string(),
            embedding: hash_embed(text, 64),
        }
    }

    #[tokio::test]
    async fn blank_question_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        let mut conversation = Conversation::new();

        let answer = answer_question(&ctx, None, &mut conversation, "   ")
            .await
            .unwrap();
        assert!(answer.is_none());
        assert!(conversation.is_empty());
    }

    #[tokio::test]
    async fn missing_index_returns_exact_fallback() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        let mut conversation = Conversation::new();

        let answer = answer_question(&ctx, None, &mut conversation, "what is the policy?")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(answer.text, FALLBACK_ANSWER);
        assert!(answer.sources.is_empty());
        assert_eq!(conversation.turns().len(), 2);
    }

    #[tokio::test]
    async fn emptied_index_also_falls_back() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        let mut conversation = Conversation::new();

        let mut index = VectorIndex::build(vec![hash_entry("text", "a.txt")]).unwrap();
        index.remove_source("a.txt");

        let answer = answer_question(&ctx, Some(&index), &mut conversation, "anything?")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(answer.text, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn provider_failure_leaves_conversation_untouched() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await; // completion stays disabled
        let mut conversation = Conversation::new();

        let index = VectorIndex::build(vec![hash_entry("the policy grants 25 days", "a.txt")])
            .unwrap();

        let result = answer_question(&ctx, Some(&index), &mut conversation, "how many days?").await;
        assert!(result.is_err());
        assert!(conversation.is_empty());
    }

    #[tokio::test]
    async fn retrieve_ranks_on_topic_chunks_first() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        let provider = create_provider(&ctx.config.embedding).unwrap();

        let index = VectorIndex::build(vec![
            hash_entry("the cafeteria opens at eight in the morning", "cafeteria.txt"),
            hash_entry("employees accrue vacation days every month", "leave.txt"),
        ])
        .unwrap();

        let queries = vec!["how do vacation days accrue".to_string()];
        let hits = retrieve(&ctx, provider.as_ref(), &index, &queries, 10)
            .await
            .unwrap();

        assert_eq!(hits[0].source, "leave.txt");
    }

    #[tokio::test]
    async fn retrieve_merges_expansions_without_duplicates() {
        let dir = TempDir::new().unwrap();
        let ctx = test_ctx(&dir).await;
        let provider = create_provider(&ctx.config.embedding).unwrap();

        let index = VectorIndex::build(vec![hash_entry("remote work policy", "policy.txt")])
            .unwrap();

        let queries = vec![
            "remote work".to_string(),
            "working from home policy".to_string(),
        ];
        let hits = retrieve(&ctx, provider.as_ref(), &index, &queries, 10)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn sources_dedup_keeps_first_seen_order() {
        let hits = vec![
            SearchHit {
                text: "x".into(),
                source: "b.pdf".into(),
                score: 0.9,
            },
            SearchHit {
                text: "y".into(),
                source: "a.txt".into(),
                score: 0.8,
            },
            SearchHit {
                text: "z".into(),
                source: "b.pdf".into(),
                score: 0.7,
            },
        ];
        assert_eq!(dedup_sources(&hits), vec!["b.pdf", "a.txt"]);
    }

    #[test]
    fn grounding_prompt_tags_excerpts_and_keeps_question() {
        let hits = vec![SearchHit {
            text: "Visitors sign in at the desk.".into(),
            source: "visitors.pdf".into(),
            score: 0.5,
        }];
        let prompt = grounding_prompt("who signs in?", &hits);

        assert!(prompt.contains("[visitors.pdf]"));
        assert!(prompt.contains("Visitors sign in at the desk."));
        assert!(prompt.ends_with("Question: who signs in?"));
    }

    #[test]
    fn history_is_replayed_in_order() {
        let mut conversation = Conversation::new();
        conversation.record("first question", "first answer");

        let messages = build_messages(&conversation, "second question", &[]);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content, "first question");
        assert_eq!(messages[2].content, "first answer");
        assert!(messages[3].content.contains("second question"));
    }
}
