//! Integration tests for the conversation store.
//!
//! These exercise the file-backed store end-to-end: creation, appends,
//! listing, corrupt records and the model-input projection.

use scholar_common::{InputMessage, MessageRole, window};
use scholar_memory::{ConversationStore, StoreConfig};
use tempfile::TempDir;

async fn open_store(dir: &TempDir) -> ConversationStore {
    let config = StoreConfig {
        conversations_dir: dir.path().to_path_buf(),
    };
    ConversationStore::open(&config).await.unwrap()
}

#[tokio::test]
async fn test_create_persists_empty_record() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let id = store.create(None).await.unwrap();

    let conversation = store.get(&id).await.unwrap().unwrap();
    assert_eq!(conversation.id, id);
    assert_eq!(conversation.name, "");
    assert!(conversation.messages.is_empty());
    assert!(dir.path().join(format!("{id}.json")).exists());
}

#[tokio::test]
async fn test_append_keeps_order_and_name() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let id = store.create(Some("Matemática")).await.unwrap();
    store
        .append(&id, MessageRole::User, "Quanto é 10 * 10?")
        .await
        .unwrap();
    store.append(&id, MessageRole::Assistant, "100").await.unwrap();

    let conversation = store.get(&id).await.unwrap().unwrap();
    assert_eq!(conversation.name, "Matemática");
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.messages[0].content, "Quanto é 10 * 10?");
    assert_eq!(conversation.messages[1].role, MessageRole::Assistant);
    assert!(conversation.updated_at >= conversation.created_at);
}

#[tokio::test]
async fn test_append_to_unknown_id_starts_fresh_record() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    store
        .append("sessao-antiga", MessageRole::User, "Olá")
        .await
        .unwrap();

    let conversation = store.get("sessao-antiga").await.unwrap().unwrap();
    assert_eq!(conversation.messages.len(), 1);
    assert_eq!(conversation.name, "");
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    assert!(store.get("nao-existe").await.unwrap().is_none());
    assert!(store.as_input_list("nao-existe").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_record_reads_as_none() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    std::fs::write(dir.path().join("quebrado.json"), "{ not json").unwrap();

    assert!(store.get("quebrado").await.unwrap().is_none());

    // Appending over a corrupt record replaces it with a fresh one.
    store
        .append("quebrado", MessageRole::User, "recomeçar")
        .await
        .unwrap();
    let conversation = store.get("quebrado").await.unwrap().unwrap();
    assert_eq!(conversation.messages.len(), 1);
}

#[tokio::test]
async fn test_list_returns_sorted_json_ids_only() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let a = store.create(None).await.unwrap();
    let b = store.create(None).await.unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(store.list().await.unwrap(), expected);
}

#[tokio::test]
async fn test_summaries_skip_corrupt_records() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let id = store.create(Some("Português")).await.unwrap();
    store.append(&id, MessageRole::User, "Crase?").await.unwrap();
    std::fs::write(dir.path().join("ruim.json"), "[]").unwrap();

    let summaries = store.summaries().await.unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].id, id);
    assert_eq!(summaries[0].message_count, 1);
}

#[tokio::test]
async fn test_input_list_window() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let id = store.create(None).await.unwrap();
    for i in 0..6 {
        store
            .append(&id, MessageRole::User, &format!("pergunta {i}"))
            .await
            .unwrap();
        store
            .append(&id, MessageRole::Assistant, &format!("resposta {i}"))
            .await
            .unwrap();
    }

    let history = store.as_input_list(&id).await.unwrap();
    assert_eq!(history.len(), 12);

    let recent = window(history, 3);
    assert_eq!(
        recent,
        vec![
            InputMessage::assistant("resposta 4"),
            InputMessage::user("pergunta 5"),
            InputMessage::assistant("resposta 5"),
        ]
    );
}

#[tokio::test]
async fn test_dotted_spaced_and_accented_ids() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    for id in ["conversa.2024", "sessão", "minha conversa"] {
        assert!(store.get(id).await.unwrap().is_none());

        store.append(id, MessageRole::User, "Olá").await.unwrap();
        let conversation = store.get(id).await.unwrap().unwrap();
        assert_eq!(conversation.id, id);
        assert!(dir.path().join(format!("{id}.json")).exists());
    }

    let ids = store.list().await.unwrap();
    assert_eq!(ids, vec!["conversa.2024", "minha conversa", "sessão"]);
    assert_eq!(store.summaries().await.unwrap().len(), 3);
}
