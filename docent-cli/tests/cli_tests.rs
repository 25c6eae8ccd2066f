//! Index a corpus on disk, then answer from the persisted index.

use clap::Parser;
use docent_chat::ChatConfig;
use docent_cli::cli::{Cli, Command};
use docent_cli::commands::{open_session, run_index};
use docent_rag::VectorIndex;

const CORPUS: &str = "The sky is blue. Water boils at 100 degrees Celsius.\n";

#[tokio::test]
async fn index_then_answer_from_disk() {
    let temp = tempfile::tempdir().unwrap();
    let corpus = temp.path().join("facts.txt");
    let index = temp.path().join("facts.index.json");
    std::fs::write(&corpus, CORPUS).unwrap();

    let cli = Cli::try_parse_from([
        "docent",
        "index",
        corpus.to_str().unwrap(),
        "--output",
        index.to_str().unwrap(),
        "--chunk-size",
        "50",
        "--chunk-overlap",
        "0",
        "--dimensions",
        "256",
    ])
    .unwrap();
    let Command::Index(args) = cli.command else { panic!("expected index") };
    run_index(args).await.unwrap();

    let loaded = VectorIndex::load(&index).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.embedder().model_id, "hashing-fnv1a-v1/256");

    let cli = Cli::try_parse_from([
        "docent",
        "ask",
        "--index",
        index.to_str().unwrap(),
        "--provider",
        "mock",
        "-k",
        "1",
        "What color is the sky?",
    ])
    .unwrap();
    let Command::Ask(args) = cli.command else { panic!("expected ask") };
    let config = ChatConfig::builder().top_k(args.session.top_k).build().unwrap();
    let mut session = open_session(&args.session, config).unwrap();

    let answer = session.answer(&args.question.join(" ")).await.unwrap();
    assert_eq!(answer.text, "I don't know.");
    assert_eq!(answer.sources[0].chunk.text, "The sky is blue.");
}

#[tokio::test]
async fn missing_index_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let cli = Cli::try_parse_from([
        "docent",
        "chat",
        "--index",
        temp.path().join("nope.json").to_str().unwrap(),
        "--provider",
        "mock",
    ])
    .unwrap();
    let Command::Chat(args) = cli.command else { panic!("expected chat") };
    let err = open_session(&args.session, ChatConfig::default()).err().unwrap();
    assert!(err.to_string().contains("run `docent index` first"));
}

#[tokio::test]
async fn empty_corpus_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let corpus = temp.path().join("empty.txt");
    std::fs::write(&corpus, "  \n\n ").unwrap();

    let cli = Cli::try_parse_from(["docent", "index", corpus.to_str().unwrap()]).unwrap();
    let Command::Index(args) = cli.command else { panic!("expected index") };
    assert!(run_index(args).await.is_err());
}
