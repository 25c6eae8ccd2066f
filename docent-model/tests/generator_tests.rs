//! Behaviour of the `AnswerGenerator` trait defaults.

use std::sync::Arc;

use async_trait::async_trait;
use docent_model::{AnswerGenerator, MockGenerator, ModelError};
use futures::StreamExt;

/// Generator that only implements `generate`.
struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str, _max_tokens: usize) -> docent_model::Result<String> {
        if prompt.is_empty() {
            return Err(ModelError::Request { provider: "echo".into(), message: "empty".into() });
        }
        Ok(prompt.to_uppercase())
    }
}

#[test]
fn generators_are_object_safe() {
    let generators: Vec<Arc<dyn AnswerGenerator>> =
        vec![Arc::new(EchoGenerator), Arc::new(MockGenerator::new("mock"))];
    let names: Vec<&str> = generators.iter().map(|g| g.name()).collect();
    assert_eq!(names, ["echo", "mock"]);
}

#[tokio::test]
async fn default_stream_yields_one_fragment() {
    let stream = EchoGenerator.stream("the sky is blue", 16).await.unwrap();
    let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;
    assert_eq!(fragments, ["THE SKY IS BLUE"]);
}

#[tokio::test]
async fn default_stream_propagates_generate_errors() {
    assert!(matches!(EchoGenerator.stream("", 16).await, Err(ModelError::Request { .. })));
}

#[tokio::test]
async fn dropping_a_stream_early_is_harmless() {
    let generator = MockGenerator::new("mock")
        .with_response("one two three four")
        .with_response("second answer");

    let mut stream = generator.stream("first", 16).await.unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), "one ");
    drop(stream);

    assert_eq!(generator.generate("second", 16).await.unwrap(), "second answer");
    assert_eq!(generator.call_count(), 2);
}
