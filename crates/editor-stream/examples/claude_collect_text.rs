use editor_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_observability();

    let generator = Generator::builder()
        .provider(ClaudeConfig::from_env()?)
        .retry_policy(RetryPolicy::exponential(2, 500, 2.0))
        .options(GenerationOptions::default().temperature(0.2).max_output_tokens(256))
        .build()?;

    let text = generator
        .start(&[Message::user("Rewrite more concisely: The meeting has been moved to a later time.")])?
        .collect_text()
        .await?;

    println!("{text}");
    Ok(())
}
