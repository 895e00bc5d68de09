use std::io::Write as _;

use editor_stream::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_observability();

    let generator = Generator::builder()
        .provider(GeminiConfig::from_env()?)
        .build()?;

    let history = [
        Message::system("You are a writing assistant inside a text editor."),
        Message::user("Suggest a title for a note about sourdough starters."),
    ];
    let mut spawned = generator.start(&history)?.spawn();

    while let Some(update) = spawned.next_update().await {
        match update {
            StreamUpdate::Fragment(text) => {
                print!("{text}");
                std::io::stdout().flush()?;
            }
            StreamUpdate::Completed(_) => println!(),
            StreamUpdate::Failed(err) if err.is_cancelled() => eprintln!("cancelled"),
            StreamUpdate::Failed(err) => eprintln!("generation failed: {err}"),
        }
    }
    Ok(())
}
