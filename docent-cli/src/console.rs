//! Interactive chat console.

use std::io::Write;

use docent_chat::{Answer, ChatSession};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// A slash command typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    Reset,
    History,
    Sources,
    Help,
    Exit,
    Unknown(&'a str),
}

impl<'a> ConsoleCommand<'a> {
    /// Parse `input` as a command; `None` means it is a question.
    pub fn parse(input: &'a str) -> Option<Self> {
        let command = input.trim().strip_prefix('/')?;
        Some(match command {
            "reset" | "clear" => Self::Reset,
            "history" => Self::History,
            "sources" => Self::Sources,
            "help" | "?" => Self::Help,
            "exit" | "quit" => Self::Exit,
            other => Self::Unknown(other),
        })
    }
}

const HELP: &str = "Commands: /reset clears the conversation, /history shows it, \
/sources toggles source listing, /exit quits.";

/// Run a read-eval-print loop over `session` until `/exit`, Ctrl-C or Ctrl-D.
///
/// A failed question prints the error and leaves the conversation as it was.
pub async fn run_console(
    session: &mut ChatSession,
    stream: bool,
    mut show_sources: bool,
) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Ask a question about the corpus. {HELP}");

    loop {
        let line = match editor.readline("you > ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        match ConsoleCommand::parse(input) {
            Some(ConsoleCommand::Exit) => break,
            Some(ConsoleCommand::Reset) => {
                session.reset();
                println!("Conversation cleared.");
            }
            Some(ConsoleCommand::History) => print_history(session),
            Some(ConsoleCommand::Sources) => {
                show_sources = !show_sources;
                println!("Source listing {}.", if show_sources { "on" } else { "off" });
            }
            Some(ConsoleCommand::Help) => println!("{HELP}"),
            Some(ConsoleCommand::Unknown(other)) => println!("Unknown command /{other}. {HELP}"),
            None => match ask(session, input, stream).await {
                Ok(answer) if show_sources => print_sources(&answer),
                Ok(_) => {}
                Err(e) if e.is_retryable() => eprintln!("error: {e} (you can ask again)"),
                Err(e) => eprintln!("error: {e}"),
            },
        }
    }
    Ok(())
}

/// Answer one question, printing the answer to stdout.
pub async fn ask(
    session: &mut ChatSession,
    question: &str,
    stream: bool,
) -> docent_chat::Result<Answer> {
    if stream {
        print!("docent > ");
        let answer = session
            .answer_streaming(question, |text| {
                print!("{text}");
                let _ = std::io::stdout().flush();
            })
            .await;
        println!();
        answer
    } else {
        let answer = session.answer(question).await?;
        println!("docent > {}", answer.text);
        Ok(answer)
    }
}

/// List the chunks an answer was grounded on.
pub fn print_sources(answer: &Answer) {
    if answer.sources.is_empty() {
        println!("  (no sources)");
        return;
    }
    for (rank, source) in answer.sources.iter().enumerate() {
        let snippet: String = source.chunk.text.chars().take(80).collect();
        println!(
            "  [{}] {} ({:.3}): {}",
            rank + 1,
            source.chunk.document_id,
            source.score,
            snippet.replace('\n', " ")
        );
    }
}

fn print_history(session: &ChatSession) {
    if session.history().len() == 0 {
        println!("(no history)");
        return;
    }
    for (n, turn) in session.history().enumerate() {
        println!("{}. you > {}", n + 1, turn.question);
        println!("   docent > {}", turn.answer);
    }
}
