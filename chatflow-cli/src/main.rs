//! Console front-end: one line of input per turn, streamed reply on stdout.
//!
//! Reads model config from .env / environment (OPENAI_MODEL, OPENAI_API_KEY,
//! OPENAI_API_BASE); enables the web-search tool when TAVILY_API_KEY is set.
//! Exits on "quit", "exit" or "q".

use std::io::{BufRead, Write};
use std::sync::Arc;

use clap::Parser;

use chatflow::{
    ChatState, EventSink, LlmConfig, MemorySaver, Pipeline, StepEvent, ToolSource,
};

#[derive(Parser, Debug)]
#[command(name = "chatflow")]
#[command(about = "聊天机器人 — 输入消息对话，输入 quit/exit/q 退出")]
struct Args {
    /// Thread id for conversation memory within this process.
    #[arg(long, default_value = "default", value_name = "ID")]
    thread_id: String,

    /// Generate for a topic (refine + generate) instead of entering the chat loop.
    #[arg(short, long, value_name = "TEXT")]
    topic: Option<String>,

    /// Print only the final reply instead of streaming fragments.
    #[arg(long)]
    no_stream: bool,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn build_pipeline() -> Result<Pipeline, Box<dyn std::error::Error>> {
    let llm_config = LlmConfig::from_env();
    let mut llm = chatflow::ChatOpenAI::from_config(&llm_config);

    let search = std::env::var("TAVILY_API_KEY")
        .ok()
        .map(chatflow::TavilySearch::new);
    let pipeline = match search {
        Some(search) => {
            let specs = search.list_tools().await.map_err(|e| e.to_string())?;
            llm = llm.with_tools(specs);
            Pipeline::new(Box::new(llm)).with_tools(Box::new(search))
        }
        None => Pipeline::new(Box::new(llm)),
    };
    Ok(pipeline.with_checkpointer(Arc::new(MemorySaver::new())))
}

/// Drains content events to stdout, flushing per fragment for the typing effect.
fn spawn_printer(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<StepEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            if let StepEvent::Content { text } = ev {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
        }
    })
}

/// Runs one turn, printing fragments as they arrive. Returns false when the
/// turn failed (the error is printed and the loop continues).
async fn stream_turn(pipeline: &Pipeline, thread_id: &str, input: &str) -> bool {
    let (sink, rx) = EventSink::channel();
    let printer = spawn_printer(rx);

    let result = pipeline.run_thread_streaming(thread_id, input, &sink).await;
    drop(sink);
    let _ = printer.await;
    println!();

    match result {
        Ok(_) => true,
        Err(e) => {
            eprintln!("error: {}", e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv::dotenv();
    init_tracing();
    let args = Args::parse();

    let pipeline = build_pipeline().await?;

    if let Some(topic) = args.topic {
        // Topic mode: one refine + generate run, then exit.
        if args.no_stream {
            let state = pipeline.run(ChatState::from_topic(topic)).await?;
            println!("{}", state.last_assistant().unwrap_or_default());
        } else {
            let (sink, rx) = EventSink::channel();
            let printer = spawn_printer(rx);
            let result = pipeline
                .run_streaming(ChatState::from_topic(topic), &sink)
                .await;
            drop(sink);
            let _ = printer.await;
            println!();
            result?;
        }
        return Ok(());
    }

    println!("欢迎使用聊天机器人！输入 'quit'、'exit' 或 'q' 退出。");
    let stdin = std::io::stdin();
    loop {
        print!("User: ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if ["quit", "exit", "q"].contains(&input.to_lowercase().as_str()) {
            println!("再见！");
            break;
        }

        if args.no_stream {
            match pipeline.run_thread(&args.thread_id, input).await {
                Ok(state) => println!("Assistant: {}", state.last_assistant().unwrap_or_default()),
                Err(e) => eprintln!("error: {}", e),
            }
        } else {
            print!("Assistant: ");
            let _ = std::io::stdout().flush();
            stream_turn(&pipeline, &args.thread_id, input).await;
        }
    }

    Ok(())
}
