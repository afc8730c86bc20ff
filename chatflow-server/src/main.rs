//! HTTP server exposing the streaming pipeline over two GET endpoints.
//!
//! - `GET /joke?topic=` streams the generated text as plain fragments.
//! - `GET /joke/events?topic=` streams JSON step events over SSE.
//!
//! Configure via env: OPENAI_MODEL, OPENAI_API_KEY, OPENAI_API_BASE,
//! optional TAVILY_API_KEY for the search tool, LISTEN for the bind address.
//! Load .env with dotenv.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use chatflow::{ChatState, EventSink, LlmConfig, Pipeline, StepEvent, ToolSource};
use futures::stream::Stream;
use serde::Deserialize;
use tokio_stream::{wrappers::UnboundedReceiverStream, StreamExt};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span};

/// Topic used when the query string does not provide one.
const DEFAULT_TOPIC: &str = "兔子";

/// Pause between delivered units so browsers show a typing effect.
/// Presentation pacing only; correctness never depends on it.
const TYPEWRITER_PACE: Duration = Duration::from_millis(30);

/// Shared state for all routes: one pipeline handle, cloned per request.
struct AppState {
    pipeline: Arc<Pipeline>,
}

#[derive(Debug, Deserialize)]
struct TopicQuery {
    topic: Option<String>,
}

/// Load .env from current directory; if not found, try parent (workspace root
/// when run from the crate dir).
fn load_dotenv() {
    if dotenv::dotenv().is_ok() {
        return;
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(parent) = cwd.parent() {
            let env_path = parent.join(".env");
            if env_path.is_file() {
                let _ = dotenv::from_path(env_path);
            }
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,chatflow_server=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    load_dotenv();
    init_tracing();

    let llm_config = LlmConfig::from_env();
    info!(
        model = %llm_config.model,
        base_url = ?llm_config.api_base,
        "LLM config loaded"
    );

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

    let state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
    });
    let app = app(state);

    let listen = std::env::var("LISTEN").unwrap_or_else(|_| "0.0.0.0:8123".to_string());
    info!("listening on http://{}", listen);
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/joke", get(joke_text))
        .route("/joke/events", get(joke_events))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<Body>| {
                info_span!("request", method = %req.method(), uri = %req.uri())
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Spawns one independent pipeline execution for this request and returns
/// the receiving end of its event stream. Requests are not correlated; a
/// dropped receiver (client disconnect) silently stops delivery.
fn spawn_run(state: &AppState, topic: String) -> UnboundedReceiverStream<StepEvent> {
    let (sink, rx) = EventSink::channel();
    let pipeline = Arc::clone(&state.pipeline);
    tokio::spawn(async move {
        if let Err(e) = pipeline
            .run_streaming(ChatState::from_topic(topic), &sink)
            .await
        {
            tracing::error!("stream error: {}", e);
        }
    });
    UnboundedReceiverStream::new(rx)
}

/// Streams the generated text as successive plain-text fragments.
async fn joke_text(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopicQuery>,
) -> Response {
    let topic = query.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string());
    tracing::debug!(topic = %topic, "plain-text stream");

    let events = spawn_run(&state, topic);
    let body_stream = events
        .filter_map(|ev| match ev {
            StepEvent::Content { text } => Some(text),
            _ => None,
        })
        .then(|text| async move {
            tokio::time::sleep(TYPEWRITER_PACE).await;
            Ok::<_, Infallible>(Bytes::from(text))
        });

    let mut res = Body::from_stream(body_stream).into_response();
    res.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res
}

/// Streams every step event as one JSON-encoded SSE data line.
async fn joke_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopicQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let topic = query.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string());
    tracing::debug!(topic = %topic, "SSE stream");

    let events = spawn_run(&state, topic).then(|ev| async move {
        tokio::time::sleep(TYPEWRITER_PACE).await;
        let data = serde_json::to_string(&ev).unwrap_or_else(|e| {
            format!(r#"{{"kind":"error","message":"encode failed: {}"}}"#, e)
        });
        Ok(Event::default().data(data))
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use chatflow::{MockLlm, MockTurn};
    use tower::ServiceExt;

    fn mock_app(llm: MockLlm) -> Router {
        let state = Arc::new(AppState {
            pipeline: Arc::new(Pipeline::new(Box::new(llm))),
        });
        app(state)
    }

    async fn body_string(res: Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    /// **Scenario**: GET /joke streams the fragments as a plain-text body in order.
    #[tokio::test]
    async fn joke_text_streams_fragments() {
        let app = mock_app(MockLlm::with_fragments(&["你", "好"]));
        let res = app
            .oneshot(
                Request::get("/joke?topic=%E5%85%94%E5%AD%90")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()["content-type"],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_string(res).await, "你好");
    }

    /// **Scenario**: GET /joke without a topic query uses the fixed default seed.
    #[tokio::test]
    async fn joke_text_defaults_topic() {
        let app = mock_app(MockLlm::with_fragments(&["ok"]));
        let res = app
            .oneshot(Request::get("/joke").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_string(res).await, "ok");
    }

    /// **Scenario**: GET /joke/events returns text/event-stream with one JSON
    /// step event per data line: refine pair, generate start, contents in
    /// order, exactly one generate complete.
    #[tokio::test]
    async fn joke_events_emits_step_protocol() {
        let app = mock_app(MockLlm::with_fragments(&["你", "好"]));
        let res = app
            .oneshot(
                Request::get("/joke/events?topic=%E5%85%94%E5%AD%90")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let body = body_string(res).await;
        let payloads: Vec<StepEvent> = body
            .lines()
            .filter_map(|l| l.strip_prefix("data: "))
            .filter_map(|data| serde_json::from_str(data).ok())
            .collect();

        assert!(
            payloads.contains(&StepEvent::step_with_result(
                chatflow::Stage::Refine,
                chatflow::StepStatus::Complete,
                "兔子 和猫"
            )),
            "{}",
            body
        );
        let contents: Vec<_> = payloads
            .iter()
            .filter_map(|e| match e {
                StepEvent::Content { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(contents, vec!["你", "好"]);
        let completes = payloads
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    StepEvent::Step {
                        stage: chatflow::Stage::Generate,
                        status: chatflow::StepStatus::Complete,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(completes, 1);
    }

    /// **Scenario**: a model failure mid-stream surfaces as one error event
    /// followed by the mandatory generate-complete event.
    #[tokio::test]
    async fn joke_events_error_path_still_completes() {
        let app = mock_app(MockLlm::new(vec![MockTurn::default()
            .with_fragments(&["半"])
            .with_error("backend down")]));
        let res = app
            .oneshot(Request::get("/joke/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_string(res).await;
        let payloads: Vec<StepEvent> = body
            .lines()
            .filter_map(|l| l.strip_prefix("data: "))
            .filter_map(|data| serde_json::from_str(data).ok())
            .collect();

        let error_pos = payloads
            .iter()
            .position(|e| matches!(e, StepEvent::Error { .. }))
            .expect("error event present");
        let complete_pos = payloads
            .iter()
            .position(|e| {
                matches!(
                    e,
                    StepEvent::Step {
                        stage: chatflow::Stage::Generate,
                        status: chatflow::StepStatus::Complete,
                        ..
                    }
                )
            })
            .expect("complete event present");
        assert!(error_pos < complete_pos);
    }
}
