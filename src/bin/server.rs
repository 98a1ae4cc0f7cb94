#![forbid(unsafe_code)]

//! Board server: HTTP routes over the subtitle catalog.
//!
//! Every route is a stateless request → rendered-page mapping. Ingestion and
//! search shell out to yt-dlp through the library clients; store failures in
//! the browse routes degrade to an empty view or a redirect instead of an
//! error status.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result, anyhow, bail};
use axum::{
    Router,
    extract::{Form, Path as AxumPath, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use leetsub::{
    catalog::{CatalogHandle, ProblemCatalog, search_query},
    config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config},
    ingest::{IngestRequest, ingest},
    pagination::paginate,
    store::{SubtitleRecord, SubtitleStore},
    youtube::{SearchClient, SubtitleExtractor, VideoHit, YtDlpRunner},
};
use nix::unistd::Uid;
use serde::Deserialize;
use tera::{Context as TemplateContext, Tera};
use tokio::signal;
use tracing::{error, info, warn};

/// Records shown per board page.
const PER_PAGE: usize = 10;
/// Tally cells per row on the count page.
const COUNT_CHUNK: usize = 25;
/// Candidate videos requested per search.
const SEARCH_MAX_RESULTS: usize = 100;

const DB_FILE: &str = "subtitles.db";

#[derive(Clone)]
struct AppState {
    store: SubtitleStore,
    search: SearchClient,
    extractor: SubtitleExtractor,
    catalog: Arc<CatalogHandle>,
    templates: Arc<Tera>,
    problem_count: i64,
}

fn parse_overrides<I>(iter: I) -> Result<RuntimeOverrides>
where
    I: IntoIterator<Item = String>,
{
    let mut overrides = RuntimeOverrides::default();
    let mut args = iter.into_iter();
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--data-root=") {
            overrides.data_root = Some(PathBuf::from(value));
            continue;
        }
        if let Some(value) = arg.strip_prefix("--vtt-dir=") {
            overrides.vtt_directory = Some(PathBuf::from(value));
            continue;
        }
        if let Some(value) = arg.strip_prefix("--port=") {
            overrides.port = Some(parse_port_arg(value)?);
            continue;
        }
        if let Some(value) = arg.strip_prefix("--host=") {
            overrides.host = Some(value.to_string());
            continue;
        }

        match arg.as_str() {
            "--data-root" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--data-root requires a value"))?;
                overrides.data_root = Some(PathBuf::from(value));
            }
            "--vtt-dir" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--vtt-dir requires a value"))?;
                overrides.vtt_directory = Some(PathBuf::from(value));
            }
            "--port" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--port requires a value"))?;
                overrides.port = Some(parse_port_arg(&value)?);
            }
            "--host" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--host requires a value"))?;
                overrides.host = Some(value);
            }
            _ => return Err(anyhow!("unknown argument: {arg}")),
        }
    }
    Ok(overrides)
}

fn parse_port_arg(value: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .context("expected a numeric port between 0 and 65535")
}

/// Fails fast when the server is started as root. Running as a regular
/// unprivileged user keeps local installs predictable and avoids accidental
/// writes into system directories.
fn ensure_not_root(process: &str) -> Result<()> {
    ensure_not_root_for(Uid::current(), process)
}

fn ensure_not_root_for(uid: Uid, process: &str) -> Result<()> {
    if uid.is_root() {
        bail!(
            "{process} must not be run as root; use a regular user or a dedicated service account"
        );
    }
    Ok(())
}

fn build_templates() -> Result<Tera> {
    let mut tera = Tera::default();
    for (name, content) in [
        ("base.html", include_str!("templates/base.html")),
        ("index.html", include_str!("templates/index.html")),
        ("automation.html", include_str!("templates/automation.html")),
        (
            "automation_search_result.html",
            include_str!("templates/automation_search_result.html"),
        ),
        (
            "automation_add_result.html",
            include_str!("templates/automation_add_result.html"),
        ),
        ("post.html", include_str!("templates/post.html")),
        ("count.html", include_str!("templates/count.html")),
        ("board.html", include_str!("templates/board.html")),
    ] {
        tera.add_raw_template(name, content)
            .with_context(|| format!("registering template {name}"))?;
    }
    Ok(tera)
}

fn render(state: &AppState, name: &str, context: &TemplateContext) -> Response {
    match state.templates.render(name, context) {
        Ok(body) => Html(body).into_response(),
        Err(err) => {
            error!("failed to render {name}: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let overrides = parse_overrides(std::env::args().skip(1))?;
    let config = resolve_runtime_config(overrides)?;

    ensure_not_root("leetsub server")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    run(config).await
}

async fn run(config: RuntimeConfig) -> Result<()> {
    // Debug mode keeps subtitle artifacts off the local filesystem entirely.
    if !config.debug {
        std::fs::create_dir_all(&config.vtt_directory).with_context(|| {
            format!("creating vtt directory {}", config.vtt_directory.display())
        })?;
    }

    let runner = match &config.ytdlp_bin {
        Some(path) => YtDlpRunner::with_program(path.clone()),
        None => YtDlpRunner::from_env(),
    };
    if let Err(err) = runner.ensure_available() {
        warn!("yt-dlp unavailable, search and ingestion will fail: {err:#}");
    }

    let store = SubtitleStore::open(&config.data_root.join(DB_FILE))
        .await
        .context("initializing subtitle store")?;

    let state = AppState {
        store,
        search: SearchClient::new(runner.clone()),
        extractor: SubtitleExtractor::new(
            runner,
            config.vtt_directory.clone(),
            !config.debug,
        ),
        catalog: Arc::new(CatalogHandle::from_config(
            config.problem_set_file.clone(),
            config.problem_set_url.clone(),
        )),
        templates: Arc::new(build_templates()?),
        problem_count: config.problem_count,
    };

    let app = router(state);

    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("parsing listen host {:?}", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!("board server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running board server")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_form).post(index_submit))
        .route("/automation", get(automation_page))
        .route("/yt-dlp-search", post(yt_dlp_search))
        .route("/add_one", post(add_one))
        .route("/update_post/{video_id}", post(update_post))
        .route("/delete_post/{video_id}", post(delete_post))
        .route("/post/{video_id}", get(post_detail))
        .route("/count", get(count_page))
        .route("/board", get(board))
        .with_state(state)
}

async fn shutdown_signal() {
    // Graceful shutdown is best effort; the process still terminates when
    // Ctrl+C fires even if installing the handler failed.
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to install Ctrl+C handler: {err}");
    }
}

// ---------------------------------------------------------------------------
// Intake routes

#[derive(Deserialize)]
struct IndexForm {
    youtube_url: Option<String>,
    leetcode_number: Option<String>,
}

async fn index_form(State(state): State<AppState>) -> Response {
    render_index(&state, None, None)
}

async fn index_submit(State(state): State<AppState>, Form(form): Form<IndexForm>) -> Response {
    let Some(youtube_url) = form.youtube_url.filter(|url| !url.trim().is_empty()) else {
        return render_index(&state, None, Some("No YouTube url provided.".into()));
    };
    let Some(number) = form.leetcode_number.filter(|value| !value.trim().is_empty()) else {
        return render_index(&state, None, Some("No leetcode number provided.".into()));
    };

    let outcome = match IngestRequest::from_url(&youtube_url, &number) {
        Ok(request) => {
            ingest(&state.store, &state.extractor, request, state.problem_count).await
        }
        Err(err) => Err(err),
    };

    match outcome {
        Ok(record) => {
            info!(
                "ingested video {} for problem {}",
                record.video_id, record.leetcode_number
            );
            render_index(
                &state,
                Some(format!(
                    "Stored subtitles for video {} (problem {}).",
                    record.video_id, record.leetcode_number
                )),
                None,
            )
        }
        Err(err) => {
            warn!("ingestion via url failed: {err}");
            render_index(&state, None, Some(err.to_string()))
        }
    }
}

fn render_index(
    state: &AppState,
    success_message: Option<String>,
    error_message: Option<String>,
) -> Response {
    let mut context = TemplateContext::new();
    context.insert("success_message", &success_message);
    context.insert("error_message", &error_message);
    render(state, "index.html", &context)
}

// ---------------------------------------------------------------------------
// Search routes

async fn automation_page(State(state): State<AppState>) -> Response {
    render(&state, "automation.html", &TemplateContext::new())
}

#[derive(Deserialize)]
struct SearchForm {
    leetcode_number: Option<String>,
}

async fn yt_dlp_search(State(state): State<AppState>, Form(form): Form<SearchForm>) -> Response {
    let raw = form.leetcode_number.unwrap_or_default();
    let number = match raw.trim().parse::<i64>() {
        Ok(number) if (1..=state.problem_count).contains(&number) => number,
        _ => {
            return render_search_results(
                &state,
                String::new(),
                0,
                None,
                Vec::new(),
                Some(format!("{raw:?} is not a known problem number.")),
            );
        }
    };

    let catalog = load_catalog(&state).await;
    let title = catalog.title(number).map(str::to_owned);
    let query = search_query(number);

    let search = state.search.clone();
    let keyword = query.clone();
    let outcome =
        tokio::task::spawn_blocking(move || search.search_bulk(&keyword, SEARCH_MAX_RESULTS))
            .await;

    match outcome {
        Ok(Ok(videos)) => {
            info!("search for {query:?} returned {} videos", videos.len());
            render_search_results(&state, query, number, title, videos, None)
        }
        Ok(Err(err)) => {
            warn!("video search for {query:?} failed: {err:#}");
            render_search_results(
                &state,
                query,
                number,
                title,
                Vec::new(),
                Some("Video search failed; try again later.".into()),
            )
        }
        Err(err) => {
            error!("search task for {query:?} panicked: {err}");
            render_search_results(
                &state,
                query,
                number,
                title,
                Vec::new(),
                Some("Video search failed; try again later.".into()),
            )
        }
    }
}

async fn load_catalog(state: &AppState) -> Arc<ProblemCatalog> {
    let handle = state.catalog.clone();
    match tokio::task::spawn_blocking(move || handle.get_or_load()).await {
        Ok(catalog) => catalog,
        Err(err) => {
            error!("catalog load task panicked: {err}");
            Arc::new(ProblemCatalog::default())
        }
    }
}

fn render_search_results(
    state: &AppState,
    query: String,
    leetcode_number: i64,
    title: Option<String>,
    videos: Vec<VideoHit>,
    error_message: Option<String>,
) -> Response {
    let mut context = TemplateContext::new();
    context.insert("query", &query);
    context.insert("leetcode_number", &leetcode_number);
    context.insert("title", &title);
    context.insert("videos", &videos);
    context.insert("error_message", &error_message);
    render(state, "automation_search_result.html", &context)
}

// ---------------------------------------------------------------------------
// Ingestion route (search-result flow)

#[derive(Deserialize)]
struct AddForm {
    video_id: Option<String>,
    leetcode_number: Option<String>,
}

async fn add_one(State(state): State<AppState>, Form(form): Form<AddForm>) -> Response {
    let Some(video_id) = form.video_id.filter(|id| !id.trim().is_empty()) else {
        return render_add_result(&state, None, None, Some("No video id provided.".into()));
    };
    let Some(number) = form.leetcode_number.filter(|value| !value.trim().is_empty()) else {
        return render_add_result(
            &state,
            None,
            None,
            Some("No leetcode number provided.".into()),
        );
    };

    let request = IngestRequest::from_video_id(&video_id, &number);
    match ingest(&state.store, &state.extractor, request, state.problem_count).await {
        Ok(record) => {
            info!(
                "ingested video {} for problem {}",
                record.video_id, record.leetcode_number
            );
            render_add_result(
                &state,
                Some(record.video_id.clone()),
                Some(format!(
                    "Stored subtitles for video {} (problem {}).",
                    record.video_id, record.leetcode_number
                )),
                None,
            )
        }
        Err(err) => {
            warn!("ingestion of {video_id} failed: {err}");
            render_add_result(&state, None, None, Some(err.to_string()))
        }
    }
}

fn render_add_result(
    state: &AppState,
    video_id: Option<String>,
    success_message: Option<String>,
    error_message: Option<String>,
) -> Response {
    let mut context = TemplateContext::new();
    context.insert("video_id", &video_id);
    context.insert("success_message", &success_message);
    context.insert("error_message", &error_message);
    render(state, "automation_add_result.html", &context)
}

// ---------------------------------------------------------------------------
// Record routes

#[derive(Deserialize)]
struct UpdateForm {
    content: Option<String>,
}

async fn update_post(
    State(state): State<AppState>,
    AxumPath(video_id): AxumPath<String>,
    Form(form): Form<UpdateForm>,
) -> Response {
    let content = form.content.unwrap_or_default();
    match state.store.update_content(&video_id, &content).await {
        Ok(()) => Redirect::to(&format!("/post/{video_id}")).into_response(),
        Err(err) => {
            warn!("failed to update record {video_id}: {err:#}");
            Redirect::to("/board").into_response()
        }
    }
}

async fn delete_post(
    State(state): State<AppState>,
    AxumPath(video_id): AxumPath<String>,
) -> Response {
    if let Err(err) = state.store.delete(&video_id).await {
        warn!("failed to delete record {video_id}: {err:#}");
    }
    Redirect::to("/board").into_response()
}

async fn post_detail(
    State(state): State<AppState>,
    AxumPath(video_id): AxumPath<String>,
) -> Response {
    let post = match state.store.get(&video_id).await {
        Ok(post) => post,
        Err(err) => {
            error!("failed to fetch record {video_id}: {err:#}");
            None
        }
    };

    let mut context = TemplateContext::new();
    context.insert("post", &post);
    render(&state, "post.html", &context)
}

// ---------------------------------------------------------------------------
// Aggregation routes

async fn count_page(State(state): State<AppState>) -> Response {
    let counts_chunks = match state.store.scan_all().await {
        Ok(records) => {
            let tally = tally_counts(&records, state.problem_count);
            info!(
                "tallied {} records across {} problem numbers",
                records.len(),
                state.problem_count
            );
            chunk_counts(&tally, COUNT_CHUNK)
        }
        Err(err) => {
            error!("failed to scan records for the tally: {err:#}");
            Vec::new()
        }
    };

    let mut context = TemplateContext::new();
    context.insert("counts_chunks", &counts_chunks);
    context.insert("chunk_size", &COUNT_CHUNK);
    render(&state, "count.html", &context)
}

/// Occurrences per problem number over the full 1..=bound range.
/// Out-of-range numbers are logged and skipped.
fn tally_counts(records: &[SubtitleRecord], problem_count: i64) -> Vec<u64> {
    let mut tally = vec![0u64; problem_count.max(0) as usize];
    for record in records {
        let number = record.leetcode_number;
        if (1..=problem_count).contains(&number) {
            tally[(number - 1) as usize] += 1;
        } else {
            warn!(
                "record {} has out-of-range problem number {}",
                record.video_id, number
            );
        }
    }
    tally
}

fn chunk_counts(tally: &[u64], chunk_size: usize) -> Vec<Vec<u64>> {
    tally
        .chunks(chunk_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

#[derive(Deserialize)]
struct BoardQuery {
    q: Option<String>,
    search_field: Option<String>,
    page: Option<String>,
}

async fn board(State(state): State<AppState>, Query(query): Query<BoardQuery>) -> Response {
    let q = query.q.filter(|value| !value.trim().is_empty());
    let search_field = query.search_field.filter(|value| !value.trim().is_empty());
    let mut message: Option<String> = None;

    let posts = match (&q, &search_field) {
        (Some(q), Some(field)) if field.as_str() == "leetcode_number" => {
            match q.trim().parse::<i64>() {
                Ok(number) => state.store.query_by_number(number).await.unwrap_or_else(|err| {
                    error!("board search for number {number} failed: {err:#}");
                    Vec::new()
                }),
                Err(_) => {
                    warn!("board search with non-numeric query {q:?}");
                    Vec::new()
                }
            }
        }
        (Some(_), Some(field)) => {
            message = Some(format!(
                "Choose a valid search field (leetcode_number), not {field:?}."
            ));
            Vec::new()
        }
        _ => state.store.scan_all().await.unwrap_or_else(|err| {
            error!("failed to scan records for the board: {err:#}");
            Vec::new()
        }),
    };

    let page_number = query
        .page
        .as_deref()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(1);
    let page = paginate(posts, page_number, PER_PAGE);

    let mut context = TemplateContext::new();
    context.insert("posts", &page.items);
    context.insert("page", &page.page);
    context.insert("prev_page", &page.prev_page);
    context.insert("next_page", &page.next_page);
    context.insert("total_pages", &page.total_pages);
    context.insert("search_query", &q.unwrap_or_default());
    context.insert("search_field", &search_field.unwrap_or_default());
    context.insert("message", &message);
    render(&state, "board.html", &context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header;
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    struct TestContext {
        _temp: TempDir,
        state: AppState,
    }

    fn install_ytdlp_stub(dir: &Path) -> PathBuf {
        let script_path = dir.join("yt-dlp");
        let script = r#"#!/usr/bin/env bash
set -eu
args=("$@")
output=""
while [[ $# -gt 0 ]]; do
  case "$1" in
    --output)
      shift
      output="$1"
      ;;
  esac
  shift
done

if printf '%s\n' "${args[@]}" | grep -q -- '--flat-playlist'; then
  cat <<'JSON'
{"entries":[
  {"id":"alpha","title":"Two Sum in 10 minutes","url":"https://www.youtube.com/watch?v=alpha","channel":"AlgoChannel","duration":600.0},
  {"id":"beta","title":"Two Sum explained","duration":432.0}
]}
JSON
  exit 0
fi

if printf '%s\n' "${args[@]}" | grep -q -- '--write-sub'; then
  mkdir -p "$(dirname "$output")"
  cat <<'VTT' > "${output}.en.vtt"
WEBVTT

00:00:00.000 --> 00:00:01.000
Hello world

00:00:01.000 --> 00:00:02.000
let's solve two sum
VTT
  cat <<'JSON' > "${output}.info.json"
{"fulltitle":"Two Sum in 10 minutes"}
JSON
  exit 0
fi

exit 0
"#;
        fs::write(&script_path, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&script_path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&script_path, perms).unwrap();
        }
        script_path
    }

    impl TestContext {
        async fn new() -> Self {
            let temp = tempdir().unwrap();
            let store = SubtitleStore::open(&temp.path().join("subtitles.db"))
                .await
                .unwrap();
            let stub = install_ytdlp_stub(temp.path());
            let runner = YtDlpRunner::with_program(stub);

            let problems = temp.path().join("problems.json");
            fs::write(
                &problems,
                r#"[{"number": 1, "title": "Two Sum"}, {"number": 5, "title": "Longest Palindromic Substring"}]"#,
            )
            .unwrap();

            let state = AppState {
                store,
                search: SearchClient::new(runner.clone()),
                extractor: SubtitleExtractor::new(runner, temp.path().join("vtt"), true),
                catalog: Arc::new(CatalogHandle::from_config(Some(problems), None)),
                templates: Arc::new(build_templates().unwrap()),
                problem_count: 2000,
            };

            Self { _temp: temp, state }
        }

        async fn seed_record(&self, id: &str, number: i64) {
            self.state
                .store
                .put(&SubtitleRecord::new(
                    id,
                    number,
                    format!("Video {id}"),
                    format!("https://youtu.be/{id}"),
                    "seeded content",
                ))
                .await
                .unwrap();
        }
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn parse_overrides_accepts_both_flag_forms() {
        let overrides = parse_overrides(
            ["--data-root=/data", "--port", "8000", "--host=0.0.0.0"]
                .iter()
                .map(|value| value.to_string()),
        )
        .unwrap();
        assert_eq!(overrides.data_root, Some(PathBuf::from("/data")));
        assert_eq!(overrides.port, Some(8000));
        assert_eq!(overrides.host, Some("0.0.0.0".to_string()));
        assert!(overrides.vtt_directory.is_none());
    }

    #[test]
    fn parse_overrides_rejects_unknown_flags() {
        let err =
            parse_overrides(["--bogus".to_string()]).unwrap_err();
        assert!(err.to_string().contains("unknown argument"));
    }

    #[test]
    fn ensure_not_root_allows_unprivileged_uid() {
        assert!(ensure_not_root_for(Uid::from_raw(1000), "tester").is_ok());
    }

    #[test]
    fn ensure_not_root_rejects_root_uid() {
        let err = ensure_not_root_for(Uid::from_raw(0), "tester").unwrap_err();
        assert!(err.to_string().contains("must not be run as root"));
    }

    #[test]
    fn tally_counts_counts_per_number() {
        let records = [
            SubtitleRecord::new("a", 1, "", "", ""),
            SubtitleRecord::new("b", 1, "", "", ""),
            SubtitleRecord::new("c", 2, "", "", ""),
            SubtitleRecord::new("d", 9999, "", "", ""),
        ];
        let tally = tally_counts(&records, 2000);
        assert_eq!(tally.len(), 2000);
        assert_eq!(tally[0], 2);
        assert_eq!(tally[1], 1);
        assert!(tally[2..].iter().all(|count| *count == 0));
    }

    #[test]
    fn chunk_counts_produces_fixed_size_groups() {
        let tally: Vec<u64> = (0..60).collect();
        let chunks = chunk_counts(&tally, 25);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 25);
        assert_eq!(chunks[2].len(), 10);
    }

    #[tokio::test]
    async fn intake_forms_render() {
        let ctx = TestContext::new().await;

        let response = index_form(State(ctx.state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Ingest a video by URL"));

        let response = automation_page(State(ctx.state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("/yt-dlp-search"), "{body}");
    }

    /// Ingesting via the search-result flow and fetching the detail page
    /// round-trips the record.
    #[tokio::test]
    async fn add_one_then_detail_roundtrip() {
        let ctx = TestContext::new().await;

        let response = add_one(
            State(ctx.state.clone()),
            Form(AddForm {
                video_id: Some("alpha".into()),
                leetcode_number: Some("1".into()),
            }),
        )
        .await;
        let body = body_string(response).await;
        assert!(body.contains("Stored subtitles for video alpha"), "{body}");

        let response =
            post_detail(State(ctx.state.clone()), AxumPath("alpha".into())).await;
        let body = body_string(response).await;
        assert!(body.contains("Two Sum in 10 minutes"), "{body}");
        assert!(body.contains("Hello world"), "{body}");
    }

    #[tokio::test]
    async fn add_one_twice_reports_duplicate() {
        let ctx = TestContext::new().await;

        for _ in 0..2 {
            let response = add_one(
                State(ctx.state.clone()),
                Form(AddForm {
                    video_id: Some("alpha".into()),
                    leetcode_number: Some("1".into()),
                }),
            )
            .await;
            // Both attempts render a page; only the second carries the error.
            let body = body_string(response).await;
            assert!(body.contains("Ingestion result"), "{body}");
        }

        let records = ctx.state.store.scan_all().await.unwrap();
        assert_eq!(records.len(), 1);

        let response = add_one(
            State(ctx.state.clone()),
            Form(AddForm {
                video_id: Some("alpha".into()),
                leetcode_number: Some("1".into()),
            }),
        )
        .await;
        let body = body_string(response).await;
        assert!(body.contains("already ingested"), "{body}");
    }

    #[tokio::test]
    async fn add_one_requires_both_fields() {
        let ctx = TestContext::new().await;

        let response = add_one(
            State(ctx.state.clone()),
            Form(AddForm {
                video_id: None,
                leetcode_number: Some("1".into()),
            }),
        )
        .await;
        assert!(body_string(response).await.contains("No video id provided."));

        let response = add_one(
            State(ctx.state.clone()),
            Form(AddForm {
                video_id: Some("alpha".into()),
                leetcode_number: None,
            }),
        )
        .await;
        assert!(
            body_string(response)
                .await
                .contains("No leetcode number provided.")
        );
    }

    #[tokio::test]
    async fn index_submit_rejects_foreign_urls() {
        let ctx = TestContext::new().await;
        let response = index_submit(
            State(ctx.state.clone()),
            Form(IndexForm {
                youtube_url: Some("https://vimeo.com/123".into()),
                leetcode_number: Some("1".into()),
            }),
        )
        .await;
        let body = body_string(response).await;
        assert!(body.contains("invalid input"), "{body}");
    }

    #[tokio::test]
    async fn index_submit_ingests_from_url() {
        let ctx = TestContext::new().await;
        let response = index_submit(
            State(ctx.state.clone()),
            Form(IndexForm {
                youtube_url: Some("https://youtu.be/dQw4w9WgXcQ".into()),
                leetcode_number: Some("5".into()),
            }),
        )
        .await;
        let body = body_string(response).await;
        assert!(body.contains("Stored subtitles"), "{body}");

        let record = ctx.state.store.get("dQw4w9WgXcQ").await.unwrap().unwrap();
        assert_eq!(record.leetcode_number, 5);
        assert_eq!(record.url, "https://youtu.be/dQw4w9WgXcQ");
    }

    #[tokio::test]
    async fn update_post_redirects_to_detail_and_persists() {
        let ctx = TestContext::new().await;
        ctx.seed_record("alpha", 1).await;

        let response = update_post(
            State(ctx.state.clone()),
            AxumPath("alpha".into()),
            Form(UpdateForm {
                content: Some("corrected transcript".into()),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/post/alpha");

        let record = ctx.state.store.get("alpha").await.unwrap().unwrap();
        assert_eq!(record.content, "corrected transcript");
    }

    #[tokio::test]
    async fn delete_post_redirects_even_for_missing_records() {
        let ctx = TestContext::new().await;
        ctx.seed_record("alpha", 1).await;

        let response =
            delete_post(State(ctx.state.clone()), AxumPath("alpha".into())).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/board");
        assert!(ctx.state.store.get("alpha").await.unwrap().is_none());

        let response =
            delete_post(State(ctx.state.clone()), AxumPath("ghost".into())).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/board");
    }

    #[tokio::test]
    async fn detail_of_missing_record_renders_empty_view() {
        let ctx = TestContext::new().await;
        let response =
            post_detail(State(ctx.state.clone()), AxumPath("ghost".into())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("No record found"), "{body}");
    }

    #[tokio::test]
    async fn board_filters_by_leetcode_number() {
        let ctx = TestContext::new().await;
        ctx.seed_record("five-a", 5).await;
        ctx.seed_record("five-b", 5).await;
        ctx.seed_record("seven-a", 7).await;

        let response = board(
            State(ctx.state.clone()),
            Query(BoardQuery {
                q: Some("5".into()),
                search_field: Some("leetcode_number".into()),
                page: None,
            }),
        )
        .await;
        let body = body_string(response).await;
        assert!(body.contains("five-a"), "{body}");
        assert!(body.contains("five-b"), "{body}");
        assert!(!body.contains("seven-a"), "{body}");
    }

    #[tokio::test]
    async fn board_rejects_unknown_search_field() {
        let ctx = TestContext::new().await;
        ctx.seed_record("alpha", 1).await;

        let response = board(
            State(ctx.state.clone()),
            Query(BoardQuery {
                q: Some("alpha".into()),
                search_field: Some("title".into()),
                page: None,
            }),
        )
        .await;
        let body = body_string(response).await;
        assert!(body.contains("Choose a valid search field"), "{body}");
        assert!(!body.contains("post-row"), "{body}");
    }

    #[tokio::test]
    async fn board_paginates_scan_results() {
        let ctx = TestContext::new().await;
        for i in 0..25 {
            ctx.seed_record(&format!("vid-{i:02}"), 1).await;
        }

        let response = board(
            State(ctx.state.clone()),
            Query(BoardQuery {
                q: None,
                search_field: None,
                page: None,
            }),
        )
        .await;
        let body = body_string(response).await;
        assert_eq!(body.matches("post-row").count(), 10, "{body}");
        assert!(body.contains("Page 1 of 3"), "{body}");
        assert!(body.contains("Next"), "{body}");
        assert!(!body.contains("Previous"), "{body}");

        let response = board(
            State(ctx.state.clone()),
            Query(BoardQuery {
                q: None,
                search_field: None,
                page: Some("3".into()),
            }),
        )
        .await;
        let body = body_string(response).await;
        assert_eq!(body.matches("post-row").count(), 5, "{body}");
        assert!(body.contains("Page 3 of 3"), "{body}");
        assert!(!body.contains("Next &raquo;"), "{body}");
    }

    #[tokio::test]
    async fn count_page_tallies_per_problem_number() {
        let ctx = TestContext::new().await;
        ctx.seed_record("a", 1).await;
        ctx.seed_record("b", 1).await;
        ctx.seed_record("c", 2).await;

        let response = count_page(State(ctx.state.clone())).await;
        let body = body_string(response).await;
        assert!(body.contains("1-25"), "{body}");
        assert!(body.contains(r#"<td class="hit">2</td>"#), "{body}");
        assert!(body.contains(r#"<td class="hit">1</td>"#), "{body}");
    }

    #[tokio::test]
    async fn search_page_lists_candidates_with_titles() {
        let ctx = TestContext::new().await;
        let response = yt_dlp_search(
            State(ctx.state.clone()),
            Form(SearchForm {
                leetcode_number: Some("1".into()),
            }),
        )
        .await;
        let body = body_string(response).await;
        assert!(body.contains("leetcode 1"), "{body}");
        assert!(body.contains("Problem 1: Two Sum"), "{body}");
        assert!(body.contains("Two Sum in 10 minutes"), "{body}");
        assert!(body.contains("Two Sum explained"), "{body}");
    }

    #[tokio::test]
    async fn search_page_rejects_out_of_range_numbers() {
        let ctx = TestContext::new().await;
        for raw in ["", "abc", "0", "2001"] {
            let response = yt_dlp_search(
                State(ctx.state.clone()),
                Form(SearchForm {
                    leetcode_number: Some(raw.into()),
                }),
            )
            .await;
            let body = body_string(response).await;
            assert!(body.contains("not a known problem number"), "{raw}: {body}");
        }
    }
}
