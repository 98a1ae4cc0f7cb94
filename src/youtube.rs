//! yt-dlp integration: bulk video search and subtitle extraction.
//!
//! Both clients shell out to yt-dlp and block until it returns; callers on
//! the async side wrap them in `spawn_blocking`. yt-dlp already implements
//! YouTube's moving-target logic, so nothing here scrapes HTML.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use url::Url;

/// Environment variable overriding the yt-dlp binary location.
pub const YTDLP_BIN_ENV: &str = "YTDLP_BIN";

/// Resolves and launches the yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlpRunner {
    program: PathBuf,
}

impl YtDlpRunner {
    /// Uses `YTDLP_BIN` when set, otherwise `yt-dlp` from PATH.
    pub fn from_env() -> Self {
        let program = std::env::var(YTDLP_BIN_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("yt-dlp"));
        Self { program }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.program)
    }

    /// Runs `yt-dlp --version` to fail loudly when the binary is missing.
    pub fn ensure_available(&self) -> Result<()> {
        let status = self
            .command()
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .with_context(|| format!("launching {}", self.program.display()))?;
        if !status.success() {
            bail!("{} --version exited with {}", self.program.display(), status);
        }
        Ok(())
    }
}

/// One search result row, in provider order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoHit {
    pub id: String,
    pub title: String,
    pub url: String,
    pub channel: Option<String>,
    pub duration: Option<i64>,
    pub view_count: Option<i64>,
}

/// Subset of the `ytsearchN:` flat-playlist payload we read.
#[derive(Deserialize)]
struct SearchPayload {
    #[serde(default)]
    entries: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    view_count: Option<i64>,
}

impl SearchEntry {
    fn into_hit(self) -> Option<VideoHit> {
        let id = self.id.filter(|id| !id.trim().is_empty())?;
        let url = self
            .url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={id}"));
        Some(VideoHit {
            title: self
                .title
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            channel: self.channel.or(self.uploader),
            duration: self.duration.map(|seconds| seconds.round() as i64),
            view_count: self.view_count,
            id,
            url,
        })
    }
}

/// Bulk video search over yt-dlp's `ytsearchN:` pseudo-playlists.
#[derive(Debug, Clone)]
pub struct SearchClient {
    runner: YtDlpRunner,
}

impl SearchClient {
    pub fn new(runner: YtDlpRunner) -> Self {
        Self { runner }
    }

    /// Returns up to `max_results` candidate videos for `keyword`, in
    /// provider order. Provider failures propagate as generic errors.
    pub fn search_bulk(&self, keyword: &str, max_results: usize) -> Result<Vec<VideoHit>> {
        let selector = format!("ytsearch{max_results}:{keyword}");
        let output = self
            .runner
            .command()
            .arg("--dump-single-json")
            .arg("--flat-playlist")
            .arg("--no-warnings")
            .arg(&selector)
            .output()
            .with_context(|| format!("running yt-dlp search for {keyword:?}"))?;

        if !output.status.success() {
            bail!(
                "yt-dlp search failed for {:?} (status {}): {}",
                keyword,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let payload: SearchPayload =
            serde_json::from_slice(&output.stdout).context("parsing yt-dlp search response")?;
        Ok(payload
            .entries
            .into_iter()
            .filter_map(SearchEntry::into_hit)
            .collect())
    }
}

/// Converted subtitle track plus its source metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedSubtitle {
    pub text: String,
    pub language: String,
    pub source_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Where subtitle artifacts land for one extraction.
enum ArtifactDir {
    /// Kept on disk under the configured vtt directory.
    Persistent(PathBuf),
    /// Discarded when the extraction finishes (debug/no-disk mode).
    Scratch(tempfile::TempDir),
}

impl ArtifactDir {
    fn path(&self) -> &Path {
        match self {
            Self::Persistent(path) => path,
            Self::Scratch(dir) => dir.path(),
        }
    }
}

/// Downloads a video's subtitle track and converts it to plain text.
#[derive(Debug, Clone)]
pub struct SubtitleExtractor {
    runner: YtDlpRunner,
    vtt_directory: PathBuf,
    keep_artifacts: bool,
}

impl SubtitleExtractor {
    pub fn new(runner: YtDlpRunner, vtt_directory: PathBuf, keep_artifacts: bool) -> Self {
        Self {
            runner,
            vtt_directory,
            keep_artifacts,
        }
    }

    /// Fails when the video has no subtitle track or conversion yields
    /// nothing. Blocking; run inside `spawn_blocking` from async code.
    pub fn extract(&self, video_id: &str, video_url: &str) -> Result<ExtractedSubtitle> {
        let dir = self.artifact_dir(video_id)?;
        let output_pattern = dir.path().join(video_id);

        let output = self
            .runner
            .command()
            .arg("--write-sub")
            .arg("--write-auto-sub")
            .arg("--write-info-json")
            .arg("--sub-langs")
            .arg("en.*,en")
            .arg("--sub-format")
            .arg("vtt")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--output")
            .arg(&output_pattern)
            .arg(video_url)
            .output()
            .with_context(|| format!("running yt-dlp subtitle download for {video_id}"))?;

        if !output.status.success() {
            bail!(
                "yt-dlp subtitle download failed for {} (status {}): {}",
                video_id,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let track = best_subtitle_track(dir.path(), video_id)?;
        let raw = fs::read_to_string(&track.path)
            .with_context(|| format!("reading subtitle file {}", track.path.display()))?;
        let text = vtt_to_text(&raw);
        if text.is_empty() {
            bail!("subtitle track for {video_id} converted to empty text");
        }

        let source_file = track
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(ExtractedSubtitle {
            text,
            language: track.language,
            source_file,
            title: read_info_title(dir.path(), video_id),
        })
    }

    fn artifact_dir(&self, video_id: &str) -> Result<ArtifactDir> {
        if self.keep_artifacts {
            let dir = self.vtt_directory.join(video_id);
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating subtitle directory {}", dir.display()))?;
            Ok(ArtifactDir::Persistent(dir))
        } else {
            let dir = tempfile::tempdir().context("creating scratch subtitle directory")?;
            Ok(ArtifactDir::Scratch(dir))
        }
    }
}

struct TrackFile {
    path: PathBuf,
    language: String,
    rank: usize,
}

/// Picks the best track among `{video_id}.{lang}.{ext}` files, preferring
/// formats that convert cleanly.
fn best_subtitle_track(dir: &Path, video_id: &str) -> Result<TrackFile> {
    let prefix = format!("{video_id}.");
    let mut best: Option<TrackFile> = None;

    let entries = fs::read_dir(dir)
        .with_context(|| format!("reading subtitle directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };
        let Some((language, ext)) = rest.rsplit_once('.') else {
            continue;
        };
        let rank = subtitle_extension_rank(ext);
        if rank >= 10 {
            continue;
        }
        if best.as_ref().is_none_or(|current| rank < current.rank) {
            best = Some(TrackFile {
                path: entry.path(),
                language: language.to_string(),
                rank,
            });
        }
    }

    best.ok_or_else(|| anyhow!("no subtitle track produced for {video_id}"))
}

fn subtitle_extension_rank(ext: &str) -> usize {
    match ext.to_ascii_lowercase().as_str() {
        "vtt" => 0,
        "srv3" => 1,
        "srv2" => 2,
        "srv1" => 3,
        "srt" => 4,
        "ttml" => 5,
        _ => 10,
    }
}

/// Reads the video title out of the `.info.json` written alongside the
/// subtitles; absence is not an error.
fn read_info_title(dir: &Path, video_id: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct VideoInfo {
        fulltitle: Option<String>,
        title: Option<String>,
    }

    let raw = fs::read_to_string(dir.join(format!("{video_id}.info.json"))).ok()?;
    let info: VideoInfo = serde_json::from_str(&raw).ok()?;
    info.fulltitle
        .or(info.title)
        .filter(|title| !title.trim().is_empty())
}

/// Deterministic VTT → text: drops the header block, timing lines and numeric
/// cue ids, strips inline cue tags, collapses whitespace, and skips the
/// consecutive duplicate lines auto-generated captions repeat.
pub fn vtt_to_text(vtt: &str) -> String {
    let mut lines_out: Vec<String> = Vec::new();
    for line in vtt.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("webvtt")
            || trimmed.starts_with("Kind:")
            || trimmed.starts_with("Language:")
            || trimmed.contains("-->")
        {
            continue;
        }
        if trimmed.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let cleaned = strip_cue_tags(trimmed);
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.is_empty() {
            continue;
        }
        if lines_out.last().is_some_and(|previous| *previous == cleaned) {
            continue;
        }
        lines_out.push(cleaned);
    }
    lines_out.join("\n")
}

/// Removes `<c>`-style and timestamp tags embedded in cue text.
fn strip_cue_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Extracts the video id from the YouTube URL shapes the intake form sees:
/// `youtu.be/<id>`, `watch?v=<id>`, `shorts/<id>`, `embed/<id>`, or a bare
/// 11-character id.
pub fn video_id_from_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(parsed) = Url::parse(trimmed) else {
        return looks_like_video_id(trimmed).then(|| trimmed.to_owned());
    };

    let host = parsed.host_str()?.to_ascii_lowercase();
    if host == "youtu.be" {
        return parsed
            .path_segments()?
            .next()
            .map(|segment| segment.trim().to_owned())
            .filter(|segment| !segment.is_empty());
    }

    if host != "youtube.com" && !host.ends_with(".youtube.com") {
        return None;
    }

    if parsed.path().starts_with("/watch") {
        for (key, value) in parsed.query_pairs() {
            if key == "v" && !value.trim().is_empty() {
                return Some(value.trim().to_owned());
            }
        }
    }

    if let Some(mut segments) = parsed.path_segments() {
        let first = segments.next().unwrap_or("");
        let second = segments.next().unwrap_or("");
        if (first == "shorts" || first == "embed") && !second.trim().is_empty() {
            return Some(second.to_owned());
        }
    }

    None
}

fn looks_like_video_id(value: &str) -> bool {
    value.len() == 11
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
pub(crate) fn install_ytdlp_stub(dir: &Path) -> Result<PathBuf> {
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

if printf '%s\n' "${args[@]}" | grep -q -- '--version'; then
  echo "2024.01.01"
  exit 0
fi

if printf '%s\n' "${args[@]}" | grep -q -- '--flat-playlist'; then
  cat <<'JSON'
{"entries":[
  {"id":"alpha","title":"Two Sum in 10 minutes","url":"https://www.youtube.com/watch?v=alpha","channel":"AlgoChannel","duration":600.0,"view_count":1200},
  {"id":"beta","title":"Two Sum explained","uploader":"OtherChannel","duration":432.5},
  {"id":"","title":"broken entry"}
]}
JSON
  exit 0
fi

if printf '%s\n' "${args[@]}" | grep -q -- '--write-sub'; then
  mkdir -p "$(dirname "$output")"
  cat <<'VTT' > "${output}.en.vtt"
WEBVTT
Kind: captions
Language: en

00:00:00.000 --> 00:00:01.000
Hello   <c>world</c>

00:00:01.000 --> 00:00:02.000
Hello world

00:00:02.000 --> 00:00:03.000
let's solve two sum
VTT
  cat <<'JSON' > "${output}.info.json"
{"id":"alpha","fulltitle":"Two Sum in 10 minutes"}
JSON
  exit 0
fi

exit 0
"#;
    fs::write(&script_path, script)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&script_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms)?;
    }
    Ok(script_path)
}
