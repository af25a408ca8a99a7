//! Audio streaming for stored sample clips

use super::state::{GuardedSampleStore, ServerState};
use axum::{
    body::Body,
    extract::{FromRequestParts, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use tokio::{
    fs::File,
    io::{AsyncSeekExt, BufReader, SeekFrom},
};
use tokio_util::io::ReaderStream;
use tracing::debug;

const HEADER_BYTE_RANGE: &str = "Range";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start_inclusive: Option<u64>,
    end_inclusive: Option<u64>,
}

impl ByteRange {
    pub fn new(start_inclusive: Option<u64>, end_inclusive: Option<u64>) -> ByteRange {
        ByteRange {
            start_inclusive,
            end_inclusive,
        }
    }

    fn parse<S: AsRef<str>>(s: S) -> Option<ByteRange> {
        let v = s.as_ref();
        if !v.starts_with("bytes=") {
            return None;
        }

        let v = &v[6..];
        let parts: Vec<&str> = v.split('-').collect();
        if parts.len() != 2 {
            return None;
        }

        Some(ByteRange {
            start_inclusive: parts[0].parse::<u64>().ok(),
            end_inclusive: parts[1].parse::<u64>().ok(),
        })
    }
}

pub struct ByteRangeExtractionError {}

impl IntoResponse for ByteRangeExtractionError {
    fn into_response(self) -> Response {
        StatusCode::BAD_REQUEST.into_response()
    }
}

impl FromRequestParts<ServerState> for Option<ByteRange> {
    type Rejection = ByteRangeExtractionError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get(HEADER_BYTE_RANGE)
            .map(|x| x.to_str())
            .map(|x| x.ok())
            .and_then(|x| x.and_then(ByteRange::parse)))
    }
}

/// The sample id encoded in a clip file name like `1650000000.mp3`.
fn sample_file_id(file_name: &str) -> Option<u64> {
    file_name.strip_suffix(".mp3")?.parse().ok()
}

/// Maps the parsed `Range` header onto the clip as a `(start, length)`
/// span, or `None` when the clip cannot satisfy the request. An end
/// without a start selects the head of the clip, and ends past the clip
/// are clamped to its size.
fn served_span(byte_range: Option<ByteRange>, file_length: u64) -> Option<(u64, u64)> {
    let Some(range) = byte_range else {
        return Some((0, file_length));
    };
    match (range.start_inclusive, range.end_inclusive) {
        (None, None) => Some((0, file_length)),
        (None, Some(end)) => match end.min(file_length) {
            0 => None,
            length => Some((0, length)),
        },
        (Some(start), None) if start < file_length => Some((start, file_length - start)),
        (Some(start), Some(end)) if start < file_length && end >= start => {
            Some((start, end.min(file_length - 1) - start + 1))
        }
        _ => None,
    }
}

pub async fn stream_sample(
    byte_range: Option<ByteRange>,
    State(sample_store): State<GuardedSampleStore>,
    Path((source_id, file_name)): Path<(String, String)>,
) -> Response {
    // Only numeric clip names below known sources resolve to files, which
    // keeps arbitrary path segments out of the filesystem lookup.
    if !sample_store.has_source(&source_id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Some(sample_id) = sample_file_id(&file_name) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let path = sample_store.audio_path(&source_id, sample_id);
    debug!("Streaming sample from path {}", path.display());

    let mut file = match File::open(&path).await {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return StatusCode::NOT_FOUND.into_response()
        }
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Ok(x) => x,
    };

    let file_length = match file.metadata().await {
        Ok(x) => x.len(),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let Some((start_served, chunk_size)) = served_span(byte_range, file_length) else {
        return Response::builder()
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header("Content-Range", format!("bytes */{file_length}"))
            .body(Body::empty())
            .unwrap();
    };
    if start_served > 0 && file.seek(SeekFrom::Start(start_served)).await.is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let status_code = match byte_range {
        None
        | Some(ByteRange {
            start_inclusive: None,
            end_inclusive: None,
        }) => StatusCode::OK,
        _ => StatusCode::PARTIAL_CONTENT,
    };

    let file_reader = BufReader::with_capacity(4096 * 16, file);
    let stream = ReaderStream::with_capacity(file_reader, 4096 * 16);

    let body = Body::from_stream(stream);

    let mut response = Response::builder()
        .status(status_code)
        .header("Content-Type", "audio/mpeg")
        .header("Accept-Ranges", "bytes")
        .header("Content-length", chunk_size);
    if status_code == StatusCode::PARTIAL_CONTENT {
        // Satisfiable spans are never empty, so the inclusive end is
        // well defined here.
        response = response.header(
            "Content-Range",
            format!(
                "bytes {}-{}/{}",
                start_served,
                start_served + chunk_size - 1,
                file_length
            ),
        );
    }
    response.body(body).unwrap()
}
