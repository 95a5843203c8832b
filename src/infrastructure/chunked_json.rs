// Chunked JSON streaming utilities
use crate::application::streaming_service::StreamMessage;
use crate::infrastructure::config::TimestampFormat;
use crate::infrastructure::http_response::brotli_compress;
use crate::infrastructure::wire::message_to_wire;
use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;

/// Create a chunked streaming response. Each chunk is a 4-byte big-endian length
/// followed by one JSON message, Brotli-compressed on its own when `compress` is set.
pub fn chunked_json_stream<S, T>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + Sync + 'static,
{
    let byte_stream = stream.then(move |msg| async move { serialize_chunk(&msg, compress).await });

    // No Content-Encoding: chunks are compressed individually, not the HTTP body.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn serialize_chunk<T: Serialize>(msg: &T, compress: bool) -> Result<Bytes, std::io::Error> {
    let json = serde_json::to_vec(msg)?;

    let payload = if compress {
        brotli_compress(&json).await?
    } else {
        json
    };

    let length = u32::try_from(payload.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "chunk too large"))?;
    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(length);
    chunk.put_slice(&payload);

    Ok(chunk.freeze())
}

/// Helper to create a streaming response from a receiver
pub fn stream_from_receiver(
    mut rx: tokio::sync::mpsc::Receiver<StreamMessage>,
    compress: bool,
    format: TimestampFormat,
) -> impl IntoResponse {
    let stream = async_stream::stream! {
        while let Some(msg) = rx.recv().await {
            yield message_to_wire(msg, format);
        }
    };

    match chunked_json_stream(stream, compress) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::bufread::BrotliDecoder;
    use bytes::Buf;
    use tokio::io::AsyncReadExt;

    fn split_chunks(mut body: Bytes) -> Vec<Bytes> {
        let mut chunks = Vec::new();
        while body.has_remaining() {
            let len = body.get_u32() as usize;
            chunks.push(body.split_to(len));
        }
        chunks
    }

    async fn collect(rx_messages: Vec<StreamMessage>, compress: bool) -> Bytes {
        let (tx, rx) = tokio::sync::mpsc::channel(8);
        for msg in rx_messages {
            tx.send(msg).await.unwrap();
        }
        drop(tx);

        let response = stream_from_receiver(rx, compress, TimestampFormat::EpochMs).into_response();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/octet-stream");
        axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn test_length_prefixed_json_chunks() {
        let body = collect(
            vec![
                StreamMessage::Complete { delivered: 1, duration_ms: 3 },
                StreamMessage::Complete { delivered: 2, duration_ms: 4 },
            ],
            false,
        )
        .await;

        let chunks = split_chunks(body);
        assert_eq!(chunks.len(), 2);
        let second: serde_json::Value = serde_json::from_slice(&chunks[1]).unwrap();
        assert_eq!(second["type"], "complete");
        assert_eq!(second["delivered"], 2);
    }

    #[tokio::test]
    async fn test_chunks_compressed_individually() {
        let body = collect(vec![StreamMessage::Complete { delivered: 5, duration_ms: 1 }], true).await;

        let chunks = split_chunks(body);
        assert_eq!(chunks.len(), 1);
        let mut decoded = Vec::new();
        BrotliDecoder::new(&chunks[0][..]).read_to_end(&mut decoded).await.unwrap();
        let msg: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(msg["delivered"], 5);
    }
}
