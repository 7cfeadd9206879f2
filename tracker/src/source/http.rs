use std::time::Duration;

use tracing::debug;

use super::{decode_sample, CaptureError, ImageSource};
use crate::sample::Sample;

/// Fetches one still per capture from a snapshot endpoint that answers a
/// plain GET with an encoded image (for example a camera's `/frame` route).
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotSource {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(CaptureError::Http)?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl ImageSource for HttpSnapshotSource {
    async fn capture(&mut self) -> Result<Sample, CaptureError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(CaptureError::Http)?;

        if !response.status().is_success() {
            return Err(CaptureError::HttpStatus(response.status().as_u16()));
        }

        let body = response.bytes().await.map_err(CaptureError::Http)?;
        debug!(url = self.url, bytes = body.len(), "snapshot fetched");
        decode_sample(&body)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response on a local port.
    async fn serve_once(status_line: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request).await;
            let head = format!(
                "{status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).await.unwrap();
            stream.write_all(&body).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        format!("http://{addr}/frame")
    }

    #[tokio::test]
    async fn decodes_snapshot_body() {
        use image::{GrayImage, ImageFormat, Luma};
        use std::io::Cursor;

        let gray = GrayImage::from_pixel(6, 4, Luma([77]));
        let mut buf = Cursor::new(Vec::new());
        gray.write_to(&mut buf, ImageFormat::Png).unwrap();

        let url = serve_once("HTTP/1.1 200 OK", buf.into_inner()).await;
        let mut source = HttpSnapshotSource::new(&url, 5).unwrap();
        let sample = source.capture().await.unwrap();
        assert_eq!(sample.dimensions(), (6, 4));
        assert!(sample.pixels().as_raw().iter().all(|&p| p == 77));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable", Vec::new()).await;
        let mut source = HttpSnapshotSource::new(&url, 5).unwrap();
        let err = source.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::HttpStatus(503)));
    }

    #[tokio::test]
    async fn unreachable_camera_is_http_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut source = HttpSnapshotSource::new(&format!("http://{addr}/frame"), 5).unwrap();
        let err = source.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::Http(_)));
    }
}
