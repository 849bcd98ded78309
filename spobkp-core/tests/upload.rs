use spobkp_core::{ChunkedUploader, UploadError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_url(server: &MockServer) -> String {
    format!("{}/session", server.uri())
}

#[tokio::test]
async fn splits_the_source_into_contiguous_ranges() {
    let server = MockServer::start().await;
    for range in ["bytes 0-9/25", "bytes 10-19/25", "bytes 20-24/25"] {
        Mock::given(method("PUT"))
            .and(path("/session"))
            .and(header("content-range", range))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
    }

    let data = vec![7u8; 25];
    let uploader = ChunkedUploader::with_chunk_size(10).unwrap();
    uploader
        .upload(&session_url(&server), &data[..], 25)
        .await
        .unwrap();
}

#[tokio::test]
async fn an_exact_multiple_sends_a_trailing_empty_chunk() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/session"))
        .and(header("content-range", "bytes 0-3/4"))
        .and(header("content-length", "4"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session"))
        .and(header("content-range", "bytes 4-3/4"))
        .and(header("content-length", "0"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let data = b"abcd".to_vec();
    let uploader = ChunkedUploader::with_chunk_size(4).unwrap();
    uploader
        .upload(&session_url(&server), &data[..], 4)
        .await
        .unwrap();
}

#[tokio::test]
async fn an_empty_source_still_sends_one_chunk() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/session"))
        .and(header("content-range", "bytes 0--1/0"))
        .and(header("content-length", "0"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let uploader = ChunkedUploader::with_chunk_size(4).unwrap();
    uploader
        .upload(&session_url(&server), &b""[..], 0)
        .await
        .unwrap();
}

#[tokio::test]
async fn the_final_chunk_completes_with_200() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/session"))
        .and(header("content-range", "bytes 0-4/7"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session"))
        .and(header("content-range", "bytes 5-6/7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let data = b"payload".to_vec();
    let uploader = ChunkedUploader::with_chunk_size(5).unwrap();
    uploader
        .upload(&session_url(&server), &data[..], 7)
        .await
        .unwrap();
}

#[tokio::test]
async fn a_rejected_chunk_stops_the_transfer() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/session"))
        .and(header("content-range", "bytes 0-3/12"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session"))
        .and(header("content-range", "bytes 4-7/12"))
        .respond_with(ResponseTemplate::new(507).set_body_string("insufficientStorage"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/session"))
        .and(header("content-range", "bytes 8-11/12"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let data = vec![1u8; 12];
    let uploader = ChunkedUploader::with_chunk_size(4).unwrap();
    let err = uploader
        .upload(&session_url(&server), &data[..], 12)
        .await
        .expect_err("expected rejection");

    match err {
        UploadError::ChunkRejected {
            status,
            offset,
            body,
        } => {
            assert_eq!(status, 507);
            assert_eq!(offset, 4);
            assert_eq!(body, "insufficientStorage");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn a_full_sized_source_yields_three_default_chunks() {
    let server = MockServer::start().await;
    for range in [
        "bytes 0-10485759/25000000",
        "bytes 10485760-20971519/25000000",
        "bytes 20971520-24999999/25000000",
    ] {
        Mock::given(method("PUT"))
            .and(path("/session"))
            .and(header("content-range", range))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
    }

    let data = vec![0u8; 25_000_000];
    let uploader = ChunkedUploader::new().unwrap();
    uploader
        .upload(&session_url(&server), &data[..], 25_000_000)
        .await
        .unwrap();
}
