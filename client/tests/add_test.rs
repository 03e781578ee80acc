// Copyright 2025 Dagbox Contributors
// SPDX-License-Identifier: Apache-2.0, MIT

use anyhow::Result;
use bytes::Bytes;
use futures::{stream, StreamExt};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use dagbox_client::mock::{fake_cid, MockTransport};
use dagbox_client::{AddInput, AddOptions, Client, Config, Error, RawEntry};

fn new_client(transport: MockTransport) -> Client<MockTransport> {
    Client::with_transport(Config::default(), transport).unwrap()
}

fn added_line(name: &str, content: &[u8]) -> String {
    json!({
        "Name": name,
        "Hash": fake_cid(content),
        "Size": content.len().to_string(),
    })
    .to_string()
}

#[tokio::test]
async fn add_buffer_yields_single_record() -> Result<()> {
    let transport = MockTransport::new();
    transport.respond(200, vec![added_line("", b"hello")]);
    let client = new_client(transport.clone());

    let records: Vec<_> = client
        .add("hello", AddOptions::new())
        .await?
        .collect()
        .await;
    assert_eq!(records.len(), 1);
    let record = records[0].as_ref().unwrap();
    assert!(!record.cid.is_empty());
    assert_eq!(record.size, 5);
    assert_eq!(record.path, "");

    let requests = transport.take_requests();
    assert_eq!(requests.len(), 1);
    let query = requests[0].url.query().unwrap();
    assert!(query.contains("stream-channels=true"));
    assert!(!query.contains("chunker"));

    let body = String::from_utf8_lossy(requests[0].body.as_ref().unwrap()).into_owned();
    assert!(body.contains("Content-Disposition: form-data"));
    assert!(body.contains("hello"));
    assert!(requests[0]
        .content_type
        .as_ref()
        .unwrap()
        .starts_with("multipart/form-data; boundary="));
    Ok(())
}

#[tokio::test]
async fn omitted_options_send_no_parameters() -> Result<()> {
    let transport = MockTransport::new();
    transport.respond(200, vec![added_line("", b"x")]);
    let client = new_client(transport.clone());

    client
        .add("x", AddOptions::new())
        .await?
        .collect::<Vec<_>>()
        .await;

    let requests = transport.take_requests();
    let query = requests[0].url.query().unwrap();
    for parameter in [
        "chunker",
        "cid-version",
        "pin",
        "progress",
        "raw-leaves",
        "wrap-with-directory",
    ] {
        assert!(
            !query.contains(parameter),
            "unexpected parameter {parameter} in {query}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn set_options_reach_the_query_string() -> Result<()> {
    let transport = MockTransport::new();
    transport.respond(200, vec![added_line("", b"x")]);
    let client = new_client(transport.clone());

    let options = AddOptions::new()
        .chunker("size-262144")
        .cid_version(1)
        .only_hash(true)
        .pin(false);
    client.add("x", options).await?.collect::<Vec<_>>().await;

    let requests = transport.take_requests();
    let query = requests[0].url.query().unwrap();
    assert!(query.contains("chunker=size-262144"));
    assert!(query.contains("cid-version=1"));
    assert!(query.contains("only-hash=true"));
    assert!(query.contains("pin=false"));
    Ok(())
}

#[tokio::test]
async fn async_stream_first_chunk_is_not_lost() -> Result<()> {
    let transport = MockTransport::new();
    transport.respond(200, vec![added_line("", &[1, 2, 3, 4, 5])]);
    let client = new_client(transport.clone());

    let chunks = stream::iter(vec![
        Ok::<_, std::io::Error>(Bytes::from_static(&[1, 2, 3])),
        Ok(Bytes::from_static(&[4, 5])),
    ]);
    let records: Vec<_> = client
        .add(AddInput::stream(chunks), AddOptions::new())
        .await?
        .collect()
        .await;
    assert_eq!(records.len(), 1);

    let requests = transport.take_requests();
    let body = requests[0].body.as_ref().unwrap();
    assert!(
        body.windows(5).any(|window| window == [1, 2, 3, 4, 5]),
        "multipart payload must contain the spliced bytes contiguously"
    );
    Ok(())
}

#[tokio::test]
async fn descriptor_collection_uploads_every_file_in_order() -> Result<()> {
    let transport = MockTransport::new();
    transport.respond(
        200,
        vec![added_line("a.txt", b"aaa"), added_line("b.txt", b"bb")],
    );
    let client = new_client(transport.clone());

    let entries = vec![
        RawEntry::file("a.txt", b"aaa".to_vec()),
        RawEntry::file("b.txt", b"bb".to_vec()),
    ];
    let records: Vec<_> = client.add(entries, AddOptions::new()).await?.collect().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].as_ref().unwrap().path, "a.txt");
    assert_eq!(records[1].as_ref().unwrap().path, "b.txt");

    let requests = transport.take_requests();
    let body = String::from_utf8_lossy(requests[0].body.as_ref().unwrap()).into_owned();
    let first = body.find("filename=\"a.txt\"").unwrap();
    let second = body.find("filename=\"b.txt\"").unwrap();
    assert!(first < second);
    Ok(())
}

#[tokio::test]
async fn progress_records_feed_the_callback_only() -> Result<()> {
    let transport = MockTransport::new();
    transport.respond(
        200,
        vec![
            json!({"Bytes": 3}).to_string(),
            json!({"Bytes": 5}).to_string(),
            added_line("", b"hello"),
        ],
    );
    let client = new_client(transport.clone());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let options = AddOptions::new().on_progress(move |bytes| sink.lock().unwrap().push(bytes));

    let records: Vec<_> = client.add("hello", options).await?.collect().await;
    assert_eq!(records.len(), 1);
    assert_eq!(*seen.lock().unwrap(), vec![3, 5]);

    let requests = transport.take_requests();
    assert!(requests[0].url.query().unwrap().contains("progress=true"));
    Ok(())
}

#[tokio::test]
async fn cancelling_terminates_the_stream() -> Result<()> {
    let transport = MockTransport::new();
    transport.respond_stalled(vec![added_line("a", b"first")]);
    let client = new_client(transport.clone());

    let token = CancellationToken::new();
    let records = client
        .add("first", AddOptions::new().cancel_token(token.clone()))
        .await?;
    futures::pin_mut!(records);

    let first = records.next().await.unwrap()?;
    assert_eq!(first.path, "a");

    token.cancel();
    let next = records.next().await.unwrap();
    assert!(matches!(next, Err(Error::Cancelled)));
    assert!(records.next().await.is_none());
    Ok(())
}

#[tokio::test]
async fn non_success_status_carries_the_server_message() -> Result<()> {
    let transport = MockTransport::new();
    transport.respond_json(500, json!({"Message": "boom", "Code": 0}));
    let client = new_client(transport);

    let err = client.add("x", AddOptions::new()).await.err().unwrap();
    assert!(matches!(
        err,
        Error::Api { status: 500, ref message } if message == "boom"
    ));
    Ok(())
}

#[tokio::test]
async fn network_failure_is_a_transport_error() -> Result<()> {
    let transport = MockTransport::new();
    transport.fail_with("connection refused");
    let client = new_client(transport);

    let err = client.add("x", AddOptions::new()).await.err().unwrap();
    assert!(matches!(err, Error::Transport(_)));
    Ok(())
}

#[tokio::test]
async fn per_call_headers_replace_defaults() -> Result<()> {
    let transport = MockTransport::new();
    transport.respond(200, vec![added_line("", b"x")]);
    let config = Config::default().header("Authorization", "Bearer default");
    let client = Client::with_transport(config, transport.clone()).unwrap();

    let options = AddOptions::new().header("Authorization", "Bearer override");
    client.add("x", options).await?.collect::<Vec<_>>().await;

    let requests = transport.take_requests();
    assert_eq!(
        requests[0].headers,
        vec![(
            "Authorization".to_string(),
            "Bearer override".to_string()
        )]
    );
    Ok(())
}

#[tokio::test]
async fn id_decodes_the_node_identity() -> Result<()> {
    let transport = MockTransport::new();
    transport.respond_json(
        200,
        json!({
            "ID": "12D3KooWExample",
            "PublicKey": "CAESIQ",
            "Addresses": ["/ip4/127.0.0.1/tcp/4001"],
            "AgentVersion": "kubo/0.29.0",
            "ProtocolVersion": "ipfs/0.1.0",
        }),
    );
    let client = new_client(transport);

    let identity = client.id().await?;
    assert_eq!(identity.id, "12D3KooWExample");
    assert_eq!(identity.addresses.len(), 1);
    assert_eq!(identity.agent_version.as_deref(), Some("kubo/0.29.0"));
    Ok(())
}

#[tokio::test]
async fn version_decodes_the_node_version() -> Result<()> {
    let transport = MockTransport::new();
    transport.respond_json(
        200,
        json!({"Version": "0.29.0", "Commit": "abc123", "Repo": "15"}),
    );
    let client = new_client(transport);

    let version = client.version().await?;
    assert_eq!(version.version, "0.29.0");
    assert_eq!(version.commit.as_deref(), Some("abc123"));
    assert_eq!(version.system, None);
    Ok(())
}
