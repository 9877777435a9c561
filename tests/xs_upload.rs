//! "XS upload" end-to-end scenario (spec.md §8): an 11-byte file uploads
//! byte-for-byte under both ARQ strategies.

mod common;

use std::io::Cursor;

use common::RunningServer;
use reliable_transfer::client;
use reliable_transfer::config::Protocol;

fn run_xs_upload(protocol: Protocol) {
    let server = RunningServer::spawn(protocol);
    let content = b"HELLO WORLD".to_vec();
    let mut source = Cursor::new(content.clone());

    client::upload(
        "127.0.0.1",
        server.addr.port(),
        protocol,
        "xs.bin",
        &mut reliable_transfer::io_chunks::ChunkedReader::new(&mut source),
    )
    .expect("upload should succeed");

    let stored = std::fs::read(server.storage_dir.join("xs.bin")).unwrap();
    assert_eq!(stored, content);
    assert_eq!(stored.len(), 11);
}

#[test]
fn xs_upload_stop_and_wait() {
    run_xs_upload(Protocol::StopAndWait);
}

#[test]
fn xs_upload_selective_repeat() {
    run_xs_upload(Protocol::SelectiveRepeat);
}
