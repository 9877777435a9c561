//! "Large upload" end-to-end scenario (spec.md §8): 30 x 1500 bytes under
//! Selective Repeat, expected to complete well within the loopback budget.

mod common;

use std::time::{Duration, Instant};

use common::{random_ascii, RunningServer};
use reliable_transfer::client;
use reliable_transfer::config::Protocol;
use reliable_transfer::io_chunks::ChunkedReader;

#[test]
fn large_upload_completes_quickly_under_selective_repeat() {
    let server = RunningServer::spawn(Protocol::SelectiveRepeat);
    let content = random_ascii(30 * 1500);
    let mut source = ChunkedReader::new(std::io::Cursor::new(content.clone()));

    let started = Instant::now();
    client::upload("127.0.0.1", server.addr.port(), Protocol::SelectiveRepeat, "large.bin", &mut source)
        .expect("upload should succeed");
    assert!(started.elapsed() < Duration::from_secs(20));

    let stored = std::fs::read(server.storage_dir.join("large.bin")).unwrap();
    assert_eq!(stored, content);
}
