//! "Medium download" end-to-end scenario (spec.md §8): server hosts a
//! 3 x 1500-byte random file; the client downloads an identical copy.

mod common;

use std::io::Cursor;

use common::{random_ascii, RunningServer};
use reliable_transfer::client;
use reliable_transfer::config::Protocol;
use reliable_transfer::io_chunks::WriteSink;

fn run_medium_download(protocol: Protocol) {
    let server = RunningServer::spawn(protocol);
    let content = random_ascii(3 * 1500);
    std::fs::write(server.storage_dir.join("md.bin"), &content).unwrap();

    let mut downloaded = Cursor::new(Vec::new());
    {
        let mut sink = WriteSink::new(&mut downloaded);
        client::download("127.0.0.1", server.addr.port(), protocol, "md.bin", &mut sink)
            .expect("download should succeed");
    }

    assert_eq!(downloaded.into_inner(), content);
}

#[test]
fn medium_download_stop_and_wait() {
    run_medium_download(Protocol::StopAndWait);
}

#[test]
fn medium_download_selective_repeat() {
    run_medium_download(Protocol::SelectiveRepeat);
}
