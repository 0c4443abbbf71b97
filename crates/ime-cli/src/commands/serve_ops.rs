use ime_client::engine::MemoryEngine;
use ime_client::transport::StreamServer;

pub fn serve(port: u16, limit: Option<usize>) {
    let server = die!(
        StreamServer::bind(("127.0.0.1", port), Box::new(MemoryEngine::new())),
        "Error binding port {port}: {}"
    );
    if let Ok(addr) = server.local_addr() {
        eprintln!("Serving in-memory engine on {addr}");
    }
    let served = die!(server.serve(limit), "Error: {}");
    eprintln!("Served {served} calls");
}
