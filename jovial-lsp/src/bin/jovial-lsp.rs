use jovial_lsp::JovialLanguageServer;
use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};

#[tokio::main]
async fn main() {
    // Internal-only log records go to stderr; the protocol owns stdout.
    env_logger::init();

    let stdin = stdin();
    let stdout = stdout();
    let (service, socket) = LspService::new(JovialLanguageServer::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
