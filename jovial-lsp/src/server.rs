//! Main language server implementation.

use std::collections::HashMap;
use std::sync::Arc;

use jovial_analysis::completion::{completion_items, CompletionCandidate};
use jovial_analysis::document_symbols::{document_symbols, DocumentOutlineSymbol};
use jovial_analysis::go_to_definition::goto_definition;
use jovial_analysis::hover::{hover as compute_hover, HoverResult};
use jovial_analysis::references::find_references;
use jovial_syntax::diagnostics::{
    Diagnostic as JovialDiagnostic, Severity as JovialSeverity,
};
use jovial_syntax::session::{AnalysisSnapshot, DocumentSession, PassOutcome};
use jovial_syntax::span::{Position as AstPosition, Span};
use tokio::sync::RwLock;
use tower_lsp::async_trait;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::{
    CompletionItem, CompletionOptions, CompletionParams, CompletionResponse, Diagnostic,
    DiagnosticSeverity, DocumentSymbol, DocumentSymbolParams, DocumentSymbolResponse,
    GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverContents, HoverParams,
    HoverProviderCapability, InitializeParams, InitializeResult, InitializedParams, Location,
    MarkupContent, MarkupKind, MessageType, OneOf, Position, Range, ReferenceParams,
    ServerCapabilities, ServerInfo, TextDocumentItem, TextDocumentSyncCapability,
    TextDocumentSyncKind, Url, WorkDoneProgressOptions,
};
use tower_lsp::Client;

#[async_trait]
pub trait LspClient: Send + Sync + Clone + 'static {
    async fn publish_diagnostics(&self, uri: Url, diags: Vec<Diagnostic>, version: Option<i32>);
    async fn show_message(&self, typ: MessageType, message: String);
}

#[async_trait]
impl LspClient for Client {
    async fn publish_diagnostics(&self, uri: Url, diags: Vec<Diagnostic>, version: Option<i32>) {
        self.publish_diagnostics(uri, diags, version).await;
    }

    async fn show_message(&self, typ: MessageType, message: String) {
        self.show_message(typ, message).await;
    }
}

pub trait FeatureProvider: Send + Sync + 'static {
    fn completion(
        &self,
        snapshot: &AnalysisSnapshot,
        position: AstPosition,
    ) -> Vec<CompletionCandidate>;
    fn hover(&self, snapshot: &AnalysisSnapshot, position: AstPosition) -> Option<HoverResult>;
    fn goto_definition(&self, snapshot: &AnalysisSnapshot, position: AstPosition) -> Vec<Span>;
    fn references(
        &self,
        snapshot: &AnalysisSnapshot,
        position: AstPosition,
        include_declaration: bool,
    ) -> Vec<Span>;
    fn document_symbols(&self, snapshot: &AnalysisSnapshot) -> Vec<DocumentOutlineSymbol>;
}

#[derive(Default)]
pub struct DefaultFeatureProvider;

impl DefaultFeatureProvider {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureProvider for DefaultFeatureProvider {
    fn completion(
        &self,
        snapshot: &AnalysisSnapshot,
        position: AstPosition,
    ) -> Vec<CompletionCandidate> {
        completion_items(snapshot, position)
    }

    fn hover(&self, snapshot: &AnalysisSnapshot, position: AstPosition) -> Option<HoverResult> {
        compute_hover(snapshot, position)
    }

    fn goto_definition(&self, snapshot: &AnalysisSnapshot, position: AstPosition) -> Vec<Span> {
        goto_definition(snapshot, position)
    }

    fn references(
        &self,
        snapshot: &AnalysisSnapshot,
        position: AstPosition,
        include_declaration: bool,
    ) -> Vec<Span> {
        find_references(snapshot, position, include_declaration)
    }

    fn document_symbols(&self, snapshot: &AnalysisSnapshot) -> Vec<DocumentOutlineSymbol> {
        document_symbols(snapshot)
    }
}

/// The single owned table of open documents: one analysis session per
/// document, created on open and discarded on close.
#[derive(Default)]
struct DocumentStore {
    entries: RwLock<HashMap<Url, DocumentSession>>,
}

pub struct JovialLanguageServer<C = Client, P = DefaultFeatureProvider> {
    client: C,
    documents: DocumentStore,
    features: Arc<P>,
}

impl JovialLanguageServer<Client, DefaultFeatureProvider> {
    pub fn new(client: Client) -> Self {
        Self::with_features(client, Arc::new(DefaultFeatureProvider::new()))
    }
}

impl<C, P> JovialLanguageServer<C, P>
where
    C: LspClient,
    P: FeatureProvider,
{
    pub fn with_features(client: C, features: Arc<P>) -> Self {
        Self {
            client,
            documents: DocumentStore::default(),
            features,
        }
    }

    /// Starts an analysis pass for new document text and publishes the
    /// resulting snapshot and diagnostics, unless a newer edit supersedes
    /// the pass while it runs.
    async fn analyze_and_publish(&self, uri: Url, text: String) {
        let pass = {
            let mut entries = self.documents.entries.write().await;
            match entries.get_mut(&uri) {
                Some(session) => session.begin_edit(text),
                None => {
                    let session = DocumentSession::new(text);
                    let pass = session.initial_pass();
                    entries.insert(uri.clone(), session);
                    pass
                }
            }
        };

        let outcome = match tokio::task::spawn_blocking(move || pass.run()).await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                log::error!("analysis task failed for {uri}: {join_error}");
                return;
            }
        };

        match outcome {
            Ok(PassOutcome::Completed(snapshot)) => {
                let snapshot = Arc::new(snapshot);
                let published = {
                    let mut entries = self.documents.entries.write().await;
                    match entries.get_mut(&uri) {
                        Some(session) => session.publish(Arc::clone(&snapshot)),
                        // Document closed while the pass ran.
                        None => false,
                    }
                };
                if published {
                    let diagnostics = snapshot
                        .diagnostics
                        .iter()
                        .map(to_lsp_diagnostic)
                        .collect();
                    self.client.publish_diagnostics(uri, diagnostics, None).await;
                }
            }
            Ok(PassOutcome::Superseded) => {
                // A newer edit restarted analysis; its pass will publish.
            }
            Err(error) => {
                // Invariant violation: the previous snapshot stays
                // current and nothing is observable through queries.
                log::error!("analysis pass aborted for {uri}: {error}");
            }
        }
    }

    /// The most recently completed snapshot for a document. Queries never
    /// wait for in-flight analysis.
    async fn snapshot(&self, uri: &Url) -> Option<Arc<AnalysisSnapshot>> {
        self.documents.entries.read().await.get(uri)?.snapshot()
    }
}

fn to_lsp_position(position: &AstPosition) -> Position {
    Position::new(position.line as u32, position.column as u32)
}

fn to_lsp_range(span: &Span) -> Range {
    Range {
        start: to_lsp_position(&span.start),
        end: to_lsp_position(&span.end),
    }
}

fn to_lsp_location(uri: &Url, span: &Span) -> Location {
    Location {
        uri: uri.clone(),
        range: to_lsp_range(span),
    }
}

fn from_lsp_position(position: Position) -> AstPosition {
    AstPosition::new(position.line as usize, position.character as usize)
}

fn to_lsp_diagnostic(diagnostic: &JovialDiagnostic) -> Diagnostic {
    let severity = match diagnostic.severity {
        JovialSeverity::Error => DiagnosticSeverity::ERROR,
        JovialSeverity::Warning => DiagnosticSeverity::WARNING,
    };
    Diagnostic {
        range: to_lsp_range(&diagnostic.span),
        severity: Some(severity),
        source: Some("jovial".to_string()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}

fn to_lsp_completion_item(candidate: &CompletionCandidate) -> CompletionItem {
    CompletionItem {
        label: candidate.label.clone(),
        kind: Some(candidate.kind),
        detail: candidate.detail.clone(),
        ..Default::default()
    }
}

#[allow(deprecated)]
fn to_document_symbol(symbol: &DocumentOutlineSymbol) -> DocumentSymbol {
    DocumentSymbol {
        name: symbol.name.clone(),
        detail: symbol.detail.clone(),
        kind: symbol.kind,
        deprecated: None,
        range: to_lsp_range(&symbol.range),
        selection_range: to_lsp_range(&symbol.selection_range),
        children: if symbol.children.is_empty() {
            None
        } else {
            Some(symbol.children.iter().map(to_document_symbol).collect())
        },
        tags: None,
    }
}

#[async_trait]
impl<C, P> tower_lsp::LanguageServer for JovialLanguageServer<C, P>
where
    C: LspClient,
    P: FeatureProvider,
{
    async fn initialize(&self, _params: InitializeParams) -> Result<InitializeResult> {
        let capabilities = ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::FULL)),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            document_symbol_provider: Some(OneOf::Left(true)),
            definition_provider: Some(OneOf::Left(true)),
            references_provider: Some(OneOf::Left(true)),
            completion_provider: Some(CompletionOptions {
                resolve_provider: Some(false),
                trigger_characters: Some(vec!["'".to_string(), "(".to_string()]),
                work_done_progress_options: WorkDoneProgressOptions::default(),
                all_commit_characters: None,
                ..Default::default()
            }),
            ..ServerCapabilities::default()
        };

        Ok(InitializeResult {
            capabilities,
            server_info: Some(ServerInfo {
                name: "jovial-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {}

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: lsp_types::DidOpenTextDocumentParams) {
        let TextDocumentItem { uri, text, .. } = params.text_document;
        self.analyze_and_publish(uri, text).await;
    }

    async fn did_change(&self, params: lsp_types::DidChangeTextDocumentParams) {
        // Full text sync: the last change carries the whole document.
        if let Some(change) = params.content_changes.into_iter().last() {
            self.analyze_and_publish(params.text_document.uri, change.text)
                .await;
        }
    }

    async fn did_close(&self, params: lsp_types::DidCloseTextDocumentParams) {
        self.documents
            .entries
            .write()
            .await
            .remove(&params.text_document.uri);
        self.client
            .publish_diagnostics(params.text_document.uri, Vec::new(), None)
            .await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        if let Some(snapshot) = self.snapshot(&uri).await {
            let position = from_lsp_position(params.text_document_position.position);
            let candidates = self.features.completion(&snapshot, position);
            let items: Vec<CompletionItem> =
                candidates.iter().map(to_lsp_completion_item).collect();
            Ok(Some(CompletionResponse::Array(items)))
        } else {
            Ok(None)
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        if let Some(snapshot) = self.snapshot(&uri).await {
            let position = from_lsp_position(params.text_document_position_params.position);
            if let Some(result) = self.features.hover(&snapshot, position) {
                return Ok(Some(Hover {
                    contents: HoverContents::Markup(MarkupContent {
                        kind: MarkupKind::Markdown,
                        value: result.contents,
                    }),
                    range: Some(to_lsp_range(&result.range)),
                }));
            }
        }
        Ok(None)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        if let Some(snapshot) = self.snapshot(&uri).await {
            let position = from_lsp_position(params.text_document_position_params.position);
            let spans = self.features.goto_definition(&snapshot, position);
            if spans.is_empty() {
                Ok(None)
            } else {
                let locations: Vec<Location> = spans
                    .iter()
                    .map(|span| to_lsp_location(&uri, span))
                    .collect();
                Ok(Some(GotoDefinitionResponse::Array(locations)))
            }
        } else {
            Ok(None)
        }
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let uri = params.text_document_position.text_document.uri;
        if let Some(snapshot) = self.snapshot(&uri).await {
            let position = from_lsp_position(params.text_document_position.position);
            let include_declaration = params.context.include_declaration;
            let spans = self
                .features
                .references(&snapshot, position, include_declaration);
            if spans.is_empty() {
                Ok(None)
            } else {
                Ok(Some(
                    spans
                        .iter()
                        .map(|span| to_lsp_location(&uri, span))
                        .collect(),
                ))
            }
        } else {
            Ok(None)
        }
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        if let Some(snapshot) = self.snapshot(&params.text_document.uri).await {
            let symbols = self.features.document_symbols(&snapshot);
            let converted: Vec<DocumentSymbol> = symbols.iter().map(to_document_symbol).collect();
            Ok(Some(DocumentSymbolResponse::Nested(converted)))
        } else {
            Ok(None)
        }
    }
}
