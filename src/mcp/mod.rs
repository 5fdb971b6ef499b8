//! JSON-RPC / MCP surface (spec.md §6): the same query set the CLI exposes
//! (`main.rs`), wrapped as MCP tools over newline-delimited JSON-RPC 2.0.
//!
//! Grounded on the teacher's `mcp::mod::CodeIntelligenceServer` — the
//! `rmcp` `tool_router`/`tool_handler` scaffolding, the `Arc<RwLock<..>>`-
//! wrapped indexer, and the stdio-transport `serve()` call in
//! `cli::commands::serve::run_stdio_server` — trimmed of the teacher's
//! semantic-search, document-store and hot-reload-watcher tools, which
//! have no counterpart in this crate's data model. Every tool response
//! carries this crate's [`crate::io::envelope::Envelope`], so "no
//! results" is a success envelope with `status: not_found`, never a
//! JSON-RPC protocol error (spec.md §6's `isError`-separate-from-empty
//! contract).

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    schemars,
    tool, tool_handler, tool_router,
    ErrorData as McpError, ServerHandler,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::io::envelope::{Envelope, EntityType};
use crate::resolution::{GraphDirection, ResolutionEngine};
use crate::SimpleIndexer;

fn default_depth() -> i64 {
    3
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct NameRequest {
    /// Symbol name to query
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct FindRequest {
    /// Symbol name (substring match unless `exact` is set)
    pub name: String,
    #[serde(default)]
    pub exact: bool,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct ContextRequest {
    pub name: String,
    /// Include one extra hop of transitive callees
    #[serde(default)]
    pub expand: bool,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct TraceRequest {
    pub name: String,
    #[serde(default = "default_depth")]
    pub depth: i64,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct DeadcodeRequest {
    /// Fold exported-only symbols into the candidate set too
    #[serde(default)]
    pub include_exported: bool,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct GraphRequest {
    /// Project-relative file path
    pub file: String,
    /// Walk incoming edges (files importing this one) instead of outgoing
    #[serde(default)]
    pub dependents: bool,
    #[serde(default = "default_depth")]
    pub depth: i64,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct FileRequest {
    /// Project-relative file path
    pub file: String,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct StacktraceRequest {
    /// Raw stack-trace text, one frame per line
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize, schemars::JsonSchema)]
pub struct IndexInfoRequest {}

/// Wraps an [`Envelope`] as a successful tool result — `status` inside the
/// envelope, not the JSON-RPC layer, carries success/not-found/error, per
/// spec.md §6.
fn envelope_result<T: Serialize>(envelope: Envelope<T>) -> CallToolResult {
    let text = envelope
        .to_json()
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {e}\"}}"));
    CallToolResult::success(vec![Content::text(text)])
}

fn not_found_result(what: &str, name: &str) -> CallToolResult {
    let envelope: Envelope<()> = Envelope::not_found(format!("{what} '{name}' not found"));
    envelope_result(envelope)
}

#[derive(Clone)]
pub struct CodeIntelligenceServer {
    indexer: Arc<RwLock<SimpleIndexer>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CodeIntelligenceServer {
    pub fn new(indexer: SimpleIndexer) -> Self {
        Self {
            indexer: Arc::new(RwLock::new(indexer)),
            tool_router: Self::tool_router(),
        }
    }

    pub fn from_indexer(indexer: Arc<RwLock<SimpleIndexer>>) -> Self {
        Self {
            indexer,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Find definitions by name (substring match unless exact=true)")]
    pub async fn find_symbol(
        &self,
        Parameters(FindRequest { name, exact }): Parameters<FindRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let defs: Vec<_> = idx
            .all_defs()
            .filter(|d| if exact { d.name.as_ref() == name } else { d.name.as_ref().contains(&name) })
            .cloned()
            .collect();
        if defs.is_empty() {
            return Ok(not_found_result("symbol", &name));
        }
        let envelope = Envelope::success(defs).with_entity_type(EntityType::Symbol).with_query(name);
        Ok(envelope_result(envelope))
    }

    #[tool(description = "Raw, builtin-filtered call sites naming a given function name")]
    pub async fn usages(
        &self,
        Parameters(NameRequest { name }): Parameters<NameRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        let sites = engine.usages(&name);
        if sites.is_empty() {
            return Ok(not_found_result("usages of", &name));
        }
        let envelope = Envelope::success(sites).with_entity_type(EntityType::Calls).with_query(name);
        Ok(envelope_result(envelope))
    }

    #[tool(
        description = "Callers and callees for a function, or the method roster for a class/struct/interface/trait/enum"
    )]
    pub async fn context(
        &self,
        Parameters(ContextRequest { name, expand }): Parameters<ContextRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        match engine.context(&name) {
            None => Ok(not_found_result("symbol", &name)),
            Some(mut result) => {
                if expand {
                    if let crate::resolution::ContextResult::Function { callees, .. } = &mut result {
                        let extra: Vec<_> = callees.iter().flat_map(|c| engine.find_callees(c.id, true).items).collect();
                        callees.extend(extra);
                    }
                }
                Ok(envelope_result(Envelope::success(result).with_query(name)))
            }
        }
    }

    #[tool(description = "Bounded call tree starting at a function (first hit wins on overloaded names)")]
    pub async fn trace(
        &self,
        Parameters(TraceRequest { name, depth }): Parameters<TraceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        match engine.trace(&name, depth) {
            None => Ok(not_found_result("symbol", &name)),
            Some(tree) => Ok(envelope_result(
                Envelope::success(tree).with_entity_type(EntityType::CallTree).with_query(name).with_depth(depth.max(0) as u32),
            )),
        }
    }

    #[tool(description = "Reverse-reachable callers of a symbol within the configured depth")]
    pub async fn impact(
        &self,
        Parameters(NameRequest { name }): Parameters<NameRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        match engine.impact(&name) {
            None => Ok(not_found_result("symbol", &name)),
            Some(result) => {
                let truncated = result.truncated;
                Ok(envelope_result(
                    Envelope::success(result).with_entity_type(EntityType::ImpactGraph).with_query(name).with_truncated(truncated),
                ))
            }
        }
    }

    #[tool(description = "A definition plus its direct callees (depth 1), excluding self-reference")]
    pub async fn smart(
        &self,
        Parameters(NameRequest { name }): Parameters<NameRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        match engine.smart(&name) {
            None => Ok(not_found_result("symbol", &name)),
            Some(result) => Ok(envelope_result(Envelope::success(result).with_query(name))),
        }
    }

    #[tool(description = "Definitions mentioned nowhere else in the index, excluding recognized entry points")]
    pub async fn deadcode(
        &self,
        Parameters(DeadcodeRequest { include_exported }): Parameters<DeadcodeRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        let dead = engine.deadcode(include_exported);
        Ok(envelope_result(Envelope::success(dead).with_entity_type(EntityType::Symbol)))
    }

    #[tool(description = "Compare apparent call-site argument counts against a function's declared parameters")]
    pub async fn verify(
        &self,
        Parameters(NameRequest { name }): Parameters<NameRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        let issues = engine.verify(&name);
        Ok(envelope_result(Envelope::success(issues).with_query(name)))
    }

    #[tool(description = "Bounded import-reachability tree for a file (dependencies or dependents)")]
    pub async fn graph(
        &self,
        Parameters(GraphRequest { file, dependents, depth }): Parameters<GraphRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let Some(file_id) = idx.file_by_relative_path(&file).map(|f| f.id) else {
            return Ok(not_found_result("file", &file));
        };
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        let direction = if dependents { GraphDirection::Dependents } else { GraphDirection::Dependencies };
        match engine.graph(file_id, direction, depth) {
            None => Ok(not_found_result("file", &file)),
            Some(node) => Ok(envelope_result(Envelope::success(node).with_depth(depth.max(0) as u32))),
        }
    }

    #[tool(description = "Every import edge originating in a file")]
    pub async fn imports(
        &self,
        Parameters(FileRequest { file }): Parameters<FileRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let Some(file_id) = idx.file_by_relative_path(&file).map(|f| f.id) else {
            return Ok(not_found_result("file", &file));
        };
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        let edges: Vec<_> = engine.imports(file_id).into_iter().cloned().collect();
        Ok(envelope_result(Envelope::success(edges)))
    }

    #[tool(description = "Files whose imports resolve to a given file")]
    pub async fn exporters(
        &self,
        Parameters(FileRequest { file }): Parameters<FileRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let Some(file_id) = idx.file_by_relative_path(&file).map(|f| f.id) else {
            return Ok(not_found_result("file", &file));
        };
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        let paths: Vec<_> = engine.exporters(file_id).into_iter().map(|f| f.relative_path.to_string()).collect();
        Ok(envelope_result(Envelope::success(paths)))
    }

    #[tool(description = "Every export recorded for a file, including re-exports")]
    pub async fn exports(
        &self,
        Parameters(FileRequest { file }): Parameters<FileRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let Some(file_id) = idx.file_by_relative_path(&file).map(|f| f.id) else {
            return Ok(not_found_result("file", &file));
        };
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        let records: Vec<_> = engine.file_exports(file_id).into_iter().cloned().collect();
        Ok(envelope_result(Envelope::success(records)))
    }

    #[tool(description = "Test-framework functions whose body references a given symbol name")]
    pub async fn tests(
        &self,
        Parameters(NameRequest { name }): Parameters<NameRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        let defs = engine.tests(&name);
        Ok(envelope_result(Envelope::success(defs).with_query(name)))
    }

    #[tool(description = "Type-like definitions (class/struct/interface/trait/enum/type-alias) by name")]
    pub async fn typedef(
        &self,
        Parameters(NameRequest { name }): Parameters<NameRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        let defs = engine.typedef(&name);
        if defs.is_empty() {
            return Ok(not_found_result("type", &name));
        }
        Ok(envelope_result(Envelope::success(defs).with_query(name)))
    }

    #[tool(description = "The first definition by name, flagged ambiguous if more than one def shares the name")]
    pub async fn resolve_symbol(
        &self,
        Parameters(NameRequest { name }): Parameters<NameRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        match engine.resolve_symbol(&name) {
            None => Ok(not_found_result("symbol", &name)),
            Some(resolved) => Ok(envelope_result(Envelope::success(resolved).with_query(name))),
        }
    }

    #[tool(description = "Match stack-trace frames in free text back to indexed files by longest path-suffix")]
    pub async fn stacktrace(
        &self,
        Parameters(StacktraceRequest { text }): Parameters<StacktraceRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let engine = ResolutionEngine::new(&idx, &idx.settings().resolution);
        let frames = engine.stacktrace(&text);
        Ok(envelope_result(Envelope::success(frames)))
    }

    #[tool(description = "Summary of the indexed codebase: file count, symbol count, kind breakdown")]
    pub async fn get_index_info(
        &self,
        Parameters(IndexInfoRequest {}): Parameters<IndexInfoRequest>,
    ) -> Result<CallToolResult, McpError> {
        let idx = self.indexer.read().await;
        let mut kind_counts = std::collections::HashMap::new();
        for def in idx.all_defs() {
            *kind_counts.entry(format!("{:?}", def.kind)).or_insert(0usize) += 1;
        }
        let payload = serde_json::json!({
            "files": idx.files().count(),
            "symbols": idx.all_defs().count(),
            "kinds": kind_counts,
        });
        Ok(envelope_result(Envelope::success(payload)))
    }
}

#[tool_handler]
impl ServerHandler for CodeIntelligenceServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "codebase-index".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Polyglot Code Intelligence".to_string()),
                website_url: None,
                icons: None,
            },
            instructions: Some(
                "This server indexes a polyglot source tree and answers structural questions: \
                where a symbol is defined (find_symbol), who calls it and what it calls (usages, \
                context, trace), what is unreachable (deadcode), what a change would affect \
                (impact), and file-level import/export structure (graph, imports, exporters, \
                exports). Resolution is name-based and heuristic: ambiguous results are returned \
                in full rather than guessed at."
                    .to_string(),
            ),
        }
    }
}

/// Serve the index over stdio JSON-RPC 2.0 (spec.md §6), blocking until the
/// client disconnects. Grounded on the teacher's
/// `cli::commands::serve::run_stdio_server`.
pub async fn serve_stdio(indexer: SimpleIndexer) -> anyhow::Result<()> {
    use rmcp::{transport::stdio, ServiceExt};

    let server = CodeIntelligenceServer::new(indexer);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::sync::Arc as StdArc;

    fn indexer_over(dir: &std::path::Path) -> SimpleIndexer {
        let settings = StdArc::new(Settings::default());
        let mut idx = SimpleIndexer::new(dir, settings);
        idx.build(true).expect("build");
        idx
    }

    #[tokio::test]
    async fn find_symbol_reports_not_found_as_success_not_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn real_fn() {}").unwrap();
        let server = CodeIntelligenceServer::new(indexer_over(dir.path()));

        let result = server
            .find_symbol(Parameters(FindRequest { name: "does_not_exist".to_string(), exact: true }))
            .await
            .unwrap();

        assert_ne!(result.is_error, Some(true));
        let text = match &*result.content[0] {
            RawContent::Text(t) => t.text.clone(),
            _ => panic!("expected text content"),
        };
        assert!(text.contains("\"not_found\""));
    }

    #[tokio::test]
    async fn find_symbol_finds_real_definitions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn real_fn() {}").unwrap();
        let server = CodeIntelligenceServer::new(indexer_over(dir.path()));

        let result = server
            .find_symbol(Parameters(FindRequest { name: "real_fn".to_string(), exact: true }))
            .await
            .unwrap();

        let text = match &*result.content[0] {
            RawContent::Text(t) => t.text.clone(),
            _ => panic!("expected text content"),
        };
        assert!(text.contains("real_fn"));
    }
}
