//! MCP server handler implementation.
//!
//! Routes tool calls to the cache engine and the index view.
use std::sync::Arc;

use crate::tools::cache::{CacheIndexParams, index_impl};
use crate::tools::upstream_get::{UpstreamGetParams, upstream_get_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use upcache_client::CacheEngine;
use upcache_core::AppConfig;

/// The main MCP server handler for upcache.
#[derive(Clone)]
pub struct UpcacheServer {
    tool_router: ToolRouter<Self>,
    engine: Arc<CacheEngine>,
    config: Arc<AppConfig>,
}

/// Tool router implementation using the #[tool_router] macro.
#[tool_router]
impl UpcacheServer {
    pub fn new(engine: Arc<CacheEngine>, config: Arc<AppConfig>) -> Self {
        Self { tool_router: Self::tool_router(), engine, config }
    }

    /// Fetch a URL through the cache.
    ///
    /// Without `cache_control` the namespace profile is used, then the configured default.
    #[tool(
        description = "GET a URL through the upstream cache. Returns status, cache_status (e.g. hit:fresh, miss:cold), response headers and the decoded body."
    )]
    async fn upstream_get(&self, params: Parameters<UpstreamGetParams>) -> Result<CallToolResult, McpError> {
        upstream_get_impl(&self.engine, &self.config, params.0).await
    }

    /// Inspect a namespace index. Never writes to the store.
    #[tool(description = "List the cached entries of a namespace, oldest first, with sizes and expiry times.")]
    async fn cache_index(&self, params: Parameters<CacheIndexParams>) -> Result<CallToolResult, McpError> {
        index_impl(self.engine.store().as_ref(), params.0).await
    }
}

impl ServerHandler for UpcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "upcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
