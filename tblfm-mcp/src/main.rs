//! tblfm MCP Server
//!
//! MCP server, protocol revision 2025-11-25
//!
//! Tools:
//! - eval: Evaluate the formula tables of a markdown document
//! - eval_file: Evaluate a .md file by reference
//! - evaluate_table: Apply directives to a table given as JSON rows
//! - help: Get documentation for functions
//! - list_functions: List available functions
//!
//! Resources:
//! - tblfm://documents - List available .md files
//! - tblfm://documents/{name} - Get specific document

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::env;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tblfm::{Table, Tblfm};
use tblfm_core::{ErrorReport, FormulaError};
use tracing_subscriber::EnvFilter;

const PROTOCOL_VERSION: &str = "2025-11-25";
const SERVER_NAME: &str = "tblfm";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const DOCUMENT_URI_PREFIX: &str = "tblfm://documents/";

/// Get the data path from environment
fn data_path() -> PathBuf {
    env::var("TBLFM_DATA_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/app/tblfm"))
}

fn create_tblfm() -> Tblfm {
    let tblfm = Tblfm::with_standard_library();
    match env::var("TBLFM_DIVISION_DIGITS").ok().map(|v| v.parse::<usize>()) {
        Some(Ok(digits)) => tblfm.with_division_precision(digits),
        Some(Err(e)) => {
            tracing::warn!("ignoring TBLFM_DIVISION_DIGITS: {e}");
            tblfm
        }
        None => tblfm,
    }
}

#[derive(Debug, Serialize)]
struct DocumentInfo {
    name: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

// MCP Protocol types
#[derive(Debug, Deserialize)]
struct McpRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<JsonValue>,
    method: String,
    #[serde(default)]
    params: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
struct McpResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<McpError>,
}

#[derive(Debug, Serialize)]
struct McpError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<JsonValue>,
}

impl McpError {
    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }
}

/// Request handlers bound to one engine and one document directory
struct Server {
    tblfm: Tblfm,
    data_path: PathBuf,
}

impl Server {
    fn new(tblfm: Tblfm, data_path: PathBuf) -> Self {
        Self { tblfm, data_path }
    }

    /// All .md files in the data path
    fn list_documents(&self) -> Vec<DocumentInfo> {
        let Ok(entries) = fs::read_dir(&self.data_path) else {
            return Vec::new();
        };

        let mut docs: Vec<DocumentInfo> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "md"))
            .filter_map(|path| {
                let name = path.file_stem()?.to_str()?.to_string();
                Some(DocumentInfo {
                    name,
                    path: path.to_string_lossy().to_string(),
                    size: fs::metadata(&path).ok().map(|m| m.len()),
                    description: extract_description(&path),
                })
            })
            .collect();
        docs.sort_by(|a, b| a.name.cmp(&b.name));
        docs
    }

    fn load_document(&self, name: &str) -> Result<String, McpError> {
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(McpError::invalid_params(format!("Invalid document name '{}'", name)));
        }

        let path = self.data_path.join(format!("{}.md", name));
        if !path.exists() {
            let available: Vec<String> = self.list_documents().into_iter().map(|d| d.name).collect();
            return Err(McpError {
                code: -32602,
                message: format!("File '{}' not found", name),
                data: Some(json!({ "available": available })),
            });
        }

        fs::read_to_string(&path)
            .map_err(|e| McpError::invalid_params(format!("Failed to read '{}': {}", path.display(), e)))
    }

    fn handle_request(&self, request: &McpRequest) -> McpResponse {
        let result = match request.method.as_str() {
            // Lifecycle
            "initialize" => handle_initialize(&request.params),
            "initialized" | "notifications/initialized" => Ok(json!({})),
            "ping" => Ok(json!({})),

            // Tools
            "tools/list" => handle_tools_list(),
            "tools/call" => self.handle_tool_call(&request.params),

            // Resources
            "resources/list" => self.handle_resources_list(),
            "resources/read" => self.handle_resources_read(&request.params),

            _ => Err(McpError {
                code: -32601,
                message: format!("Method not found: {}", request.method),
                data: None,
            }),
        };

        match result {
            Ok(r) => McpResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id.clone(),
                result: Some(r),
                error: None,
            },
            Err(e) => McpResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id.clone(),
                result: None,
                error: Some(e),
            },
        }
    }

    fn handle_resources_list(&self) -> Result<JsonValue, McpError> {
        let resources: Vec<JsonValue> = self
            .list_documents()
            .iter()
            .map(|d| {
                json!({
                    "uri": format!("{}{}", DOCUMENT_URI_PREFIX, d.name),
                    "name": d.name,
                    "description": d.description.clone().unwrap_or_else(|| format!("Markdown document: {}.md", d.name)),
                    "mimeType": "text/markdown"
                })
            })
            .collect();

        Ok(json!({ "resources": resources }))
    }

    fn handle_resources_read(&self, params: &Option<JsonValue>) -> Result<JsonValue, McpError> {
        let uri = params
            .as_ref()
            .and_then(|p| p.get("uri"))
            .and_then(|u| u.as_str())
            .ok_or_else(|| McpError::invalid_params("Missing uri parameter"))?;

        let name = uri.strip_prefix(DOCUMENT_URI_PREFIX).ok_or_else(|| {
            McpError::invalid_params(format!("Invalid URI: {}. Expected {}{{name}}", uri, DOCUMENT_URI_PREFIX))
        })?;

        let content = self.load_document(name)?;

        Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": "text/markdown",
                "text": content
            }]
        }))
    }

    fn handle_tool_call(&self, params: &Option<JsonValue>) -> Result<JsonValue, McpError> {
        let params = params.as_ref().ok_or_else(|| McpError::invalid_params("Missing params"))?;

        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| McpError::invalid_params("Missing tool name"))?;

        let args = params.get("arguments").cloned().unwrap_or(json!({}));

        match name {
            "eval" => self.tool_eval(&args),
            "eval_file" => self.tool_eval_file(&args),
            "evaluate_table" => self.tool_evaluate_table(&args),
            "help" => self.tool_help(&args),
            "list_functions" => self.tool_list_functions(&args),
            _ => Err(McpError::invalid_params(format!("Unknown tool: {}", name))),
        }
    }

    fn tool_eval(&self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let markdown = string_arg(args, "markdown")?;
        Ok(document_result(self.tblfm.eval_document(markdown), None))
    }

    fn tool_eval_file(&self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let name = string_arg(args, "name")?;
        let markdown = self.load_document(name)?;
        Ok(document_result(self.tblfm.eval_document(&markdown), Some(format!("{}.md", name))))
    }

    fn tool_evaluate_table(&self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let rows: Vec<Vec<String>> = args
            .get("rows")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::invalid_params(format!("Invalid rows: {}", e)))?
            .ok_or_else(|| McpError::invalid_params("Missing rows argument"))?;

        let directives: Vec<String> = args
            .get("directives")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| McpError::invalid_params(format!("Invalid directives: {}", e)))?
            .ok_or_else(|| McpError::invalid_params("Missing directives argument"))?;

        let mut table = Table::from_rows(rows);
        match self.tblfm.evaluate(&mut table, &directives) {
            Ok(()) => Ok(json!({
                "content": [{ "type": "text", "text": format!("Applied {} directive line(s)", directives.len()) }],
                "rows": table.rows(),
                "isError": false
            })),
            Err(err) => Ok(error_result(&err)),
        }
    }

    fn tool_help(&self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let name = args.get("name").and_then(|v| v.as_str());
        let help = self.tblfm.help(name);

        Ok(json!({
            "content": [{ "type": "text", "text": format_help(&help) }],
            "data": help
        }))
    }

    fn tool_list_functions(&self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let category = args.get("category").and_then(|v| v.as_str());
        let functions = self.tblfm.list_functions(category);
        let count = functions.as_array().map_or(0, Vec::len);
        Ok(json!({
            "content": [{ "type": "text", "text": format!("{} functions listed", count) }],
            "data": functions
        }))
    }
}

/// Extract description from a first line `<!-- ... -->` comment or `# ` heading
fn extract_description(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let first_line = content.lines().next()?.trim();
    if let Some(comment) = first_line.strip_prefix("<!-- ").and_then(|l| l.strip_suffix(" -->")) {
        (!comment.starts_with("TBLFM:")).then(|| comment.to_string())
    } else {
        first_line.strip_prefix("# ").map(str::to_string)
    }
}

fn string_arg<'a>(args: &'a JsonValue, name: &str) -> Result<&'a str, McpError> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| McpError::invalid_params(format!("Missing {} argument", name)))
}

fn document_result(result: Result<String, FormulaError>, source_file: Option<String>) -> JsonValue {
    let mut response = match result {
        Ok(markdown) => json!({
            "content": [{ "type": "text", "text": markdown }],
            "isError": false
        }),
        Err(err) => error_result(&err),
    };
    if let (Some(file), Some(obj)) = (source_file, response.as_object_mut()) {
        obj.insert("source_file".to_string(), json!(file));
    }
    response
}

/// Formula failures are tool results, not protocol errors
fn error_result(err: &FormulaError) -> JsonValue {
    let report = ErrorReport::from(err);
    let mut text = format!("Error [{}]: {}", report.code, report.message);
    if let Some(suggestion) = &report.suggestion {
        text.push_str(&format!("\nSuggestion: {}", suggestion));
    }
    json!({
        "content": [{ "type": "text", "text": text }],
        "errors": [report],
        "isError": true
    })
}

fn format_help(help: &JsonValue) -> String {
    if let Some(err) = help.get("error").and_then(|e| e.as_str()) {
        return format!("Error: {}", err);
    }

    let mut out = String::new();
    if let Some(n) = help.get("name").and_then(|v| v.as_str()) {
        out.push_str(&format!("# {}\n\n", n));
    }
    if let Some(d) = help.get("description").and_then(|v| v.as_str()) {
        out.push_str(&format!("{}\n\n", d));
    }
    if let Some(u) = help.get("usage").and_then(|v| v.as_str()) {
        out.push_str(&format!("**Usage:** `{}`\n\n", u));
    }
    if let Some(categories) = help.get("functions").and_then(|f| f.as_object()) {
        for (category, names) in categories {
            let names: Vec<&str> = names.as_array().into_iter().flatten().filter_map(|n| n.as_str()).collect();
            out.push_str(&format!("**{}:** {}\n", category, names.join(", ")));
        }
    }
    out
}

fn handle_initialize(params: &Option<JsonValue>) -> Result<JsonValue, McpError> {
    let client_info = params
        .as_ref()
        .and_then(|p| p.get("clientInfo"))
        .and_then(|c| c.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or("unknown");

    // Use client's protocol version for compatibility
    let client_protocol = params
        .as_ref()
        .and_then(|p| p.get("protocolVersion"))
        .and_then(|v| v.as_str())
        .unwrap_or(PROTOCOL_VERSION);

    tracing::info!("client connected: {client_info} (protocol: {client_protocol})");

    Ok(json!({
        "protocolVersion": client_protocol,
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION,
            "description": "Table formulas for markdown tables"
        },
        "capabilities": {
            "tools": {
                "listChanged": false
            },
            "resources": {
                "subscribe": false,
                "listChanged": false
            }
        },
        "instructions": "tblfm evaluates <!-- TBLFM: ... --> formula comments under markdown tables. Use 'eval' on a document, 'evaluate_table' on raw rows, and 'help' to explore the functions. Show the returned markdown to the user as received."
    }))
}

fn handle_tools_list() -> Result<JsonValue, McpError> {
    Ok(json!({
        "tools": [
            {
                "name": "eval",
                "description": "Evaluate every table in a markdown document that is followed by <!-- TBLFM: ... --> lines. Returns the re-rendered document.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "markdown": {
                            "type": "string",
                            "description": "Markdown document with formula tables"
                        }
                    },
                    "required": ["markdown"]
                }
            },
            {
                "name": "eval_file",
                "description": "Evaluate a .md file from the data directory by name.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "File name without .md extension"
                        }
                    },
                    "required": ["name"]
                }
            },
            {
                "name": "evaluate_table",
                "description": "Apply formula directives to a table given as rows of cell text. Row 1 is the header.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "rows": {
                            "type": "array",
                            "items": { "type": "array", "items": { "type": "string" } },
                            "description": "Table rows, header first"
                        },
                        "directives": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Directive lines, e.g. \"@>$>=sum(@I..@-1);hm\""
                        }
                    },
                    "required": ["rows", "directives"]
                }
            },
            {
                "name": "help",
                "description": "Get documentation for a function, or general help.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "name": {
                            "type": "string",
                            "description": "Function name. Omit for general help."
                        }
                    }
                }
            },
            {
                "name": "list_functions",
                "description": "List all available functions, optionally by category.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "category": {
                            "type": "string",
                            "description": "Filter by category",
                            "enum": ["aggregate"]
                        }
                    }
                }
            }
        ]
    }))
}

fn write_response(response: &McpResponse) -> io::Result<()> {
    let response_json = serde_json::to_string(response).map_err(io::Error::other)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", response_json)?;
    stdout.flush()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let server = Server::new(create_tblfm(), data_path());

    tracing::info!("tblfm MCP Server v{SERVER_VERSION} started");
    tracing::info!("protocol: {PROTOCOL_VERSION}");
    tracing::info!("data path: {}", server.data_path.display());
    tracing::debug!(
        "stdin is_terminal: {}, stdout is_terminal: {}",
        io::stdin().is_terminal(),
        io::stdout().is_terminal()
    );

    let docs = server.list_documents();
    tracing::info!("available .md files: {}", docs.len());
    for d in &docs {
        tracing::debug!("  - {}: {:?}", d.name, d.description);
    }

    let stdin = io::stdin();
    let mut reader = io::BufReader::new(stdin.lock());

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => {
                tracing::info!("client disconnected (EOF)");
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                tracing::trace!("received {} bytes", line.len());

                let request: McpRequest = match serde_json::from_str(line) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("error parsing request: {e}");
                        let response = McpResponse {
                            jsonrpc: "2.0".to_string(),
                            id: None,
                            result: None,
                            error: Some(McpError {
                                code: -32700,
                                message: format!("Parse error: {}", e),
                                data: None,
                            }),
                        };
                        if let Err(e) = write_response(&response) {
                            tracing::error!("error writing response: {e}");
                            break;
                        }
                        continue;
                    }
                };

                tracing::debug!("processing: {}", request.method);
                let response = server.handle_request(&request);

                // Notifications (no id) should NOT receive a response
                if request.id.is_none() {
                    continue;
                }

                if let Err(e) = write_response(&response) {
                    tracing::error!("error writing response: {e}");
                    break;
                }
            }
            Err(e) => {
                tracing::error!("error reading input: {e}");
                break;
            }
        }
    }

    tracing::info!("server shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, params: JsonValue) -> McpRequest {
        McpRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    fn call(server: &Server, tool: &str, arguments: JsonValue) -> JsonValue {
        let response = server.handle_request(&request("tools/call", json!({ "name": tool, "arguments": arguments })));
        assert!(response.error.is_none(), "unexpected protocol error: {:?}", response.error);
        response.result.unwrap()
    }

    fn test_server(dir: &str) -> Server {
        let path = env::temp_dir().join(format!("tblfm-mcp-{}-{}", dir, std::process::id()));
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(&path).unwrap();
        Server::new(Tblfm::with_standard_library(), path)
    }

    const DOC: &str = "# Timesheet\n| Start | End   | Duration |\n| ----- | ----- | -------- |\n| 09:00 | 09:15 |          |\n<!-- TBLFM: $3=($2-$1);hm -->\n";

    #[test]
    fn test_initialize_echoes_protocol() {
        let result = handle_initialize(&Some(json!({ "protocolVersion": "2025-03-26" }))).unwrap();
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], "tblfm");
    }

    #[test]
    fn test_tools_list() {
        let tools = handle_tools_list().unwrap();
        let names: Vec<&str> = tools["tools"].as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["eval", "eval_file", "evaluate_table", "help", "list_functions"]);
    }

    #[test]
    fn test_unknown_method() {
        let server = test_server("unknown");
        let response = server.handle_request(&request("prompts/list", json!({})));
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[test]
    fn test_eval_tool() {
        let server = test_server("eval");
        let result = call(&server, "eval", json!({ "markdown": DOC }));
        assert_eq!(result["isError"], false);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("| 09:00 | 09:15 | 00:15    |"));
    }

    #[test]
    fn test_eval_reports_formula_errors() {
        let server = test_server("eval-error");
        let doc = "| A |\n| - |\n| 1 |\n<!-- TBLFM: @-1=@2 -->\n";
        let result = call(&server, "eval", json!({ "markdown": doc }));
        assert_eq!(result["isError"], true);
        assert_eq!(result["errors"][0]["code"], "PARSE_ERROR");
        assert_eq!(result["errors"][0]["message"], "Formula '<!-- TBLFM: @-1=@2 -->' could not be parsed");
    }

    #[test]
    fn test_evaluate_table_tool() {
        let server = test_server("table");
        let result = call(
            &server,
            "evaluate_table",
            json!({
                "rows": [["A", "B"], ["1", "2"], ["3", "4"], ["", ""]],
                "directives": ["@>=sum(@I..@-1)"]
            }),
        );
        assert_eq!(result["rows"][3], json!(["4", "6"]));

        let result = call(
            &server,
            "evaluate_table",
            json!({ "rows": [["A"], ["1"]], "directives": ["@2$1=(1/0)"] }),
        );
        assert_eq!(result["isError"], true);
        assert_eq!(result["errors"][0]["code"], "DIV_ZERO");
    }

    #[test]
    fn test_evaluate_table_requires_rows() {
        let server = test_server("table-args");
        let response = server.handle_request(&request(
            "tools/call",
            json!({ "name": "evaluate_table", "arguments": { "directives": [] } }),
        ));
        assert_eq!(response.error.unwrap().message, "Missing rows argument");
    }

    #[test]
    fn test_documents_and_eval_file() {
        let server = test_server("docs");
        fs::write(server.data_path.join("timesheet.md"), DOC).unwrap();
        fs::write(server.data_path.join("notes.txt"), "ignored").unwrap();

        let listed = server.handle_request(&request("resources/list", json!({}))).result.unwrap();
        let resources = listed["resources"].as_array().unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0]["uri"], "tblfm://documents/timesheet");
        assert_eq!(resources[0]["description"], "Timesheet");

        let read = server
            .handle_request(&request("resources/read", json!({ "uri": "tblfm://documents/timesheet" })))
            .result
            .unwrap();
        assert_eq!(read["contents"][0]["text"], DOC);

        let result = call(&server, "eval_file", json!({ "name": "timesheet" }));
        assert_eq!(result["source_file"], "timesheet.md");
        assert!(result["content"][0]["text"].as_str().unwrap().contains("00:15"));

        let missing = server.handle_request(&request("tools/call", json!({ "name": "eval_file", "arguments": { "name": "nope" } })));
        assert_eq!(missing.error.unwrap().data.unwrap()["available"], json!(["timesheet"]));

        let escape = server.handle_request(&request("resources/read", json!({ "uri": "tblfm://documents/../secret" })));
        assert!(escape.error.is_some());
    }

    #[test]
    fn test_help_and_list_functions() {
        let server = test_server("help");
        let help = call(&server, "help", json!({ "name": "sum" }));
        assert!(help["content"][0]["text"].as_str().unwrap().starts_with("# sum"));

        let general = call(&server, "help", json!({}));
        assert!(general["content"][0]["text"].as_str().unwrap().contains("mean, median, sum"));

        let listed = call(&server, "list_functions", json!({ "category": "aggregate" }));
        assert_eq!(listed["data"].as_array().unwrap().len(), 3);
    }
}
